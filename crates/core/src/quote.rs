// Quote domain types
//
// A quote template is a form owned by one user. It holds priced items, each
// item declaring the parameters a requester must fill in. A quote response is
// one requester's answers to a template, together with the price range those
// answers imply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Quote template - a reusable, priced form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct QuoteTemplate {
    /// Unique identifier for the template.
    pub id: Uuid,
    /// User who created the template.
    pub owner_id: Uuid,
    /// Display name of the template.
    pub name: String,
    /// Optional longer description shown to requesters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Items of the template, ordered by position.
    #[serde(default)]
    pub items: Vec<QuoteItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A parameter a requester fills in when answering an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ItemParameter {
    /// Machine key, unique within the item.
    #[cfg_attr(feature = "openapi", schema(example = "page_count"))]
    pub key: String,
    /// Human-readable label.
    #[cfg_attr(feature = "openapi", schema(example = "Number of pages"))]
    pub label: String,
    /// Whether an answer must supply a value for this parameter.
    #[serde(default)]
    pub required: bool,
}

/// A priced line of a quote template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct QuoteItem {
    /// Unique identifier for the item.
    pub id: Uuid,
    /// Template this item belongs to.
    pub template_id: Uuid,
    /// Display label.
    pub label: String,
    /// Parameters requested from whoever answers this item.
    #[serde(default)]
    pub parameters: Vec<ItemParameter>,
    /// Lower bound of the unit price, in cents.
    pub unit_price_min_cents: i64,
    /// Upper bound of the unit price, in cents.
    pub unit_price_max_cents: i64,
    /// Sort position inside the template.
    pub position: i32,
}

impl QuoteItem {
    pub fn unit_range(&self) -> PriceRange {
        PriceRange {
            min_cents: self.unit_price_min_cents,
            max_cents: self.unit_price_max_cents,
        }
    }
}

/// An inclusive price range in cents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PriceRange {
    pub min_cents: i64,
    pub max_cents: i64,
}

impl PriceRange {
    pub fn is_valid(&self) -> bool {
        self.min_cents >= 0 && self.min_cents <= self.max_cents
    }

    fn checked_scale(self, quantity: u32) -> Option<Self> {
        Some(Self {
            min_cents: self.min_cents.checked_mul(i64::from(quantity))?,
            max_cents: self.max_cents.checked_mul(i64::from(quantity))?,
        })
    }

    fn checked_add(self, other: Self) -> Option<Self> {
        Some(Self {
            min_cents: self.min_cents.checked_add(other.min_cents)?,
            max_cents: self.max_cents.checked_add(other.max_cents)?,
        })
    }
}

/// Answer to a single quote item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ItemAnswer {
    /// Item being answered.
    pub item_id: Uuid,
    /// How many units are requested. Must be at least 1.
    pub quantity: u32,
    /// Parameter values keyed by parameter key.
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// A requester's answers to a template, with the computed estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct QuoteResponse {
    /// Unique identifier for the response.
    pub id: Uuid,
    /// Template that was answered.
    pub template_id: Uuid,
    /// User who submitted the response.
    pub owner_id: Uuid,
    /// Answers, one per item.
    pub answers: Vec<ItemAnswer>,
    /// Total price range implied by the answers.
    pub estimate: PriceRange,
    pub created_at: DateTime<Utc>,
}

/// Why a set of answers could not be priced.
/// Each variant carries the index of the offending answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimateError {
    #[error("answer {index} references an item outside this template")]
    UnknownItem { index: usize },

    #[error("answer {index} repeats an item that was already answered")]
    DuplicateItem { index: usize },

    #[error("answer {index} must request at least one unit")]
    ZeroQuantity { index: usize },

    #[error("answer {index} is missing required parameter '{key}'")]
    MissingParameter { index: usize, key: String },

    #[error("answer {index} sets unknown parameter '{key}'")]
    UnknownParameter { index: usize, key: String },

    #[error("answer {index} pushes the estimate past the representable range")]
    Overflow { index: usize },
}

impl EstimateError {
    pub fn index(&self) -> usize {
        match self {
            EstimateError::UnknownItem { index }
            | EstimateError::DuplicateItem { index }
            | EstimateError::ZeroQuantity { index }
            | EstimateError::MissingParameter { index, .. }
            | EstimateError::UnknownParameter { index, .. }
            | EstimateError::Overflow { index } => *index,
        }
    }
}

/// Price a set of answers against the items of one template.
///
/// Every answer must reference an item of `items`, at most once, with a
/// quantity of at least one, supplying every required parameter and no
/// unknown ones. Items that are not answered contribute nothing.
/// All problems are reported, in answer order.
pub fn estimate(items: &[QuoteItem], answers: &[ItemAnswer]) -> Result<PriceRange, Vec<EstimateError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let mut total = PriceRange::default();

    for (index, answer) in answers.iter().enumerate() {
        let Some(item) = items.iter().find(|i| i.id == answer.item_id) else {
            errors.push(EstimateError::UnknownItem { index });
            continue;
        };

        if !seen.insert(answer.item_id) {
            errors.push(EstimateError::DuplicateItem { index });
            continue;
        }

        if answer.quantity == 0 {
            errors.push(EstimateError::ZeroQuantity { index });
        }

        for param in item.parameters.iter().filter(|p| p.required) {
            let present = answer
                .values
                .get(&param.key)
                .is_some_and(|v| !v.trim().is_empty());
            if !present {
                errors.push(EstimateError::MissingParameter {
                    index,
                    key: param.key.clone(),
                });
            }
        }

        for key in answer.values.keys() {
            if !item.parameters.iter().any(|p| &p.key == key) {
                errors.push(EstimateError::UnknownParameter {
                    index,
                    key: key.clone(),
                });
            }
        }

        match item
            .unit_range()
            .checked_scale(answer.quantity)
            .and_then(|line| total.checked_add(line))
        {
            Some(next) => total = next,
            None => errors.push(EstimateError::Overflow { index }),
        }
    }

    if errors.is_empty() {
        Ok(total)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(min: i64, max: i64, parameters: Vec<ItemParameter>) -> QuoteItem {
        QuoteItem {
            id: Uuid::now_v7(),
            template_id: Uuid::nil(),
            label: "Item".to_string(),
            parameters,
            unit_price_min_cents: min,
            unit_price_max_cents: max,
            position: 0,
        }
    }

    fn param(key: &str, required: bool) -> ItemParameter {
        ItemParameter {
            key: key.to_string(),
            label: key.to_string(),
            required,
        }
    }

    fn answer(item_id: Uuid, quantity: u32, values: &[(&str, &str)]) -> ItemAnswer {
        ItemAnswer {
            item_id,
            quantity,
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_estimate_sums_scaled_ranges() {
        let logo = item(10_000, 25_000, vec![]);
        let pages = item(5_000, 8_000, vec![param("topic", false)]);
        let items = vec![logo.clone(), pages.clone()];

        let total = estimate(
            &items,
            &[answer(logo.id, 1, &[]), answer(pages.id, 3, &[("topic", "about")])],
        )
        .unwrap();

        assert_eq!(
            total,
            PriceRange {
                min_cents: 25_000,
                max_cents: 49_000
            }
        );
    }

    #[test]
    fn test_estimate_empty_answers_is_zero() {
        let items = vec![item(100, 200, vec![])];
        assert_eq!(estimate(&items, &[]).unwrap(), PriceRange::default());
    }

    #[test]
    fn test_estimate_rejects_foreign_and_duplicate_items() {
        let a = item(100, 200, vec![]);
        let items = vec![a.clone()];

        let errors = estimate(
            &items,
            &[
                answer(a.id, 1, &[]),
                answer(a.id, 2, &[]),
                answer(Uuid::now_v7(), 1, &[]),
            ],
        )
        .unwrap_err();

        assert_eq!(
            errors,
            vec![
                EstimateError::DuplicateItem { index: 1 },
                EstimateError::UnknownItem { index: 2 },
            ]
        );
    }

    #[test]
    fn test_estimate_checks_parameters() {
        let a = item(100, 200, vec![param("size", true), param("color", false)]);
        let items = vec![a.clone()];

        let errors = estimate(&items, &[answer(a.id, 1, &[("size", "  "), ("font", "serif")])])
            .unwrap_err();

        assert_eq!(
            errors,
            vec![
                EstimateError::MissingParameter {
                    index: 0,
                    key: "size".to_string()
                },
                EstimateError::UnknownParameter {
                    index: 0,
                    key: "font".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_estimate_rejects_zero_quantity() {
        let a = item(100, 200, vec![]);
        let errors = estimate(&[a.clone()], &[answer(a.id, 0, &[])]).unwrap_err();
        assert_eq!(errors, vec![EstimateError::ZeroQuantity { index: 0 }]);
        assert_eq!(errors[0].index(), 0);
    }

    #[test]
    fn test_estimate_reports_overflow() {
        let a = item(i64::MAX / 2, i64::MAX / 2, vec![]);
        let errors = estimate(&[a.clone()], &[answer(a.id, 3, &[])]).unwrap_err();
        assert_eq!(errors, vec![EstimateError::Overflow { index: 0 }]);
    }

    #[test]
    fn test_price_range_validity() {
        assert!(PriceRange { min_cents: 0, max_cents: 0 }.is_valid());
        assert!(PriceRange { min_cents: 10, max_cents: 20 }.is_valid());
        assert!(!PriceRange { min_cents: 20, max_cents: 10 }.is_valid());
        assert!(!PriceRange { min_cents: -1, max_cents: 10 }.is_valid());
    }
}
