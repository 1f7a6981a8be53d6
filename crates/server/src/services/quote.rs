// Quote service: templates, their priced items, and submitted responses
// Decision: Authorization happens before the service is called; the service trusts its inputs' ids
// Decision: Estimates are computed server-side at submission and stored with the response

use anyhow::Context;
use atelier_core::{estimate, ItemParameter, QuoteItem, QuoteResponse, QuoteTemplate};
use uuid::Uuid;

use crate::api::quotes::{
    CreateQuoteItemRequest, CreateQuoteResponseRequest, CreateQuoteTemplateRequest,
    UpdateQuoteItemRequest, UpdateQuoteTemplateRequest,
};
use crate::api::validation::{
    check_description, check_name, check_parameters, check_price_range, estimate_error_field,
    MAX_ANSWERS_PER_RESPONSE, MAX_VALUE_BYTES,
};
use crate::error::{ApiError, ValidationErrors};
use crate::storage::{
    CreateQuoteItemRow, CreateQuoteResponseRow, CreateQuoteTemplateRow, QuoteItemRow,
    QuoteTemplateRow, StorageBackend, UpdateQuoteItem, UpdateQuoteTemplate,
};

pub struct QuoteService {
    db: StorageBackend,
}

impl QuoteService {
    pub fn new(db: StorageBackend) -> Self {
        Self { db }
    }

    // ============================================
    // Templates
    // ============================================

    pub async fn create_template(
        &self,
        owner_id: Uuid,
        req: CreateQuoteTemplateRequest,
    ) -> Result<QuoteTemplate, ApiError> {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, "name", &req.name);
        check_description(&mut errors, "description", req.description.as_deref());
        errors.finish()?;

        let row = self
            .db
            .create_quote_template(CreateQuoteTemplateRow {
                owner_id,
                name: req.name.trim().to_string(),
                description: req.description,
            })
            .await
            .context("Failed to create quote template")?;

        tracing::info!(template_id = %row.id, %owner_id, "Quote template created");
        Ok(row.into_template(Vec::new()))
    }

    /// Templates visible in listings: the caller's own, or all of them for admins
    pub async fn list_templates(&self, owner_id: Option<Uuid>) -> Result<Vec<QuoteTemplate>, ApiError> {
        let rows = self
            .db
            .list_quote_templates(owner_id)
            .await
            .context("Failed to list quote templates")?;

        let mut templates = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.items(row.id).await?;
            templates.push(row.into_template(items));
        }
        Ok(templates)
    }

    pub async fn get_template(&self, id: Uuid) -> Result<Option<QuoteTemplate>, ApiError> {
        let Some(row) = self
            .db
            .get_quote_template(id)
            .await
            .context("Failed to get quote template")?
        else {
            return Ok(None);
        };
        let items = self.items(id).await?;
        Ok(Some(row.into_template(items)))
    }

    pub async fn update_template(
        &self,
        template: QuoteTemplateRow,
        req: UpdateQuoteTemplateRequest,
    ) -> Result<QuoteTemplate, ApiError> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &req.name {
            check_name(&mut errors, "name", name);
        }
        check_description(&mut errors, "description", req.description.as_deref());
        errors.finish()?;

        let row = self
            .db
            .update_quote_template(
                template.id,
                UpdateQuoteTemplate {
                    name: req.name.map(|n| n.trim().to_string()),
                    description: req.description,
                },
            )
            .await
            .context("Failed to update quote template")?
            .ok_or(ApiError::NotFound("Quote template"))?;

        let items = self.items(row.id).await?;
        Ok(row.into_template(items))
    }

    /// Deletes the template together with its items and responses
    pub async fn delete_template(&self, id: Uuid) -> Result<bool, ApiError> {
        let deleted = self
            .db
            .delete_quote_template(id)
            .await
            .context("Failed to delete quote template")?;
        if deleted {
            tracing::info!(template_id = %id, "Quote template deleted");
        }
        Ok(deleted)
    }

    async fn items(&self, template_id: Uuid) -> Result<Vec<QuoteItem>, ApiError> {
        let rows = self
            .db
            .list_quote_items(template_id)
            .await
            .context("Failed to list quote items")?;
        let items = rows
            .into_iter()
            .map(QuoteItem::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(items)
    }

    // ============================================
    // Items
    // ============================================

    pub async fn add_item(
        &self,
        template: QuoteTemplateRow,
        mut req: CreateQuoteItemRequest,
    ) -> Result<QuoteItem, ApiError> {
        req.parameters = normalize_parameters(req.parameters);

        let mut errors = ValidationErrors::new();
        check_name(&mut errors, "label", &req.label);
        check_parameters(&mut errors, "parameters", &req.parameters);
        check_price_range(&mut errors, req.unit_price_min_cents, req.unit_price_max_cents);
        errors.finish()?;

        let position = match req.position {
            Some(position) => position,
            None => self.items(template.id).await?.len() as i32,
        };

        let row = self
            .db
            .create_quote_item(CreateQuoteItemRow {
                template_id: template.id,
                label: req.label.trim().to_string(),
                parameters: req.parameters,
                unit_price_min_cents: req.unit_price_min_cents,
                unit_price_max_cents: req.unit_price_max_cents,
                position,
            })
            .await
            .context("Failed to create quote item")?;

        Ok(QuoteItem::try_from(row)?)
    }

    pub async fn update_item(
        &self,
        item: QuoteItemRow,
        mut req: UpdateQuoteItemRequest,
    ) -> Result<QuoteItem, ApiError> {
        req.parameters = req.parameters.map(normalize_parameters);

        let mut errors = ValidationErrors::new();
        if let Some(label) = &req.label {
            check_name(&mut errors, "label", label);
        }
        if let Some(parameters) = &req.parameters {
            check_parameters(&mut errors, "parameters", parameters);
        }
        // The resulting range must hold, not just the provided half of it
        check_price_range(
            &mut errors,
            req.unit_price_min_cents.unwrap_or(item.unit_price_min_cents),
            req.unit_price_max_cents.unwrap_or(item.unit_price_max_cents),
        );
        errors.finish()?;

        let row = self
            .db
            .update_quote_item(
                item.id,
                UpdateQuoteItem {
                    label: req.label.map(|l| l.trim().to_string()),
                    parameters: req.parameters,
                    unit_price_min_cents: req.unit_price_min_cents,
                    unit_price_max_cents: req.unit_price_max_cents,
                    position: req.position,
                },
            )
            .await
            .context("Failed to update quote item")?
            .ok_or(ApiError::NotFound("Quote item"))?;

        Ok(QuoteItem::try_from(row)?)
    }

    pub async fn delete_item(&self, id: Uuid) -> Result<bool, ApiError> {
        Ok(self
            .db
            .delete_quote_item(id)
            .await
            .context("Failed to delete quote item")?)
    }

    // ============================================
    // Responses
    // ============================================

    /// Validate answers against the template's items, price them, and store the result.
    /// Any signed-in user may answer an existing template.
    pub async fn submit_response(
        &self,
        template_id: Uuid,
        owner_id: Uuid,
        req: CreateQuoteResponseRequest,
    ) -> Result<QuoteResponse, ApiError> {
        self.db
            .get_quote_template(template_id)
            .await
            .context("Failed to get quote template")?
            .ok_or(ApiError::NotFound("Quote template"))?;

        let mut errors = ValidationErrors::new();
        if req.answers.is_empty() {
            errors.add("answers", "must contain at least one answer");
        } else if req.answers.len() > MAX_ANSWERS_PER_RESPONSE {
            errors.add(
                "answers",
                format!("must contain at most {MAX_ANSWERS_PER_RESPONSE} answers"),
            );
        }
        for (i, answer) in req.answers.iter().enumerate() {
            for (key, value) in &answer.values {
                if value.len() > MAX_VALUE_BYTES {
                    errors.add(
                        format!("answers[{i}].values.{key}"),
                        format!("must be at most {MAX_VALUE_BYTES} bytes"),
                    );
                }
            }
        }
        errors.finish()?;

        let items = self.items(template_id).await?;
        let total = estimate(&items, &req.answers).map_err(|failures| {
            let mut errors = ValidationErrors::new();
            for failure in &failures {
                errors.add(estimate_error_field(failure), failure.to_string());
            }
            match errors.finish() {
                Err(e) => e,
                Ok(()) => ApiError::invalid("answers", "could not be priced"),
            }
        })?;

        let row = self
            .db
            .create_quote_response(CreateQuoteResponseRow {
                template_id,
                owner_id,
                answers: req.answers,
                estimate: total,
            })
            .await
            .context("Failed to store quote response")?;

        tracing::info!(
            response_id = %row.id,
            %template_id,
            min_cents = total.min_cents,
            max_cents = total.max_cents,
            "Quote response submitted"
        );
        Ok(QuoteResponse::try_from(row)?)
    }

    pub async fn list_responses(&self, template_id: Uuid) -> Result<Vec<QuoteResponse>, ApiError> {
        let rows = self
            .db
            .list_quote_responses(template_id)
            .await
            .context("Failed to list quote responses")?;
        let responses = rows
            .into_iter()
            .map(QuoteResponse::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(responses)
    }

    pub async fn delete_response(&self, id: Uuid) -> Result<bool, ApiError> {
        Ok(self
            .db
            .delete_quote_response(id)
            .await
            .context("Failed to delete quote response")?)
    }
}

/// Answers are matched on exact keys, so keys and labels are stored trimmed
fn normalize_parameters(parameters: Vec<ItemParameter>) -> Vec<ItemParameter> {
    parameters
        .into_iter()
        .map(|p| ItemParameter {
            key: p.key.trim().to_string(),
            label: p.label.trim().to_string(),
            required: p.required,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_request(label: &str, min: i64, max: i64) -> CreateQuoteItemRequest {
        CreateQuoteItemRequest {
            label: label.to_string(),
            parameters: Vec::new(),
            unit_price_min_cents: min,
            unit_price_max_cents: max,
            position: None,
        }
    }

    async fn template_row(service: &QuoteService, owner_id: Uuid) -> QuoteTemplateRow {
        let template = service
            .create_template(
                owner_id,
                CreateQuoteTemplateRequest {
                    name: "Catering".to_string(),
                    description: None,
                },
            )
            .await
            .unwrap();
        service.db.get_quote_template(template.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_items_append_in_order() {
        let service = QuoteService::new(StorageBackend::in_memory());
        let template = template_row(&service, Uuid::now_v7()).await;

        let first = service
            .add_item(template.clone(), item_request("Starters", 100, 200))
            .await
            .unwrap();
        let second = service
            .add_item(template.clone(), item_request("Mains", 300, 500))
            .await
            .unwrap();
        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);

        let loaded = service.get_template(template.id).await.unwrap().unwrap();
        let labels: Vec<_> = loaded.items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["Starters", "Mains"]);
    }

    #[tokio::test]
    async fn test_update_item_checks_merged_range() {
        let service = QuoteService::new(StorageBackend::in_memory());
        let template = template_row(&service, Uuid::now_v7()).await;
        let item = service
            .add_item(template, item_request("Dessert", 100, 200))
            .await
            .unwrap();
        let row = service.db.get_quote_item(item.id).await.unwrap().unwrap();

        // Raising only the minimum above the stored maximum is rejected
        let err = service
            .update_item(
                row.clone(),
                UpdateQuoteItemRequest {
                    unit_price_min_cents: Some(500),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let updated = service
            .update_item(
                row,
                UpdateQuoteItemRequest {
                    unit_price_min_cents: Some(150),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.unit_price_min_cents, 150);
        assert_eq!(updated.unit_price_max_cents, 200);
    }

    #[tokio::test]
    async fn test_parameter_keys_are_stored_trimmed() {
        let service = QuoteService::new(StorageBackend::in_memory());
        let owner_id = Uuid::now_v7();
        let template = template_row(&service, owner_id).await;
        let item = service
            .add_item(
                template.clone(),
                CreateQuoteItemRequest {
                    parameters: vec![ItemParameter {
                        key: " size ".to_string(),
                        label: " Print size".to_string(),
                        required: true,
                    }],
                    ..item_request("Prints", 100, 200)
                },
            )
            .await
            .unwrap();
        assert_eq!(item.parameters[0].key, "size");
        assert_eq!(item.parameters[0].label, "Print size");

        let response = service
            .submit_response(
                template.id,
                owner_id,
                CreateQuoteResponseRequest {
                    answers: vec![atelier_core::ItemAnswer {
                        item_id: item.id,
                        quantity: 2,
                        values: [("size".to_string(), "A3".to_string())].into(),
                    }],
                },
            )
            .await
            .unwrap();
        assert_eq!(response.estimate.min_cents, 200);
        assert_eq!(response.estimate.max_cents, 400);
    }

    #[tokio::test]
    async fn test_empty_answers_rejected() {
        let service = QuoteService::new(StorageBackend::in_memory());
        let template = template_row(&service, Uuid::now_v7()).await;

        let err = service
            .submit_response(
                template.id,
                Uuid::now_v7(),
                CreateQuoteResponseRequest { answers: Vec::new() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref fields) if fields[0].field == "answers"));
    }
}
