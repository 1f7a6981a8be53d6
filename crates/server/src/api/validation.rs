// Input validation for public APIs
//
// Hard limits that guard the service from abuse, plus the shape rules every
// request body must satisfy. Checks collect into `ValidationErrors` so one
// response lists every offending field.

use atelier_core::{EstimateError, ItemParameter};
use std::collections::HashSet;

use crate::auth::password::password_policy_violation;
use crate::error::ValidationErrors;

// =============================================================================
// Input Size Limits
// =============================================================================

/// Maximum length of display names (users, templates, item labels).
pub const MAX_NAME_CHARS: usize = 200;

/// Maximum size of an email address (RFC 5321 path limit).
pub const MAX_EMAIL_BYTES: usize = 320;

/// Maximum size of a template description.
pub const MAX_DESCRIPTION_BYTES: usize = 10 * 1024; // 10 KB

/// Maximum number of parameters one item may declare.
pub const MAX_PARAMETERS_PER_ITEM: usize = 50;

/// Maximum number of answers in one response.
pub const MAX_ANSWERS_PER_RESPONSE: usize = 500;

/// Maximum size of a single answered parameter value.
pub const MAX_VALUE_BYTES: usize = 4 * 1024; // 4 KB

/// Maximum length of a user search query.
pub const MAX_SEARCH_CHARS: usize = 200;

// =============================================================================
// Validation Functions
// =============================================================================

/// Non-empty after trimming and within `MAX_NAME_CHARS`
pub fn check_name(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "must not be empty");
    } else if value.chars().count() > MAX_NAME_CHARS {
        errors.add(field, format!("must be at most {MAX_NAME_CHARS} characters"));
    }
}

/// Single `@` with a non-empty local part and a dotted domain
pub fn check_email(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.len() > MAX_EMAIL_BYTES {
        errors.add(field, "is too long");
        return;
    }
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        errors.add(field, "must be a valid email address");
    }
}

pub fn check_password(errors: &mut ValidationErrors, field: &str, value: &str) {
    if let Some(message) = password_policy_violation(value) {
        errors.add(field, message);
    }
}

pub fn check_description(errors: &mut ValidationErrors, field: &str, value: Option<&str>) {
    if let Some(desc) = value {
        if desc.len() > MAX_DESCRIPTION_BYTES {
            tracing::warn!(
                "Description exceeds limit: {} bytes (max: {})",
                desc.len(),
                MAX_DESCRIPTION_BYTES
            );
            errors.add(field, format!("must be at most {MAX_DESCRIPTION_BYTES} bytes"));
        }
    }
}

/// `0 <= min <= max`
pub fn check_price_range(errors: &mut ValidationErrors, min_cents: i64, max_cents: i64) {
    if min_cents < 0 {
        errors.add("unit_price_min_cents", "must not be negative");
    }
    if max_cents < min_cents {
        errors.add(
            "unit_price_max_cents",
            "must be greater than or equal to unit_price_min_cents",
        );
    }
}

/// Keys non-empty and unique, labels named, bounded count
pub fn check_parameters(errors: &mut ValidationErrors, field: &str, parameters: &[ItemParameter]) {
    if parameters.len() > MAX_PARAMETERS_PER_ITEM {
        errors.add(
            field,
            format!("must declare at most {MAX_PARAMETERS_PER_ITEM} parameters"),
        );
        return;
    }

    let mut keys = HashSet::new();
    for (i, param) in parameters.iter().enumerate() {
        let key = param.key.trim();
        if key.is_empty() {
            errors.add(format!("{field}[{i}].key"), "must not be empty");
        } else if !keys.insert(key) {
            errors.add(format!("{field}[{i}].key"), "must be unique within the item");
        }
        check_name(errors, &format!("{field}[{i}].label"), &param.label);
    }
}

/// Field path of an estimation failure within a response body
pub fn estimate_error_field(error: &EstimateError) -> String {
    let index = error.index();
    match error {
        EstimateError::UnknownItem { .. } | EstimateError::DuplicateItem { .. } => {
            format!("answers[{index}].item_id")
        }
        EstimateError::ZeroQuantity { .. } | EstimateError::Overflow { .. } => {
            format!("answers[{index}].quantity")
        }
        EstimateError::MissingParameter { key, .. }
        | EstimateError::UnknownParameter { key, .. } => {
            format!("answers[{index}].values.{key}")
        }
    }
}
