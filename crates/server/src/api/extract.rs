// Request extractors that answer with the API error body
// Decision: Body and path failures are input errors, so they answer 400 with `fields` like any other validation failure
// Decision: Every routed path has a single `:id` parameter, so an unnamed path failure is reported against `id`

use axum::extract::{
    path::ErrorKind,
    rejection::{JsonRejection, PathRejection},
    FromRequest, FromRequestParts,
};

use crate::error::ApiError;

/// JSON body extractor. Rejections become [`ApiError::Validation`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path extractor. Rejections become [`ApiError::Validation`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

const BODY_FIELD: &str = "body";
const DATA_ERROR_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                let text = err.body_text();
                let detail = text.strip_prefix(DATA_ERROR_PREFIX).unwrap_or(&text);
                let (field, message) = data_error_field(detail);
                ApiError::invalid(field, message)
            }
            JsonRejection::JsonSyntaxError(_) => ApiError::invalid(BODY_FIELD, "must be valid JSON"),
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::invalid(BODY_FIELD, "expected `Content-Type: application/json`")
            }
            other => ApiError::invalid(BODY_FIELD, other.body_text()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        let field = match &rejection {
            PathRejection::FailedToDeserializePathParams(err) => match err.kind() {
                ErrorKind::ParseErrorAtKey { key, .. } | ErrorKind::InvalidUtf8InPathParam { key } => {
                    key.clone()
                }
                _ => "id".to_string(),
            },
            _ => "id".to_string(),
        };
        ApiError::invalid(field, "must be a valid UUID")
    }
}

/// Splits a deserializer message into the offending field and what is wrong with it.
///
/// Messages look like `answers[0].quantity: invalid type: ... at line 1 column 9`
/// or `missing field `name` at line 1 column 2`.
fn data_error_field(detail: &str) -> (String, String) {
    let detail = strip_position(detail);

    let (path, message) = match detail.split_once(": ") {
        Some((path, rest)) if is_field_path(path) => (Some(path), rest),
        _ => (None, detail),
    };

    if let Some(name) = message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split_once('`'))
        .map(|(name, _)| name)
    {
        let field = match path {
            Some(path) => format!("{path}.{name}"),
            None => name.to_string(),
        };
        return (field, "is required".to_string());
    }

    let field = path.unwrap_or(BODY_FIELD).to_string();
    (field, message.to_string())
}

fn strip_position(detail: &str) -> &str {
    match detail.rfind(" at line ") {
        Some(idx) => &detail[..idx],
        None => detail,
    }
}

fn is_field_path(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']' | '?'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_top_level_field() {
        let (field, message) = data_error_field("missing field `name` at line 1 column 25");
        assert_eq!(field, "name");
        assert_eq!(message, "is required");
    }

    #[test]
    fn test_missing_nested_field() {
        let (field, _) = data_error_field("answers[0]: missing field `item_id` at line 1 column 30");
        assert_eq!(field, "answers[0].item_id");
    }

    #[test]
    fn test_wrong_type_keeps_path() {
        let (field, message) = data_error_field(
            "name: invalid type: integer `5`, expected a string at line 1 column 10",
        );
        assert_eq!(field, "name");
        assert_eq!(message, "invalid type: integer `5`, expected a string");
    }

    #[test]
    fn test_unattributed_error_falls_back_to_body() {
        let (field, message) =
            data_error_field("invalid type: integer `5`, expected struct Request at line 1 column 1");
        assert_eq!(field, "body");
        assert!(message.starts_with("invalid type"));
    }
}
