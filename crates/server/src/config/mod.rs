// Server configuration loaded from environment variables
// Decision: DATABASE_URL is optional; without it the server runs on in-memory storage
// Decision: CORS is off unless CORS_ALLOWED_ORIGINS lists origins

use axum::http::HeaderValue;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9000";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PostgreSQL connection string. `None` selects in-memory storage.
    pub database_url: Option<String>,
    /// HTTP listen address
    pub bind_addr: String,
    /// Prefix for API routes, e.g. "/api" gives /api/v1/quote-templates
    pub api_prefix: String,
    /// Origins allowed to make credentialed cross-origin requests
    pub cors_allowed_origins: Vec<HeaderValue>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            api_prefix: String::new(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `DATABASE_URL`: PostgreSQL URL (optional)
    /// - `BIND_ADDR`: Listen address (default: "0.0.0.0:9000")
    /// - `API_PREFIX`: Route prefix (default: none)
    /// - `CORS_ALLOWED_ORIGINS`: Comma-separated origin list (default: none)
    pub fn from_env() -> Self {
        Self {
            database_url: non_empty_var("DATABASE_URL"),
            bind_addr: non_empty_var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            api_prefix: normalize_prefix(&std::env::var("API_PREFIX").unwrap_or_default()),
            cors_allowed_origins: non_empty_var("CORS_ALLOWED_ORIGINS")
                .map(|s| parse_origins(&s))
                .unwrap_or_default(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

/// "api/" and "/api/" both become "/api"; "/" and "" become no prefix
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(origin) => Some(origin),
            Err(_) => {
                tracing::warn!(origin = %s, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert!(config.database_url.is_none());
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert!(config.api_prefix.is_empty());
        assert!(config.cors_allowed_origins.is_empty());
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("api"), "/api");
        assert_eq!(normalize_prefix("/api/"), "/api");
    }

    #[test]
    fn test_parse_origins_skips_blanks_and_invalid() {
        let origins = parse_origins("https://app.example.com, ,https://admin.example.com,bad\norigin");
        assert_eq!(
            origins,
            vec![
                HeaderValue::from_static("https://app.example.com"),
                HeaderValue::from_static("https://admin.example.com"),
            ]
        );
    }
}
