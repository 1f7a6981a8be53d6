// Authentication configuration loaded from environment variables.
// Decision: AUTH_ prefix for all auth config
// Decision: Authentication is always on; there is no anonymous mode

use std::time::Duration;

/// Bootstrap admin credentials, seeded on startup when absent
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWTs
    pub secret: String,
    /// Access token lifetime
    pub access_token_lifetime: Duration,
    /// Refresh token lifetime
    pub refresh_token_lifetime: Duration,
    /// Lifetime of the token handed out between password and second factor
    pub challenge_token_lifetime: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_token_lifetime: Duration::from_secs(15 * 60), // 15 minutes
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 60 * 60), // 30 days
            challenge_token_lifetime: Duration::from_secs(5 * 60), // 5 minutes
        }
    }
}

/// Complete authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT configuration
    pub jwt: JwtConfig,
    /// Admin user seeded on startup
    pub admin: Option<AdminConfig>,
    /// Whether to disable signup (registration)
    pub disable_signup: bool,
    /// Whether session cookies carry the Secure attribute
    pub cookie_secure: bool,
    /// Issuer shown in authenticator apps
    pub totp_issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt: JwtConfig::default(),
            admin: None,
            disable_signup: false,
            cookie_secure: true,
            totp_issuer: "Atelier".to_string(),
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|s| s.eq_ignore_ascii_case("true") || s == "1")
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
}

impl AuthConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = JwtConfig::default();

        let secret = std::env::var("AUTH_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                // Tokens will not survive a restart, which is acceptable for local development
                use rand::Rng;
                tracing::warn!("AUTH_JWT_SECRET not set, generating an ephemeral signing key");
                let bytes: [u8; 32] = rand::thread_rng().gen();
                hex::encode(bytes)
            });

        let jwt = JwtConfig {
            secret,
            access_token_lifetime: env_secs("AUTH_JWT_ACCESS_TOKEN_LIFETIME")
                .unwrap_or(defaults.access_token_lifetime),
            refresh_token_lifetime: env_secs("AUTH_JWT_REFRESH_TOKEN_LIFETIME")
                .unwrap_or(defaults.refresh_token_lifetime),
            challenge_token_lifetime: env_secs("AUTH_TWO_FACTOR_CHALLENGE_LIFETIME")
                .unwrap_or(defaults.challenge_token_lifetime),
        };

        let admin = match (
            std::env::var("AUTH_ADMIN_EMAIL"),
            std::env::var("AUTH_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some(AdminConfig { email, password })
            }
            _ => None,
        };

        Self {
            jwt,
            admin,
            disable_signup: env_flag("AUTH_DISABLE_SIGNUP").unwrap_or(false),
            cookie_secure: env_flag("AUTH_COOKIE_SECURE").unwrap_or(true),
            totp_issuer: std::env::var("AUTH_TOTP_ISSUER")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Atelier".to_string()),
        }
    }

    pub fn signup_enabled(&self) -> bool {
        !self.disable_signup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert!(config.signup_enabled());
        assert!(config.cookie_secure);
        assert!(config.admin.is_none());
        assert_eq!(config.jwt.access_token_lifetime, Duration::from_secs(900));
        assert_eq!(config.jwt.challenge_token_lifetime, Duration::from_secs(300));
    }

    #[test]
    fn test_disable_signup() {
        let config = AuthConfig {
            disable_signup: true,
            ..Default::default()
        };
        assert!(!config.signup_enabled());
    }
}
