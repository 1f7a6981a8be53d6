// JWT token service for authentication
// Decision: Use HS256 algorithm for simplicity (symmetric key)
// Decision: Access tokens are short-lived, refresh tokens are stored hashed in DB
// Decision: Claims never carry the role; it is re-read from storage on every request

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use super::config::JwtConfig;

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";
const TWO_FACTOR: &str = "two_factor";

/// Generate a random identifier string (32 hex characters)
fn generate_random_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    hex::encode(bytes)
}

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// User email at issuance, informational only
    pub email: String,
    /// Token type
    pub token_type: String,
    /// Whether a second factor was presented before issuance
    #[serde(default)]
    pub tfa: bool,
    pub exp: i64,
    pub iat: i64,
}

/// JWT claims for refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub token_type: String,
    /// Carried over to the access tokens this refresh token mints
    #[serde(default)]
    pub tfa: bool,
    pub exp: i64,
    pub iat: i64,
    /// Unique token ID
    pub jti: String,
}

/// JWT claims for the short-lived token between password and second factor
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChallengeTokenClaims {
    pub sub: String,
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
}

trait TypedClaims {
    fn token_type(&self) -> &str;
}

impl TypedClaims for AccessTokenClaims {
    fn token_type(&self) -> &str {
        &self.token_type
    }
}

impl TypedClaims for RefreshTokenClaims {
    fn token_type(&self) -> &str {
        &self.token_type
    }
}

impl TypedClaims for ChallengeTokenClaims {
    fn token_type(&self) -> &str {
        &self.token_type
    }
}

/// Token pair returned after successful authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// JWT service for token generation and validation
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    fn window(&self, lifetime: std::time::Duration) -> Result<(i64, i64)> {
        let now = Utc::now();
        let exp = now + Duration::from_std(lifetime)?;
        Ok((now.timestamp(), exp.timestamp()))
    }

    /// Generate access token for a user
    pub fn generate_access_token(&self, user_id: Uuid, email: &str, tfa: bool) -> Result<String> {
        let (iat, exp) = self.window(self.config.access_token_lifetime)?;

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            token_type: ACCESS.to_string(),
            tfa,
            exp,
            iat,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .context("Failed to encode access token")
    }

    /// Generate refresh token for a user
    pub fn generate_refresh_token(&self, user_id: Uuid, tfa: bool) -> Result<String> {
        let (iat, exp) = self.window(self.config.refresh_token_lifetime)?;

        let claims = RefreshTokenClaims {
            sub: user_id.to_string(),
            token_type: REFRESH.to_string(),
            tfa,
            exp,
            iat,
            jti: generate_random_id(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .context("Failed to encode refresh token")
    }

    /// Generate the token a client trades, with a TOTP code, for a token pair
    pub fn generate_challenge_token(&self, user_id: Uuid) -> Result<String> {
        let (iat, exp) = self.window(self.config.challenge_token_lifetime)?;

        let claims = ChallengeTokenClaims {
            sub: user_id.to_string(),
            token_type: TWO_FACTOR.to_string(),
            exp,
            iat,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .context("Failed to encode challenge token")
    }

    /// Generate both access and refresh tokens
    pub fn generate_token_pair(&self, user_id: Uuid, email: &str, tfa: bool) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.generate_access_token(user_id, email, tfa)?,
            refresh_token: self.generate_refresh_token(user_id, tfa)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_lifetime_secs(),
        })
    }

    fn validate<C>(&self, token: &str, expected_type: &str) -> Result<C>
    where
        C: DeserializeOwned + TypedClaims,
    {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<C>(token, &self.decoding_key, &validation)
            .with_context(|| format!("Invalid {expected_type} token"))?;

        if token_data.claims.token_type() != expected_type {
            anyhow::bail!("Invalid token type");
        }

        Ok(token_data.claims)
    }

    /// Validate and decode an access token
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims> {
        self.validate(token, ACCESS)
    }

    /// Validate and decode a refresh token
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims> {
        self.validate(token, REFRESH)
    }

    /// Validate and decode a two-factor challenge token
    pub fn validate_challenge_token(&self, token: &str) -> Result<ChallengeTokenClaims> {
        self.validate(token, TWO_FACTOR)
    }

    pub fn access_token_lifetime_secs(&self) -> i64 {
        self.config.access_token_lifetime.as_secs() as i64
    }

    pub fn refresh_token_lifetime_secs(&self) -> i64 {
        self.config.refresh_token_lifetime.as_secs() as i64
    }
}

/// Hash a token for database storage (using SHA-256)
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(token.as_bytes());
    hex::encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-for-testing".to_string(),
            access_token_lifetime: StdDuration::from_secs(900),
            refresh_token_lifetime: StdDuration::from_secs(86400),
            challenge_token_lifetime: StdDuration::from_secs(300),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = JwtService::new(test_config());
        let user_id = Uuid::now_v7();
        let token = service
            .generate_access_token(user_id, "test@example.com", true)
            .unwrap();

        let claims = service.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.token_type, "access");
        assert!(claims.tfa);
    }

    #[test]
    fn test_access_token_carries_no_role() {
        let service = JwtService::new(test_config());
        let token = service
            .generate_access_token(Uuid::nil(), "test@example.com", false)
            .unwrap();
        let claims = service.validate_access_token(&token).unwrap();
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("role").is_none());
        assert!(json.get("roles").is_none());
    }

    #[test]
    fn test_token_pair() {
        let service = JwtService::new(test_config());
        let pair = service
            .generate_token_pair(Uuid::nil(), "test@example.com", false)
            .unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        let refresh = service.validate_refresh_token(&pair.refresh_token).unwrap();
        assert_eq!(refresh.jti.len(), 32);
        assert!(!refresh.tfa);
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let service = JwtService::new(test_config());
        let user_id = Uuid::nil();

        let refresh = service.generate_refresh_token(user_id, false).unwrap();
        let challenge = service.generate_challenge_token(user_id).unwrap();
        let access = service
            .generate_access_token(user_id, "a@example.com", false)
            .unwrap();

        assert!(service.validate_access_token(&refresh).is_err());
        assert!(service.validate_access_token(&challenge).is_err());
        assert!(service.validate_challenge_token(&access).is_err());
        assert!(service.validate_refresh_token(&challenge).is_err());
        assert!(service.validate_challenge_token(&challenge).is_ok());
    }

    #[test]
    fn test_invalid_and_foreign_tokens() {
        let service = JwtService::new(test_config());
        assert!(service.validate_access_token("invalid-token").is_err());

        let other = JwtService::new(JwtConfig {
            secret: "another-secret".to_string(),
            ..test_config()
        });
        let token = other
            .generate_access_token(Uuid::nil(), "a@example.com", false)
            .unwrap();
        assert!(service.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = JwtService::new(test_config());
        let past = Utc::now().timestamp() - 3600;
        let claims = AccessTokenClaims {
            sub: Uuid::nil().to_string(),
            email: "a@example.com".to_string(),
            token_type: "access".to_string(),
            tfa: false,
            exp: past,
            iat: past - 900,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret-key-for-testing"),
        )
        .unwrap();

        assert!(service.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_hash_token() {
        let hash1 = hash_token("test-token-123");
        let hash2 = hash_token("test-token-123");

        assert_eq!(hash1, hash2);
        assert!(hash1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, hash_token("test-token-124"));
    }
}
