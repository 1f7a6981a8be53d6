// Session resolution
// Decision: A request is resolved to an identity by re-reading the user row on every call
// Decision: Missing, malformed, expired, or wrong-type tokens all resolve to Unauthenticated
// Decision: Only storage failures are errors; "not signed in" is a normal outcome

use anyhow::Result;
use atelier_core::Role;
use axum::http::{header, HeaderMap};
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use super::jwt::JwtService;
use crate::storage::{StorageBackend, UserRow};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// The signed-in user as persisted right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub two_factor_enabled: bool,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<UserRow> for Identity {
    fn from(row: UserRow) -> Self {
        let role = row.role();
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            role,
            two_factor_enabled: row.two_factor_enabled,
        }
    }
}

/// Why a request carries no usable session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthenticatedReason {
    NoCredentials,
    InvalidToken,
    /// Token was valid but its subject no longer exists
    UnknownUser,
    /// User has 2FA enabled and the token was minted before the second factor
    TwoFactorPending,
}

impl UnauthenticatedReason {
    /// Client-facing message
    pub fn message(self) -> &'static str {
        match self {
            Self::NoCredentials => "Authentication required",
            Self::InvalidToken | Self::UnknownUser => "Invalid or expired token",
            Self::TwoFactorPending => "Two-factor verification required",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResolution {
    Authenticated(Identity),
    Unauthenticated(UnauthenticatedReason),
}

impl SessionResolution {
    pub fn identity(self) -> Option<Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            Self::Unauthenticated(_) => None,
        }
    }
}

/// Pull the raw session credential out of the request headers.
/// The `Authorization: Bearer` header wins over the `access_token` cookie.
pub fn credential_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Resolve the request's session against current persisted state
pub async fn resolve(
    headers: &HeaderMap,
    jwt: &JwtService,
    db: &StorageBackend,
) -> Result<SessionResolution> {
    let Some(token) = credential_from_headers(headers) else {
        return Ok(SessionResolution::Unauthenticated(
            UnauthenticatedReason::NoCredentials,
        ));
    };

    resolve_token(&token, jwt, db).await
}

/// Resolve a raw access token
pub async fn resolve_token(
    token: &str,
    jwt: &JwtService,
    db: &StorageBackend,
) -> Result<SessionResolution> {
    let claims = match jwt.validate_access_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "Access token rejected");
            return Ok(SessionResolution::Unauthenticated(
                UnauthenticatedReason::InvalidToken,
            ));
        }
    };

    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        return Ok(SessionResolution::Unauthenticated(
            UnauthenticatedReason::InvalidToken,
        ));
    };

    let Some(row) = db.get_user(user_id).await? else {
        tracing::debug!(%user_id, "Access token subject no longer exists");
        return Ok(SessionResolution::Unauthenticated(
            UnauthenticatedReason::UnknownUser,
        ));
    };

    if row.two_factor_enabled && !claims.tfa {
        tracing::debug!(%user_id, "Access token lacks second factor");
        return Ok(SessionResolution::Unauthenticated(
            UnauthenticatedReason::TwoFactorPending,
        ));
    }

    Ok(SessionResolution::Authenticated(Identity::from(row)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::JwtConfig;
    use crate::storage::{CreateUserRow, UpdateUser};
    use axum::http::HeaderValue;

    fn jwt() -> JwtService {
        JwtService::new(JwtConfig {
            secret: "session-test-secret".to_string(),
            ..Default::default()
        })
    }

    async fn seed_user(db: &StorageBackend, email: &str) -> UserRow {
        db.create_user(CreateUserRow {
            email: email.to_string(),
            name: "Test".to_string(),
            password_hash: None,
            role: Role::User,
        })
        .await
        .unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_bearer_header_preferred_over_cookie() {
        let mut headers = bearer("from-header");
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("access_token=from-cookie"),
        );
        assert_eq!(
            credential_from_headers(&headers).as_deref(),
            Some("from-header")
        );

        headers.remove(header::AUTHORIZATION);
        assert_eq!(
            credential_from_headers(&headers).as_deref(),
            Some("from-cookie")
        );
    }

    #[test]
    fn test_non_bearer_authorization_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert!(credential_from_headers(&headers).is_none());
    }

    #[tokio::test]
    async fn test_no_credentials() {
        let db = StorageBackend::in_memory();
        let resolution = resolve(&HeaderMap::new(), &jwt(), &db).await.unwrap();
        assert_eq!(
            resolution,
            SessionResolution::Unauthenticated(UnauthenticatedReason::NoCredentials)
        );
    }

    #[tokio::test]
    async fn test_malformed_token_is_unauthenticated_not_error() {
        let db = StorageBackend::in_memory();
        let resolution = resolve(&bearer("not.a.jwt"), &jwt(), &db).await.unwrap();
        assert_eq!(
            resolution,
            SessionResolution::Unauthenticated(UnauthenticatedReason::InvalidToken)
        );
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_a_session() {
        let db = StorageBackend::in_memory();
        let user = seed_user(&db, "a@example.com").await;
        let jwt = jwt();
        let refresh = jwt.generate_refresh_token(user.id, false).unwrap();

        let resolution = resolve(&bearer(&refresh), &jwt, &db).await.unwrap();
        assert_eq!(
            resolution,
            SessionResolution::Unauthenticated(UnauthenticatedReason::InvalidToken)
        );
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let db = StorageBackend::in_memory();
        let jwt = jwt();
        let token = jwt
            .generate_access_token(Uuid::now_v7(), "ghost@example.com", false)
            .unwrap();

        let resolution = resolve(&bearer(&token), &jwt, &db).await.unwrap();
        assert_eq!(
            resolution,
            SessionResolution::Unauthenticated(UnauthenticatedReason::UnknownUser)
        );
    }

    #[tokio::test]
    async fn test_role_is_read_from_storage_each_time() {
        let db = StorageBackend::in_memory();
        let user = seed_user(&db, "a@example.com").await;
        let jwt = jwt();
        let token = jwt.generate_access_token(user.id, &user.email, false).unwrap();

        let first = resolve(&bearer(&token), &jwt, &db).await.unwrap().identity().unwrap();
        assert!(!first.is_admin());

        db.update_user(
            user.id,
            UpdateUser {
                role: Some(Role::Admin),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let second = resolve(&bearer(&token), &jwt, &db).await.unwrap().identity().unwrap();
        assert!(second.is_admin());
    }

    #[tokio::test]
    async fn test_two_factor_pending() {
        let db = StorageBackend::in_memory();
        let user = seed_user(&db, "a@example.com").await;
        db.update_user(
            user.id,
            UpdateUser {
                two_factor_enabled: Some(true),
                two_factor_secret: Some(Some("00".repeat(20))),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let jwt = jwt();

        let without = jwt.generate_access_token(user.id, &user.email, false).unwrap();
        assert_eq!(
            resolve(&bearer(&without), &jwt, &db).await.unwrap(),
            SessionResolution::Unauthenticated(UnauthenticatedReason::TwoFactorPending)
        );

        let with = jwt.generate_access_token(user.id, &user.email, true).unwrap();
        assert!(resolve(&bearer(&with), &jwt, &db).await.unwrap().identity().is_some());
    }
}
