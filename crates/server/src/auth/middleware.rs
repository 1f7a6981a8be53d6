// Authentication and authorization extractors
// Decision: Support both cookie-based (UI) and header-based (API) auth
// Decision: Every guard resolves the session first, so a missing session is always 401
// Decision: Ownership guards fetch only the row needed for the check, 404 before 403

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use std::ops::Deref;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    config::AuthConfig,
    gate::{self, Decision, Requirement},
    jwt::JwtService,
    session::{self, Identity, SessionResolution, UnauthenticatedReason},
};
use crate::api::extract::ApiPath;
use crate::error::ApiError;
use crate::storage::StorageBackend;

/// Auth state shared across routes
#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub jwt_service: Arc<JwtService>,
    pub db: StorageBackend,
}

impl AuthState {
    pub fn new(config: AuthConfig, db: StorageBackend) -> Self {
        let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));
        Self {
            config,
            jwt_service,
            db,
        }
    }

    /// Resolve the session carried by these request parts
    pub async fn resolve(&self, parts: &Parts) -> Result<SessionResolution, ApiError> {
        Ok(session::resolve(&parts.headers, &self.jwt_service, &self.db).await?)
    }
}

/// Helper trait for extracting AuthState from application state
pub trait FromRef<T> {
    fn from_ref(input: &T) -> Self;
}

impl FromRef<AuthState> for AuthState {
    fn from_ref(input: &AuthState) -> Self {
        input.clone()
    }
}

impl From<UnauthenticatedReason> for ApiError {
    fn from(reason: UnauthenticatedReason) -> Self {
        ApiError::unauthenticated(reason.message())
    }
}

/// Authenticated user extracted from the request.
/// Rejects with 401 when there is no usable session.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl Deref for AuthUser {
    type Target = Identity;

    fn deref(&self) -> &Identity {
        &self.0
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        match auth_state.resolve(parts).await? {
            SessionResolution::Authenticated(identity) => Ok(AuthUser(identity)),
            SessionResolution::Unauthenticated(reason) => Err(reason.into()),
        }
    }
}

/// Require admin role extractor. 401 without a session, 403 for non-admins.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl Deref for AdminUser {
    type Target = Identity;

    fn deref(&self) -> &Identity {
        &self.0 .0
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        match gate::decide(&user, Requirement::Admin) {
            Decision::Allow => Ok(AdminUser(user)),
            Decision::Deny(reason) => {
                tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Admin route denied");
                Err(ApiError::forbidden(reason.message()))
            }
        }
    }
}

// ============================================
// Ownership-scoped resources
// ============================================

/// A stored resource whose access is limited to its owners and admins.
#[async_trait::async_trait]
pub trait OwnedResource: Sized + Send {
    /// Human-readable kind, used in 404 messages
    const KIND: &'static str;

    /// Load just enough of the resource to decide ownership
    async fn find(db: &StorageBackend, id: Uuid) -> anyhow::Result<Option<Self>>;

    /// Users that count as owners of this resource
    fn owner_ids(&self) -> Vec<Uuid>;
}

/// Extractor for `/<collection>/:id` routes guarded by ownership.
///
/// Order of checks:
/// 1. session (401)
/// 2. path id (400)
/// 3. resource exists (404)
/// 4. caller owns it or is admin (403)
#[derive(Debug, Clone)]
pub struct Owned<R> {
    pub user: AuthUser,
    pub resource: R,
}

#[axum::async_trait]
impl<S, R> FromRequestParts<S> for Owned<R>
where
    S: Send + Sync,
    AuthState: FromRef<S>,
    R: OwnedResource + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        let ApiPath(id) = ApiPath::<Uuid>::from_request_parts(parts, state).await?;

        let auth_state = AuthState::from_ref(state);
        let resource = R::find(&auth_state.db, id)
            .await?
            .ok_or(ApiError::NotFound(R::KIND))?;

        let owners = resource.owner_ids();
        match gate::decide(&user, Requirement::OwnerOrAdmin(&owners)) {
            Decision::Allow => Ok(Owned { user, resource }),
            Decision::Deny(reason) => {
                tracing::warn!(
                    user_id = %user.id,
                    resource = R::KIND,
                    resource_id = %id,
                    "Ownership check denied"
                );
                Err(ApiError::forbidden(reason.message()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CreateUserRow;
    use atelier_core::Role;
    use axum::http::{header, Request, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    static FIND_CALLS: AtomicUsize = AtomicUsize::new(0);

    struct Widget;

    #[async_trait::async_trait]
    impl OwnedResource for Widget {
        const KIND: &'static str = "Widget";

        async fn find(_db: &StorageBackend, _id: Uuid) -> anyhow::Result<Option<Self>> {
            FIND_CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Widget))
        }

        fn owner_ids(&self) -> Vec<Uuid> {
            Vec::new()
        }
    }

    fn state() -> AuthState {
        let mut config = AuthConfig::default();
        config.jwt.secret = "middleware-test-secret".to_string();
        AuthState::new(config, StorageBackend::in_memory())
    }

    fn parts(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/v1/widgets/not-routed");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    async fn token_for(state: &AuthState, role: Role) -> String {
        let user = state
            .db
            .create_user(CreateUserRow {
                email: format!("{}@example.com", Uuid::now_v7()),
                name: "Test".to_string(),
                password_hash: None,
                role,
            })
            .await
            .unwrap();
        state
            .jwt_service
            .generate_access_token(user.id, &user.email, false)
            .unwrap()
    }

    #[tokio::test]
    async fn test_owned_guard_rejects_before_lookup() {
        let state = state();
        let before = FIND_CALLS.load(Ordering::SeqCst);

        let Err(err) = Owned::<Widget>::from_request_parts(&mut parts(None), &state).await else {
            panic!("expected rejection");
        };
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        // Authenticated but the path id cannot be parsed: still no lookup
        let token = token_for(&state, Role::User).await;
        let Err(err) = Owned::<Widget>::from_request_parts(&mut parts(Some(&token)), &state).await
        else {
            panic!("expected rejection");
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        assert_eq!(FIND_CALLS.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_auth_user_requires_session() {
        let state = state();
        let err = AuthUser::from_request_parts(&mut parts(None), &state)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err = AuthUser::from_request_parts(&mut parts(Some("garbage")), &state)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_user_guard() {
        let state = state();

        let user_token = token_for(&state, Role::User).await;
        let err = AdminUser::from_request_parts(&mut parts(Some(&user_token)), &state)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let admin_token = token_for(&state, Role::Admin).await;
        let admin = AdminUser::from_request_parts(&mut parts(Some(&admin_token)), &state)
            .await
            .unwrap();
        assert!(admin.is_admin());
    }
}
