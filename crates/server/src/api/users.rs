// Users API routes
// Decision: Profile updates go through /v1/users/me; member management lives under /v1/admin
// Decision: An admin cannot remove their own admin role

use crate::storage::{UpdateUser, UserRow};
use anyhow::Context;
use atelier_core::{Role, User};
use axum::{
    extract::{Query, State},
    routing::{get, patch},
    Json, Router,
};

use super::common::ListResponse;
use super::extract::{ApiJson, ApiPath};
use super::validation::{check_name, check_password, MAX_SEARCH_CHARS};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::middleware::{AdminUser, AuthState, AuthUser, FromRef};
use crate::auth::password::{hash_password, verify_password_or_dummy};
use crate::error::{ApiError, ErrorResponse, ValidationErrors};

/// App state for users routes
#[derive(Clone)]
pub struct UsersState {
    pub auth: AuthState,
}

impl FromRef<UsersState> for AuthState {
    fn from_ref(input: &UsersState) -> Self {
        input.auth.clone()
    }
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// Search query to filter by name or email
    #[serde(default)]
    pub search: Option<String>,
}

/// Update the caller's own profile
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New password. Requires `current_password`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_password: Option<String>,
}

/// Admin update of any account
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct AdminUpdateUserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Only `false` is accepted: admins may switch 2FA off for a locked-out user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub two_factor_enabled: Option<bool>,
}

/// Create users routes
pub fn routes(state: UsersState) -> Router {
    Router::new()
        .route("/v1/users/me", patch(update_me))
        .route("/v1/admin/users", get(list_users))
        .route("/v1/admin/users/:id", patch(admin_update_user))
        .with_state(state)
}

/// PATCH /v1/users/me - Update own name or password
#[utoipa::path(
    patch,
    path = "/v1/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn update_me(
    State(state): State<UsersState>,
    user: AuthUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<User>, ApiError> {
    let mut errors = ValidationErrors::new();
    if let Some(name) = &req.name {
        check_name(&mut errors, "name", name);
    }
    if let Some(password) = &req.password {
        check_password(&mut errors, "password", password);
        if req.current_password.is_none() {
            errors.add("current_password", "is required to change the password");
        }
    }
    errors.finish()?;

    let password_hash = match (&req.password, &req.current_password) {
        (Some(password), Some(current)) => {
            let row = load_user(&state.auth, user.id).await?;
            if !verify_password_or_dummy(current, row.password_hash.as_deref())? {
                return Err(ApiError::invalid("current_password", "is incorrect"));
            }
            Some(hash_password(password)?)
        }
        _ => None,
    };
    let password_changed = password_hash.is_some();

    let row = state
        .auth
        .db
        .update_user(
            user.id,
            UpdateUser {
                name: req.name.map(|n| n.trim().to_string()),
                password_hash,
                ..Default::default()
            },
        )
        .await
        .context("Failed to update profile")?
        .ok_or(ApiError::NotFound("User"))?;

    if password_changed {
        // Other devices must sign in again with the new password
        state
            .auth
            .db
            .delete_user_refresh_tokens(user.id)
            .await
            .context("Failed to revoke refresh tokens")?;
        tracing::info!(user_id = %user.id, "Password changed");
    }

    Ok(Json(User::from(row)))
}

/// GET /v1/admin/users - List all users
///
/// Lists all users in the system with optional search filtering.
#[utoipa::path(
    get,
    path = "/v1/admin/users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "List of users", body = ListResponse<User>),
        (status = 400, description = "Invalid search", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn list_users(
    State(state): State<UsersState>,
    _admin: AdminUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ListResponse<User>>, ApiError> {
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if search.is_some_and(|s| s.chars().count() > MAX_SEARCH_CHARS) {
        return Err(ApiError::invalid(
            "search",
            format!("must be at most {MAX_SEARCH_CHARS} characters"),
        ));
    }

    let rows = state
        .auth
        .db
        .list_users(search)
        .await
        .context("Failed to list users")?;

    let users: Vec<User> = rows.into_iter().map(User::from).collect();
    Ok(Json(ListResponse::new(users)))
}

/// PATCH /v1/admin/users/{id} - Change name, role, or 2FA state of any user
#[utoipa::path(
    patch,
    path = "/v1/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AdminUpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn admin_update_user(
    State(state): State<UsersState>,
    admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AdminUpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let mut errors = ValidationErrors::new();
    if let Some(name) = &req.name {
        check_name(&mut errors, "name", name);
    }
    if req.two_factor_enabled == Some(true) {
        errors.add(
            "two_factor_enabled",
            "can only be enabled by the account owner",
        );
    }
    if id == admin.id && req.role.is_some_and(|r| !r.is_admin()) {
        errors.add("role", "you cannot remove your own admin role");
    }
    errors.finish()?;

    // Existence is checked before anything is written
    load_user(&state.auth, id).await?;

    let disable_two_factor = req.two_factor_enabled == Some(false);
    let row = state
        .auth
        .db
        .update_user(
            id,
            UpdateUser {
                name: req.name.map(|n| n.trim().to_string()),
                role: req.role,
                two_factor_enabled: disable_two_factor.then_some(false),
                two_factor_secret: disable_two_factor.then_some(None),
                ..Default::default()
            },
        )
        .await
        .context("Failed to update user")?
        .ok_or(ApiError::NotFound("User"))?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %id,
        role = %row.role(),
        two_factor_enabled = row.two_factor_enabled,
        "User updated by admin"
    );

    Ok(Json(User::from(row)))
}

async fn load_user(auth: &AuthState, id: Uuid) -> Result<UserRow, ApiError> {
    auth.db
        .get_user(id)
        .await
        .context("Failed to load user")?
        .ok_or(ApiError::NotFound("User"))
}
