// Admin dashboard routes

use anyhow::Context;
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::users::UsersState;
use crate::auth::middleware::AdminUser;
use crate::error::{ApiError, ErrorResponse};

/// System-wide counters for the admin dashboard
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminStats {
    pub users: i64,
    pub admins: i64,
    pub quote_templates: i64,
    pub quote_responses: i64,
}

pub fn routes(state: UsersState) -> Router {
    Router::new()
        .route("/v1/admin/stats", get(get_stats))
        .with_state(state)
}

/// GET /v1/admin/stats - Dashboard counters
#[utoipa::path(
    get,
    path = "/v1/admin/stats",
    responses(
        (status = 200, description = "Counters", body = AdminStats),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn get_stats(
    State(state): State<UsersState>,
    _admin: AdminUser,
) -> Result<Json<AdminStats>, ApiError> {
    let stats = state
        .auth
        .db
        .stats()
        .await
        .context("Failed to compute admin stats")?;

    Ok(Json(AdminStats {
        users: stats.users,
        admins: stats.admins,
        quote_templates: stats.quote_templates,
        quote_responses: stats.quote_responses,
    }))
}
