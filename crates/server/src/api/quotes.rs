// Quote building HTTP routes: templates, items, responses
// Decision: Every ownership-scoped route takes an `Owned<_>` guard; handlers never compare ids themselves
// Decision: Templates are shareable forms: any signed-in user may read one and submit a response

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use atelier_core::{ItemAnswer, ItemParameter, QuoteItem, QuoteResponse, QuoteTemplate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::ListResponse;
use super::extract::{ApiJson, ApiPath};
use crate::auth::gate;
use crate::auth::middleware::{AuthState, AuthUser, FromRef, Owned, OwnedResource};
use crate::error::{ApiError, ErrorResponse};
use crate::services::QuoteService;
use crate::storage::{QuoteItemRow, QuoteResponseRow, QuoteTemplateRow, StorageBackend};

/// Request to create a quote template
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateQuoteTemplateRequest {
    /// Display name of the template.
    #[schema(example = "Wedding photography")]
    pub name: String,
    /// Optional longer description shown to requesters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request to update a template. Only provided fields are updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateQuoteTemplateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request to add a priced item to a template
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateQuoteItemRequest {
    #[schema(example = "Prints")]
    pub label: String,
    /// Parameters requesters fill in for this item.
    #[serde(default)]
    pub parameters: Vec<ItemParameter>,
    /// Lower bound of the unit price, in cents.
    #[schema(example = 1500)]
    pub unit_price_min_cents: i64,
    /// Upper bound of the unit price, in cents.
    #[schema(example = 2500)]
    pub unit_price_max_cents: i64,
    /// Sort position. Appended to the end when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
}

/// Request to update an item. Only provided fields are updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateQuoteItemRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Replaces the item's parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ItemParameter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price_min_cents: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price_max_cents: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
}

/// Request to answer a template
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateQuoteResponseRequest {
    /// One answer per item being requested.
    pub answers: Vec<ItemAnswer>,
}

// ============================================
// Ownership guards
// ============================================

#[async_trait::async_trait]
impl OwnedResource for QuoteTemplateRow {
    const KIND: &'static str = "Quote template";

    async fn find(db: &StorageBackend, id: Uuid) -> anyhow::Result<Option<Self>> {
        db.get_quote_template(id).await
    }

    fn owner_ids(&self) -> Vec<Uuid> {
        vec![self.owner_id]
    }
}

#[async_trait::async_trait]
impl OwnedResource for QuoteItemRow {
    const KIND: &'static str = "Quote item";

    async fn find(db: &StorageBackend, id: Uuid) -> anyhow::Result<Option<Self>> {
        db.get_quote_item(id).await
    }

    /// Items belong to whoever owns their template
    fn owner_ids(&self) -> Vec<Uuid> {
        vec![self.owner_id]
    }
}

#[async_trait::async_trait]
impl OwnedResource for QuoteResponseRow {
    const KIND: &'static str = "Quote response";

    async fn find(db: &StorageBackend, id: Uuid) -> anyhow::Result<Option<Self>> {
        db.get_quote_response(id).await
    }

    /// The author of the response and the owner of the answered template
    fn owner_ids(&self) -> Vec<Uuid> {
        vec![self.owner_id, self.template_owner_id]
    }
}

/// App state for quote routes
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QuoteService>,
    pub auth: AuthState,
}

impl AppState {
    pub fn new(auth: AuthState) -> Self {
        Self {
            service: Arc::new(QuoteService::new(auth.db.clone())),
            auth,
        }
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(input: &AppState) -> Self {
        input.auth.clone()
    }
}

/// Create quote routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/quote-templates",
            post(create_template).get(list_templates),
        )
        .route(
            "/v1/quote-templates/:id",
            get(get_template)
                .patch(update_template)
                .delete(delete_template),
        )
        .route("/v1/quote-templates/:id/items", post(create_item))
        .route(
            "/v1/quote-templates/:id/responses",
            post(create_response).get(list_responses),
        )
        .route(
            "/v1/quote-items/:id",
            patch(update_item).delete(delete_item),
        )
        .route(
            "/v1/quote-responses/:id",
            get(get_response).delete(delete_response),
        )
        .with_state(state)
}

// ============================================
// Templates
// ============================================

/// POST /v1/quote-templates - Create a template owned by the caller
#[utoipa::path(
    post,
    path = "/v1/quote-templates",
    request_body = CreateQuoteTemplateRequest,
    responses(
        (status = 201, description = "Template created", body = QuoteTemplate),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn create_template(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateQuoteTemplateRequest>,
) -> Result<(StatusCode, Json<QuoteTemplate>), ApiError> {
    let template = state.service.create_template(user.id, req).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

/// GET /v1/quote-templates - List the caller's templates (all templates for admins)
#[utoipa::path(
    get,
    path = "/v1/quote-templates",
    responses(
        (status = 200, description = "Templates", body = ListResponse<QuoteTemplate>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn list_templates(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ListResponse<QuoteTemplate>>, ApiError> {
    let owner_filter = if gate::is_admin(&user) {
        None
    } else {
        Some(user.id)
    };
    let templates = state.service.list_templates(owner_filter).await?;
    Ok(Json(ListResponse::new(templates)))
}

/// GET /v1/quote-templates/{id} - Get a template with its items
#[utoipa::path(
    get,
    path = "/v1/quote-templates/{id}",
    params(("id" = Uuid, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Template found", body = QuoteTemplate),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn get_template(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<QuoteTemplate>, ApiError> {
    let template = state
        .service
        .get_template(id)
        .await?
        .ok_or(ApiError::NotFound("Quote template"))?;
    Ok(Json(template))
}

/// PATCH /v1/quote-templates/{id} - Update a template
#[utoipa::path(
    patch,
    path = "/v1/quote-templates/{id}",
    params(("id" = Uuid, Path, description = "Template ID")),
    request_body = UpdateQuoteTemplateRequest,
    responses(
        (status = 200, description = "Template updated", body = QuoteTemplate),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn update_template(
    State(state): State<AppState>,
    owned: Owned<QuoteTemplateRow>,
    ApiJson(req): ApiJson<UpdateQuoteTemplateRequest>,
) -> Result<Json<QuoteTemplate>, ApiError> {
    let template = state.service.update_template(owned.resource, req).await?;
    Ok(Json(template))
}

/// DELETE /v1/quote-templates/{id} - Delete a template with its items and responses
#[utoipa::path(
    delete,
    path = "/v1/quote-templates/{id}",
    params(("id" = Uuid, Path, description = "Template ID")),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn delete_template(
    State(state): State<AppState>,
    owned: Owned<QuoteTemplateRow>,
) -> Result<StatusCode, ApiError> {
    if state.service.delete_template(owned.resource.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Quote template"))
    }
}

// ============================================
// Items
// ============================================

/// POST /v1/quote-templates/{id}/items - Add an item to a template
#[utoipa::path(
    post,
    path = "/v1/quote-templates/{id}/items",
    params(("id" = Uuid, Path, description = "Template ID")),
    request_body = CreateQuoteItemRequest,
    responses(
        (status = 201, description = "Item created", body = QuoteItem),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Not the template owner", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn create_item(
    State(state): State<AppState>,
    owned: Owned<QuoteTemplateRow>,
    ApiJson(req): ApiJson<CreateQuoteItemRequest>,
) -> Result<(StatusCode, Json<QuoteItem>), ApiError> {
    let item = state.service.add_item(owned.resource, req).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /v1/quote-items/{id} - Update an item
#[utoipa::path(
    patch,
    path = "/v1/quote-items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    request_body = UpdateQuoteItemRequest,
    responses(
        (status = 200, description = "Item updated", body = QuoteItem),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Not the template owner", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn update_item(
    State(state): State<AppState>,
    owned: Owned<QuoteItemRow>,
    ApiJson(req): ApiJson<UpdateQuoteItemRequest>,
) -> Result<Json<QuoteItem>, ApiError> {
    let item = state.service.update_item(owned.resource, req).await?;
    Ok(Json(item))
}

/// DELETE /v1/quote-items/{id} - Remove an item
#[utoipa::path(
    delete,
    path = "/v1/quote-items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Not the template owner", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    owned: Owned<QuoteItemRow>,
) -> Result<StatusCode, ApiError> {
    if state.service.delete_item(owned.resource.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Quote item"))
    }
}

// ============================================
// Responses
// ============================================

/// POST /v1/quote-templates/{id}/responses - Answer a template and get an estimate
#[utoipa::path(
    post,
    path = "/v1/quote-templates/{id}/responses",
    params(("id" = Uuid, Path, description = "Template ID")),
    request_body = CreateQuoteResponseRequest,
    responses(
        (status = 201, description = "Response stored with its estimate", body = QuoteResponse),
        (status = 400, description = "Answers do not fit the template", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn create_response(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(template_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CreateQuoteResponseRequest>,
) -> Result<(StatusCode, Json<QuoteResponse>), ApiError> {
    let response = state
        .service
        .submit_response(template_id, user.id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /v1/quote-templates/{id}/responses - Responses received by a template
#[utoipa::path(
    get,
    path = "/v1/quote-templates/{id}/responses",
    params(("id" = Uuid, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Responses", body = ListResponse<QuoteResponse>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Not the template owner", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn list_responses(
    State(state): State<AppState>,
    owned: Owned<QuoteTemplateRow>,
) -> Result<Json<ListResponse<QuoteResponse>>, ApiError> {
    let responses = state.service.list_responses(owned.resource.id).await?;
    Ok(Json(ListResponse::new(responses)))
}

/// GET /v1/quote-responses/{id} - Get one response
#[utoipa::path(
    get,
    path = "/v1/quote-responses/{id}",
    params(("id" = Uuid, Path, description = "Response ID")),
    responses(
        (status = 200, description = "Response found", body = QuoteResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Neither author nor template owner", body = ErrorResponse),
        (status = 404, description = "Response not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn get_response(owned: Owned<QuoteResponseRow>) -> Result<Json<QuoteResponse>, ApiError> {
    let response = QuoteResponse::try_from(owned.resource)?;
    Ok(Json(response))
}

/// DELETE /v1/quote-responses/{id} - Delete a response
#[utoipa::path(
    delete,
    path = "/v1/quote-responses/{id}",
    params(("id" = Uuid, Path, description = "Response ID")),
    responses(
        (status = 204, description = "Response deleted"),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Neither author nor template owner", body = ErrorResponse),
        (status = 404, description = "Response not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn delete_response(
    State(state): State<AppState>,
    owned: Owned<QuoteResponseRow>,
) -> Result<StatusCode, ApiError> {
    if state.service.delete_response(owned.resource.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Quote response"))
    }
}
