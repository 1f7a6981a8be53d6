// OpenAPI specification generation
//
// This module defines the OpenAPI spec for the Atelier API.
// It is served by the API server (Swagger UI) and printed by the
// export-openapi binary for static documentation builds.

use crate::api;
use crate::api::ListResponse;
use crate::auth::routes as auth_routes;
use crate::error::{ErrorResponse, FieldError};
use atelier_core::{
    ItemAnswer, ItemParameter, PriceRange, QuoteItem, QuoteResponse, QuoteTemplate, Role, User,
};
use utoipa::OpenApi;

/// OpenAPI documentation for the Atelier API
#[derive(OpenApi)]
#[openapi(
    paths(
        api::quotes::create_template,
        api::quotes::list_templates,
        api::quotes::get_template,
        api::quotes::update_template,
        api::quotes::delete_template,
        api::quotes::create_item,
        api::quotes::update_item,
        api::quotes::delete_item,
        api::quotes::create_response,
        api::quotes::list_responses,
        api::quotes::get_response,
        api::quotes::delete_response,
        api::users::update_me,
        api::users::list_users,
        api::users::admin_update_user,
        api::admin::get_stats,
    ),
    components(
        schemas(
            // Quote types
            QuoteTemplate, QuoteItem, QuoteResponse, ItemParameter, ItemAnswer, PriceRange,
            api::quotes::CreateQuoteTemplateRequest, api::quotes::UpdateQuoteTemplateRequest,
            api::quotes::CreateQuoteItemRequest, api::quotes::UpdateQuoteItemRequest,
            api::quotes::CreateQuoteResponseRequest,
            ListResponse<QuoteTemplate>,
            ListResponse<QuoteResponse>,
            // Users
            User, Role,
            api::users::ListUsersQuery,
            api::users::UpdateProfileRequest,
            api::users::AdminUpdateUserRequest,
            ListResponse<User>,
            api::admin::AdminStats,
            // Auth payloads
            auth_routes::LoginRequest, auth_routes::RegisterRequest,
            auth_routes::TokenResponse, auth_routes::TwoFactorChallengeResponse,
            auth_routes::VerifyTwoFactorRequest, auth_routes::TwoFactorCodeRequest,
            auth_routes::TwoFactorSetupResponse, auth_routes::RefreshTokenRequest,
            auth_routes::UserInfoResponse, auth_routes::AuthConfigResponse,
            // Errors
            ErrorResponse, FieldError,
        )
    ),
    tags(
        (name = "quotes", description = "Quote templates, items, and responses"),
        (name = "users", description = "Own profile endpoints"),
        (name = "admin", description = "Administrator endpoints")
    ),
    info(
        title = "Atelier API",
        version = "0.1.0",
        description = "API for quote templates with per-user ownership and administrator oversight",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI spec as a pretty-printed JSON string
    pub fn to_json() -> serde_json::Result<String> {
        Self::openapi().to_pretty_json()
    }
}
