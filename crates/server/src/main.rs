// Atelier API server
// Decision: Storage is chosen at startup; DATABASE_URL selects PostgreSQL, otherwise in-memory
// Decision: Health stays outside API_PREFIX so load balancers need no configuration

use anyhow::{Context, Result};
use atelier_server::auth::{self, AuthConfig, AuthState};
use atelier_server::config::ServerConfig;
use atelier_server::openapi::ApiDoc;
use atelier_server::storage::StorageBackend;
use atelier_server::telemetry::{init_telemetry, TelemetryConfig};
use axum::http::{header, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Configure via environment variables:
    // - SERVICE_NAME: Service name (default: "atelier-server")
    // - RUST_LOG: Log filter (default: "atelier_server=debug,tower_http=debug")
    let mut telemetry_config = TelemetryConfig::from_env();
    telemetry_config.service_version = Some(env!("CARGO_PKG_VERSION").to_string());
    init_telemetry(telemetry_config);

    tracing::info!("atelier-server starting...");

    let config = ServerConfig::from_env();

    let db = match &config.database_url {
        Some(url) => {
            let db = StorageBackend::postgres(url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");
            db
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage (data is lost on restart)");
            StorageBackend::in_memory()
        }
    };

    let auth_config = AuthConfig::from_env();
    tracing::info!(
        signup_enabled = auth_config.signup_enabled(),
        cookie_secure = auth_config.cookie_secure,
        admin_seed = auth_config.admin.is_some(),
        "Authentication configured"
    );

    let auth_state = AuthState::new(auth_config, db);
    auth::ensure_admin_user(&auth_state)
        .await
        .context("Failed to seed admin user")?;

    if !config.api_prefix.is_empty() {
        tracing::info!(prefix = %config.api_prefix, "API prefix configured");
    }

    let app = atelier_server::build_app(auth_state, &config.api_prefix)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    // Add CORS layer only if origins are configured
    let app = if config.cors_allowed_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
        app
    } else {
        tracing::info!(origins = ?config.cors_allowed_origins, "CORS origins configured");
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(config.cors_allowed_origins.clone()))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    header::ACCEPT,
                    header::ORIGIN,
                    header::CACHE_CONTROL,
                ])
                .allow_credentials(true),
        )
    };

    let app = app.layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
