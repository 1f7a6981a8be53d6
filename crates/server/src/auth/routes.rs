// Authentication HTTP routes
// Decision: Use /v1/auth/* prefix for all auth endpoints (consistent with other API routes)
// Decision: Support both JSON and cookie-based sessions
// Decision: Login failures share one message so callers cannot enumerate accounts

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    jwt::hash_token,
    middleware::{AuthState, AuthUser},
    password::{hash_password, verify_password_or_dummy},
    session::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
    totp,
};
use crate::api::extract::ApiJson;
use crate::api::validation::{check_email, check_name, check_password};
use crate::error::{ApiError, ValidationErrors};
use crate::storage::{CreateRefreshTokenRow, CreateUserRow, UpdateUser, UserRow};
use anyhow::Context;
use atelier_core::Role;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_CODE: &str = "Invalid verification code";

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Register request
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Token response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Answer to a password login for an account with 2FA enabled
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TwoFactorChallengeResponse {
    pub two_factor_required: bool,
    /// Trade this, with a TOTP code, at `/v1/auth/2fa/verify`
    pub challenge_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum LoginResponse {
    Tokens(TokenResponse),
    TwoFactor(TwoFactorChallengeResponse),
}

/// Second step of a 2FA login
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyTwoFactorRequest {
    pub challenge_token: String,
    pub code: String,
}

/// A TOTP code confirming possession of the authenticator
#[derive(Debug, Deserialize, ToSchema)]
pub struct TwoFactorCodeRequest {
    pub code: String,
}

/// Pending 2FA secret, shown once
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TwoFactorSetupResponse {
    /// Base32 secret for manual entry
    pub secret: String,
    /// `otpauth://` URI for QR codes
    pub otpauth_uri: String,
}

/// Refresh token request. The `refresh_token` cookie is used when absent.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Current user info
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserInfoResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub two_factor_enabled: bool,
}

/// Auth configuration response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthConfigResponse {
    pub password_auth_enabled: bool,
    pub signup_enabled: bool,
    pub two_factor_supported: bool,
}

/// Create auth routes
pub fn routes(state: AuthState) -> Router {
    Router::new()
        // Public routes
        .route("/v1/auth/config", get(get_auth_config))
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/2fa/verify", post(verify_two_factor))
        .route("/v1/auth/refresh", post(refresh_token))
        .route("/v1/auth/logout", post(logout))
        // Protected routes
        .route("/v1/auth/me", get(get_current_user))
        .route("/v1/auth/2fa/setup", post(setup_two_factor))
        .route("/v1/auth/2fa/enable", post(enable_two_factor))
        .route("/v1/auth/2fa/disable", post(disable_two_factor))
        .with_state(state)
}

/// GET /v1/auth/config - Get authentication configuration
pub async fn get_auth_config(State(state): State<AuthState>) -> Json<AuthConfigResponse> {
    Json(AuthConfigResponse {
        password_auth_enabled: true,
        signup_enabled: state.config.signup_enabled(),
        two_factor_supported: true,
    })
}

/// POST /v1/auth/login - Login with email and password
pub async fn login(
    State(state): State<AuthState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let user = state
        .db
        .get_user_by_email(&req.email.trim().to_lowercase())
        .await
        .context("Failed to look up user during login")?;

    let valid = verify_password_or_dummy(
        &req.password,
        user.as_ref().and_then(|u| u.password_hash.as_deref()),
    )?;

    let user = match user {
        Some(user) if valid => user,
        _ => {
            tracing::debug!("Login rejected");
            return Err(ApiError::unauthenticated(INVALID_CREDENTIALS));
        }
    };

    if user.two_factor_enabled {
        let challenge_token = state.jwt_service.generate_challenge_token(user.id)?;
        tracing::info!(user_id = %user.id, "Password accepted, awaiting second factor");
        return Ok((
            jar,
            Json(LoginResponse::TwoFactor(TwoFactorChallengeResponse {
                two_factor_required: true,
                challenge_token,
            })),
        ));
    }

    let (jar, tokens) = issue_session(&state, jar, &user, false).await?;
    tracing::info!(user_id = %user.id, "User logged in");
    Ok((jar, Json(LoginResponse::Tokens(tokens))))
}

/// POST /v1/auth/register - Register a new user
pub async fn register(
    State(state): State<AuthState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<TokenResponse>), ApiError> {
    if !state.config.signup_enabled() {
        return Err(ApiError::forbidden("Registration is disabled"));
    }

    let email = req.email.trim().to_lowercase();

    let mut errors = ValidationErrors::new();
    check_email(&mut errors, "email", &email);
    check_name(&mut errors, "name", &req.name);
    check_password(&mut errors, "password", &req.password);
    errors.finish()?;

    let existing = state
        .db
        .get_user_by_email(&email)
        .await
        .context("Failed to check for existing user")?;
    if existing.is_some() {
        return Err(ApiError::invalid("email", "is already registered"));
    }

    let password_hash = hash_password(&req.password)?;

    let user = state
        .db
        .create_user(CreateUserRow {
            email,
            name: req.name.trim().to_string(),
            password_hash: Some(password_hash),
            role: Role::User,
        })
        .await
        .context("Failed to create user")?;

    tracing::info!(user_id = %user.id, "User registered");

    let (jar, tokens) = issue_session(&state, jar, &user, false).await?;
    Ok((StatusCode::CREATED, jar, Json(tokens)))
}

/// POST /v1/auth/2fa/verify - Trade a challenge token and TOTP code for a session
pub async fn verify_two_factor(
    State(state): State<AuthState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<VerifyTwoFactorRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    let claims = state
        .jwt_service
        .validate_challenge_token(&req.challenge_token)
        .map_err(|_| ApiError::unauthenticated("Invalid or expired challenge"))?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthenticated("Invalid or expired challenge"))?;

    let user = state
        .db
        .get_user(user_id)
        .await
        .context("Failed to load user for 2FA verification")?
        .ok_or_else(|| ApiError::unauthenticated("Invalid or expired challenge"))?;

    if !user.two_factor_enabled || !accept_code(&state, &user, &req.code).await? {
        tracing::warn!(user_id = %user.id, "Second factor rejected");
        return Err(ApiError::unauthenticated(INVALID_CODE));
    }

    let (jar, tokens) = issue_session(&state, jar, &user, true).await?;
    tracing::info!(user_id = %user.id, "User logged in with second factor");
    Ok((jar, Json(tokens)))
}

/// POST /v1/auth/refresh - Rotate a refresh token
pub async fn refresh_token(
    State(state): State<AuthState>,
    jar: CookieJar,
    body: Option<Json<RefreshTokenRequest>>,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    let presented = body
        .and_then(|Json(req)| req.refresh_token)
        .or_else(|| jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| ApiError::unauthenticated("Refresh token required"))?;

    let claims = state
        .jwt_service
        .validate_refresh_token(&presented)
        .map_err(|_| ApiError::unauthenticated("Invalid refresh token"))?;

    // Rotation: the presented token is single-use. Only one concurrent caller can take it.
    let token_row = state
        .db
        .take_refresh_token(&hash_token(&presented))
        .await
        .context("Failed to redeem refresh token")?
        .ok_or_else(|| ApiError::unauthenticated("Invalid refresh token"))?;

    if token_row.expires_at < Utc::now() {
        return Err(ApiError::unauthenticated("Refresh token expired"));
    }

    let user = state
        .db
        .get_user(token_row.user_id)
        .await
        .context("Failed to load user during refresh")?
        .filter(|user| user.id.to_string() == claims.sub)
        .ok_or_else(|| ApiError::unauthenticated("Invalid refresh token"))?;

    if user.two_factor_enabled && !claims.tfa {
        return Err(ApiError::unauthenticated("Two-factor verification required"));
    }

    let (jar, tokens) = issue_session(&state, jar, &user, claims.tfa).await?;
    Ok((jar, Json(tokens)))
}

/// POST /v1/auth/logout - Revoke the refresh token and clear cookies
pub async fn logout(
    State(state): State<AuthState>,
    jar: CookieJar,
) -> Result<(StatusCode, CookieJar), ApiError> {
    if let Some(cookie) = jar.get(REFRESH_TOKEN_COOKIE) {
        state
            .db
            .take_refresh_token(&hash_token(cookie.value()))
            .await
            .context("Failed to revoke refresh token")?;
    }

    let jar = jar
        .remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_TOKEN_COOKIE).path("/"));
    Ok((StatusCode::NO_CONTENT, jar))
}

/// GET /v1/auth/me - Get current user info
pub async fn get_current_user(user: AuthUser) -> Json<UserInfoResponse> {
    let AuthUser(identity) = user;
    Json(UserInfoResponse {
        id: identity.id,
        email: identity.email,
        name: identity.name,
        role: identity.role,
        two_factor_enabled: identity.two_factor_enabled,
    })
}

/// POST /v1/auth/2fa/setup - Generate a pending TOTP secret
pub async fn setup_two_factor(
    State(state): State<AuthState>,
    user: AuthUser,
) -> Result<Json<TwoFactorSetupResponse>, ApiError> {
    if user.two_factor_enabled {
        return Err(ApiError::invalid("two_factor", "is already enabled"));
    }

    let secret = totp::generate_secret();
    state
        .db
        .update_user(
            user.id,
            UpdateUser {
                two_factor_secret: Some(Some(hex::encode(&secret))),
                ..Default::default()
            },
        )
        .await
        .context("Failed to store pending 2FA secret")?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(TwoFactorSetupResponse {
        secret: totp::base32_encode(&secret),
        otpauth_uri: totp::provisioning_uri(&state.config.totp_issuer, &user.email, &secret),
    }))
}

/// POST /v1/auth/2fa/enable - Confirm the pending secret and require 2FA from now on
pub async fn enable_two_factor(
    State(state): State<AuthState>,
    jar: CookieJar,
    user: AuthUser,
    ApiJson(req): ApiJson<TwoFactorCodeRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    let row = load_user(&state, user.id).await?;

    if row.two_factor_enabled {
        return Err(ApiError::invalid("two_factor", "is already enabled"));
    }
    if row.two_factor_secret.is_none() {
        return Err(ApiError::invalid("two_factor", "setup has not been started"));
    }
    if !accept_code(&state, &row, &req.code).await? {
        return Err(ApiError::invalid("code", INVALID_CODE));
    }

    let row = state
        .db
        .update_user(
            user.id,
            UpdateUser {
                two_factor_enabled: Some(true),
                ..Default::default()
            },
        )
        .await
        .context("Failed to enable 2FA")?
        .ok_or(ApiError::NotFound("User"))?;

    // Sessions minted without the second factor stop working anyway; drop their refresh tokens
    state
        .db
        .delete_user_refresh_tokens(user.id)
        .await
        .context("Failed to revoke refresh tokens")?;

    tracing::info!(user_id = %user.id, "Two-factor authentication enabled");

    let (jar, tokens) = issue_session(&state, jar, &row, true).await?;
    Ok((jar, Json(tokens)))
}

/// POST /v1/auth/2fa/disable - Turn off 2FA after confirming a code
pub async fn disable_two_factor(
    State(state): State<AuthState>,
    user: AuthUser,
    ApiJson(req): ApiJson<TwoFactorCodeRequest>,
) -> Result<StatusCode, ApiError> {
    let row = load_user(&state, user.id).await?;

    if !row.two_factor_enabled {
        return Err(ApiError::invalid("two_factor", "is not enabled"));
    }
    if !accept_code(&state, &row, &req.code).await? {
        return Err(ApiError::invalid("code", INVALID_CODE));
    }

    state
        .db
        .update_user(
            user.id,
            UpdateUser {
                two_factor_enabled: Some(false),
                two_factor_secret: Some(None),
                ..Default::default()
            },
        )
        .await
        .context("Failed to disable 2FA")?;

    tracing::info!(user_id = %user.id, "Two-factor authentication disabled");
    Ok(StatusCode::NO_CONTENT)
}

async fn load_user(state: &AuthState, id: Uuid) -> Result<UserRow, ApiError> {
    state
        .db
        .get_user(id)
        .await
        .context("Failed to load user")?
        .ok_or(ApiError::NotFound("User"))
}

/// Check a TOTP code against the user's stored secret and spend it.
/// A code whose step was already accepted is refused.
async fn accept_code(state: &AuthState, user: &UserRow, code: &str) -> Result<bool, ApiError> {
    let Some(secret_hex) = user.two_factor_secret.as_deref() else {
        return Ok(false);
    };
    let secret = hex::decode(secret_hex)
        .with_context(|| format!("Corrupt 2FA secret for user {}", user.id))?;
    let Some(step) = totp::matching_step_now(&secret, code)? else {
        return Ok(false);
    };
    let step = i64::try_from(step).context("TOTP step out of range")?;

    let fresh = state
        .db
        .record_totp_step(user.id, step)
        .await
        .context("Failed to record TOTP step")?;
    if !fresh {
        tracing::warn!(user_id = %user.id, "Replayed TOTP code rejected");
    }
    Ok(fresh)
}

/// Helper: mint a token pair, persist the refresh token hash, and set cookies
async fn issue_session(
    state: &AuthState,
    jar: CookieJar,
    user: &UserRow,
    tfa: bool,
) -> Result<(CookieJar, TokenResponse), ApiError> {
    let token_pair = state
        .jwt_service
        .generate_token_pair(user.id, &user.email, tfa)?;

    let expires_at = Utc::now()
        + Duration::from_std(state.config.jwt.refresh_token_lifetime)
            .context("Refresh token lifetime out of range")?;

    state
        .db
        .create_refresh_token(CreateRefreshTokenRow {
            user_id: user.id,
            token_hash: hash_token(&token_pair.refresh_token),
            expires_at,
        })
        .await
        .context("Failed to store refresh token")?;

    let access_cookie = Cookie::build((ACCESS_TOKEN_COOKIE, token_pair.access_token.clone()))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(token_pair.expires_in))
        .build();

    let refresh_cookie = Cookie::build((REFRESH_TOKEN_COOKIE, token_pair.refresh_token.clone()))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(
            state.jwt_service.refresh_token_lifetime_secs(),
        ))
        .build();

    let jar = jar.add(access_cookie).add(refresh_cookie);

    Ok((
        jar,
        TokenResponse {
            access_token: token_pair.access_token,
            token_type: token_pair.token_type,
            expires_in: token_pair.expires_in,
            refresh_token: Some(token_pair.refresh_token),
        },
    ))
}

/// Seed the bootstrap admin account when it does not exist yet.
/// An existing account with that email is left untouched.
pub async fn ensure_admin_user(state: &AuthState) -> anyhow::Result<()> {
    let Some(admin) = &state.config.admin else {
        return Ok(());
    };

    let email = admin.email.trim().to_lowercase();
    if state.db.get_user_by_email(&email).await?.is_some() {
        tracing::debug!("Bootstrap admin already present");
        return Ok(());
    }

    let password_hash = hash_password(&admin.password)?;
    let user = state
        .db
        .create_user(CreateUserRow {
            email,
            name: "Admin".to_string(),
            password_hash: Some(password_hash),
            role: Role::Admin,
        })
        .await
        .context("Failed to seed admin user")?;

    tracing::info!(user_id = %user.id, "Seeded bootstrap admin user");
    Ok(())
}
