// Database row types and their conversions to domain types

use anyhow::{Context, Result};
use atelier_core::{ItemAnswer, ItemParameter, PriceRange, QuoteItem, QuoteResponse, QuoteTemplate, Role, User};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================
// Users
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub role: String,
    pub two_factor_enabled: bool,
    /// Hex-encoded TOTP secret. Present while 2FA is pending setup or enabled.
    pub two_factor_secret: Option<String>,
    /// Last TOTP step accepted for this secret. Codes from it or earlier steps are spent.
    pub two_factor_last_step: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn role(&self) -> Role {
        Role::from(self.role.as_str())
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let role = row.role();
        User {
            id: row.id,
            email: row.email,
            name: row.name,
            role,
            two_factor_enabled: row.two_factor_enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserRow {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub role: Role,
}

/// Partial user update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub password_hash: Option<String>,
    pub two_factor_enabled: Option<bool>,
    /// `Some(None)` clears the secret. Any change of secret also forgets the last TOTP step.
    pub two_factor_secret: Option<Option<String>>,
}

// ============================================
// Refresh tokens
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateRefreshTokenRow {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================
// Quote templates
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct QuoteTemplateRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuoteTemplateRow {
    pub fn into_template(self, items: Vec<QuoteItem>) -> QuoteTemplate {
        QuoteTemplate {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            description: self.description,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateQuoteTemplateRow {
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateQuoteTemplate {
    pub name: Option<String>,
    pub description: Option<String>,
}

// ============================================
// Quote items
// ============================================

/// Quote item joined with the owner of its template.
#[derive(Debug, Clone, FromRow)]
pub struct QuoteItemRow {
    pub id: Uuid,
    pub template_id: Uuid,
    pub owner_id: Uuid,
    pub label: String,
    pub parameters: sqlx::types::JsonValue,
    pub unit_price_min_cents: i64,
    pub unit_price_max_cents: i64,
    pub position: i32,
}

impl TryFrom<QuoteItemRow> for QuoteItem {
    type Error = anyhow::Error;

    fn try_from(row: QuoteItemRow) -> Result<Self> {
        let parameters: Vec<ItemParameter> = serde_json::from_value(row.parameters)
            .with_context(|| format!("Corrupt parameters on quote item {}", row.id))?;
        Ok(QuoteItem {
            id: row.id,
            template_id: row.template_id,
            label: row.label,
            parameters,
            unit_price_min_cents: row.unit_price_min_cents,
            unit_price_max_cents: row.unit_price_max_cents,
            position: row.position,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CreateQuoteItemRow {
    pub template_id: Uuid,
    pub label: String,
    pub parameters: Vec<ItemParameter>,
    pub unit_price_min_cents: i64,
    pub unit_price_max_cents: i64,
    pub position: i32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateQuoteItem {
    pub label: Option<String>,
    pub parameters: Option<Vec<ItemParameter>>,
    pub unit_price_min_cents: Option<i64>,
    pub unit_price_max_cents: Option<i64>,
    pub position: Option<i32>,
}

// ============================================
// Quote responses
// ============================================

/// Quote response joined with the owner of the answered template.
#[derive(Debug, Clone, FromRow)]
pub struct QuoteResponseRow {
    pub id: Uuid,
    pub template_id: Uuid,
    pub owner_id: Uuid,
    pub template_owner_id: Uuid,
    pub answers: sqlx::types::JsonValue,
    pub estimate_min_cents: i64,
    pub estimate_max_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<QuoteResponseRow> for QuoteResponse {
    type Error = anyhow::Error;

    fn try_from(row: QuoteResponseRow) -> Result<Self> {
        let answers: Vec<ItemAnswer> = serde_json::from_value(row.answers)
            .with_context(|| format!("Corrupt answers on quote response {}", row.id))?;
        Ok(QuoteResponse {
            id: row.id,
            template_id: row.template_id,
            owner_id: row.owner_id,
            answers,
            estimate: PriceRange {
                min_cents: row.estimate_min_cents,
                max_cents: row.estimate_max_cents,
            },
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CreateQuoteResponseRow {
    pub template_id: Uuid,
    pub owner_id: Uuid,
    pub answers: Vec<ItemAnswer>,
    pub estimate: PriceRange,
}

// ============================================
// Admin dashboard
// ============================================

#[derive(Debug, Clone, Default, FromRow)]
pub struct StatsRow {
    pub users: i64,
    pub admins: i64,
    pub quote_templates: i64,
    pub quote_responses: i64,
}
