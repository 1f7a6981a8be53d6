// Storage backend abstraction
// Decision: Use enum dispatch for simplicity over trait objects
//
// This module provides a unified StorageBackend enum that can work with
// either PostgreSQL (production) or in-memory (dev mode) storage.

use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

use super::memory::InMemoryDatabase;
use super::models::*;
use super::repositories::Database;

/// Storage backend that can be either PostgreSQL or in-memory
#[derive(Clone)]
pub enum StorageBackend {
    /// PostgreSQL database (production)
    Postgres(Database),
    /// In-memory database (dev mode)
    InMemory(Arc<InMemoryDatabase>),
}

impl StorageBackend {
    /// Create a PostgreSQL storage backend from a database URL
    pub async fn postgres(database_url: &str) -> Result<Self> {
        let db = Database::from_url(database_url).await?;
        Ok(Self::Postgres(db))
    }

    /// Create an in-memory storage backend
    pub fn in_memory() -> Self {
        Self::InMemory(Arc::new(InMemoryDatabase::new()))
    }

    // ============================================
    // Users
    // ============================================

    pub async fn create_user(&self, input: CreateUserRow) -> Result<UserRow> {
        match self {
            Self::Postgres(db) => db.create_user(input).await,
            Self::InMemory(db) => db.create_user(input).await,
        }
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<UserRow>> {
        match self {
            Self::Postgres(db) => db.get_user(id).await,
            Self::InMemory(db) => db.get_user(id).await,
        }
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        match self {
            Self::Postgres(db) => db.get_user_by_email(email).await,
            Self::InMemory(db) => db.get_user_by_email(email).await,
        }
    }

    pub async fn update_user(&self, id: Uuid, input: UpdateUser) -> Result<Option<UserRow>> {
        match self {
            Self::Postgres(db) => db.update_user(id, input).await,
            Self::InMemory(db) => db.update_user(id, input).await,
        }
    }

    pub async fn record_totp_step(&self, id: Uuid, step: i64) -> Result<bool> {
        match self {
            Self::Postgres(db) => db.record_totp_step(id, step).await,
            Self::InMemory(db) => db.record_totp_step(id, step).await,
        }
    }

    pub async fn list_users(&self, search: Option<&str>) -> Result<Vec<UserRow>> {
        match self {
            Self::Postgres(db) => db.list_users(search).await,
            Self::InMemory(db) => db.list_users(search).await,
        }
    }

    // ============================================
    // Refresh tokens
    // ============================================

    pub async fn create_refresh_token(
        &self,
        input: CreateRefreshTokenRow,
    ) -> Result<RefreshTokenRow> {
        match self {
            Self::Postgres(db) => db.create_refresh_token(input).await,
            Self::InMemory(db) => db.create_refresh_token(input).await,
        }
    }

    /// Remove and return the token with this hash; at most one caller gets it
    pub async fn take_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRow>> {
        match self {
            Self::Postgres(db) => db.take_refresh_token(token_hash).await,
            Self::InMemory(db) => db.take_refresh_token(token_hash).await,
        }
    }

    pub async fn delete_user_refresh_tokens(&self, user_id: Uuid) -> Result<u64> {
        match self {
            Self::Postgres(db) => db.delete_user_refresh_tokens(user_id).await,
            Self::InMemory(db) => db.delete_user_refresh_tokens(user_id).await,
        }
    }

    // ============================================
    // Quote templates
    // ============================================

    pub async fn create_quote_template(
        &self,
        input: CreateQuoteTemplateRow,
    ) -> Result<QuoteTemplateRow> {
        match self {
            Self::Postgres(db) => db.create_quote_template(input).await,
            Self::InMemory(db) => db.create_quote_template(input).await,
        }
    }

    pub async fn get_quote_template(&self, id: Uuid) -> Result<Option<QuoteTemplateRow>> {
        match self {
            Self::Postgres(db) => db.get_quote_template(id).await,
            Self::InMemory(db) => db.get_quote_template(id).await,
        }
    }

    pub async fn list_quote_templates(
        &self,
        owner_id: Option<Uuid>,
    ) -> Result<Vec<QuoteTemplateRow>> {
        match self {
            Self::Postgres(db) => db.list_quote_templates(owner_id).await,
            Self::InMemory(db) => db.list_quote_templates(owner_id).await,
        }
    }

    pub async fn update_quote_template(
        &self,
        id: Uuid,
        input: UpdateQuoteTemplate,
    ) -> Result<Option<QuoteTemplateRow>> {
        match self {
            Self::Postgres(db) => db.update_quote_template(id, input).await,
            Self::InMemory(db) => db.update_quote_template(id, input).await,
        }
    }

    pub async fn delete_quote_template(&self, id: Uuid) -> Result<bool> {
        match self {
            Self::Postgres(db) => db.delete_quote_template(id).await,
            Self::InMemory(db) => db.delete_quote_template(id).await,
        }
    }

    // ============================================
    // Quote items
    // ============================================

    pub async fn create_quote_item(&self, input: CreateQuoteItemRow) -> Result<QuoteItemRow> {
        match self {
            Self::Postgres(db) => db.create_quote_item(input).await,
            Self::InMemory(db) => db.create_quote_item(input).await,
        }
    }

    pub async fn get_quote_item(&self, id: Uuid) -> Result<Option<QuoteItemRow>> {
        match self {
            Self::Postgres(db) => db.get_quote_item(id).await,
            Self::InMemory(db) => db.get_quote_item(id).await,
        }
    }

    pub async fn list_quote_items(&self, template_id: Uuid) -> Result<Vec<QuoteItemRow>> {
        match self {
            Self::Postgres(db) => db.list_quote_items(template_id).await,
            Self::InMemory(db) => db.list_quote_items(template_id).await,
        }
    }

    pub async fn update_quote_item(
        &self,
        id: Uuid,
        input: UpdateQuoteItem,
    ) -> Result<Option<QuoteItemRow>> {
        match self {
            Self::Postgres(db) => db.update_quote_item(id, input).await,
            Self::InMemory(db) => db.update_quote_item(id, input).await,
        }
    }

    pub async fn delete_quote_item(&self, id: Uuid) -> Result<bool> {
        match self {
            Self::Postgres(db) => db.delete_quote_item(id).await,
            Self::InMemory(db) => db.delete_quote_item(id).await,
        }
    }

    // ============================================
    // Quote responses
    // ============================================

    pub async fn create_quote_response(
        &self,
        input: CreateQuoteResponseRow,
    ) -> Result<QuoteResponseRow> {
        match self {
            Self::Postgres(db) => db.create_quote_response(input).await,
            Self::InMemory(db) => db.create_quote_response(input).await,
        }
    }

    pub async fn get_quote_response(&self, id: Uuid) -> Result<Option<QuoteResponseRow>> {
        match self {
            Self::Postgres(db) => db.get_quote_response(id).await,
            Self::InMemory(db) => db.get_quote_response(id).await,
        }
    }

    pub async fn list_quote_responses(&self, template_id: Uuid) -> Result<Vec<QuoteResponseRow>> {
        match self {
            Self::Postgres(db) => db.list_quote_responses(template_id).await,
            Self::InMemory(db) => db.list_quote_responses(template_id).await,
        }
    }

    pub async fn delete_quote_response(&self, id: Uuid) -> Result<bool> {
        match self {
            Self::Postgres(db) => db.delete_quote_response(id).await,
            Self::InMemory(db) => db.delete_quote_response(id).await,
        }
    }

    // ============================================
    // Admin dashboard
    // ============================================

    pub async fn stats(&self) -> Result<StatsRow> {
        match self {
            Self::Postgres(db) => db.stats().await,
            Self::InMemory(db) => db.stats().await,
        }
    }
}
