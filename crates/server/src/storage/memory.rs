// In-memory storage implementation for dev mode
// Decision: Use parking_lot for thread-safe access
// Decision: UUIDs generated via uuid v7 (time-ordered)
//
// This implementation provides a PostgreSQL-compatible API backed by in-memory
// HashMaps, allowing the server to run without a database for development and
// router-level tests. Constraints the schema enforces (unique email, cascading
// deletes) are mirrored here.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::models::*;

/// Stored item without the joined owner column
#[derive(Debug, Clone)]
struct StoredItem {
    id: Uuid,
    template_id: Uuid,
    label: String,
    parameters: serde_json::Value,
    unit_price_min_cents: i64,
    unit_price_max_cents: i64,
    position: i32,
}

/// Stored response without the joined template owner column
#[derive(Debug, Clone)]
struct StoredResponse {
    id: Uuid,
    template_id: Uuid,
    owner_id: Uuid,
    answers: serde_json::Value,
    estimate_min_cents: i64,
    estimate_max_cents: i64,
    created_at: DateTime<Utc>,
}

/// In-memory database for dev mode
/// All data is stored in memory and lost on restart
#[derive(Default)]
pub struct InMemoryDatabase {
    users: RwLock<HashMap<Uuid, UserRow>>,
    refresh_tokens: RwLock<HashMap<Uuid, RefreshTokenRow>>,
    quote_templates: RwLock<HashMap<Uuid, QuoteTemplateRow>>,
    quote_items: RwLock<HashMap<Uuid, StoredItem>>,
    quote_responses: RwLock<HashMap<Uuid, StoredResponse>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn template_owner(&self, template_id: Uuid) -> Option<Uuid> {
        self.quote_templates
            .read()
            .get(&template_id)
            .map(|t| t.owner_id)
    }

    fn item_row(&self, item: &StoredItem) -> Option<QuoteItemRow> {
        Some(QuoteItemRow {
            id: item.id,
            template_id: item.template_id,
            owner_id: self.template_owner(item.template_id)?,
            label: item.label.clone(),
            parameters: item.parameters.clone(),
            unit_price_min_cents: item.unit_price_min_cents,
            unit_price_max_cents: item.unit_price_max_cents,
            position: item.position,
        })
    }

    fn response_row(&self, response: &StoredResponse) -> Option<QuoteResponseRow> {
        Some(QuoteResponseRow {
            id: response.id,
            template_id: response.template_id,
            owner_id: response.owner_id,
            template_owner_id: self.template_owner(response.template_id)?,
            answers: response.answers.clone(),
            estimate_min_cents: response.estimate_min_cents,
            estimate_max_cents: response.estimate_max_cents,
            created_at: response.created_at,
        })
    }

    // ============================================
    // Users
    // ============================================

    pub async fn create_user(&self, input: CreateUserRow) -> Result<UserRow> {
        let mut users = self.users.write();
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&input.email))
        {
            bail!("duplicate key value violates unique constraint \"users_email_key\"");
        }

        let now = Self::now();
        let id = Uuid::now_v7();
        let row = UserRow {
            id,
            email: input.email,
            name: input.name,
            password_hash: input.password_hash,
            role: input.role.as_str().to_string(),
            two_factor_enabled: false,
            two_factor_secret: None,
            two_factor_last_step: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<UserRow>> {
        Ok(self.users.read().get(&id).cloned())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    pub async fn update_user(&self, id: Uuid, input: UpdateUser) -> Result<Option<UserRow>> {
        let mut users = self.users.write();
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = input.name {
            user.name = name;
        }
        if let Some(role) = input.role {
            user.role = role.as_str().to_string();
        }
        if let Some(password_hash) = input.password_hash {
            user.password_hash = Some(password_hash);
        }
        if let Some(enabled) = input.two_factor_enabled {
            user.two_factor_enabled = enabled;
        }
        if let Some(secret) = input.two_factor_secret {
            user.two_factor_secret = secret;
            user.two_factor_last_step = None;
        }
        user.updated_at = Self::now();
        Ok(Some(user.clone()))
    }

    pub async fn record_totp_step(&self, id: Uuid, step: i64) -> Result<bool> {
        let mut users = self.users.write();
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        if user.two_factor_last_step.is_some_and(|last| last >= step) {
            return Ok(false);
        }
        user.two_factor_last_step = Some(step);
        Ok(true)
    }

    pub async fn list_users(&self, search: Option<&str>) -> Result<Vec<UserRow>> {
        let users = self.users.read();
        let mut result: Vec<_> = match search.map(str::trim) {
            Some(query) if !query.is_empty() => {
                let pattern = query.to_lowercase();
                users
                    .values()
                    .filter(|u| {
                        u.name.to_lowercase().contains(&pattern)
                            || u.email.to_lowercase().contains(&pattern)
                    })
                    .cloned()
                    .collect()
            }
            _ => users.values().cloned().collect(),
        };
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(result)
    }

    // ============================================
    // Refresh tokens
    // ============================================

    pub async fn create_refresh_token(
        &self,
        input: CreateRefreshTokenRow,
    ) -> Result<RefreshTokenRow> {
        let id = Uuid::now_v7();
        let row = RefreshTokenRow {
            id,
            user_id: input.user_id,
            token_hash: input.token_hash,
            expires_at: input.expires_at,
            created_at: Self::now(),
        };
        self.refresh_tokens.write().insert(id, row.clone());
        Ok(row)
    }

    pub async fn take_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRow>> {
        let mut tokens = self.refresh_tokens.write();
        let id = tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .map(|t| t.id);
        Ok(id.and_then(|id| tokens.remove(&id)))
    }

    pub async fn delete_user_refresh_tokens(&self, user_id: Uuid) -> Result<u64> {
        let mut tokens = self.refresh_tokens.write();
        let before = tokens.len();
        tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }

    // ============================================
    // Quote templates
    // ============================================

    pub async fn create_quote_template(
        &self,
        input: CreateQuoteTemplateRow,
    ) -> Result<QuoteTemplateRow> {
        let now = Self::now();
        let id = Uuid::now_v7();
        let row = QuoteTemplateRow {
            id,
            owner_id: input.owner_id,
            name: input.name,
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        self.quote_templates.write().insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_quote_template(&self, id: Uuid) -> Result<Option<QuoteTemplateRow>> {
        Ok(self.quote_templates.read().get(&id).cloned())
    }

    pub async fn list_quote_templates(&self, owner_id: Option<Uuid>) -> Result<Vec<QuoteTemplateRow>> {
        let templates = self.quote_templates.read();
        let mut result: Vec<_> = templates
            .values()
            .filter(|t| owner_id.map_or(true, |owner| t.owner_id == owner))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(result)
    }

    pub async fn update_quote_template(
        &self,
        id: Uuid,
        input: UpdateQuoteTemplate,
    ) -> Result<Option<QuoteTemplateRow>> {
        let mut templates = self.quote_templates.write();
        let Some(template) = templates.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = input.name {
            template.name = name;
        }
        if let Some(description) = input.description {
            template.description = Some(description);
        }
        template.updated_at = Self::now();
        Ok(Some(template.clone()))
    }

    pub async fn delete_quote_template(&self, id: Uuid) -> Result<bool> {
        let removed = self.quote_templates.write().remove(&id).is_some();
        if removed {
            self.quote_items.write().retain(|_, i| i.template_id != id);
            self.quote_responses
                .write()
                .retain(|_, r| r.template_id != id);
        }
        Ok(removed)
    }

    // ============================================
    // Quote items
    // ============================================

    pub async fn create_quote_item(&self, input: CreateQuoteItemRow) -> Result<QuoteItemRow> {
        if self.template_owner(input.template_id).is_none() {
            bail!("insert or update on table \"quote_items\" violates foreign key constraint");
        }
        let item = StoredItem {
            id: Uuid::now_v7(),
            template_id: input.template_id,
            label: input.label,
            parameters: serde_json::to_value(&input.parameters)?,
            unit_price_min_cents: input.unit_price_min_cents,
            unit_price_max_cents: input.unit_price_max_cents,
            position: input.position,
        };
        self.quote_items.write().insert(item.id, item.clone());
        self.item_row(&item)
            .ok_or_else(|| anyhow::anyhow!("Quote item vanished after insert"))
    }

    pub async fn get_quote_item(&self, id: Uuid) -> Result<Option<QuoteItemRow>> {
        let item = self.quote_items.read().get(&id).cloned();
        Ok(item.and_then(|i| self.item_row(&i)))
    }

    pub async fn list_quote_items(&self, template_id: Uuid) -> Result<Vec<QuoteItemRow>> {
        let mut items: Vec<StoredItem> = self
            .quote_items
            .read()
            .values()
            .filter(|i| i.template_id == template_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.position.cmp(&b.position).then(a.id.cmp(&b.id)));
        Ok(items.iter().filter_map(|i| self.item_row(i)).collect())
    }

    pub async fn update_quote_item(
        &self,
        id: Uuid,
        input: UpdateQuoteItem,
    ) -> Result<Option<QuoteItemRow>> {
        let updated = {
            let mut items = self.quote_items.write();
            let Some(item) = items.get_mut(&id) else {
                return Ok(None);
            };
            if let Some(label) = input.label {
                item.label = label;
            }
            if let Some(parameters) = input.parameters {
                item.parameters = serde_json::to_value(&parameters)?;
            }
            if let Some(min) = input.unit_price_min_cents {
                item.unit_price_min_cents = min;
            }
            if let Some(max) = input.unit_price_max_cents {
                item.unit_price_max_cents = max;
            }
            if let Some(position) = input.position {
                item.position = position;
            }
            item.clone()
        };
        Ok(self.item_row(&updated))
    }

    pub async fn delete_quote_item(&self, id: Uuid) -> Result<bool> {
        Ok(self.quote_items.write().remove(&id).is_some())
    }

    // ============================================
    // Quote responses
    // ============================================

    pub async fn create_quote_response(
        &self,
        input: CreateQuoteResponseRow,
    ) -> Result<QuoteResponseRow> {
        if self.template_owner(input.template_id).is_none() {
            bail!("insert or update on table \"quote_responses\" violates foreign key constraint");
        }
        let response = StoredResponse {
            id: Uuid::now_v7(),
            template_id: input.template_id,
            owner_id: input.owner_id,
            answers: serde_json::to_value(&input.answers)?,
            estimate_min_cents: input.estimate.min_cents,
            estimate_max_cents: input.estimate.max_cents,
            created_at: Self::now(),
        };
        self.quote_responses
            .write()
            .insert(response.id, response.clone());
        self.response_row(&response)
            .ok_or_else(|| anyhow::anyhow!("Quote response vanished after insert"))
    }

    pub async fn get_quote_response(&self, id: Uuid) -> Result<Option<QuoteResponseRow>> {
        let response = self.quote_responses.read().get(&id).cloned();
        Ok(response.and_then(|r| self.response_row(&r)))
    }

    pub async fn list_quote_responses(&self, template_id: Uuid) -> Result<Vec<QuoteResponseRow>> {
        let mut responses: Vec<StoredResponse> = self
            .quote_responses
            .read()
            .values()
            .filter(|r| r.template_id == template_id)
            .cloned()
            .collect();
        responses.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(responses
            .iter()
            .filter_map(|r| self.response_row(r))
            .collect())
    }

    pub async fn delete_quote_response(&self, id: Uuid) -> Result<bool> {
        Ok(self.quote_responses.write().remove(&id).is_some())
    }

    // ============================================
    // Admin dashboard
    // ============================================

    pub async fn stats(&self) -> Result<StatsRow> {
        let users = self.users.read();
        Ok(StatsRow {
            users: users.len() as i64,
            admins: users.values().filter(|u| u.role().is_admin()).count() as i64,
            quote_templates: self.quote_templates.read().len() as i64,
            quote_responses: self.quote_responses.read().len() as i64,
        })
    }
}
