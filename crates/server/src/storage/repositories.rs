// Repository layer for PostgreSQL
// Decision: IDs are generated in the application (UUID v7) so both backends agree on ordering
// Decision: Item and response queries join the template to expose its owner for authorization

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::*;

const USER_COLUMNS: &str = "id, email, name, password_hash, role, two_factor_enabled, two_factor_secret, two_factor_last_step, created_at, updated_at";

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL and apply pending migrations
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
        Ok(Self { pool })
    }

    // ============================================
    // Users
    // ============================================

    pub async fn create_user(&self, input: CreateUserRow) -> Result<UserRow> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, email, name, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(&input.email)
        .bind(&input.name)
        .bind(&input.password_hash)
        .bind(input.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_user(&self, id: Uuid, input: UpdateUser) -> Result<Option<UserRow>> {
        let (set_secret, secret) = match input.two_factor_secret {
            Some(secret) => (true, secret),
            None => (false, None),
        };

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET
                name = COALESCE($2, name),
                role = COALESCE($3, role),
                password_hash = COALESCE($4, password_hash),
                two_factor_enabled = COALESCE($5, two_factor_enabled),
                two_factor_secret = CASE WHEN $6 THEN $7 ELSE two_factor_secret END,
                two_factor_last_step = CASE WHEN $6 THEN NULL ELSE two_factor_last_step END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.name)
        .bind(input.role.map(|r| r.as_str()))
        .bind(&input.password_hash)
        .bind(input.two_factor_enabled)
        .bind(set_secret)
        .bind(secret)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Accept a TOTP step only if it is later than the last one accepted.
    /// Returns false when the code was already spent.
    pub async fn record_totp_step(&self, id: Uuid, step: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET two_factor_last_step = $2
            WHERE id = $1
              AND (two_factor_last_step IS NULL OR two_factor_last_step < $2)
            "#,
        )
        .bind(id)
        .bind(step)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_users(&self, search: Option<&str>) -> Result<Vec<UserRow>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(contains_pattern);

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE $1::text IS NULL
               OR lower(name) LIKE $1 ESCAPE '\'
               OR lower(email) LIKE $1 ESCAPE '\'
            ORDER BY created_at DESC
            "#
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ============================================
    // Refresh tokens
    // ============================================

    pub async fn create_refresh_token(
        &self,
        input: CreateRefreshTokenRow,
    ) -> Result<RefreshTokenRow> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.user_id)
        .bind(&input.token_hash)
        .bind(input.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Remove a refresh token and return it. Of two concurrent callers with the
    /// same hash, only one gets the row back.
    pub async fn take_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRow>> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            DELETE FROM refresh_tokens
            WHERE token_hash = $1
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn delete_user_refresh_tokens(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // ============================================
    // Quote templates
    // ============================================

    pub async fn create_quote_template(
        &self,
        input: CreateQuoteTemplateRow,
    ) -> Result<QuoteTemplateRow> {
        let row = sqlx::query_as::<_, QuoteTemplateRow>(
            r#"
            INSERT INTO quote_templates (id, owner_id, name, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, name, description, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.owner_id)
        .bind(&input.name)
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_quote_template(&self, id: Uuid) -> Result<Option<QuoteTemplateRow>> {
        let row = sqlx::query_as::<_, QuoteTemplateRow>(
            r#"
            SELECT id, owner_id, name, description, created_at, updated_at
            FROM quote_templates
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// List templates, optionally restricted to one owner
    pub async fn list_quote_templates(&self, owner_id: Option<Uuid>) -> Result<Vec<QuoteTemplateRow>> {
        let rows = sqlx::query_as::<_, QuoteTemplateRow>(
            r#"
            SELECT id, owner_id, name, description, created_at, updated_at
            FROM quote_templates
            WHERE $1::uuid IS NULL OR owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn update_quote_template(
        &self,
        id: Uuid,
        input: UpdateQuoteTemplate,
    ) -> Result<Option<QuoteTemplateRow>> {
        let row = sqlx::query_as::<_, QuoteTemplateRow>(
            r#"
            UPDATE quote_templates
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, owner_id, name, description, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Delete a template; items and responses cascade
    pub async fn delete_quote_template(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM quote_templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ============================================
    // Quote items
    // ============================================

    pub async fn create_quote_item(&self, input: CreateQuoteItemRow) -> Result<QuoteItemRow> {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO quote_items (id, template_id, label, parameters, unit_price_min_cents, unit_price_max_cents, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(input.template_id)
        .bind(&input.label)
        .bind(serde_json::to_value(&input.parameters)?)
        .bind(input.unit_price_min_cents)
        .bind(input.unit_price_max_cents)
        .bind(input.position)
        .execute(&self.pool)
        .await?;

        self.get_quote_item(id)
            .await?
            .context("Quote item vanished after insert")
    }

    pub async fn get_quote_item(&self, id: Uuid) -> Result<Option<QuoteItemRow>> {
        let row = sqlx::query_as::<_, QuoteItemRow>(
            r#"
            SELECT i.id, i.template_id, t.owner_id, i.label, i.parameters,
                   i.unit_price_min_cents, i.unit_price_max_cents, i.position
            FROM quote_items i
            JOIN quote_templates t ON t.id = i.template_id
            WHERE i.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_quote_items(&self, template_id: Uuid) -> Result<Vec<QuoteItemRow>> {
        let rows = sqlx::query_as::<_, QuoteItemRow>(
            r#"
            SELECT i.id, i.template_id, t.owner_id, i.label, i.parameters,
                   i.unit_price_min_cents, i.unit_price_max_cents, i.position
            FROM quote_items i
            JOIN quote_templates t ON t.id = i.template_id
            WHERE i.template_id = $1
            ORDER BY i.position ASC, i.id ASC
            "#,
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn update_quote_item(
        &self,
        id: Uuid,
        input: UpdateQuoteItem,
    ) -> Result<Option<QuoteItemRow>> {
        let parameters = input
            .parameters
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE quote_items
            SET
                label = COALESCE($2, label),
                parameters = COALESCE($3, parameters),
                unit_price_min_cents = COALESCE($4, unit_price_min_cents),
                unit_price_max_cents = COALESCE($5, unit_price_max_cents),
                position = COALESCE($6, position)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&input.label)
        .bind(parameters)
        .bind(input.unit_price_min_cents)
        .bind(input.unit_price_max_cents)
        .bind(input.position)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_quote_item(id).await
    }

    pub async fn delete_quote_item(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM quote_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ============================================
    // Quote responses
    // ============================================

    pub async fn create_quote_response(
        &self,
        input: CreateQuoteResponseRow,
    ) -> Result<QuoteResponseRow> {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO quote_responses (id, template_id, owner_id, answers, estimate_min_cents, estimate_max_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(input.template_id)
        .bind(input.owner_id)
        .bind(serde_json::to_value(&input.answers)?)
        .bind(input.estimate.min_cents)
        .bind(input.estimate.max_cents)
        .execute(&self.pool)
        .await?;

        self.get_quote_response(id)
            .await?
            .context("Quote response vanished after insert")
    }

    pub async fn get_quote_response(&self, id: Uuid) -> Result<Option<QuoteResponseRow>> {
        let row = sqlx::query_as::<_, QuoteResponseRow>(
            r#"
            SELECT r.id, r.template_id, r.owner_id, t.owner_id AS template_owner_id,
                   r.answers, r.estimate_min_cents, r.estimate_max_cents, r.created_at
            FROM quote_responses r
            JOIN quote_templates t ON t.id = r.template_id
            WHERE r.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_quote_responses(&self, template_id: Uuid) -> Result<Vec<QuoteResponseRow>> {
        let rows = sqlx::query_as::<_, QuoteResponseRow>(
            r#"
            SELECT r.id, r.template_id, r.owner_id, t.owner_id AS template_owner_id,
                   r.answers, r.estimate_min_cents, r.estimate_max_cents, r.created_at
            FROM quote_responses r
            JOIN quote_templates t ON t.id = r.template_id
            WHERE r.template_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn delete_quote_response(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM quote_responses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ============================================
    // Admin dashboard
    // ============================================

    pub async fn stats(&self) -> Result<StatsRow> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS users,
                (SELECT COUNT(*) FROM users WHERE role = 'admin') AS admins,
                (SELECT COUNT(*) FROM quote_templates) AS quote_templates,
                (SELECT COUNT(*) FROM quote_responses) AS quote_responses
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }
}

/// Lowercased `%...%` pattern with LIKE wildcards in the input matched literally
fn contains_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
