// User domain types
//
// These types represent the authenticated principal and its role.
// Used by the server (session resolution, admin endpoints) and by API clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Global role of a user.
/// - `user`: regular account, may only act on resources it owns
/// - `admin`: may list and manage every user and every owned resource
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account.
    #[default]
    User,
    /// Administrator with override on every ownership check.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Role {
    /// Unknown values map to the least privileged role.
    fn from(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

/// Public view of a user account. Never carries credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct User {
    /// Unique identifier for the user.
    pub id: Uuid,
    /// Login email, unique across the system.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Global role.
    pub role: Role,
    /// Whether a second factor is required at login.
    pub two_factor_enabled: bool,
    /// Timestamp when the account was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last profile or admin update.
    pub updated_at: DateTime<Utc>,
}
