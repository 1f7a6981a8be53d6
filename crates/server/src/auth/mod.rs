// Authentication and authorization
//
// Request flow:
// 1. `session` resolves the request credential to the user as persisted right now
// 2. `gate` decides admin and ownership questions over that identity
// 3. `middleware` packages both as extractors so handlers never repeat the checks

pub mod config;
pub mod gate;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod routes;
pub mod session;
pub mod totp;

pub use config::AuthConfig;
pub use middleware::{AdminUser, AuthState, AuthUser, FromRef, Owned, OwnedResource};
pub use routes::{ensure_admin_user, routes};
pub use session::{Identity, SessionResolution, UnauthenticatedReason};
