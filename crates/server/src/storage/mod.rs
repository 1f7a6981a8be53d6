// Storage layer for the Atelier server
// Decision: Support both PostgreSQL (production) and in-memory (dev mode)
//
// - Database: sqlx/PostgreSQL repositories, migrations applied on connect
// - InMemoryDatabase: HashMap-backed mirror of the same API
// - StorageBackend: enum dispatch used by handlers and services

pub mod backend;
pub mod memory;
pub mod models;
pub mod repositories;

pub use backend::StorageBackend;
pub use memory::InMemoryDatabase;
pub use models::*;
pub use repositories::Database;
