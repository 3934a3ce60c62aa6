//! Data models
//!
//! Shared between feira-server and its clients (via API).
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (PostgreSQL BIGSERIAL).

pub mod user;

// Re-exports
pub use user::*;
