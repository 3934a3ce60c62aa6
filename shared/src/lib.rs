//! Shared types for the Feira marketplace
//!
//! Common types used by the server and its clients: the unified error
//! system, user models, and order/delivery lifecycle types.

pub mod error;
pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use axum::Json;
pub use serde::{Deserialize, Serialize};
