//! feira-server: order & delivery lifecycle of the Feira local marketplace
//!
//! - `orders`: creation, PIX payment, routing, pickup/delivery confirmation, settlement
//! - `deliveries`: courier queue and atomic claim
//! - `store`: storage trait with PostgreSQL and in-memory implementations
//! - `payment`: gateway client and signed webhook
//! - `api`: axum routes

pub mod api;
pub mod auth;
pub mod config;
pub mod deliveries;
pub mod error;
pub mod metrics;
pub mod orders;
pub mod payment;
pub mod state;
pub mod store;

pub use api::create_router;
pub use config::Config;
pub use state::AppState;
