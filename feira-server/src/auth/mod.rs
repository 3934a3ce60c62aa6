//! Authentication: bearer tokens and the per-request actor loader

pub mod actor;
pub mod jwt;

pub use actor::{CurrentActor, require_actor};
pub use jwt::create_token;
