//! Order lifecycle: creation, payment, routing, hand-off and settlement

pub mod codes;
pub mod lifecycle;
pub mod settlement;
pub mod tracking;
pub mod views;

pub use lifecycle::{LifecycleSettings, OrderLifecycle};
pub use settlement::{FeeSchedule, Settlement};
pub use tracking::TrackingPhase;
