//! Order & delivery lifecycle types shared by the server and its clients

pub mod dto;
pub mod status;

pub use dto::*;
pub use status::{DeliveryMethod, DeliveryStatus, OrderStatus};
