//! PIX payment gateway seam
//!
//! The lifecycle only needs two calls: create a charge and (on sandbox
//! accounts) ask the gateway to pretend it was paid. Approval itself always
//! arrives through the signed webhook, see [`webhook`].

mod abacate;
pub mod testing;
pub mod webhook;

pub use abacate::AbacateGateway;

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use shared::order::PixCharge;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("gateway rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected gateway response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    /// Amount in centavos
    pub amount_cents: i64,
    pub expires_in_secs: u64,
    pub description: String,
}

impl ChargeRequest {
    /// Builds a charge for `total`; `None` if it does not fit in centavos.
    pub fn for_order(order_id: i64, total: Decimal, expires_in_secs: u64) -> Option<Self> {
        let amount_cents = (total * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()?;
        Some(Self {
            amount_cents,
            expires_in_secs,
            description: format!("Feira order #{order_id}"),
        })
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_charge(&self, request: ChargeRequest) -> Result<PixCharge, GatewayError>;

    /// Sandbox only: marks the charge paid, which triggers the webhook.
    async fn simulate_payment(&self, transaction_id: &str) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_amount_in_cents() {
        let req = ChargeRequest::for_order(12, "50.00".parse().unwrap(), 3600).unwrap();
        assert_eq!(req.amount_cents, 5000);
        assert_eq!(req.expires_in_secs, 3600);
        assert_eq!(req.description, "Feira order #12");

        let odd = ChargeRequest::for_order(1, "19.99".parse().unwrap(), 60).unwrap();
        assert_eq!(odd.amount_cents, 1999);

        // half a centavo rounds the same way settlement does
        let half = ChargeRequest::for_order(1, "10.005".parse().unwrap(), 60).unwrap();
        assert_eq!(half.amount_cents, 1001);
    }
}
