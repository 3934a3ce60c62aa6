//! Scripted gateway for tests and local runs without gateway credentials

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use shared::order::PixCharge;
use tokio::sync::Mutex;

use super::{ChargeRequest, GatewayError, PaymentGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeMode {
    Approve,
    Reject,
    /// Never answers within any sane timeout
    Hang,
}

pub struct FakeGateway {
    mode: Mutex<FakeMode>,
    issued: AtomicU64,
    charges: Mutex<Vec<ChargeRequest>>,
    simulated: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn new(mode: FakeMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            issued: AtomicU64::new(0),
            charges: Mutex::new(Vec::new()),
            simulated: Mutex::new(Vec::new()),
        }
    }

    pub async fn set_mode(&self, mode: FakeMode) {
        *self.mode.lock().await = mode;
    }

    pub async fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().await.clone()
    }

    pub async fn simulated(&self) -> Vec<String> {
        self.simulated.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_charge(&self, request: ChargeRequest) -> Result<PixCharge, GatewayError> {
        let mode = *self.mode.lock().await;
        match mode {
            FakeMode::Approve => {
                self.charges.lock().await.push(request);
                let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(PixCharge {
                    transaction_id: format!("tx{n}"),
                    br_code: format!("00020126PIX-tx{n}"),
                    br_code_base64: None,
                })
            }
            FakeMode::Reject => Err(GatewayError::Rejected {
                status: 422,
                message: "charge refused".into(),
            }),
            FakeMode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(GatewayError::Malformed("hung".into()))
            }
        }
    }

    async fn simulate_payment(&self, transaction_id: &str) -> Result<(), GatewayError> {
        self.simulated.lock().await.push(transaction_id.to_string());
        Ok(())
    }
}
