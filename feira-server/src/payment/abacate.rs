//! AbacatePay PIX client (REST, bearer auth)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::order::PixCharge;

use super::{ChargeRequest, GatewayError, PaymentGateway};

#[derive(Clone)]
pub struct AbacateGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateQrCodeBody<'a> {
    amount: i64,
    expires_in: u64,
    description: &'a str,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QrCodeData {
    id: String,
    br_code: String,
    br_code_base64: Option<String>,
}

impl AbacateGateway {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn read<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<Envelope<T>, GatewayError> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl PaymentGateway for AbacateGateway {
    async fn create_charge(&self, request: ChargeRequest) -> Result<PixCharge, GatewayError> {
        let resp = self
            .client
            .post(format!("{}/v1/pixQrCode/create", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&CreateQrCodeBody {
                amount: request.amount_cents,
                expires_in: request.expires_in_secs,
                description: &request.description,
            })
            .send()
            .await?;

        let envelope: Envelope<QrCodeData> = Self::read(resp).await?;
        if let Some(error) = envelope.error {
            return Err(GatewayError::Malformed(error));
        }
        let data = envelope
            .data
            .ok_or_else(|| GatewayError::Malformed("missing data".into()))?;

        Ok(PixCharge {
            transaction_id: data.id,
            br_code: data.br_code,
            br_code_base64: data.br_code_base64,
        })
    }

    async fn simulate_payment(&self, transaction_id: &str) -> Result<(), GatewayError> {
        let resp = self
            .client
            .post(format!("{}/v1/pixQrCode/simulate-payment", self.base_url))
            .query(&[("id", transaction_id)])
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "metadata": {} }))
            .send()
            .await?;

        let envelope: Envelope<serde_json::Value> = Self::read(resp).await?;
        match envelope.error {
            Some(error) => Err(GatewayError::Malformed(error)),
            None => Ok(()),
        }
    }
}
