//! Gateway webhook: signature check and event parsing
//!
//! Header format: `X-Webhook-Signature: t=<unix secs>,v1=<hex>` where the
//! signature is HMAC-SHA256 over `"{t}.{raw body}"`.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Maximum clock skew accepted between signer and receiver.
const TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("invalid signature header")]
    MalformedHeader,
    #[error("invalid signature hex")]
    BadHex,
    #[error("signature mismatch")]
    Mismatch,
    #[error("signature timestamp outside tolerance")]
    Stale,
}

pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_secs: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = "";
    let mut signature = "";
    for part in header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signature = v;
        }
    }
    if timestamp.is_empty() || signature.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }
    let ts: i64 = timestamp.parse().map_err(|_| SignatureError::MalformedHeader)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::MalformedHeader)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let sig_bytes = hex::decode(signature).map_err(|_| SignatureError::BadHex)?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| SignatureError::Mismatch)?;

    if (now_secs - ts).abs() > TOLERANCE_SECS {
        return Err(SignatureError::Stale);
    }
    Ok(())
}

/// Produces a header value accepted by [`verify_signature`].
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, SignatureError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::MalformedHeader)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub id: String,
    pub status: String,
}

impl WebhookEvent {
    /// Transaction id of an approved payment, if this event is one.
    pub fn approved_transaction(&self) -> Option<&str> {
        (self.event == "PAYMENT_APPROVED" && self.data.status == "APPROVED")
            .then_some(self.data.id.as_str())
    }
}
