//! Payment gateway webhook
//!
//! POST /payments/webhook takes the raw body so the HMAC can be checked
//! before anything is parsed. Every request is answered 200: a rejected or
//! failed event is logged, never bounced back into the sender's retry loop.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Serialize;
use shared::error::ErrorCode;

use crate::payment::webhook::{SIGNATURE_HEADER, WebhookEvent, verify_signature};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    /// Event was authentic and handled without an internal error
    pub processed: bool,
}

fn ack(processed: bool) -> Json<WebhookAck> {
    Json(WebhookAck {
        received: true,
        processed,
    })
}

pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<WebhookAck> {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!(code = %ErrorCode::WebhookSignatureInvalid, "Webhook without signature header ignored");
        return ack(false);
    };

    let now = chrono::Utc::now().timestamp();
    if let Err(e) = verify_signature(&body, signature, &state.webhook_secret, now) {
        tracing::warn!(
            code = %ErrorCode::WebhookSignatureInvalid,
            error = %e,
            "Webhook signature verification failed"
        );
        return ack(false);
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable webhook payload");
            return ack(false);
        }
    };

    let Some(transaction_id) = event.approved_transaction() else {
        tracing::info!(event = %event.event, status = %event.data.status, "Webhook event ignored");
        return ack(true);
    };

    match state.lifecycle.on_payment_approved(transaction_id).await {
        Ok(_) => ack(true),
        Err(e) => {
            tracing::error!(transaction_id, error = %e, "Payment approval failed");
            ack(false)
        }
    }
}
