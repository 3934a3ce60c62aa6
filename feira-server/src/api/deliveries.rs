//! Courier endpoints and final delivery confirmation

use axum::extract::{Path, State};
use axum::{Extension, Json};
use shared::error::ApiResponse;
use shared::order::{
    AvailableDeliveries, ClaimedDelivery, ConfirmDeliveryRequest, CurrentDelivery,
    SettlementSummary,
};

use super::ApiResult;
use crate::auth::CurrentActor;
use crate::state::AppState;

/// GET /deliveries/available
pub async fn available(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
) -> ApiResult<AvailableDeliveries> {
    let listing = state.dispatcher.list_available(&actor).await?;
    let message = if listing.courier_busy {
        "You already have an active delivery"
    } else {
        "OK"
    };
    Ok(ApiResponse::success_with_message(message, listing))
}

/// GET /deliveries/current
pub async fn current(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
) -> ApiResult<Option<CurrentDelivery>> {
    Ok(ApiResponse::success(state.dispatcher.current(&actor).await?))
}

/// PUT /deliveries/{order_id}/accept
pub async fn accept(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(order_id): Path<i64>,
) -> ApiResult<ClaimedDelivery> {
    let claimed = state.dispatcher.claim(&actor, order_id).await?;
    Ok(ApiResponse::success_with_message(
        "Delivery accepted; show the pickup code at the store",
        claimed,
    ))
}

/// POST /deliveries/confirm
pub async fn confirm(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Json(req): Json<ConfirmDeliveryRequest>,
) -> ApiResult<SettlementSummary> {
    let summary = state
        .lifecycle
        .confirm_delivery(&actor, req.order_id, &req.confirmation_code)
        .await?;
    Ok(ApiResponse::success_with_message("Delivery confirmed", summary))
}
