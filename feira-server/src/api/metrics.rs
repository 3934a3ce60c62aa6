//! Performance metrics endpoints

use axum::Extension;
use axum::extract::State;
use shared::error::ApiResponse;
use shared::order::{CourierMetrics, SellerMetrics};

use super::ApiResult;
use crate::auth::CurrentActor;
use crate::metrics;
use crate::state::AppState;

/// GET /metrics/seller
pub async fn seller(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
) -> ApiResult<SellerMetrics> {
    let figures =
        metrics::seller_metrics(state.store.as_ref(), state.lifecycle.fees(), &actor).await?;
    Ok(ApiResponse::success(figures))
}

/// GET /metrics/courier
pub async fn courier(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
) -> ApiResult<CourierMetrics> {
    Ok(ApiResponse::success(
        metrics::courier_metrics(state.store.as_ref(), &actor).await?,
    ))
}
