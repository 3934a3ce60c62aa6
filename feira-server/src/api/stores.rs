//! Store-scoped seller endpoints

use axum::extract::{Path, State};
use axum::{Extension, Json};
use shared::error::ApiResponse;
use shared::order::{ContractCourierRequest, StoreOrderView};

use super::ApiResult;
use crate::auth::CurrentActor;
use crate::state::AppState;

/// PUT /stores/{store_id}/courier
pub async fn contract_courier(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(store_id): Path<i64>,
    Json(req): Json<ContractCourierRequest>,
) -> ApiResult<()> {
    state
        .lifecycle
        .contract_courier(&actor, store_id, req.courier_id)
        .await?;
    let message = match req.courier_id {
        Some(_) => "Courier contracted",
        None => "Courier contract released",
    };
    Ok(ApiResponse::message(message))
}

/// GET /stores/{store_id}/orders
pub async fn store_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(store_id): Path<i64>,
) -> ApiResult<Vec<StoreOrderView>> {
    Ok(ApiResponse::success(
        state.lifecycle.store_orders(&actor, store_id).await?,
    ))
}
