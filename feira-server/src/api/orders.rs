//! Buyer and seller order endpoints

use axum::extract::{Path, State};
use axum::{Extension, Json};
use shared::error::ApiResponse;
use shared::order::{
    ConfirmPickupRequest, CreateOrderRequest, CreateOrderResponse, DeliveryMethodRequest,
    OrderStatusView, StoreOrderView,
};

use super::ApiResult;
use crate::auth::CurrentActor;
use crate::state::AppState;

/// POST /orders
pub async fn create_order(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<CreateOrderResponse> {
    let created = state.lifecycle.create_order(&actor, req).await?;
    Ok(ApiResponse::success_with_message(
        "Order created, waiting for PIX payment",
        created,
    ))
}

/// POST /orders/simulate
pub async fn create_simulated_order(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<CreateOrderResponse> {
    let created = state.lifecycle.create_simulated_order(&actor, req).await?;
    Ok(ApiResponse::success_with_message(
        "Simulated order created",
        created,
    ))
}

/// GET /orders/mine
pub async fn my_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
) -> ApiResult<Vec<OrderStatusView>> {
    Ok(ApiResponse::success(state.lifecycle.buyer_orders(&actor).await?))
}

/// GET /orders/{id}/status
pub async fn order_status(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(order_id): Path<i64>,
) -> ApiResult<OrderStatusView> {
    Ok(ApiResponse::success(
        state.lifecycle.order_status(&actor, order_id).await?,
    ))
}

/// POST /orders/{id}/delivery-method
pub async fn set_delivery_method(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(order_id): Path<i64>,
    Json(req): Json<DeliveryMethodRequest>,
) -> ApiResult<StoreOrderView> {
    let view = state
        .lifecycle
        .set_delivery_method(&actor, order_id, req.method)
        .await?;
    Ok(ApiResponse::success_with_message("Delivery method set", view))
}

/// PUT /orders/{id}/dispatch
pub async fn dispatch_self(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(order_id): Path<i64>,
) -> ApiResult<StoreOrderView> {
    let view = state.lifecycle.dispatch_self(&actor, order_id).await?;
    Ok(ApiResponse::success_with_message("Order dispatched by the seller", view))
}

/// PUT /orders/{id}/confirm-pickup
pub async fn confirm_pickup(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(order_id): Path<i64>,
    Json(req): Json<ConfirmPickupRequest>,
) -> ApiResult<StoreOrderView> {
    let view = state
        .lifecycle
        .confirm_pickup(&actor, order_id, &req.pickup_code)
        .await?;
    Ok(ApiResponse::success_with_message("Pickup confirmed", view))
}

/// POST /orders/{id}/simulate-payment
pub async fn simulate_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(order_id): Path<i64>,
) -> ApiResult<()> {
    state.lifecycle.simulate_payment(&actor, order_id).await?;
    Ok(ApiResponse::message(
        "Payment simulation requested; the webhook will confirm it",
    ))
}
