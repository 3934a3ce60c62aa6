//! HTTP routes
//!
//! Everything except `/health` and the gateway webhook sits behind
//! [`require_actor`], which loads the caller fresh from storage.

pub mod deliveries;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod stores;
pub mod webhook;

use axum::routing::{get, post, put};
use axum::{Router, middleware};
use shared::error::ApiResponse;
use tower_http::trace::TraceLayer;

use crate::auth::require_actor;
use crate::error::ServiceError;
use crate::state::AppState;

pub type ApiResult<T> = Result<ApiResponse<T>, ServiceError>;

pub fn create_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/orders", post(orders::create_order))
        .route("/orders/simulate", post(orders::create_simulated_order))
        .route("/orders/mine", get(orders::my_orders))
        .route("/orders/{id}/status", get(orders::order_status))
        .route("/orders/{id}/delivery-method", post(orders::set_delivery_method))
        .route("/orders/{id}/dispatch", put(orders::dispatch_self))
        .route("/orders/{id}/confirm-pickup", put(orders::confirm_pickup))
        .route("/orders/{id}/simulate-payment", post(orders::simulate_payment))
        .route("/deliveries/available", get(deliveries::available))
        .route("/deliveries/current", get(deliveries::current))
        .route("/deliveries/{order_id}/accept", put(deliveries::accept))
        .route("/deliveries/confirm", post(deliveries::confirm))
        .route("/stores/{store_id}/courier", put(stores::contract_courier))
        .route("/stores/{store_id}/orders", get(stores::store_orders))
        .route("/metrics/seller", get(metrics::seller))
        .route("/metrics/courier", get(metrics::courier))
        .layer(middleware::from_fn_with_state(state.clone(), require_actor));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/payments/webhook", post(webhook::handle_webhook))
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
