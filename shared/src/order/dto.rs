//! Request and response payloads for the order & delivery API

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::status::{DeliveryMethod, DeliveryStatus, OrderStatus};
use crate::models::AddressSnapshot;

// ============================================================================
// Order creation
// ============================================================================

/// One line of a purchase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItemInput {
    pub product_id: i64,
    pub quantity: i32,
}

/// POST /orders body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub store_id: i64,
    pub items: Vec<OrderItemInput>,
    pub total_amount: Decimal,
}

/// PIX presentment data returned by the payment gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PixCharge {
    pub transaction_id: String,
    /// Copy-and-paste PIX payload
    pub br_code: String,
    /// QR image, base64 encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub br_code_base64: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_id: i64,
    pub status: OrderStatus,
    /// Absent on the simulation path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix: Option<PixCharge>,
}

// ============================================================================
// Seller / courier / buyer actions
// ============================================================================

/// POST /orders/{id}/delivery-method body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryMethodRequest {
    pub method: DeliveryMethod,
}

/// PUT /orders/{id}/confirm-pickup body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmPickupRequest {
    pub pickup_code: String,
}

/// POST /deliveries/confirm body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmDeliveryRequest {
    pub order_id: i64,
    pub confirmation_code: String,
}

/// PUT /stores/{id}/courier body; `None` releases the contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractCourierRequest {
    pub courier_id: Option<i64>,
}

/// Returned to the courier who wins a claim
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimedDelivery {
    pub order_id: i64,
    pub pickup_code: String,
}

/// Balances credited by a completed delivery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettlementSummary {
    pub order_id: i64,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub seller_earnings: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub courier_earnings: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub marketplace_fee: Decimal,
}

// ============================================================================
// Views
// ============================================================================

/// Buyer-facing order state (polling + "my orders")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusView {
    pub order_id: i64,
    pub store_id: i64,
    pub status: OrderStatus,
    pub delivery_method: DeliveryMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<DeliveryStatus>,
    pub tracking: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub total_amount: Decimal,
    /// Handed to the courier at the door; only the buyer sees it
    pub confirmation_code: String,
    pub created_at: i64,
}

/// Seller-facing order row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreOrderView {
    pub order_id: i64,
    pub buyer_id: i64,
    pub status: OrderStatus,
    pub delivery_method: DeliveryMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<DeliveryStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courier_id: Option<i64>,
    pub tracking: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub total_amount: Decimal,
    /// Checked by the seller when the courier arrives
    pub pickup_code: String,
    pub delivery_address: AddressSnapshot,
    pub created_at: i64,
}

/// A Marketplace delivery waiting for a courier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableDelivery {
    pub order_id: i64,
    pub store_id: i64,
    pub store_name: String,
    pub store_address: String,
    pub delivery_address: AddressSnapshot,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub total_amount: Decimal,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableDeliveries {
    pub courier_busy: bool,
    pub deliveries: Vec<AvailableDelivery>,
}

/// The courier's in-flight delivery (never carries the confirmation code)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentDelivery {
    pub order_id: i64,
    pub store_name: String,
    pub store_address: String,
    pub delivery_address: AddressSnapshot,
    pub delivery_method: DeliveryMethod,
    pub delivery_status: DeliveryStatus,
    pub pickup_code: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub total_amount: Decimal,
    pub created_at: i64,
}

// ============================================================================
// Metrics
// ============================================================================

/// Formatted duration statistics (`"1h 2m 3s"` or `"N/A"`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DurationStats {
    pub avg: String,
    pub min: String,
    pub max: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerMetrics {
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub pending_balance: Decimal,
    pub completed_orders: usize,
    pub avg_packing_time: String,
    pub self_delivery: DurationStats,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub marketplace_fee_rate: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub courier_fee: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierMetrics {
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub pending_balance: Decimal,
    pub completed_deliveries: usize,
    pub delivery_time: DurationStats,
    pub avg_pickup_speed: String,
}
