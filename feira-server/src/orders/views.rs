//! Read models built from stored orders

use shared::order::{OrderStatusView, StoreOrderView};

use super::tracking::{self, DeliveryView};
use crate::store::OrderWithDelivery;

fn tracking_phrase(entry: &OrderWithDelivery) -> String {
    let delivery = entry
        .delivery
        .as_ref()
        .map(|d| DeliveryView {
            status: Some(d.status),
            courier_id: d.courier_id,
            picked_up_at: d.picked_up_at,
        })
        .unwrap_or_default();
    tracking::project(entry.order.status, entry.order.delivery_method, delivery)
        .phrase()
        .to_string()
}

/// Buyer view; carries the confirmation code the buyer hands over at the door.
pub fn buyer_view(entry: &OrderWithDelivery) -> OrderStatusView {
    let order = &entry.order;
    OrderStatusView {
        order_id: order.id,
        store_id: order.store_id,
        status: order.status,
        delivery_method: order.delivery_method,
        delivery_status: entry.delivery.as_ref().map(|d| d.status),
        tracking: tracking_phrase(entry),
        total_amount: order.total_amount,
        confirmation_code: order.confirmation_code.clone(),
        created_at: order.created_at,
    }
}

/// Seller view; carries the pickup code, never the confirmation code.
pub fn store_view(entry: &OrderWithDelivery) -> StoreOrderView {
    let order = &entry.order;
    StoreOrderView {
        order_id: order.id,
        buyer_id: order.buyer_id,
        status: order.status,
        delivery_method: order.delivery_method,
        delivery_status: entry.delivery.as_ref().map(|d| d.status),
        courier_id: entry.delivery.as_ref().and_then(|d| d.courier_id),
        tracking: tracking_phrase(entry),
        total_amount: order.total_amount,
        pickup_code: order.pickup_code.clone(),
        delivery_address: order.address.clone(),
        created_at: order.created_at,
    }
}
