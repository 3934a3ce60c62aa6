//! Buyer-facing tracking phrase, derived from order + delivery state

use shared::order::{DeliveryMethod, DeliveryStatus, OrderStatus};

/// Every phrase a buyer can see while polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingPhase {
    AwaitingPayment,
    BeingPacked,
    PreparingShipment,
    SearchingCourier,
    CourierToStore,
    InTransit,
    SelfDispatched,
    Completed,
}

impl TrackingPhase {
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::AwaitingPayment => "Awaiting payment confirmation.",
            Self::BeingPacked => "Your order is being packed by the seller.",
            Self::PreparingShipment => "Payment confirmed. The seller is preparing the shipment.",
            Self::SearchingCourier => "We are looking for an available courier. Thanks for your patience.",
            Self::CourierToStore => "A courier was found and is on the way to the store to pick up your order.",
            Self::InTransit => "The courier has picked up your order and is on the way to you!",
            Self::SelfDispatched => "The seller has dispatched your order personally. It will arrive soon.",
            Self::Completed => "Order completed! Delivery confirmed.",
        }
    }
}

/// Delivery-side inputs of the projection; all `None` before routing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryView {
    pub status: Option<DeliveryStatus>,
    pub courier_id: Option<i64>,
    pub picked_up_at: Option<i64>,
}

pub fn project(status: OrderStatus, method: DeliveryMethod, delivery: DeliveryView) -> TrackingPhase {
    match status {
        OrderStatus::PendingPayment => TrackingPhase::AwaitingPayment,
        OrderStatus::Completed => TrackingPhase::Completed,
        OrderStatus::Processing => {
            if method.is_courier_routed() && delivery.status.is_some() {
                TrackingPhase::PreparingShipment
            } else {
                TrackingPhase::BeingPacked
            }
        }
        OrderStatus::Delivering => match method {
            DeliveryMethod::Seller => TrackingPhase::SelfDispatched,
            _ if delivery.courier_id.is_none() => TrackingPhase::SearchingCourier,
            _ if delivery.picked_up_at.is_some()
                || delivery.status == Some(DeliveryStatus::PickedUp) =>
            {
                TrackingPhase::InTransit
            }
            _ => TrackingPhase::CourierToStore,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assigned(status: DeliveryStatus, picked_up_at: Option<i64>) -> DeliveryView {
        DeliveryView {
            status: Some(status),
            courier_id: Some(7),
            picked_up_at,
        }
    }

    #[test]
    fn test_terminal_and_initial() {
        assert_eq!(
            project(OrderStatus::PendingPayment, DeliveryMethod::Unset, DeliveryView::default()),
            TrackingPhase::AwaitingPayment
        );
        assert_eq!(
            project(
                OrderStatus::Completed,
                DeliveryMethod::Marketplace,
                assigned(DeliveryStatus::DeliveredConfirmed, Some(1))
            ),
            TrackingPhase::Completed
        );
    }

    #[test]
    fn test_processing_is_packing() {
        assert_eq!(
            project(OrderStatus::Processing, DeliveryMethod::Unset, DeliveryView::default()),
            TrackingPhase::BeingPacked
        );
    }

    #[test]
    fn test_marketplace_progression() {
        let searching = DeliveryView {
            status: Some(DeliveryStatus::Requested),
            ..Default::default()
        };
        assert_eq!(
            project(OrderStatus::Delivering, DeliveryMethod::Marketplace, searching),
            TrackingPhase::SearchingCourier
        );
        assert_eq!(
            project(
                OrderStatus::Delivering,
                DeliveryMethod::Marketplace,
                assigned(DeliveryStatus::Accepted, None)
            ),
            TrackingPhase::CourierToStore
        );
        assert_eq!(
            project(
                OrderStatus::Delivering,
                DeliveryMethod::Marketplace,
                assigned(DeliveryStatus::PickedUp, Some(10))
            ),
            TrackingPhase::InTransit
        );
    }

    #[test]
    fn test_contracted_starts_at_courier_to_store() {
        assert_eq!(
            project(
                OrderStatus::Delivering,
                DeliveryMethod::Contracted,
                assigned(DeliveryStatus::Accepted, None)
            ),
            TrackingPhase::CourierToStore
        );
    }

    #[test]
    fn test_self_delivery() {
        let view = DeliveryView {
            status: Some(DeliveryStatus::Accepted),
            ..Default::default()
        };
        assert_eq!(
            project(OrderStatus::Delivering, DeliveryMethod::Seller, view),
            TrackingPhase::SelfDispatched
        );
    }

    #[test]
    fn test_phrases_distinct() {
        let phases = [
            TrackingPhase::AwaitingPayment,
            TrackingPhase::BeingPacked,
            TrackingPhase::PreparingShipment,
            TrackingPhase::SearchingCourier,
            TrackingPhase::CourierToStore,
            TrackingPhase::InTransit,
            TrackingPhase::SelfDispatched,
            TrackingPhase::Completed,
        ];
        let phrases: std::collections::HashSet<_> = phases.iter().map(|p| p.phrase()).collect();
        assert_eq!(phrases.len(), phases.len());
    }
}
