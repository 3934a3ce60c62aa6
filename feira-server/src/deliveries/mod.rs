//! Courier side of delivery assignment: queue, claim, current delivery

use std::sync::Arc;

use shared::error::{AppError, ErrorCode};
use shared::models::Role;
use shared::order::{AvailableDeliveries, ClaimedDelivery, CurrentDelivery, DeliveryMethod};

use crate::auth::CurrentActor;
use crate::error::ServiceResult;
use crate::store::{ClaimOutcome, MarketStore};

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn MarketStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Claimable Marketplace deliveries. A busy courier gets an empty list.
    pub async fn list_available(&self, actor: &CurrentActor) -> ServiceResult<AvailableDeliveries> {
        actor.require_role(Role::Courier)?;
        if !actor.is_available {
            return Ok(AvailableDeliveries {
                courier_busy: true,
                deliveries: Vec::new(),
            });
        }
        Ok(AvailableDeliveries {
            courier_busy: false,
            deliveries: self.store.available_deliveries().await?,
        })
    }

    /// Compare-and-set claim; exactly one courier wins a delivery.
    pub async fn claim(&self, actor: &CurrentActor, order_id: i64) -> ServiceResult<ClaimedDelivery> {
        actor.require_role(Role::Courier)?;
        if !actor.is_available {
            return Err(AppError::with_message(
                ErrorCode::CourierUnavailable,
                "Finish your current delivery before accepting another",
            )
            .into());
        }

        let entry = self
            .store
            .find_order(order_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound).with_detail("order_id", order_id))?;
        let is_marketplace = entry
            .delivery
            .as_ref()
            .is_some_and(|d| d.method == DeliveryMethod::Marketplace);
        if !is_marketplace {
            return Err(AppError::new(ErrorCode::DeliveryNotFound)
                .with_detail("order_id", order_id)
                .into());
        }

        match self.store.claim_delivery(order_id, actor.user_id).await? {
            ClaimOutcome::Claimed { pickup_code } => {
                tracing::info!(order_id, courier_id = actor.user_id, "Delivery claimed");
                Ok(ClaimedDelivery {
                    order_id,
                    pickup_code,
                })
            }
            ClaimOutcome::Taken => {
                tracing::info!(order_id, courier_id = actor.user_id, "Claim lost, delivery already taken");
                Err(AppError::new(ErrorCode::DeliveryAlreadyClaimed)
                    .with_detail("order_id", order_id)
                    .into())
            }
            ClaimOutcome::CourierBusy => Err(AppError::new(ErrorCode::CourierUnavailable).into()),
        }
    }

    /// The courier's in-flight delivery. A courier flagged busy without one
    /// is released again.
    pub async fn current(&self, actor: &CurrentActor) -> ServiceResult<Option<CurrentDelivery>> {
        actor.require_role(Role::Courier)?;
        if actor.is_available {
            return Ok(None);
        }
        match self.store.active_delivery(actor.user_id).await? {
            Some(delivery) => Ok(Some(delivery)),
            None => {
                tracing::warn!(courier_id = actor.user_id, "Courier busy without active delivery, releasing");
                self.store.set_courier_available(actor.user_id, true).await?;
                Ok(None)
            }
        }
    }
}
