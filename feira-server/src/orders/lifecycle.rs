//! Order lifecycle service
//!
//! ```text
//! PendingPayment ──webhook──▶ Processing ──route / dispatch──▶ Delivering ──confirm──▶ Completed
//! ```
//!
//! Authorization and state checks happen here; every write that could race
//! is delegated to a single guarded [`MarketStore`] call, whose outcome
//! decides the response.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::Role;
use shared::order::{
    CreateOrderRequest, CreateOrderResponse, DeliveryMethod, DeliveryStatus, OrderStatus,
    OrderStatusView, SettlementSummary, StoreOrderView,
};
use shared::util::now_millis;

use super::codes;
use super::settlement::FeeSchedule;
use super::views::{buyer_view, store_view};
use crate::auth::CurrentActor;
use crate::error::{ServiceError, ServiceResult};
use crate::payment::{ChargeRequest, PaymentGateway};
use crate::store::{
    CompleteOutcome, Completion, DeliveryStart, MarketStore, NewOrder, OrderWithDelivery,
    PaymentOutcome, PlaceOutcome, StartOutcome,
};

/// Re-reads allowed when the delivery's courier changes mid-confirmation.
const COMPLETE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub fees: FeeSchedule,
    /// Upper bound on a gateway call; expiry counts as a failed charge
    pub payment_timeout: Duration,
    pub pix_expiry_secs: u64,
    pub allow_simulation: bool,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            fees: FeeSchedule::default(),
            payment_timeout: Duration::from_secs(10),
            pix_expiry_secs: 3600,
            allow_simulation: true,
        }
    }
}

#[derive(Clone)]
pub struct OrderLifecycle {
    store: Arc<dyn MarketStore>,
    gateway: Arc<dyn PaymentGateway>,
    settings: LifecycleSettings,
}

fn validate_request(req: &CreateOrderRequest) -> Result<(), AppError> {
    if req.items.is_empty() {
        return Err(AppError::new(ErrorCode::OrderEmpty));
    }
    if let Some(item) = req.items.iter().find(|i| i.quantity <= 0) {
        return Err(AppError::with_message(
            ErrorCode::ValueOutOfRange,
            "Item quantity must be positive",
        )
        .with_detail("product_id", item.product_id));
    }
    if req.total_amount <= Decimal::ZERO {
        return Err(AppError::new(ErrorCode::OrderInvalidTotal));
    }
    // Charged in centavos and stored as NUMERIC(12,2)
    if req.total_amount.normalize().scale() > 2 {
        return Err(AppError::with_message(
            ErrorCode::OrderInvalidTotal,
            "Order total must have at most 2 decimal places",
        )
        .with_detail("total_amount", req.total_amount.to_string()));
    }
    Ok(())
}

/// Conflict for an order that is not in `expected`.
fn wrong_state(order_id: i64, status: OrderStatus, expected: OrderStatus) -> AppError {
    let code = match status {
        OrderStatus::Completed => ErrorCode::OrderAlreadyCompleted,
        _ => ErrorCode::InvalidOrderTransition,
    };
    AppError::with_message(
        code,
        format!("Order is {status}, expected {expected}"),
    )
    .with_detail("order_id", order_id)
    .with_detail("status", status.as_db())
}

impl OrderLifecycle {
    pub fn new(
        store: Arc<dyn MarketStore>,
        gateway: Arc<dyn PaymentGateway>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    pub fn fees(&self) -> FeeSchedule {
        self.settings.fees
    }

    pub fn simulation_enabled(&self) -> bool {
        self.settings.allow_simulation
    }

    fn require_simulation(&self) -> Result<(), AppError> {
        if self.settings.allow_simulation {
            Ok(())
        } else {
            Err(AppError::new(ErrorCode::SimulationDisabled))
        }
    }

    async fn load_order(&self, order_id: i64) -> ServiceResult<OrderWithDelivery> {
        self.store
            .find_order(order_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound).with_detail("order_id", order_id).into())
    }

    /// Loads an order of a store the seller owns.
    async fn load_seller_order(
        &self,
        actor: &CurrentActor,
        order_id: i64,
    ) -> ServiceResult<OrderWithDelivery> {
        actor.require_role(Role::Seller)?;
        let entry = self.load_order(order_id).await?;
        if entry.order.seller_id != actor.user_id {
            return Err(AppError::not_owner("Order belongs to another store").into());
        }
        Ok(entry)
    }

    // ==================== Creation ====================

    /// Validates, reserves stock and inserts the order with fresh codes.
    async fn place(
        &self,
        actor: &CurrentActor,
        req: CreateOrderRequest,
        status: OrderStatus,
    ) -> ServiceResult<i64> {
        actor.require_role(Role::Buyer)?;
        let address = actor.require_complete_address()?;
        validate_request(&req)?;

        if self.store.find_store(req.store_id).await?.is_none() {
            return Err(AppError::new(ErrorCode::StoreNotFound)
                .with_detail("store_id", req.store_id)
                .into());
        }

        let outcome = self
            .store
            .place_order(NewOrder {
                buyer_id: actor.user_id,
                store_id: req.store_id,
                items: req.items,
                total_amount: req.total_amount,
                status,
                confirmation_code: codes::confirmation_code(),
                pickup_code: codes::pickup_code(),
                address,
                created_at: now_millis(),
            })
            .await?;

        match outcome {
            PlaceOutcome::Placed { order_id } => Ok(order_id),
            PlaceOutcome::UnknownProduct { product_id } => Err(AppError::new(
                ErrorCode::ProductNotFound,
            )
            .with_detail("product_id", product_id)
            .into()),
            PlaceOutcome::OutOfStock { product_id } => Err(AppError::new(
                ErrorCode::ProductOutOfStock,
            )
            .with_detail("product_id", product_id)
            .into()),
        }
    }

    /// Undoes [`Self::place`] after the gateway refused or never answered.
    async fn roll_back(&self, order_id: i64, cause: AppError) -> ServiceError {
        match self.store.discard_order(order_id).await {
            Ok(true) => tracing::info!(order_id, code = %cause.code, "Order rolled back after charge failure"),
            Ok(false) => tracing::warn!(order_id, "Order already left PendingPayment, nothing rolled back"),
            Err(e) => tracing::error!(order_id, error = %e, "Rollback after charge failure failed"),
        }
        cause.into()
    }

    pub async fn create_order(
        &self,
        actor: &CurrentActor,
        req: CreateOrderRequest,
    ) -> ServiceResult<CreateOrderResponse> {
        let total = req.total_amount;
        let order_id = self.place(actor, req, OrderStatus::PendingPayment).await?;

        let Some(charge) = ChargeRequest::for_order(order_id, total, self.settings.pix_expiry_secs)
        else {
            return Err(self
                .roll_back(order_id, AppError::new(ErrorCode::OrderInvalidTotal))
                .await);
        };

        let pix = match tokio::time::timeout(
            self.settings.payment_timeout,
            self.gateway.create_charge(charge),
        )
        .await
        {
            Ok(Ok(pix)) => pix,
            Ok(Err(e)) => {
                tracing::warn!(order_id, error = %e, "PIX charge creation failed");
                return Err(self.roll_back(order_id, AppError::new(ErrorCode::PaymentFailed)).await);
            }
            Err(_) => {
                tracing::warn!(
                    order_id,
                    timeout_secs = self.settings.payment_timeout.as_secs(),
                    "PIX charge creation timed out"
                );
                return Err(self.roll_back(order_id, AppError::new(ErrorCode::PaymentTimeout)).await);
            }
        };

        if let Err(e) = self.store.attach_charge(order_id, &pix.transaction_id).await {
            tracing::error!(order_id, transaction_id = %pix.transaction_id, error = %e, "Could not record PIX charge");
            return Err(self
                .roll_back(order_id, AppError::internal("Could not record the PIX charge"))
                .await);
        }

        tracing::info!(
            order_id,
            buyer_id = actor.user_id,
            transaction_id = %pix.transaction_id,
            total = %total,
            "Order created, awaiting payment"
        );
        Ok(CreateOrderResponse {
            order_id,
            status: OrderStatus::PendingPayment,
            pix: Some(pix),
        })
    }

    /// Charge-less creation: the order starts already `Processing`.
    pub async fn create_simulated_order(
        &self,
        actor: &CurrentActor,
        req: CreateOrderRequest,
    ) -> ServiceResult<CreateOrderResponse> {
        self.require_simulation()?;
        let order_id = self.place(actor, req, OrderStatus::Processing).await?;
        tracing::info!(order_id, buyer_id = actor.user_id, "Simulated order created");
        Ok(CreateOrderResponse {
            order_id,
            status: OrderStatus::Processing,
            pix: None,
        })
    }

    // ==================== Payment ====================

    /// Applies a verified approval. Re-deliveries and unknown ids are no-ops.
    pub async fn on_payment_approved(&self, transaction_id: &str) -> ServiceResult<PaymentOutcome> {
        let outcome = self.store.mark_paid(transaction_id).await?;
        match &outcome {
            PaymentOutcome::Advanced { order_id } => {
                tracing::info!(order_id, transaction_id, "Payment approved, order processing")
            }
            PaymentOutcome::AlreadyApplied { order_id, status } => {
                tracing::info!(order_id, transaction_id, status = %status, "Duplicate payment approval ignored")
            }
            PaymentOutcome::UnknownTransaction => {
                tracing::warn!(transaction_id, "Payment approval for unknown transaction")
            }
        }
        Ok(outcome)
    }

    /// Sandbox: asks the gateway to pay the order's charge. The transition
    /// still arrives through the webhook.
    pub async fn simulate_payment(&self, actor: &CurrentActor, order_id: i64) -> ServiceResult<()> {
        self.require_simulation()?;
        let entry = self.load_order(order_id).await?;
        let order = &entry.order;
        if order.buyer_id != actor.user_id {
            return Err(AppError::new(ErrorCode::OrderNotFound)
                .with_detail("order_id", order_id)
                .into());
        }
        if order.status != OrderStatus::PendingPayment {
            return Err(AppError::new(ErrorCode::OrderAlreadyPaid)
                .with_detail("status", order.status.as_db())
                .into());
        }
        let Some(transaction_id) = order.payment_transaction_id.as_deref() else {
            return Err(AppError::new(ErrorCode::PaymentNotInitiated).into());
        };

        match tokio::time::timeout(
            self.settings.payment_timeout,
            self.gateway.simulate_payment(transaction_id),
        )
        .await
        {
            Ok(Ok(())) => {
                tracing::info!(order_id, transaction_id, "Payment simulation requested");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!(order_id, error = %e, "Payment simulation failed");
                Err(AppError::new(ErrorCode::PaymentFailed).into())
            }
            Err(_) => Err(AppError::new(ErrorCode::PaymentTimeout).into()),
        }
    }

    // ==================== Routing ====================

    async fn start(&self, order_id: i64, start: DeliveryStart) -> ServiceResult<StoreOrderView> {
        let method = start.method;
        let courier_id = start.courier_id;
        match self.store.start_delivery(start).await? {
            StartOutcome::Started => {
                tracing::info!(order_id, method = method.as_db(), courier_id, "Order out for delivery");
                Ok(store_view(&self.load_order(order_id).await?))
            }
            StartOutcome::NotProcessing => {
                let entry = self.load_order(order_id).await?;
                Err(wrong_state(order_id, entry.order.status, OrderStatus::Processing).into())
            }
            StartOutcome::CourierBusy => Err(AppError::new(ErrorCode::CourierUnavailable)
                .with_detail("courier_id", courier_id)
                .into()),
        }
    }

    /// Routes a paid order to the store's contracted courier or the open
    /// Marketplace queue.
    pub async fn set_delivery_method(
        &self,
        actor: &CurrentActor,
        order_id: i64,
        method: DeliveryMethod,
    ) -> ServiceResult<StoreOrderView> {
        let entry = self.load_seller_order(actor, order_id).await?;
        if entry.order.status != OrderStatus::Processing {
            return Err(wrong_state(order_id, entry.order.status, OrderStatus::Processing).into());
        }

        let now = now_millis();
        let start = match method {
            DeliveryMethod::Contracted => {
                let store = self
                    .store
                    .find_store(entry.order.store_id)
                    .await?
                    .ok_or_else(|| AppError::new(ErrorCode::StoreNotFound))?;
                let Some(courier_id) = store.contracted_courier_id else {
                    return Err(AppError::new(ErrorCode::NoContractedCourier).into());
                };
                DeliveryStart {
                    order_id,
                    method,
                    courier_id: Some(courier_id),
                    status: DeliveryStatus::Accepted,
                    packing_started_at: None,
                    now,
                }
            }
            DeliveryMethod::Marketplace => DeliveryStart {
                order_id,
                method,
                courier_id: None,
                status: DeliveryStatus::Requested,
                packing_started_at: None,
                now,
            },
            DeliveryMethod::Seller | DeliveryMethod::Unset => {
                return Err(AppError::with_message(
                    ErrorCode::InvalidDeliveryMethod,
                    "Use dispatch for self-delivery; method must be CONTRACTED or MARKETPLACE",
                )
                .into());
            }
        };
        self.start(order_id, start).await
    }

    /// Seller delivers personally; packing starts now.
    pub async fn dispatch_self(
        &self,
        actor: &CurrentActor,
        order_id: i64,
    ) -> ServiceResult<StoreOrderView> {
        let entry = self.load_seller_order(actor, order_id).await?;
        if entry.order.status != OrderStatus::Processing {
            return Err(wrong_state(order_id, entry.order.status, OrderStatus::Processing).into());
        }
        let now = now_millis();
        self.start(
            order_id,
            DeliveryStart {
                order_id,
                method: DeliveryMethod::Seller,
                courier_id: None,
                status: DeliveryStatus::Accepted,
                packing_started_at: Some(now),
                now,
            },
        )
        .await
    }

    // ==================== Hand-off ====================

    /// Seller checks the courier's pickup code at the store.
    pub async fn confirm_pickup(
        &self,
        actor: &CurrentActor,
        order_id: i64,
        pickup_code: &str,
    ) -> ServiceResult<StoreOrderView> {
        let entry = self.load_seller_order(actor, order_id).await?;
        if entry.order.status != OrderStatus::Delivering {
            return Err(wrong_state(order_id, entry.order.status, OrderStatus::Delivering).into());
        }
        let Some(delivery) = entry.delivery.as_ref().filter(|d| d.courier_id.is_some()) else {
            return Err(AppError::new(ErrorCode::CourierNotAssigned)
                .with_detail("order_id", order_id)
                .into());
        };
        if delivery.status != DeliveryStatus::Accepted {
            return Err(AppError::conflict("Delivery was already picked up")
                .with_detail("order_id", order_id)
                .into());
        }
        if pickup_code != entry.order.pickup_code {
            tracing::warn!(order_id, seller_id = actor.user_id, "Pickup code mismatch");
            return Err(AppError::new(ErrorCode::PickupCodeMismatch).into());
        }

        if !self.store.confirm_pickup(order_id, now_millis()).await? {
            return Err(AppError::conflict("Delivery changed while confirming pickup").into());
        }
        tracing::info!(order_id, courier_id = delivery.courier_id, "Order picked up");
        Ok(store_view(&self.load_order(order_id).await?))
    }

    /// Final confirmation with the buyer's code; settles balances atomically.
    ///
    /// Callable by the buyer, the assigned courier, or (self-delivery only)
    /// the seller. The split is recomputed if a courier claims the delivery
    /// between the read and the write.
    pub async fn confirm_delivery(
        &self,
        actor: &CurrentActor,
        order_id: i64,
        confirmation_code: &str,
    ) -> ServiceResult<SettlementSummary> {
        for _ in 0..COMPLETE_ATTEMPTS {
            let entry = self.load_order(order_id).await?;
            let order = &entry.order;
            let courier_id = entry.delivery.as_ref().and_then(|d| d.courier_id);

            let allowed = order.buyer_id == actor.user_id
                || courier_id == Some(actor.user_id)
                || (order.delivery_method == DeliveryMethod::Seller
                    && order.seller_id == actor.user_id);
            if !allowed {
                return Err(AppError::not_owner("Not a party to this delivery").into());
            }
            if order.status != OrderStatus::Delivering {
                return Err(wrong_state(order_id, order.status, OrderStatus::Delivering).into());
            }
            if confirmation_code != order.confirmation_code {
                tracing::warn!(order_id, actor_id = actor.user_id, "Confirmation code mismatch");
                return Err(AppError::new(ErrorCode::ConfirmationCodeMismatch).into());
            }

            let split = self
                .settings
                .fees
                .settle(order.total_amount, order.delivery_method, courier_id.is_some());
            let outcome = self
                .store
                .complete_delivery(Completion {
                    order_id,
                    seller_id: order.seller_id,
                    seller_credit: split.seller_earnings,
                    courier_id,
                    courier_credit: split.courier_earnings,
                    now: now_millis(),
                })
                .await?;

            match outcome {
                CompleteOutcome::Completed => {
                    tracing::info!(
                        order_id,
                        seller_id = order.seller_id,
                        courier_id,
                        seller_earnings = %split.seller_earnings,
                        courier_earnings = %split.courier_earnings,
                        marketplace_fee = %split.marketplace_fee,
                        "Delivery confirmed, balances settled"
                    );
                    return Ok(SettlementSummary {
                        order_id,
                        seller_earnings: split.seller_earnings,
                        courier_earnings: split.courier_earnings,
                        marketplace_fee: split.marketplace_fee,
                    });
                }
                CompleteOutcome::NotDelivering => {
                    // A concurrent confirmation won
                    return Err(AppError::new(ErrorCode::OrderAlreadyCompleted)
                        .with_detail("order_id", order_id)
                        .into());
                }
                CompleteOutcome::CourierChanged { current } => {
                    tracing::info!(
                        order_id,
                        expected = courier_id,
                        current,
                        "Courier changed during confirmation, re-reading"
                    );
                }
            }
        }

        Err(AppError::conflict("Delivery kept changing while confirming")
            .with_detail("order_id", order_id)
            .into())
    }

    // ==================== Store contract ====================

    pub async fn contract_courier(
        &self,
        actor: &CurrentActor,
        store_id: i64,
        courier_id: Option<i64>,
    ) -> ServiceResult<()> {
        actor.require_role(Role::Seller)?;
        let store = self
            .store
            .find_store(store_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::StoreNotFound).with_detail("store_id", store_id))?;
        if store.seller_id != actor.user_id {
            return Err(AppError::not_owner("Store belongs to another seller").into());
        }

        if let Some(id) = courier_id {
            let is_courier = self
                .store
                .load_actor(id)
                .await?
                .is_some_and(|u| u.role == Role::Courier);
            if !is_courier {
                return Err(AppError::new(ErrorCode::NotACourier)
                    .with_detail("courier_id", id)
                    .into());
            }
        }

        self.store.set_contracted_courier(store_id, courier_id).await?;
        tracing::info!(store_id, courier_id, "Store courier contract updated");
        Ok(())
    }

    // ==================== Reads ====================

    /// Polling endpoint: owning buyer, or any admin.
    pub async fn order_status(
        &self,
        actor: &CurrentActor,
        order_id: i64,
    ) -> ServiceResult<OrderStatusView> {
        let entry = self.load_order(order_id).await?;
        if entry.order.buyer_id != actor.user_id && actor.role != Role::Admin {
            return Err(AppError::new(ErrorCode::OrderNotFound)
                .with_detail("order_id", order_id)
                .into());
        }
        Ok(buyer_view(&entry))
    }

    pub async fn buyer_orders(&self, actor: &CurrentActor) -> ServiceResult<Vec<OrderStatusView>> {
        actor.require_role(Role::Buyer)?;
        let orders = self.store.orders_for_buyer(actor.user_id).await?;
        Ok(orders.iter().map(buyer_view).collect())
    }

    pub async fn store_orders(
        &self,
        actor: &CurrentActor,
        store_id: i64,
    ) -> ServiceResult<Vec<StoreOrderView>> {
        actor.require_role(Role::Seller)?;
        let store = self
            .store
            .find_store(store_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::StoreNotFound).with_detail("store_id", store_id))?;
        if store.seller_id != actor.user_id {
            return Err(AppError::not_owner("Store belongs to another seller").into());
        }
        let orders = self.store.orders_for_store(store_id).await?;
        Ok(orders.iter().map(store_view).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::testing::{FakeGateway, FakeMode};
    use crate::store::{
        ActorRecord, ClaimOutcome, DeliveryTiming, MemoryStore, StoreError, StoreRecord,
        StoreResult,
    };
    use shared::models::ProfileAddress;
    use shared::order::{AvailableDelivery, CurrentDelivery};
    use shared::order::OrderItemInput;

    fn address() -> ProfileAddress {
        ProfileAddress {
            city_id: Some(1),
            district_id: Some(2),
            street: Some("Rua das Flores".into()),
            number: Some("10".into()),
            nearby: None,
            contact_phone: Some("+55 11 99999-0000".into()),
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        gateway: Arc<FakeGateway>,
        lifecycle: OrderLifecycle,
        buyer: CurrentActor,
        seller: CurrentActor,
        store_id: i64,
        product_id: i64,
    }

    async fn actor(store: &MemoryStore, id: i64) -> CurrentActor {
        store.load_actor(id).await.unwrap().unwrap().into()
    }

    async fn fixture(mode: FakeMode) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new(mode));
        let buyer_id = store.add_user(Role::Buyer, address()).await;
        let seller_id = store.add_user(Role::Seller, ProfileAddress::default()).await;
        let store_id = store.add_store(seller_id, "Banca da Ana").await;
        let product_id = store.add_product(store_id, 10).await;
        let settings = LifecycleSettings {
            payment_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let lifecycle = OrderLifecycle::new(store.clone(), gateway.clone(), settings);
        Fixture {
            buyer: actor(&store, buyer_id).await,
            seller: actor(&store, seller_id).await,
            store,
            gateway,
            lifecycle,
            store_id,
            product_id,
        }
    }

    fn request(f: &Fixture, quantity: i32, total: &str) -> CreateOrderRequest {
        CreateOrderRequest {
            store_id: f.store_id,
            items: vec![OrderItemInput {
                product_id: f.product_id,
                quantity,
            }],
            total_amount: total.parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_order_pending_payment() {
        let f = fixture(FakeMode::Approve).await;
        let resp = f.lifecycle.create_order(&f.buyer, request(&f, 2, "50.00")).await.unwrap();
        assert_eq!(resp.status, OrderStatus::PendingPayment);
        assert_eq!(resp.pix.unwrap().transaction_id, "tx1");
        assert_eq!(f.store.stock(f.product_id).await, Some(8));

        let charges = f.gateway.charges().await;
        assert_eq!(charges.len(), 1);
        assert_eq!(charges[0].amount_cents, 5000);
    }

    #[tokio::test]
    async fn test_create_order_rejects_seller() {
        let f = fixture(FakeMode::Approve).await;
        let err = f.lifecycle.create_order(&f.seller, request(&f, 1, "5.00")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RoleRequired);
    }

    #[tokio::test]
    async fn test_create_order_requires_address() {
        let f = fixture(FakeMode::Approve).await;
        let mut buyer = f.buyer.clone();
        buyer.address.contact_phone = None;
        let err = f.lifecycle.create_order(&buyer, request(&f, 1, "5.00")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AddressIncomplete);
        assert_eq!(f.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_order_validation() {
        let f = fixture(FakeMode::Approve).await;
        let mut empty = request(&f, 1, "5.00");
        empty.items.clear();
        assert_eq!(
            f.lifecycle.create_order(&f.buyer, empty).await.unwrap_err().code(),
            ErrorCode::OrderEmpty
        );
        assert_eq!(
            f.lifecycle.create_order(&f.buyer, request(&f, 1, "0")).await.unwrap_err().code(),
            ErrorCode::OrderInvalidTotal
        );
        assert_eq!(
            f.lifecycle.create_order(&f.buyer, request(&f, 0, "5.00")).await.unwrap_err().code(),
            ErrorCode::ValueOutOfRange
        );
    }

    #[tokio::test]
    async fn test_total_beyond_centavos_rejected() {
        let f = fixture(FakeMode::Approve).await;
        let err = f
            .lifecycle
            .create_order(&f.buyer, request(&f, 1, "10.005"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::OrderInvalidTotal);
        assert_eq!(f.store.order_count().await, 0);
        assert_eq!(f.store.stock(f.product_id).await, Some(10));
        assert!(f.gateway.charges().await.is_empty());

        // trailing zeros are fine
        let resp = f
            .lifecycle
            .create_order(&f.buyer, request(&f, 1, "10.5000"))
            .await
            .unwrap();
        assert_eq!(f.gateway.charges().await[0].amount_cents, 1050);
        assert_eq!(resp.status, OrderStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_out_of_stock_leaves_nothing_behind() {
        let f = fixture(FakeMode::Approve).await;
        let err = f.lifecycle.create_order(&f.buyer, request(&f, 11, "500.00")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProductOutOfStock);
        assert_eq!(f.store.stock(f.product_id).await, Some(10));
        assert_eq!(f.store.order_count().await, 0);
        assert!(f.gateway.charges().await.is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_rolls_back() {
        let f = fixture(FakeMode::Reject).await;
        let err = f.lifecycle.create_order(&f.buyer, request(&f, 3, "30.00")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PaymentFailed);
        assert_eq!(f.store.stock(f.product_id).await, Some(10));
        assert_eq!(f.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_gateway_timeout_rolls_back() {
        let f = fixture(FakeMode::Hang).await;
        let err = f.lifecycle.create_order(&f.buyer, request(&f, 3, "30.00")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PaymentTimeout);
        assert_eq!(f.store.stock(f.product_id).await, Some(10));
        assert_eq!(f.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_simulated_order_starts_processing() {
        let f = fixture(FakeMode::Reject).await;
        let resp = f
            .lifecycle
            .create_simulated_order(&f.buyer, request(&f, 1, "10.00"))
            .await
            .unwrap();
        assert_eq!(resp.status, OrderStatus::Processing);
        assert!(resp.pix.is_none());
    }

    #[tokio::test]
    async fn test_simulation_can_be_disabled() {
        let f = fixture(FakeMode::Approve).await;
        let lifecycle = OrderLifecycle::new(
            f.store.clone(),
            f.gateway.clone(),
            LifecycleSettings {
                allow_simulation: false,
                ..Default::default()
            },
        );
        let err = lifecycle
            .create_simulated_order(&f.buyer, request(&f, 1, "10.00"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SimulationDisabled);
    }

    #[tokio::test]
    async fn test_payment_approval_is_idempotent() {
        let f = fixture(FakeMode::Approve).await;
        let order_id = f.lifecycle.create_order(&f.buyer, request(&f, 1, "10.00")).await.unwrap().order_id;

        assert_eq!(
            f.lifecycle.on_payment_approved("tx1").await.unwrap(),
            PaymentOutcome::Advanced { order_id }
        );
        assert_eq!(
            f.lifecycle.on_payment_approved("tx1").await.unwrap(),
            PaymentOutcome::AlreadyApplied {
                order_id,
                status: OrderStatus::Processing
            }
        );
        assert_eq!(
            f.lifecycle.on_payment_approved("nope").await.unwrap(),
            PaymentOutcome::UnknownTransaction
        );
    }

    #[tokio::test]
    async fn test_route_requires_processing() {
        let f = fixture(FakeMode::Approve).await;
        let order_id = f.lifecycle.create_order(&f.buyer, request(&f, 1, "10.00")).await.unwrap().order_id;
        let err = f
            .lifecycle
            .set_delivery_method(&f.seller, order_id, DeliveryMethod::Marketplace)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidOrderTransition);
    }

    #[tokio::test]
    async fn test_contracted_without_courier() {
        let f = fixture(FakeMode::Approve).await;
        let order_id = f
            .lifecycle
            .create_simulated_order(&f.buyer, request(&f, 1, "10.00"))
            .await
            .unwrap()
            .order_id;
        let err = f
            .lifecycle
            .set_delivery_method(&f.seller, order_id, DeliveryMethod::Contracted)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoContractedCourier);
    }

    #[tokio::test]
    async fn test_other_seller_cannot_route() {
        let f = fixture(FakeMode::Approve).await;
        let order_id = f
            .lifecycle
            .create_simulated_order(&f.buyer, request(&f, 1, "10.00"))
            .await
            .unwrap()
            .order_id;
        let other_id = f.store.add_user(Role::Seller, ProfileAddress::default()).await;
        let other = actor(&f.store, other_id).await;
        let err = f.lifecycle.dispatch_self(&other, order_id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotResourceOwner);
    }

    #[tokio::test]
    async fn test_self_delivery_settles_without_courier_fee() {
        let f = fixture(FakeMode::Approve).await;
        let order_id = f
            .lifecycle
            .create_simulated_order(&f.buyer, request(&f, 1, "80.00"))
            .await
            .unwrap()
            .order_id;
        let view = f.lifecycle.dispatch_self(&f.seller, order_id).await.unwrap();
        assert_eq!(view.status, OrderStatus::Delivering);
        assert_eq!(view.delivery_method, DeliveryMethod::Seller);

        let code = f.lifecycle.order_status(&f.buyer, order_id).await.unwrap().confirmation_code;
        // the seller may confirm a self-delivery
        let summary = f.lifecycle.confirm_delivery(&f.seller, order_id, &code).await.unwrap();
        assert_eq!(summary.seller_earnings, "76.00".parse().unwrap());
        assert_eq!(summary.courier_earnings, Decimal::ZERO);
        assert_eq!(f.store.balance(f.seller.user_id).await, Some("76.00".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_pickup_needs_courier() {
        let f = fixture(FakeMode::Approve).await;
        let order_id = f
            .lifecycle
            .create_simulated_order(&f.buyer, request(&f, 1, "10.00"))
            .await
            .unwrap()
            .order_id;
        f.lifecycle.dispatch_self(&f.seller, order_id).await.unwrap();
        let pickup = f.lifecycle.store_orders(&f.seller, f.store_id).await.unwrap()[0].pickup_code.clone();
        let err = f.lifecycle.confirm_pickup(&f.seller, order_id, &pickup).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CourierNotAssigned);
    }

    #[tokio::test]
    async fn test_confirmation_code_mismatch() {
        let f = fixture(FakeMode::Approve).await;
        let order_id = f
            .lifecycle
            .create_simulated_order(&f.buyer, request(&f, 1, "10.00"))
            .await
            .unwrap()
            .order_id;
        f.lifecycle.dispatch_self(&f.seller, order_id).await.unwrap();
        let err = f.lifecycle.confirm_delivery(&f.buyer, order_id, "WRONG!").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfirmationCodeMismatch);
        assert_eq!(f.store.balance(f.seller.user_id).await, Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_stranger_cannot_confirm() {
        let f = fixture(FakeMode::Approve).await;
        let order_id = f
            .lifecycle
            .create_simulated_order(&f.buyer, request(&f, 1, "10.00"))
            .await
            .unwrap()
            .order_id;
        f.lifecycle.dispatch_self(&f.seller, order_id).await.unwrap();
        let code = f.lifecycle.order_status(&f.buyer, order_id).await.unwrap().confirmation_code;
        let stranger_id = f.store.add_user(Role::Buyer, address()).await;
        let stranger = actor(&f.store, stranger_id).await;
        let err = f.lifecycle.confirm_delivery(&stranger, order_id, &code).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotResourceOwner);
    }

    #[tokio::test]
    async fn test_order_status_visibility() {
        let f = fixture(FakeMode::Approve).await;
        let order_id = f.lifecycle.create_order(&f.buyer, request(&f, 1, "10.00")).await.unwrap().order_id;

        let view = f.lifecycle.order_status(&f.buyer, order_id).await.unwrap();
        assert_eq!(view.status, OrderStatus::PendingPayment);
        assert_eq!(view.tracking, super::super::TrackingPhase::AwaitingPayment.phrase());

        let admin_id = f.store.add_user(Role::Admin, ProfileAddress::default()).await;
        let admin = actor(&f.store, admin_id).await;
        assert!(f.lifecycle.order_status(&admin, order_id).await.is_ok());

        let err = f.lifecycle.order_status(&f.seller, order_id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::OrderNotFound);
    }

    #[tokio::test]
    async fn test_contract_courier_checks_role() {
        let f = fixture(FakeMode::Approve).await;
        let err = f
            .lifecycle
            .contract_courier(&f.seller, f.store_id, Some(f.buyer.user_id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotACourier);

        let courier_id = f.store.add_user(Role::Courier, ProfileAddress::default()).await;
        f.lifecycle.contract_courier(&f.seller, f.store_id, Some(courier_id)).await.unwrap();
        let store = f.store.find_store(f.store_id).await.unwrap().unwrap();
        assert_eq!(store.contracted_courier_id, Some(courier_id));

        f.lifecycle.contract_courier(&f.seller, f.store_id, None).await.unwrap();
        let store = f.store.find_store(f.store_id).await.unwrap().unwrap();
        assert_eq!(store.contracted_courier_id, None);
    }

    #[tokio::test]
    async fn test_simulate_payment_forwards_transaction() {
        let f = fixture(FakeMode::Approve).await;
        let order_id = f.lifecycle.create_order(&f.buyer, request(&f, 1, "10.00")).await.unwrap().order_id;
        f.lifecycle.simulate_payment(&f.buyer, order_id).await.unwrap();
        assert_eq!(f.gateway.simulated().await, vec!["tx1".to_string()]);

        f.lifecycle.on_payment_approved("tx1").await.unwrap();
        let err = f.lifecycle.simulate_payment(&f.buyer, order_id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::OrderAlreadyPaid);
    }

    /// Delegates to a [`MemoryStore`], optionally landing a courier claim
    /// right after the next order read or failing `attach_charge`.
    struct Interleaved {
        inner: Arc<MemoryStore>,
        claim_after_read: std::sync::Mutex<Option<i64>>,
        fail_attach: std::sync::atomic::AtomicBool,
    }

    impl Interleaved {
        fn new(inner: Arc<MemoryStore>) -> Self {
            Self {
                inner,
                claim_after_read: std::sync::Mutex::new(None),
                fail_attach: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    #[async_trait::async_trait]
    impl MarketStore for Interleaved {
        async fn load_actor(&self, user_id: i64) -> StoreResult<Option<ActorRecord>> {
            self.inner.load_actor(user_id).await
        }
        async fn find_store(&self, store_id: i64) -> StoreResult<Option<StoreRecord>> {
            self.inner.find_store(store_id).await
        }
        async fn set_contracted_courier(&self, store_id: i64, courier_id: Option<i64>) -> StoreResult<()> {
            self.inner.set_contracted_courier(store_id, courier_id).await
        }
        async fn find_order(&self, order_id: i64) -> StoreResult<Option<OrderWithDelivery>> {
            let snapshot = self.inner.find_order(order_id).await?;
            let armed = self.claim_after_read.lock().unwrap().take();
            if let Some(courier_id) = armed {
                self.inner.claim_delivery(order_id, courier_id).await?;
            }
            Ok(snapshot)
        }
        async fn orders_for_buyer(&self, buyer_id: i64) -> StoreResult<Vec<OrderWithDelivery>> {
            self.inner.orders_for_buyer(buyer_id).await
        }
        async fn orders_for_store(&self, store_id: i64) -> StoreResult<Vec<OrderWithDelivery>> {
            self.inner.orders_for_store(store_id).await
        }
        async fn place_order(&self, order: NewOrder) -> StoreResult<PlaceOutcome> {
            self.inner.place_order(order).await
        }
        async fn attach_charge(&self, order_id: i64, transaction_id: &str) -> StoreResult<()> {
            if self.fail_attach.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::Corrupt("attach refused".into()));
            }
            self.inner.attach_charge(order_id, transaction_id).await
        }
        async fn discard_order(&self, order_id: i64) -> StoreResult<bool> {
            self.inner.discard_order(order_id).await
        }
        async fn mark_paid(&self, transaction_id: &str) -> StoreResult<PaymentOutcome> {
            self.inner.mark_paid(transaction_id).await
        }
        async fn start_delivery(&self, start: DeliveryStart) -> StoreResult<StartOutcome> {
            self.inner.start_delivery(start).await
        }
        async fn confirm_pickup(&self, order_id: i64, now: i64) -> StoreResult<bool> {
            self.inner.confirm_pickup(order_id, now).await
        }
        async fn available_deliveries(&self) -> StoreResult<Vec<AvailableDelivery>> {
            self.inner.available_deliveries().await
        }
        async fn claim_delivery(&self, order_id: i64, courier_id: i64) -> StoreResult<ClaimOutcome> {
            self.inner.claim_delivery(order_id, courier_id).await
        }
        async fn active_delivery(&self, courier_id: i64) -> StoreResult<Option<CurrentDelivery>> {
            self.inner.active_delivery(courier_id).await
        }
        async fn set_courier_available(&self, courier_id: i64, available: bool) -> StoreResult<()> {
            self.inner.set_courier_available(courier_id, available).await
        }
        async fn complete_delivery(&self, completion: Completion) -> StoreResult<CompleteOutcome> {
            self.inner.complete_delivery(completion).await
        }
        async fn seller_timings(&self, seller_id: i64) -> StoreResult<Vec<DeliveryTiming>> {
            self.inner.seller_timings(seller_id).await
        }
        async fn courier_timings(&self, courier_id: i64) -> StoreResult<Vec<DeliveryTiming>> {
            self.inner.courier_timings(courier_id).await
        }
    }

    #[tokio::test]
    async fn test_claim_landing_mid_confirmation_is_settled() {
        let f = fixture(FakeMode::Approve).await;
        let store = Arc::new(Interleaved::new(f.store.clone()));
        let lifecycle = OrderLifecycle::new(store.clone(), f.gateway.clone(), LifecycleSettings::default());

        let order_id = lifecycle
            .create_simulated_order(&f.buyer, request(&f, 1, "20.00"))
            .await
            .unwrap()
            .order_id;
        lifecycle
            .set_delivery_method(&f.seller, order_id, DeliveryMethod::Marketplace)
            .await
            .unwrap();
        let code = f.store.find_order(order_id).await.unwrap().unwrap().order.confirmation_code;

        // buyer reads an unassigned delivery, then a courier claims it
        let courier_id = f.store.add_user(Role::Courier, ProfileAddress::default()).await;
        *store.claim_after_read.lock().unwrap() = Some(courier_id);

        let summary = lifecycle.confirm_delivery(&f.buyer, order_id, &code).await.unwrap();
        assert_eq!(summary.courier_earnings, "5.00".parse::<Decimal>().unwrap());
        assert_eq!(summary.seller_earnings, "14.00".parse::<Decimal>().unwrap());
        assert_eq!(f.store.balance(courier_id).await, Some("5.00".parse().unwrap()));
        assert_eq!(f.store.balance(f.seller.user_id).await, Some("14.00".parse().unwrap()));
        assert_eq!(f.store.is_available(courier_id).await, Some(true));

        let entry = f.store.find_order(order_id).await.unwrap().unwrap();
        assert_eq!(entry.order.status, OrderStatus::Completed);
        assert_eq!(entry.delivery.unwrap().courier_id, Some(courier_id));
    }

    #[tokio::test]
    async fn test_failed_charge_recording_rolls_back() {
        let f = fixture(FakeMode::Approve).await;
        let store = Arc::new(Interleaved::new(f.store.clone()));
        store.fail_attach.store(true, std::sync::atomic::Ordering::SeqCst);
        let lifecycle = OrderLifecycle::new(store, f.gateway.clone(), LifecycleSettings::default());

        let err = lifecycle
            .create_order(&f.buyer, request(&f, 4, "40.00"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert_eq!(f.store.order_count().await, 0);
        assert_eq!(f.store.stock(f.product_id).await, Some(10));
    }
}
