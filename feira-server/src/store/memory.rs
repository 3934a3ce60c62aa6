//! In-process [`MarketStore`]
//!
//! Every operation takes the single state lock for its whole duration, so
//! each call is atomic exactly like its PostgreSQL transaction counterpart.
//! Used by tests and local tooling; seeding helpers stand in for the
//! catalog/profile CRUD that lives outside this service.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{ProfileAddress, Role};
use shared::order::{
    AvailableDelivery, CurrentDelivery, DeliveryMethod, DeliveryStatus, OrderItemInput,
    OrderStatus,
};
use tokio::sync::Mutex;

use super::{
    ActorRecord, ClaimOutcome, CompleteOutcome, Completion, DeliveryRecord, DeliveryStart,
    DeliveryTiming, MarketStore, NewOrder, OrderRecord, OrderWithDelivery, PaymentOutcome,
    PlaceOutcome, StartOutcome, StoreError, StoreRecord, StoreResult,
};

#[derive(Debug, Clone)]
struct Product {
    store_id: i64,
    stock: i32,
}

#[derive(Default)]
struct State {
    next_id: i64,
    users: HashMap<i64, ActorRecord>,
    stores: HashMap<i64, StoreRecord>,
    products: HashMap<i64, Product>,
    orders: BTreeMap<i64, OrderRecord>,
    items: HashMap<i64, Vec<OrderItemInput>>,
    deliveries: HashMap<i64, DeliveryRecord>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn with_delivery(&self, order: &OrderRecord) -> OrderWithDelivery {
        OrderWithDelivery {
            order: order.clone(),
            delivery: self.deliveries.get(&order.id).cloned(),
        }
    }

    fn is_courier(&self, user_id: i64) -> bool {
        self.users
            .get(&user_id)
            .is_some_and(|u| u.role == Role::Courier)
    }

    fn credit(&mut self, user_id: i64, amount: Decimal) -> StoreResult<()> {
        if amount.is_sign_negative() {
            return Err(StoreError::Corrupt(format!(
                "refusing negative credit {amount} for user {user_id}"
            )));
        }
        let user = self
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::Corrupt(format!("credit target {user_id} missing")))?;
        user.pending_balance += amount;
        Ok(())
    }

    fn timings(&self, mut keep: impl FnMut(&OrderRecord, &DeliveryRecord) -> bool) -> Vec<DeliveryTiming> {
        self.orders
            .values()
            .filter(|o| o.status == OrderStatus::Completed)
            .filter_map(|o| self.deliveries.get(&o.id).map(|d| (o, d)))
            .filter(|(o, d)| keep(o, d))
            .map(|(o, d)| DeliveryTiming {
                method: d.method,
                order_created_at: o.created_at,
                packing_started_at: d.packing_started_at,
                picked_up_at: d.picked_up_at,
                delivered_at: d.delivered_at,
            })
            .collect()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Seeding ====================

    pub async fn add_user(&self, role: Role, address: ProfileAddress) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.users.insert(
            id,
            ActorRecord {
                id,
                role,
                is_available: true,
                pending_balance: Decimal::ZERO,
                address,
            },
        );
        id
    }

    pub async fn add_store(&self, seller_id: i64, name: &str) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.stores.insert(
            id,
            StoreRecord {
                id,
                seller_id,
                name: name.to_string(),
                address: format!("{name}, Centro"),
                contracted_courier_id: None,
            },
        );
        id
    }

    pub async fn add_product(&self, store_id: i64, stock: i32) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.products.insert(id, Product { store_id, stock });
        id
    }

    // ==================== Inspection ====================

    pub async fn stock(&self, product_id: i64) -> Option<i32> {
        self.state
            .lock()
            .await
            .products
            .get(&product_id)
            .map(|p| p.stock)
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn balance(&self, user_id: i64) -> Option<Decimal> {
        self.state
            .lock()
            .await
            .users
            .get(&user_id)
            .map(|u| u.pending_balance)
    }

    pub async fn is_available(&self, user_id: i64) -> Option<bool> {
        self.state
            .lock()
            .await
            .users
            .get(&user_id)
            .map(|u| u.is_available)
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn load_actor(&self, user_id: i64) -> StoreResult<Option<ActorRecord>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn find_store(&self, store_id: i64) -> StoreResult<Option<StoreRecord>> {
        Ok(self.state.lock().await.stores.get(&store_id).cloned())
    }

    async fn set_contracted_courier(
        &self,
        store_id: i64,
        courier_id: Option<i64>,
    ) -> StoreResult<()> {
        if let Some(store) = self.state.lock().await.stores.get_mut(&store_id) {
            store.contracted_courier_id = courier_id;
        }
        Ok(())
    }

    async fn find_order(&self, order_id: i64) -> StoreResult<Option<OrderWithDelivery>> {
        let state = self.state.lock().await;
        Ok(state.orders.get(&order_id).map(|o| state.with_delivery(o)))
    }

    async fn orders_for_buyer(&self, buyer_id: i64) -> StoreResult<Vec<OrderWithDelivery>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .rev()
            .filter(|o| o.buyer_id == buyer_id)
            .map(|o| state.with_delivery(o))
            .collect())
    }

    async fn orders_for_store(&self, store_id: i64) -> StoreResult<Vec<OrderWithDelivery>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .rev()
            .filter(|o| o.store_id == store_id)
            .map(|o| state.with_delivery(o))
            .collect())
    }

    async fn place_order(&self, order: NewOrder) -> StoreResult<PlaceOutcome> {
        let mut state = self.state.lock().await;

        let seller_id = state
            .stores
            .get(&order.store_id)
            .map(|s| s.seller_id)
            .ok_or_else(|| StoreError::Corrupt(format!("store {} missing", order.store_id)))?;

        // Check every line against the running remainder before touching stock.
        let mut remaining: HashMap<i64, i32> = HashMap::new();
        for item in &order.items {
            let Some(product) = state
                .products
                .get(&item.product_id)
                .filter(|p| p.store_id == order.store_id)
            else {
                return Ok(PlaceOutcome::UnknownProduct {
                    product_id: item.product_id,
                });
            };
            let left = remaining.entry(item.product_id).or_insert(product.stock);
            if *left < item.quantity {
                return Ok(PlaceOutcome::OutOfStock {
                    product_id: item.product_id,
                });
            }
            *left -= item.quantity;
        }
        for (product_id, left) in remaining {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.stock = left;
            }
        }

        let order_id = state.next_id();
        state.orders.insert(
            order_id,
            OrderRecord {
                id: order_id,
                buyer_id: order.buyer_id,
                store_id: order.store_id,
                seller_id,
                total_amount: order.total_amount,
                status: order.status,
                delivery_method: DeliveryMethod::Unset,
                payment_transaction_id: None,
                confirmation_code: order.confirmation_code,
                pickup_code: order.pickup_code,
                address: order.address,
                created_at: order.created_at,
            },
        );
        state.items.insert(order_id, order.items);
        Ok(PlaceOutcome::Placed { order_id })
    }

    async fn attach_charge(&self, order_id: i64, transaction_id: &str) -> StoreResult<()> {
        if let Some(order) = self.state.lock().await.orders.get_mut(&order_id) {
            order.payment_transaction_id = Some(transaction_id.to_string());
        }
        Ok(())
    }

    async fn discard_order(&self, order_id: i64) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let discardable = state.orders.get(&order_id).is_some_and(|o| {
            o.status == OrderStatus::PendingPayment && o.payment_transaction_id.is_none()
        });
        if !discardable {
            return Ok(false);
        }

        state.orders.remove(&order_id);
        for item in state.items.remove(&order_id).unwrap_or_default() {
            if let Some(product) = state.products.get_mut(&item.product_id) {
                product.stock += item.quantity;
            }
        }
        Ok(true)
    }

    async fn mark_paid(&self, transaction_id: &str) -> StoreResult<PaymentOutcome> {
        let mut state = self.state.lock().await;
        let Some(order) = state
            .orders
            .values_mut()
            .find(|o| o.payment_transaction_id.as_deref() == Some(transaction_id))
        else {
            return Ok(PaymentOutcome::UnknownTransaction);
        };

        if order.status == OrderStatus::PendingPayment {
            order.status = OrderStatus::Processing;
            Ok(PaymentOutcome::Advanced { order_id: order.id })
        } else {
            Ok(PaymentOutcome::AlreadyApplied {
                order_id: order.id,
                status: order.status,
            })
        }
    }

    async fn start_delivery(&self, start: DeliveryStart) -> StoreResult<StartOutcome> {
        let mut state = self.state.lock().await;

        let processing = state
            .orders
            .get(&start.order_id)
            .is_some_and(|o| o.status == OrderStatus::Processing);
        if !processing {
            return Ok(StartOutcome::NotProcessing);
        }

        if let Some(courier_id) = start.courier_id {
            let free = state.is_courier(courier_id)
                && state.users.get(&courier_id).is_some_and(|u| u.is_available);
            if !free {
                return Ok(StartOutcome::CourierBusy);
            }
            if let Some(courier) = state.users.get_mut(&courier_id) {
                courier.is_available = false;
            }
        }

        if let Some(order) = state.orders.get_mut(&start.order_id) {
            order.status = OrderStatus::Delivering;
            order.delivery_method = start.method;
        }
        state.deliveries.insert(
            start.order_id,
            DeliveryRecord {
                order_id: start.order_id,
                courier_id: start.courier_id,
                status: start.status,
                method: start.method,
                packing_started_at: start.packing_started_at,
                picked_up_at: None,
                delivered_at: None,
                created_at: start.now,
            },
        );
        Ok(StartOutcome::Started)
    }

    async fn confirm_pickup(&self, order_id: i64, now: i64) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let delivering = state
            .orders
            .get(&order_id)
            .is_some_and(|o| o.status == OrderStatus::Delivering);
        let Some(delivery) = state.deliveries.get_mut(&order_id) else {
            return Ok(false);
        };
        if !delivering
            || delivery.status != DeliveryStatus::Accepted
            || delivery.courier_id.is_none()
        {
            return Ok(false);
        }

        delivery.status = DeliveryStatus::PickedUp;
        delivery.picked_up_at = Some(now);
        if delivery.packing_started_at.is_none() {
            delivery.packing_started_at = Some(now);
        }
        Ok(true)
    }

    async fn available_deliveries(&self) -> StoreResult<Vec<AvailableDelivery>> {
        let state = self.state.lock().await;
        let mut queue: Vec<(&DeliveryRecord, &OrderRecord)> = state
            .deliveries
            .values()
            .filter(|d| {
                d.method == DeliveryMethod::Marketplace
                    && d.status == DeliveryStatus::Requested
                    && d.courier_id.is_none()
            })
            .filter_map(|d| state.orders.get(&d.order_id).map(|o| (d, o)))
            .filter(|(_, o)| o.status == OrderStatus::Delivering)
            .collect();
        queue.sort_by_key(|(d, _)| (d.created_at, d.order_id));

        Ok(queue
            .into_iter()
            .filter_map(|(_, o)| {
                let store = state.stores.get(&o.store_id)?;
                Some(AvailableDelivery {
                    order_id: o.id,
                    store_id: store.id,
                    store_name: store.name.clone(),
                    store_address: store.address.clone(),
                    delivery_address: o.address.clone(),
                    total_amount: o.total_amount,
                    created_at: o.created_at,
                })
            })
            .collect())
    }

    async fn claim_delivery(&self, order_id: i64, courier_id: i64) -> StoreResult<ClaimOutcome> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let free = state.is_courier(courier_id)
            && state.users.get(&courier_id).is_some_and(|u| u.is_available);
        if !free {
            return Ok(ClaimOutcome::CourierBusy);
        }

        let Some(pickup_code) = state
            .orders
            .get(&order_id)
            .filter(|o| o.status == OrderStatus::Delivering)
            .map(|o| o.pickup_code.clone())
        else {
            return Ok(ClaimOutcome::Taken);
        };
        let Some(delivery) = state.deliveries.get_mut(&order_id).filter(|d| {
            d.method == DeliveryMethod::Marketplace
                && d.status == DeliveryStatus::Requested
                && d.courier_id.is_none()
        }) else {
            return Ok(ClaimOutcome::Taken);
        };

        delivery.courier_id = Some(courier_id);
        delivery.status = DeliveryStatus::Accepted;
        if let Some(courier) = state.users.get_mut(&courier_id) {
            courier.is_available = false;
        }
        Ok(ClaimOutcome::Claimed { pickup_code })
    }

    async fn active_delivery(&self, courier_id: i64) -> StoreResult<Option<CurrentDelivery>> {
        let state = self.state.lock().await;
        let active = state
            .deliveries
            .values()
            .filter(|d| {
                d.courier_id == Some(courier_id)
                    && matches!(d.status, DeliveryStatus::Accepted | DeliveryStatus::PickedUp)
            })
            .filter_map(|d| state.orders.get(&d.order_id).map(|o| (d, o)))
            .filter(|(_, o)| o.status == OrderStatus::Delivering)
            .max_by_key(|(d, _)| d.created_at);

        Ok(active.and_then(|(d, o)| {
            let store = state.stores.get(&o.store_id)?;
            Some(CurrentDelivery {
                order_id: o.id,
                store_name: store.name.clone(),
                store_address: store.address.clone(),
                delivery_address: o.address.clone(),
                delivery_method: d.method,
                delivery_status: d.status,
                pickup_code: o.pickup_code.clone(),
                total_amount: o.total_amount,
                created_at: o.created_at,
            })
        }))
    }

    async fn set_courier_available(&self, courier_id: i64, available: bool) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if let Some(user) = state
            .users
            .get_mut(&courier_id)
            .filter(|u| u.role == Role::Courier)
        {
            user.is_available = available;
        }
        Ok(())
    }

    async fn complete_delivery(&self, completion: Completion) -> StoreResult<CompleteOutcome> {
        let mut state = self.state.lock().await;

        let current = state
            .deliveries
            .get(&completion.order_id)
            .and_then(|d| d.courier_id);
        if current != completion.courier_id {
            return Ok(CompleteOutcome::CourierChanged { current });
        }
        let delivering = state
            .orders
            .get(&completion.order_id)
            .is_some_and(|o| o.status == OrderStatus::Delivering);
        if !delivering {
            return Ok(CompleteOutcome::NotDelivering);
        }

        // Validate credit targets before mutating anything.
        for user_id in std::iter::once(completion.seller_id).chain(completion.courier_id) {
            if !state.users.contains_key(&user_id) {
                return Err(StoreError::Corrupt(format!("credit target {user_id} missing")));
            }
        }

        state.credit(completion.seller_id, completion.seller_credit)?;
        if let Some(courier_id) = completion.courier_id {
            if !completion.courier_credit.is_zero() {
                state.credit(courier_id, completion.courier_credit)?;
            }
            if let Some(courier) = state.users.get_mut(&courier_id) {
                courier.is_available = true;
            }
        }
        if let Some(order) = state.orders.get_mut(&completion.order_id) {
            order.status = OrderStatus::Completed;
        }
        if let Some(delivery) = state.deliveries.get_mut(&completion.order_id) {
            delivery.status = DeliveryStatus::DeliveredConfirmed;
            delivery.delivered_at = Some(completion.now);
        }
        Ok(CompleteOutcome::Completed)
    }

    async fn seller_timings(&self, seller_id: i64) -> StoreResult<Vec<DeliveryTiming>> {
        let state = self.state.lock().await;
        Ok(state.timings(|o, _| o.seller_id == seller_id))
    }

    async fn courier_timings(&self, courier_id: i64) -> StoreResult<Vec<DeliveryTiming>> {
        let state = self.state.lock().await;
        Ok(state.timings(|_, d| d.courier_id == Some(courier_id)))
    }
}
