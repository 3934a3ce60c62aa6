//! Storage layer for the order & delivery lifecycle
//!
//! Every method of [`MarketStore`] is one atomic unit: it either applies all
//! of its writes or none of them. State guards (`status = ...`,
//! `courier_id IS NULL`, `is_available`) are evaluated inside that unit, so
//! two concurrent callers can never both win the same transition.
//!
//! Two implementations:
//! - [`PgStore`]: PostgreSQL, conditional UPDATEs checked via `rows_affected()`
//! - [`MemoryStore`]: in-process, same semantics under one mutex (tests)

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{AddressSnapshot, ProfileAddress, Role};
use shared::order::{
    AvailableDelivery, CurrentDelivery, DeliveryMethod, DeliveryStatus, OrderItemInput,
    OrderStatus,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Records
// ============================================================================

/// A user row as the lifecycle sees it
#[derive(Debug, Clone)]
pub struct ActorRecord {
    pub id: i64,
    pub role: Role,
    pub is_available: bool,
    pub pending_balance: Decimal,
    pub address: ProfileAddress,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoreRecord {
    pub id: i64,
    pub seller_id: i64,
    pub name: String,
    pub address: String,
    pub contracted_courier_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub id: i64,
    pub buyer_id: i64,
    pub store_id: i64,
    /// Owner of `store_id`, joined at read time
    pub seller_id: i64,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub delivery_method: DeliveryMethod,
    pub payment_transaction_id: Option<String>,
    pub confirmation_code: String,
    pub pickup_code: String,
    pub address: AddressSnapshot,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub order_id: i64,
    pub courier_id: Option<i64>,
    pub status: DeliveryStatus,
    pub method: DeliveryMethod,
    pub packing_started_at: Option<i64>,
    pub picked_up_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub created_at: i64,
}

/// An order and its (lazily created) delivery
#[derive(Debug, Clone)]
pub struct OrderWithDelivery {
    pub order: OrderRecord,
    pub delivery: Option<DeliveryRecord>,
}

/// Timestamps of one completed delivery, for metrics
#[derive(Debug, Clone, Copy)]
pub struct DeliveryTiming {
    pub method: DeliveryMethod,
    pub order_created_at: i64,
    pub packing_started_at: Option<i64>,
    pub picked_up_at: Option<i64>,
    pub delivered_at: Option<i64>,
}

// ============================================================================
// Commands & outcomes
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub buyer_id: i64,
    pub store_id: i64,
    pub items: Vec<OrderItemInput>,
    pub total_amount: Decimal,
    /// `PendingPayment` for real charges, `Processing` for simulations
    pub status: OrderStatus,
    pub confirmation_code: String,
    pub pickup_code: String,
    pub address: AddressSnapshot,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceOutcome {
    Placed { order_id: i64 },
    UnknownProduct { product_id: i64 },
    OutOfStock { product_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// `PendingPayment → Processing` applied now
    Advanced { order_id: i64 },
    /// Order already moved past `PendingPayment`
    AlreadyApplied { order_id: i64, status: OrderStatus },
    UnknownTransaction,
}

/// Routes a `Processing` order into `Delivering`
#[derive(Debug, Clone)]
pub struct DeliveryStart {
    pub order_id: i64,
    pub method: DeliveryMethod,
    /// Pre-assigned courier (Contracted only)
    pub courier_id: Option<i64>,
    pub status: DeliveryStatus,
    pub packing_started_at: Option<i64>,
    pub now: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// Order is no longer `Processing`
    NotProcessing,
    /// Pre-assigned courier already holds an active delivery
    CourierBusy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed { pickup_code: String },
    /// Delivery is assigned, not Requested, or not a Marketplace delivery
    Taken,
    CourierBusy,
}

/// Settlement + completion, applied together or not at all
#[derive(Debug, Clone)]
pub struct Completion {
    pub order_id: i64,
    pub seller_id: i64,
    pub seller_credit: Decimal,
    /// Courier the split was computed for. The delivery must still carry
    /// exactly this courier when the completion applies.
    pub courier_id: Option<i64>,
    pub courier_credit: Decimal,
    pub now: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleteOutcome {
    Completed,
    /// Order is no longer `Delivering`
    NotDelivering,
    /// The delivery's courier changed after the split was computed
    CourierChanged { current: Option<i64> },
}

// ============================================================================
// Trait
// ============================================================================

#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Fresh read of a user's role, availability, balance and address.
    async fn load_actor(&self, user_id: i64) -> StoreResult<Option<ActorRecord>>;

    async fn find_store(&self, store_id: i64) -> StoreResult<Option<StoreRecord>>;

    /// Sets (or clears) a store's pre-hired courier.
    async fn set_contracted_courier(
        &self,
        store_id: i64,
        courier_id: Option<i64>,
    ) -> StoreResult<()>;

    async fn find_order(&self, order_id: i64) -> StoreResult<Option<OrderWithDelivery>>;

    /// Newest first.
    async fn orders_for_buyer(&self, buyer_id: i64) -> StoreResult<Vec<OrderWithDelivery>>;

    /// Newest first.
    async fn orders_for_store(&self, store_id: i64) -> StoreResult<Vec<OrderWithDelivery>>;

    /// Inserts the order and decrements stock for every line, all or nothing.
    async fn place_order(&self, order: NewOrder) -> StoreResult<PlaceOutcome>;

    async fn attach_charge(&self, order_id: i64, transaction_id: &str) -> StoreResult<()>;

    /// Compensating rollback of [`MarketStore::place_order`]: restores stock
    /// and removes the order, as long as no charge was attached to it.
    async fn discard_order(&self, order_id: i64) -> StoreResult<bool>;

    /// `PendingPayment → Processing` for the order holding `transaction_id`.
    async fn mark_paid(&self, transaction_id: &str) -> StoreResult<PaymentOutcome>;

    async fn start_delivery(&self, start: DeliveryStart) -> StoreResult<StartOutcome>;

    /// `Accepted → PickedUp` on a courier-assigned delivery of a `Delivering` order.
    async fn confirm_pickup(&self, order_id: i64, now: i64) -> StoreResult<bool>;

    /// Marketplace deliveries still waiting for a courier, oldest first.
    async fn available_deliveries(&self) -> StoreResult<Vec<AvailableDelivery>>;

    /// Compare-and-set claim of a Requested, unassigned Marketplace delivery.
    async fn claim_delivery(&self, order_id: i64, courier_id: i64) -> StoreResult<ClaimOutcome>;

    /// The courier's assigned, not yet confirmed delivery on a `Delivering` order.
    async fn active_delivery(&self, courier_id: i64) -> StoreResult<Option<CurrentDelivery>>;

    async fn set_courier_available(&self, courier_id: i64, available: bool) -> StoreResult<()>;

    /// `Delivering → Completed` plus balance credits and courier release.
    /// Writes nothing unless the order is `Delivering` and the delivery's
    /// courier still matches `completion.courier_id`.
    async fn complete_delivery(&self, completion: Completion) -> StoreResult<CompleteOutcome>;

    async fn seller_timings(&self, seller_id: i64) -> StoreResult<Vec<DeliveryTiming>>;

    async fn courier_timings(&self, courier_id: i64) -> StoreResult<Vec<DeliveryTiming>>;
}
