//! PostgreSQL implementation of [`MarketStore`]
//!
//! Multi-statement units run in a transaction; every guarded write is a
//! conditional UPDATE whose `rows_affected()` decides the outcome.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{AddressSnapshot, ProfileAddress, Role};
use shared::order::{
    AvailableDelivery, CurrentDelivery, DeliveryMethod, DeliveryStatus, OrderStatus,
};
use sqlx::{PgPool, Postgres, Transaction};

use super::{
    ActorRecord, ClaimOutcome, CompleteOutcome, Completion, DeliveryRecord, DeliveryStart,
    DeliveryTiming, MarketStore, NewOrder, OrderRecord, OrderWithDelivery, PaymentOutcome,
    PlaceOutcome, StartOutcome, StoreError, StoreRecord, StoreResult,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse<T>(raw: &str, what: &str, f: impl Fn(&str) -> Option<T>) -> StoreResult<T> {
    f(raw).ok_or_else(|| StoreError::Corrupt(format!("unknown {what} '{raw}'")))
}

/// Credit a user's pending balance inside the caller's transaction.
async fn ledger_credit(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    amount: Decimal,
) -> StoreResult<()> {
    if amount.is_sign_negative() {
        return Err(StoreError::Corrupt(format!(
            "refusing negative credit {amount} for user {user_id}"
        )));
    }
    let updated = sqlx::query("UPDATE users SET pending_balance = pending_balance + $2 WHERE id = $1")
        .bind(user_id)
        .bind(amount)
        .execute(&mut **tx)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(StoreError::Corrupt(format!("credit target {user_id} missing")));
    }
    Ok(())
}

// ============================================================================
// Rows
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    role: String,
    is_available: bool,
    pending_balance: Decimal,
    city_id: Option<i64>,
    district_id: Option<i64>,
    address_street: Option<String>,
    address_number: Option<String>,
    address_nearby: Option<String>,
    contact_phone: Option<String>,
}

impl UserRow {
    fn into_record(self) -> StoreResult<ActorRecord> {
        Ok(ActorRecord {
            id: self.id,
            role: parse(&self.role, "role", Role::from_db)?,
            is_available: self.is_available,
            pending_balance: self.pending_balance,
            address: ProfileAddress {
                city_id: self.city_id,
                district_id: self.district_id,
                street: self.address_street,
                number: self.address_number,
                nearby: self.address_nearby,
                contact_phone: self.contact_phone,
            },
        })
    }
}

const ORDER_SELECT: &str = r#"
    SELECT o.id, o.buyer_id, o.store_id, s.seller_id, o.total_amount, o.status,
           o.delivery_method, o.payment_transaction_id, o.confirmation_code, o.pickup_code,
           o.city_id, o.district_id, o.address_street, o.address_number, o.address_nearby,
           o.contact_phone, o.created_at,
           d.order_id AS d_order_id, d.courier_id AS d_courier_id, d.status AS d_status,
           d.delivery_method AS d_method, d.packing_started_at AS d_packing_started_at,
           d.picked_up_at AS d_picked_up_at, d.delivered_at AS d_delivered_at,
           d.created_at AS d_created_at
    FROM orders o
    JOIN stores s ON s.id = o.store_id
    LEFT JOIN deliveries d ON d.order_id = o.id
"#;

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    buyer_id: i64,
    store_id: i64,
    seller_id: i64,
    total_amount: Decimal,
    status: String,
    delivery_method: String,
    payment_transaction_id: Option<String>,
    confirmation_code: String,
    pickup_code: String,
    city_id: i64,
    district_id: i64,
    address_street: String,
    address_number: String,
    address_nearby: Option<String>,
    contact_phone: String,
    created_at: i64,
    d_order_id: Option<i64>,
    d_courier_id: Option<i64>,
    d_status: Option<String>,
    d_method: Option<String>,
    d_packing_started_at: Option<i64>,
    d_picked_up_at: Option<i64>,
    d_delivered_at: Option<i64>,
    d_created_at: Option<i64>,
}

impl OrderRow {
    fn into_record(self) -> StoreResult<OrderWithDelivery> {
        let delivery = match (self.d_order_id, self.d_status, self.d_method) {
            (Some(order_id), Some(status), Some(method)) => Some(DeliveryRecord {
                order_id,
                courier_id: self.d_courier_id,
                status: parse(&status, "delivery status", DeliveryStatus::from_db)?,
                method: parse(&method, "delivery method", DeliveryMethod::from_db)?,
                packing_started_at: self.d_packing_started_at,
                picked_up_at: self.d_picked_up_at,
                delivered_at: self.d_delivered_at,
                created_at: self.d_created_at.unwrap_or(self.created_at),
            }),
            _ => None,
        };

        Ok(OrderWithDelivery {
            order: OrderRecord {
                id: self.id,
                buyer_id: self.buyer_id,
                store_id: self.store_id,
                seller_id: self.seller_id,
                total_amount: self.total_amount,
                status: parse(&self.status, "order status", OrderStatus::from_db)?,
                delivery_method: parse(
                    &self.delivery_method,
                    "delivery method",
                    DeliveryMethod::from_db,
                )?,
                payment_transaction_id: self.payment_transaction_id,
                confirmation_code: self.confirmation_code,
                pickup_code: self.pickup_code,
                address: AddressSnapshot {
                    city_id: self.city_id,
                    district_id: self.district_id,
                    street: self.address_street,
                    number: self.address_number,
                    nearby: self.address_nearby,
                    contact_phone: self.contact_phone,
                },
                created_at: self.created_at,
            },
            delivery,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QueueRow {
    order_id: i64,
    store_id: i64,
    store_name: String,
    store_address: String,
    total_amount: Decimal,
    created_at: i64,
    city_id: i64,
    district_id: i64,
    address_street: String,
    address_number: String,
    address_nearby: Option<String>,
    contact_phone: String,
}

#[derive(sqlx::FromRow)]
struct ActiveRow {
    order_id: i64,
    store_name: String,
    store_address: String,
    delivery_method: String,
    status: String,
    pickup_code: String,
    total_amount: Decimal,
    created_at: i64,
    city_id: i64,
    district_id: i64,
    address_street: String,
    address_number: String,
    address_nearby: Option<String>,
    contact_phone: String,
}

type TimingRow = (String, i64, Option<i64>, Option<i64>, Option<i64>);

fn timing(row: TimingRow) -> StoreResult<DeliveryTiming> {
    let (method, order_created_at, packing_started_at, picked_up_at, delivered_at) = row;
    Ok(DeliveryTiming {
        method: parse(&method, "delivery method", DeliveryMethod::from_db)?,
        order_created_at,
        packing_started_at,
        picked_up_at,
        delivered_at,
    })
}

// ============================================================================
// MarketStore
// ============================================================================

#[async_trait]
impl MarketStore for PgStore {
    async fn load_actor(&self, user_id: i64) -> StoreResult<Option<ActorRecord>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"SELECT id, role, is_available, pending_balance, city_id, district_id,
                      address_street, address_number, address_nearby, contact_phone
               FROM users WHERE id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRow::into_record).transpose()
    }

    async fn find_store(&self, store_id: i64) -> StoreResult<Option<StoreRecord>> {
        let store = sqlx::query_as(
            "SELECT id, seller_id, name, address, contracted_courier_id FROM stores WHERE id = $1",
        )
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(store)
    }

    async fn set_contracted_courier(
        &self,
        store_id: i64,
        courier_id: Option<i64>,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE stores SET contracted_courier_id = $2 WHERE id = $1")
            .bind(store_id)
            .bind(courier_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_order(&self, order_id: i64) -> StoreResult<Option<OrderWithDelivery>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!("{ORDER_SELECT} WHERE o.id = $1"))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(OrderRow::into_record).transpose()
    }

    async fn orders_for_buyer(&self, buyer_id: i64) -> StoreResult<Vec<OrderWithDelivery>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "{ORDER_SELECT} WHERE o.buyer_id = $1 ORDER BY o.created_at DESC, o.id DESC"
        ))
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(OrderRow::into_record).collect()
    }

    async fn orders_for_store(&self, store_id: i64) -> StoreResult<Vec<OrderWithDelivery>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "{ORDER_SELECT} WHERE o.store_id = $1 ORDER BY o.created_at DESC, o.id DESC"
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(OrderRow::into_record).collect()
    }

    async fn place_order(&self, order: NewOrder) -> StoreResult<PlaceOutcome> {
        let mut tx = self.pool.begin().await?;

        let order_id: i64 = sqlx::query_scalar(
            r#"INSERT INTO orders (
                   buyer_id, store_id, total_amount, status, delivery_method,
                   confirmation_code, pickup_code, city_id, district_id, address_street,
                   address_number, address_nearby, contact_phone, created_at
               ) VALUES ($1, $2, $3, $4, 'unset', $5, $6, $7, $8, $9, $10, $11, $12, $13)
               RETURNING id"#,
        )
        .bind(order.buyer_id)
        .bind(order.store_id)
        .bind(order.total_amount)
        .bind(order.status.as_db())
        .bind(&order.confirmation_code)
        .bind(&order.pickup_code)
        .bind(order.address.city_id)
        .bind(order.address.district_id)
        .bind(&order.address.street)
        .bind(&order.address.number)
        .bind(&order.address.nearby)
        .bind(&order.address.contact_phone)
        .bind(order.created_at)
        .fetch_one(&mut *tx)
        .await?;

        for item in &order.items {
            let updated = sqlx::query(
                r#"UPDATE products SET stock_quantity = stock_quantity - $1
                   WHERE id = $2 AND store_id = $3 AND stock_quantity >= $1"#,
            )
            .bind(item.quantity)
            .bind(item.product_id)
            .bind(order.store_id)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND store_id = $2)",
                )
                .bind(item.product_id)
                .bind(order.store_id)
                .fetch_one(&mut *tx)
                .await?;
                tx.rollback().await?;
                return Ok(if exists {
                    PlaceOutcome::OutOfStock {
                        product_id: item.product_id,
                    }
                } else {
                    PlaceOutcome::UnknownProduct {
                        product_id: item.product_id,
                    }
                });
            }

            sqlx::query("INSERT INTO order_items (order_id, product_id, quantity) VALUES ($1, $2, $3)")
                .bind(order_id)
                .bind(item.product_id)
                .bind(item.quantity)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(PlaceOutcome::Placed { order_id })
    }

    async fn attach_charge(&self, order_id: i64, transaction_id: &str) -> StoreResult<()> {
        sqlx::query("UPDATE orders SET payment_transaction_id = $2 WHERE id = $1")
            .bind(order_id)
            .bind(transaction_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn discard_order(&self, order_id: i64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<i64> = sqlx::query_scalar(
            r#"SELECT id FROM orders
               WHERE id = $1 AND status = 'pending_payment' AND payment_transaction_id IS NULL
               FOR UPDATE"#,
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"UPDATE products p SET stock_quantity = p.stock_quantity + i.qty
               FROM (SELECT product_id, SUM(quantity) AS qty
                     FROM order_items WHERE order_id = $1 GROUP BY product_id) i
               WHERE p.id = i.product_id"#,
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn mark_paid(&self, transaction_id: &str) -> StoreResult<PaymentOutcome> {
        let advanced: Option<i64> = sqlx::query_scalar(
            r#"UPDATE orders SET status = 'processing'
               WHERE payment_transaction_id = $1 AND status = 'pending_payment'
               RETURNING id"#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(order_id) = advanced {
            return Ok(PaymentOutcome::Advanced { order_id });
        }

        let existing: Option<(i64, String)> =
            sqlx::query_as("SELECT id, status FROM orders WHERE payment_transaction_id = $1")
                .bind(transaction_id)
                .fetch_optional(&self.pool)
                .await?;
        match existing {
            Some((order_id, status)) => Ok(PaymentOutcome::AlreadyApplied {
                order_id,
                status: parse(&status, "order status", OrderStatus::from_db)?,
            }),
            None => Ok(PaymentOutcome::UnknownTransaction),
        }
    }

    async fn start_delivery(&self, start: DeliveryStart) -> StoreResult<StartOutcome> {
        let mut tx = self.pool.begin().await?;

        let moved = sqlx::query(
            r#"UPDATE orders SET status = 'delivering', delivery_method = $2
               WHERE id = $1 AND status = 'processing'"#,
        )
        .bind(start.order_id)
        .bind(start.method.as_db())
        .execute(&mut *tx)
        .await?;
        if moved.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(StartOutcome::NotProcessing);
        }

        if let Some(courier_id) = start.courier_id {
            let reserved = sqlx::query(
                r#"UPDATE users SET is_available = FALSE
                   WHERE id = $1 AND role = 'courier' AND is_available"#,
            )
            .bind(courier_id)
            .execute(&mut *tx)
            .await?;
            if reserved.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(StartOutcome::CourierBusy);
            }
        }

        sqlx::query(
            r#"INSERT INTO deliveries
                   (order_id, courier_id, status, delivery_method, packing_started_at, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(start.order_id)
        .bind(start.courier_id)
        .bind(start.status.as_db())
        .bind(start.method.as_db())
        .bind(start.packing_started_at)
        .bind(start.now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(StartOutcome::Started)
    }

    async fn confirm_pickup(&self, order_id: i64, now: i64) -> StoreResult<bool> {
        let updated = sqlx::query(
            r#"UPDATE deliveries d
               SET status = 'picked_up',
                   picked_up_at = $2,
                   packing_started_at = COALESCE(d.packing_started_at, $2)
               FROM orders o
               WHERE d.order_id = $1 AND o.id = d.order_id
                 AND o.status = 'delivering'
                 AND d.status = 'accepted'
                 AND d.courier_id IS NOT NULL"#,
        )
        .bind(order_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() == 1)
    }

    async fn available_deliveries(&self) -> StoreResult<Vec<AvailableDelivery>> {
        let rows: Vec<QueueRow> = sqlx::query_as(
            r#"SELECT o.id AS order_id, o.store_id, s.name AS store_name,
                      s.address AS store_address, o.total_amount, o.created_at,
                      o.city_id, o.district_id, o.address_street, o.address_number,
                      o.address_nearby, o.contact_phone
               FROM deliveries d
               JOIN orders o ON o.id = d.order_id
               JOIN stores s ON s.id = o.store_id
               WHERE d.delivery_method = 'marketplace'
                 AND d.status = 'requested'
                 AND d.courier_id IS NULL
                 AND o.status = 'delivering'
               ORDER BY d.created_at ASC, d.order_id ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| AvailableDelivery {
                order_id: r.order_id,
                store_id: r.store_id,
                store_name: r.store_name,
                store_address: r.store_address,
                delivery_address: AddressSnapshot {
                    city_id: r.city_id,
                    district_id: r.district_id,
                    street: r.address_street,
                    number: r.address_number,
                    nearby: r.address_nearby,
                    contact_phone: r.contact_phone,
                },
                total_amount: r.total_amount,
                created_at: r.created_at,
            })
            .collect())
    }

    async fn claim_delivery(&self, order_id: i64, courier_id: i64) -> StoreResult<ClaimOutcome> {
        let mut tx = self.pool.begin().await?;

        let reserved = sqlx::query(
            "UPDATE users SET is_available = FALSE WHERE id = $1 AND role = 'courier' AND is_available",
        )
        .bind(courier_id)
        .execute(&mut *tx)
        .await?;
        if reserved.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(ClaimOutcome::CourierBusy);
        }

        let pickup_code: Option<String> = sqlx::query_scalar(
            r#"UPDATE deliveries d SET courier_id = $2, status = 'accepted'
               FROM orders o
               WHERE d.order_id = $1 AND o.id = d.order_id
                 AND d.delivery_method = 'marketplace'
                 AND d.status = 'requested'
                 AND d.courier_id IS NULL
                 AND o.status = 'delivering'
               RETURNING o.pickup_code"#,
        )
        .bind(order_id)
        .bind(courier_id)
        .fetch_optional(&mut *tx)
        .await?;

        match pickup_code {
            Some(pickup_code) => {
                tx.commit().await?;
                Ok(ClaimOutcome::Claimed { pickup_code })
            }
            None => {
                tx.rollback().await?;
                Ok(ClaimOutcome::Taken)
            }
        }
    }

    async fn active_delivery(&self, courier_id: i64) -> StoreResult<Option<CurrentDelivery>> {
        let row: Option<ActiveRow> = sqlx::query_as(
            r#"SELECT o.id AS order_id, s.name AS store_name, s.address AS store_address,
                      d.delivery_method, d.status, o.pickup_code, o.total_amount, o.created_at,
                      o.city_id, o.district_id, o.address_street, o.address_number,
                      o.address_nearby, o.contact_phone
               FROM deliveries d
               JOIN orders o ON o.id = d.order_id
               JOIN stores s ON s.id = o.store_id
               WHERE d.courier_id = $1
                 AND d.status IN ('accepted', 'picked_up')
                 AND o.status = 'delivering'
               ORDER BY d.created_at DESC
               LIMIT 1"#,
        )
        .bind(courier_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(CurrentDelivery {
                order_id: r.order_id,
                store_name: r.store_name,
                store_address: r.store_address,
                delivery_address: AddressSnapshot {
                    city_id: r.city_id,
                    district_id: r.district_id,
                    street: r.address_street,
                    number: r.address_number,
                    nearby: r.address_nearby,
                    contact_phone: r.contact_phone,
                },
                delivery_method: parse(
                    &r.delivery_method,
                    "delivery method",
                    DeliveryMethod::from_db,
                )?,
                delivery_status: parse(&r.status, "delivery status", DeliveryStatus::from_db)?,
                pickup_code: r.pickup_code,
                total_amount: r.total_amount,
                created_at: r.created_at,
            })
        })
        .transpose()
    }

    async fn set_courier_available(&self, courier_id: i64, available: bool) -> StoreResult<()> {
        sqlx::query("UPDATE users SET is_available = $2 WHERE id = $1 AND role = 'courier'")
            .bind(courier_id)
            .bind(available)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn complete_delivery(&self, completion: Completion) -> StoreResult<CompleteOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row lock first: a claim committing after this point re-checks
        // `status = 'requested'` against the confirmed row and loses.
        let assigned: Option<Option<i64>> =
            sqlx::query_scalar("SELECT courier_id FROM deliveries WHERE order_id = $1 FOR UPDATE")
                .bind(completion.order_id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = assigned.flatten();
        if current != completion.courier_id {
            tx.rollback().await?;
            return Ok(CompleteOutcome::CourierChanged { current });
        }

        let completed = sqlx::query(
            "UPDATE orders SET status = 'completed' WHERE id = $1 AND status = 'delivering'",
        )
        .bind(completion.order_id)
        .execute(&mut *tx)
        .await?;
        if completed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CompleteOutcome::NotDelivering);
        }

        ledger_credit(&mut tx, completion.seller_id, completion.seller_credit).await?;

        if let Some(courier_id) = completion.courier_id {
            if !completion.courier_credit.is_zero() {
                ledger_credit(&mut tx, courier_id, completion.courier_credit).await?;
            }
            sqlx::query("UPDATE users SET is_available = TRUE WHERE id = $1")
                .bind(courier_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"UPDATE deliveries SET status = 'delivered_confirmed', delivered_at = $2
               WHERE order_id = $1"#,
        )
        .bind(completion.order_id)
        .bind(completion.now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CompleteOutcome::Completed)
    }

    async fn seller_timings(&self, seller_id: i64) -> StoreResult<Vec<DeliveryTiming>> {
        let rows: Vec<TimingRow> = sqlx::query_as(
            r#"SELECT d.delivery_method, o.created_at, d.packing_started_at,
                      d.picked_up_at, d.delivered_at
               FROM deliveries d
               JOIN orders o ON o.id = d.order_id
               JOIN stores s ON s.id = o.store_id
               WHERE s.seller_id = $1 AND o.status = 'completed'"#,
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(timing).collect()
    }

    async fn courier_timings(&self, courier_id: i64) -> StoreResult<Vec<DeliveryTiming>> {
        let rows: Vec<TimingRow> = sqlx::query_as(
            r#"SELECT d.delivery_method, o.created_at, d.packing_started_at,
                      d.picked_up_at, d.delivered_at
               FROM deliveries d
               JOIN orders o ON o.id = d.order_id
               WHERE d.courier_id = $1 AND o.status = 'completed'"#,
        )
        .bind(courier_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(timing).collect()
    }
}
