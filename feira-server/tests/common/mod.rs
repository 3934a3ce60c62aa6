//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use feira_server::AppState;
use feira_server::auth::CurrentActor;
use feira_server::orders::LifecycleSettings;
use feira_server::payment::testing::{FakeGateway, FakeMode};
use feira_server::store::{MarketStore, MemoryStore};
use shared::models::{ProfileAddress, Role};
use shared::order::{CreateOrderRequest, OrderItemInput};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

pub fn full_address() -> ProfileAddress {
    ProfileAddress {
        city_id: Some(3550308),
        district_id: Some(12),
        street: Some("Rua Augusta".into()),
        number: Some("1500".into()),
        nearby: Some("Próximo ao metrô".into()),
        contact_phone: Some("+55 11 98888-7777".into()),
    }
}

pub struct Market {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<FakeGateway>,
    pub state: AppState,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub store_id: i64,
    pub product_id: i64,
}

impl Market {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new(FakeMode::Approve));
        let buyer_id = store.add_user(Role::Buyer, full_address()).await;
        let seller_id = store.add_user(Role::Seller, ProfileAddress::default()).await;
        let store_id = store.add_store(seller_id, "Quitanda do Zé").await;
        let product_id = store.add_product(store_id, 10).await;

        let settings = LifecycleSettings {
            payment_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let state = AppState::from_parts(
            store.clone(),
            gateway.clone(),
            settings,
            JWT_SECRET,
            WEBHOOK_SECRET,
        );
        Self {
            store,
            gateway,
            state,
            buyer_id,
            seller_id,
            store_id,
            product_id,
        }
    }

    pub async fn courier(&self) -> i64 {
        self.store.add_user(Role::Courier, ProfileAddress::default()).await
    }

    pub async fn buyer(&self) -> i64 {
        self.store.add_user(Role::Buyer, full_address()).await
    }

    /// Fresh actor, as the auth middleware would load it.
    pub async fn actor(&self, user_id: i64) -> CurrentActor {
        self.store
            .load_actor(user_id)
            .await
            .unwrap()
            .expect("user exists")
            .into()
    }

    pub fn order(&self, quantity: i32, total: &str) -> CreateOrderRequest {
        CreateOrderRequest {
            store_id: self.store_id,
            items: vec![OrderItemInput {
                product_id: self.product_id,
                quantity,
            }],
            total_amount: total.parse().unwrap(),
        }
    }
}
