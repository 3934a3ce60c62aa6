//! Shared application state, built once at startup

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use crate::config::Config;
use crate::deliveries::Dispatcher;
use crate::error::BoxError;
use crate::orders::{LifecycleSettings, OrderLifecycle};
use crate::payment::{AbacateGateway, PaymentGateway};
use crate::store::{MarketStore, PgStore};

#[derive(Clone)]
pub struct AppState {
    /// The single storage handle (wraps the process-wide pool)
    pub store: Arc<dyn MarketStore>,
    pub lifecycle: OrderLifecycle,
    pub dispatcher: Dispatcher,
    /// HS256 secret for bearer tokens
    pub jwt_secret: String,
    /// HMAC secret for gateway webhooks
    pub webhook_secret: String,
}

impl AppState {
    /// Wires the services around an already-built store and gateway.
    pub fn from_parts(
        store: Arc<dyn MarketStore>,
        gateway: Arc<dyn PaymentGateway>,
        settings: LifecycleSettings,
        jwt_secret: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            lifecycle: OrderLifecycle::new(store.clone(), gateway, settings),
            dispatcher: Dispatcher::new(store.clone()),
            store,
            jwt_secret: jwt_secret.into(),
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Connects the pool, applies migrations and builds the gateway client.
    ///
    /// Returns the pool too so the caller can close it on shutdown.
    pub async fn new(config: &Config) -> Result<(Self, sqlx::PgPool), BoxError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database connected, migrations applied");

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.payment_timeout_secs))
            .build()?;
        let gateway = AbacateGateway::new(http, &config.payment_api_url, &config.payment_api_key);

        let settings = LifecycleSettings {
            fees: config.fees,
            payment_timeout: Duration::from_secs(config.payment_timeout_secs),
            pix_expiry_secs: config.pix_expiry_secs,
            allow_simulation: config.allow_simulation,
        };

        let state = Self::from_parts(
            Arc::new(PgStore::new(pool.clone())),
            Arc::new(gateway),
            settings,
            config.jwt_secret.clone(),
            config.payment_webhook_secret.clone(),
        );
        Ok((state, pool))
    }
}
