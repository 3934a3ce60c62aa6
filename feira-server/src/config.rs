//! Server configuration, loaded from the environment (after `.env`)

use rust_decimal::Decimal;

use crate::error::BoxError;
use crate::orders::FeeSchedule;

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    pub db_max_connections: u32,
    pub http_port: u16,
    /// development | staging | production
    pub environment: String,
    /// HS256 secret for bearer tokens
    pub jwt_secret: String,
    pub payment_api_url: String,
    pub payment_api_key: String,
    /// HMAC secret shared with the gateway for webhook signatures
    pub payment_webhook_secret: String,
    pub payment_timeout_secs: u64,
    /// Lifetime of a PIX charge
    pub pix_expiry_secs: u64,
    pub fees: FeeSchedule,
    /// Enables the charge-less order path and sandbox payment simulation
    pub allow_simulation: bool,
    /// `json` for JSON log lines, anything else for human-readable
    pub log_format: String,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Must be set and non-empty outside development.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let defaults = FeeSchedule::default();
        let fees = FeeSchedule {
            marketplace_fee_rate: env_or("MARKETPLACE_FEE_RATE", defaults.marketplace_fee_rate),
            courier_fee: env_or("COURIER_FEE", defaults.courier_fee),
        };
        if fees.marketplace_fee_rate < Decimal::ZERO
            || fees.marketplace_fee_rate >= Decimal::ONE
            || fees.courier_fee < Decimal::ZERO
        {
            return Err(format!("invalid fee schedule: {fees:?}").into());
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            http_port: env_or("HTTP_PORT", 8080),
            environment: environment.clone(),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            payment_api_url: std::env::var("PAYMENT_API_URL")
                .unwrap_or_else(|_| "https://api.abacatepay.com".into()),
            payment_api_key: Self::require_secret("PAYMENT_API_KEY", &environment)?,
            payment_webhook_secret: Self::require_secret("PAYMENT_WEBHOOK_SECRET", &environment)?,
            payment_timeout_secs: env_or("PAYMENT_TIMEOUT_SECS", 10),
            pix_expiry_secs: env_or("PIX_EXPIRY_SECS", 3600),
            fees,
            allow_simulation: env_or("ALLOW_SIMULATION", environment != "production"),
            log_format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        })
    }
}
