use std::env;

/// Pricing and inventory settings used by order creation.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// Orders with a sub total strictly above this amount ship for free.
    pub free_delivery_threshold: i64,
    pub delivery_charge: i64,
    /// Tax rate in basis points (1000 = 10%).
    pub tax_rate_bps: i64,
    pub currency: String,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            free_delivery_threshold: 1000,
            delivery_charge: 1000,
            tax_rate_bps: 1000,
            currency: "INR".to_string(),
        }
    }
}

impl CommerceConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            free_delivery_threshold: env_parse("FREE_DELIVERY_THRESHOLD")
                .unwrap_or(defaults.free_delivery_threshold),
            delivery_charge: env_parse("DELIVERY_CHARGE").unwrap_or(defaults.delivery_charge),
            tax_rate_bps: env_parse("TAX_RATE_BPS").unwrap_or(defaults.tax_rate_bps),
            currency: env::var("CURRENCY").unwrap_or(defaults.currency),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub payment_webhook_secret: Option<String>,
    pub notify_buffer: usize,
    pub commerce: CommerceConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_parse("APP_PORT").unwrap_or(3000);
        let payment_webhook_secret = env::var("PAYMENT_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        let notify_buffer = env_parse("NOTIFY_BUFFER").unwrap_or(256);
        Ok(Self {
            port,
            database_url,
            host,
            payment_webhook_secret,
            notify_buffer,
            commerce: CommerceConfig::from_env(),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
