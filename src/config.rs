use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub mongodb_uri: String,
    pub mongodb_db: String,

    // status server
    pub host: String,
    pub port: u16,

    pub finnhub_api_key: String,
    pub alpha_vantage_api_key: String,

    pub alert_check_interval_secs: u64,
    pub alert_cooldown_secs: u64,

    pub quote_cache_ttl_secs: u64,
    pub info_cache_ttl_secs: u64,

    pub min_request_interval_ms: u64,
    pub hourly_request_cap: u32,

    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub parse_backoff_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_db: "stockpulse".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            finnhub_api_key: String::new(),
            alpha_vantage_api_key: String::new(),
            alert_check_interval_secs: 30,
            alert_cooldown_secs: 30 * 60,
            quote_cache_ttl_secs: 60,
            info_cache_ttl_secs: 60 * 60,
            min_request_interval_ms: 1_000,
            hourly_request_cap: 500,
            max_retries: 3,
            backoff_base_ms: 2_000,
            parse_backoff_ms: 10_000,
        }
    }
}

impl Settings {
    pub fn alert_check_interval(&self) -> Duration {
        Duration::from_secs(self.alert_check_interval_secs)
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_secs)
    }

    pub fn quote_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.quote_cache_ttl_secs)
    }

    pub fn info_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.info_cache_ttl_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn parse_backoff(&self) -> Duration {
        Duration::from_millis(self.parse_backoff_ms)
    }
}

fn var_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let d = Settings::default();

    Settings {
        mongodb_uri: env::var("MONGODB_URI").unwrap_or(d.mongodb_uri),
        mongodb_db: env::var("MONGODB_DB").unwrap_or(d.mongodb_db),
        host: env::var("HOST").unwrap_or(d.host),
        port: var_or("PORT", d.port),
        finnhub_api_key: env::var("FINNHUB_API_KEY").unwrap_or_default(),
        alpha_vantage_api_key: env::var("ALPHA_VANTAGE_API_KEY").unwrap_or_default(),
        alert_check_interval_secs: var_or("ALERT_CHECK_INTERVAL", d.alert_check_interval_secs),
        alert_cooldown_secs: var_or("ALERT_COOLDOWN_SECS", d.alert_cooldown_secs),
        quote_cache_ttl_secs: var_or("QUOTE_CACHE_TTL_SECS", d.quote_cache_ttl_secs),
        info_cache_ttl_secs: var_or("INFO_CACHE_TTL_SECS", d.info_cache_ttl_secs),
        min_request_interval_ms: var_or("MIN_REQUEST_INTERVAL_MS", d.min_request_interval_ms),
        hourly_request_cap: var_or("HOURLY_REQUEST_CAP", d.hourly_request_cap),
        max_retries: var_or("PROVIDER_MAX_RETRIES", d.max_retries),
        backoff_base_ms: var_or("PROVIDER_BACKOFF_MS", d.backoff_base_ms),
        parse_backoff_ms: var_or("PROVIDER_PARSE_BACKOFF_MS", d.parse_backoff_ms),
    }
}
