//! Market-data sources.
//!
//! Each source speaks its own wire format and normalizes it into the shared
//! [`PriceRecord`], [`Candle`] and [`StockInfo`] shapes. Sources only report
//! errors; retrying, throttling and fallback live in `market_data`.

pub mod alpha_vantage;
pub mod finnhub;
pub mod yahoo;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::error::{ProviderError, ProviderResult};
use crate::models::{Candle, Period, PriceRecord, StockInfo};

pub use alpha_vantage::AlphaVantageClient;
pub use finnhub::FinnhubClient;
pub use yahoo::YahooClient;

/// Kind of request a source can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Quote,
    History,
    Profile,
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short identifier recorded on every record this source produces.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> &'static [Capability];

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    async fn quote(&self, symbol: &str) -> ProviderResult<PriceRecord>;

    async fn history(&self, _symbol: &str, _period: Period) -> ProviderResult<Vec<Candle>> {
        Err(ProviderError::Unsupported(self.name()))
    }

    async fn profile(&self, _symbol: &str) -> ProviderResult<StockInfo> {
        Err(ProviderError::Unsupported(self.name()))
    }
}

/// GET a JSON document, mapping throttling and transport failures to
/// [`ProviderError`] variants.
pub(crate) async fn get_json(
    http: &Client,
    source: &'static str,
    url: &str,
    query: &[(&str, &str)],
) -> ProviderResult<serde_json::Value> {
    let res = http.get(url).query(query).send().await?;

    let status = res.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited(source));
    }
    if !status.is_success() {
        return Err(ProviderError::Status(source, status.as_u16()));
    }

    let body = res.text().await?;
    Ok(serde_json::from_str(&body)?)
}

pub(crate) fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Percent move from `from` to `to`; 0 when `from` is 0.
pub(crate) fn pct_change(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        0.0
    } else {
        (to - from) / from * 100.0
    }
}
