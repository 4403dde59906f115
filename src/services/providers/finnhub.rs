use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Capability, PriceSource, get_json, now_ts};
use crate::error::{ProviderError, ProviderResult};
use crate::models::{PriceRecord, StockInfo};

const NAME: &str = "finnhub";

#[derive(Clone)]
pub struct FinnhubClient {
    http: Client,
    api_key: String,
}

impl FinnhubClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
        }
    }

    fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn get(&self, path: &str, symbol: &str) -> ProviderResult<serde_json::Value> {
        if !self.has_key() {
            return Err(ProviderError::MissingKey(NAME));
        }

        let url = format!("https://finnhub.io/api/v1/{path}");
        get_json(&self.http, NAME, &url, &[("symbol", symbol), ("token", &self.api_key)]).await
    }
}

#[async_trait]
impl PriceSource for FinnhubClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Quote, Capability::Profile]
    }

    async fn quote(&self, symbol: &str) -> ProviderResult<PriceRecord> {
        let body = self.get("quote", &symbol.to_uppercase()).await?;
        let quote: QuoteResponse = serde_json::from_value(body)?;
        quote.into_record(symbol)
    }

    async fn profile(&self, symbol: &str) -> ProviderResult<StockInfo> {
        let body = self.get("stock/profile2", &symbol.to_uppercase()).await?;
        let profile: ProfileResponse = serde_json::from_value(body)?;
        profile.into_info(symbol)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct QuoteResponse {
    // current
    pub c: f64,
    // change
    #[serde(default)]
    pub d: Option<f64>,
    // percent change
    #[serde(default)]
    pub dp: Option<f64>,
    // high
    pub h: f64,
    // low
    pub l: f64,
    // open
    pub o: f64,
    // previous close
    pub pc: f64,
    // timestamp
    pub t: i64,
}

impl QuoteResponse {
    fn into_record(self, symbol: &str) -> ProviderResult<PriceRecord> {
        // unknown symbols come back as an all-zero quote
        if self.c == 0.0 && self.t == 0 {
            return Err(ProviderError::NoData(format!("{NAME}: unknown symbol {symbol}")));
        }
        if !self.c.is_finite() || self.c < 0.0 {
            return Err(ProviderError::Parse(format!("{NAME}: bad price {}", self.c)));
        }

        Ok(PriceRecord {
            symbol: symbol.to_uppercase(),
            price: self.c,
            // the quote endpoint carries no volume
            volume: 0,
            change: self.d.unwrap_or(self.c - self.pc),
            change_percent: self.dp.unwrap_or_default(),
            high: self.h,
            low: self.l,
            open: self.o,
            timestamp: now_ts(),
            source: NAME.to_string(),
        })
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ProfileResponse {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(rename = "finnhubIndustry", default)]
    pub industry: Option<String>,
    // millions of USD
    #[serde(rename = "marketCapitalization", default)]
    pub market_cap: Option<f64>,
}

impl ProfileResponse {
    fn into_info(self, symbol: &str) -> ProviderResult<StockInfo> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ProviderError::NoData(format!("{NAME}: no profile for {symbol}")))?;

        let mut info = StockInfo::named(symbol, &name);
        info.industry = self.industry;
        info.market_cap = self.market_cap.map(|m| m * 1_000_000.0);
        Ok(info)
    }
}
