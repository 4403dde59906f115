use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{Capability, PriceSource, get_json, now_ts};
use crate::error::{ProviderError, ProviderResult};
use crate::models::{Candle, Period, PriceRecord, StockInfo};

const NAME: &str = "alpha_vantage";
const QUERY_URL: &str = "https://www.alphavantage.co/query";

#[derive(Clone)]
pub struct AlphaVantageClient {
    http: Client,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
        }
    }

    async fn call(&self, function: &str, symbol: &str) -> ProviderResult<Value> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::MissingKey(NAME));
        }

        let symbol = symbol.to_uppercase();
        let body = get_json(
            &self.http,
            NAME,
            QUERY_URL,
            &[("function", function), ("symbol", &symbol), ("apikey", &self.api_key)],
        )
        .await?;

        check_envelope(body)
    }
}

#[async_trait]
impl PriceSource for AlphaVantageClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Quote, Capability::History, Capability::Profile]
    }

    async fn quote(&self, symbol: &str) -> ProviderResult<PriceRecord> {
        let body = self.call("GLOBAL_QUOTE", symbol).await?;
        parse_global_quote(symbol, body)
    }

    async fn history(&self, symbol: &str, period: Period) -> ProviderResult<Vec<Candle>> {
        let body = self.call("TIME_SERIES_DAILY", symbol).await?;
        let mut candles = parse_daily_series(body)?;

        // compact output is ~100 trading days, trim to the requested window
        if let Some(last) = candles.last().map(|c| c.timestamp) {
            let cutoff = last - period.days() * 86_400;
            candles.retain(|c| c.timestamp > cutoff);
        }
        Ok(candles)
    }

    async fn profile(&self, symbol: &str) -> ProviderResult<StockInfo> {
        let body = self.call("OVERVIEW", symbol).await?;
        parse_overview(symbol, body)
    }
}

/// Alpha Vantage answers throttling and bad symbols with HTTP 200 and a
/// message field instead of the payload.
fn check_envelope(body: Value) -> ProviderResult<Value> {
    if body.get("Note").is_some() || body.get("Information").is_some() {
        return Err(ProviderError::RateLimited(NAME));
    }
    if let Some(msg) = body.get("Error Message").and_then(Value::as_str) {
        return Err(ProviderError::NoData(format!("{NAME}: {msg}")));
    }
    Ok(body)
}

fn num(fields: &BTreeMap<String, String>, key: &str) -> ProviderResult<f64> {
    let raw = fields
        .get(key)
        .ok_or_else(|| ProviderError::Parse(format!("{NAME}: missing {key}")))?;
    raw.trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|_| ProviderError::Parse(format!("{NAME}: bad {key}: {raw}")))
}

fn opt_num(v: Option<&Value>) -> Option<f64> {
    v.and_then(Value::as_str).and_then(|s| s.parse::<f64>().ok())
}

fn parse_global_quote(symbol: &str, body: Value) -> ProviderResult<PriceRecord> {
    #[derive(Deserialize)]
    struct Envelope {
        #[serde(rename = "Global Quote", default)]
        quote: BTreeMap<String, String>,
    }

    let env: Envelope = serde_json::from_value(body)?;
    let q = env.quote;
    if q.is_empty() {
        return Err(ProviderError::NoData(format!("{NAME}: empty quote for {symbol}")));
    }

    Ok(PriceRecord {
        symbol: symbol.to_uppercase(),
        price: num(&q, "05. price")?,
        volume: num(&q, "06. volume")? as i64,
        change: num(&q, "09. change")?,
        change_percent: num(&q, "10. change percent")?,
        high: num(&q, "03. high")?,
        low: num(&q, "04. low")?,
        open: num(&q, "02. open")?,
        timestamp: now_ts(),
        source: NAME.to_string(),
    })
}

fn parse_daily_series(body: Value) -> ProviderResult<Vec<Candle>> {
    #[derive(Deserialize)]
    struct Envelope {
        #[serde(rename = "Time Series (Daily)")]
        series: BTreeMap<String, BTreeMap<String, String>>,
    }

    let env: Envelope = serde_json::from_value(body)?;

    // BTreeMap keys are ISO dates, so iteration is oldest first
    env.series
        .iter()
        .map(|(day, bar)| {
            let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map_err(|_| ProviderError::Parse(format!("{NAME}: bad date {day}")))?;
            let timestamp = date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp())
                .unwrap_or_default();

            Ok(Candle {
                timestamp,
                open: num(bar, "1. open")?,
                high: num(bar, "2. high")?,
                low: num(bar, "3. low")?,
                close: num(bar, "4. close")?,
                volume: num(bar, "5. volume")?,
            })
        })
        .collect()
}

fn parse_overview(symbol: &str, body: Value) -> ProviderResult<StockInfo> {
    let name = body
        .get("Name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ProviderError::NoData(format!("{NAME}: no overview for {symbol}")))?;

    let text = |key: &str| {
        body.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty() && *s != "None")
            .map(str::to_string)
    };

    let mut info = StockInfo::named(symbol, name);
    info.sector = text("Sector");
    info.industry = text("Industry");
    info.market_cap = opt_num(body.get("MarketCapitalization"));
    info.pe_ratio = opt_num(body.get("PERatio"));
    info.dividend_yield = opt_num(body.get("DividendYield"));
    info.beta = opt_num(body.get("Beta"));
    Ok(info)
}
