use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{Capability, PriceSource, get_json, now_ts, pct_change};
use crate::error::{ProviderError, ProviderResult};
use crate::models::{Candle, Period, PriceRecord, StockInfo};

const NAME: &str = "yahoo";
const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

// Yahoo rejects requests without a browser-like user agent
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

#[derive(Clone)]
pub struct YahooClient {
    http: Client,
}

impl YahooClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http }
    }

    async fn chart(&self, symbol: &str, range: &str) -> ProviderResult<ChartResult> {
        let url = format!("{CHART_URL}/{symbol}");
        let body = get_json(&self.http, NAME, &url, &[("range", range), ("interval", "1d")]).await?;
        parse_chart(body)
    }
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceSource for YahooClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Quote, Capability::History, Capability::Profile]
    }

    async fn quote(&self, symbol: &str) -> ProviderResult<PriceRecord> {
        let chart = self.chart(symbol, Period::OneDay.as_str()).await?;
        latest_record(symbol, &chart)
    }

    async fn history(&self, symbol: &str, period: Period) -> ProviderResult<Vec<Candle>> {
        let chart = self.chart(symbol, period.as_str()).await?;
        let candles = candles(&chart);
        if candles.is_empty() {
            return Err(ProviderError::NoData(format!("{NAME}: empty history for {symbol}")));
        }
        Ok(candles)
    }

    async fn profile(&self, symbol: &str) -> ProviderResult<StockInfo> {
        let chart = self.chart(symbol, Period::OneDay.as_str()).await?;
        let name = chart
            .meta
            .long_name
            .or(chart.meta.short_name)
            .unwrap_or_else(|| symbol.to_uppercase());
        Ok(StockInfo::named(symbol, &name))
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "longName", default)]
    long_name: Option<String>,
    #[serde(rename = "shortName", default)]
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

// Yahoo fills gaps with nulls
#[derive(Debug, Deserialize, Default)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

pub(crate) fn parse_chart(body: serde_json::Value) -> ProviderResult<ChartResult> {
    let envelope: ChartEnvelope = serde_json::from_value(body)?;

    if let Some(err) = envelope.chart.error {
        return Err(ProviderError::NoData(format!(
            "{NAME}: {} {}",
            err.code, err.description
        )));
    }

    envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ProviderError::NoData(format!("{NAME}: empty chart result")))
}

fn candles(chart: &ChartResult) -> Vec<Candle> {
    let Some(q) = chart.indicators.quote.first() else {
        return Vec::new();
    };

    let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();

    chart
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let close = at(&q.close, i)?;
            let open = at(&q.open, i).unwrap_or(close);
            Some(Candle {
                timestamp: *ts,
                open,
                high: at(&q.high, i).unwrap_or(close.max(open)),
                low: at(&q.low, i).unwrap_or(close.min(open)),
                close,
                volume: at(&q.volume, i).unwrap_or(0.0),
            })
        })
        .collect()
}

fn latest_record(symbol: &str, chart: &ChartResult) -> ProviderResult<PriceRecord> {
    let last = candles(chart)
        .pop()
        .ok_or_else(|| ProviderError::NoData(format!("{NAME}: no bars for {symbol}")))?;

    if !last.close.is_finite() || last.close <= 0.0 {
        return Err(ProviderError::Parse(format!("{NAME}: bad close {}", last.close)));
    }

    Ok(PriceRecord {
        symbol: symbol.to_uppercase(),
        price: last.close,
        volume: last.volume as i64,
        change: last.close - last.open,
        change_percent: pct_change(last.open, last.close),
        high: last.high,
        low: last.low,
        open: last.open,
        timestamp: now_ts(),
        source: NAME.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "chart": {
                "result": [{
                    "meta": { "symbol": "AAPL", "longName": "Apple Inc.", "regularMarketPrice": 201.0 },
                    "timestamp": [1700000000, 1700086400, 1700172800],
                    "indicators": { "quote": [{
                        "open":   [190.0, null, 196.0],
                        "high":   [192.0, null, 202.0],
                        "low":    [189.0, null, 195.5],
                        "close":  [191.0, null, 201.0],
                        "volume": [1000,  null, 2500]
                    }]}
                }],
                "error": null
            }
        })
    }

    #[test]
    fn skips_null_bars_and_normalizes_latest() {
        let chart = parse_chart(sample()).unwrap();
        assert_eq!(candles(&chart).len(), 2);

        let rec = latest_record("aapl", &chart).unwrap();
        assert_eq!(rec.symbol, "AAPL");
        assert_eq!(rec.price, 201.0);
        assert_eq!(rec.volume, 2500);
        assert_eq!(rec.change, 5.0);
        assert!((rec.change_percent - 5.0 / 196.0 * 100.0).abs() < 1e-9);
        assert_eq!(rec.source, "yahoo");
    }

    #[test]
    fn chart_error_is_no_data() {
        let body = json!({
            "chart": { "result": null, "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" } }
        });
        let err = parse_chart(body).unwrap_err();
        assert!(matches!(err, ProviderError::NoData(_)));
    }

    #[test]
    fn malformed_payload_is_a_parse_error() {
        let err = parse_chart(json!({ "unexpected": true })).unwrap_err();
        assert!(err.is_parse());
    }
}
