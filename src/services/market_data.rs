//! Market-data facade shared by the alert monitor and the command services.
//!
//! Every lookup goes cache → rate limiter → sources in priority order. The
//! first source that answers wins and the result is cached. Failures never
//! reach the caller: they are logged and surface as `None`.
//!
//! Retry policy per source:
//! - rate limited: exponential backoff on the same source, up to `max_retries`
//! - unparseable response: a longer pause, then the next source
//! - anything else: straight to the next source

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time;

use crate::config::Settings;
use crate::error::ProviderError;
use crate::models::{Candle, Period, Personality, PriceRecord, StockInfo};
use crate::services::analysis::{self, Analysis};
use crate::services::cache::TtlCache;
use crate::services::indicators;
use crate::services::providers::{Capability, PriceSource};
use crate::services::rate_limiter::RateLimiter;

#[derive(Debug, Clone)]
pub struct MarketDataOptions {
    pub quote_ttl: Duration,
    pub info_ttl: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub parse_backoff: Duration,
}

impl From<&Settings> for MarketDataOptions {
    fn from(s: &Settings) -> Self {
        Self {
            quote_ttl: s.quote_cache_ttl(),
            info_ttl: s.info_cache_ttl(),
            max_retries: s.max_retries,
            backoff_base: s.backoff_base(),
            parse_backoff: s.parse_backoff(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SourceStats {
    pub successes: u64,
    pub failures: u64,
    pub rate_limited: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    /// Source that last satisfied a quote, per symbol.
    pub last_source: std::collections::BTreeMap<String, String>,
    pub sources: std::collections::BTreeMap<String, SourceStats>,
    pub requests_last_hour: usize,
}

pub struct MarketData {
    sources: Vec<Arc<dyn PriceSource>>,
    limiter: RateLimiter,
    options: MarketDataOptions,

    quotes: TtlCache<PriceRecord>,
    infos: TtlCache<StockInfo>,
    histories: TtlCache<Vec<Candle>>,

    last_source: DashMap<String, &'static str>,
    stats: DashMap<&'static str, SourceStats>,
}

impl MarketData {
    pub fn new(
        sources: Vec<Arc<dyn PriceSource>>,
        limiter: RateLimiter,
        options: MarketDataOptions,
    ) -> Self {
        Self {
            quotes: TtlCache::new(options.quote_ttl),
            infos: TtlCache::new(options.info_ttl),
            histories: TtlCache::new(options.quote_ttl),
            sources,
            limiter,
            options,
            last_source: DashMap::new(),
            stats: DashMap::new(),
        }
    }

    pub fn from_settings(settings: &Settings, sources: Vec<Arc<dyn PriceSource>>) -> Self {
        Self::new(
            sources,
            RateLimiter::new(settings.min_request_interval(), settings.hourly_request_cap),
            MarketDataOptions::from(settings),
        )
    }

    pub async fn current_price(&self, symbol: &str) -> Option<PriceRecord> {
        let sym = symbol.trim().to_uppercase();

        if let Some(hit) = self.quotes.get(&sym) {
            tracing::debug!("[market-data] quote cache hit for {}", sym);
            return Some(hit);
        }

        let (mut record, source) = self
            .fetch(&sym, "quote", Capability::Quote, |src, s| async move {
                src.quote(&s).await
            })
            .await?;

        record.source = source.to_string();
        self.last_source.insert(sym.clone(), source);
        self.quotes.insert(&sym, record.clone());
        Some(record)
    }

    pub async fn stock_info(&self, symbol: &str) -> Option<StockInfo> {
        let sym = symbol.trim().to_uppercase();

        if let Some(hit) = self.infos.get(&sym) {
            return Some(hit);
        }

        let (info, _) = self
            .fetch(&sym, "profile", Capability::Profile, |src, s| async move {
                src.profile(&s).await
            })
            .await?;

        self.infos.insert(&sym, info.clone());
        Some(info)
    }

    pub async fn history(&self, symbol: &str, period: Period) -> Option<Vec<Candle>> {
        let sym = symbol.trim().to_uppercase();
        let key = format!("{}:{}", sym, period.as_str());

        if let Some(hit) = self.histories.get(&key) {
            return Some(hit);
        }

        let (candles, _) = self
            .fetch(&sym, "history", Capability::History, move |src, s| async move {
                src.history(&s, period).await
            })
            .await?;

        self.histories.insert(&key, candles.clone());
        Some(candles)
    }

    /// Indicators over the personality's history window plus its signals.
    pub async fn analysis(&self, symbol: &str, personality: Personality) -> Option<Analysis> {
        let candles = self.history(symbol, personality.period()).await?;
        let ind = indicators::compute(&candles)?;
        let quote = self.current_price(symbol).await?;
        Some(analysis::analyze(&quote, &ind, personality))
    }

    /// Drops expired entries from every cache; returns how many went.
    pub fn purge_expired(&self) -> usize {
        self.quotes.purge_expired() + self.infos.purge_expired() + self.histories.purge_expired()
    }

    pub fn last_source(&self, symbol: &str) -> Option<&'static str> {
        self.last_source
            .get(&symbol.trim().to_uppercase())
            .map(|s| *s)
    }

    pub fn stats(&self, source: &str) -> SourceStats {
        self.stats
            .get(source)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub async fn report(&self) -> SourceReport {
        SourceReport {
            last_source: self
                .last_source
                .iter()
                .map(|e| (e.key().clone(), e.value().to_string()))
                .collect(),
            sources: self
                .sources
                .iter()
                .map(|s| (s.name().to_string(), self.stats(s.name())))
                .collect(),
            requests_last_hour: self.limiter.recent_requests().await,
        }
    }

    async fn fetch<T, F, Fut>(
        &self,
        symbol: &str,
        what: &str,
        capability: Capability,
        call: F,
    ) -> Option<(T, &'static str)>
    where
        F: Fn(Arc<dyn PriceSource>, String) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        for source in self.sources.iter().filter(|s| s.supports(capability)) {
            let name = source.name();
            let mut attempt: u32 = 0;

            loop {
                self.limiter.acquire().await;

                match call(Arc::clone(source), symbol.to_string()).await {
                    Ok(value) => {
                        self.stats.entry(name).or_default().successes += 1;
                        tracing::debug!("[market-data] {} for {} served by {}", what, symbol, name);
                        return Some((value, name));
                    }
                    Err(e) if e.is_rate_limited() && attempt < self.options.max_retries => {
                        self.stats.entry(name).or_default().rate_limited += 1;
                        let wait = self.options.backoff_base * 2u32.saturating_pow(attempt);
                        tracing::warn!(
                            "[market-data] {} rate limited on {} {}, retry {} in {:?}",
                            name,
                            what,
                            symbol,
                            attempt + 1,
                            wait
                        );
                        time::sleep(wait).await;
                        attempt += 1;
                    }
                    Err(e) if e.is_parse() => {
                        self.stats.entry(name).or_default().failures += 1;
                        tracing::warn!(
                            "[market-data] {} returned unreadable {} for {}: {}",
                            name,
                            what,
                            symbol,
                            e
                        );
                        time::sleep(self.options.parse_backoff).await;
                        break;
                    }
                    Err(e) => {
                        let mut stats = self.stats.entry(name).or_default();
                        if e.is_rate_limited() {
                            stats.rate_limited += 1;
                        }
                        stats.failures += 1;
                        drop(stats);
                        tracing::debug!("[market-data] {} failed {} for {}: {}", name, what, symbol, e);
                        break;
                    }
                }
            }
        }

        tracing::warn!("[market-data] no source returned {} for {}", what, symbol);
        None
    }
}
