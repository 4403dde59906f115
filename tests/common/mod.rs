#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use stockpulse::{
    AppState, config,
    error::{ProviderError, ProviderResult},
    models::{PriceRecord, StockInfo},
    services::{
        market_data::{MarketData, MarketDataOptions},
        notifier::BroadcastNotifier,
        providers::{Capability, PriceSource},
        rate_limiter::RateLimiter,
        store::MemoryStore,
    },
};

/// How a fake source answers the next quote request.
#[derive(Debug, Clone)]
pub enum Reply {
    Price(f64, i64),
    NoData,
    RateLimited,
    Garbage,
}

pub struct FakeSource {
    name: &'static str,
    replies: Mutex<HashMap<String, Vec<Reply>>>,
    names: HashMap<String, String>,
    pub quote_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            replies: Mutex::new(HashMap::new()),
            names: HashMap::new(),
            quote_calls: AtomicUsize::new(0),
        }
    }

    pub fn listing(mut self, symbol: &str, company: &str) -> Self {
        self.names.insert(symbol.to_string(), company.to_string());
        self
    }

    /// Queue replies for a symbol; the last one repeats forever.
    pub fn reply(&self, symbol: &str, replies: Vec<Reply>) {
        self.replies
            .lock()
            .unwrap()
            .insert(symbol.to_string(), replies);
    }

    pub fn calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for FakeSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Quote, Capability::Profile]
    }

    async fn quote(&self, symbol: &str) -> ProviderResult<PriceRecord> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            match replies.get_mut(symbol) {
                Some(queue) if queue.len() > 1 => queue.remove(0),
                Some(queue) => queue[0].clone(),
                None => Reply::NoData,
            }
        };

        match reply {
            Reply::Price(price, volume) => Ok(PriceRecord {
                symbol: symbol.to_string(),
                price,
                volume,
                change: 0.0,
                change_percent: 0.0,
                high: price,
                low: price,
                open: price,
                timestamp: chrono::Utc::now().timestamp(),
                source: String::new(),
            }),
            Reply::NoData => Err(ProviderError::NoData(symbol.to_string())),
            Reply::RateLimited => Err(ProviderError::RateLimited(self.name)),
            Reply::Garbage => Err(ProviderError::Parse("unexpected payload".into())),
        }
    }

    async fn profile(&self, symbol: &str) -> ProviderResult<StockInfo> {
        self.names
            .get(symbol)
            .map(|name| StockInfo::named(symbol, name))
            .ok_or_else(|| ProviderError::NoData(symbol.to_string()))
    }
}

pub fn options() -> MarketDataOptions {
    MarketDataOptions {
        quote_ttl: Duration::from_secs(60),
        info_ttl: Duration::from_secs(3600),
        max_retries: 3,
        backoff_base: Duration::from_secs(2),
        parse_backoff: Duration::from_secs(10),
    }
}

pub fn market(sources: Vec<Arc<FakeSource>>) -> MarketData {
    let sources: Vec<Arc<dyn PriceSource>> = sources
        .into_iter()
        .map(|s| s as Arc<dyn PriceSource>)
        .collect();
    MarketData::new(sources, RateLimiter::unlimited(), options())
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<BroadcastNotifier>,
}

pub fn test_app(sources: Vec<Arc<FakeSource>>) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(BroadcastNotifier::new(32));

    let state = AppState {
        settings: config::Settings::default(),
        store: store.clone(),
        market: Arc::new(market(sources)),
        notifier: notifier.clone(),
    };

    TestApp {
        state,
        store,
        notifier,
    }
}
