//! Library entrypoint for StockPulse.
//!
//! The binary only wires things together; integration tests under `tests/`
//! build an `AppState` from the in-memory store and fake price sources.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod models;

pub mod services;

pub mod controllers;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub store: Arc<dyn services::store::Store>,
    pub market: Arc<services::market_data::MarketData>,
    pub notifier: Arc<dyn services::notifier::Notifier>,
}
