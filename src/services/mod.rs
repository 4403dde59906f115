pub mod providers;
pub mod rate_limiter;
pub mod cache;
pub mod market_data;
pub mod indicators;
pub mod analysis;

pub mod store;
pub mod notifier;
pub mod alert_monitor;

pub mod user_service;
pub mod watchlist_service;
pub mod alerts_service;
