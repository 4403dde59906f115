use chrono::Utc;
use mongodb::bson::oid::ObjectId;

use crate::{AppState, models::WatchlistEntry, services::alerts_service::normalize_symbol};

/// Returns false when the symbol is already on the list.
pub async fn add(state: &AppState, user_id: i64, symbol: &str) -> Result<bool, String> {
    let sym = normalize_symbol(symbol)?;

    let info = state
        .market
        .stock_info(&sym)
        .await
        .ok_or_else(|| format!("Unknown symbol: {sym}"))?;

    let entry = WatchlistEntry {
        id: ObjectId::new(),
        user_id,
        symbol: sym,
        company_name: Some(info.name),
        added_at: Utc::now().timestamp(),
    };

    state.store.add_watch(&entry).await
}

pub async fn remove(state: &AppState, user_id: i64, symbol: &str) -> Result<bool, String> {
    state.store.remove_watch(user_id, &normalize_symbol(symbol)?).await
}

pub async fn list(state: &AppState, user_id: i64) -> Result<Vec<WatchlistEntry>, String> {
    state.store.list_watchlist(user_id).await
}
