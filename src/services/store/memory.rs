//! Process-local store, used by tests and by runs without a database.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use super::Store;
use crate::models::{
    Alert, AlertKind, Personality, PriceSnapshot, User, UserPreferences, WatchlistEntry,
};

#[derive(Default)]
struct Tables {
    users: HashMap<i64, User>,
    preferences: HashMap<i64, UserPreferences>,
    watchlist: Vec<WatchlistEntry>,
    alerts: Vec<Alert>,
    // per symbol, append order
    history: HashMap<String, Vec<PriceSnapshot>>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a single alert, for inspection.
    pub async fn alert(&self, id: ObjectId) -> Option<Alert> {
        self.tables
            .read()
            .await
            .alerts
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), String> {
        Ok(())
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, String> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), String> {
        self.tables.write().await.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn set_personality(
        &self,
        user_id: i64,
        personality: Personality,
        updated_at: i64,
    ) -> Result<bool, String> {
        let mut t = self.tables.write().await;
        match t.users.get_mut(&user_id) {
            Some(u) => {
                u.personality = personality;
                u.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_preferences(&self, user_id: i64) -> Result<Option<UserPreferences>, String> {
        Ok(self.tables.read().await.preferences.get(&user_id).cloned())
    }

    async fn ensure_preferences(&self, user_id: i64) -> Result<UserPreferences, String> {
        let mut t = self.tables.write().await;
        Ok(t.preferences
            .entry(user_id)
            .or_insert_with(|| UserPreferences::defaults(user_id))
            .clone())
    }

    async fn save_preferences(&self, prefs: &UserPreferences) -> Result<(), String> {
        self.tables
            .write()
            .await
            .preferences
            .insert(prefs.user_id, prefs.clone());
        Ok(())
    }

    async fn add_watch(&self, entry: &WatchlistEntry) -> Result<bool, String> {
        let mut t = self.tables.write().await;
        let symbol = entry.symbol.to_uppercase();
        if t.watchlist
            .iter()
            .any(|w| w.user_id == entry.user_id && w.symbol == symbol)
        {
            return Ok(false);
        }
        let mut entry = entry.clone();
        entry.symbol = symbol;
        t.watchlist.push(entry);
        Ok(true)
    }

    async fn remove_watch(&self, user_id: i64, symbol: &str) -> Result<bool, String> {
        let mut t = self.tables.write().await;
        let symbol = symbol.to_uppercase();
        let before = t.watchlist.len();
        t.watchlist
            .retain(|w| !(w.user_id == user_id && w.symbol == symbol));
        Ok(t.watchlist.len() < before)
    }

    async fn list_watchlist(&self, user_id: i64) -> Result<Vec<WatchlistEntry>, String> {
        let t = self.tables.read().await;
        let mut out: Vec<WatchlistEntry> = t
            .watchlist
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        // latest insert first among equal timestamps
        out.reverse();
        out.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(out)
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<(), String> {
        self.tables.write().await.alerts.push(alert.clone());
        Ok(())
    }

    async fn list_user_alerts(&self, user_id: i64) -> Result<Vec<Alert>, String> {
        let t = self.tables.read().await;
        let mut out: Vec<Alert> = t
            .alerts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        out.reverse();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn active_alert_pairs(&self) -> Result<Vec<(i64, String)>, String> {
        let t = self.tables.read().await;
        let pairs: BTreeSet<(i64, String)> = t
            .alerts
            .iter()
            .filter(|a| a.active)
            .map(|a| (a.user_id, a.symbol.to_uppercase()))
            .collect();
        Ok(pairs.into_iter().collect())
    }

    async fn deactivate_alerts(
        &self,
        user_id: i64,
        symbol: &str,
        kind: AlertKind,
        until: i64,
    ) -> Result<Vec<ObjectId>, String> {
        let mut t = self.tables.write().await;
        let symbol = symbol.to_uppercase();
        let mut ids = Vec::new();
        for a in t.alerts.iter_mut().filter(|a| {
            a.active && a.user_id == user_id && a.symbol == symbol && a.kind == kind
        }) {
            a.active = false;
            a.cooldown_until = Some(until);
            ids.push(a.id);
        }
        Ok(ids)
    }

    async fn reactivate_alerts(&self, ids: &[ObjectId], until: i64) -> Result<u64, String> {
        let mut t = self.tables.write().await;
        let mut n = 0;
        for a in t
            .alerts
            .iter_mut()
            .filter(|a| !a.active && a.cooldown_until == Some(until) && ids.contains(&a.id))
        {
            a.active = true;
            a.cooldown_until = None;
            n += 1;
        }
        Ok(n)
    }

    async fn reactivate_expired(&self, now: i64) -> Result<u64, String> {
        let mut t = self.tables.write().await;
        let mut n = 0;
        for a in t
            .alerts
            .iter_mut()
            .filter(|a| !a.active && a.cooldown_until.is_some_and(|until| until <= now))
        {
            a.active = true;
            a.cooldown_until = None;
            n += 1;
        }
        Ok(n)
    }

    async fn delete_alerts(&self, user_id: i64, symbol: &str, kind: AlertKind) -> Result<u64, String> {
        let mut t = self.tables.write().await;
        let symbol = symbol.to_uppercase();
        let before = t.alerts.len();
        t.alerts
            .retain(|a| !(a.user_id == user_id && a.symbol == symbol && a.kind == kind));
        Ok((before - t.alerts.len()) as u64)
    }

    async fn append_snapshot(&self, snapshot: &PriceSnapshot) -> Result<(), String> {
        self.tables
            .write()
            .await
            .history
            .entry(snapshot.symbol.to_uppercase())
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    async fn recent_snapshots(&self, symbol: &str, limit: i64) -> Result<Vec<PriceSnapshot>, String> {
        let t = self.tables.read().await;
        let Some(rows) = t.history.get(&symbol.to_uppercase()) else {
            return Ok(Vec::new());
        };
        let mut out = rows.clone();
        // newest first; ties keep the later append first
        out.reverse();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }
}
