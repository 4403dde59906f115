//! Persistence seam.
//!
//! Everything the bot keeps between polls goes through [`Store`]. Operations
//! are short and independent of each other; callers log failures and move on.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::models::{
    Alert, AlertKind, Personality, PriceSnapshot, User, UserPreferences, WatchlistEntry,
};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), String>;

    // ---------------- users ----------------

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, String>;
    async fn upsert_user(&self, user: &User) -> Result<(), String>;
    /// Returns false when the user does not exist.
    async fn set_personality(
        &self,
        user_id: i64,
        personality: Personality,
        updated_at: i64,
    ) -> Result<bool, String>;

    async fn get_preferences(&self, user_id: i64) -> Result<Option<UserPreferences>, String>;
    /// Inserts default preferences unless the user already has some.
    async fn ensure_preferences(&self, user_id: i64) -> Result<UserPreferences, String>;
    async fn save_preferences(&self, prefs: &UserPreferences) -> Result<(), String>;

    // ---------------- watchlist ----------------

    /// Returns false when (user, symbol) is already watched.
    async fn add_watch(&self, entry: &WatchlistEntry) -> Result<bool, String>;
    async fn remove_watch(&self, user_id: i64, symbol: &str) -> Result<bool, String>;
    /// Newest first.
    async fn list_watchlist(&self, user_id: i64) -> Result<Vec<WatchlistEntry>, String>;

    // ---------------- alerts ----------------

    async fn insert_alert(&self, alert: &Alert) -> Result<(), String>;
    /// Newest first.
    async fn list_user_alerts(&self, user_id: i64) -> Result<Vec<Alert>, String>;
    /// Distinct (user, symbol) pairs with at least one active alert.
    async fn active_alert_pairs(&self) -> Result<Vec<(i64, String)>, String>;
    /// Deactivates the active alerts of (user, symbol, kind) until `until`
    /// and returns their ids.
    async fn deactivate_alerts(
        &self,
        user_id: i64,
        symbol: &str,
        kind: AlertKind,
        until: i64,
    ) -> Result<Vec<ObjectId>, String>;
    /// Reactivates the given alerts if they are still sitting out the
    /// cool-down that ends at `until`. Alerts already back, or paused again
    /// by a later cool-down, are left alone.
    async fn reactivate_alerts(&self, ids: &[ObjectId], until: i64) -> Result<u64, String>;
    /// Reactivates every alert whose cool-down ended at or before `now`.
    async fn reactivate_expired(&self, now: i64) -> Result<u64, String>;
    async fn delete_alerts(&self, user_id: i64, symbol: &str, kind: AlertKind) -> Result<u64, String>;

    // ---------------- price history ----------------

    async fn append_snapshot(&self, snapshot: &PriceSnapshot) -> Result<(), String>;
    /// Most recent first, at most `limit` rows.
    async fn recent_snapshots(&self, symbol: &str, limit: i64) -> Result<Vec<PriceSnapshot>, String>;
}
