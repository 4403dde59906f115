use std::collections::BTreeSet;

use async_trait::async_trait;
use futures_util::StreamExt;
use mongodb::{
    Collection, Database, IndexModel,
    bson::{self, doc, oid::ObjectId},
    options::{FindOptions, IndexOptions, ReplaceOptions},
};
use serde::de::DeserializeOwned;

use super::Store;
use crate::models::{
    Alert, AlertKind, Personality, PriceSnapshot, User, UserPreferences, WatchlistEntry,
};

const USERS: &str = "users";
const PREFERENCES: &str = "user_preferences";
const WATCHLIST: &str = "watchlist";
const ALERTS: &str = "alerts";
const PRICE_HISTORY: &str = "price_history";

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn col<T>(&self, name: &str) -> Collection<T> {
        self.db.collection::<T>(name)
    }

    pub async fn ensure_indexes(&self) -> Result<(), String> {
        // watchlist: unique per (user_id, symbol)
        {
            let col = self.col::<bson::Document>(WATCHLIST);
            let model = IndexModel::builder()
                .keys(doc! { "user_id": 1, "symbol": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build();

            col.create_index(model, None)
                .await
                .map_err(|e| e.to_string())?;
        }

        // alerts: helpful for monitor scan (active + symbol)
        {
            let col = self.col::<bson::Document>(ALERTS);
            let model = IndexModel::builder()
                .keys(doc! { "active": 1, "symbol": 1 })
                .build();

            if let Err(e) = col.create_index(model, None).await {
                tracing::warn!("[store] alerts index not created: {}", e);
            }
        }

        // price_history: newest rows per symbol
        {
            let col = self.col::<bson::Document>(PRICE_HISTORY);
            let model = IndexModel::builder()
                .keys(doc! { "symbol": 1, "timestamp": -1 })
                .build();

            col.create_index(model, None)
                .await
                .map_err(|e| e.to_string())?;
        }

        Ok(())
    }
}

async fn collect<T>(mut cursor: mongodb::Cursor<T>) -> Result<Vec<T>, String>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut out = Vec::new();
    while let Some(res) = cursor.next().await {
        out.push(res.map_err(|e| e.to_string())?);
    }
    Ok(out)
}

#[async_trait]
impl Store for MongoStore {
    async fn ping(&self) -> Result<(), String> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, String> {
        self.col::<User>(USERS)
            .find_one(doc! { "_id": user_id }, None)
            .await
            .map_err(|e| e.to_string())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), String> {
        let opts = ReplaceOptions::builder().upsert(true).build();
        self.col::<User>(USERS)
            .replace_one(doc! { "_id": user.id }, user, opts)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn set_personality(
        &self,
        user_id: i64,
        personality: Personality,
        updated_at: i64,
    ) -> Result<bool, String> {
        let res = self
            .col::<User>(USERS)
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "personality": personality.as_str(), "updated_at": updated_at } },
                None,
            )
            .await
            .map_err(|e| e.to_string())?;

        Ok(res.matched_count > 0)
    }

    async fn get_preferences(&self, user_id: i64) -> Result<Option<UserPreferences>, String> {
        self.col::<UserPreferences>(PREFERENCES)
            .find_one(doc! { "_id": user_id }, None)
            .await
            .map_err(|e| e.to_string())
    }

    async fn ensure_preferences(&self, user_id: i64) -> Result<UserPreferences, String> {
        if let Some(prefs) = self.get_preferences(user_id).await? {
            return Ok(prefs);
        }

        let prefs = UserPreferences::defaults(user_id);
        self.col::<UserPreferences>(PREFERENCES)
            .insert_one(&prefs, None)
            .await
            .map_err(|e| e.to_string())?;

        Ok(prefs)
    }

    async fn save_preferences(&self, prefs: &UserPreferences) -> Result<(), String> {
        let opts = ReplaceOptions::builder().upsert(true).build();
        self.col::<UserPreferences>(PREFERENCES)
            .replace_one(doc! { "_id": prefs.user_id }, prefs, opts)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn add_watch(&self, entry: &WatchlistEntry) -> Result<bool, String> {
        match self
            .col::<WatchlistEntry>(WATCHLIST)
            .insert_one(entry, None)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("E11000") {
                    Ok(false)
                } else {
                    Err(msg)
                }
            }
        }
    }

    async fn remove_watch(&self, user_id: i64, symbol: &str) -> Result<bool, String> {
        let res = self
            .col::<WatchlistEntry>(WATCHLIST)
            .delete_one(doc! { "user_id": user_id, "symbol": symbol.to_uppercase() }, None)
            .await
            .map_err(|e| e.to_string())?;

        Ok(res.deleted_count > 0)
    }

    async fn list_watchlist(&self, user_id: i64) -> Result<Vec<WatchlistEntry>, String> {
        let find_opts = FindOptions::builder().sort(doc! { "added_at": -1 }).build();

        let cursor = self
            .col::<WatchlistEntry>(WATCHLIST)
            .find(doc! { "user_id": user_id }, find_opts)
            .await
            .map_err(|e| e.to_string())?;

        collect(cursor).await
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<(), String> {
        self.col::<Alert>(ALERTS)
            .insert_one(alert, None)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn list_user_alerts(&self, user_id: i64) -> Result<Vec<Alert>, String> {
        let find_opts = FindOptions::builder().sort(doc! { "created_at": -1 }).build();

        let cursor = self
            .col::<Alert>(ALERTS)
            .find(doc! { "user_id": user_id }, find_opts)
            .await
            .map_err(|e| e.to_string())?;

        collect(cursor).await
    }

    async fn active_alert_pairs(&self) -> Result<Vec<(i64, String)>, String> {
        let cursor = self
            .col::<Alert>(ALERTS)
            .find(doc! { "active": true }, None)
            .await
            .map_err(|e| e.to_string())?;

        let pairs: BTreeSet<(i64, String)> = collect(cursor)
            .await?
            .into_iter()
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
        let alerts = self.col::<Alert>(ALERTS);

        let cursor = alerts
            .find(
                doc! {
                    "user_id": user_id,
                    "symbol": symbol.to_uppercase(),
                    "kind": kind.as_str(),
                    "active": true,
                },
                None,
            )
            .await
            .map_err(|e| e.to_string())?;

        let ids: Vec<ObjectId> = collect(cursor).await?.into_iter().map(|a| a.id).collect();
        if ids.is_empty() {
            return Ok(ids);
        }

        alerts
            .update_many(
                doc! { "_id": { "$in": ids.clone() }, "active": true },
                doc! { "$set": { "active": false, "cooldown_until": until } },
                None,
            )
            .await
            .map_err(|e| e.to_string())?;

        Ok(ids)
    }

    async fn reactivate_alerts(&self, ids: &[ObjectId], until: i64) -> Result<u64, String> {
        if ids.is_empty() {
            return Ok(0);
        }

        let res = self
            .col::<Alert>(ALERTS)
            .update_many(
                doc! { "_id": { "$in": ids.to_vec() }, "active": false, "cooldown_until": until },
                doc! { "$set": { "active": true, "cooldown_until": bson::Bson::Null } },
                None,
            )
            .await
            .map_err(|e| e.to_string())?;

        Ok(res.modified_count)
    }

    async fn reactivate_expired(&self, now: i64) -> Result<u64, String> {
        let res = self
            .col::<Alert>(ALERTS)
            .update_many(
                doc! { "active": false, "cooldown_until": { "$lte": now } },
                doc! { "$set": { "active": true, "cooldown_until": bson::Bson::Null } },
                None,
            )
            .await
            .map_err(|e| e.to_string())?;

        Ok(res.modified_count)
    }

    async fn delete_alerts(&self, user_id: i64, symbol: &str, kind: AlertKind) -> Result<u64, String> {
        let res = self
            .col::<Alert>(ALERTS)
            .delete_many(
                doc! { "user_id": user_id, "symbol": symbol.to_uppercase(), "kind": kind.as_str() },
                None,
            )
            .await
            .map_err(|e| e.to_string())?;

        Ok(res.deleted_count)
    }

    async fn append_snapshot(&self, snapshot: &PriceSnapshot) -> Result<(), String> {
        self.col::<PriceSnapshot>(PRICE_HISTORY)
            .insert_one(snapshot, None)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn recent_snapshots(&self, symbol: &str, limit: i64) -> Result<Vec<PriceSnapshot>, String> {
        let find_opts = FindOptions::builder()
            .sort(doc! { "timestamp": -1 })
            .limit(limit)
            .build();

        let cursor = self
            .col::<PriceSnapshot>(PRICE_HISTORY)
            .find(doc! { "symbol": symbol.to_uppercase() }, find_opts)
            .await
            .map_err(|e| e.to_string())?;

        collect(cursor).await
    }
}
