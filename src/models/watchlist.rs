use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

// unique per (user_id, symbol)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistEntry {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub user_id: i64,
    pub symbol: String,

    #[serde(default)]
    pub company_name: Option<String>,

    pub added_at: i64,
}
