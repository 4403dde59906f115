use std::fmt;
use std::str::FromStr;

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PriceHigh,
    PriceLow,
    PriceChange,
    VolumeSpike,
    Volatility,
}

impl AlertKind {
    pub const ALL: [AlertKind; 5] = [
        AlertKind::PriceHigh,
        AlertKind::PriceLow,
        AlertKind::PriceChange,
        AlertKind::VolumeSpike,
        AlertKind::Volatility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::PriceHigh => "price_high",
            AlertKind::PriceLow => "price_low",
            AlertKind::PriceChange => "price_change",
            AlertKind::VolumeSpike => "volume_spike",
            AlertKind::Volatility => "volatility",
        }
    }

    /// Human label used in alert summaries.
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::PriceHigh => "Price above",
            AlertKind::PriceLow => "Price below",
            AlertKind::PriceChange => "Price change",
            AlertKind::VolumeSpike => "Volume spike",
            AlertKind::Volatility => "Volatility",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        AlertKind::ALL
            .into_iter()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| format!("unknown alert kind: {s}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub user_id: i64,
    pub symbol: String,

    pub kind: AlertKind,
    pub threshold: f64,

    pub active: bool,
    pub created_at: i64,

    // set while the alert sits out its cool-down after firing
    #[serde(default)]
    pub cooldown_until: Option<i64>,
}

impl Alert {
    pub fn new(user_id: i64, symbol: &str, kind: AlertKind, threshold: f64, created_at: i64) -> Self {
        Self {
            id: ObjectId::new(),
            user_id,
            symbol: symbol.to_uppercase(),
            kind,
            threshold,
            active: true,
            created_at,
            cooldown_until: None,
        }
    }
}
