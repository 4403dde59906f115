use serde::{Deserialize, Serialize};

use super::Personality;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    // chat id of the user, also the notification recipient
    #[serde(rename = "_id")]
    pub id: i64,

    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,

    #[serde(default)]
    pub personality: Personality,

    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name, &self.username) {
            (Some(first), Some(last), _) => format!("{first} {last}"),
            (Some(first), None, _) => first.clone(),
            (None, _, Some(username)) => username.clone(),
            _ => self.id.to_string(),
        }
    }
}

/// Per-user settings created alongside the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(rename = "_id")]
    pub user_id: i64,

    pub update_frequency: i64,
    pub alerts_enabled: bool,
    pub chart_style: String,
    pub timezone: String,
}

impl UserPreferences {
    pub fn defaults(user_id: i64) -> Self {
        Self {
            user_id,
            update_frequency: 60,
            alerts_enabled: true,
            chart_style: "line".to_string(),
            timezone: "Asia/Taipei".to_string(),
        }
    }
}
