use chrono::Utc;

use crate::{
    AppState,
    models::{Personality, User, UserPreferences},
};

/// Profile fields the chat layer knows about a user.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Creates the user on first contact, refreshes the profile fields otherwise.
/// Personality and `created_at` survive the refresh.
pub async fn ensure_user(state: &AppState, user_id: i64, profile: Profile) -> Result<User, String> {
    let now = Utc::now().timestamp();

    let user = match state.store.get_user(user_id).await? {
        Some(existing) => User {
            username: profile.username.or(existing.username),
            first_name: profile.first_name.or(existing.first_name),
            last_name: profile.last_name.or(existing.last_name),
            updated_at: now,
            ..existing
        },
        None => {
            tracing::info!("[users] new user {}", user_id);
            User {
                id: user_id,
                username: profile.username,
                first_name: profile.first_name,
                last_name: profile.last_name,
                personality: Personality::default(),
                created_at: now,
                updated_at: now,
            }
        }
    };

    state.store.upsert_user(&user).await?;
    state.store.ensure_preferences(user_id).await?;

    Ok(user)
}

pub async fn personality(state: &AppState, user_id: i64) -> Result<Personality, String> {
    Ok(state
        .store
        .get_user(user_id)
        .await?
        .map(|u| u.personality)
        .unwrap_or_default())
}

pub async fn set_personality(
    state: &AppState,
    user_id: i64,
    personality: Personality,
) -> Result<(), String> {
    let updated = state
        .store
        .set_personality(user_id, personality, Utc::now().timestamp())
        .await?;

    if !updated {
        return Err("User not found.".into());
    }

    Ok(())
}

pub async fn set_alerts_enabled(
    state: &AppState,
    user_id: i64,
    enabled: bool,
) -> Result<UserPreferences, String> {
    let mut prefs = state.store.ensure_preferences(user_id).await?;
    prefs.alerts_enabled = enabled;
    state.store.save_preferences(&prefs).await?;
    Ok(prefs)
}
