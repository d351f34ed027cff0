use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-user preferences. A single row per user; defaults apply until one is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub is_blue_theme: bool,
    pub is_dark_mode: bool,
    pub column_split: i32,
    pub onboarding_completed: bool,
    pub notifications_enabled: bool,
    pub reminder_time: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn default_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            display_name: None,
            is_blue_theme: false,
            is_dark_mode: false,
            column_split: 50,
            onboarding_completed: false,
            notifications_enabled: true,
            reminder_time: None,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, deserialize_with = "crate::models::deserialize_some")]
    pub display_name: Option<Option<String>>,
    #[serde(default)]
    pub is_blue_theme: Option<bool>,
    #[serde(default)]
    pub is_dark_mode: Option<bool>,
    #[serde(default)]
    pub column_split: Option<i32>,
    #[serde(default)]
    pub onboarding_completed: Option<bool>,
    #[serde(default)]
    pub notifications_enabled: Option<bool>,
    #[serde(default, deserialize_with = "crate::models::deserialize_some")]
    pub reminder_time: Option<Option<String>>,
}

impl ProfilePatch {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(split) = self.column_split {
            if !(0..=100).contains(&split) {
                return Err("column_split must be between 0 and 100".to_string());
            }
        }
        Ok(())
    }

    pub fn apply(&self, profile: &mut UserProfile) {
        if let Some(name) = &self.display_name {
            profile.display_name = name.clone();
        }
        if let Some(v) = self.is_blue_theme {
            profile.is_blue_theme = v;
        }
        if let Some(v) = self.is_dark_mode {
            profile.is_dark_mode = v;
        }
        if let Some(v) = self.column_split {
            profile.column_split = v;
        }
        if let Some(v) = self.onboarding_completed {
            profile.onboarding_completed = v;
        }
        if let Some(v) = self.notifications_enabled {
            profile.notifications_enabled = v;
        }
        if let Some(t) = &self.reminder_time {
            profile.reminder_time = t.clone();
        }
    }
}
