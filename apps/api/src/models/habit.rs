use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Habit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub color: String,
    pub recurrence: String,
    pub target_days_per_week: i32,
    pub linked_goal_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// One completion per habit per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct HabitCompletion {
    pub id: Uuid,
    pub user_id: Uuid,
    pub habit_id: Uuid,
    pub completed_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

fn default_color() -> String {
    "#3b82f6".to_string()
}

fn default_recurrence() -> String {
    "daily".to_string()
}

fn default_target() -> i32 {
    7
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHabit {
    pub title: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_recurrence")]
    pub recurrence: String,
    #[serde(default = "default_target")]
    pub target_days_per_week: i32,
    #[serde(default)]
    pub linked_goal_id: Option<Uuid>,
}

impl NewHabit {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title cannot be empty".to_string());
        }
        if !(1..=7).contains(&self.target_days_per_week) {
            return Err("target_days_per_week must be between 1 and 7".to_string());
        }
        if !matches!(self.recurrence.as_str(), "daily" | "weekly") {
            return Err("recurrence must be 'daily' or 'weekly'".to_string());
        }
        Ok(())
    }
}
