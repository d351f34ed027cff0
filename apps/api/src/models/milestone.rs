use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct GoalMilestone {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goal_id: Uuid,
    pub title: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMilestone {
    pub title: String,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

impl NewMilestone {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title cannot be empty".to_string());
        }
        Ok(())
    }
}

/// User-supplied progress snapshot for a goal. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct GoalProgressNote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goal_id: Uuid,
    pub content: String,
    pub progress_percent: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProgressNote {
    pub content: String,
    #[serde(default)]
    pub progress_percent: Option<i32>,
}

impl NewProgressNote {
    pub fn validate(&self) -> Result<(), String> {
        if self.content.trim().is_empty() {
            return Err("content cannot be empty".to_string());
        }
        if let Some(p) = self.progress_percent {
            if !(0..=100).contains(&p) {
                return Err("progress_percent must be between 0 and 100".to_string());
            }
        }
        Ok(())
    }
}
