use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Blessing {
    pub id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

fn default_category() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBlessing {
    pub text: String,
    #[serde(default = "default_category")]
    pub category: String,
}

impl NewBlessing {
    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("text cannot be empty".to_string());
        }
        Ok(())
    }
}

impl From<&Blessing> for NewBlessing {
    fn from(blessing: &Blessing) -> Self {
        Self {
            text: blessing.text.clone(),
            category: blessing.category.clone(),
        }
    }
}
