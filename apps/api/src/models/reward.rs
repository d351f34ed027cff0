use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A reward redeemable for points. Goals may point at one via `linked_reward_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Reward {
    pub id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub cost: f64,
    pub earned: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReward {
    pub text: String,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub earned: bool,
}

impl NewReward {
    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("text cannot be empty".to_string());
        }
        if !self.cost.is_finite() || self.cost < 0.0 {
            return Err("cost must be a non-negative number".to_string());
        }
        Ok(())
    }
}

impl From<&Reward> for NewReward {
    fn from(reward: &Reward) -> Self {
        Self {
            text: reward.text.clone(),
            cost: reward.cost,
            earned: reward.earned,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earned: Option<bool>,
}

impl RewardPatch {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(text) = &self.text {
            if text.trim().is_empty() {
                return Err("text cannot be empty".to_string());
            }
        }
        if let Some(cost) = self.cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err("cost must be a non-negative number".to_string());
            }
        }
        Ok(())
    }

    pub fn apply(&self, reward: &mut Reward) {
        if let Some(text) = &self.text {
            reward.text = text.clone();
        }
        if let Some(cost) = self.cost {
            reward.cost = cost;
        }
        if let Some(earned) = self.earned {
            reward.earned = earned;
        }
    }
}
