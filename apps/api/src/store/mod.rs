//! Remote Store boundary.
//!
//! Every collection is scoped to an owner identity. Reads of rows owned by
//! another user behave exactly like reads of rows that do not exist.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::blessing::{Blessing, NewBlessing};
use crate::models::chat::ChatHistoryRow;
use crate::models::goal::{Goal, GoalPatch, NewGoal};
use crate::models::habit::{Habit, HabitCompletion, NewHabit};
use crate::models::milestone::{GoalMilestone, GoalProgressNote, NewMilestone, NewProgressNote};
use crate::models::profile::{ProfilePatch, UserProfile};
use crate::models::quote::Quote;
use crate::models::reward::{NewReward, Reward, RewardPatch};
use crate::models::vision::{NewVisionBoardItem, VisionBoardItem};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Row-level access to every collection the application persists.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    // Goals
    async fn list_goals(&self, user_id: Uuid) -> Result<Vec<Goal>, StoreError>;
    async fn get_goal(&self, user_id: Uuid, id: Uuid) -> Result<Option<Goal>, StoreError>;
    async fn insert_goal(&self, user_id: Uuid, goal: &NewGoal) -> Result<Goal, StoreError>;
    async fn update_goal(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &GoalPatch,
    ) -> Result<Goal, StoreError>;
    async fn delete_goal(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError>;

    // Blessings
    async fn list_blessings(&self, user_id: Uuid) -> Result<Vec<Blessing>, StoreError>;
    async fn insert_blessing(
        &self,
        user_id: Uuid,
        blessing: &NewBlessing,
    ) -> Result<Blessing, StoreError>;
    async fn delete_blessing(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError>;

    // Rewards
    async fn list_rewards(&self, user_id: Uuid) -> Result<Vec<Reward>, StoreError>;
    async fn insert_reward(&self, user_id: Uuid, reward: &NewReward)
        -> Result<Reward, StoreError>;
    async fn update_reward(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &RewardPatch,
    ) -> Result<Reward, StoreError>;
    async fn delete_reward(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError>;

    // Habits
    async fn list_habits(&self, user_id: Uuid) -> Result<Vec<Habit>, StoreError>;
    async fn insert_habit(&self, user_id: Uuid, habit: &NewHabit) -> Result<Habit, StoreError>;
    async fn list_habit_completions(
        &self,
        user_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<HabitCompletion>, StoreError>;
    /// Marks or unmarks a habit for one day. Idempotent in both directions.
    async fn set_habit_completion(
        &self,
        user_id: Uuid,
        habit_id: Uuid,
        date: NaiveDate,
        completed: bool,
    ) -> Result<(), StoreError>;

    // Milestones and progress notes
    async fn list_milestones(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
    ) -> Result<Vec<GoalMilestone>, StoreError>;
    async fn insert_milestone(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        milestone: &NewMilestone,
    ) -> Result<GoalMilestone, StoreError>;
    async fn set_milestone_completed(
        &self,
        user_id: Uuid,
        id: Uuid,
        completed: bool,
    ) -> Result<GoalMilestone, StoreError>;
    async fn delete_milestone(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError>;
    async fn list_progress_notes(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
    ) -> Result<Vec<GoalProgressNote>, StoreError>;
    async fn insert_progress_note(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        note: &NewProgressNote,
    ) -> Result<GoalProgressNote, StoreError>;

    // Vision board
    async fn list_vision_items(&self, user_id: Uuid) -> Result<Vec<VisionBoardItem>, StoreError>;
    async fn insert_vision_item(
        &self,
        user_id: Uuid,
        item: &NewVisionBoardItem,
    ) -> Result<VisionBoardItem, StoreError>;
    async fn delete_vision_item(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError>;

    // Profile
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError>;
    async fn upsert_profile(
        &self,
        user_id: Uuid,
        patch: &ProfilePatch,
    ) -> Result<UserProfile, StoreError>;

    // AI coach transcript, oldest first
    async fn list_chat_history(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ChatHistoryRow>, StoreError>;
    async fn append_chat_message(
        &self,
        user_id: Uuid,
        role: &str,
        content: &str,
    ) -> Result<ChatHistoryRow, StoreError>;
    async fn clear_chat_history(&self, user_id: Uuid) -> Result<(), StoreError>;

    // Quotes (shared, read-only)
    async fn list_quotes(&self) -> Result<Vec<Quote>, StoreError>;
}
