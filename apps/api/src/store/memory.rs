//! In-process store used when no database is configured, and as the test double
//! for everything that talks to a [`RemoteStore`].

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{RemoteStore, StoreError};
use crate::models::blessing::{Blessing, NewBlessing};
use crate::models::chat::ChatHistoryRow;
use crate::models::goal::{Goal, GoalPatch, NewGoal};
use crate::models::habit::{Habit, HabitCompletion, NewHabit};
use crate::models::milestone::{GoalMilestone, GoalProgressNote, NewMilestone, NewProgressNote};
use crate::models::profile::{ProfilePatch, UserProfile};
use crate::models::quote::Quote;
use crate::models::reward::{NewReward, Reward, RewardPatch};
use crate::models::vision::{NewVisionBoardItem, VisionBoardItem};

#[derive(Default)]
struct Tables {
    goals: Vec<Goal>,
    blessings: Vec<Blessing>,
    rewards: Vec<Reward>,
    habits: Vec<Habit>,
    completions: Vec<HabitCompletion>,
    milestones: Vec<GoalMilestone>,
    notes: Vec<GoalProgressNote>,
    vision: Vec<VisionBoardItem>,
    profiles: Vec<UserProfile>,
    chat: Vec<ChatHistoryRow>,
    quotes: Vec<Quote>,
}

/// Vec-backed store. Rows are kept in insertion order; list calls return newest first
/// where the Postgres store orders by `created_at DESC`.
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    writes_left: AtomicUsize,
}

const UNLIMITED_WRITES: usize = usize::MAX;

const SEED_QUOTES: &[(&str, &str)] = &[
    ("The secret of getting ahead is getting started.", "Mark Twain"),
    ("Small deeds done are better than great deeds planned.", "Peter Marshall"),
    ("What you do every day matters more than what you do once in a while.", "Gretchen Rubin"),
];

impl InMemoryStore {
    fn with_tables(tables: Tables) -> Self {
        Self {
            tables: Mutex::new(tables),
            writes_left: AtomicUsize::new(UNLIMITED_WRITES),
        }
    }

    #[cfg(test)]
    pub fn new() -> Self {
        Self::with_tables(Tables::default())
    }

    /// A store pre-populated with a few quotes, for running the service without a database.
    pub fn seeded() -> Self {
        Self::with_tables(Tables {
            quotes: SEED_QUOTES
                .iter()
                .map(|(text, author)| Quote {
                    id: Uuid::new_v4(),
                    text: text.to_string(),
                    author: Some(author.to_string()),
                })
                .collect(),
            ..Default::default()
        })
    }

    /// Makes every subsequent write fail with [`StoreError::Rejected`] until reset.
    #[cfg(test)]
    pub fn fail_writes(&self, fail: bool) {
        let left = if fail { 0 } else { UNLIMITED_WRITES };
        self.writes_left.store(left, Ordering::SeqCst);
    }

    /// Lets `writes` more writes through, then rejects the rest.
    #[cfg(test)]
    pub fn fail_writes_after(&self, writes: usize) {
        self.writes_left.store(writes, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        self.writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                UNLIMITED_WRITES => Some(UNLIMITED_WRITES),
                n => Some(n - 1),
            })
            .map(|_| ())
            .map_err(|_| StoreError::Rejected("store is rejecting writes".to_string()))
    }
}

fn newest_first<T: Clone>(rows: impl DoubleEndedIterator<Item = T>) -> Vec<T> {
    rows.rev().collect()
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn list_goals(&self, user_id: Uuid) -> Result<Vec<Goal>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(newest_first(
            tables.goals.iter().filter(|g| g.user_id == user_id).cloned(),
        ))
    }

    async fn get_goal(&self, user_id: Uuid, id: Uuid) -> Result<Option<Goal>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .goals
            .iter()
            .find(|g| g.id == id && g.user_id == user_id)
            .cloned())
    }

    async fn insert_goal(&self, user_id: Uuid, new: &NewGoal) -> Result<Goal, StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let number = new.number.unwrap_or_else(|| {
            tables
                .goals
                .iter()
                .filter(|g| g.user_id == user_id)
                .map(|g| g.number)
                .max()
                .unwrap_or(0)
                + 1
        });
        let goal = Goal {
            id: Uuid::new_v4(),
            user_id,
            number,
            year: new.year.unwrap_or_else(|| now.year()),
            goal: new.goal.clone(),
            category: new.category,
            period: new.period,
            status: new.status,
            action: new.action.clone(),
            cost: new.cost,
            notes: new.notes.clone(),
            pinned: new.pinned,
            linked_reward_id: new.linked_reward_id,
            progress: new.progress,
            due_date: new.due_date,
            created_at: now,
            updated_at: now,
            subtasks: new.subtasks.clone(),
            is_vague: new.is_vague,
            ai_refinement_suggestion: new.ai_refinement_suggestion.clone(),
        };
        tables.goals.push(goal.clone());
        Ok(goal)
    }

    async fn update_goal(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &GoalPatch,
    ) -> Result<Goal, StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let goal = tables
            .goals
            .iter_mut()
            .find(|g| g.id == id && g.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("Goal {id}")))?;
        patch.apply(goal);
        goal.updated_at = Utc::now();
        Ok(goal.clone())
    }

    async fn delete_goal(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let before = tables.goals.len();
        tables.goals.retain(|g| !(g.id == id && g.user_id == user_id));
        if tables.goals.len() == before {
            return Err(StoreError::NotFound(format!("Goal {id}")));
        }
        tables.milestones.retain(|m| m.goal_id != id);
        tables.notes.retain(|n| n.goal_id != id);
        Ok(())
    }

    async fn list_blessings(&self, user_id: Uuid) -> Result<Vec<Blessing>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(newest_first(
            tables.blessings.iter().filter(|b| b.user_id == user_id).cloned(),
        ))
    }

    async fn insert_blessing(
        &self,
        user_id: Uuid,
        new: &NewBlessing,
    ) -> Result<Blessing, StoreError> {
        self.check_writable()?;
        let blessing = Blessing {
            id: Uuid::new_v4(),
            user_id,
            text: new.text.clone(),
            category: new.category.clone(),
            created_at: Utc::now(),
        };
        self.tables.lock().await.blessings.push(blessing.clone());
        Ok(blessing)
    }

    async fn delete_blessing(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let before = tables.blessings.len();
        tables
            .blessings
            .retain(|b| !(b.id == id && b.user_id == user_id));
        if tables.blessings.len() == before {
            return Err(StoreError::NotFound(format!("Blessing {id}")));
        }
        Ok(())
    }

    async fn list_rewards(&self, user_id: Uuid) -> Result<Vec<Reward>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(newest_first(
            tables.rewards.iter().filter(|r| r.user_id == user_id).cloned(),
        ))
    }

    async fn insert_reward(&self, user_id: Uuid, new: &NewReward) -> Result<Reward, StoreError> {
        self.check_writable()?;
        let reward = Reward {
            id: Uuid::new_v4(),
            user_id,
            text: new.text.clone(),
            cost: new.cost,
            earned: new.earned,
            created_at: Utc::now(),
        };
        self.tables.lock().await.rewards.push(reward.clone());
        Ok(reward)
    }

    async fn update_reward(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &RewardPatch,
    ) -> Result<Reward, StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let reward = tables
            .rewards
            .iter_mut()
            .find(|r| r.id == id && r.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("Reward {id}")))?;
        patch.apply(reward);
        Ok(reward.clone())
    }

    async fn delete_reward(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let before = tables.rewards.len();
        tables.rewards.retain(|r| !(r.id == id && r.user_id == user_id));
        if tables.rewards.len() == before {
            return Err(StoreError::NotFound(format!("Reward {id}")));
        }
        Ok(())
    }

    async fn list_habits(&self, user_id: Uuid) -> Result<Vec<Habit>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .habits
            .iter()
            .filter(|h| h.user_id == user_id && h.active)
            .cloned()
            .collect())
    }

    async fn insert_habit(&self, user_id: Uuid, new: &NewHabit) -> Result<Habit, StoreError> {
        self.check_writable()?;
        let habit = Habit {
            id: Uuid::new_v4(),
            user_id,
            title: new.title.clone(),
            color: new.color.clone(),
            recurrence: new.recurrence.clone(),
            target_days_per_week: new.target_days_per_week,
            linked_goal_id: new.linked_goal_id,
            active: true,
            created_at: Utc::now(),
        };
        self.tables.lock().await.habits.push(habit.clone());
        Ok(habit)
    }

    async fn list_habit_completions(
        &self,
        user_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<HabitCompletion>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .completions
            .iter()
            .filter(|c| c.user_id == user_id && c.completed_date >= since)
            .cloned()
            .collect())
    }

    async fn set_habit_completion(
        &self,
        user_id: Uuid,
        habit_id: Uuid,
        date: NaiveDate,
        completed: bool,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        if !tables
            .habits
            .iter()
            .any(|h| h.id == habit_id && h.user_id == user_id)
        {
            return Err(StoreError::NotFound(format!("Habit {habit_id}")));
        }
        let exists = tables
            .completions
            .iter()
            .any(|c| c.habit_id == habit_id && c.completed_date == date);
        match (completed, exists) {
            (true, false) => tables.completions.push(HabitCompletion {
                id: Uuid::new_v4(),
                user_id,
                habit_id,
                completed_date: date,
                created_at: Utc::now(),
            }),
            (false, true) => tables
                .completions
                .retain(|c| !(c.habit_id == habit_id && c.completed_date == date)),
            _ => {}
        }
        Ok(())
    }

    async fn list_milestones(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
    ) -> Result<Vec<GoalMilestone>, StoreError> {
        let tables = self.tables.lock().await;
        let mut milestones: Vec<GoalMilestone> = tables
            .milestones
            .iter()
            .filter(|m| m.user_id == user_id && m.goal_id == goal_id)
            .cloned()
            .collect();
        milestones.sort_by_key(|m| m.sort_order);
        Ok(milestones)
    }

    async fn insert_milestone(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        new: &NewMilestone,
    ) -> Result<GoalMilestone, StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let sort_order = new.sort_order.unwrap_or_else(|| {
            tables
                .milestones
                .iter()
                .filter(|m| m.goal_id == goal_id)
                .map(|m| m.sort_order + 1)
                .max()
                .unwrap_or(0)
        });
        let milestone = GoalMilestone {
            id: Uuid::new_v4(),
            user_id,
            goal_id,
            title: new.title.clone(),
            completed: false,
            completed_at: None,
            sort_order,
            created_at: Utc::now(),
        };
        tables.milestones.push(milestone.clone());
        Ok(milestone)
    }

    async fn set_milestone_completed(
        &self,
        user_id: Uuid,
        id: Uuid,
        completed: bool,
    ) -> Result<GoalMilestone, StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let milestone = tables
            .milestones
            .iter_mut()
            .find(|m| m.id == id && m.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("Milestone {id}")))?;
        milestone.completed = completed;
        milestone.completed_at = completed.then(Utc::now);
        Ok(milestone.clone())
    }

    async fn delete_milestone(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let before = tables.milestones.len();
        tables
            .milestones
            .retain(|m| !(m.id == id && m.user_id == user_id));
        if tables.milestones.len() == before {
            return Err(StoreError::NotFound(format!("Milestone {id}")));
        }
        Ok(())
    }

    async fn list_progress_notes(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
    ) -> Result<Vec<GoalProgressNote>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(newest_first(
            tables
                .notes
                .iter()
                .filter(|n| n.user_id == user_id && n.goal_id == goal_id)
                .cloned(),
        ))
    }

    async fn insert_progress_note(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        new: &NewProgressNote,
    ) -> Result<GoalProgressNote, StoreError> {
        self.check_writable()?;
        let note = GoalProgressNote {
            id: Uuid::new_v4(),
            user_id,
            goal_id,
            content: new.content.clone(),
            progress_percent: new.progress_percent,
            created_at: Utc::now(),
        };
        self.tables.lock().await.notes.push(note.clone());
        Ok(note)
    }

    async fn list_vision_items(&self, user_id: Uuid) -> Result<Vec<VisionBoardItem>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(newest_first(
            tables.vision.iter().filter(|v| v.user_id == user_id).cloned(),
        ))
    }

    async fn insert_vision_item(
        &self,
        user_id: Uuid,
        new: &NewVisionBoardItem,
    ) -> Result<VisionBoardItem, StoreError> {
        self.check_writable()?;
        let item = VisionBoardItem {
            id: Uuid::new_v4(),
            user_id,
            image_url: new.image_url.clone(),
            title: new.title.clone(),
            description: new.description.clone(),
            category: new.category.clone(),
            linked_goal_id: new.linked_goal_id,
            created_at: Utc::now(),
        };
        self.tables.lock().await.vision.push(item.clone());
        Ok(item)
    }

    async fn delete_vision_item(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let before = tables.vision.len();
        tables.vision.retain(|v| !(v.id == id && v.user_id == user_id));
        if tables.vision.len() == before {
            return Err(StoreError::NotFound(format!("Vision board item {id}")));
        }
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn upsert_profile(
        &self,
        user_id: Uuid,
        patch: &ProfilePatch,
    ) -> Result<UserProfile, StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let index = match tables.profiles.iter().position(|p| p.user_id == user_id) {
            Some(index) => index,
            None => {
                tables.profiles.push(UserProfile::default_for(user_id));
                tables.profiles.len() - 1
            }
        };
        let profile = &mut tables.profiles[index];
        patch.apply(profile);
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn list_chat_history(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ChatHistoryRow>, StoreError> {
        let tables = self.tables.lock().await;
        let rows: Vec<ChatHistoryRow> = tables
            .chat
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        let skip = rows.len().saturating_sub(limit.max(0) as usize);
        Ok(rows.into_iter().skip(skip).collect())
    }

    async fn append_chat_message(
        &self,
        user_id: Uuid,
        role: &str,
        content: &str,
    ) -> Result<ChatHistoryRow, StoreError> {
        self.check_writable()?;
        let row = ChatHistoryRow {
            id: Uuid::new_v4(),
            user_id,
            role: role.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.tables.lock().await.chat.push(row.clone());
        Ok(row)
    }

    async fn clear_chat_history(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.check_writable()?;
        self.tables
            .lock()
            .await
            .chat
            .retain(|m| m.user_id != user_id);
        Ok(())
    }

    async fn list_quotes(&self) -> Result<Vec<Quote>, StoreError> {
        Ok(self.tables.lock().await.quotes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::goal::{GoalCategory, GoalPeriod, GoalStatus};

    #[tokio::test]
    async fn test_goals_are_scoped_to_owner() {
        let store = InMemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let goal = store
            .insert_goal(
                alice,
                &NewGoal::new("Run 5k", GoalCategory::Personal, GoalPeriod::OneYear),
            )
            .await
            .unwrap();

        assert!(store.get_goal(bob, goal.id).await.unwrap().is_none());
        assert!(matches!(
            store
                .update_goal(bob, goal.id, &GoalPatch::status(GoalStatus::Done))
                .await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.list_goals(alice).await.unwrap().len(), 1);
        assert!(store.list_goals(bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_goal_numbers_default_to_next() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let first = store
            .insert_goal(user, &NewGoal::new("a", GoalCategory::Personal, GoalPeriod::OneYear))
            .await
            .unwrap();
        let second = store
            .insert_goal(user, &NewGoal::new("b", GoalCategory::Personal, GoalPeriod::OneYear))
            .await
            .unwrap();
        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
        let listed = store.list_goals(user).await.unwrap();
        assert_eq!(listed[0].id, second.id, "newest first");
    }

    #[tokio::test]
    async fn test_fail_writes_rejects_inserts() {
        let store = InMemoryStore::new();
        store.fail_writes(true);
        let result = store
            .insert_blessing(
                Uuid::new_v4(),
                &NewBlessing {
                    text: "sunshine".to_string(),
                    category: "general".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_write_budget_rejects_after_limit() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        store.fail_writes_after(1);
        let new = NewGoal::new("a", GoalCategory::Personal, GoalPeriod::OneYear);
        assert!(store.insert_goal(user, &new).await.is_ok());
        assert!(matches!(
            store.insert_goal(user, &new).await,
            Err(StoreError::Rejected(_))
        ));
        store.fail_writes(false);
        assert!(store.insert_goal(user, &new).await.is_ok());
        assert_eq!(store.list_goals(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_habit_completion_is_unique_per_day() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let habit = store
            .insert_habit(
                user,
                &serde_json::from_str::<NewHabit>(r#"{"title": "Stretch"}"#).unwrap(),
            )
            .await
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        store.set_habit_completion(user, habit.id, day, true).await.unwrap();
        store.set_habit_completion(user, habit.id, day, true).await.unwrap();
        let completions = store.list_habit_completions(user, day).await.unwrap();
        assert_eq!(completions.len(), 1);

        store.set_habit_completion(user, habit.id, day, false).await.unwrap();
        assert!(store.list_habit_completions(user, day).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_history_limit_keeps_latest() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        for i in 0..5 {
            store
                .append_chat_message(user, "user", &format!("m{i}"))
                .await
                .unwrap();
        }
        let rows = store.list_chat_history(user, 2).await.unwrap();
        let contents: Vec<_> = rows.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);
    }

    #[tokio::test]
    async fn test_profile_upsert_creates_then_patches() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        assert!(store.get_profile(user).await.unwrap().is_none());
        let patch = ProfilePatch {
            is_dark_mode: Some(true),
            ..Default::default()
        };
        let profile = store.upsert_profile(user, &patch).await.unwrap();
        assert!(profile.is_dark_mode);
        assert_eq!(profile.column_split, 50);
    }
}
