use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{RemoteStore, StoreError};
use crate::models::blessing::{Blessing, NewBlessing};
use crate::models::chat::ChatHistoryRow;
use crate::models::goal::{Goal, GoalPatch, GoalRow, NewGoal};
use crate::models::habit::{Habit, HabitCompletion, NewHabit};
use crate::models::milestone::{GoalMilestone, GoalProgressNote, NewMilestone, NewProgressNote};
use crate::models::profile::{ProfilePatch, UserProfile};
use crate::models::quote::Quote;
use crate::models::reward::{NewReward, Reward, RewardPatch};
use crate::models::vision::{NewVisionBoardItem, VisionBoardItem};

/// Postgres-backed store. Every query filters on `user_id`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_goal(row: GoalRow) -> Result<Goal, StoreError> {
    let id = row.id;
    Goal::try_from(row).map_err(|e| StoreError::Corrupt(format!("goal {id}: {e}")))
}

fn expect_deleted(rows_affected: u64, what: String) -> Result<(), StoreError> {
    if rows_affected == 0 {
        return Err(StoreError::NotFound(what));
    }
    Ok(())
}

#[async_trait]
impl RemoteStore for PgStore {
    async fn list_goals(&self, user_id: Uuid) -> Result<Vec<Goal>, StoreError> {
        let rows = sqlx::query_as::<_, GoalRow>(
            "SELECT * FROM goals WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(to_goal).collect()
    }

    async fn get_goal(&self, user_id: Uuid, id: Uuid) -> Result<Option<Goal>, StoreError> {
        let row = sqlx::query_as::<_, GoalRow>(
            "SELECT * FROM goals WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(to_goal).transpose()
    }

    async fn insert_goal(&self, user_id: Uuid, new: &NewGoal) -> Result<Goal, StoreError> {
        let row = sqlx::query_as::<_, GoalRow>(
            r#"
            INSERT INTO goals
                (user_id, number, year, goal, category, period, status, action, cost,
                 notes, pinned, linked_reward_id, progress, due_date, subtasks,
                 is_vague, ai_refinement_suggestion)
            VALUES (
                $1,
                COALESCE($2, (SELECT COALESCE(MAX(number), 0) + 1 FROM goals WHERE user_id = $1)),
                COALESCE($3, EXTRACT(YEAR FROM now())::INTEGER),
                $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17
            )
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(new.number)
        .bind(new.year)
        .bind(&new.goal)
        .bind(new.category.as_str())
        .bind(new.period.as_str())
        .bind(new.status.as_str())
        .bind(&new.action)
        .bind(new.cost)
        .bind(&new.notes)
        .bind(new.pinned)
        .bind(new.linked_reward_id)
        .bind(new.progress)
        .bind(new.due_date)
        .bind(Json(&new.subtasks))
        .bind(new.is_vague)
        .bind(&new.ai_refinement_suggestion)
        .fetch_one(&self.pool)
        .await?;
        to_goal(row)
    }

    async fn update_goal(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &GoalPatch,
    ) -> Result<Goal, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, GoalRow>(
            "SELECT * FROM goals WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Goal {id}")))?;

        let mut goal = to_goal(current)?;
        patch.apply(&mut goal);

        let row = sqlx::query_as::<_, GoalRow>(
            r#"
            UPDATE goals SET
                number = $3, year = $4, goal = $5, category = $6, period = $7, status = $8,
                action = $9, cost = $10, notes = $11, pinned = $12, linked_reward_id = $13,
                progress = $14, due_date = $15, subtasks = $16, is_vague = $17,
                ai_refinement_suggestion = $18, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(goal.number)
        .bind(goal.year)
        .bind(&goal.goal)
        .bind(goal.category.as_str())
        .bind(goal.period.as_str())
        .bind(goal.status.as_str())
        .bind(&goal.action)
        .bind(goal.cost)
        .bind(&goal.notes)
        .bind(goal.pinned)
        .bind(goal.linked_reward_id)
        .bind(goal.progress)
        .bind(goal.due_date)
        .bind(Json(&goal.subtasks))
        .bind(goal.is_vague)
        .bind(&goal.ai_refinement_suggestion)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        to_goal(row)
    }

    async fn delete_goal(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM goals WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        expect_deleted(result.rows_affected(), format!("Goal {id}"))
    }

    async fn list_blessings(&self, user_id: Uuid) -> Result<Vec<Blessing>, StoreError> {
        Ok(sqlx::query_as::<_, Blessing>(
            "SELECT * FROM blessings WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_blessing(
        &self,
        user_id: Uuid,
        new: &NewBlessing,
    ) -> Result<Blessing, StoreError> {
        Ok(sqlx::query_as::<_, Blessing>(
            "INSERT INTO blessings (user_id, text, category) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(user_id)
        .bind(&new.text)
        .bind(&new.category)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_blessing(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM blessings WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        expect_deleted(result.rows_affected(), format!("Blessing {id}"))
    }

    async fn list_rewards(&self, user_id: Uuid) -> Result<Vec<Reward>, StoreError> {
        Ok(sqlx::query_as::<_, Reward>(
            "SELECT * FROM rewards WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_reward(&self, user_id: Uuid, new: &NewReward) -> Result<Reward, StoreError> {
        Ok(sqlx::query_as::<_, Reward>(
            "INSERT INTO rewards (user_id, text, cost, earned) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(user_id)
        .bind(&new.text)
        .bind(new.cost)
        .bind(new.earned)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_reward(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &RewardPatch,
    ) -> Result<Reward, StoreError> {
        sqlx::query_as::<_, Reward>(
            r#"
            UPDATE rewards SET
                text = COALESCE($3, text),
                cost = COALESCE($4, cost),
                earned = COALESCE($5, earned)
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&patch.text)
        .bind(patch.cost)
        .bind(patch.earned)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Reward {id}")))
    }

    async fn delete_reward(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM rewards WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        expect_deleted(result.rows_affected(), format!("Reward {id}"))
    }

    async fn list_habits(&self, user_id: Uuid) -> Result<Vec<Habit>, StoreError> {
        Ok(sqlx::query_as::<_, Habit>(
            "SELECT * FROM habits WHERE user_id = $1 AND active ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_habit(&self, user_id: Uuid, new: &NewHabit) -> Result<Habit, StoreError> {
        Ok(sqlx::query_as::<_, Habit>(
            r#"
            INSERT INTO habits (user_id, title, color, recurrence, target_days_per_week, linked_goal_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&new.title)
        .bind(&new.color)
        .bind(&new.recurrence)
        .bind(new.target_days_per_week)
        .bind(new.linked_goal_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_habit_completions(
        &self,
        user_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<HabitCompletion>, StoreError> {
        Ok(sqlx::query_as::<_, HabitCompletion>(
            r#"
            SELECT * FROM habit_completions
            WHERE user_id = $1 AND completed_date >= $2
            ORDER BY completed_date DESC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn set_habit_completion(
        &self,
        user_id: Uuid,
        habit_id: Uuid,
        date: NaiveDate,
        completed: bool,
    ) -> Result<(), StoreError> {
        let owned: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM habits WHERE id = $1 AND user_id = $2")
                .bind(habit_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        if owned.is_none() {
            return Err(StoreError::NotFound(format!("Habit {habit_id}")));
        }

        if completed {
            sqlx::query(
                r#"
                INSERT INTO habit_completions (user_id, habit_id, completed_date)
                VALUES ($1, $2, $3)
                ON CONFLICT (habit_id, completed_date) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(habit_id)
            .bind(date)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                "DELETE FROM habit_completions WHERE habit_id = $1 AND user_id = $2 AND completed_date = $3",
            )
            .bind(habit_id)
            .bind(user_id)
            .bind(date)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn list_milestones(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
    ) -> Result<Vec<GoalMilestone>, StoreError> {
        Ok(sqlx::query_as::<_, GoalMilestone>(
            r#"
            SELECT * FROM goal_milestones
            WHERE user_id = $1 AND goal_id = $2
            ORDER BY sort_order ASC, created_at ASC
            "#,
        )
        .bind(user_id)
        .bind(goal_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_milestone(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        new: &NewMilestone,
    ) -> Result<GoalMilestone, StoreError> {
        Ok(sqlx::query_as::<_, GoalMilestone>(
            r#"
            INSERT INTO goal_milestones (user_id, goal_id, title, sort_order)
            VALUES (
                $1, $2, $3,
                COALESCE($4, (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM goal_milestones WHERE goal_id = $2))
            )
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(goal_id)
        .bind(&new.title)
        .bind(new.sort_order)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn set_milestone_completed(
        &self,
        user_id: Uuid,
        id: Uuid,
        completed: bool,
    ) -> Result<GoalMilestone, StoreError> {
        sqlx::query_as::<_, GoalMilestone>(
            r#"
            UPDATE goal_milestones
            SET completed = $3, completed_at = CASE WHEN $3 THEN now() ELSE NULL END
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(completed)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Milestone {id}")))
    }

    async fn delete_milestone(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM goal_milestones WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        expect_deleted(result.rows_affected(), format!("Milestone {id}"))
    }

    async fn list_progress_notes(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
    ) -> Result<Vec<GoalProgressNote>, StoreError> {
        Ok(sqlx::query_as::<_, GoalProgressNote>(
            r#"
            SELECT * FROM goal_progress_notes
            WHERE user_id = $1 AND goal_id = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(goal_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_progress_note(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        new: &NewProgressNote,
    ) -> Result<GoalProgressNote, StoreError> {
        Ok(sqlx::query_as::<_, GoalProgressNote>(
            r#"
            INSERT INTO goal_progress_notes (user_id, goal_id, content, progress_percent)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(goal_id)
        .bind(&new.content)
        .bind(new.progress_percent)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_vision_items(&self, user_id: Uuid) -> Result<Vec<VisionBoardItem>, StoreError> {
        Ok(sqlx::query_as::<_, VisionBoardItem>(
            "SELECT * FROM vision_board_items WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_vision_item(
        &self,
        user_id: Uuid,
        new: &NewVisionBoardItem,
    ) -> Result<VisionBoardItem, StoreError> {
        Ok(sqlx::query_as::<_, VisionBoardItem>(
            r#"
            INSERT INTO vision_board_items
                (user_id, image_url, title, description, category, linked_goal_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&new.image_url)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.category)
        .bind(new.linked_goal_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_vision_item(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let result =
            sqlx::query("DELETE FROM vision_board_items WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        expect_deleted(result.rows_affected(), format!("Vision board item {id}"))
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        Ok(
            sqlx::query_as::<_, UserProfile>("SELECT * FROM profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn upsert_profile(
        &self,
        user_id: Uuid,
        patch: &ProfilePatch,
    ) -> Result<UserProfile, StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, UserProfile>(
            "SELECT * FROM profiles WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut profile = existing.unwrap_or_else(|| UserProfile::default_for(user_id));
        patch.apply(&mut profile);

        let saved = sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO profiles
                (user_id, display_name, is_blue_theme, is_dark_mode, column_split,
                 onboarding_completed, notifications_enabled, reminder_time, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            ON CONFLICT (user_id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                is_blue_theme = EXCLUDED.is_blue_theme,
                is_dark_mode = EXCLUDED.is_dark_mode,
                column_split = EXCLUDED.column_split,
                onboarding_completed = EXCLUDED.onboarding_completed,
                notifications_enabled = EXCLUDED.notifications_enabled,
                reminder_time = EXCLUDED.reminder_time,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&profile.display_name)
        .bind(profile.is_blue_theme)
        .bind(profile.is_dark_mode)
        .bind(profile.column_split)
        .bind(profile.onboarding_completed)
        .bind(profile.notifications_enabled)
        .bind(&profile.reminder_time)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn list_chat_history(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ChatHistoryRow>, StoreError> {
        Ok(sqlx::query_as::<_, ChatHistoryRow>(
            r#"
            SELECT * FROM (
                SELECT * FROM ai_chat_history
                WHERE user_id = $1
                ORDER BY created_at DESC
                LIMIT $2
            ) recent
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn append_chat_message(
        &self,
        user_id: Uuid,
        role: &str,
        content: &str,
    ) -> Result<ChatHistoryRow, StoreError> {
        Ok(sqlx::query_as::<_, ChatHistoryRow>(
            "INSERT INTO ai_chat_history (user_id, role, content) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(user_id)
        .bind(role)
        .bind(content)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn clear_chat_history(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM ai_chat_history WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_quotes(&self) -> Result<Vec<Quote>, StoreError> {
        Ok(
            sqlx::query_as::<_, Quote>("SELECT id, text, author FROM quotes ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }
}
