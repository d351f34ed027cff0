//! Axum route handlers for habits.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::{AppError, AppJson};
use crate::habits::{summarize, HabitSummary, STREAK_LOOKBACK_DAYS};
use crate::models::habit::NewHabit;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    /// Defaults to today (UTC).
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub completed: bool,
}

async fn summaries(
    state: &AppState,
    user_id: Uuid,
    today: NaiveDate,
) -> Result<Vec<HabitSummary>, AppError> {
    let since = today - Duration::days(STREAK_LOOKBACK_DAYS);
    let (habits, completions) = tokio::try_join!(
        state.store.list_habits(user_id),
        state.store.list_habit_completions(user_id, since),
    )?;
    Ok(habits
        .into_iter()
        .map(|habit| summarize(habit, &completions, today))
        .collect())
}

/// GET /api/v1/habits
pub async fn handle_list_habits(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<HabitSummary>>, AppError> {
    let today = Utc::now().date_naive();
    Ok(Json(summaries(&state, user.0, today).await?))
}

/// POST /api/v1/habits
pub async fn handle_create_habit(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(new): AppJson<NewHabit>,
) -> Result<Json<HabitSummary>, AppError> {
    new.validate().map_err(AppError::Validation)?;
    let habit = state.store.insert_habit(user.0, &new).await?;
    Ok(Json(summarize(habit, &[], Utc::now().date_naive())))
}

/// POST /api/v1/habits/:id/completions
///
/// Marks or unmarks one day, then answers with the recomputed summary.
pub async fn handle_set_completion(
    State(state): State<AppState>,
    user: AuthUser,
    Path(habit_id): Path<Uuid>,
    AppJson(request): AppJson<CompletionRequest>,
) -> Result<Json<HabitSummary>, AppError> {
    let today = Utc::now().date_naive();
    let date = request.date.unwrap_or(today);
    if date > today {
        return Err(AppError::Validation(
            "cannot complete a habit in the future".to_string(),
        ));
    }

    state
        .store
        .set_habit_completion(user.0, habit_id, date, request.completed)
        .await?;

    summaries(&state, user.0, today)
        .await?
        .into_iter()
        .find(|s| s.habit.id == habit_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Habit {habit_id}")))
}
