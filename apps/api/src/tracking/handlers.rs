//! Axum route handlers for milestones, progress notes and the vision board.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::{AppError, AppJson};
use crate::models::milestone::{GoalMilestone, GoalProgressNote, NewMilestone, NewProgressNote};
use crate::models::vision::{NewVisionBoardItem, VisionBoardItem};
use crate::state::AppState;
use crate::tracking::{milestone_progress, resolve_vision_item, VisionItemView};

#[derive(Debug, Serialize)]
pub struct MilestonesResponse {
    pub milestones: Vec<GoalMilestone>,
    pub progress: u32,
}

#[derive(Debug, Deserialize)]
pub struct MilestoneUpdate {
    pub completed: bool,
}

async fn require_goal(state: &AppState, user: AuthUser, goal_id: Uuid) -> Result<(), AppError> {
    state
        .store
        .get_goal(user.0, goal_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Goal {goal_id}")))
}

/// GET /api/v1/goals/:id/milestones
pub async fn handle_list_milestones(
    State(state): State<AppState>,
    user: AuthUser,
    Path(goal_id): Path<Uuid>,
) -> Result<Json<MilestonesResponse>, AppError> {
    require_goal(&state, user, goal_id).await?;
    let milestones = state.store.list_milestones(user.0, goal_id).await?;
    let progress = milestone_progress(&milestones);
    Ok(Json(MilestonesResponse {
        milestones,
        progress,
    }))
}

/// POST /api/v1/goals/:id/milestones
pub async fn handle_create_milestone(
    State(state): State<AppState>,
    user: AuthUser,
    Path(goal_id): Path<Uuid>,
    AppJson(new): AppJson<NewMilestone>,
) -> Result<Json<GoalMilestone>, AppError> {
    new.validate().map_err(AppError::Validation)?;
    require_goal(&state, user, goal_id).await?;
    Ok(Json(state.store.insert_milestone(user.0, goal_id, &new).await?))
}

/// PATCH /api/v1/milestones/:id
pub async fn handle_update_milestone(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(update): AppJson<MilestoneUpdate>,
) -> Result<Json<GoalMilestone>, AppError> {
    let milestone = state
        .store
        .set_milestone_completed(user.0, id, update.completed)
        .await?;
    Ok(Json(milestone))
}

/// DELETE /api/v1/milestones/:id
pub async fn handle_delete_milestone(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.delete_milestone(user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/goals/:id/notes
pub async fn handle_list_notes(
    State(state): State<AppState>,
    user: AuthUser,
    Path(goal_id): Path<Uuid>,
) -> Result<Json<Vec<GoalProgressNote>>, AppError> {
    require_goal(&state, user, goal_id).await?;
    Ok(Json(state.store.list_progress_notes(user.0, goal_id).await?))
}

/// POST /api/v1/goals/:id/notes
///
/// Notes are append-only.
pub async fn handle_create_note(
    State(state): State<AppState>,
    user: AuthUser,
    Path(goal_id): Path<Uuid>,
    AppJson(new): AppJson<NewProgressNote>,
) -> Result<Json<GoalProgressNote>, AppError> {
    new.validate().map_err(AppError::Validation)?;
    require_goal(&state, user, goal_id).await?;
    Ok(Json(
        state
            .store
            .insert_progress_note(user.0, goal_id, &new)
            .await?,
    ))
}

/// GET /api/v1/vision-board
pub async fn handle_list_vision_items(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<VisionItemView>>, AppError> {
    let (items, goals) = tokio::try_join!(
        state.store.list_vision_items(user.0),
        state.store.list_goals(user.0),
    )?;
    Ok(Json(
        items
            .into_iter()
            .map(|item| resolve_vision_item(item, &goals))
            .collect(),
    ))
}

/// POST /api/v1/vision-board
pub async fn handle_create_vision_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(new): AppJson<NewVisionBoardItem>,
) -> Result<Json<VisionBoardItem>, AppError> {
    new.validate().map_err(AppError::Validation)?;
    Ok(Json(state.store.insert_vision_item(user.0, &new).await?))
}

/// DELETE /api/v1/vision-board/:id
pub async fn handle_delete_vision_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.delete_vision_item(user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
