//! Axum route handlers for the dashboard session.
//!
//! Mutations answer with the optimistic entity and whatever notifications are
//! queued. A persistence failure is never an HTTP error here: the entity is
//! omitted and the failure toast rides along in `notifications`.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::dashboard::notify::Notification;
use crate::dashboard::view::{FocusMode, GoalFilter, SortMode};
use crate::dashboard::{Dashboard, DashboardView, PendingWrite, Record, SyncError, SyncOutcome};
use crate::errors::{AppError, AppJson};
use crate::models::blessing::{Blessing, NewBlessing};
use crate::models::goal::{Goal, GoalCategory, GoalPatch, GoalPeriod, GoalStatus, NewGoal};
use crate::models::reward::{NewReward, Reward, RewardPatch};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub search: Option<String>,
    pub status: Option<GoalStatus>,
    pub period: Option<GoalPeriod>,
    pub category: Option<GoalCategory>,
    pub year: Option<i32>,
    #[serde(default)]
    pub focus: FocusMode,
    #[serde(default)]
    pub sort: SortMode,
}

impl DashboardQuery {
    fn filter(&self) -> GoalFilter {
        GoalFilter {
            search: self.search.clone(),
            status: self.status,
            period: self.period,
            category: self.category,
            year: self.year,
            focus: self.focus,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteBlessingQuery {
    #[serde(default = "default_true")]
    pub undo: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct MutationResponse<T> {
    /// `None` when the store rejected the write.
    pub entity: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undo_token: Option<Uuid>,
    pub notifications: Vec<Notification>,
}

type Mutation<T> = Result<Json<MutationResponse<T>>, AppError>;

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn session(state: &AppState, user: AuthUser) -> Result<Dashboard, AppError> {
    Ok(state.dashboards.session(user.0).await?)
}

/// Turns a sync result into a response. Store failures become an empty entity.
async fn respond<T>(dashboard: &Dashboard, result: Result<T, SyncError>) -> Mutation<T> {
    let entity = match result {
        Ok(entity) => Some(entity),
        Err(SyncError::Persist(_)) => None,
        Err(other) => return Err(other.into()),
    };
    Ok(Json(MutationResponse {
        entity,
        undo_token: None,
        notifications: dashboard.take_notifications().await,
    }))
}

async fn respond_pending<T>(
    dashboard: &Dashboard,
    result: Result<PendingWrite<T>, SyncError>,
) -> Mutation<T> {
    respond(dashboard, result.map(PendingWrite::detach)).await
}

/// Deletes wait for the store so the undo token can be returned directly.
async fn respond_deleted<T: Clone>(
    dashboard: &Dashboard,
    result: Result<PendingWrite<T>, SyncError>,
) -> Mutation<T> {
    let pending = result?;
    let removed = pending.entity.clone();
    let outcome = pending.settled().await;
    let (entity, undo_token) = match outcome {
        SyncOutcome::Deleted { undo_token } => (Some(removed), undo_token),
        _ => (None, None),
    };
    Ok(Json(MutationResponse {
        entity,
        undo_token,
        notifications: dashboard.take_notifications().await,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/dashboard
///
/// Filtered, sorted goals with header stats. Drains queued notifications.
pub async fn handle_get_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardView>, AppError> {
    let dashboard = session(&state, user).await?;
    Ok(Json(dashboard.view(&query.filter(), query.sort).await))
}

/// POST /api/v1/dashboard/reload
pub async fn handle_reload(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<DashboardView>, AppError> {
    let dashboard = session(&state, user).await?;
    dashboard.reload().await?;
    Ok(Json(
        dashboard
            .view(&GoalFilter::default(), SortMode::default())
            .await,
    ))
}

/// POST /api/v1/goals
pub async fn handle_add_goal(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(new): AppJson<NewGoal>,
) -> Mutation<Goal> {
    let dashboard = session(&state, user).await?;
    let result = dashboard.add_goal(new).await;
    respond(&dashboard, result).await
}

/// PATCH /api/v1/goals/:id
pub async fn handle_update_goal(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(patch): AppJson<GoalPatch>,
) -> Mutation<Goal> {
    let dashboard = session(&state, user).await?;
    let result = dashboard.update_goal(id, patch).await;
    respond_pending(&dashboard, result).await
}

/// POST /api/v1/goals/:id/cycle-status
pub async fn handle_cycle_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Mutation<Goal> {
    let dashboard = session(&state, user).await?;
    let result = dashboard.cycle_goal_status(id).await;
    respond_pending(&dashboard, result).await
}

/// POST /api/v1/goals/:id/pin
pub async fn handle_toggle_pin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Mutation<Goal> {
    let dashboard = session(&state, user).await?;
    let result = dashboard.toggle_goal_pin(id).await;
    respond_pending(&dashboard, result).await
}

/// DELETE /api/v1/goals/:id
pub async fn handle_delete_goal(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Mutation<Goal> {
    let dashboard = session(&state, user).await?;
    let result = dashboard.delete_goal(id).await;
    respond_deleted(&dashboard, result).await
}

/// POST /api/v1/blessings
pub async fn handle_add_blessing(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(new): AppJson<NewBlessing>,
) -> Mutation<Blessing> {
    let dashboard = session(&state, user).await?;
    let result = dashboard.add_blessing(new).await;
    respond(&dashboard, result).await
}

/// DELETE /api/v1/blessings/:id?undo=bool
pub async fn handle_delete_blessing(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteBlessingQuery>,
) -> Mutation<Blessing> {
    let dashboard = session(&state, user).await?;
    let result = dashboard.delete_blessing(id, query.undo).await;
    respond_deleted(&dashboard, result).await
}

/// POST /api/v1/rewards
pub async fn handle_add_reward(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(new): AppJson<NewReward>,
) -> Mutation<Reward> {
    let dashboard = session(&state, user).await?;
    let result = dashboard.add_reward(new).await;
    respond(&dashboard, result).await
}

/// PATCH /api/v1/rewards/:id
pub async fn handle_update_reward(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(patch): AppJson<RewardPatch>,
) -> Mutation<Reward> {
    let dashboard = session(&state, user).await?;
    let result = dashboard.update_reward(id, patch).await;
    respond_pending(&dashboard, result).await
}

/// DELETE /api/v1/rewards/:id
pub async fn handle_delete_reward(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Mutation<Reward> {
    let dashboard = session(&state, user).await?;
    let result = dashboard.delete_reward(id).await;
    respond_deleted(&dashboard, result).await
}

/// POST /api/v1/undo/:token
pub async fn handle_undo(
    State(state): State<AppState>,
    user: AuthUser,
    Path(token): Path<Uuid>,
) -> Mutation<Record> {
    let dashboard = session(&state, user).await?;
    let result = dashboard.undo(token).await;
    respond(&dashboard, result).await
}
