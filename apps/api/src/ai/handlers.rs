//! Axum route handlers for the AI features.
//!
//! Every handler checks for a configured completion client before doing any
//! work, so a missing key answers 503 without touching the store.

use std::convert::Infallible;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::coach::{self, HISTORY_LIMIT};
use crate::ai::decompose::decompose_goal;
use crate::ai::onboarding::{generate_onboarding_goals, OnboardingFailure, OnboardingRequest};
use crate::ai::refine::{refine_goals, select_batch};
use crate::auth::AuthUser;
use crate::errors::{AppError, AppJson};
use crate::models::chat::ChatHistoryRow;
use crate::models::goal::Goal;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GoalRequest {
    #[serde(alias = "goalId")]
    pub goal_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BatchRefineRequest {
    #[serde(default, alias = "goalIds")]
    pub goal_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct OnboardingBody {
    #[serde(alias = "lifeStage")]
    pub life_stage: String,
    pub priorities: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct GoalResponse {
    pub goal: Goal,
}

#[derive(Debug, Serialize)]
pub struct GoalsResponse {
    pub goals: Vec<Goal>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct ChatHistoryResponse {
    pub messages: Vec<ChatHistoryRow>,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn require_message(request: &ChatRequest) -> Result<(), AppError> {
    if request.message.trim().is_empty() {
        return Err(AppError::Validation("message cannot be empty".to_string()));
    }
    Ok(())
}

/// Keeps an open dashboard in step with rows the AI endpoints wrote directly.
async fn absorb(state: &AppState, user: AuthUser, goals: &[Goal]) {
    if let Some(dashboard) = state.dashboards.loaded(user.0) {
        dashboard.absorb_goals(goals.to_vec()).await;
    }
}

async fn current_goals(state: &AppState, user: AuthUser) -> Result<Vec<Goal>, AppError> {
    Ok(state.dashboards.session(user.0).await?.goals().await)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/ai/goals/decompose
///
/// Replaces the goal's subtasks with a generated plan.
pub async fn handle_decompose(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<GoalRequest>,
) -> Result<Json<GoalResponse>, AppError> {
    let llm = state.llm()?;
    let goal = decompose_goal(state.store.as_ref(), llm, user.0, request.goal_id).await?;
    absorb(&state, user, std::slice::from_ref(&goal)).await;
    Ok(Json(GoalResponse { goal }))
}

/// POST /api/v1/ai/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let llm = state.llm()?;
    require_message(&request)?;
    let goals = current_goals(&state, user).await?;
    let reply = coach::chat(state.store.as_ref(), llm, user.0, &goals, &request.message).await?;
    Ok(Json(ChatResponse { reply }))
}

/// POST /api/v1/ai/chat/stream
///
/// Server-sent events: JSON `{"delta"}` messages, then `done` or `error`.
pub async fn handle_chat_stream(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<ChatRequest>,
) -> Result<Sse<BoxStream<'static, Result<Event, Infallible>>>, AppError> {
    let llm = state.llm()?;
    require_message(&request)?;
    let goals = current_goals(&state, user).await?;
    let events =
        coach::chat_stream(state.store.clone(), llm, user.0, &goals, request.message).await?;
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// GET /api/v1/ai/chat/history
pub async fn handle_chat_history(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ChatHistoryResponse>, AppError> {
    state.llm()?;
    let messages = state.store.list_chat_history(user.0, HISTORY_LIMIT).await?;
    Ok(Json(ChatHistoryResponse { messages }))
}

/// DELETE /api/v1/ai/chat/history
pub async fn handle_clear_chat_history(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<StatusCode, AppError> {
    state.llm()?;
    state.store.clear_chat_history(user.0).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/ai/onboarding/goals
pub async fn handle_onboarding_goals(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(body): AppJson<OnboardingBody>,
) -> Result<Json<GoalsResponse>, AppError> {
    let llm = state.llm()?;
    let request = OnboardingRequest {
        life_stage: body.life_stage,
        priorities: body.priorities,
        year: body.year,
    };
    request.validate().map_err(AppError::Validation)?;

    match generate_onboarding_goals(state.store.as_ref(), llm, user.0, &request).await {
        Ok(goals) => {
            absorb(&state, user, &goals).await;
            Ok(Json(GoalsResponse { goals }))
        }
        Err(OnboardingFailure { created, error }) => {
            absorb(&state, user, &created).await;
            Err(error)
        }
    }
}

/// POST /api/v1/ai/goals/refine
pub async fn handle_refine(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<GoalRequest>,
) -> Result<Json<GoalResponse>, AppError> {
    let llm = state.llm()?;
    let goal = state
        .store
        .get_goal(user.0, request.goal_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Goal {}", request.goal_id)))?;

    let goal = refine_goals(state.store.as_ref(), llm, user.0, &[goal])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::AiParse("no verdict returned".to_string()))?;
    absorb(&state, user, std::slice::from_ref(&goal)).await;
    Ok(Json(GoalResponse { goal }))
}

/// POST /api/v1/ai/goals/refine/batch
///
/// An empty `goalIds` list reviews every open goal.
pub async fn handle_refine_batch(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<BatchRefineRequest>,
) -> Result<Json<GoalsResponse>, AppError> {
    let llm = state.llm()?;
    let all = state.store.list_goals(user.0).await?;
    let selected = select_batch(&all, &request.goal_ids)?;

    let goals = refine_goals(state.store.as_ref(), llm, user.0, &selected).await?;
    absorb(&state, user, &goals).await;
    Ok(Json(GoalsResponse { goals }))
}
