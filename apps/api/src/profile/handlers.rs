//! Axum route handlers for the user profile and the daily quote.

use axum::{extract::State, Json};
use chrono::Utc;

use crate::auth::AuthUser;
use crate::errors::{AppError, AppJson};
use crate::models::profile::{ProfilePatch, UserProfile};
use crate::models::quote::Quote;
use crate::profile::quote_of_the_day;
use crate::state::AppState;

/// GET /api/v1/profile
///
/// Users without a stored row get the defaults.
pub async fn handle_get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserProfile>, AppError> {
    let profile = state
        .store
        .get_profile(user.0)
        .await?
        .unwrap_or_else(|| UserProfile::default_for(user.0));
    Ok(Json(profile))
}

/// PATCH /api/v1/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(patch): AppJson<ProfilePatch>,
) -> Result<Json<UserProfile>, AppError> {
    patch.validate().map_err(AppError::Validation)?;
    Ok(Json(state.store.upsert_profile(user.0, &patch).await?))
}

/// GET /api/v1/quotes/today
pub async fn handle_quote_of_the_day(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Quote>, AppError> {
    let quotes = state.store.list_quotes().await?;
    quote_of_the_day(&quotes, Utc::now().date_naive())
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No quotes available".to_string()))
}
