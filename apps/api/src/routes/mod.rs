pub mod health;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::ai::handlers as ai;
use crate::dashboard::handlers as dashboard;
use crate::habits::handlers as habits;
use crate::profile::handlers as profile;
use crate::state::AppState;
use crate::tracking::handlers as tracking;

fn api_routes() -> Router<AppState> {
    Router::new()
        // Dashboard session
        .route("/dashboard", get(dashboard::handle_get_dashboard))
        .route("/dashboard/reload", post(dashboard::handle_reload))
        .route("/goals", post(dashboard::handle_add_goal))
        .route(
            "/goals/:id",
            patch(dashboard::handle_update_goal).delete(dashboard::handle_delete_goal),
        )
        .route(
            "/goals/:id/cycle-status",
            post(dashboard::handle_cycle_status),
        )
        .route("/goals/:id/pin", post(dashboard::handle_toggle_pin))
        .route("/blessings", post(dashboard::handle_add_blessing))
        .route("/blessings/:id", delete(dashboard::handle_delete_blessing))
        .route("/rewards", post(dashboard::handle_add_reward))
        .route(
            "/rewards/:id",
            patch(dashboard::handle_update_reward).delete(dashboard::handle_delete_reward),
        )
        .route("/undo/:token", post(dashboard::handle_undo))
        // AI
        .route("/ai/goals/decompose", post(ai::handle_decompose))
        .route("/ai/chat", post(ai::handle_chat))
        .route("/ai/chat/stream", post(ai::handle_chat_stream))
        .route(
            "/ai/chat/history",
            get(ai::handle_chat_history).delete(ai::handle_clear_chat_history),
        )
        .route("/ai/onboarding/goals", post(ai::handle_onboarding_goals))
        .route("/ai/goals/refine", post(ai::handle_refine))
        .route("/ai/goals/refine/batch", post(ai::handle_refine_batch))
        // Habits
        .route(
            "/habits",
            get(habits::handle_list_habits).post(habits::handle_create_habit),
        )
        .route(
            "/habits/:id/completions",
            post(habits::handle_set_completion),
        )
        // Milestones, notes, vision board
        .route(
            "/goals/:id/milestones",
            get(tracking::handle_list_milestones).post(tracking::handle_create_milestone),
        )
        .route(
            "/milestones/:id",
            patch(tracking::handle_update_milestone).delete(tracking::handle_delete_milestone),
        )
        .route(
            "/goals/:id/notes",
            get(tracking::handle_list_notes).post(tracking::handle_create_note),
        )
        .route(
            "/vision-board",
            get(tracking::handle_list_vision_items).post(tracking::handle_create_vision_item),
        )
        .route(
            "/vision-board/:id",
            delete(tracking::handle_delete_vision_item),
        )
        // Profile
        .route(
            "/profile",
            get(profile::handle_get_profile).patch(profile::handle_update_profile),
        )
        .route("/quotes/today", get(profile::handle_quote_of_the_day))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api/v1", api_routes())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::auth::USER_ID_HEADER;
    use crate::config::Config;
    use crate::dashboard::grace::DEFAULT_GRACE_WINDOW;
    use crate::dashboard::registry::{DashboardRegistry, DEFAULT_SESSION_IDLE};
    use crate::llm_client::LlmClient;
    use crate::models::goal::{GoalCategory, GoalPeriod, NewGoal};
    use crate::store::{InMemoryStore, RemoteStore};

    fn config() -> Config {
        Config {
            database_url: None,
            openai_api_key: None,
            openai_api_url: None,
            port: 0,
            rust_log: "info".into(),
            grace_window_ms: 5000,
            session_idle_secs: 1800,
        }
    }

    fn app(store: Arc<InMemoryStore>, with_ai: bool) -> Router {
        let store: Arc<dyn RemoteStore> = store;
        // Points at a closed port; tests never reach the completion API.
        let llm = with_ai.then(|| {
            LlmClient::new("test-key".into(), Some("http://127.0.0.1:9/v1".into())).unwrap()
        });
        build_router(AppState {
            dashboards: Arc::new(DashboardRegistry::new(
                store.clone(),
                DEFAULT_GRACE_WINDOW,
                DEFAULT_SESSION_IDLE,
            )),
            store,
            llm,
            config: config(),
        })
    }

    fn request(method: Method, uri: &str, user: Option<Uuid>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user.to_string());
        }
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_identity() {
        let response = app(Arc::new(InMemoryStore::new()), false)
            .oneshot(request(Method::GET, "/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["ai_enabled"], false);
    }

    #[tokio::test]
    async fn test_missing_identity_is_401() {
        let response = app(Arc::new(InMemoryStore::new()), true)
            .oneshot(request(
                Method::POST,
                "/api/v1/ai/goals/decompose",
                None,
                Some(json!({})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_missing_field_is_400() {
        let response = app(Arc::new(InMemoryStore::new()), true)
            .oneshot(request(
                Method::POST,
                "/api/v1/ai/goals/decompose",
                Some(Uuid::new_v4()),
                Some(json!({})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ai_without_key_is_503() {
        let response = app(Arc::new(InMemoryStore::new()), false)
            .oneshot(request(
                Method::POST,
                "/api/v1/ai/goals/decompose",
                Some(Uuid::new_v4()),
                Some(json!({ "goalId": Uuid::new_v4() })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            json_body(response).await["error"]["message"],
            "AI service not configured"
        );
    }

    #[tokio::test]
    async fn test_decompose_of_foreign_goal_is_404_and_leaves_subtasks() {
        let store = Arc::new(InMemoryStore::new());
        let owner = Uuid::new_v4();
        let goal = store
            .insert_goal(
                owner,
                &NewGoal::new("Owner's goal", GoalCategory::Personal, GoalPeriod::OneYear),
            )
            .await
            .unwrap();

        let response = app(store.clone(), true)
            .oneshot(request(
                Method::POST,
                "/api/v1/ai/goals/decompose",
                Some(Uuid::new_v4()),
                Some(json!({ "goalId": goal.id })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let stored = store.get_goal(owner, goal.id).await.unwrap().unwrap();
        assert_eq!(stored.subtasks, goal.subtasks);
    }

    #[tokio::test]
    async fn test_goal_mutation_round_trip() {
        let store = Arc::new(InMemoryStore::new());
        let router = app(store, false);
        let user = Some(Uuid::new_v4());

        let created = router
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/v1/goals",
                user,
                Some(json!({ "goal": "Learn the cello" })),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::OK);
        let body = json_body(created).await;
        assert_eq!(body["entity"]["number"], 1);
        assert_eq!(body["entity"]["status"], "Doing");
        let id = body["entity"]["id"].as_str().unwrap().to_string();

        let cycled = router
            .clone()
            .oneshot(request(
                Method::POST,
                &format!("/api/v1/goals/{id}/cycle-status"),
                user,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(json_body(cycled).await["entity"]["status"], "On Track");

        let view = router
            .clone()
            .oneshot(request(Method::GET, "/api/v1/dashboard?focus=active", user, None))
            .await
            .unwrap();
        let view = json_body(view).await;
        assert_eq!(view["goals"].as_array().unwrap().len(), 1);
        assert_eq!(view["stats"]["total"], 1);

        let deleted = router
            .clone()
            .oneshot(request(
                Method::DELETE,
                &format!("/api/v1/goals/{id}"),
                user,
                None,
            ))
            .await
            .unwrap();
        let deleted = json_body(deleted).await;
        let token = deleted["undo_token"].as_str().unwrap().to_string();

        let restored = router
            .oneshot(request(
                Method::POST,
                &format!("/api/v1/undo/{token}"),
                user,
                None,
            ))
            .await
            .unwrap();
        let restored = json_body(restored).await;
        assert_eq!(restored["entity"]["type"], "goal");
        assert_eq!(restored["entity"]["item"]["goal"], "Learn the cello");
    }

    #[tokio::test]
    async fn test_update_of_unknown_goal_is_404() {
        let response = app(Arc::new(InMemoryStore::new()), false)
            .oneshot(request(
                Method::PATCH,
                &format!("/api/v1/goals/{}", Uuid::new_v4()),
                Some(Uuid::new_v4()),
                Some(json!({ "pinned": true })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_add_reports_toast_not_error() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_writes(true);
        let response = app(store, false)
            .oneshot(request(
                Method::POST,
                "/api/v1/blessings",
                Some(Uuid::new_v4()),
                Some(json!({ "text": "Sunny morning" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["entity"].is_null());
        assert_eq!(body["notifications"][0]["level"], "error");
    }

    #[tokio::test]
    async fn test_profile_defaults() {
        let response = app(Arc::new(InMemoryStore::new()), false)
            .oneshot(request(Method::GET, "/api/v1/profile", Some(Uuid::new_v4()), None))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["column_split"], 50);
        assert_eq!(body["onboarding_completed"], false);
    }
}
