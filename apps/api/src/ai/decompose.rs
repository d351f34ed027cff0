//! Goal decomposition: asks the model for an ordered subtask list and stores it on the goal.

use serde::Deserialize;
use uuid::Uuid;

use crate::ai::prompts::{DECOMPOSE_PROMPT_TEMPLATE, DECOMPOSE_SYSTEM};
use crate::errors::AppError;
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{CompletionOptions, LlmClient, PromptMessage};
use crate::models::goal::{Goal, GoalPatch, Subtask};
use crate::store::RemoteStore;

const MAX_SUBTASKS: usize = 10;

#[derive(Debug, Deserialize)]
struct DecompositionPlan {
    subtasks: Vec<PlannedSubtask>,
}

#[derive(Debug, Deserialize)]
struct PlannedSubtask {
    text: String,
    #[serde(default)]
    estimated_time: Option<String>,
}

pub fn build_messages(goal: &Goal) -> Vec<PromptMessage> {
    let prompt = DECOMPOSE_PROMPT_TEMPLATE
        .replace("{goal}", &goal.goal)
        .replace("{category}", goal.category.as_str())
        .replace("{period}", goal.period.as_str())
        .replace("{action}", goal.action.as_deref().unwrap_or("none"))
        .replace("{notes}", goal.notes.as_deref().unwrap_or("none"));
    vec![
        PromptMessage::system(format!("{DECOMPOSE_SYSTEM} {JSON_ONLY_INSTRUCTION}")),
        PromptMessage::user(prompt),
    ]
}

/// Trims and drops blank entries. An empty result means the plan was unusable.
fn into_subtasks(plan: DecompositionPlan) -> Vec<Subtask> {
    plan.subtasks
        .into_iter()
        .filter_map(|planned| {
            let text = planned.text.trim();
            (!text.is_empty()).then(|| Subtask {
                text: text.to_string(),
                completed: false,
                estimated_time: planned
                    .estimated_time
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty()),
            })
        })
        .take(MAX_SUBTASKS)
        .collect()
}

/// Replaces the goal's subtasks with a generated plan.
/// The goal is left untouched unless the model returns a usable plan.
pub async fn decompose_goal(
    store: &dyn RemoteStore,
    llm: &LlmClient,
    user_id: Uuid,
    goal_id: Uuid,
) -> Result<Goal, AppError> {
    let goal = store
        .get_goal(user_id, goal_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Goal {goal_id}")))?;

    let options = CompletionOptions {
        temperature: 0.5,
        ..Default::default()
    };
    let plan: DecompositionPlan = llm.complete_json(&build_messages(&goal), options).await?;
    let subtasks = into_subtasks(plan);
    if subtasks.is_empty() {
        return Err(AppError::AiParse("plan contained no subtasks".to_string()));
    }

    let patch = GoalPatch {
        subtasks: Some(subtasks),
        ..Default::default()
    };
    Ok(store.update_goal(user_id, goal_id, &patch).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::json_extract::parse_json_as;
    use crate::models::goal::{GoalCategory, GoalPeriod, NewGoal};
    use crate::store::InMemoryStore;

    #[test]
    fn test_prompt_includes_goal_fields() {
        let mut goal = crate::dashboard::view::fixtures::goal(
            4,
            crate::models::goal::GoalStatus::Doing,
            false,
            chrono::Utc::now(),
        );
        goal.goal = "Learn Spanish".into();
        goal.action = Some("Download a flashcard app".into());

        let messages = build_messages(&goal);
        let body = serde_json::to_value(&messages).unwrap();
        let user = body[1]["content"].as_str().unwrap();
        assert!(user.contains("Goal: Learn Spanish"));
        assert!(user.contains("Current next action: Download a flashcard app"));
        assert!(user.contains("Notes: none"));
        assert_eq!(body[0]["role"], "system");
    }

    #[test]
    fn test_plan_is_cleaned() {
        let reply = r#"Here you go:
        {"subtasks": [
            {"text": "  Pick a course  ", "estimated_time": "30 min"},
            {"text": "   "},
            {"text": "Book a tutor", "estimated_time": ""}
        ]}"#;
        let plan: DecompositionPlan = parse_json_as(reply).unwrap();
        let subtasks = into_subtasks(plan);
        assert_eq!(subtasks.len(), 2);
        assert_eq!(subtasks[0].text, "Pick a course");
        assert_eq!(subtasks[0].estimated_time.as_deref(), Some("30 min"));
        assert_eq!(subtasks[1].estimated_time, None);
        assert!(subtasks.iter().all(|s| !s.completed));
    }

    #[tokio::test]
    async fn test_goal_owned_by_someone_else_is_not_found() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let goal = store
            .insert_goal(
                owner,
                &NewGoal::new("Private goal", GoalCategory::Personal, GoalPeriod::OneYear),
            )
            .await
            .unwrap();
        let llm = LlmClient::new("test-key".into(), Some("http://127.0.0.1:9/v1".into())).unwrap();

        let err = decompose_goal(&store, &llm, Uuid::new_v4(), goal.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let untouched = store.get_goal(owner, goal.id).await.unwrap().unwrap();
        assert_eq!(untouched.subtasks, goal.subtasks);
    }
}
