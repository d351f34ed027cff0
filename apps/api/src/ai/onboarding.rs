//! First-run goal generation from a life stage and a set of priorities.

use chrono::{Datelike, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ai::context::format_goals_compact;
use crate::ai::prompts::{ONBOARDING_PROMPT_TEMPLATE, ONBOARDING_SYSTEM};
use crate::errors::AppError;
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{CompletionOptions, LlmClient, PromptMessage};
use crate::models::goal::{Goal, GoalCategory, GoalPeriod, NewGoal};
use crate::models::profile::ProfilePatch;
use crate::store::RemoteStore;

const MAX_ONBOARDING_GOALS: usize = 10;

#[derive(Debug, Clone)]
pub struct OnboardingRequest {
    pub life_stage: String,
    pub priorities: Vec<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct SuggestedGoals {
    goals: Vec<SuggestedGoal>,
}

#[derive(Debug, Deserialize)]
struct SuggestedGoal {
    goal: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    period: Option<String>,
    #[serde(default)]
    action: Option<String>,
}

impl OnboardingRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.life_stage.trim().is_empty() {
            return Err("lifeStage cannot be empty".to_string());
        }
        if self.priorities.iter().all(|p| p.trim().is_empty()) {
            return Err("priorities must contain at least one entry".to_string());
        }
        Ok(())
    }

    fn year(&self) -> i32 {
        self.year.unwrap_or_else(|| Utc::now().year())
    }
}

/// Onboarding that failed after some goals were already stored.
/// `created` is empty when nothing was written.
#[derive(Debug)]
pub struct OnboardingFailure {
    pub created: Vec<Goal>,
    pub error: AppError,
}

impl From<AppError> for OnboardingFailure {
    fn from(error: AppError) -> Self {
        Self {
            created: Vec::new(),
            error,
        }
    }
}

pub fn build_messages(request: &OnboardingRequest, existing: &[Goal]) -> Vec<PromptMessage> {
    let priorities: Vec<&str> = request
        .priorities
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    let prompt = ONBOARDING_PROMPT_TEMPLATE
        .replace("{year}", &request.year().to_string())
        .replace("{life_stage}", request.life_stage.trim())
        .replace("{priorities}", &priorities.join(", "))
        .replace("{existing_goals}", &format_goals_compact(existing));
    vec![
        PromptMessage::system(format!("{ONBOARDING_SYSTEM} {JSON_ONLY_INSTRUCTION}")),
        PromptMessage::user(prompt),
    ]
}

/// Unknown categories and periods fall back to Personal and One-year.
fn into_new_goals(suggested: SuggestedGoals, year: i32) -> Vec<NewGoal> {
    suggested
        .goals
        .into_iter()
        .filter(|s| !s.goal.trim().is_empty())
        .take(MAX_ONBOARDING_GOALS)
        .map(|s| {
            let category = s
                .category
                .and_then(|c| c.parse().ok())
                .unwrap_or(GoalCategory::Personal);
            let period = s
                .period
                .and_then(|p| p.parse().ok())
                .unwrap_or(GoalPeriod::OneYear);
            let mut new = NewGoal::new(s.goal.trim(), category, period);
            new.year = Some(year);
            new.action = s.action.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
            new
        })
        .collect()
}

/// Generates starter goals, stores them, and marks onboarding complete.
/// Nothing is written unless the model's answer parses into at least one goal.
pub async fn generate_onboarding_goals(
    store: &dyn RemoteStore,
    llm: &LlmClient,
    user_id: Uuid,
    request: &OnboardingRequest,
) -> Result<Vec<Goal>, OnboardingFailure> {
    let existing = store.list_goals(user_id).await.map_err(AppError::from)?;
    let options = CompletionOptions {
        temperature: 0.8,
        max_tokens: 1500,
    };
    let suggested: SuggestedGoals = llm
        .complete_json(&build_messages(request, &existing), options)
        .await
        .map_err(AppError::from)?;
    let new_goals = into_new_goals(suggested, request.year());
    if new_goals.is_empty() {
        return Err(AppError::AiParse("no goals suggested".to_string()).into());
    }
    store_onboarding_goals(store, user_id, &new_goals).await
}

/// Inserts the goals in order, then flags the profile as onboarded.
/// On a failed write the goals inserted so far travel with the error.
pub async fn store_onboarding_goals(
    store: &dyn RemoteStore,
    user_id: Uuid,
    new_goals: &[NewGoal],
) -> Result<Vec<Goal>, OnboardingFailure> {
    let mut created = Vec::with_capacity(new_goals.len());
    for new in new_goals {
        match store.insert_goal(user_id, new).await {
            Ok(goal) => created.push(goal),
            Err(err) => {
                warn!(%user_id, stored = created.len(), "Onboarding stopped on a failed insert: {err}");
                return Err(OnboardingFailure {
                    created,
                    error: err.into(),
                });
            }
        }
    }

    let patch = ProfilePatch {
        onboarding_completed: Some(true),
        ..Default::default()
    };
    if let Err(err) = store.upsert_profile(user_id, &patch).await {
        return Err(OnboardingFailure {
            created,
            error: err.into(),
        });
    }

    info!(%user_id, count = created.len(), "Onboarding goals created");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::view::fixtures::goal;
    use crate::llm_client::json_extract::parse_json_as;
    use crate::models::goal::GoalStatus;
    use crate::store::InMemoryStore;

    fn request() -> OnboardingRequest {
        OnboardingRequest {
            life_stage: "New parent".into(),
            priorities: vec!["Health".into(), " ".into(), "Career".into()],
            year: Some(2027),
        }
    }

    #[test]
    fn test_validation() {
        assert!(request().validate().is_ok());
        let mut empty = request();
        empty.priorities = vec!["".into()];
        assert!(empty.validate().is_err());
        let mut no_stage = request();
        no_stage.life_stage = "  ".into();
        assert!(no_stage.validate().is_err());
    }

    #[test]
    fn test_prompt_lists_priorities_and_year() {
        let messages = build_messages(&request(), &[]);
        let body = serde_json::to_value(&messages).unwrap();
        let prompt = body[1]["content"].as_str().unwrap();
        assert!(prompt.contains("starter goals for 2027"));
        assert!(prompt.contains("Priorities: Health, Career"));
        assert!(prompt.contains("Life stage: New parent"));
        assert!(prompt.contains("Goals the user already has:\nNo goals yet."));
    }

    #[test]
    fn test_prompt_includes_existing_goals() {
        let mut existing = goal(4, GoalStatus::Doing, true, Utc::now());
        existing.goal = "Sleep eight hours".into();
        let messages = build_messages(&request(), &[existing]);
        let body = serde_json::to_value(&messages).unwrap();
        let prompt = body[1]["content"].as_str().unwrap();
        assert!(prompt.contains("Personal goals:\n- 📌 #4 Sleep eight hours [Doing] (One-year)"));
    }

    #[tokio::test]
    async fn test_failed_insert_returns_goals_already_stored() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let new_goals = vec![
            NewGoal::new("Walk daily", GoalCategory::Personal, GoalPeriod::OneYear),
            NewGoal::new("Get promoted", GoalCategory::Professional, GoalPeriod::ThreeYears),
            NewGoal::new("Learn piano", GoalCategory::Personal, GoalPeriod::FiveYears),
        ];
        store.fail_writes_after(1);

        let failure = store_onboarding_goals(&store, user, &new_goals)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, AppError::Store(_)));
        assert_eq!(failure.created.len(), 1);
        assert_eq!(failure.created[0].goal, "Walk daily");
        let stored = store.list_goals(user).await.unwrap();
        assert_eq!(stored, failure.created);
        assert!(store.get_profile(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stored_goals_mark_profile_onboarded() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let new_goals = vec![NewGoal::new(
            "Walk daily",
            GoalCategory::Personal,
            GoalPeriod::OneYear,
        )];

        let created = store_onboarding_goals(&store, user, &new_goals).await.unwrap();
        assert_eq!(created.len(), 1);
        let profile = store.get_profile(user).await.unwrap().unwrap();
        assert!(profile.onboarding_completed);
    }

    #[test]
    fn test_suggestions_map_to_new_goals() {
        let reply = r#"```json
        {"goals": [
            {"goal": "Walk 8k steps daily", "category": "Personal", "period": "One-year", "action": "Buy a step counter"},
            {"goal": "Get promoted", "category": "Professional", "period": "Three-years"},
            {"goal": "Mystery", "category": "Spiritual", "period": "Ten-years"},
            {"goal": "  "}
        ]}
        ```"#;
        let suggested: SuggestedGoals = parse_json_as(reply).unwrap();
        let goals = into_new_goals(suggested, 2027);

        assert_eq!(goals.len(), 3);
        assert_eq!(goals[0].action.as_deref(), Some("Buy a step counter"));
        assert_eq!(goals[1].category, GoalCategory::Professional);
        assert_eq!(goals[1].period, GoalPeriod::ThreeYears);
        assert_eq!(goals[2].category, GoalCategory::Personal);
        assert_eq!(goals[2].period, GoalPeriod::OneYear);
        assert!(goals.iter().all(|g| g.year == Some(2027)));
    }
}
