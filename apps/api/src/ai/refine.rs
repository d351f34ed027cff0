//! Vagueness review: flags goals without a measurable outcome and proposes a sharper wording.

use std::collections::HashMap;
use std::fmt::Write;

use serde::Deserialize;
use uuid::Uuid;

use crate::ai::prompts::{REFINE_PROMPT_TEMPLATE, REFINE_SYSTEM};
use crate::errors::AppError;
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{CompletionOptions, LlmClient, PromptMessage};
use crate::models::goal::{Goal, GoalPatch};
use crate::store::RemoteStore;

pub const MAX_BATCH: usize = 20;

#[derive(Debug, Deserialize)]
struct RefineReply {
    results: Vec<Verdict>,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    index: usize,
    is_vague: bool,
    #[serde(default)]
    suggestion: Option<String>,
}

/// Picks the goals a batch request covers.
/// No ids means every open goal, lowest numbers first, capped at [`MAX_BATCH`].
pub fn select_batch(goals: &[Goal], ids: &[Uuid]) -> Result<Vec<Goal>, AppError> {
    if ids.is_empty() {
        let mut open: Vec<Goal> = goals
            .iter()
            .filter(|g| !g.status.is_closed())
            .cloned()
            .collect();
        open.sort_by_key(|g| g.number);
        open.truncate(MAX_BATCH);
        return Ok(open);
    }

    if ids.len() > MAX_BATCH {
        return Err(AppError::Validation(format!(
            "at most {MAX_BATCH} goals can be refined at once"
        )));
    }
    let by_id: HashMap<Uuid, &Goal> = goals.iter().map(|g| (g.id, g)).collect();
    ids.iter()
        .map(|id| {
            by_id
                .get(id)
                .map(|g| (*g).clone())
                .ok_or_else(|| AppError::NotFound(format!("Goal {id}")))
        })
        .collect()
}

pub fn build_messages(goals: &[Goal]) -> Vec<PromptMessage> {
    let mut listing = String::new();
    for (index, goal) in goals.iter().enumerate() {
        let _ = writeln!(
            listing,
            "{index}: {} ({}, {})",
            goal.goal,
            goal.category.as_str(),
            goal.period.as_str()
        );
    }
    let prompt = REFINE_PROMPT_TEMPLATE.replace("{goals}", listing.trim_end());
    vec![
        PromptMessage::system(format!("{REFINE_SYSTEM} {JSON_ONLY_INSTRUCTION}")),
        PromptMessage::user(prompt),
    ]
}

/// Maps verdicts back onto the reviewed goals. Out-of-range and repeated indexes are ignored.
fn patches(goals: &[Goal], reply: RefineReply) -> Vec<(Uuid, GoalPatch)> {
    let mut seen = vec![false; goals.len()];
    reply
        .results
        .into_iter()
        .filter_map(|verdict| {
            let goal = goals.get(verdict.index)?;
            if std::mem::replace(&mut seen[verdict.index], true) {
                return None;
            }
            let suggestion = verdict
                .suggestion
                .map(|s| s.trim().to_string())
                .filter(|s| verdict.is_vague && !s.is_empty());
            let patch = GoalPatch {
                is_vague: Some(verdict.is_vague),
                ai_refinement_suggestion: Some(suggestion),
                ..Default::default()
            };
            Some((goal.id, patch))
        })
        .collect()
}

/// Reviews `goals` in one completion call and stores the verdicts.
/// Returns the updated goals; goals the model skipped are left as they were.
pub async fn refine_goals(
    store: &dyn RemoteStore,
    llm: &LlmClient,
    user_id: Uuid,
    goals: &[Goal],
) -> Result<Vec<Goal>, AppError> {
    if goals.is_empty() {
        return Ok(Vec::new());
    }

    let options = CompletionOptions {
        temperature: 0.3,
        ..Default::default()
    };
    let reply: RefineReply = llm.complete_json(&build_messages(goals), options).await?;
    let patches = patches(goals, reply);
    if patches.is_empty() {
        return Err(AppError::AiParse("no verdicts matched the reviewed goals".to_string()));
    }

    let mut updated = Vec::with_capacity(patches.len());
    for (id, patch) in &patches {
        updated.push(store.update_goal(user_id, *id, patch).await?);
    }
    Ok(updated)
}
