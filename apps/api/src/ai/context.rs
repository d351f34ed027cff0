//! Plain-text goal summaries for prompts.
//!
//! Output is deterministic for a given goal set: categories in a fixed order,
//! goals by ascending number, ties broken by id.

use std::fmt::Write;

use crate::dashboard::view::compute_stats;
use crate::models::goal::{Goal, GoalCategory};

const PIN_MARKER: &str = "📌 ";

fn goal_line(goal: &Goal) -> String {
    format!(
        "- {}#{} {} [{}] ({})",
        if goal.pinned { PIN_MARKER } else { "" },
        goal.number,
        goal.goal,
        goal.status,
        goal.period.as_str()
    )
}

fn grouped(goals: &[Goal]) -> Vec<(GoalCategory, Vec<&Goal>)> {
    GoalCategory::ALL
        .into_iter()
        .filter_map(|category| {
            let mut members: Vec<&Goal> =
                goals.iter().filter(|g| g.category == category).collect();
            if members.is_empty() {
                return None;
            }
            members.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.id.cmp(&b.id)));
            Some((category, members))
        })
        .collect()
}

fn render(goals: &[Goal], with_actions: bool) -> String {
    if goals.is_empty() {
        return "No goals yet.".to_string();
    }

    let mut out = String::new();
    for (i, (category, members)) in grouped(goals).into_iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{} goals:", category.as_str());
        for goal in members {
            let _ = writeln!(out, "{}", goal_line(goal));
            if with_actions {
                if let Some(action) = goal.action.as_deref().filter(|a| !a.trim().is_empty()) {
                    let _ = writeln!(out, "  Next action: {action}");
                }
            }
        }
    }
    out.trim_end().to_string()
}

/// One line per goal, grouped by category.
pub fn format_goals_compact(goals: &[Goal]) -> String {
    render(goals, false)
}

/// Overview block, then the grouped listing with next actions. Used by the coach.
pub fn format_goals_verbose(goals: &[Goal]) -> String {
    let stats = compute_stats(goals);
    let overview = format!(
        "Overview: {} goals total, {} in progress, {} completed, {} pinned.",
        stats.total, stats.in_progress, stats.done, stats.pinned
    );
    format!("{overview}\n\n{}", render(goals, true))
}
