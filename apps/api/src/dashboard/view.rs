//! Derived view computations: filtering, sorting and header statistics.
//!
//! Everything here is a pure function of its inputs. Inputs are borrowed and
//! never reordered in place; each call builds fresh output.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::dashboard::grace::GraceWindow;
use crate::models::blessing::Blessing;
use crate::models::goal::{Goal, GoalCategory, GoalPeriod, GoalStatus};
use crate::models::reward::Reward;

pub const STALE_AFTER_DAYS: i64 = 14;
pub const THIS_WEEK_DAYS: i64 = 7;

/// Named quick filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusMode {
    #[default]
    All,
    /// Doing or On Track.
    Active,
    Pinned,
    /// Not touched for 14 days and still open.
    Stale,
    /// Due within the next 7 days (or overdue) and not Done.
    ThisWeek,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Pinned first, then status priority (grace-adjusted), then number.
    #[default]
    Smart,
    /// Ascending `number` only.
    Number,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalFilter {
    pub search: Option<String>,
    pub status: Option<GoalStatus>,
    pub period: Option<GoalPeriod>,
    pub category: Option<GoalCategory>,
    pub year: Option<i32>,
    pub focus: FocusMode,
}

pub fn matches_focus(goal: &Goal, focus: FocusMode, now: DateTime<Utc>) -> bool {
    match focus {
        FocusMode::All => true,
        FocusMode::Active => goal.status.is_active(),
        FocusMode::Pinned => goal.pinned,
        FocusMode::Stale => {
            goal.updated_at < now - Duration::days(STALE_AFTER_DAYS) && !goal.status.is_closed()
        }
        FocusMode::ThisWeek => {
            let horizon = now.date_naive() + Duration::days(THIS_WEEK_DAYS);
            goal.status != GoalStatus::Done && goal.due_date.is_some_and(|due| due <= horizon)
        }
    }
}

fn matches_search(goal: &Goal, needle: &str) -> bool {
    let contains = |field: &str| field.to_lowercase().contains(needle);
    contains(&goal.goal)
        || goal.action.as_deref().is_some_and(contains)
        || goal.notes.as_deref().is_some_and(contains)
}

pub fn filter_goals(goals: &[Goal], filter: &GoalFilter, now: DateTime<Utc>) -> Vec<Goal> {
    let needle = filter
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    goals
        .iter()
        .filter(|g| filter.status.map_or(true, |s| g.status == s))
        .filter(|g| filter.period.map_or(true, |p| g.period == p))
        .filter(|g| filter.category.map_or(true, |c| g.category == c))
        .filter(|g| filter.year.map_or(true, |y| g.year == y))
        .filter(|g| needle.as_deref().map_or(true, |n| matches_search(g, n)))
        .filter(|g| matches_focus(g, filter.focus, now))
        .cloned()
        .collect()
}

/// Smart-sort comparator. `effective` supplies the status each goal is ranked by.
pub fn smart_order(
    a: &Goal,
    b: &Goal,
    effective: &impl Fn(&Goal) -> GoalStatus,
) -> Ordering {
    b.pinned
        .cmp(&a.pinned)
        .then_with(|| effective(a).sort_priority().cmp(&effective(b).sort_priority()))
        .then_with(|| a.number.cmp(&b.number))
}

/// Stable sort; goals with equal keys keep their relative order.
pub fn sort_goals(goals: &mut [Goal], mode: SortMode, effective: impl Fn(&Goal) -> GoalStatus) {
    match mode {
        SortMode::Smart => goals.sort_by(|a, b| smart_order(a, b, &effective)),
        SortMode::Number => goals.sort_by_key(|g| g.number),
    }
}

/// The list a dashboard renders: filter, then sort with grace-adjusted statuses.
pub fn compute_view(
    goals: &[Goal],
    filter: &GoalFilter,
    sort: SortMode,
    grace: &GraceWindow,
    at: Instant,
    now: DateTime<Utc>,
) -> Vec<Goal> {
    let mut visible = filter_goals(goals, filter, now);
    sort_goals(&mut visible, sort, |g| {
        grace.effective_status(g.id, g.status, at)
    });
    visible
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodCounts {
    pub one_year: usize,
    pub three_years: usize,
    pub five_years: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GoalStats {
    pub total: usize,
    pub doing: usize,
    pub on_track: usize,
    pub for_later: usize,
    pub done: usize,
    pub dropped: usize,
    /// Doing + On Track.
    pub in_progress: usize,
    pub pinned: usize,
    /// `done / total`, rounded to a whole percent; 0 when there are no goals.
    pub completion_percent: u32,
    pub by_period: PeriodCounts,
    /// Sum of `cost` over Done goals.
    pub points_earned: f64,
}

pub fn compute_stats(goals: &[Goal]) -> GoalStats {
    let mut stats = GoalStats {
        total: goals.len(),
        ..Default::default()
    };
    for goal in goals {
        match goal.status {
            GoalStatus::Doing => stats.doing += 1,
            GoalStatus::OnTrack => stats.on_track += 1,
            GoalStatus::ForLater => stats.for_later += 1,
            GoalStatus::Done => {
                stats.done += 1;
                stats.points_earned += goal.cost;
            }
            GoalStatus::Dropped => stats.dropped += 1,
        }
        match goal.period {
            GoalPeriod::OneYear => stats.by_period.one_year += 1,
            GoalPeriod::ThreeYears => stats.by_period.three_years += 1,
            GoalPeriod::FiveYears => stats.by_period.five_years += 1,
        }
        if goal.pinned {
            stats.pinned += 1;
        }
    }
    stats.in_progress = stats.doing + stats.on_track;
    if stats.total > 0 {
        stats.completion_percent =
            ((stats.done as f64 / stats.total as f64) * 100.0).round() as u32;
    }
    stats
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RewardSummary {
    pub total: usize,
    pub earned: usize,
    pub points_earned: f64,
    pub points_spent: f64,
    pub points_available: f64,
}

/// Points come from Done goals and are spent by rewards marked earned.
pub fn compute_reward_summary(goals: &[Goal], rewards: &[Reward]) -> RewardSummary {
    let points_earned: f64 = goals
        .iter()
        .filter(|g| g.status == GoalStatus::Done)
        .map(|g| g.cost)
        .sum();
    let points_spent: f64 = rewards.iter().filter(|r| r.earned).map(|r| r.cost).sum();
    RewardSummary {
        total: rewards.len(),
        earned: rewards.iter().filter(|r| r.earned).count(),
        points_earned,
        points_spent,
        points_available: points_earned - points_spent,
    }
}

/// Resolves a goal's weak link to a reward. A dangling id resolves to no link.
pub fn linked_reward<'a>(goal: &Goal, rewards: &'a [Reward]) -> Option<&'a Reward> {
    let id = goal.linked_reward_id?;
    rewards.iter().find(|r| r.id == id)
}

/// A goal as rendered on the dashboard, with its reward link resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalView {
    #[serde(flatten)]
    pub goal: Goal,
    pub linked_reward: Option<Reward>,
}

pub fn resolve_goal_views(goals: Vec<Goal>, rewards: &[Reward]) -> Vec<GoalView> {
    goals
        .into_iter()
        .map(|goal| GoalView {
            linked_reward: linked_reward(&goal, rewards).cloned(),
            goal,
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlessingStats {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
}

pub fn compute_blessing_stats(blessings: &[Blessing]) -> BlessingStats {
    let mut by_category = BTreeMap::new();
    for blessing in blessings {
        *by_category.entry(blessing.category.clone()).or_insert(0) += 1;
    }
    BlessingStats {
        total: blessings.len(),
        by_category,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use crate::models::goal::{Goal, GoalCategory, GoalPeriod, GoalStatus};

    pub fn goal(number: i32, status: GoalStatus, pinned: bool, now: DateTime<Utc>) -> Goal {
        Goal {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            number,
            year: 2026,
            goal: format!("Goal {number}"),
            category: GoalCategory::Personal,
            period: GoalPeriod::OneYear,
            status,
            action: None,
            cost: 0.0,
            notes: None,
            pinned,
            linked_reward_id: None,
            progress: 0,
            due_date: None,
            created_at: now,
            updated_at: now,
            subtasks: Vec::new(),
            is_vague: false,
            ai_refinement_suggestion: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::goal;
    use super::*;
    use std::time::Duration as StdDuration;
    use uuid::Uuid;

    fn numbers(goals: &[Goal]) -> Vec<i32> {
        goals.iter().map(|g| g.number).collect()
    }

    #[test]
    fn test_focus_active_and_pinned() {
        let now = Utc::now();
        let goals = vec![
            goal(1, GoalStatus::Doing, false, now),
            goal(2, GoalStatus::Done, false, now),
            goal(3, GoalStatus::Doing, true, now),
        ];

        let active = filter_goals(
            &goals,
            &GoalFilter {
                focus: FocusMode::Active,
                ..Default::default()
            },
            now,
        );
        assert_eq!(numbers(&active), vec![1, 3]);

        let pinned = filter_goals(
            &goals,
            &GoalFilter {
                focus: FocusMode::Pinned,
                ..Default::default()
            },
            now,
        );
        assert_eq!(numbers(&pinned), vec![3]);
    }

    #[test]
    fn test_focus_stale() {
        let now = Utc::now();
        let mut old_open = goal(1, GoalStatus::ForLater, false, now);
        old_open.updated_at = now - Duration::days(20);
        let mut old_done = goal(2, GoalStatus::Done, false, now);
        old_done.updated_at = now - Duration::days(20);
        let mut recent = goal(3, GoalStatus::Doing, false, now);
        recent.updated_at = now - Duration::days(3);

        let stale: Vec<i32> = [old_open, old_done, recent]
            .iter()
            .filter(|g| matches_focus(g, FocusMode::Stale, now))
            .map(|g| g.number)
            .collect();
        assert_eq!(stale, vec![1]);
    }

    #[test]
    fn test_focus_this_week() {
        let now = Utc::now();
        let today = now.date_naive();
        let mut soon = goal(1, GoalStatus::Doing, false, now);
        soon.due_date = Some(today + Duration::days(3));
        let mut later = goal(2, GoalStatus::Doing, false, now);
        later.due_date = Some(today + Duration::days(10));
        let mut overdue = goal(3, GoalStatus::OnTrack, false, now);
        overdue.due_date = Some(today - Duration::days(1));
        let mut finished = goal(4, GoalStatus::Done, false, now);
        finished.due_date = Some(today + Duration::days(1));
        let undated = goal(5, GoalStatus::Doing, false, now);

        let this_week: Vec<i32> = [soon, later, overdue, finished, undated]
            .iter()
            .filter(|g| matches_focus(g, FocusMode::ThisWeek, now))
            .map(|g| g.number)
            .collect();
        assert_eq!(this_week, vec![1, 3]);
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let now = Utc::now();
        let mut a = goal(1, GoalStatus::Doing, false, now);
        a.goal = "Run a Marathon".into();
        let mut b = goal(2, GoalStatus::Doing, false, now);
        b.action = Some("Buy running shoes".into());
        let c = goal(3, GoalStatus::Doing, false, now);

        let found = filter_goals(
            &[a, b, c],
            &GoalFilter {
                search: Some("  RUN ".into()),
                ..Default::default()
            },
            now,
        );
        assert_eq!(numbers(&found), vec![1, 2]);
    }

    #[test]
    fn test_smart_sort_order() {
        let now = Utc::now();
        let mut goals = vec![
            goal(5, GoalStatus::Done, false, now),
            goal(4, GoalStatus::Doing, false, now),
            goal(3, GoalStatus::ForLater, true, now),
            goal(2, GoalStatus::Doing, false, now),
            goal(1, GoalStatus::Dropped, false, now),
        ];
        sort_goals(&mut goals, SortMode::Smart, |g| g.status);
        assert_eq!(numbers(&goals), vec![3, 2, 4, 5, 1]);
    }

    #[test]
    fn test_number_sort_ignores_pin_and_status() {
        let now = Utc::now();
        let mut goals = vec![
            goal(3, GoalStatus::Doing, true, now),
            goal(1, GoalStatus::Dropped, false, now),
            goal(2, GoalStatus::Done, true, now),
        ];
        sort_goals(&mut goals, SortMode::Number, |_| GoalStatus::Doing);
        assert_eq!(numbers(&goals), vec![1, 2, 3]);
    }

    #[test]
    fn test_grace_window_keeps_completed_goal_in_place() {
        let now = Utc::now();
        let at = Instant::now();
        let mut just_done = goal(1, GoalStatus::Done, false, now);
        just_done.id = Uuid::new_v4();
        let other = goal(2, GoalStatus::Doing, false, now);
        let goals = vec![other.clone(), just_done.clone()];

        let mut grace = GraceWindow::default();
        grace.record(just_done.id, GoalStatus::Doing, at);

        let held = compute_view(&goals, &GoalFilter::default(), SortMode::Smart, &grace, at, now);
        assert_eq!(numbers(&held), vec![1, 2]);

        let later = at + StdDuration::from_millis(5000);
        let released =
            compute_view(&goals, &GoalFilter::default(), SortMode::Smart, &grace, later, now);
        assert_eq!(numbers(&released), vec![2, 1]);
    }

    #[test]
    fn test_pipeline_is_idempotent_and_leaves_input_untouched() {
        let now = Utc::now();
        let goals = vec![
            goal(3, GoalStatus::Done, false, now),
            goal(1, GoalStatus::Doing, true, now),
            goal(2, GoalStatus::OnTrack, false, now),
        ];
        let snapshot = goals.clone();
        let grace = GraceWindow::default();
        let at = Instant::now();
        let filter = GoalFilter::default();

        let first = compute_view(&goals, &filter, SortMode::Smart, &grace, at, now);
        let second = compute_view(&goals, &filter, SortMode::Smart, &grace, at, now);
        assert_eq!(first, second);
        assert_eq!(compute_stats(&goals), compute_stats(&goals));
        assert_eq!(goals, snapshot);
    }

    #[test]
    fn test_stats() {
        let now = Utc::now();
        let mut done = goal(1, GoalStatus::Done, true, now);
        done.cost = 30.0;
        let mut three = goal(2, GoalStatus::Doing, false, now);
        three.period = GoalPeriod::ThreeYears;
        let goals = vec![done, three, goal(3, GoalStatus::OnTrack, false, now)];

        let stats = compute_stats(&goals);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.in_progress, 2);
        assert_eq!(stats.done, 1);
        assert_eq!(stats.pinned, 1);
        assert_eq!(stats.completion_percent, 33);
        assert_eq!(stats.by_period.one_year, 2);
        assert_eq!(stats.by_period.three_years, 1);
        assert!((stats.points_earned - 30.0).abs() < f64::EPSILON);
        assert_eq!(compute_stats(&[]).completion_percent, 0);
    }

    #[test]
    fn test_reward_summary_and_weak_link() {
        let now = Utc::now();
        let mut done = goal(1, GoalStatus::Done, false, now);
        done.cost = 50.0;
        let reward = Reward {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            text: "Spa day".into(),
            cost: 20.0,
            earned: true,
            created_at: now,
        };
        done.linked_reward_id = Some(reward.id);
        let summary = compute_reward_summary(&[done.clone()], &[reward.clone()]);
        assert!((summary.points_available - 30.0).abs() < f64::EPSILON);
        assert_eq!(summary.earned, 1);

        assert_eq!(linked_reward(&done, &[reward.clone()]), Some(&reward));
        let views = resolve_goal_views(vec![done.clone()], std::slice::from_ref(&reward));
        assert_eq!(views[0].linked_reward.as_ref(), Some(&reward));
        let json = serde_json::to_value(&views[0]).unwrap();
        assert_eq!(json["number"], 1);
        assert_eq!(json["linked_reward"]["text"], "Spa day");

        done.linked_reward_id = Some(Uuid::new_v4());
        assert_eq!(linked_reward(&done, &[reward.clone()]), None);
        assert_eq!(resolve_goal_views(vec![done], &[reward])[0].linked_reward, None);
    }
}
