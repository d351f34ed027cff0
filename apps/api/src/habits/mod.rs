//! Habit tracking: streaks and weekly progress over daily completion marks.

pub mod handlers;

use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::models::habit::{Habit, HabitCompletion};

/// How far back completions are fetched for streaks.
pub const STREAK_LOOKBACK_DAYS: i64 = 366;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitSummary {
    #[serde(flatten)]
    pub habit: Habit,
    pub streak: u32,
    pub completed_today: bool,
    pub completed_this_week: u32,
    pub target_met: bool,
}

/// Consecutive completed days ending today. Zero when today is not completed.
pub fn current_streak(days: &HashSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut day = today;
    while days.contains(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

/// Completions in the Monday-based week containing `today`, up to and including today.
pub fn completions_this_week(days: &HashSet<NaiveDate>, today: NaiveDate) -> u32 {
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    days.iter().filter(|d| **d >= monday && **d <= today).count() as u32
}

pub fn summarize(habit: Habit, completions: &[HabitCompletion], today: NaiveDate) -> HabitSummary {
    let days: HashSet<NaiveDate> = completions
        .iter()
        .filter(|c| c.habit_id == habit.id)
        .map(|c| c.completed_date)
        .collect();
    let completed_this_week = completions_this_week(&days, today);
    let target = u32::try_from(habit.target_days_per_week).unwrap_or(0);
    HabitSummary {
        streak: current_streak(&days, today),
        completed_today: days.contains(&today),
        completed_this_week,
        target_met: completed_this_week >= target,
        habit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn days(list: &[NaiveDate]) -> HashSet<NaiveDate> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_streak_walks_back_from_today() {
        let today = date(2026, 10, 15);
        let marks = days(&[
            date(2026, 10, 15),
            date(2026, 10, 14),
            date(2026, 10, 13),
            date(2026, 10, 11),
        ]);
        assert_eq!(current_streak(&marks, today), 3);
    }

    #[test]
    fn test_streak_is_zero_without_today() {
        let marks = days(&[date(2026, 10, 14), date(2026, 10, 13)]);
        assert_eq!(current_streak(&marks, date(2026, 10, 15)), 0);
    }

    #[test]
    fn test_week_starts_on_monday() {
        // 2026-10-15 is a Thursday; the week began on Monday 2026-10-12.
        let today = date(2026, 10, 15);
        let marks = days(&[
            date(2026, 10, 11),
            date(2026, 10, 12),
            date(2026, 10, 14),
            date(2026, 10, 16),
        ]);
        assert_eq!(completions_this_week(&marks, today), 2);
    }

    #[test]
    fn test_summary_checks_target() {
        let habit = Habit {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            title: "Stretch".into(),
            color: "#fff".into(),
            recurrence: "weekly".into(),
            target_days_per_week: 2,
            linked_goal_id: None,
            active: true,
            created_at: Utc::now(),
        };
        let today = date(2026, 10, 15);
        let completions: Vec<HabitCompletion> = [date(2026, 10, 14), date(2026, 10, 15)]
            .into_iter()
            .map(|completed_date| HabitCompletion {
                id: Uuid::new_v4(),
                user_id: Uuid::nil(),
                habit_id: habit.id,
                completed_date,
                created_at: Utc::now(),
            })
            .collect();

        let summary = summarize(habit, &completions, today);
        assert_eq!(summary.streak, 2);
        assert!(summary.completed_today);
        assert!(summary.target_met);
    }
}
