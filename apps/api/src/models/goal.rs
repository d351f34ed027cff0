use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::deserialize_some;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalCategory {
    Personal,
    Professional,
}

impl GoalCategory {
    pub const ALL: [GoalCategory; 2] = [GoalCategory::Personal, GoalCategory::Professional];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalCategory::Personal => "Personal",
            GoalCategory::Professional => "Professional",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalPeriod {
    #[serde(rename = "One-year")]
    OneYear,
    #[serde(rename = "Three-years")]
    ThreeYears,
    #[serde(rename = "Five-years")]
    FiveYears,
}

impl GoalPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalPeriod::OneYear => "One-year",
            GoalPeriod::ThreeYears => "Three-years",
            GoalPeriod::FiveYears => "Five-years",
        }
    }
}

/// Goal status. Cycling follows the fixed circular order
/// `Doing → On Track → For Later → Done → Dropped → Doing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalStatus {
    Doing,
    #[serde(rename = "On Track")]
    OnTrack,
    #[serde(rename = "For Later")]
    ForLater,
    Done,
    Dropped,
}

impl GoalStatus {
    pub const ALL: [GoalStatus; 5] = [
        GoalStatus::Doing,
        GoalStatus::OnTrack,
        GoalStatus::ForLater,
        GoalStatus::Done,
        GoalStatus::Dropped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Doing => "Doing",
            GoalStatus::OnTrack => "On Track",
            GoalStatus::ForLater => "For Later",
            GoalStatus::Done => "Done",
            GoalStatus::Dropped => "Dropped",
        }
    }

    pub fn next(&self) -> GoalStatus {
        match self {
            GoalStatus::Doing => GoalStatus::OnTrack,
            GoalStatus::OnTrack => GoalStatus::ForLater,
            GoalStatus::ForLater => GoalStatus::Done,
            GoalStatus::Done => GoalStatus::Dropped,
            GoalStatus::Dropped => GoalStatus::Doing,
        }
    }

    /// Rank used by the smart sort: lower sorts first.
    pub fn sort_priority(&self) -> u8 {
        match self {
            GoalStatus::Doing => 0,
            GoalStatus::OnTrack => 1,
            GoalStatus::ForLater => 2,
            GoalStatus::Done => 3,
            GoalStatus::Dropped => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GoalStatus::Done)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, GoalStatus::Done | GoalStatus::Dropped)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, GoalStatus::Doing | GoalStatus::OnTrack)
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl FromStr for GoalStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GoalStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl FromStr for GoalCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GoalCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl FromStr for GoalPeriod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [GoalPeriod::OneYear, GoalPeriod::ThreeYears, GoalPeriod::FiveYears]
            .into_iter()
            .find(|period| period.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub estimated_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub number: i32,
    pub year: i32,
    pub goal: String,
    pub category: GoalCategory,
    pub period: GoalPeriod,
    pub status: GoalStatus,
    pub action: Option<String>,
    pub cost: f64,
    pub notes: Option<String>,
    pub pinned: bool,
    pub linked_reward_id: Option<Uuid>,
    pub progress: i32,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub subtasks: Vec<Subtask>,
    pub is_vague: bool,
    pub ai_refinement_suggestion: Option<String>,
}

impl Goal {
    /// Rebuilds the insert payload for this goal, used when a deleted goal is restored.
    pub fn to_new_goal(&self) -> NewGoal {
        NewGoal {
            number: Some(self.number),
            year: Some(self.year),
            goal: self.goal.clone(),
            category: self.category,
            period: self.period,
            status: self.status,
            action: self.action.clone(),
            cost: self.cost,
            notes: self.notes.clone(),
            pinned: self.pinned,
            linked_reward_id: self.linked_reward_id,
            progress: self.progress,
            due_date: self.due_date,
            subtasks: self.subtasks.clone(),
            is_vague: self.is_vague,
            ai_refinement_suggestion: self.ai_refinement_suggestion.clone(),
        }
    }
}

/// Raw `goals` row. Enum columns are stored as text and checked on conversion.
#[derive(Debug, Clone, FromRow)]
pub struct GoalRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub number: i32,
    pub year: i32,
    pub goal: String,
    pub category: String,
    pub period: String,
    pub status: String,
    pub action: Option<String>,
    pub cost: f64,
    pub notes: Option<String>,
    pub pinned: bool,
    pub linked_reward_id: Option<Uuid>,
    pub progress: i32,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub subtasks: Json<Vec<Subtask>>,
    pub is_vague: bool,
    pub ai_refinement_suggestion: Option<String>,
}

impl TryFrom<GoalRow> for Goal {
    type Error = UnknownVariant;

    fn try_from(row: GoalRow) -> Result<Self, Self::Error> {
        Ok(Goal {
            id: row.id,
            user_id: row.user_id,
            number: row.number,
            year: row.year,
            goal: row.goal,
            category: row.category.parse()?,
            period: row.period.parse()?,
            status: row.status.parse()?,
            action: row.action,
            cost: row.cost,
            notes: row.notes,
            pinned: row.pinned,
            linked_reward_id: row.linked_reward_id,
            progress: row.progress,
            due_date: row.due_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
            subtasks: row.subtasks.0,
            is_vague: row.is_vague,
            ai_refinement_suggestion: row.ai_refinement_suggestion,
        })
    }
}

fn default_status() -> GoalStatus {
    GoalStatus::Doing
}

fn default_period() -> GoalPeriod {
    GoalPeriod::OneYear
}

fn default_category() -> GoalCategory {
    GoalCategory::Personal
}

/// Caller-supplied fields for a new goal. `id` and timestamps are server-assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGoal {
    #[serde(default)]
    pub number: Option<i32>,
    #[serde(default)]
    pub year: Option<i32>,
    pub goal: String,
    #[serde(default = "default_category")]
    pub category: GoalCategory,
    #[serde(default = "default_period")]
    pub period: GoalPeriod,
    #[serde(default = "default_status")]
    pub status: GoalStatus,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub linked_reward_id: Option<Uuid>,
    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub is_vague: bool,
    #[serde(default)]
    pub ai_refinement_suggestion: Option<String>,
}

impl NewGoal {
    pub fn new(goal: impl Into<String>, category: GoalCategory, period: GoalPeriod) -> Self {
        Self {
            number: None,
            year: None,
            goal: goal.into(),
            category,
            period,
            status: GoalStatus::Doing,
            action: None,
            cost: 0.0,
            notes: None,
            pinned: false,
            linked_reward_id: None,
            progress: 0,
            due_date: None,
            subtasks: Vec::new(),
            is_vague: false,
            ai_refinement_suggestion: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.goal.trim().is_empty() {
            return Err("goal cannot be empty".to_string());
        }
        validate_cost(self.cost)?;
        validate_progress(self.progress)
    }
}

/// Partial goal update. Nullable fields use `Option<Option<T>>`:
/// absent leaves the value untouched, `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<GoalCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<GoalPeriod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GoalStatus>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub action: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub linked_reward_id: Option<Option<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<Subtask>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_vague: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub ai_refinement_suggestion: Option<Option<String>>,
}

impl GoalPatch {
    pub fn status(status: GoalStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == GoalPatch::default()
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(goal) = &self.goal {
            if goal.trim().is_empty() {
                return Err("goal cannot be empty".to_string());
            }
        }
        if let Some(cost) = self.cost {
            validate_cost(cost)?;
        }
        if let Some(progress) = self.progress {
            validate_progress(progress)?;
        }
        Ok(())
    }

    /// Applies every present field onto `goal`. Timestamps are left to the caller.
    pub fn apply(&self, goal: &mut Goal) {
        if let Some(number) = self.number {
            goal.number = number;
        }
        if let Some(year) = self.year {
            goal.year = year;
        }
        if let Some(text) = &self.goal {
            goal.goal = text.clone();
        }
        if let Some(category) = self.category {
            goal.category = category;
        }
        if let Some(period) = self.period {
            goal.period = period;
        }
        if let Some(status) = self.status {
            goal.status = status;
        }
        if let Some(action) = &self.action {
            goal.action = action.clone();
        }
        if let Some(cost) = self.cost {
            goal.cost = cost;
        }
        if let Some(notes) = &self.notes {
            goal.notes = notes.clone();
        }
        if let Some(pinned) = self.pinned {
            goal.pinned = pinned;
        }
        if let Some(linked) = self.linked_reward_id {
            goal.linked_reward_id = linked;
        }
        if let Some(progress) = self.progress {
            goal.progress = progress;
        }
        if let Some(due_date) = self.due_date {
            goal.due_date = due_date;
        }
        if let Some(subtasks) = &self.subtasks {
            goal.subtasks = subtasks.clone();
        }
        if let Some(is_vague) = self.is_vague {
            goal.is_vague = is_vague;
        }
        if let Some(suggestion) = &self.ai_refinement_suggestion {
            goal.ai_refinement_suggestion = suggestion.clone();
        }
    }
}

fn validate_cost(cost: f64) -> Result<(), String> {
    if !cost.is_finite() || cost < 0.0 {
        return Err("cost must be a non-negative number".to_string());
    }
    Ok(())
}

fn validate_progress(progress: i32) -> Result<(), String> {
    if !(0..=100).contains(&progress) {
        return Err("progress must be between 0 and 100".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_cycle_is_circular() {
        let mut status = GoalStatus::Doing;
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(status);
            status = status.next();
        }
        assert_eq!(status, GoalStatus::Doing);
        assert_eq!(seen, GoalStatus::ALL.to_vec());
    }

    #[test]
    fn test_status_serde_uses_display_names() {
        let json = serde_json::to_string(&GoalStatus::OnTrack).unwrap();
        assert_eq!(json, r#""On Track""#);
        let parsed: GoalStatus = serde_json::from_str(r#""For Later""#).unwrap();
        assert_eq!(parsed, GoalStatus::ForLater);
        assert_eq!("Dropped".parse::<GoalStatus>().unwrap(), GoalStatus::Dropped);
        assert!("done".parse::<GoalStatus>().is_err());
    }

    #[test]
    fn test_period_serde() {
        let parsed: GoalPeriod = serde_json::from_str(r#""Three-years""#).unwrap();
        assert_eq!(parsed, GoalPeriod::ThreeYears);
        assert_eq!(GoalPeriod::FiveYears.as_str(), "Five-years");
    }

    #[test]
    fn test_patch_distinguishes_absent_from_null() {
        let patch: GoalPatch = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        assert_eq!(patch.notes, Some(None));
        assert_eq!(patch.action, None);

        let patch: GoalPatch = serde_json::from_str(r#"{"action": "call coach"}"#).unwrap();
        assert_eq!(patch.action, Some(Some("call coach".to_string())));
    }

    #[test]
    fn test_empty_patch() {
        let patch: GoalPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());
        assert!(!GoalPatch::status(GoalStatus::Done).is_empty());
    }

    #[test]
    fn test_patch_validation() {
        let patch = GoalPatch {
            progress: Some(120),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
        let patch = GoalPatch {
            cost: Some(-1.0),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
        let patch = GoalPatch {
            goal: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_new_goal_defaults_from_json() {
        let new: NewGoal = serde_json::from_str(r#"{"goal": "Learn piano"}"#).unwrap();
        assert_eq!(new.status, GoalStatus::Doing);
        assert_eq!(new.category, GoalCategory::Personal);
        assert_eq!(new.period, GoalPeriod::OneYear);
        assert_eq!(new.cost, 0.0);
        assert!(new.validate().is_ok());
    }
}
