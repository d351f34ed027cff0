//! Goal milestones, progress notes and the vision board.

pub mod handlers;

use serde::Serialize;
use uuid::Uuid;

use crate::models::goal::Goal;
use crate::models::milestone::GoalMilestone;
use crate::models::vision::VisionBoardItem;

/// Completed share of a goal's milestones as a whole percent. Zero when there are none.
pub fn milestone_progress(milestones: &[GoalMilestone]) -> u32 {
    if milestones.is_empty() {
        return 0;
    }
    let done = milestones.iter().filter(|m| m.completed).count();
    ((done as f64 / milestones.len() as f64) * 100.0).round() as u32
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedGoal {
    pub id: Uuid,
    pub number: i32,
    pub goal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisionItemView {
    #[serde(flatten)]
    pub item: VisionBoardItem,
    /// `None` when unlinked or when the linked goal no longer exists.
    pub linked_goal: Option<LinkedGoal>,
}

pub fn resolve_vision_item(item: VisionBoardItem, goals: &[Goal]) -> VisionItemView {
    let linked_goal = item
        .linked_goal_id
        .and_then(|id| goals.iter().find(|g| g.id == id))
        .map(|g| LinkedGoal {
            id: g.id,
            number: g.number,
            goal: g.goal.clone(),
        });
    VisionItemView { item, linked_goal }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::view::fixtures::goal;
    use crate::models::goal::GoalStatus;
    use chrono::Utc;

    fn milestone(completed: bool) -> GoalMilestone {
        GoalMilestone {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            goal_id: Uuid::nil(),
            title: "Step".into(),
            completed,
            completed_at: None,
            sort_order: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_milestone_progress() {
        assert_eq!(milestone_progress(&[]), 0);
        assert_eq!(
            milestone_progress(&[milestone(true), milestone(false), milestone(false)]),
            33
        );
        assert_eq!(milestone_progress(&[milestone(true), milestone(true)]), 100);
    }

    #[test]
    fn test_dangling_goal_link_resolves_to_none() {
        let linked = goal(7, GoalStatus::Doing, false, Utc::now());
        let item = VisionBoardItem {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            image_url: "https://example.com/beach.jpg".into(),
            title: "Beach house".into(),
            description: None,
            category: None,
            linked_goal_id: Some(linked.id),
            created_at: Utc::now(),
        };

        let view = resolve_vision_item(item.clone(), std::slice::from_ref(&linked));
        assert_eq!(view.linked_goal.map(|g| g.number), Some(7));

        let view = resolve_vision_item(item, &[]);
        assert!(view.linked_goal.is_none());
    }
}
