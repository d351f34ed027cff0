// Prompt templates for the AI goal features.
// Shared fragments come from llm_client::prompts; placeholders in `{braces}`
// are replaced before sending.

/// System prompt for breaking one goal into subtasks.
pub const DECOMPOSE_SYSTEM: &str = "You break personal and professional goals into \
    small, concrete subtasks that can each be finished in a single sitting or a few days.";

/// Replace `{goal}`, `{category}`, `{period}`, `{action}` and `{notes}`.
pub const DECOMPOSE_PROMPT_TEMPLATE: &str = r#"Break this goal into 3 to 7 actionable subtasks.

Goal: {goal}
Category: {category}
Time horizon: {period}
Current next action: {action}
Notes: {notes}

Return a JSON object with this EXACT schema:
{
  "subtasks": [
    {"text": "Research beginner training plans", "estimated_time": "1 hour"}
  ]
}

Order subtasks in the sequence they should be done. Keep each text under 80 characters."#;

/// Replace `{goals}` with the verbose goal context.
pub const COACH_CONTEXT_TEMPLATE: &str = "Here is the user's current goal list. \
Refer to goals by their number when it helps.

{goals}";

pub const ONBOARDING_SYSTEM: &str = "You help people who are new to goal setting choose \
    a first, balanced set of goals for the year.";

/// Replace `{life_stage}`, `{priorities}`, `{year}` and `{existing_goals}` (compact goal context).
pub const ONBOARDING_PROMPT_TEMPLATE: &str = r#"Suggest 5 to 8 starter goals for {year}.

Life stage: {life_stage}
Priorities: {priorities}

Goals the user already has:
{existing_goals}

Return a JSON object with this EXACT schema:
{
  "goals": [
    {
      "goal": "Run a half marathon",
      "category": "Personal",
      "period": "One-year",
      "action": "Sign up for a local 5k this month"
    }
  ]
}

Rules:
- "category" is exactly "Personal" or "Professional".
- "period" is exactly "One-year", "Three-years" or "Five-years". Most goals should be "One-year".
- Cover every listed priority at least once.
- "action" is one small first step that can be done this week.
- Do not repeat or reword a goal the user already has."#;

pub const REFINE_SYSTEM: &str = "You review goals and judge whether they are specific \
    enough to act on. A goal is vague when it has no measurable outcome or no clear scope.";

/// Replace `{goals}` with one `index: text` line per goal.
pub const REFINE_PROMPT_TEMPLATE: &str = r#"Review each goal below.

{goals}

Return a JSON object with this EXACT schema:
{
  "results": [
    {"index": 0, "is_vague": true, "suggestion": "Run a 10k in under an hour by June"}
  ]
}

Include one result per goal, using the index shown. When a goal is not vague, set "suggestion" to null."#;
