pub mod coach;
pub mod context;
pub mod decompose;
pub mod handlers;
pub mod onboarding;
pub mod prompts;
pub mod refine;
