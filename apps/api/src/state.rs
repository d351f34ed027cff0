use std::sync::Arc;

use crate::config::Config;
use crate::dashboard::registry::DashboardRegistry;
use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::store::RemoteStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RemoteStore>,
    /// `None` when no completion API key is configured.
    pub llm: Option<LlmClient>,
    pub dashboards: Arc<DashboardRegistry>,
    pub config: Config,
}

impl AppState {
    /// The completion client, or the 503 every AI endpoint returns without one.
    pub fn llm(&self) -> Result<&LlmClient, AppError> {
        self.llm.as_ref().ok_or(AppError::AiNotConfigured)
    }
}
