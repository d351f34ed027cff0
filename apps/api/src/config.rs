use anyhow::{Context, Result};

use crate::dashboard::registry::DEFAULT_SESSION_IDLE;

/// Application configuration loaded from environment variables.
/// Only the numeric settings are validated; everything else is optional.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absent ⇒ in-process store (development only; nothing survives a restart).
    pub database_url: Option<String>,
    /// Absent ⇒ every AI endpoint answers 503.
    pub openai_api_key: Option<String>,
    pub openai_api_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub grace_window_ms: u64,
    pub session_idle_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_api_url: optional_env("OPENAI_API_URL"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            grace_window_ms: std::env::var("GRACE_WINDOW_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse::<u64>()
                .context("GRACE_WINDOW_MS must be a whole number of milliseconds")?,
            session_idle_secs: std::env::var("SESSION_IDLE_SECS")
                .unwrap_or_else(|_| DEFAULT_SESSION_IDLE.as_secs().to_string())
                .parse::<u64>()
                .context("SESSION_IDLE_SECS must be a whole number of seconds")?,
        })
    }
}

/// Treats unset and blank variables the same way.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
