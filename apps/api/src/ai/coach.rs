//! AI chat coach.
//!
//! Each turn sends the persona, the user's goals, the most recent transcript
//! and the new message. Both turns are written to the transcript only after
//! the model has answered, so a failed call leaves no half-conversation behind.

use std::convert::Infallible;
use std::sync::Arc;

use axum::response::sse::Event;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::ai::context::format_goals_verbose;
use crate::ai::prompts::COACH_CONTEXT_TEMPLATE;
use crate::errors::AppError;
use crate::llm_client::prompts::COACH_PERSONA;
use crate::llm_client::{CompletionOptions, LlmClient, LlmError, PromptMessage};
use crate::models::chat::ChatHistoryRow;
use crate::models::goal::Goal;
use crate::store::{RemoteStore, StoreError};

/// Transcript turns replayed to the model.
pub const HISTORY_LIMIT: i64 = 20;

pub const USER_ROLE: &str = "user";
pub const ASSISTANT_ROLE: &str = "assistant";

pub fn build_messages(goals: &[Goal], history: &[ChatHistoryRow], message: &str) -> Vec<PromptMessage> {
    let context = COACH_CONTEXT_TEMPLATE.replace("{goals}", &format_goals_verbose(goals));
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(format!("{COACH_PERSONA}\n\n{context}")));
    messages.extend(history.iter().map(|row| match row.role.as_str() {
        ASSISTANT_ROLE => PromptMessage::assistant(row.content.clone()),
        _ => PromptMessage::user(row.content.clone()),
    }));
    messages.push(PromptMessage::user(message));
    messages
}

async fn record_exchange(
    store: &dyn RemoteStore,
    user_id: Uuid,
    message: &str,
    reply: &str,
) -> Result<(), StoreError> {
    store.append_chat_message(user_id, USER_ROLE, message).await?;
    store.append_chat_message(user_id, ASSISTANT_ROLE, reply).await?;
    Ok(())
}

/// One complete coach reply.
pub async fn chat(
    store: &dyn RemoteStore,
    llm: &LlmClient,
    user_id: Uuid,
    goals: &[Goal],
    message: &str,
) -> Result<String, AppError> {
    let history = store.list_chat_history(user_id, HISTORY_LIMIT).await?;
    let messages = build_messages(goals, &history, message);
    let reply = llm.complete(&messages, CompletionOptions::default()).await?;
    record_exchange(store, user_id, message, &reply).await?;
    Ok(reply)
}

#[derive(Serialize)]
struct DeltaPayload<'a> {
    delta: &'a str,
}

struct CoachStream {
    deltas: BoxStream<'static, Result<String, LlmError>>,
    store: Arc<dyn RemoteStore>,
    user_id: Uuid,
    message: String,
    reply: String,
}

/// Streams the reply as SSE events: `delta` payloads, then a `done` event once
/// the exchange is stored, or an `error` event if the stream broke.
pub async fn chat_stream(
    store: Arc<dyn RemoteStore>,
    llm: &LlmClient,
    user_id: Uuid,
    goals: &[Goal],
    message: String,
) -> Result<BoxStream<'static, Result<Event, Infallible>>, AppError> {
    let history = store.list_chat_history(user_id, HISTORY_LIMIT).await?;
    let messages = build_messages(goals, &history, &message);
    let deltas = llm.stream(&messages, CompletionOptions::default()).await?;

    let initial = CoachStream {
        deltas,
        store,
        user_id,
        message,
        reply: String::new(),
    };

    Ok(stream::unfold(Some(initial), |state| async move {
        let mut state = state?;
        let next = state.deltas.next().await;
        match next {
            Some(Ok(delta)) => {
                state.reply.push_str(&delta);
                let event = Event::default()
                    .json_data(DeltaPayload { delta: &delta })
                    .unwrap_or_default();
                Some((Ok(event), Some(state)))
            }
            Some(Err(e)) => {
                warn!(user_id = %state.user_id, "Coach stream failed: {e}");
                let event = Event::default().event("error").data("AI stream failed");
                Some((Ok(event), None))
            }
            None => {
                let event = finish(state).await;
                Some((Ok(event), None))
            }
        }
    })
    .boxed())
}

async fn finish(state: CoachStream) -> Event {
    if state.reply.trim().is_empty() {
        return Event::default().event("error").data("AI returned an empty reply");
    }
    if let Err(e) = record_exchange(
        state.store.as_ref(),
        state.user_id,
        &state.message,
        &state.reply,
    )
    .await
    {
        warn!(user_id = %state.user_id, "Failed to store coach exchange: {e}");
    }
    Event::default().event("done").data("[DONE]")
}
