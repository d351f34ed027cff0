/// LLM client: the single point of entry for all completion API calls.
///
/// ARCHITECTURAL RULE: No other module may call the completion API directly.
/// All LLM interactions MUST go through this module.
///
/// Speaks the OpenAI-compatible chat-completions protocol. The endpoint can be
/// overridden (OPENAI_API_URL) to target any compatible gateway.
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod json_extract;
pub mod prompts;
pub mod sse;

use self::json_extract::parse_json_as;
use self::sse::{SseDecoder, StreamEvent};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
/// The model used for all completion calls.
pub const MODEL: &str = "gpt-4o-mini";
/// Retries after the first attempt, so a call makes at most `MAX_RETRIES + 1` requests.
const MAX_RETRIES: u32 = 3;

/// Wait before retry number `retry` (1-based): 1s, 2s, 4s.
fn backoff_delay(retry: u32) -> Duration {
    Duration::from_millis(1000 << (retry - 1))
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("response did not contain the expected JSON: {0}")]
    Unparseable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters for one call.
#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// The single completion client used by all services.
/// Wraps the chat-completions API with retry logic and structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
}

impl LlmClient {
    pub fn new(api_key: String, api_url: Option<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            api_key,
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        })
    }

    /// Sends the request, retrying on 429 (rate limit) and 5xx with exponential backoff.
    async fn send(&self, body: &CompletionRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.api_url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Non-streaming completion. Returns the generated text of the first choice.
    pub async fn complete(
        &self,
        messages: &[PromptMessage],
        options: CompletionOptions,
    ) -> Result<String, LlmError> {
        let body = CompletionRequest {
            model: MODEL,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        };
        let response: CompletionResponse = self.send(&body).await?.json().await?;

        if let Some(usage) = &response.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }

    /// Calls the model and extracts a typed JSON value from whatever it returned.
    /// The prompt should ask for JSON; prose around it is tolerated.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        messages: &[PromptMessage],
        options: CompletionOptions,
    ) -> Result<T, LlmError> {
        let text = self.complete(messages, options).await?;
        parse_json_as(&text).ok_or_else(|| {
            let preview: String = text.chars().take(200).collect();
            LlmError::Unparseable(preview)
        })
    }

    /// Streaming completion. Yields text deltas until the API's `[DONE]` sentinel.
    pub async fn stream(
        &self,
        messages: &[PromptMessage],
        options: CompletionOptions,
    ) -> Result<BoxStream<'static, Result<String, LlmError>>, LlmError> {
        let body = CompletionRequest {
            model: MODEL,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: true,
        };
        let bytes = self.send(&body).await?.bytes_stream();

        let deltas = stream::unfold(
            (bytes, SseDecoder::new()),
            |(mut bytes, mut decoder)| async move {
                if decoder.is_finished() {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        let events: Vec<Result<String, LlmError>> = decoder
                            .push(&chunk)
                            .into_iter()
                            .filter_map(|event| match event {
                                StreamEvent::Delta(text) => Some(Ok(text)),
                                StreamEvent::Done => None,
                            })
                            .collect();
                        Some((stream::iter(events), (bytes, decoder)))
                    }
                    Some(Err(e)) => {
                        let failed = SseDecoder::finished();
                        Some((stream::iter(vec![Err(LlmError::Http(e))]), (bytes, failed)))
                    }
                    None => None,
                }
            },
        )
        .flatten();

        Ok(deltas.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_over_every_retry() {
        let delays: Vec<u64> = (1..=MAX_RETRIES)
            .map(|retry| backoff_delay(retry).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4]);
    }

    #[test]
    fn test_prompt_message_serializes_lowercase_role() {
        let json = serde_json::to_value(PromptMessage::system("hi")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hi");
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![PromptMessage::user("hello")];
        let body = CompletionRequest {
            model: MODEL,
            messages: &messages,
            temperature: 0.2,
            max_tokens: 64,
            stream: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["max_tokens"], 64);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_completion_response_parses() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2}
        }"#;
        let parsed: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hi there"));
    }
}
