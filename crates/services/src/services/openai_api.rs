//! Thin client for the OpenAI chat completions endpoint.
//!
//! The suggestion pipeline makes one model call per batch, so the client
//! favors robustness over throughput: transient failures are retried with
//! backoff, and replies that wrap their JSON in markdown fences are
//! tolerated.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};
use utils::text::truncate;

use super::config::OpenAiConfig;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_TOKENS: u32 = 2048;
const CHAT_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Error)]
pub enum OpenAiApiError {
    #[error("OPENAI_API_KEY is not set")]
    NoApiKey,
    #[error("the API rejected the configured key")]
    KeyRejected,
    #[error("request timed out")]
    TimedOut,
    #[error("network failure: {0}")]
    Network(String),
    #[error("throttled by the API")]
    Throttled,
    #[error("unexpected status {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("unusable reply: {0}")]
    BadPayload(String),
}

impl OpenAiApiError {
    /// Worth another attempt; the request itself was fine.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TimedOut | Self::Network(_) | Self::Throttled => true,
            Self::Status { status, .. } => *status >= 500,
            Self::NoApiKey | Self::KeyRejected | Self::BadPayload(_) => false,
        }
    }
}

/// One turn of the conversation. OpenAI carries the system prompt as the
/// first message in the list rather than a separate field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn with_role(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_owned(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role("user", content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChoiceContent,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceContent {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

impl ChatResponse {
    /// Content of the first choice; `None` when the model produced nothing.
    pub fn first_content(&self) -> Option<&str> {
        let choice = self.choices.first()?;
        choice.message.content.as_deref()
    }

    /// True when the reply was cut short by the token budget.
    fn hit_token_limit(&self) -> bool {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref())
            == Some("length")
    }
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// HTTP client bound to one model and one token budget.
#[derive(Debug, Clone)]
pub struct OpenAiApiClient {
    http: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiApiClient {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Result<Self, OpenAiApiError> {
        let http = Client::builder()
            .timeout(CHAT_TIMEOUT)
            .user_agent(concat!("seo-pm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OpenAiApiError::Network(e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            model,
            max_tokens,
        })
    }

    /// Key from `OPENAI_API_KEY`, defaults for everything else.
    pub fn from_env() -> Result<Self, OpenAiApiError> {
        Self::new(read_api_key()?, DEFAULT_MODEL.to_owned(), DEFAULT_MAX_TOKENS)
    }

    /// Key from `OPENAI_API_KEY`, model and token budget from the config.
    pub fn from_config(config: &OpenAiConfig) -> Result<Self, OpenAiApiError> {
        Self::new(read_api_key()?, config.model.clone(), config.max_tokens)
    }

    /// Run one chat completion, retrying transient failures with backoff.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<ChatResponse, OpenAiApiError> {
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages,
        };

        let response = (|| async { self.dispatch(&request).await })
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(30))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(OpenAiApiError::is_transient)
            .notify(|err, delay| warn!(%err, ?delay, "chat completion failed, backing off"))
            .await?;

        debug!(
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "chat completion finished"
        );
        Ok(response)
    }

    async fn dispatch(&self, request: &ChatRequest) -> Result<ChatResponse, OpenAiApiError> {
        let res = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = res.status();
        if status.is_success() {
            return res
                .json::<ChatResponse>()
                .await
                .map_err(|e| OpenAiApiError::BadPayload(e.to_string()));
        }
        match status {
            StatusCode::UNAUTHORIZED => Err(OpenAiApiError::KeyRejected),
            StatusCode::TOO_MANY_REQUESTS => Err(OpenAiApiError::Throttled),
            _ => Err(OpenAiApiError::Status {
                status: status.as_u16(),
                detail: res.text().await.unwrap_or_default(),
            }),
        }
    }

    /// One prompt in, the reply text out.
    pub async fn completion(
        &self,
        prompt: &str,
        system: Option<String>,
    ) -> Result<String, OpenAiApiError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        let response = self.chat(messages).await?;
        if response.hit_token_limit() {
            warn!("model reply was cut off by the token budget");
        }
        match response.first_content() {
            Some(text) => Ok(text.to_owned()),
            None => Err(OpenAiApiError::BadPayload("reply held no text".to_owned())),
        }
    }

    /// One prompt in, parsed JSON out.
    pub async fn completion_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: Option<String>,
    ) -> Result<T, OpenAiApiError> {
        let raw = self.completion(prompt, system).await?;
        let json = peel_code_fence(&raw);
        if json.is_empty() {
            error!("model replied with empty text where JSON was expected");
            return Err(OpenAiApiError::BadPayload("empty reply".to_owned()));
        }
        serde_json::from_str(json).map_err(|e| {
            error!(
                parse_error = %e,
                preview = %truncate(json, 300),
                "model reply was not the requested JSON"
            );
            OpenAiApiError::BadPayload(format!("{e}; reply began: {}", truncate(json, 300)))
        })
    }
}

fn read_api_key() -> Result<String, OpenAiApiError> {
    std::env::var("OPENAI_API_KEY").map_err(|_| OpenAiApiError::NoApiKey)
}

fn from_reqwest(e: reqwest::Error) -> OpenAiApiError {
    if e.is_timeout() {
        OpenAiApiError::TimedOut
    } else {
        OpenAiApiError::Network(e.to_string())
    }
}

/// The model is asked for bare JSON but tends to wrap it in a markdown fence
/// anyway. Return the fenced body when one exists, the trimmed input
/// otherwise.
fn peel_code_fence(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(tagged) = trimmed.find("```json") {
        let body = &trimmed[tagged + "```json".len()..];
        if let Some(close) = body.find("```") {
            return body[..close].trim();
        }
    }

    if let Some(open) = trimmed.find("```") {
        let mut body = &trimmed[open + 3..];
        // A bare fence may still open with a language tag; drop that line.
        if let Some(eol) = body.find('\n') {
            body = &body[eol + 1..];
        }
        if let Some(close) = body.find("```") {
            return body[..close].trim();
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_json_is_returned_trimmed() {
        assert_eq!(
            peel_code_fence("  {\"pillar\": \"technical\"}\n"),
            "{\"pillar\": \"technical\"}"
        );
    }

    #[test]
    fn tagged_fence_is_peeled() {
        let reply = "Here are the tasks:\n```json\n{\"suggestions\": []}\n```\nLet me know!";
        assert_eq!(peel_code_fence(reply), "{\"suggestions\": []}");
    }

    #[test]
    fn untagged_fence_is_peeled() {
        assert_eq!(peel_code_fence("```\n[1, 2, 3]\n```"), "[1, 2, 3]");
    }

    #[test]
    fn unclosed_fence_is_left_alone() {
        let reply = "```json\n{\"oops\": true}";
        assert_eq!(peel_code_fence(reply), reply);
    }

    #[test]
    fn transient_errors_are_retried_permanent_ones_not() {
        assert!(OpenAiApiError::Throttled.is_transient());
        assert!(
            OpenAiApiError::Status {
                status: 503,
                detail: String::new()
            }
            .is_transient()
        );
        assert!(
            !OpenAiApiError::Status {
                status: 400,
                detail: String::new()
            }
            .is_transient()
        );
        assert!(!OpenAiApiError::KeyRejected.is_transient());
    }

    #[test]
    fn first_content_reads_the_first_choice() {
        let response: ChatResponse = serde_json::from_str(
            r#"{
                "choices": [
                    {"message": {"content": "{\"suggestions\": []}"}, "finish_reason": "stop"}
                ],
                "usage": {"prompt_tokens": 412, "completion_tokens": 36}
            }"#,
        )
        .unwrap();
        assert_eq!(response.first_content(), Some("{\"suggestions\": []}"));
        assert!(!response.hit_token_limit());
    }

    #[test]
    fn empty_choices_and_truncation_are_detected() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [], "usage": {"prompt_tokens": 8, "completion_tokens": 0}}"#,
        )
        .unwrap();
        assert_eq!(response.first_content(), None);
        assert!(!response.hit_token_limit());

        let cut: ChatResponse = serde_json::from_str(
            r#"{
                "choices": [{"message": {"content": "{\"sug"}, "finish_reason": "length"}],
                "usage": {"prompt_tokens": 400, "completion_tokens": 2048}
            }"#,
        )
        .unwrap();
        assert!(cut.hit_token_limit());
    }
}
