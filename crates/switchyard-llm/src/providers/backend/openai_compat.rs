//! OpenAI-compatible chat completions backend
//!
//! Used for every hosted provider that speaks `POST /chat/completions`.

use super::{ChatBackend, ChatCall, ChatReply};
use crate::error::{Error, Result};
use crate::util::{mask_api_key, redact_secrets};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// System prompt sent ahead of every user prompt
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Bearer-authenticated chat completions client
pub struct OpenAiCompatBackend {
    client: Client,
    base_url: String,
    api_key: String,
    system_prompt: String,
    timeout: Duration,
}

// Keep the key out of debug output
impl fmt::Debug for OpenAiCompatBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl OpenAiCompatBackend {
    /// Create a backend for `base_url` (without the trailing `/chat/completions`)
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout,
        })
    }

    /// Override the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    fn send_error(&self, e: &reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.timeout.as_millis() as u64)
        } else {
            Error::Network(redact_secrets(&e.to_string()))
        }
    }
}

/// Map a non-success status and its body onto the error taxonomy
pub(crate) fn status_error(status: StatusCode, body: &str) -> Error {
    let detail = redact_secrets(body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimit,
        StatusCode::PAYMENT_REQUIRED => Error::PaymentRequired(detail),
        s if s.is_server_error() => Error::Server(format!("{}: {}", s, detail)),
        s => Error::Api(format!("{}: {}", s, detail)),
    }
}

#[async_trait::async_trait]
impl ChatBackend for OpenAiCompatBackend {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self, call), fields(model = %call.model, max_tokens = call.max_tokens))]
    async fn chat(&self, call: &ChatCall) -> Result<ChatReply> {
        let request = ChatRequest {
            model: &call.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &call.prompt,
                },
            ],
            max_tokens: call.max_tokens,
            temperature: call.temperature,
        };

        debug!(endpoint = %self.base_url, "Sending chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::InvalidResponse("no choices in response".to_string()))?;

        let mut reply = ChatReply::text(text, parsed.model.unwrap_or_else(|| call.model.clone()));
        if let Some(usage) = parsed.usage {
            reply = reply.with_usage(usage.prompt_tokens, usage.completion_tokens);
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            Error::RateLimit
        ));
        assert!(matches!(
            status_error(StatusCode::PAYMENT_REQUIRED, "insufficient balance"),
            Error::PaymentRequired(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, ""),
            Error::Server(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "bad key"),
            Error::Api(_)
        ));
    }

    #[test]
    fn test_error_bodies_are_redacted() {
        let err = status_error(
            StatusCode::UNAUTHORIZED,
            "invalid key gsk_abcdefghijklmnop supplied",
        );
        let message = err.to_string();
        assert!(!message.contains("gsk_abcdefghijklmnop"));
        assert!(message.contains("[redacted]"));
    }

    #[test]
    fn test_debug_masks_key() {
        let backend = OpenAiCompatBackend::new(
            "https://api.example.com/v1/",
            "gsk_1234567890abcdef",
            Duration::from_secs(5),
        )
        .unwrap();
        let debug = format!("{:?}", backend);
        assert!(!debug.contains("1234567890"));
        assert_eq!(backend.endpoint(), "https://api.example.com/v1");
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "m",
            messages: [
                ChatMessage {
                    role: "system",
                    content: DEFAULT_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: "hi",
                },
            ],
            max_tokens: 10,
            temperature: 0.5,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 10);
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "choices": [{"message": {"content": "4"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 1, "total_tokens": 13},
            "model": "llama"
        }"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("4"));
        assert_eq!(parsed.usage.as_ref().map(|u| u.prompt_tokens), Some(12));
    }
}
