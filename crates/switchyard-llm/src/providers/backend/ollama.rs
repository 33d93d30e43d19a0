//! Ollama generate backend

use super::{ChatBackend, ChatCall, ChatReply};
use crate::error::{Error, Result};
use crate::util::redact_secrets;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Non-streaming client for a local Ollama server
#[derive(Debug)]
pub struct OllamaBackend {
    client: Client,
    endpoint: String,
    timeout: Duration,
    health_timeout: Duration,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
    top_p: f32,
    repeat_penalty: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl OllamaBackend {
    /// Create a backend for the server at `endpoint`
    pub fn new(endpoint: impl Into<String>, timeout: Duration, health_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            timeout,
            health_timeout,
        })
    }

    fn send_error(&self, e: &reqwest::Error) -> Error {
        if e.is_connect() {
            Error::Network(format!(
                "failed to connect to Ollama at {}: is it running?",
                self.endpoint
            ))
        } else if e.is_timeout() {
            Error::Timeout(self.timeout.as_millis() as u64)
        } else {
            Error::Network(redact_secrets(&e.to_string()))
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for OllamaBackend {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[instrument(skip(self, call), fields(model = %call.model, max_tokens = call.max_tokens))]
    async fn chat(&self, call: &ChatCall) -> Result<ChatReply> {
        let request = GenerateRequest {
            model: &call.model,
            prompt: &call.prompt,
            stream: false,
            options: GenerateOptions {
                temperature: call.temperature,
                num_predict: call.max_tokens,
                top_p: 0.9,
                repeat_penalty: 1.1,
            },
        };

        debug!(endpoint = %self.endpoint, "Sending generate request to Ollama");

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(super::status_error(status, &body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        Ok(ChatReply {
            text: parsed.response,
            model: parsed.model.unwrap_or_else(|| call.model.clone()),
            input_tokens: parsed.prompt_eval_count,
            output_tokens: parsed.eval_count,
        })
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.endpoint))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| self.send_error(&e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Api(format!(
                "Ollama health probe returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_options() {
        let request = GenerateRequest {
            model: "llama3.2:1b",
            prompt: "hello",
            stream: false,
            options: GenerateOptions {
                temperature: 0.3,
                num_predict: 2000,
                top_p: 0.9,
                repeat_penalty: 1.1,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 2000);
    }

    #[test]
    fn test_response_without_counts() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"response": "hi"}"#).unwrap();
        assert_eq!(parsed.response, "hi");
        assert!(parsed.prompt_eval_count.is_none());
        assert!(parsed.eval_count.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let backend = OllamaBackend::new(
            "http://127.0.0.1:9",
            Duration::from_secs(2),
            Duration::from_secs(1),
        )
        .unwrap();
        let err = backend.health_check().await.unwrap_err();
        assert!(matches!(err, Error::Network(_) | Error::Timeout(_)));
    }
}
