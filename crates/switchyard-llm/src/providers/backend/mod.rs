//! HTTP backends behind the providers
//!
//! A [`ChatBackend`] knows how to send one prompt to one remote API and
//! nothing else. Admission, retries and usage accounting live in the
//! providers that wrap it.

mod ollama;
mod openai_compat;
mod scripted;

pub use ollama::OllamaBackend;
pub(crate) use openai_compat::status_error;
pub use openai_compat::OpenAiCompatBackend;
pub use scripted::ScriptedBackend;

use crate::error::Result;

/// One completion call
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCall {
    /// Remote model name
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// Completion token ceiling
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// Reply to a completion call
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    /// Generated text
    pub text: String,
    /// Model that answered, as reported by the backend
    pub model: String,
    /// Prompt tokens reported by the backend
    pub input_tokens: Option<u32>,
    /// Completion tokens reported by the backend
    pub output_tokens: Option<u32>,
}

impl ChatReply {
    /// Reply without usage figures
    pub fn text(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            input_tokens: None,
            output_tokens: None,
        }
    }

    /// Attach reported usage
    #[must_use]
    pub fn with_usage(mut self, input_tokens: u32, output_tokens: u32) -> Self {
        self.input_tokens = Some(input_tokens);
        self.output_tokens = Some(output_tokens);
        self
    }
}

/// Transport to a single remote API
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Base URL, for status output
    fn endpoint(&self) -> &str;

    /// Send one completion request
    async fn chat(&self, call: &ChatCall) -> Result<ChatReply>;

    /// Liveness probe
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
