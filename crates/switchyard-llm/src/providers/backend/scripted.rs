//! Scripted backend for tests and dry runs

use super::{ChatBackend, ChatCall, ChatReply};
use crate::error::{Error, Result};
use crate::token::estimate_heuristic;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Backend that replays queued outcomes, then echoes the prompt
#[derive(Debug)]
pub struct ScriptedBackend {
    endpoint: String,
    script: Mutex<VecDeque<Result<ChatReply>>>,
    calls: Mutex<Vec<ChatCall>>,
    healthy: AtomicBool,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    /// Healthy backend with an empty script
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoint: "scripted://local".to_string(),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            healthy: AtomicBool::new(true),
        }
    }

    /// Queue a successful reply
    pub fn push_reply(&self, reply: ChatReply) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(reply));
    }

    /// Queue a failure
    pub fn push_error(&self, error: Error) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
    }

    /// Set the health probe outcome
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Calls received so far
    #[must_use]
    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn echo(call: &ChatCall) -> ChatReply {
        let text = format!("[{}] {}", call.model, call.prompt);
        let output = estimate_heuristic(&text).min(call.max_tokens);
        ChatReply::text(text, call.model.clone()).with_usage(estimate_heuristic(&call.prompt), output)
    }
}

#[async_trait::async_trait]
impl ChatBackend for ScriptedBackend {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn chat(&self, call: &ChatCall) -> Result<ChatReply> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call.clone());

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        next.unwrap_or_else(|| Ok(Self::echo(call)))
    }

    async fn health_check(&self) -> Result<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Network("scripted backend marked unhealthy".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(prompt: &str) -> ChatCall {
        ChatCall {
            model: "m".to_string(),
            prompt: prompt.to_string(),
            max_tokens: 100,
            temperature: 0.5,
        }
    }

    #[tokio::test]
    async fn test_replays_script_then_echoes() {
        let backend = ScriptedBackend::new();
        backend.push_error(Error::RateLimit);
        backend.push_reply(ChatReply::text("scripted", "m"));

        assert!(matches!(backend.chat(&call("a")).await, Err(Error::RateLimit)));
        assert_eq!(backend.chat(&call("b")).await.unwrap().text, "scripted");

        let echo = backend.chat(&call("hello world")).await.unwrap();
        assert_eq!(echo.text, "[m] hello world");
        assert_eq!(echo.input_tokens, Some(3));
        assert_eq!(backend.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_health_toggle() {
        let backend = ScriptedBackend::new();
        assert!(backend.health_check().await.is_ok());
        backend.set_healthy(false);
        assert!(backend.health_check().await.is_err());
    }
}
