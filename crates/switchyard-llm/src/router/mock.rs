//! Mock inference provider for testing
//!
//! Admission and query outcomes are scripted; every call is remembered so
//! tests can assert on what the router sent.

use super::provider::{InferenceProvider, ProviderDescriptor, ProviderKind, ProviderStatus};
use super::types::{Admission, AdmissionRequest, QueryRequest, QueryResult};
use crate::error::{Error, Rejection, Result};
use crate::limiter::WindowUsage;
use crate::token::{estimate_heuristic, Tokenizer};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    rejection: Option<Rejection>,
    results: VecDeque<Result<String>>,
    admissions: Vec<AdmissionRequest>,
    queries: Vec<QueryRequest>,
}

/// A mock provider that returns queued results or an echo of the prompt.
#[derive(Debug, Clone)]
pub struct MockProvider {
    descriptor: ProviderDescriptor,
    kind: ProviderKind,
    tokenizer: Tokenizer,
    capacity: u64,
    delay: Option<Duration>,
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    /// Create a free mock provider with a 128k context window.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            descriptor: ProviderDescriptor::new(id, 128_000),
            kind,
            tokenizer: Tokenizer::Heuristic,
            capacity: 1_000_000,
            delay: None,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Replace the descriptor, keeping the ID.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: ProviderDescriptor) -> Self {
        let id = std::mem::take(&mut self.descriptor.id);
        self.descriptor = ProviderDescriptor { id, ..descriptor };
        self
    }

    /// Set the context window.
    #[must_use]
    pub fn with_context_window(mut self, tokens: u32) -> Self {
        self.descriptor.context_window = tokens;
        self
    }

    /// Set the advertised tokenizer.
    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Set the reported capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sleep this long inside every query.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Decline every admission with this rejection.
    pub fn reject(&self, rejection: Rejection) {
        self.with_state(|s| s.rejection = Some(rejection));
    }

    /// Accept admissions again.
    pub fn accept(&self) {
        self.with_state(|s| s.rejection = None);
    }

    /// Queue a reply text.
    pub fn push_reply(&self, text: impl Into<String>) {
        let text = text.into();
        self.with_state(|s| s.results.push_back(Ok(text)));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: Error) {
        self.with_state(|s| s.results.push_back(Err(error)));
    }

    /// Admission requests seen so far.
    #[must_use]
    pub fn admissions(&self) -> Vec<AdmissionRequest> {
        self.with_state(|s| s.admissions.clone())
    }

    /// Queries received so far.
    #[must_use]
    pub fn queries(&self) -> Vec<QueryRequest> {
        self.with_state(|s| s.queries.clone())
    }
}

#[async_trait::async_trait]
impl InferenceProvider for MockProvider {
    fn id(&self) -> &str {
        &self.descriptor.id
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn tokenizer(&self) -> Tokenizer {
        self.tokenizer
    }

    async fn admit(&self, request: &AdmissionRequest) -> Admission {
        let rejection = self.with_state(|s| {
            s.admissions.push(request.clone());
            s.rejection.clone()
        });

        if request.prompt_tokens > self.descriptor.context_window {
            return Admission::Rejected(Rejection::ContextTooLarge {
                prompt_tokens: request.prompt_tokens,
                reserve: 0,
                limit: self.descriptor.context_window,
            });
        }

        match rejection {
            Some(rejection) => Admission::Rejected(rejection),
            None => Admission::Accepted,
        }
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryResult> {
        let queued = self.with_state(|s| {
            s.queries.push(request.clone());
            s.results.pop_front()
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let text = match queued {
            Some(result) => result?,
            None => format!("[{}] {}", self.descriptor.id, request.prompt),
        };
        let output_tokens = estimate_heuristic(&text).min(request.max_tokens);
        let cost = self
            .descriptor
            .pricing()
            .cost(request.prompt_tokens, output_tokens);

        Ok(QueryResult {
            text,
            provider: self.descriptor.id.clone(),
            model: "mock-model".to_string(),
            input_tokens: request.prompt_tokens,
            output_tokens,
            cost,
        })
    }

    fn estimate_cost(&self, prompt_tokens: u32, max_tokens: u32, _model_variant: Option<&str>) -> f64 {
        self.descriptor.pricing().cost(prompt_tokens, max_tokens)
    }

    async fn available_capacity(&self) -> u64 {
        self.capacity
    }

    async fn status(&self) -> ProviderStatus {
        ProviderStatus {
            id: self.descriptor.id.clone(),
            kind: self.kind,
            context_window: self.descriptor.context_window,
            available_capacity: self.capacity,
            window: WindowUsage::default(),
            today: None,
            details: serde_json::json!({ "mock": true }),
        }
    }
}
