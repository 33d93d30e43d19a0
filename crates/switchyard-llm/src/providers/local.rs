//! Unmetered Local provider
//!
//! A model server on the same host: free and without external limits, but
//! only admitted while its health probe passes. The probe result is cached
//! briefly so admission does not hit the server on every request.


use super::backend::{ChatBackend, ChatCall};
use super::call::CallContext;
use crate::error::{Error, Rejection, Result};
use crate::limiter::{ProviderQuota, RateLimiter};
use crate::pricing::TokenPricing;
use crate::router::{
    Admission, AdmissionRequest, InferenceProvider, ProviderDescriptor, ProviderKind,
    ProviderStatus, QueryRequest, QueryResult,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use switchyard_core::RetryConfig;
use tracing::{instrument, warn};

/// Capacity reported by an unmetered provider
pub const UNMETERED_CAPACITY: u64 = 1_000_000;

fn default_endpoint() -> String {
    std::env::var("OLLAMA_ENDPOINT").unwrap_or_else(|_| "http://localhost:11434".to_string())
}

fn default_model() -> String {
    std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2:1b".to_string())
}

/// Local provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Provider ID
    pub id: String,
    /// Whether the provider is registered
    pub enabled: bool,
    /// Server URL
    pub endpoint: String,
    /// Local model name
    pub model: String,
    /// Conservative context ceiling
    pub context_window: u32,
    /// Tokens reserved for the response in the context check
    pub response_reserve: u32,
    /// Upper bound on completion tokens per request
    pub max_predict: u32,
    /// Request timeout (seconds)
    pub timeout_secs: u64,
    /// Health probe timeout (seconds)
    pub health_timeout_secs: u64,
    /// How long a probe result is trusted (seconds)
    pub health_ttl_secs: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            id: "ollama".to_string(),
            enabled: true,
            endpoint: default_endpoint(),
            model: default_model(),
            context_window: 32_000,
            response_reserve: 1000,
            max_predict: 4000,
            timeout_secs: 60,
            health_timeout_secs: 5,
            health_ttl_secs: 30,
        }
    }
}

impl LocalConfig {
    /// Static descriptor
    #[must_use]
    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor::new(self.id.clone(), self.context_window)
    }
}

#[derive(Debug, Default)]
struct HealthCache {
    healthy: Option<bool>,
    checked_at: Option<Instant>,
    last_error: Option<String>,
}

/// Local model server provider
pub struct LocalProvider {
    config: LocalConfig,
    descriptor: ProviderDescriptor,
    backend: Arc<dyn ChatBackend>,
    quota: Arc<ProviderQuota>,
    retry: RetryConfig,
    health: Mutex<HealthCache>,
}

impl LocalProvider {
    /// Create the provider and register it with the limiter
    pub fn new(
        config: LocalConfig,
        backend: Arc<dyn ChatBackend>,
        limiter: &RateLimiter,
        retry: RetryConfig,
    ) -> Self {
        let descriptor = config.descriptor();
        let quota = limiter.register(&descriptor);
        Self {
            config,
            descriptor,
            backend,
            quota,
            retry,
            health: Mutex::new(HealthCache::default()),
        }
    }

    fn with_health<T>(&self, f: impl FnOnce(&mut HealthCache) -> T) -> T {
        let mut cache = self.health.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut cache)
    }

    fn set_health(&self, healthy: bool, error: Option<String>) {
        self.with_health(|c| {
            c.healthy = Some(healthy);
            c.checked_at = Some(Instant::now());
            c.last_error = error;
        });
    }

    /// Probe result, cached for the configured TTL
    pub async fn is_healthy(&self) -> bool {
        let ttl = Duration::from_secs(self.config.health_ttl_secs);
        let cached = self.with_health(|c| match (c.healthy, c.checked_at) {
            (Some(healthy), Some(at)) if at.elapsed() < ttl => Some(healthy),
            _ => None,
        });
        if let Some(healthy) = cached {
            return healthy;
        }

        match self.backend.health_check().await {
            Ok(()) => {
                self.set_health(true, None);
                true
            }
            Err(e) => {
                warn!(provider = %self.config.id, error = %e, "health probe failed");
                self.set_health(false, Some(e.to_string()));
                false
            }
        }
    }

    fn last_error(&self) -> Option<String> {
        self.with_health(|c| c.last_error.clone())
    }
}

#[async_trait::async_trait]
impl InferenceProvider for LocalProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn admit(&self, request: &AdmissionRequest) -> Admission {
        let needed = u64::from(request.prompt_tokens) + u64::from(self.config.response_reserve);
        if needed > u64::from(self.config.context_window) {
            return Admission::Rejected(Rejection::ContextTooLarge {
                prompt_tokens: request.prompt_tokens,
                reserve: self.config.response_reserve,
                limit: self.config.context_window,
            });
        }

        if !self.is_healthy().await {
            let reason = self
                .last_error()
                .unwrap_or_else(|| "health probe failed".to_string());
            return Admission::Rejected(Rejection::unavailable(reason));
        }

        Admission::Accepted
    }

    #[instrument(skip(self, request), fields(provider = %self.config.id, model = %self.config.model))]
    async fn query(&self, request: &QueryRequest) -> Result<QueryResult> {
        let call = ChatCall {
            model: self.config.model.clone(),
            prompt: request.prompt.clone(),
            max_tokens: request.max_tokens.min(self.config.max_predict),
            temperature: request.temperature,
        };

        let outcome = CallContext {
            provider: &self.config.id,
            backend: self.backend.as_ref(),
            quota: &self.quota,
            pricing: TokenPricing::free(),
            retry: &self.retry,
        }
        .execute(&call, request.prompt_tokens)
        .await;

        match &outcome {
            Ok(_) => self.set_health(true, None),
            Err(e @ Error::Network(_)) => self.set_health(false, Some(e.to_string())),
            Err(_) => {}
        }
        outcome
    }

    fn estimate_cost(&self, _prompt_tokens: u32, _max_tokens: u32, _model_variant: Option<&str>) -> f64 {
        0.0
    }

    async fn available_capacity(&self) -> u64 {
        UNMETERED_CAPACITY
    }

    async fn status(&self) -> ProviderStatus {
        let healthy = self.with_health(|c| c.healthy);
        ProviderStatus {
            id: self.config.id.clone(),
            kind: self.kind(),
            context_window: self.context_window(),
            available_capacity: self.available_capacity().await,
            window: self.quota.window_usage(),
            today: self.quota.today().await.ok(),
            details: serde_json::json!({
                "endpoint": self.backend.endpoint(),
                "model": self.config.model,
                "healthy": healthy,
                "last_error": self.last_error(),
            }),
        }
    }
}
