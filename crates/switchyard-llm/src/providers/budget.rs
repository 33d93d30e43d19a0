//! Budget-Metered provider
//!
//! A hosted API paid from a prepaid balance. It has no per-minute token
//! ceiling of its own; admission is bounded by a local daily budget kept in
//! the ledger and by the remote balance, which is fetched through a
//! [`BalanceProbe`] and cached for a few minutes.
//!
//! The balance check fails closed: if the probe errors and no fresh balance
//! is cached, the provider declines every request until a probe succeeds.


use super::backend::{status_error, ChatBackend, ChatCall};
use super::call::CallContext;
use crate::error::{Error, Rejection, Result};
use crate::limiter::{DailyCheck, ProviderQuota, RateLimiter};
use crate::pricing::TokenPricing;
use crate::router::{
    Admission, AdmissionRequest, InferenceProvider, ProviderDescriptor, ProviderKind,
    ProviderStatus, QueryRequest, QueryResult,
};
use crate::token::Tokenizer;
use crate::util::{mask_api_key, redact_secrets};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use switchyard_core::RetryConfig;
use tracing::{debug, info, instrument, warn};

/// Capacity reported when no balance has been fetched yet
const UNKNOWN_CAPACITY: u64 = 1_000_000;

// ============================================================================
// Balance probe
// ============================================================================

/// Source of the remote account balance
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait BalanceProbe: Send + Sync {
    /// Current balance in the provider's billing unit
    async fn fetch_balance(&self) -> Result<f64>;
}

/// Reads the balance from a JSON endpoint
pub struct HttpBalanceProbe {
    client: Client,
    url: String,
    api_key: String,
    pointer: String,
    timeout: Duration,
}

impl fmt::Debug for HttpBalanceProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBalanceProbe")
            .field("url", &self.url)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("pointer", &self.pointer)
            .finish()
    }
}

impl HttpBalanceProbe {
    /// Create a probe reading `pointer` (RFC 6901) from the body at `url`
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        pointer: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            pointer: pointer.into(),
            timeout,
        })
    }
}

/// Extract the balance from a probe response; a missing field reads as zero
pub(crate) fn balance_at(body: &serde_json::Value, pointer: &str) -> f64 {
    body.pointer(pointer)
        .and_then(serde_json::Value::as_f64)
        .unwrap_or(0.0)
}

#[async_trait::async_trait]
impl BalanceProbe for HttpBalanceProbe {
    async fn fetch_balance(&self) -> Result<f64> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.timeout.as_millis() as u64)
                } else {
                    Error::Network(redact_secrets(&e.to_string()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        Ok(balance_at(&body, &self.pointer))
    }
}

/// Probe that always reports the same balance
#[derive(Debug, Clone, Copy)]
pub struct FixedBalance(pub f64);

#[async_trait::async_trait]
impl BalanceProbe for FixedBalance {
    async fn fetch_balance(&self) -> Result<f64> {
        Ok(self.0)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Budget-Metered provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetMeteredConfig {
    /// Provider ID
    pub id: String,
    /// Whether the provider is registered
    pub enabled: bool,
    /// API key (empty means read `api_key_env`)
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// API base URL
    pub base_url: String,
    /// Remote model name
    pub model: String,
    /// Cost per prompt token (USD)
    pub cost_per_input_token: f64,
    /// Cost per completion token (USD)
    pub cost_per_output_token: f64,
    /// Context window
    pub context_window: u32,
    /// Spend per day (USD)
    pub daily_budget: f64,
    /// Local courtesy ceiling on requests per minute
    pub requests_per_minute: u32,
    /// Balance below which no request is admitted
    pub min_balance: f64,
    /// Balance endpoint
    pub balance_url: String,
    /// JSON pointer to the balance in the endpoint's response
    pub balance_pointer: String,
    /// How long a fetched balance stays fresh (seconds)
    pub balance_ttl_secs: u64,
    /// Balance probe timeout (seconds)
    pub balance_timeout_secs: u64,
    /// Tokens reserved for the response in the context check
    pub response_reserve: u32,
    /// Request timeout (seconds)
    pub timeout_secs: u64,
    /// Tokenizer used to size prompts
    pub tokenizer: Tokenizer,
}

impl Default for BudgetMeteredConfig {
    fn default() -> Self {
        Self {
            id: "venice".to_string(),
            enabled: true,
            api_key: String::new(),
            api_key_env: "VENICE_API_KEY".to_string(),
            base_url: "https://api.venice.ai/v1".to_string(),
            model: "deepseek-v3.2".to_string(),
            cost_per_input_token: 0.000_000_4,
            cost_per_output_token: 0.000_001,
            context_window: 128_000,
            daily_budget: 0.49,
            requests_per_minute: 60,
            min_balance: 0.1,
            balance_url: "https://api.venice.ai/api/v1/api_keys/rate_limits".to_string(),
            balance_pointer: "/data/balances/DIEM".to_string(),
            balance_ttl_secs: 300,
            balance_timeout_secs: 10,
            response_reserve: 1000,
            timeout_secs: 60,
            tokenizer: Tokenizer::Cl100k,
        }
    }
}

// SECURITY: Custom Debug implementation to mask API key
impl fmt::Debug for BudgetMeteredConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BudgetMeteredConfig")
            .field("id", &self.id)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("daily_budget", &self.daily_budget)
            .field("min_balance", &self.min_balance)
            .finish()
    }
}

impl BudgetMeteredConfig {
    /// Per-token prices
    #[must_use]
    pub fn pricing(&self) -> TokenPricing {
        TokenPricing::new(self.cost_per_input_token, self.cost_per_output_token)
    }

    /// Static descriptor
    #[must_use]
    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor::new(self.id.clone(), self.context_window)
            .with_pricing(self.pricing())
            .with_rate_limits(Some(self.requests_per_minute), None)
            .with_daily_budget(self.daily_budget)
    }
}

// ============================================================================
// Provider
// ============================================================================

#[derive(Debug, Default)]
struct BalanceCache {
    balance: Option<f64>,
    fetched_at: Option<Instant>,
}

impl BalanceCache {
    fn fresh(&self, ttl: Duration) -> Option<f64> {
        match (self.balance, self.fetched_at) {
            (Some(balance), Some(at)) if at.elapsed() < ttl => Some(balance),
            _ => None,
        }
    }
}

/// Provider limited by daily budget and remote balance
pub struct BudgetMeteredProvider {
    config: BudgetMeteredConfig,
    descriptor: ProviderDescriptor,
    backend: Arc<dyn ChatBackend>,
    probe: Arc<dyn BalanceProbe>,
    quota: Arc<ProviderQuota>,
    retry: RetryConfig,
    cache: Mutex<BalanceCache>,
    refresh: tokio::sync::Mutex<()>,
}

impl BudgetMeteredProvider {
    /// Create the provider and register it with the limiter
    pub fn new(
        config: BudgetMeteredConfig,
        backend: Arc<dyn ChatBackend>,
        probe: Arc<dyn BalanceProbe>,
        limiter: &RateLimiter,
        retry: RetryConfig,
    ) -> Self {
        let descriptor = config.descriptor();
        let quota = limiter.register(&descriptor);
        Self {
            config,
            descriptor,
            backend,
            probe,
            quota,
            retry,
            cache: Mutex::new(BalanceCache::default()),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.balance_ttl_secs)
    }

    fn with_cache<T>(&self, f: impl FnOnce(&mut BalanceCache) -> T) -> T {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut cache)
    }

    /// Balance from cache, refreshed through the probe once stale
    ///
    /// Concurrent callers that find the cache stale wait for a single probe.
    pub async fn balance(&self) -> Result<f64> {
        let ttl = self.ttl();
        if let Some(balance) = self.with_cache(|c| c.fresh(ttl)) {
            return Ok(balance);
        }

        let _refresh = self.refresh.lock().await;
        if let Some(balance) = self.with_cache(|c| c.fresh(ttl)) {
            return Ok(balance);
        }

        let balance = self.probe.fetch_balance().await.map_err(|e| {
            warn!(provider = %self.config.id, error = %e, "balance probe failed");
            e
        })?;

        info!(provider = %self.config.id, balance, "balance refreshed");
        self.with_cache(|c| {
            c.balance = Some(balance);
            c.fetched_at = Some(Instant::now());
        });
        Ok(balance)
    }

    /// Last fetched balance and its age, fresh or not
    #[must_use]
    pub fn cached_balance(&self) -> Option<(f64, Duration)> {
        self.with_cache(|c| match (c.balance, c.fetched_at) {
            (Some(balance), Some(at)) => Some((balance, at.elapsed())),
            _ => None,
        })
    }

    /// Forget the cached balance so the next admission probes again
    pub fn invalidate_balance(&self) {
        self.with_cache(|c| *c = BalanceCache::default());
    }

    fn debit(&self, cost: f64) {
        self.with_cache(|c| {
            if let Some(balance) = c.balance.as_mut() {
                *balance = (*balance - cost).max(0.0);
            }
        });
    }
}

#[async_trait::async_trait]
impl InferenceProvider for BudgetMeteredProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::BudgetMetered
    }

    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn tokenizer(&self) -> Tokenizer {
        self.config.tokenizer
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

        if !self.quota.check_rpm() {
            return Admission::Rejected(Rejection::capacity(format!(
                "{} requests per minute reached",
                self.config.requests_per_minute
            )));
        }

        let cost = self.estimate_cost(request.prompt_tokens, request.max_tokens, None);
        match self.quota.daily_check(cost).await {
            DailyCheck::Allowed => {}
            DailyCheck::BudgetLimit {
                spent,
                estimated,
                budget,
            } => {
                return Admission::Rejected(Rejection::budget(format!(
                    "daily budget {:.6} would be exceeded ({:.6} spent + {:.6} estimated)",
                    budget, spent, estimated
                )))
            }
            DailyCheck::RequestLimit { used, limit } => {
                return Admission::Rejected(Rejection::capacity(format!(
                    "daily request limit reached ({}/{})",
                    used, limit
                )))
            }
            DailyCheck::Unavailable(reason) => {
                return Admission::Rejected(Rejection::unavailable(format!("ledger: {}", reason)))
            }
        }

        let balance = match self.balance().await {
            Ok(balance) => balance,
            Err(e) => {
                return Admission::Rejected(Rejection::unavailable(format!(
                    "balance unknown: {}",
                    e
                )))
            }
        };

        if balance < self.config.min_balance || balance < cost {
            debug!(provider = %self.config.id, balance, cost, "balance insufficient");
            return Admission::Rejected(Rejection::budget(format!(
                "balance {:.4} insufficient (minimum {:.4}, estimated cost {:.6})",
                balance, self.config.min_balance, cost
            )));
        }

        Admission::Accepted
    }

    #[instrument(skip(self, request), fields(provider = %self.config.id))]
    async fn query(&self, request: &QueryRequest) -> Result<QueryResult> {
        let call = ChatCall {
            model: self.config.model.clone(),
            prompt: request.prompt.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let outcome = CallContext {
            provider: &self.config.id,
            backend: self.backend.as_ref(),
            quota: &self.quota,
            pricing: self.config.pricing(),
            retry: &self.retry,
        }
        .execute(&call, request.prompt_tokens)
        .await;

        match &outcome {
            Ok(result) => self.debit(result.cost),
            Err(Error::PaymentRequired(_)) => {
                warn!(provider = %self.config.id, "payment required, dropping cached balance");
                self.invalidate_balance();
            }
            Err(_) => {}
        }
        outcome
    }

    fn estimate_cost(&self, prompt_tokens: u32, max_tokens: u32, _model_variant: Option<&str>) -> f64 {
        self.config.pricing().cost(prompt_tokens, max_tokens)
    }

    async fn available_capacity(&self) -> u64 {
        let average = self.config.pricing().average();
        match self.cached_balance() {
            Some((balance, _)) if average > 0.0 => (balance / average) as u64,
            _ => UNKNOWN_CAPACITY,
        }
    }

    async fn status(&self) -> ProviderStatus {
        let cached = self.cached_balance();
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
                "daily_budget": self.config.daily_budget,
                "min_balance": self.config.min_balance,
                "balance": cached.map(|(b, _)| b),
                "balance_age_secs": cached.map(|(_, age)| age.as_secs()),
            }),
        }
    }
}
