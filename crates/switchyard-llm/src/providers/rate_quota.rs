//! Rate-Quota provider
//!
//! A hosted API with a free tier: several model variants, each with its own
//! request and token ceilings per minute, plus a daily request cap shared by
//! all variants. Usage from every variant lands in one window; admission
//! checks that window against the requested variant's ceilings.


use super::backend::{ChatBackend, ChatCall};
use super::call::CallContext;
use crate::error::{Error, Rejection, Result};
use crate::limiter::{DailyCheck, ProviderQuota, RateLimiter};
use crate::pricing::TokenPricing;
use crate::router::{
    Admission, AdmissionRequest, InferenceProvider, ProviderDescriptor, ProviderKind,
    ProviderStatus, QueryRequest, QueryResult,
};
use crate::token::Tokenizer;
use crate::util::mask_api_key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use switchyard_core::RetryConfig;
use tracing::{debug, instrument};

/// Completion tokens kept free below the minute ceiling when sizing a query
const HEADROOM_MARGIN: u64 = 100;

/// Smallest completion budget worth sending
const MIN_COMPLETION_TOKENS: u64 = 100;

/// Limits and price of one model variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVariant {
    /// Remote model name
    pub model: String,
    /// Cost per token, input and output alike (USD)
    pub cost_per_token: f64,
    /// Tokens per minute ceiling
    pub tokens_per_minute: u32,
    /// Requests per minute ceiling
    #[serde(default = "default_variant_rpm")]
    pub requests_per_minute: u32,
    /// Context window
    pub context_window: u32,
}

fn default_variant_rpm() -> u32 {
    30
}

impl ModelVariant {
    /// Per-token prices
    #[must_use]
    pub fn pricing(&self) -> TokenPricing {
        TokenPricing::flat(self.cost_per_token)
    }
}

/// Rate-Quota provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateQuotaConfig {
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
    /// Variant used when none (or an unknown one) is requested
    pub default_variant: String,
    /// Model variants by name
    pub variants: BTreeMap<String, ModelVariant>,
    /// Requests per day over all variants
    pub daily_request_limit: u64,
    /// Tokens reserved for the response in the context check
    pub response_reserve: u32,
    /// Request timeout (seconds)
    pub timeout_secs: u64,
    /// Tokenizer used to size prompts
    pub tokenizer: Tokenizer,
}

impl Default for RateQuotaConfig {
    fn default() -> Self {
        let mut variants = BTreeMap::new();
        variants.insert(
            "reasoning".to_string(),
            ModelVariant {
                model: "llama-3.1-70b-versatile".to_string(),
                cost_per_token: 0.000_000_59,
                tokens_per_minute: 12_000,
                requests_per_minute: 30,
                context_window: 128_000,
            },
        );
        variants.insert(
            "tooling".to_string(),
            ModelVariant {
                model: "llama3-groq-8b-8192-tool-use-preview".to_string(),
                cost_per_token: 0.000_000_19,
                tokens_per_minute: 20_000,
                requests_per_minute: 30,
                context_window: 8192,
            },
        );

        Self {
            id: "groq".to_string(),
            enabled: true,
            api_key: String::new(),
            api_key_env: "GROQ_API_KEY".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            default_variant: "reasoning".to_string(),
            variants,
            daily_request_limit: 14_400,
            response_reserve: 1000,
            timeout_secs: 30,
            tokenizer: Tokenizer::Cl100k,
        }
    }
}

// SECURITY: Custom Debug implementation to mask API key
impl fmt::Debug for RateQuotaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateQuotaConfig")
            .field("id", &self.id)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("default_variant", &self.default_variant)
            .field("variants", &self.variants)
            .field("daily_request_limit", &self.daily_request_limit)
            .finish()
    }
}

impl RateQuotaConfig {
    /// Descriptor built from the default variant and the largest context window
    pub fn descriptor(&self) -> Result<ProviderDescriptor> {
        let default = self.variants.get(&self.default_variant).ok_or_else(|| {
            Error::NotConfigured(format!(
                "{}: default variant '{}' is not defined",
                self.id, self.default_variant
            ))
        })?;
        let context_window = self
            .variants
            .values()
            .map(|v| v.context_window)
            .max()
            .unwrap_or(default.context_window);

        Ok(ProviderDescriptor::new(self.id.clone(), context_window)
            .with_pricing(default.pricing())
            .with_rate_limits(
                Some(default.requests_per_minute),
                Some(default.tokens_per_minute),
            )
            .with_daily_request_limit(self.daily_request_limit))
    }
}

/// Provider with per-variant minute ceilings
pub struct RateQuotaProvider {
    config: RateQuotaConfig,
    default_variant: ModelVariant,
    descriptor: ProviderDescriptor,
    backend: Arc<dyn ChatBackend>,
    quota: Arc<ProviderQuota>,
    retry: RetryConfig,
}

impl RateQuotaProvider {
    /// Create the provider and register it with the limiter
    pub fn new(
        config: RateQuotaConfig,
        backend: Arc<dyn ChatBackend>,
        limiter: &RateLimiter,
        retry: RetryConfig,
    ) -> Result<Self> {
        let descriptor = config.descriptor()?;
        let default_variant = config
            .variants
            .get(&config.default_variant)
            .cloned()
            .ok_or_else(|| Error::NotConfigured(format!("{}: no default variant", config.id)))?;
        let quota = limiter.register(&descriptor);
        Ok(Self {
            config,
            default_variant,
            descriptor,
            backend,
            quota,
            retry,
        })
    }

    /// Resolve a variant name; unknown or missing names use the default
    fn variant(&self, name: Option<&str>) -> (&str, &ModelVariant) {
        if let Some((key, variant)) = name.and_then(|n| self.config.variants.get_key_value(n)) {
            return (key.as_str(), variant);
        }
        (self.config.default_variant.as_str(), &self.default_variant)
    }

    /// Tokens left under the variant's minute ceiling
    #[must_use]
    pub fn remaining_tokens(&self, variant: Option<&str>) -> u64 {
        let (_, v) = self.variant(variant);
        self.quota.remaining_tokens(v.tokens_per_minute)
    }
}

#[async_trait::async_trait]
impl InferenceProvider for RateQuotaProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::RateQuota
    }

    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn context_window_for(&self, model_variant: Option<&str>) -> u32 {
        self.variant(model_variant).1.context_window
    }

    fn tokenizer(&self) -> Tokenizer {
        self.config.tokenizer
    }

    async fn admit(&self, request: &AdmissionRequest) -> Admission {
        let (name, variant) = self.variant(request.model_variant.as_deref());

        let needed = u64::from(request.prompt_tokens) + u64::from(self.config.response_reserve);
        if needed > u64::from(variant.context_window) {
            debug!(provider = %self.config.id, variant = name, "prompt too large for variant");
            return Admission::Rejected(Rejection::ContextTooLarge {
                prompt_tokens: request.prompt_tokens,
                reserve: self.config.response_reserve,
                limit: variant.context_window,
            });
        }

        if !self.quota.check_rpm_with(Some(variant.requests_per_minute)) {
            return Admission::Rejected(Rejection::capacity(format!(
                "{} requests per minute reached for {}",
                variant.requests_per_minute, variant.model
            )));
        }

        if !self
            .quota
            .check_tpm_with(Some(variant.tokens_per_minute), request.window_tokens())
        {
            return Admission::Rejected(Rejection::capacity(format!(
                "{} tokens per minute would be exceeded for {}",
                variant.tokens_per_minute, variant.model
            )));
        }

        let cost = self.estimate_cost(request.prompt_tokens, request.max_tokens, Some(name));
        match self.quota.daily_check(cost).await {
            DailyCheck::Allowed => Admission::Accepted,
            DailyCheck::RequestLimit { used, limit } => Admission::Rejected(
                Rejection::capacity(format!("daily request limit reached ({}/{})", used, limit)),
            ),
            DailyCheck::BudgetLimit { spent, budget, .. } => Admission::Rejected(
                Rejection::budget(format!("daily budget spent ({:.6}/{:.6})", spent, budget)),
            ),
            DailyCheck::Unavailable(reason) => {
                Admission::Rejected(Rejection::unavailable(format!("ledger: {}", reason)))
            }
        }
    }

    #[instrument(skip(self, request), fields(provider = %self.config.id, variant = ?request.model_variant))]
    async fn query(&self, request: &QueryRequest) -> Result<QueryResult> {
        let (_, variant) = self.variant(request.model_variant.as_deref());

        let remaining = self.quota.remaining_tokens(variant.tokens_per_minute);
        let headroom = remaining.saturating_sub(u64::from(request.prompt_tokens) + HEADROOM_MARGIN);
        let max_tokens = u64::from(request.max_tokens).min(headroom);
        if max_tokens < MIN_COMPLETION_TOKENS {
            return Err(Error::InsufficientHeadroom(remaining));
        }

        let call = ChatCall {
            model: variant.model.clone(),
            prompt: request.prompt.clone(),
            max_tokens: u32::try_from(max_tokens).unwrap_or(request.max_tokens),
            temperature: request.temperature,
        };

        CallContext {
            provider: &self.config.id,
            backend: self.backend.as_ref(),
            quota: &self.quota,
            pricing: variant.pricing(),
            retry: &self.retry,
        }
        .execute(&call, request.prompt_tokens)
        .await
    }

    fn estimate_cost(&self, prompt_tokens: u32, max_tokens: u32, model_variant: Option<&str>) -> f64 {
        let (_, variant) = self.variant(model_variant);
        variant.pricing().cost(prompt_tokens, max_tokens)
    }

    async fn available_capacity(&self) -> u64 {
        self.config
            .variants
            .values()
            .map(|v| self.quota.remaining_tokens(v.tokens_per_minute))
            .min()
            .unwrap_or(0)
    }

    async fn status(&self) -> ProviderStatus {
        let variants: serde_json::Map<String, serde_json::Value> = self
            .config
            .variants
            .iter()
            .map(|(name, v)| {
                (
                    name.clone(),
                    serde_json::json!({
                        "model": v.model,
                        "tokens_per_minute": v.tokens_per_minute,
                        "requests_per_minute": v.requests_per_minute,
                        "context_window": v.context_window,
                        "remaining_tokens": self.quota.remaining_tokens(v.tokens_per_minute),
                    }),
                )
            })
            .collect();

        ProviderStatus {
            id: self.config.id.clone(),
            kind: self.kind(),
            context_window: self.context_window(),
            available_capacity: self.available_capacity().await,
            window: self.quota.window_usage(),
            today: self.quota.today().await.ok(),
            details: serde_json::json!({
                "endpoint": self.backend.endpoint(),
                "default_variant": self.config.default_variant,
                "variants": variants,
                "daily_request_limit": self.config.daily_request_limit,
            }),
        }
    }
}
