//! Inference provider trait definition
//!
//! Every backend the router can dispatch to implements [`InferenceProvider`].
//! Provider-specific quirks (variant limits, balance caching, health probes)
//! stay behind this trait.

use super::types::{Admission, AdmissionRequest, QueryRequest, QueryResult};
use crate::error::Result;
use crate::limiter::WindowUsage;
use crate::pricing::TokenPricing;
use crate::token::Tokenizer;
use serde::{Deserialize, Serialize};
use std::fmt;
use switchyard_core::DailyUsage;

/// The three provider behaviors the router knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Remote API with per-variant request/token ceilings
    RateQuota,
    /// Remote API limited by money: daily budget plus a remote balance
    BudgetMetered,
    /// Local model server: free, gated by a health probe
    Local,
}

impl ProviderKind {
    /// Snake-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RateQuota => "rate_quota",
            Self::BudgetMetered => "budget_metered",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of a provider's costs and limits
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderDescriptor {
    /// Provider ID
    pub id: String,
    /// Cost per input token (USD)
    pub cost_per_input_token: f64,
    /// Cost per output token (USD)
    pub cost_per_output_token: f64,
    /// Largest usable context window (tokens)
    pub context_window: u32,
    /// Tokens per minute ceiling
    pub tokens_per_minute_limit: Option<u32>,
    /// Requests per minute ceiling
    pub requests_per_minute_limit: Option<u32>,
    /// Requests per day ceiling
    pub daily_request_limit: Option<u64>,
    /// Spend per day ceiling (USD)
    pub daily_budget: Option<f64>,
}

impl ProviderDescriptor {
    /// Free, unlimited provider with the given context window
    #[must_use]
    pub fn new(id: impl Into<String>, context_window: u32) -> Self {
        Self {
            id: id.into(),
            cost_per_input_token: 0.0,
            cost_per_output_token: 0.0,
            context_window,
            tokens_per_minute_limit: None,
            requests_per_minute_limit: None,
            daily_request_limit: None,
            daily_budget: None,
        }
    }

    /// Set per-token prices
    #[must_use]
    pub fn with_pricing(mut self, pricing: TokenPricing) -> Self {
        self.cost_per_input_token = pricing.input;
        self.cost_per_output_token = pricing.output;
        self
    }

    /// Set the per-minute ceilings
    #[must_use]
    pub fn with_rate_limits(mut self, rpm: Option<u32>, tpm: Option<u32>) -> Self {
        self.requests_per_minute_limit = rpm;
        self.tokens_per_minute_limit = tpm;
        self
    }

    /// Set the daily request ceiling
    #[must_use]
    pub fn with_daily_request_limit(mut self, limit: u64) -> Self {
        self.daily_request_limit = Some(limit);
        self
    }

    /// Set the daily budget
    #[must_use]
    pub fn with_daily_budget(mut self, budget: f64) -> Self {
        self.daily_budget = Some(budget);
        self
    }

    /// Per-token prices
    #[must_use]
    pub fn pricing(&self) -> TokenPricing {
        TokenPricing::new(self.cost_per_input_token, self.cost_per_output_token)
    }
}

/// Point-in-time view of a provider, for status output
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    /// Provider ID
    pub id: String,
    /// Provider kind
    pub kind: ProviderKind,
    /// Largest usable context window
    pub context_window: u32,
    /// Tokens the provider could still take this minute
    pub available_capacity: u64,
    /// Current minute usage
    pub window: WindowUsage,
    /// Today's ledger row, if readable
    pub today: Option<DailyUsage>,
    /// Provider-specific details
    pub details: serde_json::Value,
}

/// Trait for inference providers
#[async_trait::async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Provider ID (unique within a router)
    fn id(&self) -> &str;

    /// Provider kind
    fn kind(&self) -> ProviderKind;

    /// Static costs and limits
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Largest context window over all variants
    fn context_window(&self) -> u32 {
        self.descriptor().context_window
    }

    /// Context window of the variant a request names
    fn context_window_for(&self, _model_variant: Option<&str>) -> u32 {
        self.context_window()
    }

    /// Tokenizer used to size prompts for this provider
    fn tokenizer(&self) -> Tokenizer {
        Tokenizer::Heuristic
    }

    /// Admission decision with the reason for a rejection
    ///
    /// Never errors: any failure to decide is a rejection.
    async fn admit(&self, request: &AdmissionRequest) -> Admission;

    /// Whether the provider can take the request right now
    async fn can_handle(&self, request: &AdmissionRequest) -> bool {
        self.admit(request).await.is_accepted()
    }

    /// Send the query, retrying transient failures internally
    async fn query(&self, request: &QueryRequest) -> Result<QueryResult>;

    /// Worst-case cost of a request (USD)
    fn estimate_cost(&self, prompt_tokens: u32, max_tokens: u32, model_variant: Option<&str>) -> f64;

    /// Tokens left in the current minute, or a large sentinel when unmetered
    async fn available_capacity(&self) -> u64;

    /// Status snapshot
    async fn status(&self) -> ProviderStatus;
}
