//! Switchyard LLM - Request Routing and Admission Control
//!
//! This crate decides where a natural-language task runs:
//! - Classifier: Ordered phrase matching from task text to category
//! - Token: Heuristic and tiktoken-based prompt sizing
//! - Limiter: Sliding-window RPM/TPM checks and the daily ledger front
//! - Providers: Rate-quota, budget-metered and local providers over HTTP
//! - Router: Rule table, candidate chain, fallback and degraded mode
//! - Telemetry: Route outcome log and aggregate statistics

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod classifier;
pub mod error;
pub mod limiter;
pub mod pricing;
pub mod providers;
pub mod router;
pub mod telemetry;
pub mod token;
pub mod util;

pub use classifier::{classify, CategoryMatcher, TaskClassifier};
pub use error::{CandidateAttempt, Error, Rejection, Result, RouterError};
pub use limiter::{LimiterConfig, ProviderQuota, RateLimiter, UsageWindow, WindowUsage};
pub use pricing::TokenPricing;
pub use router::{
    Admission, AdmissionRequest, Category, InferenceProvider, MockProvider, Priority,
    ProviderConfig, ProviderDescriptor, ProviderKind, ProviderStatus, QueryRequest, QueryResult,
    RetryPolicy, RouteDecision, Router, RouterConfig, RoutingRule, RoutingTable,
};
pub use telemetry::{RouteRecord, RouterStats, TelemetryLog};
pub use token::{count_tokens, estimate_heuristic, TokenEstimator, Tokenizer};

// Re-export provider types
pub use providers::{
    build_dry_run_provider, build_provider, BudgetMeteredConfig, BudgetMeteredProvider,
    LocalConfig, LocalProvider, RateQuotaConfig, RateQuotaProvider,
};
