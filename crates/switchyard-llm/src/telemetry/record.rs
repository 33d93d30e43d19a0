//! Route records and statistics

use crate::router::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the router reports about one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteOutcome {
    /// Category the request was routed under
    pub category: Option<Category>,
    /// Heuristic prompt estimate
    pub estimated_tokens: u32,
    /// Head of the candidate chain
    pub first_choice: Option<String>,
    /// Provider that served the request
    pub provider: Option<String>,
    /// Error code on failure
    pub error_code: Option<String>,
    /// Candidates passed over before the serving one
    pub fallback_depth: u32,
    /// Forced onto a local provider
    pub degraded: bool,
    /// Wall time from classification to result
    pub latency_ms: u64,
    /// Prompt tokens billed
    pub input_tokens: u32,
    /// Completion tokens billed
    pub output_tokens: u32,
    /// Cost (USD)
    pub cost: f64,
    /// Providers queried that failed
    pub failed_providers: Vec<String>,
}

/// A single route record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    /// Record ID
    pub id: u64,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Category
    pub category: Option<Category>,
    /// Heuristic prompt estimate
    pub estimated_tokens: u32,
    /// Head of the candidate chain
    pub first_choice: Option<String>,
    /// Serving provider
    pub provider: Option<String>,
    /// Was the request successful?
    pub success: bool,
    /// Error code on failure
    pub error_code: Option<String>,
    /// Candidates passed over before the serving one
    pub fallback_depth: u32,
    /// Forced onto a local provider
    pub degraded: bool,
    /// Latency in milliseconds
    pub latency_ms: u64,
    /// Prompt tokens billed
    pub input_tokens: u32,
    /// Completion tokens billed
    pub output_tokens: u32,
    /// Cost (USD)
    pub cost: f64,
    /// Providers queried that failed
    pub failed_providers: Vec<String>,
}

impl RouteRecord {
    pub(crate) fn from_outcome(id: u64, outcome: RouteOutcome) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            category: outcome.category,
            estimated_tokens: outcome.estimated_tokens,
            first_choice: outcome.first_choice,
            success: outcome.error_code.is_none(),
            provider: outcome.provider,
            error_code: outcome.error_code,
            fallback_depth: outcome.fallback_depth,
            degraded: outcome.degraded,
            latency_ms: outcome.latency_ms,
            input_tokens: outcome.input_tokens,
            output_tokens: outcome.output_tokens,
            cost: outcome.cost,
            failed_providers: outcome.failed_providers,
        }
    }
}

/// Per-provider statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    /// Requests served
    pub served: u64,
    /// Queries that failed after retries
    pub failed_attempts: u64,
    /// Tokens billed
    pub total_tokens: u64,
    /// Cost (USD)
    pub total_cost: f64,
}

/// Per-category statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    /// Requests routed
    pub requests: u64,
    /// Requests that succeeded
    pub successful: u64,
}

/// Aggregated route statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterStats {
    /// Total requests
    pub total_requests: u64,
    /// Successful requests
    pub successful_requests: u64,
    /// Failed requests
    pub failed_requests: u64,
    /// Successful share of requests (percent)
    pub success_rate: f64,
    /// Usage by provider
    pub by_provider: BTreeMap<String, ProviderStats>,
    /// Usage by category
    pub by_category: BTreeMap<Category, CategoryStats>,
    /// Times each first-choice provider was passed over
    pub fallback_counts: BTreeMap<String, u64>,
    /// Requests served in degraded mode
    pub degraded_requests: u64,
    /// Failures by error code
    pub error_counts: BTreeMap<String, u64>,
    /// Cost (USD)
    pub total_cost: f64,
    /// Average latency (ms)
    pub avg_latency_ms: f64,
    /// Registered providers
    pub active_providers: Vec<String>,
}

impl RouterStats {
    pub(crate) fn add(&mut self, record: &RouteRecord) {
        self.total_requests += 1;
        self.total_cost += record.cost;

        if record.success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }

        if let Some(category) = record.category {
            let stats = self.by_category.entry(category).or_default();
            stats.requests += 1;
            if record.success {
                stats.successful += 1;
            }
        }

        if record.success {
            if let Some(provider) = &record.provider {
                let stats = self.by_provider.entry(provider.clone()).or_default();
                stats.served += 1;
                stats.total_tokens +=
                    u64::from(record.input_tokens) + u64::from(record.output_tokens);
                stats.total_cost += record.cost;

                if let Some(first) = &record.first_choice {
                    if first != provider {
                        *self.fallback_counts.entry(first.clone()).or_default() += 1;
                    }
                }
            }
        }

        for failed in &record.failed_providers {
            self.by_provider
                .entry(failed.clone())
                .or_default()
                .failed_attempts += 1;
        }

        if record.degraded {
            self.degraded_requests += 1;
        }

        if let Some(code) = &record.error_code {
            *self.error_counts.entry(code.clone()).or_default() += 1;
        }
    }

    pub(crate) fn finish(&mut self, total_latency_ms: u64) {
        if self.total_requests > 0 {
            self.success_rate =
                self.successful_requests as f64 / self.total_requests as f64 * 100.0;
            self.avg_latency_ms = total_latency_ms as f64 / self.total_requests as f64;
        }
    }
}
