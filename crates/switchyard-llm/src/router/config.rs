//! Configuration types for routing
//!
//! This module contains the orchestrator settings and the tagged provider
//! configuration used to build providers at startup.

use crate::providers::{BudgetMeteredConfig, LocalConfig, RateQuotaConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use switchyard_core::RetryConfig;

// ============================================================================
// Router Configuration
// ============================================================================

/// In-provider retry settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per query, including the first
    pub attempts: u32,
    /// Delay before the first retry (ms)
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay (ms)
    pub max_delay_ms: u64,
    /// Growth factor between delays
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay_ms: 2000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Convert to the retry loop's configuration
    #[must_use]
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(self.attempts)
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_backoff_multiplier(self.multiplier)
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Prompt estimate above which the largest-context provider goes first
    pub large_prompt_threshold: u32,
    /// Upper bound on any rule's `max_tokens`
    pub max_tokens_ceiling: u32,
    /// Floor for the halved token budget after a failed query
    pub fallback_min_tokens: u32,
    /// Token ceiling for degraded local execution
    pub degraded_max_tokens: u32,
    /// In-provider retry settings
    pub retry: RetryPolicy,
    /// Telemetry records kept in memory
    pub telemetry_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            large_prompt_threshold: 8000,
            max_tokens_ceiling: 4000,
            fallback_min_tokens: 256,
            degraded_max_tokens: 2000,
            retry: RetryPolicy::default(),
            telemetry_capacity: 10_000,
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for one provider, tagged by kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Provider with per-variant request/token ceilings
    RateQuota(RateQuotaConfig),
    /// Provider limited by daily budget and remote balance
    BudgetMetered(BudgetMeteredConfig),
    /// Local model server
    Local(LocalConfig),
}

impl ProviderConfig {
    /// Provider ID
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::RateQuota(c) => &c.id,
            Self::BudgetMetered(c) => &c.id,
            Self::Local(c) => &c.id,
        }
    }

    /// Whether the provider should be registered
    #[must_use]
    pub fn enabled(&self) -> bool {
        match self {
            Self::RateQuota(c) => c.enabled,
            Self::BudgetMetered(c) => c.enabled,
            Self::Local(c) => c.enabled,
        }
    }

    /// The three default providers
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::RateQuota(RateQuotaConfig::default()),
            Self::BudgetMetered(BudgetMeteredConfig::default()),
            Self::Local(LocalConfig::default()),
        ]
    }
}
