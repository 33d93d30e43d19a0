//! Rate Limiter / Budget Ledger
//!
//! Admission control in two layers:
//! - an in-memory [`UsageWindow`] per provider for requests and tokens per
//!   minute, and
//! - the durable [`LedgerStore`] for per-day request counts and spend.
//!
//! Each provider's state lives in its own [`ProviderQuota`] behind its own
//! lock. The lock covers prune+check or prune+append only and is never held
//! across an `.await`.
//!
//! The checks are advisory. Nothing is reserved between a passing check and
//! the matching [`ProviderQuota::record`], so two concurrent callers can both
//! pass and briefly push a window over its ceiling. The overshoot ages out of
//! the window within a minute.

mod window;


pub use window::{UsageWindow, WindowUsage, WINDOW_SPAN};

use crate::router::ProviderDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use switchyard_core::ledger::{today, DailyUsage, LedgerStore, Result as LedgerResult};
use tracing::{debug, error, warn};

/// Safety margins subtracted from the per-minute ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Requests kept free below the RPM ceiling
    pub rpm_safety_buffer: u32,
    /// Tokens kept free below the TPM ceiling
    pub tpm_safety_buffer: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            rpm_safety_buffer: 3,
            tpm_safety_buffer: 1000,
        }
    }
}

/// Ceilings that apply to one provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QuotaLimits {
    /// Requests per minute
    pub requests_per_minute: Option<u32>,
    /// Tokens per minute
    pub tokens_per_minute: Option<u32>,
    /// Requests per day
    pub daily_requests: Option<u64>,
    /// Spend per day (USD)
    pub daily_budget: Option<f64>,
}

impl From<&ProviderDescriptor> for QuotaLimits {
    fn from(descriptor: &ProviderDescriptor) -> Self {
        Self {
            requests_per_minute: descriptor.requests_per_minute_limit,
            tokens_per_minute: descriptor.tokens_per_minute_limit,
            daily_requests: descriptor.daily_request_limit,
            daily_budget: descriptor.daily_budget,
        }
    }
}

/// Result of the daily ledger check
#[derive(Debug, Clone, PartialEq)]
pub enum DailyCheck {
    /// Within both daily limits
    Allowed,
    /// Daily request count reached
    RequestLimit {
        /// Requests recorded today
        used: u64,
        /// Daily request ceiling
        limit: u64,
    },
    /// Accrued spend plus the estimate would pass the daily budget
    BudgetLimit {
        /// Spend recorded today
        spent: f64,
        /// Estimated cost of the pending request
        estimated: f64,
        /// Daily budget
        budget: f64,
    },
    /// The ledger could not be read
    Unavailable(String),
}

impl DailyCheck {
    /// True for [`DailyCheck::Allowed`]
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

// ============================================================================
// ProviderQuota
// ============================================================================

/// Window and ledger access for a single provider
#[derive(Debug)]
pub struct ProviderQuota {
    provider: String,
    limits: QuotaLimits,
    buffers: LimiterConfig,
    window: Mutex<UsageWindow>,
    ledger: LedgerStore,
}

impl ProviderQuota {
    /// Create quota state for one provider
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        limits: QuotaLimits,
        buffers: LimiterConfig,
        ledger: LedgerStore,
    ) -> Self {
        Self {
            provider: provider.into(),
            limits,
            buffers,
            window: Mutex::new(UsageWindow::default()),
            ledger,
        }
    }

    /// Provider ID
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Configured ceilings
    #[must_use]
    pub fn limits(&self) -> &QuotaLimits {
        &self.limits
    }

    fn with_window<T>(&self, f: impl FnOnce(&mut UsageWindow) -> T) -> T {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut window)
    }

    /// Requests and tokens in the current minute
    #[must_use]
    pub fn window_usage(&self) -> WindowUsage {
        self.with_window(|w| w.usage(Instant::now()))
    }

    /// RPM check against the provider's own ceiling
    #[must_use]
    pub fn check_rpm(&self) -> bool {
        self.check_rpm_with(self.limits.requests_per_minute)
    }

    /// RPM check against an explicit ceiling (`None` means unlimited)
    #[must_use]
    pub fn check_rpm_with(&self, limit: Option<u32>) -> bool {
        self.check_rpm_at(limit, Instant::now())
    }

    pub(crate) fn check_rpm_at(&self, limit: Option<u32>, now: Instant) -> bool {
        let Some(limit) = limit else {
            return true;
        };
        let threshold = limit.saturating_sub(self.buffers.rpm_safety_buffer);
        let current = self.with_window(|w| w.usage(now).requests);

        if current >= threshold {
            warn!(
                provider = %self.provider,
                current,
                limit,
                "request rate limit approached"
            );
            return false;
        }
        true
    }

    /// TPM check against the provider's own ceiling
    #[must_use]
    pub fn check_tpm(&self, estimated_tokens: u64) -> bool {
        self.check_tpm_with(self.limits.tokens_per_minute, estimated_tokens)
    }

    /// TPM check against an explicit ceiling (`None` means unlimited)
    #[must_use]
    pub fn check_tpm_with(&self, limit: Option<u32>, estimated_tokens: u64) -> bool {
        self.check_tpm_at(limit, estimated_tokens, Instant::now())
    }

    pub(crate) fn check_tpm_at(&self, limit: Option<u32>, estimated_tokens: u64, now: Instant) -> bool {
        let Some(limit) = limit else {
            return true;
        };
        let threshold = u64::from(limit.saturating_sub(self.buffers.tpm_safety_buffer));
        let current = self.with_window(|w| w.usage(now).tokens);

        if current + estimated_tokens > threshold {
            warn!(
                provider = %self.provider,
                current,
                limit,
                requested = estimated_tokens,
                "token rate limit would be exceeded"
            );
            return false;
        }
        true
    }

    /// Tokens left under an explicit ceiling in the current minute
    ///
    /// The safety buffer is not subtracted.
    #[must_use]
    pub fn remaining_tokens(&self, limit: u32) -> u64 {
        let used = self.window_usage().tokens;
        u64::from(limit).saturating_sub(used)
    }

    /// Daily request count and budget check
    ///
    /// Creates today's zero entry if absent. Ledger errors fail closed.
    pub async fn daily_check(&self, estimated_cost: f64) -> DailyCheck {
        let entry = match self.ledger.ensure_entry(today(), &self.provider).await {
            Ok(entry) => entry,
            Err(e) => {
                error!(provider = %self.provider, error = %e, "failed to read daily usage");
                return DailyCheck::Unavailable(e.to_string());
            }
        };

        if let Some(limit) = self.limits.daily_requests {
            if entry.request_count >= limit {
                warn!(
                    provider = %self.provider,
                    used = entry.request_count,
                    limit,
                    "daily request limit reached"
                );
                return DailyCheck::RequestLimit {
                    used: entry.request_count,
                    limit,
                };
            }
        }

        if let Some(budget) = self.limits.daily_budget {
            if entry.cost + estimated_cost > budget {
                warn!(
                    provider = %self.provider,
                    spent = entry.cost,
                    estimated = estimated_cost,
                    budget,
                    "daily budget would be exceeded"
                );
                return DailyCheck::BudgetLimit {
                    spent: entry.cost,
                    estimated: estimated_cost,
                    budget,
                };
            }
        }

        DailyCheck::Allowed
    }

    /// Boolean form of [`ProviderQuota::daily_check`]
    pub async fn check_daily(&self, estimated_cost: f64) -> bool {
        self.daily_check(estimated_cost).await.is_allowed()
    }

    pub(crate) fn push_window(&self, now: Instant, tokens: u64) {
        self.with_window(|w| w.push(now, tokens));
    }

    /// Record one request in the window and the ledger
    pub async fn try_record(&self, tokens: u64, cost: f64) -> LedgerResult<DailyUsage> {
        self.with_window(|w| w.push(Instant::now(), tokens));
        self.ledger
            .increment(today(), &self.provider, tokens, cost)
            .await
    }

    /// Record one request; ledger failures are logged
    pub async fn record(&self, tokens: u64, cost: f64) {
        match self.try_record(tokens, cost).await {
            Ok(entry) => debug!(
                provider = %self.provider,
                tokens,
                cost,
                requests_today = entry.request_count,
                "usage recorded"
            ),
            Err(e) => error!(
                provider = %self.provider,
                error = %e,
                "failed to record usage"
            ),
        }
    }

    /// Today's ledger row (zero row if nothing was recorded yet)
    pub async fn today(&self) -> LedgerResult<DailyUsage> {
        self.ledger.today_entry(&self.provider).await
    }
}

// ============================================================================
// RateLimiter
// ============================================================================

/// Registry of per-provider quotas sharing one ledger
#[derive(Debug)]
pub struct RateLimiter {
    ledger: LedgerStore,
    config: LimiterConfig,
    quotas: RwLock<HashMap<String, Arc<ProviderQuota>>>,
}

impl RateLimiter {
    /// Create a limiter over a ledger
    #[must_use]
    pub fn new(ledger: LedgerStore, config: LimiterConfig) -> Self {
        Self {
            ledger,
            config,
            quotas: RwLock::new(HashMap::new()),
        }
    }

    /// Register a provider, returning its quota
    ///
    /// Registering the same ID twice returns the existing quota.
    pub fn register(&self, descriptor: &ProviderDescriptor) -> Arc<ProviderQuota> {
        let mut quotas = self.quotas.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(quotas.entry(descriptor.id.clone()).or_insert_with(|| {
            Arc::new(ProviderQuota::new(
                descriptor.id.clone(),
                QuotaLimits::from(descriptor),
                self.config,
                self.ledger.clone(),
            ))
        }))
    }

    /// Quota for a registered provider
    #[must_use]
    pub fn quota(&self, provider: &str) -> Option<Arc<ProviderQuota>> {
        self.quotas
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(provider)
            .cloned()
    }

    /// RPM check by provider ID; unknown providers fail
    #[must_use]
    pub fn check_rpm(&self, provider: &str) -> bool {
        self.quota(provider).is_some_and(|q| q.check_rpm())
    }

    /// TPM check by provider ID; unknown providers fail
    #[must_use]
    pub fn check_tpm(&self, provider: &str, estimated_tokens: u64) -> bool {
        self.quota(provider)
            .is_some_and(|q| q.check_tpm(estimated_tokens))
    }

    /// Daily check by provider ID; unknown providers fail
    pub async fn check_daily(&self, provider: &str, estimated_cost: f64) -> bool {
        match self.quota(provider) {
            Some(quota) => quota.check_daily(estimated_cost).await,
            None => false,
        }
    }

    /// Record usage by provider ID; unknown providers are ignored
    pub async fn record(&self, provider: &str, tokens: u64, cost: f64) {
        match self.quota(provider) {
            Some(quota) => quota.record(tokens, cost).await,
            None => warn!(provider, "usage recorded for unregistered provider"),
        }
    }

    /// Shared ledger
    #[must_use]
    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    /// Safety buffers
    #[must_use]
    pub fn config(&self) -> LimiterConfig {
        self.config
    }
}
