//! Concrete providers and their HTTP backends
//!
//! - [`RateQuotaProvider`]: per-variant request and token ceilings
//! - [`BudgetMeteredProvider`]: daily budget plus remote balance
//! - [`LocalProvider`]: free, gated by a health probe
//!
//! All three share one query path: retry with backoff around a
//! [`ChatBackend`] call, with every attempt that reached the endpoint
//! recorded against the provider's quota.

/// HTTP backends
pub mod backend;
/// Budget-Metered provider
pub mod budget;
/// Unmetered Local provider
pub mod local;
/// Rate-Quota provider
pub mod rate_quota;

mod call;

pub use backend::{ChatBackend, ChatCall, ChatReply, OllamaBackend, OpenAiCompatBackend, ScriptedBackend};
pub use budget::{
    BalanceProbe, BudgetMeteredConfig, BudgetMeteredProvider, FixedBalance, HttpBalanceProbe,
};
pub use local::{LocalConfig, LocalProvider, UNMETERED_CAPACITY};
pub use rate_quota::{ModelVariant, RateQuotaConfig, RateQuotaProvider};

use crate::error::{Error, Result};
use crate::limiter::RateLimiter;
use crate::router::{InferenceProvider, ProviderConfig};
use crate::util::resolve_api_key;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::RetryConfig;

/// Balance reported by dry-run budget providers
const DRY_RUN_BALANCE: f64 = 10.0;

fn api_key(id: &str, explicit: &str, env_var: &str) -> Result<String> {
    resolve_api_key(explicit, env_var)
        .ok_or_else(|| Error::NotConfigured(format!("{}: {} is not set", id, env_var)))
}

/// Build a provider talking to its real backend
///
/// Hosted providers need an API key, either inline or from their
/// configured environment variable.
pub fn build_provider(
    config: &ProviderConfig,
    limiter: &RateLimiter,
    retry: &RetryConfig,
) -> Result<Arc<dyn InferenceProvider>> {
    let provider: Arc<dyn InferenceProvider> = match config {
        ProviderConfig::RateQuota(c) => {
            let key = api_key(&c.id, &c.api_key, &c.api_key_env)?;
            let backend =
                OpenAiCompatBackend::new(&c.base_url, key, Duration::from_secs(c.timeout_secs))?;
            Arc::new(RateQuotaProvider::new(
                c.clone(),
                Arc::new(backend),
                limiter,
                retry.clone(),
            )?)
        }
        ProviderConfig::BudgetMetered(c) => {
            let key = api_key(&c.id, &c.api_key, &c.api_key_env)?;
            let backend = OpenAiCompatBackend::new(
                &c.base_url,
                key.clone(),
                Duration::from_secs(c.timeout_secs),
            )?;
            let probe = HttpBalanceProbe::new(
                &c.balance_url,
                key,
                &c.balance_pointer,
                Duration::from_secs(c.balance_timeout_secs),
            )?;
            Arc::new(BudgetMeteredProvider::new(
                c.clone(),
                Arc::new(backend),
                Arc::new(probe),
                limiter,
                retry.clone(),
            ))
        }
        ProviderConfig::Local(c) => {
            let backend = OllamaBackend::new(
                &c.endpoint,
                Duration::from_secs(c.timeout_secs),
                Duration::from_secs(c.health_timeout_secs),
            )?;
            Arc::new(LocalProvider::new(
                c.clone(),
                Arc::new(backend),
                limiter,
                retry.clone(),
            ))
        }
    };
    Ok(provider)
}

/// Build a provider whose backend echoes prompts instead of calling out
///
/// Admission behaves as configured, so dry runs exercise the same limits
/// and ledger as real runs.
pub fn build_dry_run_provider(
    config: &ProviderConfig,
    limiter: &RateLimiter,
    retry: &RetryConfig,
) -> Result<Arc<dyn InferenceProvider>> {
    let provider: Arc<dyn InferenceProvider> = match config {
        ProviderConfig::RateQuota(c) => Arc::new(RateQuotaProvider::new(
            c.clone(),
            Arc::new(ScriptedBackend::new()),
            limiter,
            retry.clone(),
        )?),
        ProviderConfig::BudgetMetered(c) => Arc::new(BudgetMeteredProvider::new(
            c.clone(),
            Arc::new(ScriptedBackend::new()),
            Arc::new(FixedBalance(DRY_RUN_BALANCE)),
            limiter,
            retry.clone(),
        )),
        ProviderConfig::Local(c) => Arc::new(LocalProvider::new(
            c.clone(),
            Arc::new(ScriptedBackend::new()),
            limiter,
            retry.clone(),
        )),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::LimiterConfig;
    use crate::router::ProviderKind;
    use switchyard_core::LedgerStore;

    async fn limiter() -> RateLimiter {
        RateLimiter::new(LedgerStore::in_memory().await.unwrap(), LimiterConfig::default())
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let limiter = limiter().await;
        let config = ProviderConfig::RateQuota(RateQuotaConfig {
            api_key_env: "SWITCHYARD_TEST_UNSET_KEY".to_string(),
            ..RateQuotaConfig::default()
        });
        let result = build_provider(&config, &limiter, &RetryConfig::no_retry());
        assert!(matches!(result, Err(Error::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_inline_key_builds_provider() {
        let limiter = limiter().await;
        let config = ProviderConfig::BudgetMetered(BudgetMeteredConfig {
            api_key: "vn_test_key_123456".to_string(),
            ..BudgetMeteredConfig::default()
        });
        let provider = build_provider(&config, &limiter, &RetryConfig::no_retry()).unwrap();
        assert_eq!(provider.id(), "venice");
        assert_eq!(provider.kind(), ProviderKind::BudgetMetered);
        assert!(limiter.quota("venice").is_some());
    }

    #[tokio::test]
    async fn test_dry_run_providers_answer_locally() {
        let limiter = limiter().await;
        let retry = RetryConfig::no_retry();
        let providers: Vec<_> = ProviderConfig::defaults()
            .iter()
            .map(|c| build_dry_run_provider(c, &limiter, &retry).unwrap())
            .collect();
        assert_eq!(providers.len(), 3);

        let venice = &providers[1];
        assert!(venice
            .can_handle(&crate::router::AdmissionRequest::new(10, 100))
            .await);
        let result = venice
            .query(&crate::router::QueryRequest::new("ping", 1, 100, 0.7))
            .await
            .unwrap();
        assert!(result.text.contains("ping"));
    }
}
