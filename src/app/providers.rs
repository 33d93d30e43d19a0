//! Provider resolution
//!
//! Builds and registers every enabled provider from configuration.

use anyhow::Result;
use std::sync::Arc;
use switchyard_core::RetryConfig;
use switchyard_llm::{
    build_dry_run_provider, build_provider, InferenceProvider, ProviderConfig, RateLimiter,
};
use tracing::{debug, info, warn};

/// Build the enabled providers, in configuration order
///
/// A provider that cannot be built (usually a missing API key) is skipped
/// with a warning; the rest still route.
pub fn resolve_providers(
    configs: &[ProviderConfig],
    limiter: &RateLimiter,
    retry: &RetryConfig,
    dry_run: bool,
) -> Result<Vec<Arc<dyn InferenceProvider>>> {
    let mut providers = Vec::with_capacity(configs.len());

    for config in configs {
        if !config.enabled() {
            debug!(provider = %config.id(), "Provider disabled");
            continue;
        }

        let built = if dry_run {
            build_dry_run_provider(config, limiter, retry)
        } else {
            build_provider(config, limiter, retry)
        };

        match built {
            Ok(provider) => {
                info!(
                    provider = %provider.id(),
                    kind = %provider.kind(),
                    context_window = provider.context_window(),
                    dry_run,
                    "Registered provider"
                );
                providers.push(provider);
            }
            Err(e) => warn!(provider = %config.id(), error = %e, "Provider not available"),
        }
    }

    if providers.is_empty() {
        warn!("No providers registered; every request will fail");
    }

    Ok(providers)
}
