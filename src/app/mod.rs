//! Application wiring
//!
//! Loads configuration, opens the ledger and builds the router.

pub mod config;
pub mod loader;
pub mod providers;

pub use config::AppConfig;
pub use loader::load_config;

use anyhow::{Context, Result};
use switchyard_core::LedgerStore;
use switchyard_llm::{RateLimiter, Router, RoutingTable};
use tracing::info;

/// Everything a command needs
pub struct App {
    pub ledger: LedgerStore,
    pub router: Router,
}

impl App {
    /// Open the ledger and build the router from configuration
    pub async fn build(config: AppConfig, dry_run: bool) -> Result<Self> {
        let path = config.ledger.resolve_path();
        let ledger = LedgerStore::from_path(&path)
            .await
            .with_context(|| format!("Failed to open ledger at {}", path.display()))?;
        info!(path = %path.display(), "Ledger opened");

        let limiter = RateLimiter::new(ledger.clone(), config.limiter);
        let retry = config.router.retry.to_retry_config();
        let providers = providers::resolve_providers(&config.providers, &limiter, &retry, dry_run)?;

        let rules = RoutingTable::from_rules(config.routing.rules);
        let router = Router::new(providers, rules, config.router);

        Ok(Self { ledger, router })
    }

    /// Release the ledger connection
    pub async fn close(self) {
        self.ledger.close().await;
    }
}
