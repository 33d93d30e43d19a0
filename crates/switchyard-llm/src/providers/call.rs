//! Shared query path for every provider
//!
//! Each attempt runs inside the retry loop and is accounted for on its own:
//! a success records the reported usage, a failure that reached the remote
//! endpoint records the prompt tokens at zero cost.

use super::backend::{ChatBackend, ChatCall};
use crate::error::{Error, Result};
use crate::limiter::ProviderQuota;
use crate::pricing::TokenPricing;
use crate::router::QueryResult;
use crate::token::estimate_heuristic;
use switchyard_core::{retry_with_backoff, RetryConfig, RetryError};
use tracing::{debug, info};

/// Everything one provider call needs besides the call itself
#[derive(Clone, Copy)]
pub(crate) struct CallContext<'a> {
    pub provider: &'a str,
    pub backend: &'a dyn ChatBackend,
    pub quota: &'a ProviderQuota,
    pub pricing: TokenPricing,
    pub retry: &'a RetryConfig,
}

impl CallContext<'_> {
    /// Run the call under the retry policy
    pub(crate) async fn execute(self, call: &ChatCall, prompt_tokens: u32) -> Result<QueryResult> {
        retry_with_backoff(
            self.retry,
            || async move { self.attempt(call, prompt_tokens).await },
            Error::is_transient,
        )
        .await
        .map_err(RetryError::into_inner)
    }

    async fn attempt(self, call: &ChatCall, prompt_tokens: u32) -> Result<QueryResult> {
        match self.backend.chat(call).await {
            Ok(reply) => {
                let input_tokens = reply.input_tokens.unwrap_or(prompt_tokens);
                let output_tokens = reply
                    .output_tokens
                    .unwrap_or_else(|| estimate_heuristic(&reply.text));
                let cost = self.pricing.cost(input_tokens, output_tokens);

                self.quota
                    .record(u64::from(input_tokens) + u64::from(output_tokens), cost)
                    .await;

                info!(
                    provider = %self.provider,
                    model = %reply.model,
                    input_tokens,
                    output_tokens,
                    cost,
                    "query completed"
                );

                Ok(QueryResult {
                    text: reply.text,
                    provider: self.provider.to_string(),
                    model: reply.model,
                    input_tokens,
                    output_tokens,
                    cost,
                })
            }
            Err(e) => {
                if e.reached_endpoint() {
                    self.quota.record(u64::from(prompt_tokens), 0.0).await;
                }
                debug!(provider = %self.provider, error = %e, "query attempt failed");
                Err(e)
            }
        }
    }
}
