//! Token estimation
//!
//! Providers with a known vocabulary get an exact count from tiktoken's
//! cl100k_base encoding. Everything else falls back to a word-count
//! heuristic (`ceil(words * 1.3)`), which never fails.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::warn;

/// Global tokenizer instance (initialized once, thread-safe)
static CL100K: LazyLock<Option<CoreBPE>> = LazyLock::new(|| match cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        warn!(error = %e, "cl100k_base unavailable, falling back to heuristic counts");
        None
    }
});

/// Heuristic estimate: whitespace-separated words times 1.3, rounded up
#[must_use]
pub fn estimate_heuristic(text: &str) -> u32 {
    let words = text.split_whitespace().count() as u64;
    // ceil(words * 13 / 10) in integer arithmetic
    let estimate = (words * 13 + 9) / 10;
    u32::try_from(estimate).unwrap_or(u32::MAX)
}

/// Exact cl100k_base count, or the heuristic if the encoding is unavailable
#[must_use]
pub fn count_tokens(text: &str) -> u32 {
    match CL100K.as_ref() {
        Some(bpe) => {
            u32::try_from(bpe.encode_with_special_tokens(text).len()).unwrap_or(u32::MAX)
        }
        None => estimate_heuristic(text),
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

/// Counting strategy a provider advertises
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tokenizer {
    /// Word-count heuristic
    #[default]
    Heuristic,
    /// tiktoken cl100k_base
    Cl100k,
}

impl Tokenizer {
    /// Count tokens in a string
    #[must_use]
    pub fn count(&self, text: &str) -> u32 {
        match self {
            Self::Heuristic => estimate_heuristic(text),
            Self::Cl100k => count_tokens(text),
        }
    }
}

// ============================================================================
// Token Estimator
// ============================================================================

/// Maps provider IDs to their tokenizer
#[derive(Debug, Clone, Default)]
pub struct TokenEstimator {
    tokenizers: HashMap<String, Tokenizer>,
}

impl TokenEstimator {
    /// Create an estimator that only knows the heuristic
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider's tokenizer
    pub fn register(&mut self, provider: impl Into<String>, tokenizer: Tokenizer) {
        self.tokenizers.insert(provider.into(), tokenizer);
    }

    /// Builder form of [`register`](Self::register)
    #[must_use]
    pub fn with_tokenizer(mut self, provider: impl Into<String>, tokenizer: Tokenizer) -> Self {
        self.register(provider, tokenizer);
        self
    }

    /// Tokenizer used for a provider
    #[must_use]
    pub fn tokenizer_for(&self, provider: Option<&str>) -> Tokenizer {
        provider
            .and_then(|id| self.tokenizers.get(id))
            .copied()
            .unwrap_or_default()
    }

    /// Estimate the size of `text`, delegating to the provider's tokenizer when known
    #[must_use]
    pub fn estimate(&self, text: &str, provider: Option<&str>) -> u32 {
        self.tokenizer_for(provider).count(text)
    }
}
