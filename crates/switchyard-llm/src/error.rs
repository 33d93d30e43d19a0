//! Error types for switchyard-llm
//!
//! Two layers of failure exist. [`Error`] is what a single provider call
//! returns once its own retry policy gives up. [`RouterError`] is what the
//! router returns after walking the whole candidate chain, together with the
//! trail of every candidate it considered.

use crate::router::Category;
use serde::Serialize;
use switchyard_core::LedgerError;
use thiserror::Error;

/// Provider error type
#[derive(Debug, Error)]
pub enum Error {
    /// Provider not configured
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// Client-side API error (4xx other than 402/429)
    #[error("api error: {0}")]
    Api(String),

    /// Server-side API error (5xx)
    #[error("server error: {0}")]
    Server(String),

    /// Rate limit response from the remote endpoint
    #[error("rate limit exceeded")]
    RateLimit,

    /// The remote account cannot pay for the request
    #[error("payment required: {0}")]
    PaymentRequired(String),

    /// Not enough minute-window headroom left to send the request
    #[error("insufficient token headroom: {0} tokens left")]
    InsufficientHeadroom(u64),

    /// Invalid response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network error before the request reached the endpoint
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Ledger error
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl Error {
    /// Whether another attempt against the same provider may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Server(_) | Self::RateLimit | Self::Network(_) | Self::Timeout(_)
        )
    }

    /// Whether the request got far enough to count against the provider's usage
    #[must_use]
    pub fn reached_endpoint(&self) -> bool {
        matches!(
            self,
            Self::Api(_)
                | Self::Server(_)
                | Self::RateLimit
                | Self::PaymentRequired(_)
                | Self::InvalidResponse(_)
                | Self::Timeout(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Admission rejections
// ============================================================================

/// Why a provider declined (or failed) a request
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    /// Prompt plus reserved response budget does not fit the context window
    #[error("prompt of {prompt_tokens} tokens plus {reserve} reserved exceeds context window of {limit}")]
    ContextTooLarge {
        /// Estimated prompt tokens
        prompt_tokens: u32,
        /// Tokens reserved for the response
        reserve: u32,
        /// Context window of the provider or model variant
        limit: u32,
    },

    /// Request or token rate ceiling reached
    #[error("capacity exceeded: {reason}")]
    CapacityExceeded {
        /// Which ceiling was hit
        reason: String,
    },

    /// Monetary budget or remote balance insufficient
    #[error("budget exhausted: {reason}")]
    BudgetExhausted {
        /// Which budget was insufficient
        reason: String,
    },

    /// Health probe, balance probe or network failure
    #[error("provider unavailable: {reason}")]
    ProviderUnavailable {
        /// Failure detail
        reason: String,
    },
}

impl Rejection {
    /// Capacity rejection
    pub fn capacity(reason: impl Into<String>) -> Self {
        Self::CapacityExceeded {
            reason: reason.into(),
        }
    }

    /// Budget rejection
    pub fn budget(reason: impl Into<String>) -> Self {
        Self::BudgetExhausted {
            reason: reason.into(),
        }
    }

    /// Availability rejection
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            reason: reason.into(),
        }
    }

    /// Whether two rejections are of the same kind, ignoring details
    #[must_use]
    pub fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// One entry in the trail of candidates the router considered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateAttempt {
    /// Provider ID
    pub provider: String,
    /// Why the candidate did not serve the request
    pub rejection: Rejection,
    /// True if the provider was actually queried (and failed)
    pub queried: bool,
}

impl CandidateAttempt {
    /// Candidate declined at admission
    pub fn skipped(provider: impl Into<String>, rejection: Rejection) -> Self {
        Self {
            provider: provider.into(),
            rejection,
            queried: false,
        }
    }

    /// Candidate admitted the request but the query failed
    pub fn failed(provider: impl Into<String>, error: &Error) -> Self {
        Self {
            provider: provider.into(),
            rejection: Rejection::unavailable(error.to_string()),
            queried: true,
        }
    }
}

impl std::fmt::Display for CandidateAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = if self.queried { "failed" } else { "skipped" };
        write!(f, "{} {} ({})", self.provider, verb, self.rejection)
    }
}

fn summarize(attempts: &[CandidateAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Router errors
// ============================================================================

/// Terminal routing failure
#[derive(Debug, Error)]
pub enum RouterError {
    /// The prompt does not fit any candidate's context window
    #[error("prompt of {prompt_tokens} tokens exceeds every candidate's context window: {}", summarize(.attempts))]
    ContextTooLarge {
        /// Estimated prompt tokens
        prompt_tokens: u32,
        /// Candidate trail
        attempts: Vec<CandidateAttempt>,
    },

    /// Every candidate failed its admission checks
    #[error("no candidate has capacity: {}", summarize(.attempts))]
    CapacityExceeded {
        /// Candidate trail
        attempts: Vec<CandidateAttempt>,
    },

    /// Every candidate was out of budget or balance
    #[error("budget exhausted: {}", summarize(.attempts))]
    BudgetExhausted {
        /// Candidate trail
        attempts: Vec<CandidateAttempt>,
    },

    /// Every candidate was unreachable or unhealthy
    #[error("no provider available: {}", summarize(.attempts))]
    ProviderUnavailable {
        /// Candidate trail
        attempts: Vec<CandidateAttempt>,
    },

    /// The fallback chain was fully walked without a success
    #[error("all providers exhausted for {category}: {}", summarize(.attempts))]
    AllProvidersExhausted {
        /// Category being routed
        category: Category,
        /// Candidate trail
        attempts: Vec<CandidateAttempt>,
    },

    /// The caller's deadline elapsed
    #[error("deadline of {0}ms exceeded")]
    DeadlineExceeded(u64),

    /// Nothing to route to
    #[error("no providers registered")]
    NoProviders,
}

impl RouterError {
    /// Build the terminal error for a fully walked candidate chain
    ///
    /// When no candidate was ever queried the error names the admission
    /// failure: a single shared rejection kind maps to its own variant and a
    /// mix of kinds is reported as [`RouterError::CapacityExceeded`]. Once any
    /// candidate was queried and failed the result is
    /// [`RouterError::AllProvidersExhausted`].
    pub fn from_attempts(
        category: Category,
        prompt_tokens: u32,
        attempts: Vec<CandidateAttempt>,
    ) -> Self {
        let Some(first) = attempts.first() else {
            return Self::NoProviders;
        };

        if attempts.iter().any(|a| a.queried) {
            return Self::AllProvidersExhausted { category, attempts };
        }

        if !attempts.iter().all(|a| a.rejection.same_kind(&first.rejection)) {
            return Self::CapacityExceeded { attempts };
        }

        match first.rejection.clone() {
            Rejection::ContextTooLarge { .. } => Self::ContextTooLarge {
                prompt_tokens,
                attempts,
            },
            Rejection::CapacityExceeded { .. } => Self::CapacityExceeded { attempts },
            Rejection::BudgetExhausted { .. } => Self::BudgetExhausted { attempts },
            Rejection::ProviderUnavailable { .. } => Self::ProviderUnavailable { attempts },
        }
    }

    /// Stable identifier recorded in telemetry
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ContextTooLarge { .. } => "context_too_large",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::BudgetExhausted { .. } => "budget_exhausted",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::AllProvidersExhausted { .. } => "all_providers_exhausted",
            Self::DeadlineExceeded(_) => "deadline_exceeded",
            Self::NoProviders => "no_providers",
        }
    }

    /// Candidates considered before giving up
    #[must_use]
    pub fn attempts(&self) -> &[CandidateAttempt] {
        match self {
            Self::ContextTooLarge { attempts, .. }
            | Self::CapacityExceeded { attempts }
            | Self::BudgetExhausted { attempts }
            | Self::ProviderUnavailable { attempts }
            | Self::AllProvidersExhausted { attempts, .. } => attempts,
            Self::DeadlineExceeded(_) | Self::NoProviders => &[],
        }
    }
}
