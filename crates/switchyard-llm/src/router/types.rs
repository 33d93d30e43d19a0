//! Core types for request routing
//!
//! Category and Priority describe a task; the admission, decision and query
//! types carry one request through a provider.

use crate::error::Rejection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Category
// ============================================================================

/// Task category, drives which routing rule applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Short factual lookups
    QuickAnswer,
    /// General reasoning (default)
    Reasoning,
    /// Writing or modifying code
    CodeGeneration,
    /// High-stakes structured analysis
    CriticalAnalysis,
    /// Explanations, summaries and guides
    Documentation,
    /// Introspective analysis of the calling system itself
    SelfReflection,
}

impl Category {
    /// Every category, in table order
    pub const ALL: [Category; 6] = [
        Category::QuickAnswer,
        Category::Reasoning,
        Category::CodeGeneration,
        Category::CriticalAnalysis,
        Category::Documentation,
        Category::SelfReflection,
    ];

    /// Snake-case name used in configuration and telemetry
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::QuickAnswer => "quick_answer",
            Self::Reasoning => "reasoning",
            Self::CodeGeneration => "code_generation",
            Self::CriticalAnalysis => "critical_analysis",
            Self::Documentation => "documentation",
            Self::SelfReflection => "self_reflection",
        }
    }

    /// Position in [`Category::ALL`]
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::QuickAnswer => 0,
            Self::Reasoning => 1,
            Self::CodeGeneration => 2,
            Self::CriticalAnalysis => 3,
            Self::Documentation => 4,
            Self::SelfReflection => 5,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown category '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

// ============================================================================
// Priority
// ============================================================================

/// Relative importance of a category's requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Background or cheap work
    Low,
    /// Normal work
    #[default]
    Medium,
    /// Work worth paying for
    High,
}

// ============================================================================
// Admission
// ============================================================================

/// Input to a provider's admission check
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionRequest {
    /// Estimated prompt tokens (in the provider's own units)
    pub prompt_tokens: u32,
    /// Completion tokens the request may use
    pub max_tokens: u32,
    /// Requested model variant, if any
    pub model_variant: Option<String>,
}

impl AdmissionRequest {
    /// Create an admission request without a model variant
    #[must_use]
    pub fn new(prompt_tokens: u32, max_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            max_tokens,
            model_variant: None,
        }
    }

    /// Request a specific model variant
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.model_variant = Some(variant.into());
        self
    }

    /// Tokens the request could consume in the minute window
    #[must_use]
    pub fn window_tokens(&self) -> u64 {
        u64::from(self.prompt_tokens) + u64::from(self.max_tokens)
    }
}

/// Outcome of a provider's admission check
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// The provider can take the request right now
    Accepted,
    /// The provider declines, with the reason
    Rejected(Rejection),
}

impl Admission {
    /// True for [`Admission::Accepted`]
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

// ============================================================================
// Decision, request and result
// ============================================================================

/// Provider choice for one request, handed to the provider's query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    /// Provider ID
    pub provider_id: String,
    /// Model variant requested from the provider
    pub model_variant: Option<String>,
    /// Completion token ceiling
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Priority inherited from the routing rule
    pub priority: Priority,
    /// True when forced onto a local provider after every candidate declined
    pub degraded: bool,
}

/// One query sent to a provider
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Prompt text
    pub prompt: String,
    /// Estimated prompt tokens (in the provider's own units)
    pub prompt_tokens: u32,
    /// Completion token ceiling
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Requested model variant, if any
    pub model_variant: Option<String>,
}

impl QueryRequest {
    /// Create a query with no model variant
    #[must_use]
    pub fn new(prompt: impl Into<String>, prompt_tokens: u32, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            prompt_tokens,
            max_tokens,
            temperature,
            model_variant: None,
        }
    }

    /// Build the query described by a route decision
    #[must_use]
    pub fn from_decision(prompt: &str, prompt_tokens: u32, decision: &RouteDecision) -> Self {
        Self {
            prompt: prompt.to_string(),
            prompt_tokens,
            max_tokens: decision.max_tokens,
            temperature: decision.temperature,
            model_variant: decision.model_variant.clone(),
        }
    }

    /// Request a specific model variant
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.model_variant = Some(variant.into());
        self
    }
}

/// Successful provider response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Generated text
    pub text: String,
    /// Provider that served the request
    pub provider: String,
    /// Model that served the request
    pub model: String,
    /// Prompt tokens actually billed
    pub input_tokens: u32,
    /// Completion tokens actually billed
    pub output_tokens: u32,
    /// Cost of the request (USD)
    pub cost: f64,
}

impl QueryResult {
    /// Input plus output tokens
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        u64::from(self.input_tokens) + u64::from(self.output_tokens)
    }
}
