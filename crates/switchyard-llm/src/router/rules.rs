//! Routing rule table
//!
//! One [`RoutingRule`] per [`Category`]. The table is built once at startup
//! and only read afterwards; lookup is total because missing categories are
//! filled from the built-in defaults.

use super::types::{Category, Priority};
use serde::{Deserialize, Serialize};

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.7
}

/// Default routing behavior for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Category this rule applies to
    pub category: Category,
    /// First provider to try
    pub preferred_provider: String,
    /// Providers tried next, in order
    #[serde(default)]
    pub fallback_providers: Vec<String>,
    /// Model variant requested from the provider
    #[serde(default)]
    pub model_variant: Option<String>,
    /// Completion token ceiling
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Request priority
    #[serde(default)]
    pub priority: Priority,
}

impl RoutingRule {
    /// Create a rule with no fallbacks and default parameters
    pub fn new(category: Category, preferred_provider: impl Into<String>) -> Self {
        Self {
            category,
            preferred_provider: preferred_provider.into(),
            fallback_providers: Vec::new(),
            model_variant: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            priority: Priority::default(),
        }
    }

    /// Set the fallback list
    #[must_use]
    pub fn with_fallbacks<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_providers = providers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the model variant
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.model_variant = Some(variant.into());
        self
    }

    /// Set the token ceiling, temperature and priority
    #[must_use]
    pub fn with_params(mut self, max_tokens: u32, temperature: f32, priority: Priority) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self.priority = priority;
        self
    }

    /// Built-in rule for a category
    #[must_use]
    pub fn default_for(category: Category) -> Self {
        match category {
            Category::SelfReflection => Self::new(category, "ollama")
                .with_variant("reasoning")
                .with_params(2000, 0.3, Priority::Low),
            Category::CriticalAnalysis => Self::new(category, "venice")
                .with_fallbacks(["groq"])
                .with_variant("reasoning")
                .with_params(4000, 0.7, Priority::High),
            Category::CodeGeneration => Self::new(category, "groq")
                .with_fallbacks(["venice"])
                .with_variant("tooling")
                .with_params(3000, 0.2, Priority::Medium),
            Category::Reasoning => Self::new(category, "groq")
                .with_fallbacks(["venice", "ollama"])
                .with_variant("reasoning")
                .with_params(4000, 0.7, Priority::Medium),
            Category::Documentation => Self::new(category, "groq")
                .with_fallbacks(["venice"])
                .with_variant("reasoning")
                .with_params(2000, 0.5, Priority::Low),
            Category::QuickAnswer => Self::new(category, "groq")
                .with_fallbacks(["ollama"])
                .with_variant("reasoning")
                .with_params(1000, 0.7, Priority::Low),
        }
    }
}

/// Total map from category to rule
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingTable {
    rules: Vec<RoutingRule>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            rules: Category::ALL.iter().map(|c| RoutingRule::default_for(*c)).collect(),
        }
    }
}

impl RoutingTable {
    /// Build a table from configured rules
    ///
    /// Categories without a configured rule keep the built-in default. When a
    /// category appears more than once the last rule wins.
    #[must_use]
    pub fn from_rules(rules: impl IntoIterator<Item = RoutingRule>) -> Self {
        let mut table = Self::default();
        for rule in rules {
            let index = rule.category.index();
            table.rules[index] = rule;
        }
        table
    }

    /// Rule for a category
    #[must_use]
    pub fn rule(&self, category: Category) -> &RoutingRule {
        &self.rules[category.index()]
    }

    /// Every rule, in [`Category::ALL`] order
    #[must_use]
    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }
}
