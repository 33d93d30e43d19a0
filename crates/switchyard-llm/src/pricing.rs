//! Per-token pricing

use serde::{Deserialize, Serialize};

/// Price of one input and one output token (USD)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenPricing {
    /// Cost per prompt token
    pub input: f64,
    /// Cost per completion token
    pub output: f64,
}

impl TokenPricing {
    /// Create pricing from per-token costs
    #[must_use]
    pub const fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }

    /// Same price for input and output tokens
    #[must_use]
    pub const fn flat(per_token: f64) -> Self {
        Self::new(per_token, per_token)
    }

    /// Free (local) pricing
    #[must_use]
    pub const fn free() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Cost of a request with the given token counts
    #[must_use]
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        f64::from(input_tokens) * self.input + f64::from(output_tokens) * self.output
    }

    /// Average of the input and output price
    #[must_use]
    pub fn average(&self) -> f64 {
        (self.input + self.output) / 2.0
    }

    /// True if neither direction costs anything
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.input <= 0.0 && self.output <= 0.0
    }
}
