//! Sliding usage window

use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Width of the rate-limit window
pub const WINDOW_SPAN: Duration = Duration::from_secs(60);

/// Requests and tokens observed inside the window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowUsage {
    /// Requests recorded in the window
    pub requests: u32,
    /// Tokens recorded in the window
    pub tokens: u64,
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    at: Instant,
    tokens: u64,
}

/// Timestamped request log covering the last [`WINDOW_SPAN`]
///
/// Every read prunes first, so usage never includes entries older than the
/// span relative to the instant passed in.
#[derive(Debug)]
pub struct UsageWindow {
    span: Duration,
    entries: VecDeque<WindowEntry>,
}

impl Default for UsageWindow {
    fn default() -> Self {
        Self::new(WINDOW_SPAN)
    }
}

impl UsageWindow {
    /// Create a window of the given span
    #[must_use]
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            entries: VecDeque::new(),
        }
    }

    /// Drop entries that fell out of the window
    pub fn prune(&mut self, now: Instant) {
        let span = self.span;
        self.entries
            .retain(|e| now.saturating_duration_since(e.at) < span);
    }

    /// Usage after pruning against `now`
    pub fn usage(&mut self, now: Instant) -> WindowUsage {
        self.prune(now);
        WindowUsage {
            requests: u32::try_from(self.entries.len()).unwrap_or(u32::MAX),
            tokens: self.entries.iter().map(|e| e.tokens).sum(),
        }
    }

    /// Append one request
    pub fn push(&mut self, now: Instant, tokens: u64) {
        self.prune(now);
        self.entries.push_back(WindowEntry { at: now, tokens });
    }

    /// Window span
    #[must_use]
    pub fn span(&self) -> Duration {
        self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prunes_expired_entries() {
        let start = Instant::now();
        let mut window = UsageWindow::default();
        window.push(start, 100);
        window.push(start + Duration::from_secs(30), 200);

        let usage = window.usage(start + Duration::from_secs(59));
        assert_eq!(usage, WindowUsage { requests: 2, tokens: 300 });

        // exactly 60s old is outside the window
        let usage = window.usage(start + Duration::from_secs(60));
        assert_eq!(usage, WindowUsage { requests: 1, tokens: 200 });

        let usage = window.usage(start + Duration::from_secs(120));
        assert_eq!(usage, WindowUsage::default());
    }

    #[test]
    fn test_custom_span() {
        let start = Instant::now();
        let mut window = UsageWindow::new(Duration::from_secs(1));
        window.push(start, 5);
        assert_eq!(window.usage(start).requests, 1);
        assert_eq!(window.usage(start + Duration::from_secs(2)).requests, 0);
        assert_eq!(window.span(), Duration::from_secs(1));
    }
}
