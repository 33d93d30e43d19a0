//! Bounded in-memory route log

use super::record::{RouteOutcome, RouteRecord, RouterStats};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Maximum records to keep in memory by default
const DEFAULT_MAX_RECORDS: usize = 10_000;

/// Append-only log of route outcomes
#[derive(Debug)]
pub struct TelemetryLog {
    /// Route records, oldest first
    records: RwLock<Vec<RouteRecord>>,
    /// Record ID counter
    next_id: AtomicU64,
    /// Maximum records to keep in memory
    max_records: usize,
}

impl Default for TelemetryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            max_records: DEFAULT_MAX_RECORDS,
        }
    }

    /// Create with custom max records
    #[must_use]
    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = max.max(1);
        self
    }

    /// Append one outcome
    pub async fn record(&self, outcome: RouteOutcome) -> RouteRecord {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = RouteRecord::from_outcome(id, outcome);

        let mut records = self.records.write().await;
        records.push(record.clone());

        // Trim old records if needed
        if records.len() > self.max_records {
            let drain_count = records.len() - self.max_records;
            records.drain(0..drain_count);
        }

        record
    }

    /// Records at or after `since` (all when `None`)
    pub async fn records(&self, since: Option<DateTime<Utc>>) -> Vec<RouteRecord> {
        let records = self.records.read().await;
        records
            .iter()
            .filter(|r| since.map_or(true, |since| r.timestamp >= since))
            .cloned()
            .collect()
    }

    /// Aggregate statistics over records at or after `since`
    pub async fn stats(&self, since: Option<DateTime<Utc>>) -> RouterStats {
        let records = self.records.read().await;
        let mut stats = RouterStats::default();
        let mut total_latency = 0u64;

        for record in records
            .iter()
            .filter(|r| since.map_or(true, |since| r.timestamp >= since))
        {
            stats.add(record);
            total_latency += record.latency_ms;
        }

        stats.finish(total_latency);
        stats
    }

    /// Number of records held
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True when nothing has been recorded
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
