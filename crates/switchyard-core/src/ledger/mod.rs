//! Durable daily usage ledger backed by SQLite
//!
//! One row per `(date, provider)` holding the request count, token count and
//! accrued cost for that UTC day. Rows are only ever incremented, and every
//! increment is a single upsert statement so concurrent writers never lose
//! an update. A new UTC day starts from a fresh zero row.

mod migrations;
mod queries;
mod types;

#[cfg(test)]
mod tests;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub use types::{today, DailyUsage, LedgerError, Result};

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based usage ledger
#[derive(Debug, Clone)]
pub struct LedgerStore {
    pub(super) pool: Pool<Sqlite>,
}

impl LedgerStore {
    /// Open (or create) a ledger database at the given path
    pub async fn from_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LedgerError::InvalidConfig(format!("failed to create directory: {}", e))
                })?;
            }
        }

        let url = format!("sqlite:{}", path.display());
        let options = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        debug!(path = %path.display(), "Opened usage ledger");

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Open a private in-memory ledger (lost when the store is dropped)
    pub async fn in_memory() -> Result<Self> {
        // A single long-lived connection, since every new in-memory
        // connection would see an empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Close every pooled connection; later calls fail with a database error
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
