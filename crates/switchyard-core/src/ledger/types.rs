use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage format of the `date` column
pub(super) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Ledger error type
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Migration or transaction failure
    #[error("transaction error: {0}")]
    Transaction(String),
    /// Cost or token amount that would move the ledger backwards
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    /// Row that cannot be decoded
    #[error("corrupt ledger row: {0}")]
    Corrupt(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Current UTC calendar day, the ledger's partition key
#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Usage accrued by one provider on one UTC day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    /// UTC calendar day
    pub date: NaiveDate,
    /// Provider ID
    pub provider: String,
    /// Requests recorded
    pub request_count: u64,
    /// Tokens recorded (input + output)
    pub token_count: u64,
    /// Cost accrued (USD)
    pub cost: f64,
}

impl DailyUsage {
    /// A zero row for the given day and provider
    #[must_use]
    pub fn empty(date: NaiveDate, provider: impl Into<String>) -> Self {
        Self {
            date,
            provider: provider.into(),
            request_count: 0,
            token_count: 0,
            cost: 0.0,
        }
    }
}

/// Raw database row
#[derive(Debug, sqlx::FromRow)]
pub(super) struct UsageRow {
    pub date: String,
    pub provider: String,
    pub request_count: i64,
    pub token_count: i64,
    pub cost: f64,
}

impl TryFrom<UsageRow> for DailyUsage {
    type Error = LedgerError;

    fn try_from(row: UsageRow) -> Result<Self> {
        let date = NaiveDate::parse_from_str(&row.date, DATE_FORMAT)
            .map_err(|e| LedgerError::Corrupt(format!("date {:?}: {}", row.date, e)))?;

        Ok(Self {
            date,
            provider: row.provider,
            request_count: u64::try_from(row.request_count)
                .map_err(|_| LedgerError::Corrupt(format!("request_count {}", row.request_count)))?,
            token_count: u64::try_from(row.token_count)
                .map_err(|_| LedgerError::Corrupt(format!("token_count {}", row.token_count)))?,
            cost: row.cost,
        })
    }
}
