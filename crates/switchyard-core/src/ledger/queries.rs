use super::types::{UsageRow, DATE_FORMAT};
use super::{today, DailyUsage, LedgerError, LedgerStore, Result};
use chrono::NaiveDate;

const SELECT_COLUMNS: &str = "date, provider, request_count, token_count, cost";

fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

impl LedgerStore {
    /// Get the row for a day and provider, if one exists
    pub async fn entry(&self, date: NaiveDate, provider: &str) -> Result<Option<DailyUsage>> {
        let row: Option<UsageRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM daily_usage WHERE date = ? AND provider = ?"
        ))
        .bind(date_key(date))
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DailyUsage::try_from).transpose()
    }

    /// Get the row for a day and provider, creating a zero row if absent
    pub async fn ensure_entry(&self, date: NaiveDate, provider: &str) -> Result<DailyUsage> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO daily_usage (date, provider, request_count, token_count, cost)
            VALUES (?, ?, 0, 0, 0.0)
            "#,
        )
        .bind(date_key(date))
        .bind(provider)
        .execute(&self.pool)
        .await?;

        Ok(self
            .entry(date, provider)
            .await?
            .unwrap_or_else(|| DailyUsage::empty(date, provider)))
    }

    /// Count one request against a day and provider
    ///
    /// The request counter moves by exactly one and the token and cost
    /// columns by exactly the given amounts, in a single statement.
    pub async fn increment(
        &self,
        date: NaiveDate,
        provider: &str,
        tokens: u64,
        cost: f64,
    ) -> Result<DailyUsage> {
        if !cost.is_finite() || cost < 0.0 {
            return Err(LedgerError::InvalidAmount(format!("cost {}", cost)));
        }
        let tokens = i64::try_from(tokens)
            .map_err(|_| LedgerError::InvalidAmount(format!("tokens {}", tokens)))?;

        let row: UsageRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO daily_usage (date, provider, request_count, token_count, cost)
            VALUES (?, ?, 1, ?, ?)
            ON CONFLICT(date, provider) DO UPDATE SET
                request_count = daily_usage.request_count + 1,
                token_count = daily_usage.token_count + excluded.token_count,
                cost = daily_usage.cost + excluded.cost
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(date_key(date))
        .bind(provider)
        .bind(tokens)
        .bind(cost)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    /// All rows for a day, ordered by provider
    pub async fn entries_for(&self, date: NaiveDate) -> Result<Vec<DailyUsage>> {
        let rows: Vec<UsageRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM daily_usage WHERE date = ? ORDER BY provider"
        ))
        .bind(date_key(date))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DailyUsage::try_from).collect()
    }

    /// Rows for one provider from `since` onwards, oldest first
    pub async fn history(&self, provider: &str, since: NaiveDate) -> Result<Vec<DailyUsage>> {
        let rows: Vec<UsageRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM daily_usage WHERE provider = ? AND date >= ? ORDER BY date"
        ))
        .bind(provider)
        .bind(date_key(since))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DailyUsage::try_from).collect()
    }

    /// Today's row for a provider, created empty if absent
    pub async fn today_entry(&self, provider: &str) -> Result<DailyUsage> {
        self.ensure_entry(today(), provider).await
    }

    /// Count one request against today's row for a provider
    pub async fn record_today(&self, provider: &str, tokens: u64, cost: f64) -> Result<DailyUsage> {
        self.increment(today(), provider, tokens, cost).await
    }
}
