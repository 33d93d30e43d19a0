use super::{LedgerError, LedgerStore, Result};

impl LedgerStore {
    /// Run database migrations
    pub(super) async fn migrate(&self) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::Transaction(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_usage (
                date TEXT NOT NULL,
                provider TEXT NOT NULL,
                request_count INTEGER NOT NULL DEFAULT 0,
                token_count INTEGER NOT NULL DEFAULT 0,
                cost REAL NOT NULL DEFAULT 0.0,
                PRIMARY KEY (date, provider)
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Transaction(format!("migration failed (daily_usage): {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_daily_usage_provider ON daily_usage(provider, date)",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            LedgerError::Transaction(format!("migration failed (idx_daily_usage_provider): {}", e))
        })?;

        tx.commit()
            .await
            .map_err(|e| LedgerError::Transaction(e.to_string()))?;

        Ok(())
    }
}
