use super::*;
use chrono::{Duration as ChronoDuration, NaiveDate};
use tempfile::TempDir;

struct TestContext {
    store: LedgerStore,
    _dir: TempDir,
}

async fn create_test_context() -> TestContext {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger").join("usage.db");
    let store = LedgerStore::from_path(&path).await.unwrap();
    TestContext { store, _dir: dir }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_ensure_entry_creates_zero_row() {
    let store = LedgerStore::in_memory().await.unwrap();
    let date = day(2026, 3, 1);

    assert!(store.entry(date, "groq").await.unwrap().is_none());

    let entry = store.ensure_entry(date, "groq").await.unwrap();
    assert_eq!(entry, DailyUsage::empty(date, "groq"));
    assert!(store.entry(date, "groq").await.unwrap().is_some());
}

#[tokio::test]
async fn test_increment_adds_exact_amounts() {
    let store = LedgerStore::in_memory().await.unwrap();
    let date = day(2026, 3, 1);

    store.increment(date, "venice", 1200, 0.25).await.unwrap();
    let entry = store.increment(date, "venice", 300, 0.125).await.unwrap();

    assert_eq!(entry.request_count, 2);
    assert_eq!(entry.token_count, 1500);
    assert!((entry.cost - 0.375).abs() < 1e-12);
}

#[tokio::test]
async fn test_increment_after_ensure_keeps_counting_from_zero() {
    let store = LedgerStore::in_memory().await.unwrap();
    let date = day(2026, 3, 1);

    store.ensure_entry(date, "ollama").await.unwrap();
    let entry = store.increment(date, "ollama", 10, 0.0).await.unwrap();

    assert_eq!(entry.request_count, 1);
    assert_eq!(entry.token_count, 10);
}

#[tokio::test]
async fn test_rows_are_partitioned_by_day_and_provider() {
    let store = LedgerStore::in_memory().await.unwrap();
    let monday = day(2026, 3, 2);
    let tuesday = monday + ChronoDuration::days(1);

    store.increment(monday, "groq", 100, 0.01).await.unwrap();
    store.increment(monday, "venice", 100, 0.02).await.unwrap();
    store.increment(tuesday, "groq", 50, 0.005).await.unwrap();

    let fresh_day = store.ensure_entry(tuesday, "venice").await.unwrap();
    assert_eq!(fresh_day.request_count, 0);
    assert_eq!(fresh_day.cost, 0.0);

    let monday_rows = store.entries_for(monday).await.unwrap();
    let providers: Vec<_> = monday_rows.iter().map(|r| r.provider.as_str()).collect();
    assert_eq!(providers, vec!["groq", "venice"]);

    let history = store.history("groq", monday).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].date, monday);
    assert_eq!(history[1].date, tuesday);
    assert_eq!(history[1].token_count, 50);
}

#[tokio::test]
async fn test_negative_cost_is_rejected() {
    let store = LedgerStore::in_memory().await.unwrap();
    let date = day(2026, 3, 1);

    tokio_test::assert_err!(store.increment(date, "groq", 1, -0.5).await);
    tokio_test::assert_err!(store.increment(date, "groq", 1, f64::NAN).await);
    assert!(store.entry(date, "groq").await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_increments_lose_nothing() {
    let ctx = create_test_context().await;
    let date = day(2026, 3, 1);
    let writers = 40;

    let handles: Vec<_> = (0..writers)
        .map(|_| {
            let store = ctx.store.clone();
            tokio::spawn(async move { store.increment(date, "groq", 25, 0.001).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let entry = ctx.store.entry(date, "groq").await.unwrap().unwrap();
    assert_eq!(entry.request_count, writers);
    assert_eq!(entry.token_count, writers * 25);
    assert!((entry.cost - writers as f64 * 0.001).abs() < 1e-9);
}

#[tokio::test]
async fn test_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("usage.db");
    let date = day(2026, 3, 1);

    {
        let store = LedgerStore::from_path(&path).await.unwrap();
        store.increment(date, "venice", 10, 0.3).await.unwrap();
        store.close().await;
    }

    let reopened = LedgerStore::from_path(&path).await.unwrap();
    let entry = reopened.entry(date, "venice").await.unwrap().unwrap();
    assert_eq!(entry.request_count, 1);
    assert!((entry.cost - 0.3).abs() < 1e-12);
}

#[tokio::test]
async fn test_closed_store_reports_errors() {
    let store = LedgerStore::in_memory().await.unwrap();
    store.close().await;

    assert!(matches!(
        store.today_entry("groq").await,
        Err(LedgerError::Database(_))
    ));
}

#[tokio::test]
async fn test_today_helpers_use_current_utc_day() {
    let store = LedgerStore::in_memory().await.unwrap();
    store.record_today("groq", 5, 0.0).await.unwrap();

    let entry = store.today_entry("groq").await.unwrap();
    assert_eq!(entry.date, today());
    assert_eq!(entry.request_count, 1);
}
