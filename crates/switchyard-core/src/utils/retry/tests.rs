use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn fast() -> RetryConfig {
    RetryConfig::new()
        .with_initial_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(4))
}

#[test]
fn test_retry_config_defaults() {
    let config = RetryConfig::default();
    assert_eq!(config.max_attempts, 3);
    assert_eq!(config.initial_delay, Duration::from_secs(2));
    assert_eq!(config.max_delay, Duration::from_secs(10));
    assert_eq!(config.backoff_multiplier, 2.0);
}

#[test]
fn test_delay_grows_and_caps() {
    let config = RetryConfig::default();
    assert_eq!(config.delay_for(1), Duration::from_secs(2));
    assert_eq!(config.delay_for(2), Duration::from_secs(4));
    assert_eq!(config.delay_for(3), Duration::from_secs(8));
    assert_eq!(config.delay_for(4), Duration::from_secs(10));
    assert_eq!(config.delay_for(40), Duration::from_secs(10));
}

#[test]
fn test_total_backoff() {
    // Two sleeps for three attempts: 2s + 4s
    assert_eq!(RetryConfig::default().total_backoff(), Duration::from_secs(6));
    assert_eq!(RetryConfig::no_retry().total_backoff(), Duration::ZERO);
}

#[tokio::test]
async fn test_success_first_attempt() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();

    let result: Result<u32, RetryError<&str>> = retry_with_backoff(
        &fast(),
        || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, &str>(7)
            }
        },
        |_| true,
    )
    .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_success_after_transient_failures() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();

    let result: Result<&str, RetryError<&str>> = retry_with_backoff(
        &fast(),
        || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("503")
                } else {
                    Ok("done")
                }
            }
        },
        |_| true,
    )
    .await;

    tokio_test::assert_ok!(&result);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();

    let result: Result<(), RetryError<&str>> = retry_with_backoff(
        &fast().with_max_attempts(3),
        || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("timeout")
            }
        },
        |_| true,
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.attempts, 3);
    assert_eq!(err.into_inner(), "timeout");
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_non_retryable_stops_immediately() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();

    let result: Result<(), RetryError<&str>> = retry_with_backoff(
        &fast(),
        || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("401")
            }
        },
        |e| *e != "401",
    )
    .await;

    assert_eq!(result.unwrap_err().attempts, 1);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_zero_attempts_still_runs_once() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();

    let result: Result<(), RetryError<&str>> = retry_with_backoff(
        &fast().with_max_attempts(0),
        || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("boom")
            }
        },
        |_| true,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
