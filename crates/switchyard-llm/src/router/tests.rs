//! Tests for router module

use super::*;
use crate::error::{Error, Rejection, RouterError};
use crate::limiter::{LimiterConfig, RateLimiter};
use crate::providers::{
    BudgetMeteredConfig, BudgetMeteredProvider, ChatBackend, FixedBalance, RateQuotaConfig,
    RateQuotaProvider, ScriptedBackend,
};
use crate::token::Tokenizer;
use std::sync::Arc;
use std::time::{Duration, Instant};
use switchyard_core::ledger::today;
use switchyard_core::{LedgerStore, RetryConfig};
use tokio_test::{assert_err, assert_ok};

struct Fleet {
    groq: MockProvider,
    venice: MockProvider,
    ollama: MockProvider,
}

impl Fleet {
    fn new() -> Self {
        Self {
            groq: MockProvider::new("groq", ProviderKind::RateQuota),
            venice: MockProvider::new("venice", ProviderKind::BudgetMetered),
            ollama: MockProvider::new("ollama", ProviderKind::Local).with_context_window(32_000),
        }
    }

    fn providers(&self) -> Vec<Arc<dyn InferenceProvider>> {
        vec![
            Arc::new(self.groq.clone()),
            Arc::new(self.venice.clone()),
            Arc::new(self.ollama.clone()),
        ]
    }

    fn router(&self) -> Router {
        Router::new(self.providers(), RoutingTable::default(), RouterConfig::default())
    }
}

fn mock(id: &str, kind: ProviderKind) -> Arc<dyn InferenceProvider> {
    Arc::new(MockProvider::new(id, kind))
}

// ============================================================================
// Candidate chain
// ============================================================================

#[test]
fn test_chain_follows_rule_then_registration_order() {
    let router = Fleet::new().router();
    assert_eq!(
        router.candidate_chain(Category::Reasoning, 100),
        vec!["groq", "venice", "ollama"]
    );
    assert_eq!(
        router.candidate_chain(Category::CriticalAnalysis, 100),
        vec!["venice", "groq", "ollama"]
    );
    assert_eq!(
        router.candidate_chain(Category::SelfReflection, 100),
        vec!["ollama", "groq", "venice"]
    );
}

#[test]
fn test_chain_skips_unregistered_names() {
    let router = Router::new(
        vec![mock("ollama", ProviderKind::Local), mock("venice", ProviderKind::BudgetMetered)],
        RoutingTable::default(),
        RouterConfig::default(),
    );
    assert_eq!(
        router.candidate_chain(Category::CodeGeneration, 100),
        vec!["venice", "ollama"]
    );
}

#[test]
fn test_large_prompt_prefers_largest_context() {
    let fleet = Fleet {
        venice: MockProvider::new("venice", ProviderKind::BudgetMetered).with_context_window(200_000),
        ..Fleet::new()
    };
    let router = fleet.router();

    assert_eq!(router.candidate_chain(Category::QuickAnswer, 8000)[0], "groq");
    assert_eq!(
        router.candidate_chain(Category::QuickAnswer, 8001),
        vec!["venice", "groq", "ollama"]
    );
    assert_eq!(router.candidate_chain(Category::SelfReflection, 50_000)[0], "venice");
}

#[test]
fn test_large_prompt_tie_keeps_registration_order() {
    let router = Fleet::new().router();
    // groq and venice both have 128k windows
    assert_eq!(router.candidate_chain(Category::SelfReflection, 9000)[0], "groq");
}

#[tokio::test]
async fn test_large_prompt_tie_prefers_window_of_requested_variant() {
    let limiter = limiter().await;
    let venice = MockProvider::new("venice", ProviderKind::BudgetMetered);
    let router = Router::new(
        vec![rate_quota(&limiter), Arc::new(venice)],
        RoutingTable::default(),
        RouterConfig::default(),
    );

    // groq's tooling variant only has 8192 tokens of context
    assert_eq!(
        router.candidate_chain(Category::CodeGeneration, 9000),
        vec!["venice", "groq"]
    );
    // the reasoning variant ties venice at 128k
    assert_eq!(router.candidate_chain(Category::Reasoning, 9000)[0], "groq");
    assert_eq!(router.candidate_chain(Category::CodeGeneration, 100)[0], "groq");
}

#[test]
fn test_duplicate_providers_are_ignored() {
    let router = Router::new(
        vec![
            mock("groq", ProviderKind::RateQuota),
            mock("groq", ProviderKind::Local),
        ],
        RoutingTable::default(),
        RouterConfig::default(),
    );
    assert_eq!(router.provider_ids(), vec!["groq"]);
    assert_eq!(router.provider("groq").unwrap().kind(), ProviderKind::RateQuota);
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_routes_directly_to_preferred() {
    let fleet = Fleet::new();
    let router = fleet.router();

    let result = router
        .route("write code for a parser", None, None)
        .await
        .unwrap();
    assert_eq!(result.provider, "groq");

    let queries = fleet.groq.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].max_tokens, 3000);
    assert!((queries[0].temperature - 0.2).abs() < f32::EPSILON);
    assert_eq!(queries[0].model_variant.as_deref(), Some("tooling"));
    assert!(fleet.venice.admissions().is_empty());

    let stats = router.stats().await;
    assert_eq!(stats.successful_requests, 1);
    assert!(stats.fallback_counts.is_empty());
    assert_eq!(stats.by_category[&Category::CodeGeneration].requests, 1);
}

#[tokio::test]
async fn test_explicit_category_overrides_classifier() {
    let fleet = Fleet::new();
    let router = fleet.router();

    let result = router
        .route("write code for a parser", Some(Category::CriticalAnalysis), None)
        .await
        .unwrap();
    assert_eq!(result.provider, "venice");
    assert_eq!(fleet.venice.queries()[0].max_tokens, 4000);
}

#[tokio::test]
async fn test_rejection_advances_to_fallback() {
    let fleet = Fleet::new();
    fleet.groq.reject(Rejection::capacity("27/30 requests in the last minute"));
    let router = fleet.router();

    let result = router.route("implement a module", None, None).await.unwrap();
    assert_eq!(result.provider, "venice");
    // Admission rejections keep the full budget
    assert_eq!(fleet.venice.queries()[0].max_tokens, 3000);

    let record = &router.telemetry().records(None).await[0];
    assert_eq!(record.fallback_depth, 1);
    assert!(record.failed_providers.is_empty());
    assert_eq!(router.stats().await.fallback_counts.get("groq"), Some(&1));
}

#[tokio::test]
async fn test_failed_query_halves_original_budget() {
    let fleet = Fleet::new();
    fleet.groq.push_error(Error::Server("503".into()));
    fleet.venice.push_error(Error::Timeout(60_000));
    let router = fleet.router();

    let result = router
        .route("think about it", Some(Category::Reasoning), None)
        .await
        .unwrap();
    assert_eq!(result.provider, "ollama");
    assert_eq!(fleet.groq.queries()[0].max_tokens, 4000);
    assert_eq!(fleet.venice.queries()[0].max_tokens, 2000);
    assert_eq!(fleet.venice.admissions()[0].max_tokens, 2000);
    assert_eq!(fleet.ollama.queries()[0].max_tokens, 2000);
    assert_eq!(fleet.ollama.admissions()[0].max_tokens, 2000);

    let stats = router.stats().await;
    assert_eq!(stats.by_provider["groq"].failed_attempts, 1);
    assert_eq!(stats.by_provider["venice"].failed_attempts, 1);
    assert_eq!(stats.by_provider["ollama"].served, 1);
    assert_eq!(stats.degraded_requests, 0);
}

#[tokio::test]
async fn test_fallback_budget_has_a_floor() {
    let fleet = Fleet::new();
    fleet.groq.push_error(Error::Server("500".into()));
    fleet.venice.push_error(Error::Server("500".into()));
    let rules = RoutingTable::from_rules([RoutingRule::new(Category::QuickAnswer, "groq")
        .with_params(400, 0.7, Priority::Low)]);
    let router = Router::new(fleet.providers(), rules, RouterConfig::default());

    router
        .route("what is rust", Some(Category::QuickAnswer), None)
        .await
        .unwrap();
    assert_eq!(fleet.groq.queries()[0].max_tokens, 400);
    assert_eq!(fleet.venice.queries()[0].max_tokens, 256);
    assert_eq!(fleet.ollama.queries()[0].max_tokens, 256);
}

#[tokio::test]
async fn test_floor_never_raises_a_small_budget() {
    let fleet = Fleet::new();
    fleet.groq.push_error(Error::Server("500".into()));
    let rules = RoutingTable::from_rules([RoutingRule::new(Category::QuickAnswer, "groq")
        .with_params(200, 0.7, Priority::Low)]);
    let router = Router::new(fleet.providers(), rules, RouterConfig::default());

    router
        .route("what is rust", Some(Category::QuickAnswer), None)
        .await
        .unwrap();
    assert_eq!(fleet.venice.queries()[0].max_tokens, 200);
}

#[tokio::test]
async fn test_max_tokens_capped_by_ceiling() {
    let fleet = Fleet::new();
    let rules = RoutingTable::from_rules([RoutingRule::new(Category::Reasoning, "groq")
        .with_params(9000, 0.7, Priority::Medium)]);
    let router = Router::new(fleet.providers(), rules, RouterConfig::default());

    router.route("ponder", Some(Category::Reasoning), None).await.unwrap();
    assert_eq!(fleet.groq.queries()[0].max_tokens, 4000);
}

#[tokio::test]
async fn test_admission_uses_candidate_tokenizer() {
    let prompt = "Summarize the following paragraph about tokenization, please.";
    let groq = MockProvider::new("groq", ProviderKind::RateQuota).with_tokenizer(Tokenizer::Cl100k);
    let router = Router::new(
        vec![Arc::new(groq.clone()) as Arc<dyn InferenceProvider>],
        RoutingTable::default(),
        RouterConfig::default(),
    );

    router.route(prompt, None, None).await.unwrap();
    assert_eq!(groq.admissions()[0].prompt_tokens, Tokenizer::Cl100k.count(prompt));
    assert_eq!(router.estimate(prompt, Some("groq")), Tokenizer::Cl100k.count(prompt));
    assert_eq!(router.estimate(prompt, None), Tokenizer::Heuristic.count(prompt));
}

// ============================================================================
// Degraded mode and terminal errors
// ============================================================================

#[tokio::test]
async fn test_degraded_local_when_every_candidate_declines() {
    let fleet = Fleet::new();
    fleet.groq.reject(Rejection::capacity("tokens per minute"));
    fleet.venice.reject(Rejection::budget("daily budget"));
    fleet.ollama.reject(Rejection::unavailable("health probe failed"));
    let router = fleet.router();

    let result = router
        .route("think hard", Some(Category::Reasoning), None)
        .await
        .unwrap();
    assert_eq!(result.provider, "ollama");
    assert_eq!(fleet.ollama.queries()[0].max_tokens, 2000);

    let record = &router.telemetry().records(None).await[0];
    assert!(record.degraded);
    assert!(record.success);
    assert_eq!(record.fallback_depth, 3);
    assert_eq!(router.stats().await.degraded_requests, 1);
}

#[tokio::test]
async fn test_without_local_uniform_rejection_is_reported() {
    let groq = MockProvider::new("groq", ProviderKind::RateQuota);
    let venice = MockProvider::new("venice", ProviderKind::BudgetMetered);
    groq.reject(Rejection::budget("daily requests"));
    venice.reject(Rejection::budget("balance 0.02 below minimum"));
    let router = Router::new(
        vec![Arc::new(groq) as Arc<dyn InferenceProvider>, Arc::new(venice)],
        RoutingTable::default(),
        RouterConfig::default(),
    );

    let err = router.route("analyze", None, None).await.unwrap_err();
    assert!(matches!(err, RouterError::BudgetExhausted { .. }));
    assert_eq!(err.attempts().len(), 2);

    let record = &router.telemetry().records(None).await[0];
    assert!(!record.success);
    assert_eq!(record.error_code.as_deref(), Some("budget_exhausted"));
}

#[tokio::test]
async fn test_without_local_mixed_rejections_are_capacity() {
    let groq = MockProvider::new("groq", ProviderKind::RateQuota);
    let venice = MockProvider::new("venice", ProviderKind::BudgetMetered);
    groq.reject(Rejection::capacity("requests per minute"));
    venice.reject(Rejection::unavailable("balance probe failed"));
    let router = Router::new(
        vec![Arc::new(groq) as Arc<dyn InferenceProvider>, Arc::new(venice)],
        RoutingTable::default(),
        RouterConfig::default(),
    );

    let err = router.route("analyze", None, None).await.unwrap_err();
    assert_eq!(err.code(), "capacity_exceeded");
}

#[tokio::test]
async fn test_prompt_too_large_everywhere() {
    let groq = MockProvider::new("groq", ProviderKind::RateQuota).with_context_window(10);
    let router = Router::new(
        vec![Arc::new(groq) as Arc<dyn InferenceProvider>],
        RoutingTable::default(),
        RouterConfig::default(),
    );

    let prompt = vec!["word"; 50].join(" ");
    let err = router.route(&prompt, None, None).await.unwrap_err();
    match err {
        RouterError::ContextTooLarge { prompt_tokens, .. } => assert_eq!(prompt_tokens, 65),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_local_not_forced_after_it_failed() {
    let fleet = Fleet::new();
    fleet.groq.push_error(Error::Server("502".into()));
    fleet.venice.reject(Rejection::budget("daily budget"));
    fleet.ollama.push_error(Error::Network("connection refused".into()));
    let router = fleet.router();

    let err = router
        .route("what is a monad", Some(Category::QuickAnswer), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::AllProvidersExhausted { category: Category::QuickAnswer, .. }));
    assert_eq!(fleet.ollama.queries().len(), 1);

    let trail: Vec<_> = err
        .attempts()
        .iter()
        .map(|a| (a.provider.as_str(), a.queried))
        .collect();
    assert_eq!(trail, vec![("groq", true), ("ollama", true), ("venice", false)]);
}

#[tokio::test]
async fn test_no_degraded_mode_once_a_candidate_was_admitted() {
    let fleet = Fleet::new();
    fleet.groq.push_error(Error::Server("503".into()));
    fleet.venice.reject(Rejection::budget("daily budget"));
    fleet.ollama.reject(Rejection::unavailable("health probe failed"));
    let router = fleet.router();

    let err = assert_err!(
        router
            .route("what is a monad", Some(Category::QuickAnswer), None)
            .await
    );
    assert_eq!(err.code(), "all_providers_exhausted");
    assert!(fleet.ollama.queries().is_empty());
    assert_eq!(fleet.groq.queries().len(), 1);

    let record = &router.telemetry().records(None).await[0];
    assert!(!record.degraded);
    assert_eq!(record.failed_providers, vec!["groq"]);
    assert_eq!(router.stats().await.degraded_requests, 0);
}

#[tokio::test]
async fn test_degraded_failure_is_exhausted() {
    let fleet = Fleet::new();
    fleet.groq.reject(Rejection::capacity("tokens per minute"));
    fleet.venice.reject(Rejection::capacity("requests per minute"));
    fleet.ollama.reject(Rejection::unavailable("health probe failed"));
    fleet.ollama.push_error(Error::Network("connection refused".into()));
    let router = fleet.router();

    let err = router.route("ponder", None, None).await.unwrap_err();
    assert_eq!(err.code(), "all_providers_exhausted");
    assert_eq!(err.attempts().len(), 4);

    let record = &router.telemetry().records(None).await[0];
    assert!(record.degraded);
    assert_eq!(record.failed_providers, vec!["ollama"]);
}

#[tokio::test]
async fn test_no_providers() {
    let router = Router::new(
        Vec::<Arc<dyn InferenceProvider>>::new(),
        RoutingTable::default(),
        RouterConfig::default(),
    );
    let err = assert_err!(router.route("anything", None, None).await);
    assert!(matches!(err, RouterError::NoProviders));
    assert_eq!(router.stats().await.error_counts.get("no_providers"), Some(&1));
}

// ============================================================================
// Deadlines and concurrency
// ============================================================================

#[tokio::test]
async fn test_deadline_aborts_in_flight_query() {
    let groq = MockProvider::new("groq", ProviderKind::RateQuota).with_delay(Duration::from_secs(5));
    let router = Router::new(
        vec![Arc::new(groq.clone()) as Arc<dyn InferenceProvider>],
        RoutingTable::default(),
        RouterConfig::default(),
    );

    let started = Instant::now();
    let err = router
        .route("slow question", None, Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::DeadlineExceeded(50)));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(groq.queries().len(), 1);

    let record = &router.telemetry().records(None).await[0];
    assert_eq!(record.error_code.as_deref(), Some("deadline_exceeded"));
    assert_eq!(record.first_choice.as_deref(), Some("groq"));
}

#[tokio::test]
async fn test_generous_deadline_is_harmless() {
    let router = Fleet::new().router();
    let result = assert_ok!(
        router
            .route("quick lookup", None, Some(Duration::from_secs(30)))
            .await
    );
    assert_eq!(result.provider, "groq");
}

#[tokio::test]
async fn test_concurrent_routes() {
    let router = Arc::new(Fleet::new().router());
    let handles: Vec<_> = (0..20)
        .map(|i| {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.route(&format!("task number {i}"), None, None).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    let stats = router.stats().await;
    assert_eq!(stats.total_requests, 20);
    assert!((stats.success_rate - 100.0).abs() < 1e-9);
    assert_eq!(stats.active_providers, vec!["groq", "venice", "ollama"]);
}

#[tokio::test]
async fn test_provider_status_in_registration_order() {
    let router = Fleet::new().router();
    let ids: Vec<_> = router
        .provider_status()
        .await
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec!["groq", "venice", "ollama"]);
}

// ============================================================================
// With real providers
// ============================================================================

async fn limiter() -> RateLimiter {
    RateLimiter::new(LedgerStore::in_memory().await.unwrap(), LimiterConfig::default())
}

fn rate_quota(limiter: &RateLimiter) -> Arc<dyn InferenceProvider> {
    Arc::new(
        RateQuotaProvider::new(
            RateQuotaConfig::default(),
            Arc::new(ScriptedBackend::new()) as Arc<dyn ChatBackend>,
            limiter,
            RetryConfig::no_retry(),
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn test_rate_quota_rpm_pressure_falls_back() {
    let limiter = limiter().await;
    let venice = MockProvider::new("venice", ProviderKind::BudgetMetered);
    let router = Router::new(
        vec![rate_quota(&limiter), Arc::new(venice.clone())],
        RoutingTable::default(),
        RouterConfig::default(),
    );
    let prompt = "implement a binary search function";

    let first = router.route(prompt, None, None).await.unwrap();
    assert_eq!(first.provider, "groq");
    assert_eq!(first.model, "llama3-groq-8b-8192-tool-use-preview");

    let quota = limiter.quota("groq").unwrap();
    let now = Instant::now();
    for _ in 0..28 {
        quota.push_window(now, 0);
    }
    assert_eq!(quota.window_usage().requests, 29);

    let second = router.route(prompt, None, None).await.unwrap();
    assert_eq!(second.provider, "venice");
    assert_eq!(venice.queries().len(), 1);
}

#[tokio::test]
async fn test_budget_cap_skips_metered_provider() {
    let limiter = limiter().await;
    let config = BudgetMeteredConfig {
        cost_per_output_token: 0.000_012_5,
        ..BudgetMeteredConfig::default()
    };
    let venice: Arc<dyn InferenceProvider> = Arc::new(BudgetMeteredProvider::new(
        config,
        Arc::new(ScriptedBackend::new()),
        Arc::new(FixedBalance(10.0)),
        &limiter,
        RetryConfig::no_retry(),
    ));
    let groq = rate_quota(&limiter);
    limiter
        .ledger()
        .increment(today(), "venice", 0, 0.48)
        .await
        .unwrap();

    let router = Router::new(vec![venice, groq], RoutingTable::default(), RouterConfig::default());
    let result = router
        .route("weigh this partnership", None, None)
        .await
        .unwrap();
    assert_eq!(result.provider, "groq");

    let attempt = &router.telemetry().records(None).await[0];
    assert_eq!(attempt.first_choice.as_deref(), Some("venice"));
    assert_eq!(attempt.fallback_depth, 1);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_router_config_defaults() {
    let config = RouterConfig::default();
    assert_eq!(config.large_prompt_threshold, 8000);
    assert_eq!(config.max_tokens_ceiling, 4000);
    assert_eq!(config.fallback_min_tokens, 256);
    assert_eq!(config.degraded_max_tokens, 2000);

    let retry = config.retry.to_retry_config();
    assert_eq!(retry.max_attempts, 3);
    assert_eq!(retry.initial_delay, Duration::from_secs(2));
    assert_eq!(retry.max_delay, Duration::from_secs(10));
}

#[test]
fn test_provider_config_is_tagged_by_kind() {
    let config: ProviderConfig = serde_json::from_value(serde_json::json!({
        "kind": "local",
        "id": "box",
        "model": "qwen2.5:3b"
    }))
    .unwrap();
    assert_eq!(config.id(), "box");
    assert!(config.enabled());
    assert!(matches!(config, ProviderConfig::Local(ref c) if c.model == "qwen2.5:3b"));

    let ids: Vec<_> = ProviderConfig::defaults().iter().map(|c| c.id().to_string()).collect();
    assert_eq!(ids, vec!["groq", "venice", "ollama"]);
}
