//! Router implementation
//!
//! [`Router`] owns the registered providers, the rule table and the route
//! telemetry. Each call to [`Router::route`] walks a candidate chain built
//! from the category's rule and falls back to the next candidate with half
//! the rule's token budget once a query fails. When no candidate admits the
//! request at all, it is forced onto a local provider as a last resort.
//!
//! Admission is soft: provider checks do not reserve capacity, so two
//! concurrent requests can both pass a check and briefly over-commit a
//! window. The window corrects itself as entries age out.

use super::config::RouterConfig;
use super::provider::{InferenceProvider, ProviderKind, ProviderStatus};
use super::rules::{RoutingRule, RoutingTable};
use super::types::{
    Admission, AdmissionRequest, Category, Priority, QueryRequest, QueryResult, RouteDecision,
};
use crate::classifier::TaskClassifier;
use crate::error::{CandidateAttempt, RouterError};
use crate::telemetry::{RouteOutcome, RouterStats, TelemetryLog};
use crate::token::TokenEstimator;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// What happened to one request on its way through the chain
#[derive(Debug, Default)]
struct Trace {
    first_choice: Option<String>,
    attempts: Vec<CandidateAttempt>,
    any_admitted: bool,
    degraded: bool,
}

impl Trace {
    fn failed_providers(&self) -> Vec<String> {
        self.attempts
            .iter()
            .filter(|a| a.queried)
            .map(|a| a.provider.clone())
            .collect()
    }
}

/// Request router with admission control and fallback
pub struct Router {
    providers: Vec<Arc<dyn InferenceProvider>>,
    rules: RoutingTable,
    config: RouterConfig,
    classifier: TaskClassifier,
    estimator: TokenEstimator,
    telemetry: TelemetryLog,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("providers", &self.provider_ids())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Create a router over the given providers
    ///
    /// Providers keep their registration order, which decides the order of
    /// last-resort candidates. A second provider with an ID already seen is
    /// ignored.
    pub fn new<I>(providers: I, rules: RoutingTable, config: RouterConfig) -> Self
    where
        I: IntoIterator<Item = Arc<dyn InferenceProvider>>,
    {
        let mut seen = HashSet::new();
        let mut registered = Vec::new();
        let mut estimator = TokenEstimator::new();

        for provider in providers {
            if !seen.insert(provider.id().to_string()) {
                warn!(provider = %provider.id(), "Duplicate provider ignored");
                continue;
            }
            debug!(provider = %provider.id(), kind = %provider.kind(), "Registering provider");
            estimator.register(provider.id(), provider.tokenizer());
            registered.push(provider);
        }

        let telemetry = TelemetryLog::new().with_max_records(config.telemetry_capacity);

        Self {
            providers: registered,
            rules,
            config,
            classifier: TaskClassifier::default(),
            estimator,
            telemetry,
        }
    }

    /// Replace the task classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: TaskClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Registered providers, in registration order
    #[must_use]
    pub fn providers(&self) -> &[Arc<dyn InferenceProvider>] {
        &self.providers
    }

    /// Registered provider IDs, in registration order
    #[must_use]
    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id().to_string()).collect()
    }

    /// Get a provider by ID
    #[must_use]
    pub fn provider(&self, id: &str) -> Option<&Arc<dyn InferenceProvider>> {
        self.providers.iter().find(|p| p.id() == id)
    }

    /// The routing rule table
    #[must_use]
    pub fn rules(&self) -> &RoutingTable {
        &self.rules
    }

    /// Orchestrator settings
    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Route telemetry
    #[must_use]
    pub fn telemetry(&self) -> &TelemetryLog {
        &self.telemetry
    }

    /// Categorize a task description
    #[must_use]
    pub fn classify(&self, description: &str) -> Category {
        self.classifier.classify(description)
    }

    /// Estimate a prompt's size, in a provider's units when one is given
    #[must_use]
    pub fn estimate(&self, text: &str, provider: Option<&str>) -> u32 {
        self.estimator.estimate(text, provider)
    }

    /// Completion token budget for a rule
    fn max_tokens_for(&self, rule: &RoutingRule) -> u32 {
        rule.max_tokens.min(self.config.max_tokens_ceiling)
    }

    /// Budget for every candidate after the first failed query
    fn fallback_tokens(&self, original: u32) -> u32 {
        (original / 2).max(self.config.fallback_min_tokens).min(original)
    }

    /// Ordered candidates for a request
    fn candidates(&self, category: Category, estimated_tokens: u32) -> Vec<&Arc<dyn InferenceProvider>> {
        let rule = self.rules.rule(category);
        let mut names: Vec<&str> = Vec::with_capacity(self.providers.len() + 2);

        if estimated_tokens > self.config.large_prompt_threshold {
            // Ties go to the larger window for the rule's variant, then registration order
            let variant = rule.model_variant.as_deref();
            let largest = self
                .providers
                .iter()
                .rev()
                .max_by_key(|p| (p.context_window(), p.context_window_for(variant)));
            if let Some(largest) = largest {
                debug!(
                    provider = %largest.id(),
                    estimated_tokens,
                    "Large prompt, largest context window goes first"
                );
                names.push(largest.id());
            }
        }

        names.push(&rule.preferred_provider);
        names.extend(rule.fallback_providers.iter().map(String::as_str));
        names.extend(self.providers.iter().map(|p| p.id()));

        let mut seen = HashSet::new();
        names
            .into_iter()
            .filter(|name| seen.insert(*name))
            .filter_map(|name| self.provider(name))
            .collect()
    }

    /// Provider IDs in the order a request of this category would try them
    #[must_use]
    pub fn candidate_chain(&self, category: Category, estimated_tokens: u32) -> Vec<String> {
        self.candidates(category, estimated_tokens)
            .into_iter()
            .map(|p| p.id().to_string())
            .collect()
    }

    /// Route a task to a provider and return its answer
    ///
    /// `category` overrides classification. `deadline` bounds the whole
    /// call, in-flight provider queries included. Every call leaves one
    /// telemetry record.
    #[instrument(skip(self, description))]
    pub async fn route(
        &self,
        description: &str,
        category: Option<Category>,
        deadline: Option<Duration>,
    ) -> Result<QueryResult, RouterError> {
        let started = Instant::now();
        let category = category.unwrap_or_else(|| self.classify(description));
        let estimated_tokens = self.estimate(description, None);

        let mut trace = Trace::default();
        let dispatch = self.dispatch(description, category, estimated_tokens, &mut trace);
        let result = match deadline {
            Some(deadline) => match tokio::time::timeout(deadline, dispatch).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(deadline_ms = deadline.as_millis() as u64, "Route deadline exceeded");
                    Err(RouterError::DeadlineExceeded(deadline.as_millis() as u64))
                }
            },
            None => dispatch.await,
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        let mut outcome = RouteOutcome {
            category: Some(category),
            estimated_tokens,
            fallback_depth: trace.attempts.len() as u32,
            degraded: trace.degraded,
            latency_ms,
            failed_providers: trace.failed_providers(),
            first_choice: trace.first_choice,
            ..RouteOutcome::default()
        };

        match &result {
            Ok(answer) => {
                info!(
                    provider = %answer.provider,
                    model = %answer.model,
                    tokens = answer.total_tokens(),
                    cost = answer.cost,
                    latency_ms,
                    "Request routed"
                );
                outcome.provider = Some(answer.provider.clone());
                outcome.input_tokens = answer.input_tokens;
                outcome.output_tokens = answer.output_tokens;
                outcome.cost = answer.cost;
            }
            Err(e) => {
                warn!(code = e.code(), error = %e, latency_ms, "Request failed");
                outcome.error_code = Some(e.code().to_string());
            }
        }

        self.telemetry.record(outcome).await;
        result
    }

    async fn dispatch(
        &self,
        prompt: &str,
        category: Category,
        estimated_tokens: u32,
        trace: &mut Trace,
    ) -> Result<QueryResult, RouterError> {
        if self.providers.is_empty() {
            return Err(RouterError::NoProviders);
        }

        let rule = self.rules.rule(category);
        let chain = self.candidates(category, estimated_tokens);
        trace.first_choice = chain.first().map(|p| p.id().to_string());
        let original_max_tokens = self.max_tokens_for(rule);
        let mut max_tokens = original_max_tokens;

        for provider in chain {
            let prompt_tokens = provider.tokenizer().count(prompt);
            let admission = AdmissionRequest {
                prompt_tokens,
                max_tokens,
                model_variant: rule.model_variant.clone(),
            };

            if let Admission::Rejected(rejection) = provider.admit(&admission).await {
                debug!(provider = %provider.id(), reason = %rejection, "Candidate skipped");
                trace
                    .attempts
                    .push(CandidateAttempt::skipped(provider.id(), rejection));
                continue;
            }
            trace.any_admitted = true;

            let decision = RouteDecision {
                provider_id: provider.id().to_string(),
                model_variant: rule.model_variant.clone(),
                max_tokens,
                temperature: rule.temperature,
                priority: rule.priority,
                degraded: false,
            };
            debug!(?decision, "Dispatching");

            match provider
                .query(&QueryRequest::from_decision(prompt, prompt_tokens, &decision))
                .await
            {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!(provider = %provider.id(), error = %e, "Candidate failed, falling back");
                    trace.attempts.push(CandidateAttempt::failed(provider.id(), &e));
                    max_tokens = self.fallback_tokens(original_max_tokens);
                }
            }
        }

        let degraded = if trace.any_admitted {
            None
        } else {
            self.degraded_candidate()
        };
        if let Some(local) = degraded {
            let prompt_tokens = local.tokenizer().count(prompt);
            let decision = RouteDecision {
                provider_id: local.id().to_string(),
                model_variant: rule.model_variant.clone(),
                max_tokens: max_tokens.min(self.config.degraded_max_tokens),
                temperature: rule.temperature,
                priority: Priority::Low,
                degraded: true,
            };
            warn!(
                provider = %local.id(),
                %category,
                skipped = trace.attempts.len(),
                "Every candidate declined, forcing degraded local execution"
            );
            trace.degraded = true;

            match local
                .query(&QueryRequest::from_decision(prompt, prompt_tokens, &decision))
                .await
            {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!(provider = %local.id(), error = %e, "Degraded execution failed");
                    trace.attempts.push(CandidateAttempt::failed(local.id(), &e));
                }
            }
        }

        Err(RouterError::from_attempts(
            category,
            estimated_tokens,
            trace.attempts.clone(),
        ))
    }

    /// First registered local provider
    fn degraded_candidate(&self) -> Option<&Arc<dyn InferenceProvider>> {
        self.providers.iter().find(|p| p.kind() == ProviderKind::Local)
    }

    /// Aggregate route statistics
    pub async fn stats(&self) -> RouterStats {
        let mut stats = self.telemetry.stats(None).await;
        stats.active_providers = self.provider_ids();
        stats
    }

    /// Status of every provider, in registration order
    pub async fn provider_status(&self) -> Vec<ProviderStatus> {
        futures::future::join_all(self.providers.iter().map(|p| p.status())).await
    }
}
