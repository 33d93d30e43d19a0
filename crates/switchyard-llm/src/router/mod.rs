//! Router - provider abstraction and request routing
//!
//! This module defines the provider trait, the routing rule table and the
//! [`Router`] that walks a candidate chain for each request.
//!
//! # Module Structure
//!
//! - `types`: Category, priority, admission and query types
//! - `rules`: Routing rule table
//! - `config`: Orchestrator and provider configuration
//! - `provider`: InferenceProvider trait definition
//! - `mock`: Mock provider for testing
//! - `router_impl`: Router implementation

mod config;
mod mock;
mod provider;
mod router_impl;
mod rules;
mod types;

#[cfg(test)]
mod tests;

pub use config::{ProviderConfig, RetryPolicy, RouterConfig};
pub use mock::MockProvider;
pub use provider::{InferenceProvider, ProviderDescriptor, ProviderKind, ProviderStatus};
pub use router_impl::Router;
pub use rules::{RoutingRule, RoutingTable};
pub use types::{
    Admission, AdmissionRequest, Category, Priority, QueryRequest, QueryResult, RouteDecision,
};
