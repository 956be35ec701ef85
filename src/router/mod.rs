//! Incident routing and contact resolution
//!
//! Handles:
//! - Building validated routing requests from incident context
//! - Scoring routing rules and assembling recommendations
//! - Resolving service contacts into durable individuals

mod matcher;
mod recommendation;
mod request;
mod resolver;

pub use matcher::{RouteMatcher, RoutingRule, RuleMatch};
pub use recommendation::Recommendation;
pub use request::{RawRoutingContext, RawRoutingRequest, RoutingContext, RoutingRequest, RoutingRequestBuilder};
pub use resolver::ContactResolver;

use crate::plugins::PluginError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors raised while building requests or loading rules
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Invalid routing request: {0}")]
    InvalidRequest(String),

    #[error("Invalid routing rule: {0}")]
    InvalidRule(String),
}

/// Errors raised by a contact resolution pass
///
/// Any of these aborts the pass; nothing resolved so far is committed.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No contact resolver registered for service contact type: {0}")]
    UnresolvedContactType(String),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("Transaction failed: {0}")]
    Transaction(#[from] StorageError),
}
