//! Beacon - incident routing and recommendation engine
//!
//! Beacon decides which documents, responders and teams belong on an
//! in-flight incident. Routing rules are matched against the incident's
//! context, abstract service contacts are resolved into individuals through
//! directory plugins, and every individual is upserted exactly once per email.
//! Inbound credentials are validated by pluggable authentication providers.

pub mod auth;
pub mod config;
pub mod plugins;
pub mod router;
pub mod storage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use plugins::PluginRegistry;
use router::{ContactResolver, RouteMatcher};
use storage::{FileStorage, IndividualStore, MemoryStorage};

/// Core error types for Beacon
#[derive(Error, Debug)]
pub enum BeaconError {
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] plugins::PluginError),

    #[error("Routing error: {0}")]
    Routing(#[from] router::RoutingError),

    #[error("Resolution error: {0}")]
    Resolve(#[from] router::ResolveError),

    #[error("Authentication error: {0}")]
    Auth(#[from] auth::AuthError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// An identity that can only be addressed through a directory plugin
///
/// `contact_type` is the slug of the contact plugin that knows how to turn
/// `external_id` into an email address (e.g. `ldap`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceContact {
    #[serde(rename = "type")]
    pub contact_type: String,
    pub external_id: String,
}

impl ServiceContact {
    pub fn new(contact_type: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            contact_type: contact_type.into(),
            external_id: external_id.into(),
        }
    }

    /// Two service contacts are the same identity when type and id agree
    pub fn same_identity(&self, other: &ServiceContact) -> bool {
        self.contact_type == other.contact_type && self.external_id == other.external_id
    }
}

impl std::fmt::Display for ServiceContact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.contact_type, self.external_id)
    }
}

/// A reference document recommended for an incident
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference {
    /// Unique document name, used as its identity
    pub name: String,
    pub weblink: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DocumentReference {
    pub fn new(name: impl Into<String>, weblink: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weblink: weblink.into(),
            description: None,
        }
    }
}

/// A response team recommended for an incident
///
/// Teams are never resolved into individuals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamContact {
    pub name: String,
    /// Team distribution address, used as its identity
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl TeamContact {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            company: None,
        }
    }
}

/// A durable individual record, unique by email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Individual {
    pub id: String,
    /// Normalized (trimmed, lowercase) email address
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Individual {
    /// Create a new individual with generated ID and timestamps
    pub fn new(email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            name: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Everything a resolution pass needs: plugins, the individual store and the
/// routing rules
///
/// Handed to document and participant resolver plugins the same way a
/// database session would be.
#[derive(Clone)]
pub struct Session {
    pub plugins: Arc<PluginRegistry>,
    pub store: Arc<dyn IndividualStore>,
    pub routes: Arc<RouteMatcher>,
}

impl Session {
    pub fn new(
        plugins: Arc<PluginRegistry>,
        store: Arc<dyn IndividualStore>,
        routes: Arc<RouteMatcher>,
    ) -> Self {
        Self {
            plugins,
            store,
            routes,
        }
    }

    /// Build a session from configuration: storage backend, plugins and rules
    pub async fn from_config(config: &config::Config) -> Result<Self, BeaconError> {
        let store: Arc<dyn IndividualStore> = match config.storage.backend {
            config::StorageBackendType::Memory => Arc::new(MemoryStorage::new()),
            config::StorageBackendType::File => {
                let path = config
                    .storage
                    .path
                    .clone()
                    .unwrap_or_else(config::Config::default_storage_path);
                Arc::new(FileStorage::new(path).await?)
            }
        };

        let plugins = Arc::new(PluginRegistry::from_config(config)?);
        let routes = Arc::new(RouteMatcher::with_rules(config.routing.clone())?);

        Ok(Self::new(plugins, store, routes))
    }

    /// A contact resolver bound to this session's plugins and store
    pub fn resolver(&self) -> ContactResolver {
        ContactResolver::new(self.plugins.clone(), self.store.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_individual_creation() {
        let individual = Individual::new("a@x.com").with_name("Alice");
        assert_eq!(individual.email, "a@x.com");
        assert_eq!(individual.name.as_deref(), Some("Alice"));
        assert!(!individual.id.is_empty());
        assert_eq!(individual.created_at, individual.updated_at);
    }

    #[test]
    fn test_service_contact_identity() {
        let a = ServiceContact::new("ldap", "svc42");
        let b = ServiceContact::new("ldap", "svc42");
        let c = ServiceContact::new("okta", "svc42");

        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
        assert_eq!(a.to_string(), "ldap:svc42");
    }

    #[test]
    fn test_service_contact_serialization() {
        let contact = ServiceContact::new("ldap", "svc42");
        let json = serde_json::to_value(&contact).unwrap();
        assert_eq!(json["type"], "ldap");
        assert_eq!(json["external_id"], "svc42");
    }
}
