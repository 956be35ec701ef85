//! Plugin system for Beacon
//!
//! Plugins provide one capability each:
//! - Ticket: create and update incident tickets
//! - DocumentResolver / ParticipantResolver: recommend documents and people
//! - Contact: resolve a service contact's external id to an email
//! - AuthenticationProvider: extract the current user from a request
//!
//! Every capability has its own trait. The registry maps a slug to exactly one
//! registered plugin and hands it out through typed lookups.

mod builtin;
mod directory;
pub mod types;

pub use builtin::{CoreDocumentResolverPlugin, CoreParticipantResolverPlugin, CoreTicketPlugin};
pub use directory::{HttpDirectoryPlugin, StaticDirectoryPlugin};
pub use types::{PluginInfo, PluginType, TicketResource, TicketUpdate};

use crate::auth::{AuthError, BasicAuthProvider, ExternalAuthProvider, ProviderIdentity};
use crate::config::{Config, DirectorySource};
use crate::{BeaconError, DocumentReference, Individual, Session, TeamContact};
use async_trait::async_trait;
use http::HeaderMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Plugin-related errors
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin not found: {0}")]
    NotFound(String),

    #[error("Plugin '{slug}' is a {actual} plugin, expected {expected}")]
    CapabilityMismatch {
        slug: String,
        expected: PluginType,
        actual: PluginType,
    },

    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Metadata shared by every plugin
pub trait Plugin: Send + Sync {
    /// Unique identifier the plugin is registered under
    fn slug(&self) -> &str;

    /// Human-readable title
    fn title(&self) -> &str;

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn author(&self) -> &str {
        "Beacon"
    }

    fn author_url(&self) -> Option<&str> {
        None
    }

    fn description(&self) -> Option<&str> {
        None
    }
}

/// Creates and updates incident tickets
#[async_trait]
pub trait TicketPlugin: Plugin {
    async fn create(
        &self,
        incident_id: u64,
        title: &str,
        incident_type: &str,
        incident_priority: &str,
        commander: &str,
        reporter: &str,
    ) -> Result<TicketResource, PluginError>;

    async fn update(&self, ticket_id: &str, update: &TicketUpdate) -> Result<(), PluginError>;
}

/// Recommends reference documents for an incident
#[async_trait]
pub trait DocumentResolverPlugin: Plugin {
    async fn get(
        &self,
        incident_type: &str,
        incident_priority: &str,
        incident_description: &str,
        session: &Session,
    ) -> Result<Vec<DocumentReference>, BeaconError>;
}

/// Recommends individuals and teams for an incident
#[async_trait]
pub trait ParticipantResolverPlugin: Plugin {
    async fn get(
        &self,
        incident_type: &str,
        incident_priority: &str,
        incident_description: &str,
        session: &Session,
    ) -> Result<(Vec<Individual>, Vec<TeamContact>), BeaconError>;
}

/// Resolves external identities of one directory into email addresses
#[async_trait]
pub trait ContactPlugin: Plugin {
    async fn get(&self, external_id: &str) -> Result<String, PluginError>;
}

/// Extracts the current user from inbound request headers
///
/// `Ok(None)` means no credential was presented; an error means a credential
/// was presented and rejected.
#[async_trait]
pub trait AuthenticationProviderPlugin: Plugin {
    async fn get_current_user(&self, headers: &HeaderMap) -> Result<Option<String>, AuthError>;
}

/// A plugin together with the capability it was registered for
#[derive(Clone)]
pub enum RegisteredPlugin {
    Ticket(Arc<dyn TicketPlugin>),
    DocumentResolver(Arc<dyn DocumentResolverPlugin>),
    ParticipantResolver(Arc<dyn ParticipantResolverPlugin>),
    Contact(Arc<dyn ContactPlugin>),
    AuthenticationProvider(Arc<dyn AuthenticationProviderPlugin>),
}

impl RegisteredPlugin {
    pub fn plugin_type(&self) -> PluginType {
        match self {
            RegisteredPlugin::Ticket(_) => PluginType::Ticket,
            RegisteredPlugin::DocumentResolver(_) => PluginType::DocumentResolver,
            RegisteredPlugin::ParticipantResolver(_) => PluginType::ParticipantResolver,
            RegisteredPlugin::Contact(_) => PluginType::Contact,
            RegisteredPlugin::AuthenticationProvider(_) => PluginType::AuthenticationProvider,
        }
    }

    pub fn info(&self) -> PluginInfo {
        let plugin_type = self.plugin_type();
        match self {
            RegisteredPlugin::Ticket(p) => PluginInfo::of(p.as_ref(), plugin_type),
            RegisteredPlugin::DocumentResolver(p) => PluginInfo::of(p.as_ref(), plugin_type),
            RegisteredPlugin::ParticipantResolver(p) => PluginInfo::of(p.as_ref(), plugin_type),
            RegisteredPlugin::Contact(p) => PluginInfo::of(p.as_ref(), plugin_type),
            RegisteredPlugin::AuthenticationProvider(p) => PluginInfo::of(p.as_ref(), plugin_type),
        }
    }

    pub fn slug(&self) -> String {
        match self {
            RegisteredPlugin::Ticket(p) => p.slug().to_string(),
            RegisteredPlugin::DocumentResolver(p) => p.slug().to_string(),
            RegisteredPlugin::ParticipantResolver(p) => p.slug().to_string(),
            RegisteredPlugin::Contact(p) => p.slug().to_string(),
            RegisteredPlugin::AuthenticationProvider(p) => p.slug().to_string(),
        }
    }

    fn mismatch(&self, slug: &str, expected: PluginType) -> PluginError {
        PluginError::CapabilityMismatch {
            slug: slug.to_string(),
            expected,
            actual: self.plugin_type(),
        }
    }
}

/// Registry of available plugins
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, RegisteredPlugin>>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry with the core plugins, configured directories and
    /// authentication providers
    pub fn from_config(config: &Config) -> Result<Self, BeaconError> {
        let registry = Self::new();

        registry.register(RegisteredPlugin::Ticket(Arc::new(CoreTicketPlugin::new(
            config.ui.url.clone(),
        ))));
        registry.register(RegisteredPlugin::DocumentResolver(Arc::new(
            CoreDocumentResolverPlugin,
        )));
        registry.register(RegisteredPlugin::ParticipantResolver(Arc::new(
            CoreParticipantResolverPlugin,
        )));

        for directory in &config.directories {
            let plugin: Arc<dyn ContactPlugin> = match &directory.source {
                DirectorySource::Static { entries } => Arc::new(
                    StaticDirectoryPlugin::new(directory.slug.clone(), entries.clone())
                        .with_title(directory.title.clone()),
                ),
                DirectorySource::Http { url, timeout } => Arc::new(
                    HttpDirectoryPlugin::new(directory.slug.clone(), url.clone(), *timeout)?
                        .with_title(directory.title.clone()),
                ),
            };
            registry.register(RegisteredPlugin::Contact(plugin));
        }

        if let Some(secret) = &config.auth.jwt_secret {
            registry.register(RegisteredPlugin::AuthenticationProvider(Arc::new(
                BasicAuthProvider::new(secret.clone()),
            )));
        }

        for identity in [ProviderIdentity::pkce(), ProviderIdentity::iap()] {
            let provider = ExternalAuthProvider::from_config(identity, &config.auth.external)?;
            registry.register(RegisteredPlugin::AuthenticationProvider(Arc::new(provider)));
        }

        Ok(registry)
    }

    /// Register a plugin, replacing any plugin with the same slug
    pub fn register(&self, plugin: RegisteredPlugin) {
        let slug = plugin.slug();
        debug!(slug = %slug, plugin_type = %plugin.plugin_type(), "Registering plugin");
        let mut plugins = self.plugins.write();
        plugins.insert(slug, plugin);
    }

    /// Unregister a plugin by slug
    pub fn unregister(&self, slug: &str) -> Option<RegisteredPlugin> {
        let mut plugins = self.plugins.write();
        plugins.remove(slug)
    }

    /// Get a plugin by slug
    pub fn get(&self, slug: &str) -> Result<RegisteredPlugin, PluginError> {
        let plugins = self.plugins.read();
        plugins
            .get(slug)
            .cloned()
            .ok_or_else(|| PluginError::NotFound(slug.to_string()))
    }

    pub fn ticket(&self, slug: &str) -> Result<Arc<dyn TicketPlugin>, PluginError> {
        match self.get(slug)? {
            RegisteredPlugin::Ticket(p) => Ok(p),
            other => Err(other.mismatch(slug, PluginType::Ticket)),
        }
    }

    pub fn document_resolver(
        &self,
        slug: &str,
    ) -> Result<Arc<dyn DocumentResolverPlugin>, PluginError> {
        match self.get(slug)? {
            RegisteredPlugin::DocumentResolver(p) => Ok(p),
            other => Err(other.mismatch(slug, PluginType::DocumentResolver)),
        }
    }

    pub fn participant_resolver(
        &self,
        slug: &str,
    ) -> Result<Arc<dyn ParticipantResolverPlugin>, PluginError> {
        match self.get(slug)? {
            RegisteredPlugin::ParticipantResolver(p) => Ok(p),
            other => Err(other.mismatch(slug, PluginType::ParticipantResolver)),
        }
    }

    pub fn contact(&self, slug: &str) -> Result<Arc<dyn ContactPlugin>, PluginError> {
        match self.get(slug)? {
            RegisteredPlugin::Contact(p) => Ok(p),
            other => Err(other.mismatch(slug, PluginType::Contact)),
        }
    }

    pub fn authentication(
        &self,
        slug: &str,
    ) -> Result<Arc<dyn AuthenticationProviderPlugin>, PluginError> {
        match self.get(slug)? {
            RegisteredPlugin::AuthenticationProvider(p) => Ok(p),
            other => Err(other.mismatch(slug, PluginType::AuthenticationProvider)),
        }
    }

    /// Describe every registered plugin, sorted by slug
    pub fn list(&self) -> Vec<PluginInfo> {
        let plugins = self.plugins.read();
        let mut infos: Vec<PluginInfo> = plugins.values().map(RegisteredPlugin::info).collect();
        infos.sort_by(|a, b| a.slug.cmp(&b.slug));
        infos
    }

    pub fn len(&self) -> usize {
        self.plugins.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.read().is_empty()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
