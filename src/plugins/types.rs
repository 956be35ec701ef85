//! Plugin metadata and ticket payload types

use super::Plugin;
use serde::{Deserialize, Serialize};

/// Capability a plugin is registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginType {
    /// Creates and updates incident tickets
    Ticket,
    /// Recommends reference documents for an incident
    DocumentResolver,
    /// Recommends individuals and teams for an incident
    ParticipantResolver,
    /// Resolves a service contact's external id to an email address
    Contact,
    /// Extracts the current user from inbound credentials
    AuthenticationProvider,
}

impl std::fmt::Display for PluginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PluginType::Ticket => "ticket",
            PluginType::DocumentResolver => "document-resolver",
            PluginType::ParticipantResolver => "participant-resolver",
            PluginType::Contact => "contact",
            PluginType::AuthenticationProvider => "authentication-provider",
        };
        f.write_str(name)
    }
}

/// Descriptive information about a registered plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub title: String,
    pub slug: String,
    pub version: String,
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PluginInfo {
    pub fn of<P: Plugin + ?Sized>(plugin: &P, plugin_type: PluginType) -> Self {
        Self {
            title: plugin.title().to_string(),
            slug: plugin.slug().to_string(),
            version: plugin.version().to_string(),
            plugin_type,
            author: plugin.author().to_string(),
            author_url: plugin.author_url().map(str::to_string),
            description: plugin.description().map(str::to_string),
        }
    }
}

/// A ticket created by a ticket plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketResource {
    pub resource_id: String,
    pub weblink: String,
    pub resource_type: String,
}

/// Fields to change on an existing ticket; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub incident_type: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub commander_email: Option<String>,
    pub reporter_email: Option<String>,
    pub conversation_weblink: Option<String>,
    pub conference_weblink: Option<String>,
    pub document_weblink: Option<String>,
    pub storage_weblink: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub cost: Option<String>,
}

impl TicketUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_type_display_matches_serde() {
        let json = serde_json::to_string(&PluginType::DocumentResolver).unwrap();
        assert_eq!(json, "\"document-resolver\"");
        assert_eq!(PluginType::DocumentResolver.to_string(), "document-resolver");
    }

    #[test]
    fn test_ticket_update_is_empty() {
        assert!(TicketUpdate::default().is_empty());
        let update = TicketUpdate {
            status: Some("Stable".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
