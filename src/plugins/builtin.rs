//! Built-in plugins
//!
//! The ticket plugin tracks incidents inside Beacon itself; the resolver
//! plugins run the routing rules of the session they are handed.

use super::{
    DocumentResolverPlugin, ParticipantResolverPlugin, Plugin, PluginError, TicketPlugin,
    TicketResource, TicketUpdate,
};
use crate::router::RoutingRequest;
use crate::{BeaconError, DocumentReference, Individual, Session, TeamContact};
use async_trait::async_trait;
use tracing::debug;

const TICKET_RESOURCE_TYPE: &str = "beacon-internal-ticket";

/// Internal ticket tracking
pub struct CoreTicketPlugin {
    ui_url: String,
}

impl CoreTicketPlugin {
    pub fn new(ui_url: impl Into<String>) -> Self {
        let ui_url: String = ui_url.into();
        Self {
            ui_url: ui_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Plugin for CoreTicketPlugin {
    fn slug(&self) -> &str {
        "beacon-ticket"
    }

    fn title(&self) -> &str {
        "Beacon - Tickets"
    }

    fn description(&self) -> Option<&str> {
        Some("Uses Beacon itself to create a ticket.")
    }
}

#[async_trait]
impl TicketPlugin for CoreTicketPlugin {
    async fn create(
        &self,
        incident_id: u64,
        title: &str,
        _incident_type: &str,
        _incident_priority: &str,
        _commander: &str,
        _reporter: &str,
    ) -> Result<TicketResource, PluginError> {
        let resource_id = format!("beacon-{incident_id}");
        debug!(resource_id = %resource_id, title = %title, "Creating internal ticket");

        Ok(TicketResource {
            weblink: format!("{}/incidents/{}", self.ui_url, resource_id),
            resource_id,
            resource_type: TICKET_RESOURCE_TYPE.to_string(),
        })
    }

    async fn update(&self, ticket_id: &str, update: &TicketUpdate) -> Result<(), PluginError> {
        // Internal tickets mirror the incident; nothing to push
        debug!(ticket_id = %ticket_id, empty = update.is_empty(), "Ignoring internal ticket update");
        Ok(())
    }
}

/// Recommends documents from the session's routing rules
pub struct CoreDocumentResolverPlugin;

impl Plugin for CoreDocumentResolverPlugin {
    fn slug(&self) -> &str {
        "beacon-document-resolver"
    }

    fn title(&self) -> &str {
        "Beacon - Document Resolver"
    }

    fn description(&self) -> Option<&str> {
        Some("Uses Beacon's routing rules to recommend incident documents.")
    }
}

#[async_trait]
impl DocumentResolverPlugin for CoreDocumentResolverPlugin {
    async fn get(
        &self,
        incident_type: &str,
        incident_priority: &str,
        incident_description: &str,
        session: &Session,
    ) -> Result<Vec<DocumentReference>, BeaconError> {
        let request =
            RoutingRequest::for_incident(incident_type, incident_priority, incident_description)?;
        Ok(session.routes.recommend(&request).documents)
    }
}

/// Recommends participants from the session's routing rules, resolving
/// service contacts into individuals
pub struct CoreParticipantResolverPlugin;

impl Plugin for CoreParticipantResolverPlugin {
    fn slug(&self) -> &str {
        "beacon-participant-resolver"
    }

    fn title(&self) -> &str {
        "Beacon - Participant Resolver"
    }

    fn description(&self) -> Option<&str> {
        Some("Uses Beacon's routing rules to determine incident participants.")
    }
}

#[async_trait]
impl ParticipantResolverPlugin for CoreParticipantResolverPlugin {
    async fn get(
        &self,
        incident_type: &str,
        incident_priority: &str,
        incident_description: &str,
        session: &Session,
    ) -> Result<(Vec<Individual>, Vec<TeamContact>), BeaconError> {
        let request =
            RoutingRequest::for_incident(incident_type, incident_priority, incident_description)?;
        let recommendation = session.routes.recommend(&request);
        let resolved = session.resolver().resolve(recommendation).await?;

        Ok((resolved.individual_contacts, resolved.team_contacts))
    }
}
