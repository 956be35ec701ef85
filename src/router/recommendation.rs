//! The recommendation handed back to callers

use super::RoutingRule;
use crate::{DocumentReference, Individual, ServiceContact, TeamContact};
use serde::{Deserialize, Serialize};

/// Documents, contacts and teams recommended for an incident
///
/// Every list keeps first-seen order and holds each identity once, so the
/// same request always yields the same output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub documents: Vec<DocumentReference>,
    #[serde(default)]
    pub service_contacts: Vec<ServiceContact>,
    #[serde(default)]
    pub individual_contacts: Vec<Individual>,
    #[serde(default)]
    pub team_contacts: Vec<TeamContact>,
}

impl Recommendation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
            && self.service_contacts.is_empty()
            && self.individual_contacts.is_empty()
            && self.team_contacts.is_empty()
    }

    /// Add a document unless one with the same name is present
    pub fn push_document(&mut self, document: DocumentReference) -> bool {
        if self.documents.iter().any(|d| d.name == document.name) {
            return false;
        }
        self.documents.push(document);
        true
    }

    /// Add a service contact unless the same identity is present
    pub fn push_service_contact(&mut self, contact: ServiceContact) -> bool {
        if self.service_contacts.iter().any(|c| c.same_identity(&contact)) {
            return false;
        }
        self.service_contacts.push(contact);
        true
    }

    /// Add an individual unless one with the same email is present
    pub fn push_individual(&mut self, individual: Individual) -> bool {
        if self
            .individual_contacts
            .iter()
            .any(|i| i.email == individual.email)
        {
            return false;
        }
        self.individual_contacts.push(individual);
        true
    }

    /// Add a team unless one with the same email is present
    pub fn push_team_contact(&mut self, team: TeamContact) -> bool {
        if self.team_contacts.iter().any(|t| t.email == team.email) {
            return false;
        }
        self.team_contacts.push(team);
        true
    }

    /// Merge everything a matched rule recommends
    pub fn extend_from_rule(&mut self, rule: &RoutingRule) {
        for document in &rule.documents {
            self.push_document(document.clone());
        }
        for contact in &rule.service_contacts {
            self.push_service_contact(contact.clone());
        }
        for team in &rule.team_contacts {
            self.push_team_contact(team.clone());
        }
    }
}
