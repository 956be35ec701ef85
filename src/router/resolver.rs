//! Service contact resolution into individuals

use super::{Recommendation, ResolveError};
use crate::plugins::PluginRegistry;
use crate::storage::{IndividualStore, IndividualTransaction};
use crate::{Individual, ServiceContact};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves the service contacts of a recommendation into individuals
///
/// One call is one pass: every contact is resolved inside a single store
/// transaction which is committed only if all of them succeed.
pub struct ContactResolver {
    plugins: Arc<PluginRegistry>,
    store: Arc<dyn IndividualStore>,
}

impl ContactResolver {
    pub fn new(plugins: Arc<PluginRegistry>, store: Arc<dyn IndividualStore>) -> Self {
        Self { plugins, store }
    }

    /// Resolve all service contacts, consuming them, and append the
    /// resulting individuals in contact order
    ///
    /// Teams and documents pass through untouched.
    pub async fn resolve(
        &self,
        mut recommendation: Recommendation,
    ) -> Result<Recommendation, ResolveError> {
        let contacts = std::mem::take(&mut recommendation.service_contacts);
        let mut tx = self.store.begin().await?;

        for contact in &contacts {
            match self.resolve_contact(tx.as_mut(), contact).await {
                Ok(individual) => {
                    recommendation.push_individual(individual);
                }
                Err(e) => {
                    warn!(contact = %contact, error = %e, "Contact resolution failed, rolling back");
                    tx.rollback();
                    return Err(e);
                }
            }
        }

        let committed = tx.commit().await?;
        info!(
            contacts = contacts.len(),
            individuals = committed.len(),
            "Committed contact resolution"
        );

        // A concurrent pass may have committed the same email first
        for individual in &mut recommendation.individual_contacts {
            if let Some(canonical) = committed.iter().find(|c| c.email == individual.email) {
                *individual = canonical.clone();
            }
        }

        Ok(recommendation)
    }

    async fn resolve_contact(
        &self,
        tx: &mut dyn IndividualTransaction,
        contact: &ServiceContact,
    ) -> Result<Individual, ResolveError> {
        let plugin = self
            .plugins
            .contact(&contact.contact_type)
            .map_err(|_| ResolveError::UnresolvedContactType(contact.contact_type.clone()))?;

        debug!(contact = %contact, plugin = plugin.slug(), "Resolving service contact");
        let email = plugin.get(&contact.external_id).await?;

        Ok(tx.get_or_create(&email).await?)
    }
}
