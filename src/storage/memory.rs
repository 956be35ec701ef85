//! In-memory storage backend

use super::table::{IndividualTable, SharedTable, Snapshot};
use super::{normalize_email, IndividualStore, IndividualTransaction, StorageError};
use crate::Individual;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-local storage; contents are lost on exit
pub struct MemoryStorage {
    shared: Arc<SharedTable>,
}

struct Discard;

#[async_trait]
impl Snapshot for Discard {
    async fn apply(
        &self,
        current: &IndividualTable,
        staged: HashMap<String, Individual>,
    ) -> Result<IndividualTable, StorageError> {
        let mut next = current.clone();
        next.merge(staged);
        Ok(next)
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            shared: SharedTable::new(IndividualTable::default(), Box::new(Discard)),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndividualStore for MemoryStorage {
    async fn get_by_email(&self, email: &str) -> Result<Option<Individual>, StorageError> {
        let email = normalize_email(email)?;
        Ok(self.shared.table.read().get(&email).cloned())
    }

    async fn list(&self) -> Result<Vec<Individual>, StorageError> {
        Ok(self.shared.table.read().sorted())
    }

    async fn begin(&self) -> Result<Box<dyn IndividualTransaction>, StorageError> {
        Ok(Box::new(self.shared.begin()))
    }
}
