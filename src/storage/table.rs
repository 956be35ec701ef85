//! Shared individual table and staged transactions

use super::{normalize_email, IndividualTransaction, StorageError};
use crate::Individual;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Committed individuals keyed by normalized email
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct IndividualTable {
    pub(crate) individuals: HashMap<String, Individual>,
}

impl IndividualTable {
    pub(crate) fn get(&self, email: &str) -> Option<&Individual> {
        self.individuals.get(email)
    }

    pub(crate) fn sorted(&self) -> Vec<Individual> {
        let mut all: Vec<Individual> = self.individuals.values().cloned().collect();
        all.sort_by(|a, b| a.email.cmp(&b.email));
        all
    }

    /// Merge staged individuals in
    ///
    /// An email that already exists keeps its row; a name supplied by the
    /// staged record wins.
    pub(crate) fn merge(&mut self, staged: HashMap<String, Individual>) {
        for (email, individual) in staged {
            match self.individuals.get_mut(&email) {
                Some(existing) => {
                    debug!(email = %email, "Email committed concurrently, reusing existing individual");
                    if individual.name.is_some() && individual.name != existing.name {
                        existing.name = individual.name;
                        existing.updated_at = Utc::now();
                    }
                }
                None => {
                    self.individuals.insert(email, individual);
                }
            }
        }
    }
}

/// Durable sink staged records are committed to
#[async_trait]
pub(crate) trait Snapshot: Send + Sync {
    /// Merge `staged` into the latest durable table, persist it, and return
    /// the table that was written
    ///
    /// `current` is this store's view; sinks shared with other writers
    /// re-read their own state instead.
    async fn apply(
        &self,
        current: &IndividualTable,
        staged: HashMap<String, Individual>,
    ) -> Result<IndividualTable, StorageError>;
}

/// Table shared between a store and its transactions
pub(crate) struct SharedTable {
    pub(crate) table: RwLock<IndividualTable>,
    /// Serializes commits so each one sees the previous one's result
    commit_lock: tokio::sync::Mutex<()>,
    sink: Box<dyn Snapshot>,
}

impl SharedTable {
    pub(crate) fn new(table: IndividualTable, sink: Box<dyn Snapshot>) -> Arc<Self> {
        Arc::new(Self {
            table: RwLock::new(table),
            commit_lock: tokio::sync::Mutex::new(()),
            sink,
        })
    }

    pub(crate) fn begin(self: &Arc<Self>) -> StagedTransaction {
        StagedTransaction {
            shared: Arc::clone(self),
            staged: HashMap::new(),
            touched: Vec::new(),
        }
    }

    /// Apply staged records and persist; the in-memory table only changes
    /// once the sink succeeded
    async fn commit(&self, staged: HashMap<String, Individual>) -> Result<(), StorageError> {
        let _guard = self.commit_lock.lock().await;

        let current = self.table.read().clone();
        let next = self.sink.apply(&current, staged).await?;
        *self.table.write() = next;

        Ok(())
    }
}

/// Transaction staging new individuals until commit
pub(crate) struct StagedTransaction {
    shared: Arc<SharedTable>,
    staged: HashMap<String, Individual>,
    touched: Vec<String>,
}

impl StagedTransaction {
    fn touch(&mut self, email: &str) {
        if !self.touched.iter().any(|e| e == email) {
            self.touched.push(email.to_string());
        }
    }
}

#[async_trait]
impl IndividualTransaction for StagedTransaction {
    async fn get_or_create(&mut self, email: &str) -> Result<Individual, StorageError> {
        let email = normalize_email(email)?;
        self.touch(&email);

        if let Some(individual) = self.staged.get(&email) {
            return Ok(individual.clone());
        }

        if let Some(individual) = self.shared.table.read().get(&email) {
            return Ok(individual.clone());
        }

        debug!(email = %email, "Staging new individual");
        let individual = Individual::new(email.clone());
        self.staged.insert(email, individual.clone());
        Ok(individual)
    }

    async fn commit(self: Box<Self>) -> Result<Vec<Individual>, StorageError> {
        let StagedTransaction {
            shared,
            staged,
            touched,
        } = *self;

        if !staged.is_empty() {
            shared.commit(staged).await?;
        }

        let table = shared.table.read();
        Ok(touched
            .iter()
            .filter_map(|email| table.get(email).cloned())
            .collect())
    }

    fn rollback(self: Box<Self>) {
        debug!(staged = self.staged.len(), "Rolling back transaction");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopSink;

    #[async_trait]
    impl Snapshot for NoopSink {
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

    struct FailingSink;

    #[async_trait]
    impl Snapshot for FailingSink {
        async fn apply(
            &self,
            _current: &IndividualTable,
            _staged: HashMap<String, Individual>,
        ) -> Result<IndividualTable, StorageError> {
            Err(StorageError::Unavailable("disk full".to_string()))
        }
    }

    #[test]
    fn test_merge_keeps_existing_row() {
        let mut table = IndividualTable::default();
        let first = Individual::new("a@x.com");
        table.individuals.insert("a@x.com".to_string(), first.clone());

        let mut staged = HashMap::new();
        staged.insert(
            "a@x.com".to_string(),
            Individual::new("a@x.com").with_name("Alice"),
        );
        table.merge(staged);

        let merged = table.get("a@x.com").unwrap();
        assert_eq!(merged.id, first.id);
        assert_eq!(merged.name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_staged_lookup_sees_own_creation() {
        let shared = SharedTable::new(IndividualTable::default(), Box::new(NoopSink));
        let mut tx = Box::new(shared.begin());

        let a = tx.get_or_create("a@x.com").await.unwrap();
        let b = tx.get_or_create("A@x.com ").await.unwrap();
        assert_eq!(a.id, b.id);
        assert!(shared.table.read().get("a@x.com").is_none());

        let committed = tx.commit().await.unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].id, a.id);
    }

    #[tokio::test]
    async fn test_failed_sink_leaves_table_untouched() {
        let shared = SharedTable::new(IndividualTable::default(), Box::new(FailingSink));
        let mut tx = Box::new(shared.begin());
        tx.get_or_create("a@x.com").await.unwrap();

        let result = tx.commit().await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert!(shared.table.read().individuals.is_empty());
    }
}
