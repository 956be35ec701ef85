//! Storage backends for individual records
//!
//! Individuals are unique by email. All writes go through transactions whose
//! commit is conflict-safe: an email committed concurrently by another
//! transaction is reused, never duplicated.

mod file;
mod memory;
mod table;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::Individual;
use async_trait::async_trait;
use thiserror::Error;

/// Storage-related errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid email address: {0:?}")]
    InvalidEmail(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Trait for individual storage backends
#[async_trait]
pub trait IndividualStore: Send + Sync {
    /// Retrieve an individual by email
    async fn get_by_email(&self, email: &str) -> Result<Option<Individual>, StorageError>;

    /// List all individuals, ordered by email
    async fn list(&self) -> Result<Vec<Individual>, StorageError>;

    /// Start a transaction
    async fn begin(&self) -> Result<Box<dyn IndividualTransaction>, StorageError>;

    /// Get or create a single individual in its own transaction
    async fn get_or_create(&self, email: &str) -> Result<Individual, StorageError> {
        let mut tx = self.begin().await?;
        let individual = tx.get_or_create(email).await?;
        let committed = tx.commit().await?;
        Ok(committed
            .into_iter()
            .find(|i| i.email == individual.email)
            .unwrap_or(individual))
    }
}

/// A unit of work against an [`IndividualStore`]
///
/// Dropping a transaction without committing discards it.
#[async_trait]
pub trait IndividualTransaction: Send {
    /// Return the individual for `email`, staging a new one if absent
    ///
    /// Later calls in the same transaction observe earlier creations.
    async fn get_or_create(&mut self, email: &str) -> Result<Individual, StorageError>;

    /// Persist staged individuals atomically
    ///
    /// Returns the committed record for every email touched, in first-touch
    /// order.
    async fn commit(self: Box<Self>) -> Result<Vec<Individual>, StorageError>;

    /// Discard everything staged
    fn rollback(self: Box<Self>);
}

/// Normalize an email for use as a key: trimmed and lowercased
pub fn normalize_email(email: &str) -> Result<String, StorageError> {
    let normalized = email.trim().to_lowercase();
    if normalized.is_empty() || !normalized.contains('@') {
        return Err(StorageError::InvalidEmail(email.to_string()));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  A@X.com ").unwrap(), "a@x.com");
        assert!(matches!(
            normalize_email(""),
            Err(StorageError::InvalidEmail(_))
        ));
        assert!(normalize_email("not-an-email").is_err());
    }
}
