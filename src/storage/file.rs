//! JSON file storage backend
//!
//! Keeps individuals in memory and rewrites the file on every commit.
//! Several stores (or processes) may share one file: every commit holds an
//! exclusive lock on `<file>.lock`, re-reads the file and merges into it.

use super::table::{IndividualTable, SharedTable, Snapshot};
use super::{normalize_email, IndividualStore, IndividualTransaction, StorageError};
use crate::Individual;
use async_trait::async_trait;
use fd_lock::RwLock as FileLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FILE_VERSION: u32 = 1;

/// File-based storage
pub struct FileStorage {
    /// Path to the storage file
    path: PathBuf,
    shared: std::sync::Arc<SharedTable>,
}

/// On-disk format for the storage file
#[derive(Debug, Serialize, Deserialize)]
struct StorageFile {
    /// Version for future migrations
    version: u32,
    individuals: Vec<Individual>,
}

/// Commits staged records to disk under the file lock
struct FileSink {
    path: PathBuf,
}

#[async_trait]
impl Snapshot for FileSink {
    async fn apply(
        &self,
        _current: &IndividualTable,
        staged: HashMap<String, Individual>,
    ) -> Result<IndividualTable, StorageError> {
        let path = self.path.clone();
        blocking(move || {
            with_lock(&path, |path| {
                let mut table = load_or_default(path)?;
                debug!(
                    on_disk = table.individuals.len(),
                    staged = staged.len(),
                    "Merging into latest storage file"
                );
                table.merge(staged);
                save(path, &table)?;
                Ok(table)
            })
        })
        .await
    }
}

impl FileStorage {
    /// Create a new file storage, loading existing data if present
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let table = {
            let path = path.clone();
            blocking(move || {
                with_lock(&path, |path| {
                    if path.exists() {
                        load(path)
                    } else {
                        let table = IndividualTable::default();
                        save(path, &table)?;
                        Ok(table)
                    }
                })
            })
            .await?
        };

        info!(path = %path.display(), individuals = table.individuals.len(), "Opened individual storage");

        Ok(Self {
            shared: SharedTable::new(
                table,
                Box::new(FileSink {
                    path: path.clone(),
                }),
            ),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Run blocking file work off the async runtime
async fn blocking<T, F>(work: F) -> Result<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StorageError::Unavailable(format!("Storage task failed: {}", e)))?
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

/// Run `work` while holding the exclusive lock for `path`
fn with_lock<T>(
    path: &Path,
    work: impl FnOnce(&Path) -> Result<T, StorageError>,
) -> Result<T, StorageError> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(lock_path(path))?;
    let mut lock = FileLock::new(file);
    let _guard = lock.write()?;
    work(path)
}

fn load_or_default(path: &Path) -> Result<IndividualTable, StorageError> {
    if path.exists() {
        load(path)
    } else {
        Ok(IndividualTable::default())
    }
}

fn load(path: &Path) -> Result<IndividualTable, StorageError> {
    let content = fs::read_to_string(path)?;
    let file: StorageFile = serde_json::from_str(&content)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

    if file.version > FILE_VERSION {
        return Err(StorageError::Serialization(format!(
            "Unsupported storage file version: {}",
            file.version
        )));
    }

    let mut individuals = HashMap::new();
    for individual in file.individuals {
        let email = normalize_email(&individual.email)?;
        individuals.insert(email, individual);
    }

    Ok(IndividualTable { individuals })
}

fn save(path: &Path, table: &IndividualTable) -> Result<(), StorageError> {
    let file = StorageFile {
        version: FILE_VERSION,
        individuals: table.sorted(),
    };

    let content = serde_json::to_string_pretty(&file)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

    // Write atomically by writing to temp file first
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, &content)?;
    fs::rename(&temp_path, path)?;

    Ok(())
}

#[async_trait]
impl IndividualStore for FileStorage {
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_storage_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("individuals.json");

        let id = {
            let storage = FileStorage::new(&path).await.unwrap();
            storage.get_or_create("a@x.com").await.unwrap().id
        };

        let storage = FileStorage::new(&path).await.unwrap();
        let loaded = storage.get_by_email("a@x.com").await.unwrap();
        assert_eq!(loaded.unwrap().id, id);
    }

    #[tokio::test]
    async fn test_rollback_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("individuals.json");
        let storage = FileStorage::new(&path).await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        tx.get_or_create("a@x.com").await.unwrap();
        tx.rollback();

        let reopened = FileStorage::new(&path).await.unwrap();
        assert!(reopened.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stores_sharing_a_file_keep_each_others_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("individuals.json");

        let a = FileStorage::new(&path).await.unwrap();
        let b = FileStorage::new(&path).await.unwrap();
        a.get_or_create("a@x.com").await.unwrap();
        b.get_or_create("b@x.com").await.unwrap();

        // b's commit merged a's row in and refreshed its own view
        assert!(b.get_by_email("a@x.com").await.unwrap().is_some());

        let reopened = FileStorage::new(&path).await.unwrap();
        let emails: Vec<String> = reopened
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.email)
            .collect();
        assert_eq!(emails, vec!["a@x.com", "b@x.com"]);
    }

    #[tokio::test]
    async fn test_stores_sharing_a_file_converge_on_one_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("individuals.json");

        let a = FileStorage::new(&path).await.unwrap();
        let b = FileStorage::new(&path).await.unwrap();
        let from_a = a.get_or_create("a@x.com").await.unwrap();
        let from_b = b.get_or_create("a@x.com").await.unwrap();
        assert_eq!(from_a.id, from_b.id);

        let reopened = FileStorage::new(&path).await.unwrap();
        let stored = reopened.list().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, from_a.id);
    }

    #[tokio::test]
    async fn test_concurrent_commits_across_stores() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("individuals.json");

        let stores = [
            Arc::new(FileStorage::new(&path).await.unwrap()),
            Arc::new(FileStorage::new(&path).await.unwrap()),
        ];

        let mut handles = Vec::new();
        for n in 0..8 {
            let store = Arc::clone(&stores[n % 2]);
            handles.push(tokio::spawn(async move {
                let shared = store.get_or_create("shared@x.com").await.unwrap();
                store.get_or_create(&format!("user{n}@x.com")).await.unwrap();
                shared.id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let reopened = FileStorage::new(&path).await.unwrap();
        let stored = reopened.list().await.unwrap();
        assert_eq!(stored.len(), 9);
        let shared = reopened.get_by_email("shared@x.com").await.unwrap();
        assert_eq!(shared.unwrap().id, ids[0]);
    }

    #[tokio::test]
    async fn test_lock_file_sits_next_to_storage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("individuals.json");
        FileStorage::new(&path).await.unwrap();

        assert!(path.exists());
        assert!(dir.path().join("nested").join("individuals.json.lock").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("individuals.json");
        std::fs::write(&path, "not json").unwrap();

        let result = FileStorage::new(&path).await;
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }
}
