// Client-local persistent state: the durable-storage analog of the browser
// profile. Single writer per session; writes are last-write-wins.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Well-known storage keys.
pub mod keys {
    /// Bearer token of the authenticated session
    pub const AUTH_TOKEN: &str = "auth-token";
    /// Serialized cart lines
    pub const CART: &str = "cart-items";
    /// Id of the most recently submitted order, for deep-navigation recovery
    pub const LAST_ORDER_ID: &str = "last-order-id";
    /// Guest address cache (newest first)
    pub const GUEST_ADDRESSES: &str = "guest-addresses";
    /// Coordinates/details metadata keyed by formatted address
    pub const ADDRESS_META: &str = "address-meta";
    /// Persisted dine-in intent from a QR entry link
    pub const DINE_IN_INTENT: &str = "dinein-intent";
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage operation failed: {0}")]
    OperationFailed(String),
}

/// Key/value storage seam used for all client-local persisted state.
///
/// Implementations must be cheap enough to call on every cart mutation.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory storage, used in tests and as a fallback when no state file is
/// configured. State lives for the duration of the process.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    store: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StorageBackend for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let store = self
            .store
            .read()
            .map_err(|_| StorageError::OperationFailed("lock poisoned".into()))?;
        Ok(store.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut store = self
            .store
            .write()
            .map_err(|_| StorageError::OperationFailed("lock poisoned".into()))?;
        store.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut store = self
            .store
            .write()
            .map_err(|_| StorageError::OperationFailed("lock poisoned".into()))?;
        store.remove(key);
        Ok(())
    }
}

/// JSON-file-backed storage for CLI and kiosk deployments.
///
/// The whole map is rewritten on every set; the file is replaced via a
/// temporary sibling so a crash mid-write cannot corrupt existing state.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    store: Arc<RwLock<HashMap<String, String>>>,
}

impl FileStorage {
    /// Opens (or creates) the state file at `path`.
    ///
    /// A corrupt state file is treated as empty rather than an error; the
    /// previous content is unrecoverable at this layer anyway.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let store = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(map) => map,
                Err(err) => {
                    tracing::warn!("Corrupt state file {:?}, starting empty: {}", path, err);
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            store: Arc::new(RwLock::new(store)),
        })
    }

    fn flush(&self, snapshot: &HashMap<String, String>) -> Result<(), StorageError> {
        let serialized = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(serialized.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorageBackend for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let store = self
            .store
            .read()
            .map_err(|_| StorageError::OperationFailed("lock poisoned".into()))?;
        Ok(store.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let snapshot = {
            let mut store = self
                .store
                .write()
                .map_err(|_| StorageError::OperationFailed("lock poisoned".into()))?;
            store.insert(key.to_string(), value.to_string());
            store.clone()
        };
        self.flush(&snapshot)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let snapshot = {
            let mut store = self
                .store
                .write()
                .map_err(|_| StorageError::OperationFailed("lock poisoned".into()))?;
            store.remove(key);
            store.clone()
        };
        self.flush(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_roundtrip() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.get("missing").await.unwrap(), None);

        storage.set(keys::AUTH_TOKEN, "tok").await.unwrap();
        assert_eq!(
            storage.get(keys::AUTH_TOKEN).await.unwrap().as_deref(),
            Some("tok")
        );

        storage.remove(keys::AUTH_TOKEN).await.unwrap();
        assert_eq!(storage.get(keys::AUTH_TOKEN).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let storage = FileStorage::open(&path).unwrap();
            storage.set(keys::LAST_ORDER_ID, "ord-1").await.unwrap();
        }

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(
            storage.get(keys::LAST_ORDER_ID).await.unwrap().as_deref(),
            Some("ord-1")
        );
    }

    #[tokio::test]
    async fn corrupt_state_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.get(keys::CART).await.unwrap(), None);
    }
}
