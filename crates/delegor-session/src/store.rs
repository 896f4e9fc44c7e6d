use async_trait::async_trait;
use delegor_core::DelegorResult;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Builds the canonical persistence key for a session subkey.
pub fn session_key(session_id: &str, subkey: &str) -> String {
    format!("session:{session_id}:{subkey}")
}

/// Generic key/value persistence boundary.
///
/// The coordinator writes session snapshots through this trait keyed
/// `session:{id}:{subkey}`. Durability guarantees belong to the
/// implementation, not to this core.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Stores a value under the given key, replacing any previous value.
    async fn set(&self, key: &str, value: serde_json::Value) -> DelegorResult<()>;
    /// Fetches the value stored under the key, if any.
    async fn get(&self, key: &str) -> DelegorResult<Option<serde_json::Value>>;
    /// Removes the value stored under the key. Missing keys are not an error.
    async fn clear(&self, key: &str) -> DelegorResult<()>;
}

/// In-memory state store for tests and single-process deployments.
pub struct MemoryStateStore {
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn set(&self, key: &str, value: serde_json::Value) -> DelegorResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> DelegorResult<Option<serde_json::Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn clear(&self, key: &str) -> DelegorResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// File-based state store (one JSON file per key). Good enough for MVP.
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Creates the store, ensuring the backing directory exists.
    pub async fn new(dir: PathBuf) -> DelegorResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        // Keys contain ':' which is not portable in file names.
        let safe: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn set(&self, key: &str, value: serde_json::Value) -> DelegorResult<()> {
        let path = self.key_path(key);
        let json = serde_json::to_string_pretty(&value)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> DelegorResult<Option<serde_json::Value>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(path).await?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    async fn clear(&self, key: &str) -> DelegorResult<()> {
        let path = self.key_path(key);
        if path.exists() {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_key_format() {
        assert_eq!(session_key("abc", "metrics"), "session:abc:metrics");
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStateStore::new();
        store
            .set(&session_key("s1", "metrics"), json!({"total": 3}))
            .await
            .unwrap();

        let value = store.get(&session_key("s1", "metrics")).await.unwrap();
        assert_eq!(value, Some(json!({"total": 3})));

        store.clear(&session_key("s1", "metrics")).await.unwrap();
        assert!(store.get(&session_key("s1", "metrics")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_missing_key() {
        let store = MemoryStateStore::new();
        assert!(store.get("session:nope:meta").await.unwrap().is_none());
        // Clearing a missing key is not an error.
        store.clear("session:nope:meta").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().to_path_buf()).await.unwrap();

        let key = session_key("s2", "context");
        store.set(&key, json!(["a", "b"])).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(json!(["a", "b"])));

        store.clear(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().to_path_buf()).await.unwrap();

        let key = session_key("s3", "meta");
        store.set(&key, json!(1)).await.unwrap();
        store.set(&key, json!(2)).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(json!(2)));
    }
}
