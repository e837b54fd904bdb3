//! State backend persisted as a single JSON document.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use crate::error::StoreError;
use crate::ratelimit::{RateLimitState, StateBackend};

type Document = BTreeMap<String, RateLimitState>;

/// State backend that keeps every record in one JSON file.
///
/// The document maps API keys to `{"count", "window_start"}` objects. Every
/// operation reads the whole document, mutates it, and writes it back while
/// holding an instance-scoped lock, so calls through one instance never
/// interleave. Two instances pointing at the same path are not coordinated.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStateStore {
    /// Create a store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the state document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole document. A missing or empty file reads as `{}`.
    async fn read_all(&self) -> Result<Document, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!(path = %self.path.display(), "State file absent, using empty document");
                return Ok(Document::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Document::new());
        }

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the document on disk, creating parent directories as needed.
    async fn write_all(&self, document: &Document) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let bytes = serde_json::to_vec_pretty(document).map_err(StoreError::Serialize)?;
        tokio::fs::write(&self.path, bytes).await.map_err(io_err)?;

        trace!(path = %self.path.display(), keys = document.len(), "State file written");
        Ok(())
    }
}

#[async_trait]
impl StateBackend for FileStateStore {
    async fn get_state(&self, api_key: &str) -> Result<Option<RateLimitState>, StoreError> {
        let _guard = self.lock.lock().await;
        let document = self.read_all().await?;
        Ok(document.get(api_key).copied())
    }

    async fn save_state(&self, api_key: &str, state: &RateLimitState) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_all().await?;
        document.insert(api_key.to_string(), *state);
        self.write_all(&document).await
    }

    async fn clear_state(&self, api_key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_all().await?;
        document.remove(api_key);
        self.write_all(&document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("quotagate-test-{}", uuid::Uuid::new_v4()));
            Self(dir)
        }

        fn file(&self, name: &str) -> PathBuf {
            self.0.join(name)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = TempDir::new();
        let store = FileStateStore::new(dir.file("rate_limits.json"));

        assert!(store.get_state("key1").await.unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_persistence_and_clear() {
        let dir = TempDir::new();
        let store = FileStateStore::new(dir.file("rate_limits.json"));
        let state = RateLimitState {
            count: 2,
            window_start: 1_700_000_000.25,
        };

        assert_ok!(store.save_state("key1", &state).await);
        assert_eq!(store.get_state("key1").await.unwrap(), Some(state));

        assert_ok!(store.clear_state("key1").await);
        assert!(store.get_state("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_durable_across_instances() {
        let dir = TempDir::new();
        let path = dir.file("rate_limits.json");
        let state = RateLimitState {
            count: 4,
            window_start: 1_700_000_123.5,
        };

        FileStateStore::new(&path)
            .save_state("key1", &state)
            .await
            .unwrap();

        let reopened = FileStateStore::new(&path);
        let loaded = reopened.get_state("key1").await.unwrap().unwrap();
        assert_eq!(loaded.count, 4);
        assert_eq!(loaded.window_start, 1_700_000_123.5);
    }

    #[tokio::test]
    async fn test_creates_parent_directories() {
        let dir = TempDir::new();
        let path = dir.file("nested/deeper/state.json");
        let store = FileStateStore::new(&path);

        store
            .save_state("key1", &RateLimitState::new(1.0))
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_document_layout() {
        let dir = TempDir::new();
        let path = dir.file("rate_limits.json");
        let store = FileStateStore::new(&path);

        store
            .save_state("key1", &RateLimitState { count: 1, window_start: 10.5 })
            .await
            .unwrap();
        store
            .save_state("key2", &RateLimitState { count: 3, window_start: 20.0 })
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({
                "key1": {"count": 1, "window_start": 10.5},
                "key2": {"count": 3, "window_start": 20.0},
            })
        );
    }

    #[tokio::test]
    async fn test_save_overwrites_and_keeps_other_keys() {
        let dir = TempDir::new();
        let store = FileStateStore::new(dir.file("rate_limits.json"));

        store
            .save_state("key1", &RateLimitState { count: 5, window_start: 1.0 })
            .await
            .unwrap();
        store
            .save_state("key2", &RateLimitState { count: 1, window_start: 1.0 })
            .await
            .unwrap();
        store
            .save_state("key1", &RateLimitState { count: 1, window_start: 9.0 })
            .await
            .unwrap();

        let key1 = store.get_state("key1").await.unwrap().unwrap();
        assert_eq!(key1, RateLimitState { count: 1, window_start: 9.0 });
        assert_eq!(store.get_state("key2").await.unwrap().unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_clear_unknown_key_is_noop() {
        let dir = TempDir::new();
        let store = FileStateStore::new(dir.file("rate_limits.json"));

        store
            .save_state("key1", &RateLimitState::new(1.0))
            .await
            .unwrap();
        assert_ok!(store.clear_state("never-seen").await);
        assert!(store.get_state("key1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_file_reads_as_empty() {
        let dir = TempDir::new();
        let path = dir.file("rate_limits.json");
        std::fs::create_dir_all(&dir.0).unwrap();
        std::fs::write(&path, "").unwrap();

        let store = FileStateStore::new(&path);
        assert!(store.get_state("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error_naming_the_path() {
        let dir = TempDir::new();
        let path = dir.file("rate_limits.json");
        std::fs::create_dir_all(&dir.0).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStateStore::new(&path);
        let err = assert_err!(store.get_state("key1").await);
        assert!(matches!(err, StoreError::Malformed { .. }));
        assert!(err.to_string().contains(&path.display().to_string()));

        // Writes must not clobber a document they could not parse.
        assert_err!(store.save_state("key1", &RateLimitState::new(1.0)).await);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_are_not_lost() {
        let dir = TempDir::new();
        let store = Arc::new(FileStateStore::new(dir.file("rate_limits.json")));

        let tasks = (0..20).map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .save_state(&format!("key{i}"), &RateLimitState { count: i, window_start: 0.0 })
                    .await
            })
        });

        for result in futures::future::join_all(tasks).await {
            assert_ok!(result.unwrap());
        }

        for i in 0..20 {
            let state = store.get_state(&format!("key{i}")).await.unwrap().unwrap();
            assert_eq!(state.count, i);
        }
    }
}
