//! Key-value store implementations.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::RwLock;
use tracing::warn;

use crate::port::KeyValueStore;

/// In-memory session store.
///
/// The default store for a single session: survives view unmounts, dies with
/// the process, which matches the session-scoped durability contract.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries.write().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

/// File-backed store, one file per key under a session directory.
///
/// Used by desktop builds where a session outlives the process. Keys are
/// storage keys of the form `<view>_<user_id>` and are already safe as file
/// names.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Create a store under the platform cache directory.
    pub fn in_cache_dir(app: &str) -> std::io::Result<Self> {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self::new(base.join(app))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: String) {
        // Write-then-rename keeps the envelope atomic for concurrent readers.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&tmp, &value).and_then(|()| std::fs::rename(&tmp, &path)) {
            warn!(key, error = %e, "Failed to persist cache entry");
        }
    }

    fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.path_for(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_get_set_remove() {
        let store = MemoryStore::new();
        assert!(store.get("portfolio_detail_u1").is_none());

        store.set("portfolio_detail_u1", "{}".into());
        assert_eq!(store.get("portfolio_detail_u1").as_deref(), Some("{}"));

        store.remove("portfolio_detail_u1");
        assert!(store.get("portfolio_detail_u1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        store.set("watchlist_detail_u1", "[1,2,3]".into());
        assert_eq!(store.get("watchlist_detail_u1").as_deref(), Some("[1,2,3]"));

        store.remove("watchlist_detail_u1");
        assert!(store.get("watchlist_detail_u1").is_none());
    }
}
