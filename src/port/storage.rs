//! Durable key-value storage port.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Session-scoped durable key-value storage.
///
/// Semantics mirror browser `localStorage`: string keys, string values,
/// exact-key get/set/remove, no iteration. Implementations must make each
/// `set` atomic with respect to concurrent `get`s of the same key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String);

    fn remove(&self, key: &str);
}

/// The `{data, timestamp}` envelope every cache writes durably.
///
/// Payload and capture time travel as one JSON string so a reader can never
/// pair a new payload with a stale timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEnvelope<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize + DeserializeOwned> StoredEnvelope<T> {
    #[must_use]
    pub fn new(data: T, timestamp: DateTime<Utc>) -> Self {
        Self { data, timestamp }
    }

    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(StorageError::Serialize)
    }

    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw).map_err(StorageError::Deserialize)
    }
}
