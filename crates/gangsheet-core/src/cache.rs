//! Content-addressed byte cache for image payloads.
//!
//! Elements reference image bytes by key so that duplicates and history
//! snapshots never copy the payload. The cache is an explicit dependency of
//! a document rather than a process-wide singleton.

use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Namespace for content keys. Keys are UUIDv5 over the raw bytes.
const CONTENT_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_3c2e_9b4d_4e8a_b7c1_52d0_e3f4_a9b6);

/// Derive the stable cache key for a byte payload.
pub fn content_key(bytes: &[u8]) -> String {
    Uuid::new_v5(&CONTENT_NAMESPACE, bytes).to_string()
}

/// Byte storage keyed by string.
pub trait ByteCache: Send + Sync {
    /// Look up bytes by key.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store bytes under a key, replacing any previous value.
    fn set(&self, key: &str, bytes: Vec<u8>);

    /// Check whether a key is present.
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Store bytes under their content key and return it.
    fn insert(&self, bytes: Vec<u8>) -> String {
        let key = content_key(&bytes);
        if !self.contains(&key) {
            self.set(&key, bytes);
        }
        key
    }
}

/// In-memory cache.
#[derive(Default)]
pub struct MemoryByteCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryByteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose key fails `keep`. Returns how many were dropped.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) -> usize {
        match self.entries.write() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|key, _| keep(key));
                before - entries.len()
            }
            Err(_) => {
                log::error!("byte cache lock poisoned while pruning");
                0
            }
        }
    }
}

impl ByteCache for MemoryByteCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.entries.read() {
            Ok(entries) => entries.get(key).cloned(),
            Err(_) => {
                log::error!("byte cache lock poisoned while reading {key}");
                None
            }
        }
    }

    fn set(&self, key: &str, bytes: Vec<u8>) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), bytes);
            }
            Err(_) => log::error!("byte cache lock poisoned while writing {key}"),
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|e| e.contains_key(key))
            .unwrap_or(false)
    }
}
