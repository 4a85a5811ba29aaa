//! In-memory cache of parsed document collections
//!
//! A [`CollectionCache`] is plain shared state: wrap it in an `Arc` and hand
//! it to several catalogs to share entries between them. Entries are keyed by
//! `prod-details:<collection>` and expire after the configured TTL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, error};

use crate::storage::Collection;

/// Default lifetime of a cached collection (12 hours)
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

const KEY_PREFIX: &str = "prod-details:";

/// Parsed documents of one collection, keyed by document name
pub type CollectionData = HashMap<String, Arc<Value>>;

struct Entry {
    data: Arc<CollectionData>,
    stored_at: Instant,
}

pub struct CollectionCache {
    entries: Mutex<HashMap<String, Entry>>,
    timeout: Option<Duration>,
}

impl CollectionCache {
    /// Cache whose entries expire after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            timeout: Some(timeout),
        }
    }

    /// Cache whose entries live until invalidated
    pub fn without_expiry() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            timeout: None,
        }
    }

    fn key(collection: Collection) -> String {
        format!("{}{}", KEY_PREFIX, collection.as_str())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // Entries are inserted and removed whole, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(|poisoned| {
            error!("Product details cache lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn get(&self, collection: Collection) -> Option<Arc<CollectionData>> {
        let key = Self::key(collection);
        let mut entries = self.lock();

        let expired = match entries.get(&key) {
            Some(entry) => self
                .timeout
                .is_some_and(|timeout| entry.stored_at.elapsed() >= timeout),
            None => return None,
        };
        if expired {
            debug!("Cache entry {} expired", key);
            entries.remove(&key);
            return None;
        }

        entries.get(&key).map(|entry| Arc::clone(&entry.data))
    }

    /// Store a collection. Empty data is never stored, so a collection that
    /// has not been fetched yet is looked up again on the next call.
    pub fn set(&self, collection: Collection, data: Arc<CollectionData>) {
        if data.is_empty() {
            return;
        }
        self.lock().insert(
            Self::key(collection),
            Entry {
                data,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn delete(&self, collection: Collection) {
        self.lock().remove(&Self::key(collection));
    }

    /// Drop every entry. Every catalog sharing this cache loses its entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CollectionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TIMEOUT)
    }
}
