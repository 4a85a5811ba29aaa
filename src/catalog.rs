//! Cached, parsed access to product details documents
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  get(key)  ┌─────────────┐  miss   ┌───────────────┐
//! │  consumer   │───────────▶│   Catalog   │────────▶│ DocumentStore │
//! └─────────────┘            └─────────────┘         │ (file/table)  │
//!                                   │                └───────────────┘
//!                                   ▼
//!                           ┌─────────────────┐
//!                           │ CollectionCache │
//!                           └─────────────────┘
//! ```
//!
//! Documents are cached per collection: a miss on `firefox_versions` loads
//! and parses every top-level document at once.

use std::collections::HashMap;
use std::ops::Index;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CollectionCache, CollectionData};
use crate::memo::Memoized;
use crate::storage::{Collection, DocumentStore};
use crate::version::ReleaseList;

/// Format of stored last-modified markers, as sent in HTTP `Last-Modified`
pub const LAST_MODIFIED_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %Z";

static NULL: Value = Value::Null;

/// Parse a stored last-modified marker; `None` if it is not an HTTP date
pub fn parse_last_modified(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), LAST_MODIFIED_FORMAT).ok()
}

/// Parsed content of a document, or nothing if the document is unavailable.
///
/// Indexing never panics: any key of a missing document, or a missing key of
/// a present one, reads as `Value::Null`.
///
/// ```
/// use product_details::catalog::Details;
///
/// let missing = Details::missing();
/// assert!(missing["LATEST_FIREFOX_VERSION"].is_null());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Details(Option<Arc<Value>>);

impl Details {
    pub fn missing() -> Self {
        Self(None)
    }

    pub fn is_missing(&self) -> bool {
        self.0.is_none()
    }

    /// True for a missing document as well as for `null`, `{}`, `[]` or `""`
    pub fn is_empty(&self) -> bool {
        match self.as_value() {
            None | Some(Value::Null) => true,
            Some(Value::Object(map)) => map.is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_value()?.get(key)
    }

    pub fn as_value(&self) -> Option<&Value> {
        self.0.as_deref()
    }

    pub fn into_value(self) -> Option<Arc<Value>> {
        self.0
    }

    /// Pretty-printed JSON; a missing document renders as `{}`
    pub fn to_pretty_json(&self) -> String {
        match self.as_value() {
            Some(value) => serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string()),
            None => "{}".to_string(),
        }
    }
}

impl From<Arc<Value>> for Details {
    fn from(value: Arc<Value>) -> Self {
        Self(Some(value))
    }
}

impl From<Value> for Details {
    fn from(value: Value) -> Self {
        Self(Some(Arc::new(value)))
    }
}

impl Index<&str> for Details {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

impl PartialEq<Value> for Details {
    fn eq(&self, other: &Value) -> bool {
        self.as_value() == Some(other)
    }
}

/// Read access to product details through a collection cache
pub struct Catalog<S> {
    store: S,
    cache: Arc<CollectionCache>,
    markers: Memoized<String, Option<String>>,
}

impl<S: DocumentStore> Catalog<S> {
    /// Catalog with its own private cache
    pub fn new(store: S) -> Self {
        Self::with_cache(store, Arc::new(CollectionCache::default()))
    }

    /// Catalog using `cache`, which may be shared with other catalogs
    pub fn with_cache(store: S, cache: Arc<CollectionCache>) -> Self {
        Self {
            store,
            cache,
            markers: Memoized::with_ttl(Duration::ZERO),
        }
    }

    /// Remember last-modified markers for `interval` instead of reading them
    /// from storage on every [`Catalog::last_updated`] call
    pub fn with_marker_check_interval(mut self, interval: Duration) -> Self {
        self.markers = Memoized::with_ttl(interval);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &Arc<CollectionCache> {
        &self.cache
    }

    /// Parsed content of the document `<key>.json`, e.g. `firefox_versions`
    /// or `regions/de`
    pub fn get(&self, key: &str) -> Details {
        self.data(&format!("{}.json", key))
    }

    /// Parsed content of a document by its full name
    pub fn data(&self, name: &str) -> Details {
        let collection = Collection::of(name);
        let data = self.collection_data(collection);
        match data.get(name) {
            Some(value) => Details::from(Arc::clone(value)),
            None => {
                debug!("Requested product details file {} not available", name);
                Details::missing()
            }
        }
    }

    fn collection_data(&self, collection: Collection) -> Arc<CollectionData> {
        if let Some(data) = self.cache.get(collection) {
            return data;
        }

        let data = Arc::new(self.load_collection(collection));
        self.cache.set(collection, Arc::clone(&data));
        data
    }

    fn load_collection(&self, collection: Collection) -> CollectionData {
        debug!("Loading {} collection from storage", collection);

        let mut data = HashMap::new();
        for name in self.store.list_names(collection) {
            let Some(content) = self.store.content(&name).filter(|c| !c.is_empty()) else {
                continue;
            };
            match serde_json::from_str::<Value>(&content) {
                Ok(value) => {
                    data.insert(name, Arc::new(value));
                }
                Err(e) => {
                    warn!("Requested product details file {} is not JSON: {}", name, e);
                }
            }
        }

        debug!("Loaded {} documents for {} collection", data.len(), collection);
        data
    }

    /// Timestamp of the last update of `name`, which may be a document name
    /// or a collection marker (`/`, `regions/`)
    pub fn last_updated(&self, name: &str) -> Option<NaiveDateTime> {
        let marker = self
            .markers
            .get_or_insert_with(name, || self.store.last_modified(name))?;
        parse_last_modified(&marker)
    }

    /// Timestamp of the last update of the whole catalog
    pub fn last_update(&self) -> Option<NaiveDateTime> {
        self.last_updated("/")
    }

    /// Drop the cached collection containing `name`
    pub fn invalidate(&self, name: &str) {
        let collection = Collection::of(name);
        debug!("Invalidating {} collection", collection);
        self.cache.delete(collection);
        self.markers.forget(name);
    }

    /// Clear the whole cache.
    ///
    /// Only safe when the cache is not shared with unrelated consumers: every
    /// catalog holding the same [`CollectionCache`] loses its entries.
    pub fn invalidate_all(&self) {
        self.cache.clear();
        self.markers.clear();
    }

    /// Release list built from a `version -> release date` document such as
    /// `firefox_history_major_releases`
    pub fn release_list(&self, key: &str, list: &ReleaseList<'_>) -> Vec<String> {
        let details = self.get(key);
        let Some(Value::Object(releases)) = details.as_value() else {
            return Vec::new();
        };

        list.build(
            releases
                .iter()
                .filter_map(|(version, date)| Some((version.as_str(), date.as_str()?))),
        )
    }
}
