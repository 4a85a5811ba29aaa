//! Document storage backends
//!
//! Documents are JSON blobs identified by a path-like name (`firefox_versions.json`,
//! `regions/de.json`), each with an opaque last-modified marker. Collection-level
//! markers use the names `/` and `regions/`.
//!
//! - [`file`]: filesystem tree with dotfile markers
//! - [`table`]: SQLite table with one row per document

pub mod file;
pub mod table;

use std::collections::BTreeSet;
use std::fmt;

#[cfg(test)]
use mockall::automock;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::StoreError;

pub use file::FileStore;
pub use table::TableStore;

/// Group of documents that share a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Top-level documents such as `firefox_versions.json`
    Versions,
    /// Localized region names under `regions/`
    Regions,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Versions, Collection::Regions];

    /// The collection a document name belongs to
    pub fn of(name: &str) -> Self {
        if name.starts_with("regions/") {
            Collection::Regions
        } else {
            Collection::Versions
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Versions => "versions",
            Collection::Regions => "regions",
        }
    }

    /// Name under which the collection's last-modified marker is stored
    pub fn marker_name(&self) -> &'static str {
        match self {
            Collection::Versions => "/",
            Collection::Regions => "regions/",
        }
    }

    /// Whether `name` is a JSON document of this collection
    pub fn contains(&self, name: &str) -> bool {
        if !name.ends_with(".json") {
            return false;
        }
        match self {
            Collection::Versions => !name.contains('/'),
            Collection::Regions => name.starts_with("regions/"),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform read/write contract over a document store
///
/// Reads never fail: anything missing or unreadable is reported as `None`
/// (or an empty listing) and logged by the implementation.
#[cfg_attr(test, automock)]
pub trait DocumentStore: Send + Sync {
    /// Stored last-modified marker for a document or collection marker name
    fn last_modified(&self, name: &str) -> Option<String>;

    /// Raw content of a document
    fn content(&self, name: &str) -> Option<String>;

    /// Names of all JSON documents in a collection
    fn list_names(&self, collection: Collection) -> BTreeSet<String>;

    /// Write a document and its marker. Writing to a collection marker name
    /// (`/`, `regions/`) only updates that collection's marker; any content is
    /// dropped and [`content`](Self::content) stays `None`.
    fn update(&self, name: &str, content: &str, last_modified: &str) -> Result<(), StoreError>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<T> {
    fn last_modified(&self, name: &str) -> Option<String> {
        (**self).last_modified(name)
    }

    fn content(&self, name: &str) -> Option<String> {
        (**self).content(name)
    }

    fn list_names(&self, collection: Collection) -> BTreeSet<String> {
        (**self).list_names(collection)
    }

    fn update(&self, name: &str, content: &str, last_modified: &str) -> Result<(), StoreError> {
        (**self).update(name, content, last_modified)
    }
}

/// Whether `name` is a collection marker rather than a document
pub fn is_marker_name(name: &str) -> bool {
    name == "/" || name.ends_with('/')
}

/// Reject names that could escape the storage root
pub(crate) fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || (name.starts_with('/') && name != "/")
        || name.contains('\\')
        || name.split('/').any(|part| part == ".." || part == ".");
    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Storage backend selected by configuration
pub enum Storage {
    File(FileStore),
    Table(TableStore),
}

impl Storage {
    /// Open the backend named in `config`
    pub fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        match config.backend {
            StorageBackend::File => {
                let dir = config.json_dir();
                info!("Using file storage at {:?}", dir);
                Ok(Storage::File(FileStore::new(dir)))
            }
            StorageBackend::Database => {
                let path = config.db_path();
                info!("Using database storage at {:?}", path);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Ok(Storage::Table(TableStore::open(&path)?))
            }
        }
    }
}

impl DocumentStore for Storage {
    fn last_modified(&self, name: &str) -> Option<String> {
        match self {
            Storage::File(s) => s.last_modified(name),
            Storage::Table(s) => s.last_modified(name),
        }
    }

    fn content(&self, name: &str) -> Option<String> {
        match self {
            Storage::File(s) => s.content(name),
            Storage::Table(s) => s.content(name),
        }
    }

    fn list_names(&self, collection: Collection) -> BTreeSet<String> {
        match self {
            Storage::File(s) => s.list_names(collection),
            Storage::Table(s) => s.list_names(collection),
        }
    }

    fn update(&self, name: &str, content: &str, last_modified: &str) -> Result<(), StoreError> {
        match self {
            Storage::File(s) => s.update(name, content, last_modified),
            Storage::Table(s) => s.update(name, content, last_modified),
        }
    }
}
