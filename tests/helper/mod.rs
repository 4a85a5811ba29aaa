//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::collections::HashMap;

use async_trait::async_trait;
use tempfile::TempDir;

use product_details::error::FetchError;
use product_details::storage::{DocumentStore, FileStore, TableStore};
use product_details::update::{Fetched, Source};

pub const LAST_MODIFIED: &str = "Sat, 10 Oct 2015 10:26:20 GMT";

/// In-memory [`Source`] serving a fixed set of resources
#[derive(Default)]
pub struct FixtureSource {
    resources: HashMap<String, Fetched>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, path: &str, body: &str, last_modified: Option<&str>) -> Self {
        self.resources.insert(
            path.to_string(),
            Fetched {
                body: body.to_string(),
                last_modified: last_modified.map(str::to_string),
            },
        );
        self
    }

    /// Add a directory listing at `path` linking to `names`
    pub fn with_listing(self, path: &str, names: &[&str], last_modified: Option<&str>) -> Self {
        let body = names
            .iter()
            .map(|name| format!(r#"<li><a href="{}">{}</a></li>"#, name, name))
            .collect::<Vec<_>>()
            .join("\n");
        self.with_resource(path, &format!("<ul>\n{}\n</ul>", body), last_modified)
    }
}

#[async_trait]
impl Source for FixtureSource {
    async fn fetch(&self, path: &str) -> Result<Fetched, FetchError> {
        self.resources
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::InvalidResponse(format!("Unexpected status 404 for {}", path)))
    }
}

fn populate(store: &dyn DocumentStore, documents: &[(&str, &str)]) {
    for (name, content) in documents {
        store.update(name, content, LAST_MODIFIED).unwrap();
    }
    store.update("/", "", LAST_MODIFIED).unwrap();
    store.update("regions/", "", LAST_MODIFIED).unwrap();
}

/// Create a file store with pre-populated documents and collection markers
pub fn create_file_store(documents: &[(&str, &str)]) -> (TempDir, FileStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path().join("json"));
    populate(&store, documents);
    (temp_dir, store)
}

/// Create a database store with pre-populated documents and collection markers
pub fn create_table_store(documents: &[(&str, &str)]) -> (TempDir, TableStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = TableStore::open(&temp_dir.path().join("test.db")).unwrap();
    populate(&store, documents);
    (temp_dir, store)
}
