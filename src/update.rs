//! Fetch job: mirror the published product details into a document store
//!
//! For each collection the job reads the directory listing, compares its
//! `Last-Modified` header against the stored collection marker and, when
//! something changed, downloads every listed JSON document concurrently.
//! The collection marker is written only when every document was stored, so
//! a partial run is retried in full next time.

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use indexmap::IndexMap;
#[cfg(test)]
use mockall::automock;
use regex::Regex;
use reqwest::header::LAST_MODIFIED;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cache::CollectionCache;
use crate::error::FetchError;
use crate::storage::{Collection, DocumentStore};

/// Published product details location
pub const DEFAULT_SOURCE_URL: &str = "https://product-details.mozilla.org/1.0/";

/// Timeout for a single HTTP request
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

static JSON_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]+\.json)""#).expect("Invalid regex"));

/// Stand-in origin for resolving listing links, which only ever compare paths
const LISTING_ORIGIN: &str = "http://listing.invalid";

/// Body and `Last-Modified` header of a fetched resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub body: String,
    pub last_modified: Option<String>,
}

/// Where product details are downloaded from
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Source: Send + Sync {
    /// Fetch `path` relative to the source root. The empty path is the root
    /// listing.
    async fn fetch(&self, path: &str) -> Result<Fetched, FetchError>;
}

/// [`Source`] over HTTP
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    root_path: String,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("product-details/", env!("CARGO_PKG_VERSION")))
            .timeout(FETCH_TIMEOUT)
            .build()?;

        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let root_path = reqwest::Url::parse(&base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?
            .path()
            .to_string();

        Ok(Self {
            client,
            base_url,
            root_path,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL path of the source root, e.g. `/1.0/`
    pub fn root_path(&self) -> &str {
        &self.root_path
    }
}

#[async_trait]
impl Source for HttpSource {
    async fn fetch(&self, path: &str) -> Result<Fetched, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Fetching {}", url);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Product details source returned status {}: {}", status, url);
            return Err(FetchError::InvalidResponse(format!(
                "Unexpected status {} for {}",
                status, url
            )));
        }

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(Fetched {
            body,
            last_modified,
        })
    }
}

/// JSON documents linked from the listing at `listing_path`, named relative
/// to the source root.
///
/// Links are resolved against the listing URL, so `de.json` in the
/// `regions/` listing and `/1.0/regions/de.json` under root path `/1.0/` both
/// name `regions/de.json`. Links outside `root_path` are dropped.
pub fn listed_documents(listing: &str, listing_path: &str, root_path: &str) -> BTreeSet<String> {
    let listing_url = format!("{}{}{}", LISTING_ORIGIN, root_path, listing_path);
    let Ok(base) = reqwest::Url::parse(&listing_url) else {
        warn!("Cannot resolve links of listing {}", listing_url);
        return BTreeSet::new();
    };

    JSON_HREF_RE
        .captures_iter(listing)
        .filter_map(|caps| {
            let url = base.join(caps.get(1)?.as_str()).ok()?;
            let name = url.path().strip_prefix(root_path)?;
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

/// Current time as an HTTP date, for documents served without a
/// `Last-Modified` header
fn http_date_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn collection_prefix(collection: Collection) -> &'static str {
    match collection {
        Collection::Versions => "",
        Collection::Regions => "regions/",
    }
}

/// Outcome of one collection in an update run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionUpdate {
    /// Listing unchanged since the last run
    pub skipped: bool,
    pub updated: Vec<String>,
    pub failed: Vec<String>,
    /// Listing could not be fetched, or the collection marker not stored
    pub error: Option<String>,
}

impl CollectionUpdate {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.error.is_none()
    }
}

/// Per-collection outcome of [`Updater::run`], in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub collections: IndexMap<Collection, CollectionUpdate>,
}

impl UpdateSummary {
    pub fn get(&self, collection: Collection) -> Option<&CollectionUpdate> {
        self.collections.get(&collection)
    }

    pub fn is_success(&self) -> bool {
        self.collections.values().all(CollectionUpdate::is_success)
    }

    pub fn updated_count(&self) -> usize {
        self.collections.values().map(|c| c.updated.len()).sum()
    }

    pub fn failed_count(&self) -> usize {
        self.collections.values().map(|c| c.failed.len()).sum()
    }
}

/// Downloads product details from a [`Source`] into a [`DocumentStore`]
pub struct Updater<R, S> {
    source: R,
    store: S,
    root_path: String,
    cache: Option<Arc<CollectionCache>>,
}

impl<R: Source, S: DocumentStore> Updater<R, S> {
    pub fn new(source: R, store: S) -> Self {
        Self {
            source,
            store,
            root_path: "/".to_string(),
            cache: None,
        }
    }

    /// URL path the source is served under, used to resolve absolute links
    /// in listings. Defaults to `/`.
    pub fn with_root_path(mut self, root_path: &str) -> Self {
        let root_path = root_path.trim_matches('/');
        self.root_path = if root_path.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", root_path)
        };
        self
    }

    /// Invalidate collections in `cache` once they have been updated
    pub fn with_cache(mut self, cache: Arc<CollectionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Update every collection. With `force`, download even when the listing
    /// is unchanged since the last successful run.
    pub async fn run(&self, force: bool) -> UpdateSummary {
        if force {
            info!("Product details update forced");
        }

        let mut summary = UpdateSummary::default();
        for collection in Collection::ALL {
            let update = self.update_collection(collection, force).await;

            if !update.updated.is_empty()
                && let Some(cache) = &self.cache
            {
                cache.delete(collection);
            }
            summary.collections.insert(collection, update);
        }

        info!(
            "Product details update run complete: {} updated, {} failed",
            summary.updated_count(),
            summary.failed_count()
        );
        summary
    }

    async fn update_collection(&self, collection: Collection, force: bool) -> CollectionUpdate {
        let mut update = CollectionUpdate::default();
        let prefix = collection_prefix(collection);
        let marker = collection.marker_name();

        debug!("Grabbing list of {} JSON files from the server", collection);
        let listing = match self.source.fetch(prefix).await {
            Ok(listing) => listing,
            Err(e) => {
                error!("Failed to fetch {} listing: {}", collection, e);
                update.error = Some(e.to_string());
                return update;
            }
        };

        if !force
            && let Some(remote) = &listing.last_modified
            && self.store.last_modified(marker).as_deref() == Some(remote.as_str())
        {
            info!("Product details {} were up to date", collection);
            update.skipped = true;
            return update;
        }

        let (names, others): (Vec<_>, Vec<_>) =
            listed_documents(&listing.body, prefix, &self.root_path)
                .into_iter()
                .partition(|name| collection.contains(name));
        if !others.is_empty() {
            debug!(
                "Ignoring {} documents outside {} listed there: {:?}",
                others.len(),
                collection,
                others
            );
        }

        let fetches = names.into_iter().map(|path| async move {
            let result = self.fetch_document(&path).await;
            (path, result)
        });

        for (name, result) in join_all(fetches).await {
            let stored = result.and_then(|fetched| {
                let last_modified = fetched
                    .last_modified
                    .or_else(|| listing.last_modified.clone())
                    .unwrap_or_else(http_date_now);
                debug!("Writing new copy of {}", name);
                self.store
                    .update(&name, &fetched.body, &last_modified)
                    .map_err(FetchError::from)
            });

            match stored {
                Ok(()) => update.updated.push(name),
                Err(e) => {
                    warn!("Failed to update {}: {}", name, e);
                    update.failed.push(name);
                }
            }
        }

        if !update.failed.is_empty() {
            warn!(
                "Update of {} had errors, not storing \"last updated\" marker",
                collection
            );
            return update;
        }

        match &listing.last_modified {
            Some(last_modified) => {
                debug!("Writing {} last-updated marker", collection);
                if let Err(e) = self.store.update(marker, "", last_modified) {
                    error!("Failed to store {} marker: {}", collection, e);
                    update.error = Some(e.to_string());
                }
            }
            None => warn!(
                "Last-Modified header not found for {} listing. Check server if this persists.",
                collection
            ),
        }

        update
    }

    /// Download a document and check it is non-empty JSON
    async fn fetch_document(&self, path: &str) -> Result<Fetched, FetchError> {
        let fetched = self.source.fetch(path).await?;

        if fetched.body.trim().is_empty() {
            return Err(FetchError::Empty(path.to_string()));
        }
        serde_json::from_str::<Value>(&fetched.body).map_err(|source| {
            FetchError::InvalidJson {
                name: path.to_string(),
                source,
            }
        })?;

        Ok(fetched)
    }
}
