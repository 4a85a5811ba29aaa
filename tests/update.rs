//! Fetch job end to end: source → storage → catalog

mod helper;

use std::sync::Arc;

use mockito::Server;
use serde_json::json;
use tempfile::TempDir;

use helper::{FixtureSource, LAST_MODIFIED};
use product_details::cache::CollectionCache;
use product_details::catalog::Catalog;
use product_details::storage::{Collection, DocumentStore, FileStore, TableStore};
use product_details::update::{HttpSource, Updater};

fn fixture_source(latest: &str) -> FixtureSource {
    FixtureSource::new()
        .with_listing("", &["firefox_versions.json", "regions/"], Some(LAST_MODIFIED))
        .with_resource(
            "firefox_versions.json",
            &format!(r#"{{"LATEST_FIREFOX_VERSION": "{}"}}"#, latest),
            Some(LAST_MODIFIED),
        )
        .with_listing("regions/", &["de.json", "en-US.json"], Some(LAST_MODIFIED))
        .with_resource("regions/de.json", r#"{"de": "Deutschland"}"#, None)
        .with_resource("regions/en-US.json", r#"{"de": "Germany"}"#, None)
}

#[tokio::test]
async fn update_then_read_through_catalog() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(temp_dir.path()));

    let summary = Updater::new(fixture_source("41.0.1"), Arc::clone(&store))
        .run(false)
        .await;
    assert!(summary.is_success());
    assert_eq!(summary.updated_count(), 3);

    let catalog = Catalog::new(store);
    assert_eq!(
        catalog.get("firefox_versions")["LATEST_FIREFOX_VERSION"],
        json!("41.0.1")
    );
    assert_eq!(catalog.regions("de-AT").unwrap()["de"], json!("Deutschland"));
    assert_eq!(catalog.regions("fr").unwrap()["de"], json!("Germany"));
    assert!(catalog.last_update().is_some());
}

#[tokio::test]
async fn second_run_skips_unchanged_collections() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(TableStore::open(&temp_dir.path().join("test.db")).unwrap());

    let first = Updater::new(fixture_source("41.0.1"), Arc::clone(&store))
        .run(false)
        .await;
    assert!(first.is_success());

    let second = Updater::new(fixture_source("42.0"), Arc::clone(&store))
        .run(false)
        .await;
    assert!(second.get(Collection::Versions).unwrap().skipped);
    assert!(second.get(Collection::Regions).unwrap().skipped);
    assert_eq!(
        store.content("firefox_versions.json").as_deref(),
        Some(r#"{"LATEST_FIREFOX_VERSION": "41.0.1"}"#)
    );

    let forced = Updater::new(fixture_source("42.0"), Arc::clone(&store))
        .run(true)
        .await;
    assert_eq!(forced.updated_count(), 3);
    assert_eq!(
        store.content("firefox_versions.json").as_deref(),
        Some(r#"{"LATEST_FIREFOX_VERSION": "42.0"}"#)
    );
}

#[tokio::test]
async fn update_invalidates_shared_catalog_cache() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(temp_dir.path()));
    let cache = Arc::new(CollectionCache::without_expiry());

    Updater::new(fixture_source("41.0.1"), Arc::clone(&store))
        .run(false)
        .await;
    let catalog = Catalog::with_cache(Arc::clone(&store), Arc::clone(&cache));
    assert_eq!(
        catalog.get("firefox_versions")["LATEST_FIREFOX_VERSION"],
        json!("41.0.1")
    );

    Updater::new(fixture_source("42.0"), Arc::clone(&store))
        .with_cache(Arc::clone(&cache))
        .run(true)
        .await;

    assert_eq!(
        catalog.get("firefox_versions")["LATEST_FIREFOX_VERSION"],
        json!("42.0")
    );
}

#[tokio::test]
async fn update_over_http() {
    let mut server = Server::new_async().await;

    let listing = server
        .mock("GET", "/1.0/")
        .with_status(200)
        .with_header("last-modified", LAST_MODIFIED)
        .with_body(
            r#"<a href="/1.0/firefox_versions.json">firefox_versions.json</a>
            <a href="regions/de.json">de.json</a>"#,
        )
        .create_async()
        .await;
    let document = server
        .mock("GET", "/1.0/firefox_versions.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"LATEST_FIREFOX_VERSION": "41.0.1"}"#)
        .create_async()
        .await;
    let regions = server
        .mock("GET", "/1.0/regions/")
        .with_status(500)
        .create_async()
        .await;
    let region = server
        .mock("GET", "/1.0/regions/de.json")
        .expect(0)
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let source = HttpSource::new(&format!("{}/1.0/", server.url())).unwrap();
    let root_path = source.root_path().to_string();
    let updater = Updater::new(source, FileStore::new(temp_dir.path())).with_root_path(&root_path);

    let summary = updater.run(false).await;

    listing.assert_async().await;
    document.assert_async().await;
    regions.assert_async().await;
    region.assert_async().await;
    assert!(summary.get(Collection::Versions).unwrap().is_success());
    assert!(summary.get(Collection::Regions).unwrap().error.is_some());
    assert_eq!(
        updater.store().last_modified("firefox_versions.json").as_deref(),
        Some(LAST_MODIFIED)
    );
    assert_eq!(updater.store().last_modified("/").as_deref(), Some(LAST_MODIFIED));
    assert!(updater.store().content("de.json").is_none());
}
