//! Mozilla product details: release metadata and localized region names
//! mirrored from a remote source into local storage and served through an
//! in-memory collection cache.
//!
//! ```no_run
//! use product_details::catalog::Catalog;
//! use product_details::storage::FileStore;
//!
//! let catalog = Catalog::new(FileStore::new("/srv/product-details/json"));
//! let versions = catalog.get("firefox_versions");
//! println!("{}", versions["LATEST_FIREFOX_VERSION"]);
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod memo;
pub mod regions;
pub mod storage;
pub mod update;
pub mod version;
