//! Filesystem-backed document storage
//!
//! ```text
//! json_dir/
//! ├── .last_update                      marker for "/"
//! ├── firefox_versions.json
//! ├── .firefox_versions.json.last_modified
//! └── regions/
//!     ├── .last_update                  marker for "regions/"
//!     ├── de.json
//!     └── .de.json.last_modified
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::storage::{Collection, DocumentStore, is_marker_name, validate_name};

/// File name of a collection's last-modified marker
pub const LAST_UPDATE_FILE: &str = ".last_update";

pub struct FileStore {
    json_dir: PathBuf,
}

impl FileStore {
    pub fn new(json_dir: impl Into<PathBuf>) -> Self {
        Self {
            json_dir: json_dir.into(),
        }
    }

    pub fn json_dir(&self) -> &Path {
        &self.json_dir
    }

    /// Path of the file holding the marker for `name`
    ///
    /// - `/` → `json_dir/.last_update`
    /// - `regions/` → `json_dir/regions/.last_update`
    /// - `regions/de.json` → `json_dir/regions/.de.json.last_modified`
    pub fn last_modified_path(&self, name: &str) -> PathBuf {
        if name == "/" {
            return self.json_dir.join(LAST_UPDATE_FILE);
        }
        if name.ends_with('/') {
            return self.json_dir.join(name).join(LAST_UPDATE_FILE);
        }
        let (dir, base) = split_name(name);
        self.json_dir.join(dir).join(format!(".{}.last_modified", base))
    }

    /// All `*.json` documents below the root, as `/`-separated relative names.
    ///
    /// A root that cannot be read yields an empty list.
    pub fn all_json_files(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.walk(&self.json_dir, "", &mut names);
        names
    }

    fn walk(&self, dir: &Path, prefix: &str, names: &mut Vec<String>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound || prefix.is_empty() {
                    warn!("Failed to list product details directory {:?}: {}", dir, e);
                }
                return;
            }
        };

        for entry in entries.flatten() {
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let name = format!("{}{}", prefix, file_name);
            if file_type.is_dir() {
                self.walk(&entry.path(), &format!("{}/", name), names);
            } else if file_name.ends_with(".json") {
                names.push(name);
            }
        }
    }

    fn read_to_string(path: &Path) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read {:?}: {}", path, e);
                None
            }
        }
    }

    /// Write `contents` to `path` through a temp file in the same directory so
    /// readers never see a partial write
    fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
        let dir = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file().set_permissions(fs::Permissions::from_mode(0o644))?;
        }

        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

/// Split `regions/de.json` into (`regions`, `de.json`)
fn split_name(name: &str) -> (&str, &str) {
    match name.rsplit_once('/') {
        Some((dir, base)) => (dir, base),
        None => ("", name),
    }
}

impl DocumentStore for FileStore {
    fn last_modified(&self, name: &str) -> Option<String> {
        if validate_name(name).is_err() {
            return None;
        }
        let mut path = self.last_modified_path(name);
        if !path.exists() && !is_marker_name(name) {
            let collection_marker = match split_name(name) {
                ("", _) => "/".to_string(),
                (dir, _) => format!("{}/", dir),
            };
            path = self.last_modified_path(&collection_marker);
        }
        Self::read_to_string(&path)
    }

    fn content(&self, name: &str) -> Option<String> {
        if validate_name(name).is_err() {
            warn!("Refusing to read invalid product details name {}", name);
            return None;
        }
        if is_marker_name(name) {
            return None;
        }
        let path = self.json_dir.join(name);
        match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!("Requested product details file {} is not UTF-8!", name);
                None
            }
            Err(_) => {
                warn!("Requested product details file {} not found!", name);
                None
            }
        }
    }

    fn list_names(&self, collection: Collection) -> BTreeSet<String> {
        self.all_json_files()
            .into_iter()
            .filter(|name| collection.contains(name))
            .collect()
    }

    fn update(&self, name: &str, content: &str, last_modified: &str) -> Result<(), StoreError> {
        validate_name(name)?;

        // Collection markers ("/", "regions/") carry no content of their own
        if !is_marker_name(name) {
            debug!("Writing new copy of {} to {:?}", name, self.json_dir);
            Self::write_atomic(&self.json_dir.join(name), content)?;
        }

        Self::write_atomic(&self.last_modified_path(name), last_modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        (temp_dir, store)
    }

    #[rstest]
    #[case("/", ".last_update")]
    #[case("regions/", "regions/.last_update")]
    #[case("maude.json", ".maude.json.last_modified")]
    #[case("regions/de.json", "regions/.de.json.last_modified")]
    fn last_modified_path_for_name(#[case] name: &str, #[case] expected: &str) {
        let (temp_dir, store) = store();
        assert_eq!(
            store.last_modified_path(name),
            temp_dir.path().join(expected)
        );
    }

    #[test]
    fn update_then_read_round_trips() {
        let (_temp_dir, store) = store();

        store.update("dude.json", "abide", "never modified").unwrap();
        assert_eq!(store.content("dude.json").as_deref(), Some("abide"));
        assert_eq!(
            store.last_modified("dude.json").as_deref(),
            Some("never modified")
        );

        store.update("dude.json", "bowling", "just now").unwrap();
        assert_eq!(store.content("dude.json").as_deref(), Some("bowling"));
        assert_eq!(store.last_modified("dude.json").as_deref(), Some("just now"));
    }

    #[test]
    fn update_creates_collection_directories() {
        let (temp_dir, store) = store();

        store.update("regions/de.json", "{}", "then").unwrap();

        assert!(temp_dir.path().join("regions/de.json").is_file());
        assert_eq!(store.content("regions/de.json").as_deref(), Some("{}"));
    }

    #[test]
    fn update_with_empty_content_writes_only_collection_marker() {
        let (temp_dir, store) = store();

        store.update("/", "", "just now").unwrap();
        store.update("regions/", "", "a while back").unwrap();

        assert_eq!(store.last_modified("/").as_deref(), Some("just now"));
        assert_eq!(
            store.last_modified("regions/").as_deref(),
            Some("a while back")
        );
        assert!(store.all_json_files().is_empty());
        assert!(temp_dir.path().join("regions/.last_update").is_file());
    }

    #[test]
    fn last_modified_falls_back_to_collection_marker() {
        let (temp_dir, store) = store();
        store.update("/", "", "root marker").unwrap();
        store.update("regions/", "", "regions marker").unwrap();
        fs::write(temp_dir.path().join("uli.json"), "{}").unwrap();
        fs::write(temp_dir.path().join("regions/fr.json"), "{}").unwrap();

        assert_eq!(store.last_modified("uli.json").as_deref(), Some("root marker"));
        assert_eq!(
            store.last_modified("regions/fr.json").as_deref(),
            Some("regions marker")
        );
    }

    #[test]
    fn missing_files_are_absent() {
        let (_temp_dir, store) = store();

        assert_eq!(store.content("nope.json"), None);
        assert_eq!(store.last_modified("nope.json"), None);
        assert_eq!(store.last_modified("/"), None);
    }

    #[test]
    fn content_rejects_escaping_names() {
        let (_temp_dir, store) = store();
        assert_eq!(store.content("../secret.json"), None);
        assert!(matches!(
            store.update("../secret.json", "{}", "now"),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn all_json_files_walks_subdirectories() {
        let (temp_dir, store) = store();
        fs::create_dir_all(temp_dir.path().join("regions")).unwrap();
        for name in ["dude.json", "walter.json", "regions/de.json", "regions/fr.json"] {
            fs::write(temp_dir.path().join(name), "{}").unwrap();
        }
        fs::write(temp_dir.path().join("README.txt"), "hi").unwrap();
        fs::write(temp_dir.path().join(".last_update"), "now").unwrap();

        let mut files = store.all_json_files();
        files.sort();
        assert_eq!(
            files,
            vec!["dude.json", "regions/de.json", "regions/fr.json", "walter.json"]
        );
    }

    #[test]
    fn all_json_files_for_missing_dir_is_empty() {
        let store = FileStore::new("/does/not/exist");
        assert!(store.all_json_files().is_empty());
    }

    #[test]
    fn list_names_filters_by_collection() {
        let (_temp_dir, store) = store();
        store.update("dude.json", "{}", "now").unwrap();
        store.update("regions/de.json", "{}", "now").unwrap();

        assert_eq!(
            store.list_names(Collection::Versions),
            BTreeSet::from(["dude.json".to_string()])
        );
        assert_eq!(
            store.list_names(Collection::Regions),
            BTreeSet::from(["regions/de.json".to_string()])
        );
    }

    #[cfg(unix)]
    #[test]
    fn written_documents_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let (temp_dir, store) = store();
        store.update("dude.json", "{}", "now").unwrap();

        let mode = fs::metadata(temp_dir.path().join("dude.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
