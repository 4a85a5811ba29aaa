use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::storage::{Collection, DocumentStore, FileStore, is_marker_name, validate_name};

/// SQLite-backed document storage: one row per document name.
///
/// Collection markers live in the synthetic rows `/` and `regions/`, whose
/// content is empty.
pub struct TableStore {
    conn: Mutex<Connection>,
}

impl TableStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        info!("Initializing product details database at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // Enable WAL mode so the update job does not block readers
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn create_schema(&self) -> Result<(), StoreError> {
        debug!("Creating database schema");

        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS product_details_file (
                name TEXT PRIMARY KEY NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                last_modified TEXT NOT NULL
            )
            "#,
            [],
        )?;

        Ok(())
    }

    fn query_column(&self, column: Column, name: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {} FROM product_details_file WHERE name = ?1",
            column.as_str()
        );
        let value = conn
            .query_row(&sql, [name], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn query_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt =
            conn.prepare("SELECT name FROM product_details_file WHERE name LIKE '%.json'")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        let conn = self.lock_conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM product_details_file)",
            [],
            |row| row.get(0),
        )?;
        Ok(!exists)
    }

    /// Seed an empty table from a JSON file tree.
    ///
    /// Copies every JSON document with its marker, plus the `/` and `regions/`
    /// collection markers. Does nothing when the table already holds data.
    /// Returns the number of rows written.
    pub fn import_from(&self, files: &FileStore) -> Result<usize, StoreError> {
        if !self.is_empty()? {
            info!("Product details table already populated, skipping import");
            return Ok(0);
        }

        let names = files.all_json_files();
        if names.is_empty() {
            info!("No JSON files found in {:?}", files.json_dir());
            return Ok(0);
        }

        let mut rows: Vec<(String, String, String)> = names
            .into_iter()
            .filter_map(|name| {
                let content = files.content(&name)?;
                let last_modified = files.last_modified(&name).unwrap_or_default();
                Some((name, content, last_modified))
            })
            .collect();
        for collection in Collection::ALL {
            let marker = collection.marker_name();
            rows.push((
                marker.to_string(),
                String::new(),
                files.last_modified(marker).unwrap_or_default(),
            ));
        }

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO product_details_file (name, content, last_modified) VALUES (?1, ?2, ?3)",
            )?;
            for row in &rows {
                stmt.execute((&row.0, &row.1, &row.2))?;
            }
        }
        tx.commit()?;

        info!("Imported {} product details rows", rows.len());
        Ok(rows.len())
    }
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Content,
    LastModified,
}

impl Column {
    fn as_str(self) -> &'static str {
        match self {
            Column::Content => "content",
            Column::LastModified => "last_modified",
        }
    }
}

impl DocumentStore for TableStore {
    fn last_modified(&self, name: &str) -> Option<String> {
        self.query_column(Column::LastModified, name)
            .inspect_err(|e| warn!("Failed to read last modified for {}: {}", name, e))
            .ok()
            .flatten()
    }

    fn content(&self, name: &str) -> Option<String> {
        if is_marker_name(name) {
            return None;
        }
        let content = self
            .query_column(Column::Content, name)
            .inspect_err(|e| warn!("Failed to read product details file {}: {}", name, e))
            .ok()
            .flatten();
        if content.is_none() {
            warn!("Requested product details file {} not found!", name);
        }
        content
    }

    fn list_names(&self, collection: Collection) -> BTreeSet<String> {
        self.query_names()
            .inspect_err(|e| warn!("Failed to list {} documents: {}", collection, e))
            .unwrap_or_default()
            .into_iter()
            .filter(|name| collection.contains(name))
            .collect()
    }

    fn update(&self, name: &str, content: &str, last_modified: &str) -> Result<(), StoreError> {
        validate_name(name)?;
        debug!("Saving {} to database", name);

        // Collection markers carry no content of their own
        let content = if is_marker_name(name) { "" } else { content };

        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO product_details_file (name, content, last_modified)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET
                content = excluded.content,
                last_modified = excluded.last_modified
            "#,
            (name, content, last_modified),
        )?;

        Ok(())
    }
}
