// src/local/metadata.rs

//! SQLite-backed registry

use super::LocalMetaData;
use crate::db::{self, models::MetaDataEntry, schema};
use crate::error::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

/// Registry persisted in a SQLite database
pub struct SqliteMetaData {
    conn: Connection,
}

impl SqliteMetaData {
    /// Open the registry at `db_path`, creating it if needed
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = db::open_or_init(db_path)?;
        Ok(Self { conn })
    }

    /// Open an existing registry without creating one
    ///
    /// Fails with [`Error::DatabaseNotFound`] if nothing is installed yet.
    pub fn open_existing(db_path: &Path) -> Result<Self> {
        let conn = db::open(db_path)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Volatile registry, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Every registered entry with its version and install time
    pub fn entries(&self) -> Result<Vec<MetaDataEntry>> {
        MetaDataEntry::list_all(&self.conn)
    }

    /// Distinct version ids with at least one installed file
    pub fn versions(&self) -> Result<Vec<i64>> {
        MetaDataEntry::distinct_versions(&self.conn)
    }
}

impl LocalMetaData for SqliteMetaData {
    fn list_entries(&self) -> Result<Vec<String>> {
        Ok(self.entries()?.into_iter().map(|e| e.file_name).collect())
    }

    fn register_entry(&self, file_name: &str, version_id: i64) -> Result<()> {
        debug!("Registering {} (version {})", file_name, version_id);
        MetaDataEntry::new(file_name.to_string(), version_id).insert(&self.conn)
    }

    fn remove_entry(&self, file_name: &str) -> Result<()> {
        if MetaDataEntry::delete(&self.conn, file_name)? {
            debug!("Unregistered {}", file_name);
        }
        Ok(())
    }

    fn exists(&self, file_name: &str) -> Result<bool> {
        Ok(MetaDataEntry::find_by_name(&self.conn, file_name)?.is_some())
    }

    fn version_of(&self, file_name: &str) -> Result<i64> {
        MetaDataEntry::find_by_name(&self.conn, file_name)?
            .map(|e| e.version_id)
            .ok_or_else(|| Error::EntryNotFound(file_name.to_string()))
    }
}
