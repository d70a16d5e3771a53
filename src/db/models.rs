// src/db/models.rs

//! Data models for registry database entities
//!
//! Each registry row maps an installed file name to the version id that
//! installed it. Every write is a single autocommit statement, so a row is
//! either fully committed or absent.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, ffi, params};

/// An installed file tracked by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDataEntry {
    pub file_name: String,
    pub version_id: i64,
    pub installed_at: Option<String>,
}

impl MetaDataEntry {
    /// Create a new MetaDataEntry
    pub fn new(file_name: String, version_id: i64) -> Self {
        Self {
            file_name,
            version_id,
            installed_at: None,
        }
    }

    /// Insert this entry into the database
    ///
    /// Fails with [`Error::DuplicateEntry`] if the file name is already present.
    pub fn insert(&self, conn: &Connection) -> Result<()> {
        let result = conn.execute(
            "INSERT INTO installed_files (file_name, version_id) VALUES (?1, ?2)",
            params![&self.file_name, &self.version_id],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Err(Error::DuplicateEntry(self.file_name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Find an entry by file name
    pub fn find_by_name(conn: &Connection, file_name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT file_name, version_id, installed_at FROM installed_files WHERE file_name = ?1",
        )?;

        let entry = stmt.query_row([file_name], Self::from_row).optional()?;

        Ok(entry)
    }

    /// List all entries ordered by file name
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT file_name, version_id, installed_at FROM installed_files ORDER BY file_name",
        )?;

        let entries = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Distinct version ids present in the registry
    pub fn distinct_versions(conn: &Connection) -> Result<Vec<i64>> {
        let mut stmt =
            conn.prepare("SELECT DISTINCT version_id FROM installed_files ORDER BY version_id")?;

        let versions = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(versions)
    }

    /// Delete an entry by file name, returning whether a row was removed
    pub fn delete(conn: &Connection, file_name: &str) -> Result<bool> {
        let removed = conn.execute("DELETE FROM installed_files WHERE file_name = ?1", [file_name])?;
        Ok(removed > 0)
    }

    /// Convert a database row to a MetaDataEntry
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            file_name: row.get(0)?,
            version_id: row.get(1)?,
            installed_at: row.get(2)?,
        })
    }
}
