// src/db/mod.rs

//! Database layer for the installed-file registry
//!
//! This module handles all SQLite operations including:
//! - Database initialization and schema creation
//! - Connection management

pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

/// Initialize a new registry database at the specified path
///
/// Creates the database file and brings the schema up to date.
/// This is idempotent - calling it on an existing database is safe.
pub fn init(db_path: &Path) -> Result<()> {
    debug!("Initializing database at: {}", db_path.display());

    // Create parent directories if they don't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::InitError(format!("Failed to create database directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)?;

    // FULL sync keeps every committed registry entry across a crash
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = FULL;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    schema::migrate(&conn)?;

    info!("Database initialized successfully");
    Ok(())
}

/// Open an existing registry database
pub fn open(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        return Err(Error::DatabaseNotFound(db_path.display().to_string()));
    }

    let conn = Connection::open(db_path)?;

    conn.execute_batch(
        "
        PRAGMA synchronous = FULL;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    Ok(conn)
}

/// Open the database, creating and migrating it first if needed
pub fn open_or_init(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        init(db_path)?;
    }
    let conn = open(db_path)?;
    schema::migrate(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_init_creates_database() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_path_buf();

        // Remove the temp file so init can create it
        drop(temp_file);

        let result = init(&db_path);
        assert!(result.is_ok());
        assert!(db_path.exists());
    }

    #[test]
    fn test_open_existing_database() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path();

        init(db_path).unwrap();

        let result = open(db_path);
        assert!(result.is_ok());
    }

    #[test]
    fn test_open_nonexistent_database() {
        let result = open(Path::new("/nonexistent/path/db.sqlite"));
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), Error::DatabaseNotFound(_)));
    }

    #[test]
    fn test_open_or_init_creates_nested_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested/data/metadata.db");

        let conn = open_or_init(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(schema::get_schema_version(&conn).unwrap(), schema::SCHEMA_VERSION);
    }
}
