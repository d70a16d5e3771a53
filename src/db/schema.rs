// src/db/schema.rs

//! Registry schema and migrations
//!
//! Migrations are listed in [`MIGRATIONS`] in ascending order. Each one runs
//! in its own SQLite transaction together with the `schema_version` row that
//! records it, so a crash never leaves a half-applied step behind.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

/// One schema step
struct Migration {
    version: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "installed file registry",
        sql: "
            CREATE TABLE installed_files (
                file_name TEXT PRIMARY KEY NOT NULL,
                version_id INTEGER NOT NULL CHECK(version_id > 0),
                installed_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        ",
    },
    Migration {
        version: 2,
        description: "index entries by version",
        sql: "
            CREATE INDEX idx_installed_files_version ON installed_files(version_id);
        ",
    },
];

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

fn ensure_version_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    )?;
    Ok(())
}

/// Highest applied schema version, 0 for a fresh database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    ensure_version_table(conn)?;

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })
        .optional()?
        .flatten();

    Ok(version.unwrap_or(0))
}

/// Bring the database up to [`SCHEMA_VERSION`]
pub fn migrate(conn: &Connection) -> Result<()> {
    let current = get_schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(Error::InitError(format!(
            "registry schema version {} is newer than supported version {}",
            current, SCHEMA_VERSION
        )));
    }
    if current == SCHEMA_VERSION {
        debug!("Registry schema is current (version {})", current);
        return Ok(());
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(
            "Applying registry migration {}: {}",
            migration.version, migration.description
        );
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [migration.version],
        )?;
        tx.commit()?;
    }

    info!("Registry schema now at version {}", SCHEMA_VERSION);
    Ok(())
}
