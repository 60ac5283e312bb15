// Database layer: SQLite storage for every pipeline stage's output.
//
// rusqlite with the "bundled" feature, so there's no system SQLite
// dependency. The file lives wherever REVIEWTREND_DB_PATH points
// (defaults to ./reviewtrend.db).

pub mod models;
pub mod queries;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use traits::Database;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Open (or create) the database and create its tables.
pub fn initialize(db_path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {}", db_path))?;
        }
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;

    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Open an existing database (fails if it doesn't exist yet).
///
/// Table creation still runs, so any missing table is added.
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        anyhow::bail!(
            "Database not found at {}. Run `reviewtrend init` first.",
            db_path
        );
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Create the database if needed and wrap it behind the Database trait.
pub fn initialize_sqlite(db_path: &str) -> Result<Arc<dyn Database>> {
    Ok(Arc::new(sqlite::SqliteDatabase::new(initialize(db_path)?)))
}

/// Open an existing database behind the Database trait.
pub fn open_sqlite(db_path: &str) -> Result<Arc<dyn Database>> {
    Ok(Arc::new(sqlite::SqliteDatabase::new(open(db_path)?)))
}

/// Fresh in-memory database, for tests and dry runs.
pub fn in_memory() -> Result<Arc<dyn Database>> {
    let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
    schema::create_tables(&conn)?;
    Ok(Arc::new(sqlite::SqliteDatabase::new(conn)))
}
