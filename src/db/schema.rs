// Database schema: table creation.
//
// A `schema_version` table records the schema version a database was
// created with.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// Idempotent, so it is safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Raw reviews as collected from the store
        CREATE TABLE IF NOT EXISTS reviews (
            review_id TEXT PRIMARY KEY,
            app_id TEXT NOT NULL,
            user_name TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT '',
            score INTEGER NOT NULL DEFAULT 0,     -- 1 to 5 stars
            reviewed_at TEXT NOT NULL,            -- RFC 3339, UTC
            thumbs_up INTEGER NOT NULL DEFAULT 0,
            app_version TEXT,
            collected_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One extracted observation per review
        CREATE TABLE IF NOT EXISTS topic_records (
            review_id TEXT PRIMARY KEY,
            app_id TEXT NOT NULL,
            reviewed_at TEXT NOT NULL,            -- copied from the review, RFC 3339
            category TEXT NOT NULL,               -- issue / feature_request / feedback / other
            topic TEXT NOT NULL,                  -- raw, not canonicalized
            sentiment TEXT NOT NULL,              -- positive / negative / neutral
            extracted_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Latest canonical map per app. Replaced wholesale on every dedup run.
        CREATE TABLE IF NOT EXISTS canonical_topics (
            app_id TEXT NOT NULL,
            position INTEGER NOT NULL,            -- visit order during clustering
            topic TEXT NOT NULL,
            canonical_topic TEXT NOT NULL,
            threshold REAL NOT NULL,
            backend TEXT NOT NULL,                -- embedding / lexical
            built_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (app_id, topic)
        );

        -- Last-run timestamps and similar bookkeeping
        CREATE TABLE IF NOT EXISTS run_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_reviews_app_time
            ON reviews(app_id, reviewed_at);

        CREATE INDEX IF NOT EXISTS idx_topic_records_app_time
            ON topic_records(app_id, reviewed_at);
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    Ok(())
}

/// Count the user tables (used by `init` to report what was created).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        assert_eq!(table_count(&conn).unwrap(), 5);
    }

    #[test]
    fn test_schema_version_recorded_once() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        let (rows, max): (i64, i64) = conn
            .query_row("SELECT COUNT(*), MAX(version) FROM schema_version", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!((rows, max), (1, 1));
    }

    #[test]
    fn test_canonical_topics_has_backend_column() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute(
            "INSERT INTO canonical_topics (app_id, position, topic, canonical_topic, threshold, backend)
             VALUES ('app', 0, 'crash', 'crash', 0.85, 'lexical')",
            [],
        )
        .unwrap();
    }
}
