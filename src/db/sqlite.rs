// SqliteDatabase: rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{Review, TopicRecord};
use super::queries;
use super::traits::Database;
use crate::topics::canonical::CanonicalMap;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn get_run_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        queries::get_run_state(&conn, key)
    }

    async fn set_run_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::set_run_state(&conn, key, value)
    }

    async fn upsert_reviews(&self, app_id: &str, reviews: &[Review]) -> Result<usize> {
        let conn = self.conn.lock().await;
        queries::upsert_reviews(&conn, app_id, reviews)
    }

    async fn get_reviews(&self, app_id: &str) -> Result<Vec<Review>> {
        let conn = self.conn.lock().await;
        queries::get_reviews(&conn, app_id)
    }

    async fn get_unextracted_reviews(&self, app_id: &str) -> Result<Vec<Review>> {
        let conn = self.conn.lock().await;
        queries::get_unextracted_reviews(&conn, app_id)
    }

    async fn count_reviews(&self, app_id: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::count_reviews(&conn, app_id)
    }

    async fn upsert_topic_record(&self, app_id: &str, record: &TopicRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::upsert_topic_record(&conn, app_id, record)
    }

    async fn get_topic_records(&self, app_id: &str) -> Result<Vec<TopicRecord>> {
        let conn = self.conn.lock().await;
        queries::get_topic_records(&conn, app_id)
    }

    async fn count_topic_records(&self, app_id: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::count_topic_records(&conn, app_id)
    }

    async fn save_canonical_map(
        &self,
        app_id: &str,
        map: &CanonicalMap,
        threshold: f64,
        backend: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::save_canonical_map(&conn, app_id, map, threshold, backend)
    }

    async fn get_canonical_map(&self, app_id: &str) -> Result<CanonicalMap> {
        let conn = self.conn.lock().await;
        queries::get_canonical_map(&conn, app_id)
    }

    async fn get_canonical_settings(&self, app_id: &str) -> Result<Option<(f64, String)>> {
        let conn = self.conn.lock().await;
        queries::get_canonical_settings(&conn, app_id)
    }
}
