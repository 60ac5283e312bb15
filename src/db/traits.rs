// Database trait: backend-agnostic async interface for all DB operations.
//
// SqliteDatabase is the only implementation today. Methods are async so a
// natively async backend could slot in later without touching the pipeline.
// The trait mirrors the free functions in queries.rs one to one.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{Review, TopicRecord};
use crate::topics::canonical::CanonicalMap;

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Run state ---

    async fn get_run_state(&self, key: &str) -> Result<Option<String>>;

    async fn set_run_state(&self, key: &str, value: &str) -> Result<()>;

    // --- Reviews ---

    /// Insert or refresh collected reviews; returns the number written.
    async fn upsert_reviews(&self, app_id: &str, reviews: &[Review]) -> Result<usize>;

    async fn get_reviews(&self, app_id: &str) -> Result<Vec<Review>>;

    /// Reviews that don't have a topic record yet.
    async fn get_unextracted_reviews(&self, app_id: &str) -> Result<Vec<Review>>;

    async fn count_reviews(&self, app_id: &str) -> Result<i64>;

    // --- Topic records ---

    async fn upsert_topic_record(&self, app_id: &str, record: &TopicRecord) -> Result<()>;

    async fn get_topic_records(&self, app_id: &str) -> Result<Vec<TopicRecord>>;

    async fn count_topic_records(&self, app_id: &str) -> Result<i64>;

    // --- Canonical topics ---

    /// Replace the stored map of an app.
    async fn save_canonical_map(
        &self,
        app_id: &str,
        map: &CanonicalMap,
        threshold: f64,
        backend: &str,
    ) -> Result<()>;

    /// Stored map of an app; empty when dedup hasn't run.
    async fn get_canonical_map(&self, app_id: &str) -> Result<CanonicalMap>;

    /// (threshold, backend) the stored map was built with.
    async fn get_canonical_settings(&self, app_id: &str) -> Result<Option<(f64, String)>>;
}
