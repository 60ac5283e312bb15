// Collect stage: newest Play Store reviews inside the trend window -> reviews table.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use super::{last_run_key, run_stamp};
use crate::db::Database;
use crate::playstore::client::PlayStoreClient;
use crate::playstore::reviews;

/// Fetch and store recent reviews. Returns how many were stored.
pub async fn run(
    client: &PlayStoreClient,
    db: &Arc<dyn Database>,
    app_id: &str,
    max_reviews: usize,
    window_days: i64,
    now: DateTime<Utc>,
) -> Result<usize> {
    let recent = reviews::fetch_recent_reviews(client, app_id, max_reviews, window_days, now)
        .await
        .with_context(|| format!("Failed to collect reviews for {app_id}"))?;

    let stored = db.upsert_reviews(app_id, &recent).await?;
    db.set_run_state(&last_run_key("collect", app_id), &run_stamp(Utc::now()))
        .await?;

    info!(app_id = app_id, stored = stored, "Collect stage complete");
    Ok(stored)
}
