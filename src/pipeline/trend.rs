// Trend stage: topic records + canonical map -> trend matrix -> CSV.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use super::{last_run_key, records_in_window, run_stamp};
use crate::db::Database;
use crate::error::validate_window_days;
use crate::trend::export::save_csv;
use crate::trend::{build_trend, TrendMatrix};

/// Build the trend matrix of `app_id` from what is stored.
///
/// Fails if records inside the window exist that the stored canonical map
/// doesn't cover. That happens when `extract` ran after the last `dedup`, or
/// when `dedup` ran with a different window.
pub async fn build(
    db: &Arc<dyn Database>,
    app_id: &str,
    window_days: i64,
    now: DateTime<Utc>,
) -> Result<TrendMatrix> {
    validate_window_days(window_days)?;

    let records = records_in_window(db.get_topic_records(app_id).await?, window_days, now)?;
    let map = db.get_canonical_map(app_id).await?;

    if map.is_empty() && !records.is_empty() {
        anyhow::bail!(
            "No canonical topics stored for {app_id}. Run `reviewtrend dedup` first."
        );
    }

    let annotated = map
        .annotate(&records)
        .context("Canonical map is out of date; re-run `reviewtrend dedup`")?;

    Ok(build_trend(&annotated, window_days, now)?)
}

/// Build the matrix and write it to `csv_path`.
pub async fn run(
    db: &Arc<dyn Database>,
    app_id: &str,
    window_days: i64,
    now: DateTime<Utc>,
    csv_path: &Path,
) -> Result<TrendMatrix> {
    let matrix = build(db, app_id, window_days, now).await?;
    save_csv(&matrix, csv_path)?;

    db.set_run_state(&last_run_key("trend", app_id), &run_stamp(Utc::now()))
        .await?;

    info!(
        app_id = app_id,
        topics = matrix.topics().len(),
        days = matrix.days().len(),
        path = %csv_path.display(),
        "Trend stage complete"
    );
    Ok(matrix)
}
