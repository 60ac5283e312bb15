// Extract stage: stored reviews without a topic record -> topic_records table.
//
// Reviews go through the extractor with bounded concurrency. Results come
// back in input order and are written one at a time. A review whose call
// fails is logged and left unextracted, so the next run picks it up again.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use super::{last_run_key, run_stamp};
use crate::db::Database;
use crate::extract::traits::TopicExtractor;

/// What one extract run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Reviews that had no topic record when the run started
    pub pending: usize,
    pub extracted: usize,
    /// Reviews with no text to extract from
    pub skipped_empty: usize,
    /// Reviews whose extractor call failed (retried next run)
    pub failed: usize,
}

/// Extract topics for every review of `app_id` that doesn't have one yet.
pub async fn run(
    extractor: &dyn TopicExtractor,
    db: &Arc<dyn Database>,
    app_id: &str,
    concurrency: usize,
) -> Result<ExtractSummary> {
    let pending = db.get_unextracted_reviews(app_id).await?;
    let mut summary = ExtractSummary {
        pending: pending.len(),
        ..Default::default()
    };

    if pending.is_empty() {
        info!(app_id = app_id, "No reviews waiting for extraction");
        return Ok(summary);
    }

    info!(
        app_id = app_id,
        pending = pending.len(),
        concurrency = concurrency,
        "Extracting topics"
    );

    let pb = ProgressBar::new(pending.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  Extracting [{bar:30}] {pos}/{len} ({eta})")
            .context("Invalid progress template")?,
    );

    let mut results = stream::iter(pending.iter().map(|review| async move {
        (review, extractor.extract_review(review).await)
    }))
    .buffered(concurrency.max(1));

    while let Some((review, result)) = results.next().await {
        match result {
            Ok(Some(record)) => {
                db.upsert_topic_record(app_id, &record).await?;
                summary.extracted += 1;
            }
            Ok(None) => {
                summary.skipped_empty += 1;
            }
            Err(e) => {
                warn!(
                    review_id = %review.review_id,
                    error = %e,
                    "Extraction failed, skipping review"
                );
                summary.failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    db.set_run_state(&last_run_key("extract", app_id), &run_stamp(Utc::now()))
        .await?;

    info!(
        extracted = summary.extracted,
        skipped_empty = summary.skipped_empty,
        failed = summary.failed,
        "Extract stage complete"
    );
    Ok(summary)
}
