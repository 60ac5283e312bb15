// Dedup stage: raw topics -> canonical topics.
//
// Only records inside the trailing window are clustered. Their unique topics
// are embedded in one batch, the pairwise similarities are computed once, and
// the greedy canonicalizer runs over them in first-appearance order (newest
// record first). The resulting map replaces whatever map was stored for the
// app before.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use super::{last_run_key, records_in_window, run_stamp};
use crate::db::models::TopicRecord;
use crate::db::Database;
use crate::error::validate_threshold;
use crate::topics::canonical::{canonicalize, unique_topics, CanonicalMap};
use crate::topics::embeddings::EmbeddingSimilarity;
use crate::topics::lexical::LexicalSimilarity;
use crate::topics::traits::TopicEmbedder;

/// Where pairwise topic similarity comes from for one run.
#[derive(Clone, Copy)]
pub enum SimilaritySource<'a> {
    Embedding(&'a dyn TopicEmbedder),
    Lexical,
}

impl SimilaritySource<'_> {
    /// Name stored next to the map so `status` can report it.
    pub fn name(&self) -> &'static str {
        match self {
            SimilaritySource::Embedding(_) => "embedding",
            SimilaritySource::Lexical => "lexical",
        }
    }
}

/// Cluster the topics of `records` into a canonical map.
///
/// The threshold is checked before any embedding work starts.
pub async fn canonicalize_records(
    records: &[TopicRecord],
    source: SimilaritySource<'_>,
    threshold: f64,
) -> Result<CanonicalMap> {
    validate_threshold(threshold)?;
    let topics = unique_topics(records);

    let map = match source {
        SimilaritySource::Embedding(embedder) => {
            let similarity = EmbeddingSimilarity::compute(embedder, &topics).await?;
            canonicalize(&topics, &similarity, threshold)?
        }
        SimilaritySource::Lexical => {
            let similarity = LexicalSimilarity::new();
            canonicalize(&topics, &similarity, threshold)?
        }
    };

    Ok(map)
}

/// Rebuild and store the canonical map of `app_id` from the records of the
/// last `window_days` before `now`.
pub async fn run(
    db: &Arc<dyn Database>,
    app_id: &str,
    source: SimilaritySource<'_>,
    threshold: f64,
    window_days: i64,
    now: DateTime<Utc>,
) -> Result<CanonicalMap> {
    validate_threshold(threshold)?;
    let stored = db.get_topic_records(app_id).await?;
    let stored_count = stored.len();
    let records = records_in_window(stored, window_days, now)?;
    let map = canonicalize_records(&records, source, threshold).await?;

    db.save_canonical_map(app_id, &map, threshold, source.name())
        .await?;
    db.set_run_state(&last_run_key("dedup", app_id), &run_stamp(Utc::now()))
        .await?;

    info!(
        app_id = app_id,
        records = records.len(),
        outside_window = stored_count - records.len(),
        raw_topics = map.len(),
        canonical_topics = map.canonical_count(),
        threshold = threshold,
        backend = source.name(),
        "Dedup stage complete"
    );
    Ok(map)
}
