// Topic extractor trait: the swap-ready abstraction over the language model.
//
// The default implementation calls an OpenAI-compatible chat endpoint. Any
// other classifier (a local model, a rules engine) can stand in without
// touching the pipeline.

use anyhow::Result;
use async_trait::async_trait;

use crate::db::models::{Review, TopicRecord};

/// Turns one review into a {category, topic, sentiment} observation.
#[async_trait]
pub trait TopicExtractor: Send + Sync {
    /// Extract a topic record from a review.
    ///
    /// Returns `Ok(None)` for reviews with nothing to analyze (blank text).
    /// Errors mean the extractor itself failed (network, auth, quota).
    async fn extract_review(&self, review: &Review) -> Result<Option<TopicRecord>>;
}
