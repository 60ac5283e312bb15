// Similarity and embedding traits: the swap-ready seams around the canonicalizer.
//
// The canonicalizer only needs a pairwise score. Where that score comes from
// (precomputed sentence-embedding matrix, lexical token overlap, a fixed table
// in tests) is hidden behind TopicSimilarity. TopicEmbedder is the batch
// encoder behind the embedding-backed implementation.

use anyhow::Result;
use async_trait::async_trait;

use crate::error::TrendResult;

/// Pairwise semantic similarity between two topic strings.
///
/// Implementations must return a score in [0, 1]. Anything else (NaN,
/// negative, above 1) is treated by the canonicalizer as a data quality
/// failure of the provider, not clamped.
pub trait TopicSimilarity {
    fn similarity(&self, a: &str, b: &str) -> TrendResult<f64>;
}

/// Plain functions and closures work as similarity providers.
impl<F> TopicSimilarity for F
where
    F: Fn(&str, &str) -> f64,
{
    fn similarity(&self, a: &str, b: &str) -> TrendResult<f64> {
        Ok(self(a, b))
    }
}

/// Encodes a batch of strings into fixed-length vectors.
///
/// Async because the ONNX implementation offloads inference to a blocking
/// thread; a remote embedding service would be async anyway.
#[async_trait]
pub trait TopicEmbedder: Send + Sync {
    /// Embed every text, returning vectors in the same order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;
}
