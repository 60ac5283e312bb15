// Sentence embedding similarity using all-MiniLM-L6-v2.
//
// Short topic labels like "login crash" and "app crashes on login" share few
// characters but land close together in embedding space. Each unique topic of
// a run is embedded once (one batch), the pairwise cosine matrix is computed
// up front, and the canonicalizer reads scores out of that matrix.
//
// The model runs locally via ONNX, so there are no API calls or rate limits.
// Mean pooling is applied to token embeddings (matching the model's training).

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::traits::{TopicEmbedder, TopicSimilarity};
use crate::error::{TrendError, TrendResult};

/// Embedding dimension for all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Sentence embedder using a local ONNX model.
///
/// Arc<Mutex<Session>> because Session::run takes &mut self and inference is
/// moved onto spawn_blocking. Construct one per pipeline run and drop it when
/// the run ends.
pub struct SentenceEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
}

impl SentenceEmbedder {
    /// Load the sentence embedding model and tokenizer from the given directory.
    ///
    /// Expects `model.onnx` and `tokenizer.json` in the directory.
    /// Run `reviewtrend download-model` first if they don't exist.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            anyhow::bail!(
                "Embedding model not found: {}\nRun `reviewtrend download-model` to download it.",
                model_path.display()
            );
        }
        if !tokenizer_path.exists() {
            anyhow::bail!(
                "Embedding tokenizer not found: {}\nRun `reviewtrend download-model` to download it.",
                tokenizer_path.display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| {
                format!(
                    "Failed to load embedding model from {}",
                    model_path.display()
                )
            })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load embedding tokenizer: {}", e))?;

        debug!(
            "Loaded sentence embedding model from {}",
            model_dir.display()
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
        })
    }
}

#[async_trait]
impl TopicEmbedder for SentenceEmbedder {
    /// Embed a batch of texts into 384-dimensional vectors.
    ///
    /// CPU-bound work is offloaded to spawn_blocking to keep the async
    /// runtime responsive.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || embed_sync(&session, &tokenizer, &texts))
            .await
            .context("spawn_blocking panicked")?
    }
}

/// Synchronous embedding: tokenization, inference and mean pooling.
fn embed_sync(
    session: &Arc<Mutex<Session>>,
    tokenizer: &Arc<Tokenizer>,
    texts: &[String],
) -> Result<Vec<Vec<f64>>> {
    let encodings: Vec<_> = texts
        .iter()
        .map(|t| {
            tokenizer
                .encode(t.as_str(), true)
                .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
        })
        .collect::<Result<Vec<_>>>()?;

    let batch_size = encodings.len();
    let max_len = encodings
        .iter()
        .map(|e| e.get_ids().len())
        .max()
        .unwrap_or(0);

    if max_len == 0 {
        return Ok(vec![vec![0.0; EMBEDDING_DIM]; batch_size]);
    }

    // BERT inputs, padded to the longest topic in the batch:
    //   input_ids: token IDs (pad with 0)
    //   attention_mask: 1 for real tokens, 0 for padding
    //   token_type_ids: all zeros for single-sentence input
    let mut input_ids_flat: Vec<i64> = Vec::with_capacity(batch_size * max_len);
    let mut attention_mask_flat: Vec<i64> = Vec::with_capacity(batch_size * max_len);
    let mut token_type_ids_flat: Vec<i64> = Vec::with_capacity(batch_size * max_len);

    for enc in &encodings {
        let ids = enc.get_ids();
        let mask = enc.get_attention_mask();
        let pad_len = max_len - ids.len();

        input_ids_flat.extend(ids.iter().map(|&id| id as i64));
        input_ids_flat.extend(std::iter::repeat_n(0i64, pad_len));
        attention_mask_flat.extend(mask.iter().map(|&m| m as i64));
        attention_mask_flat.extend(std::iter::repeat_n(0i64, pad_len));
        token_type_ids_flat.extend(std::iter::repeat_n(0i64, max_len));
    }

    let shape = [batch_size as i64, max_len as i64];

    let input_ids_tensor =
        Tensor::from_array((shape, input_ids_flat)).context("Failed to create input_ids tensor")?;
    let attention_mask_tensor = Tensor::from_array((shape, attention_mask_flat.clone()))
        .context("Failed to create attention_mask tensor")?;
    let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids_flat))
        .context("Failed to create token_type_ids tensor")?;

    // Output is last_hidden_state: [batch, seq_len, 384]
    let hidden_states = {
        let mut session = session
            .lock()
            .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

        let outputs = session
            .run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor
            })
            .context("Embedding ONNX inference failed")?;

        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract embedding output tensor")?;

        data.to_vec()
    };

    let mut embeddings = Vec::with_capacity(batch_size);

    for i in 0..batch_size {
        let mut sum = vec![0.0_f64; EMBEDDING_DIM];
        let mut mask_sum = 0.0_f64;

        for j in 0..max_len {
            let mask_val = attention_mask_flat[i * max_len + j] as f64;
            if mask_val > 0.0 {
                mask_sum += mask_val;
                let offset = (i * max_len + j) * EMBEDDING_DIM;
                for (k, acc) in sum.iter_mut().enumerate() {
                    *acc += hidden_states[offset + k] as f64 * mask_val;
                }
            }
        }

        if mask_sum > 0.0 {
            for val in &mut sum {
                *val /= mask_sum;
            }
        }

        embeddings.push(sum);
    }

    debug!(
        batch_size = batch_size,
        dim = EMBEDDING_DIM,
        "Computed sentence embeddings"
    );

    Ok(embeddings)
}

/// Cosine similarity between two embedding vectors, clipped to [0, 1].
///
/// Opposite or orthogonal vectors score 0.0, as does a zero vector. Callers
/// check that both vectors have the same length.
pub fn cosine_similarity_embeddings(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    let denom = mag_a * mag_b;
    if denom < f64::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(0.0, 1.0)
    }
}

/// Precomputed pairwise cosine matrix over the unique topics of one run.
///
/// Asking for a topic that wasn't part of the batch is a data quality error:
/// the canonicalizer must get a complete answer set or an explicit failure.
#[derive(Debug, Clone)]
pub struct EmbeddingSimilarity {
    index: HashMap<String, usize>,
    matrix: Vec<Vec<f64>>,
}

impl EmbeddingSimilarity {
    /// Build the matrix from topics and their embeddings (same order).
    pub fn from_embeddings(topics: &[String], embeddings: &[Vec<f64>]) -> TrendResult<Self> {
        if topics.len() != embeddings.len() {
            return Err(TrendError::DataQuality(format!(
                "embedder returned {} vectors for {} topics",
                embeddings.len(),
                topics.len()
            )));
        }

        if let Some(first) = embeddings.first() {
            let dim = first.len();
            if dim == 0 {
                return Err(TrendError::DataQuality("embedding 0 is empty".to_string()));
            }
            if let Some((i, bad)) = embeddings
                .iter()
                .enumerate()
                .find(|(_, e)| e.len() != dim)
            {
                return Err(TrendError::DataQuality(format!(
                    "embedding {i} has dimension {}, expected {dim}",
                    bad.len()
                )));
            }
        }

        let mut index = HashMap::with_capacity(topics.len());
        for (i, topic) in topics.iter().enumerate() {
            index.entry(topic.clone()).or_insert(i);
        }

        let n = embeddings.len();
        let mut matrix = vec![vec![0.0_f64; n]; n];
        for i in 0..n {
            matrix[i][i] = 1.0;
            for j in (i + 1)..n {
                let sim = cosine_similarity_embeddings(&embeddings[i], &embeddings[j]);
                matrix[i][j] = sim;
                matrix[j][i] = sim;
            }
        }

        Ok(Self { index, matrix })
    }

    /// Embed `topics` in one batch and build the matrix.
    pub async fn compute(embedder: &dyn TopicEmbedder, topics: &[String]) -> Result<Self> {
        let embeddings = embedder
            .embed_batch(topics)
            .await
            .context("Failed to embed topics")?;
        info!(topics = topics.len(), "Embedded unique topics");
        Ok(Self::from_embeddings(topics, &embeddings)?)
    }

    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    fn position(&self, topic: &str) -> TrendResult<usize> {
        self.index.get(topic).copied().ok_or_else(|| {
            TrendError::DataQuality(format!("no embedding computed for topic {topic:?}"))
        })
    }
}

impl TopicSimilarity for EmbeddingSimilarity {
    fn similarity(&self, a: &str, b: &str) -> TrendResult<f64> {
        let i = self.position(a)?;
        let j = self.position(b)?;
        Ok(self.matrix[i][j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let a = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity_embeddings(&a, &a);
        assert!((sim - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity_embeddings(&a, &b).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_proportional() {
        // Same direction, different magnitudes
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![2.0, 4.0, 6.0];
        assert!((cosine_similarity_embeddings(&a, &b) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        assert!(cosine_similarity_embeddings(&a, &b).abs() < f64::EPSILON);
    }

    #[test]
    fn test_mixed_dimensions_are_data_quality_error() {
        let topics = vec!["login crash".to_string(), "app crashes on login".to_string()];
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]];
        let err = EmbeddingSimilarity::from_embeddings(&topics, &embeddings).unwrap_err();
        match err {
            TrendError::DataQuality(msg) => {
                assert_eq!(msg, "embedding 1 has dimension 3, expected 2")
            }
            other => panic!("expected DataQuality, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_vectors_are_data_quality_error() {
        let topics = vec!["a".to_string(), "b".to_string()];
        let err = EmbeddingSimilarity::from_embeddings(&topics, &[vec![], vec![]]).unwrap_err();
        assert!(matches!(err, TrendError::DataQuality(_)));
    }

    #[test]
    fn test_mixed_dimensions_never_reach_canonicalizer() {
        use crate::topics::canonical::canonicalize;

        let topics = vec!["login crash".to_string(), "app crashes on login".to_string()];
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]];
        let built = EmbeddingSimilarity::from_embeddings(&topics, &embeddings)
            .and_then(|sim| canonicalize(&topics, &sim, 0.85));
        assert!(matches!(built, Err(TrendError::DataQuality(_))));
    }

    #[test]
    fn test_cosine_negative_values_clamp_to_zero() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        let sim = cosine_similarity_embeddings(&a, &b);
        assert!(sim.abs() < f64::EPSILON, "got {sim}");
    }

    #[test]
    fn test_matrix_is_symmetric_with_unit_diagonal() {
        let topics = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 1.0]];
        let sim = EmbeddingSimilarity::from_embeddings(&topics, &embeddings).unwrap();
        assert_eq!(sim.len(), 3);
        assert_eq!(sim.similarity("a", "a").unwrap(), 1.0);
        let ab = sim.similarity("a", "b").unwrap();
        let ba = sim.similarity("b", "a").unwrap();
        assert!((ab - ba).abs() < 1e-12);
        assert!((ab - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
        assert!(sim.similarity("a", "c").unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_unknown_topic_is_data_quality_error() {
        let topics = vec!["a".to_string()];
        let sim = EmbeddingSimilarity::from_embeddings(&topics, &[vec![1.0]]).unwrap();
        assert!(matches!(
            sim.similarity("a", "zzz"),
            Err(TrendError::DataQuality(_))
        ));
    }

    #[test]
    fn test_length_mismatch_is_data_quality_error() {
        let topics = vec!["a".to_string(), "b".to_string()];
        let err = EmbeddingSimilarity::from_embeddings(&topics, &[vec![1.0]]).unwrap_err();
        assert!(matches!(err, TrendError::DataQuality(_)));
    }

    struct AxisEmbedder;

    #[async_trait]
    impl TopicEmbedder for AxisEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
            Ok(texts
                .iter()
                .map(|t| if t.contains("crash") { vec![1.0, 0.1] } else { vec![0.0, 1.0] })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_compute_embeds_in_one_batch() {
        let topics = vec![
            "login crash".to_string(),
            "app crash".to_string(),
            "nice ui".to_string(),
        ];
        let sim = EmbeddingSimilarity::compute(&AxisEmbedder, &topics).await.unwrap();
        assert!(sim.similarity("login crash", "app crash").unwrap() > 0.99);
        assert!(sim.similarity("login crash", "nice ui").unwrap() < 0.2);
    }
}
