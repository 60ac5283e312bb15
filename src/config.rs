use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::error::{validate_threshold, validate_window_days, TrendError};

/// Which similarity provider the dedup stage clusters with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimilarityBackend {
    /// Local all-MiniLM-L6-v2 sentence embeddings (default). Needs the model
    /// downloaded with `reviewtrend download-model`.
    Embedding,
    /// Stop-word filtered token cosine. No model required.
    Lexical,
}

impl SimilarityBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityBackend::Embedding => "embedding",
            SimilarityBackend::Lexical => "lexical",
        }
    }
}

impl FromStr for SimilarityBackend {
    type Err = TrendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedding" | "embeddings" | "onnx" => Ok(SimilarityBackend::Embedding),
            "lexical" => Ok(SimilarityBackend::Lexical),
            other => Err(TrendError::Configuration(format!(
                "unknown similarity backend {other:?} (expected \"embedding\" or \"lexical\")"
            ))),
        }
    }
}

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy. CLI flags override the
/// numeric settings after loading.
#[derive(Debug, Clone)]
pub struct Config {
    /// Play Store package to analyze (e.g. com.whatsapp)
    pub app_id: String,
    /// Trailing window in days for collection and the trend table
    pub trend_days: i64,
    /// Minimum similarity for a topic to join an existing canonical topic
    pub dedup_threshold: f64,
    /// How many newest reviews to request from the store
    pub max_reviews: usize,
    pub play_store_url: String,
    pub play_store_lang: String,
    pub play_store_country: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_api_url: String,
    /// Requests per second allowed against the chat completions API
    pub openai_rps: f64,
    pub db_path: String,
    /// Directory containing the ONNX model files
    pub model_dir: PathBuf,
    pub similarity_backend: SimilarityBackend,
    /// Where trend CSVs are written
    pub output_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the OpenAI key, which only the
    /// `extract` stage needs. Malformed numbers fail here rather than being
    /// silently replaced by defaults.
    pub fn load() -> Result<Self> {
        let similarity_backend = match env::var("REVIEWTREND_SIMILARITY") {
            Ok(raw) => raw.parse()?,
            Err(_) => SimilarityBackend::Embedding,
        };

        let model_dir = env::var("REVIEWTREND_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| crate::topics::download::default_model_dir());

        Ok(Self {
            app_id: env::var("GOOGLE_PLAY_APP_ID").unwrap_or_else(|_| "com.whatsapp".to_string()),
            trend_days: parse_env("TREND_DAYS", 30)?,
            dedup_threshold: parse_env("DEDUP_THRESHOLD", 0.85)?,
            max_reviews: parse_env("MAX_REVIEWS", 500)?,
            play_store_url: env::var("PLAY_STORE_URL").unwrap_or_else(|_| {
                crate::playstore::client::DEFAULT_PLAY_STORE_URL.to_string()
            }),
            play_store_lang: env::var("PLAY_STORE_LANG").unwrap_or_else(|_| "en".to_string()),
            play_store_country: env::var("PLAY_STORE_COUNTRY")
                .unwrap_or_else(|_| "us".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_model: env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| crate::extract::openai::DEFAULT_OPENAI_MODEL.to_string()),
            openai_api_url: env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| crate::extract::openai::DEFAULT_OPENAI_API_URL.to_string()),
            openai_rps: parse_env("OPENAI_RPS", 3.0)?,
            db_path: env::var("REVIEWTREND_DB_PATH")
                .unwrap_or_else(|_| "./reviewtrend.db".to_string()),
            model_dir,
            similarity_backend,
            output_dir: env::var("REVIEWTREND_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./output")),
        })
    }

    /// Check the core parameters before any stage runs.
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.dedup_threshold)?;
        validate_window_days(self.trend_days)?;
        if self.app_id.trim().is_empty() {
            return Err(TrendError::Configuration("GOOGLE_PLAY_APP_ID is empty".to_string()).into());
        }
        Ok(())
    }

    /// Check that the OpenAI API key is configured.
    /// Call this before any operation that extracts topics.
    pub fn require_openai(&self) -> Result<()> {
        if self.openai_api_key.is_empty() {
            anyhow::bail!(
                "OPENAI_API_KEY not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Validate that the chosen similarity backend has what it needs.
    /// For embeddings the model files must exist (or the user should run
    /// download-model).
    pub fn require_similarity(&self) -> Result<()> {
        match self.similarity_backend {
            SimilarityBackend::Embedding => {
                if !crate::topics::download::embedding_files_present(&self.model_dir) {
                    anyhow::bail!(
                        "Embedding model files not found in {}\n\
                         Run `reviewtrend download-model` to download them.\n\
                         Or set REVIEWTREND_SIMILARITY=lexical to cluster without a model.",
                        self.model_dir.display()
                    );
                }
                Ok(())
            }
            SimilarityBackend::Lexical => Ok(()),
        }
    }

    /// Path of the trend CSV for the configured app.
    pub fn trend_csv_path(&self) -> PathBuf {
        self.output_dir.join(format!("trend_{}.csv", self.app_id))
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            app_id: "com.example".to_string(),
            trend_days: 30,
            dedup_threshold: 0.85,
            max_reviews: 500,
            play_store_url: "https://play.google.com".to_string(),
            play_store_lang: "en".to_string(),
            play_store_country: "us".to_string(),
            openai_api_key: String::new(),
            openai_model: "gpt-3.5-turbo".to_string(),
            openai_api_url: "https://api.openai.com/v1".to_string(),
            openai_rps: 3.0,
            db_path: ":memory:".to_string(),
            model_dir: PathBuf::from("/nonexistent/models"),
            similarity_backend: SimilarityBackend::Lexical,
            output_dir: PathBuf::from("out"),
        }
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!(
            "embedding".parse::<SimilarityBackend>().unwrap(),
            SimilarityBackend::Embedding
        );
        assert_eq!(
            " Lexical ".parse::<SimilarityBackend>().unwrap(),
            SimilarityBackend::Lexical
        );
        assert!(matches!(
            "bm25".parse::<SimilarityBackend>(),
            Err(TrendError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut cfg = config();
        assert!(cfg.validate().is_ok());
        cfg.dedup_threshold = 0.0;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrendError>(),
            Some(TrendError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_short_window() {
        let mut cfg = config();
        cfg.trend_days = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_require_openai() {
        let mut cfg = config();
        assert!(cfg.require_openai().is_err());
        cfg.openai_api_key = "sk-test".to_string();
        assert!(cfg.require_openai().is_ok());
    }

    #[test]
    fn test_embedding_backend_needs_model() {
        let mut cfg = config();
        assert!(cfg.require_similarity().is_ok());
        cfg.similarity_backend = SimilarityBackend::Embedding;
        assert!(cfg.require_similarity().is_err());
    }

    #[test]
    fn test_trend_csv_path() {
        assert_eq!(
            config().trend_csv_path(),
            PathBuf::from("out/trend_com.example.csv")
        );
    }
}
