// Lexical topic similarity: the fallback when the embedding model is absent.
//
// Topics are lowercased, split into alphanumeric tokens, stripped of English
// stop words and a trailing plural "s", then compared as token-count vectors
// with cosine similarity. "crashes on login" and "login crash" both reduce to
// {crash, login} and score 1.0. Synonyms ("bug" vs "glitch") are invisible
// here, which is what the sentence embedder is for.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex_lite::Regex;
use stop_words::{get, LANGUAGE};

use super::traits::TopicSimilarity;
use crate::error::TrendResult;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+").expect("valid token regex"));

/// Token-overlap cosine similarity with stop-word removal.
pub struct LexicalSimilarity {
    stop_words: HashSet<String>,
}

impl Default for LexicalSimilarity {
    fn default() -> Self {
        Self::new()
    }
}

impl LexicalSimilarity {
    pub fn new() -> Self {
        let stop_words: HashSet<String> = get(LANGUAGE::English).into_iter().collect();
        Self { stop_words }
    }

    /// Normalized token counts for a topic string.
    ///
    /// Falls back to the whole lowercased string when no ASCII token
    /// survives (non-Latin scripts, emoji-only topics), so identical
    /// strings still compare as identical.
    pub fn tokens(&self, text: &str) -> HashMap<String, u32> {
        let lower = text.to_lowercase();
        let mut counts: HashMap<String, u32> = HashMap::new();

        for m in TOKEN_RE.find_iter(&lower) {
            let word = m.as_str();
            if self.stop_words.contains(word) {
                continue;
            }
            *counts.entry(stem(word).to_string()).or_insert(0) += 1;
        }

        if counts.is_empty() {
            let trimmed = lower.trim();
            if !trimmed.is_empty() {
                counts.insert(trimmed.to_string(), 1);
            }
        }

        counts
    }
}

/// Crude plural folding: "crashes" -> "crash", "bugs" -> "bug". Short words are left alone.
fn stem(word: &str) -> &str {
    if word.len() > 4 && word.ends_with("es") && !word.ends_with("ses") {
        &word[..word.len() - 2]
    } else if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        &word[..word.len() - 1]
    } else {
        word
    }
}

fn cosine_from_counts(a: &HashMap<String, u32>, b: &HashMap<String, u32>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .filter_map(|(k, &va)| b.get(k).map(|&vb| va as f64 * vb as f64))
        .sum();
    let mag_a: f64 = a.values().map(|&v| (v as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.values().map(|&v| (v as f64).powi(2)).sum::<f64>().sqrt();

    (dot / (mag_a * mag_b)).clamp(0.0, 1.0)
}

impl TopicSimilarity for LexicalSimilarity {
    fn similarity(&self, a: &str, b: &str) -> TrendResult<f64> {
        Ok(cosine_from_counts(&self.tokens(a), &self.tokens(b)))
    }
}
