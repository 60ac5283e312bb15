// Greedy topic canonicalization.
//
// Collapses near-duplicate topic strings ("login crash", "app crashes on
// login") onto one representative. Single pass over the unique topics in
// caller order: each topic is compared against the representatives found so
// far, in creation order, and joins the first one scoring at or above the
// threshold. Topics that match nothing become representatives themselves.
//
// This is O(k^2) in unique topics, not in records. It is not an optimal
// clustering: a topic can land on an earlier representative even when a later
// one is closer. First match wins.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::traits::TopicSimilarity;
use crate::db::models::{CanonicalTopicRecord, TopicRecord};
use crate::error::{validate_threshold, TrendError, TrendResult};

/// Mapping from every observed raw topic to its canonical representative.
///
/// Built once per run and never mutated afterwards. Representatives are
/// fixed points: `get(r) == Some(r)` for every representative `r`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalMap {
    mapping: HashMap<String, String>,
    /// Topics in the order they were visited
    order: Vec<String>,
    /// Representatives in creation order
    representatives: Vec<String>,
}

impl CanonicalMap {
    /// Rebuild a map from stored (topic, canonical_topic) pairs in visit order.
    ///
    /// Fails if a canonical value is not itself mapped to itself, or a topic
    /// appears twice with different representatives.
    pub fn from_pairs<I, T, C>(pairs: I) -> TrendResult<Self>
    where
        I: IntoIterator<Item = (T, C)>,
        T: Into<String>,
        C: Into<String>,
    {
        let mut map = CanonicalMap::default();
        for (topic, canonical) in pairs {
            let topic = topic.into();
            let canonical = canonical.into();
            if let Some(existing) = map.mapping.get(&topic) {
                if *existing != canonical {
                    return Err(TrendError::DataQuality(format!(
                        "topic {topic:?} mapped to both {existing:?} and {canonical:?}"
                    )));
                }
                continue;
            }
            map.insert(topic, canonical);
        }

        for canonical in map.mapping.values() {
            if map.mapping.get(canonical) != Some(canonical) {
                return Err(TrendError::DataQuality(format!(
                    "canonical topic {canonical:?} is not a representative of itself"
                )));
            }
        }

        map.representatives = map
            .order
            .iter()
            .filter(|t| map.mapping.get(*t) == Some(*t))
            .cloned()
            .collect();

        Ok(map)
    }

    fn insert(&mut self, topic: String, canonical: String) {
        self.order.push(topic.clone());
        self.mapping.insert(topic, canonical);
    }

    /// Canonical representative for a raw topic.
    pub fn get(&self, topic: &str) -> Option<&str> {
        self.mapping.get(topic).map(String::as_str)
    }

    /// Number of raw topics mapped.
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Number of distinct canonical topics.
    pub fn canonical_count(&self) -> usize {
        self.representatives.len()
    }

    /// Representatives in the order they were created.
    pub fn representatives(&self) -> &[String] {
        &self.representatives
    }

    /// (topic, canonical) pairs in visit order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .map(|t| (t.as_str(), self.mapping[t].as_str()))
    }

    /// Raw topics that collapsed onto `representative`, excluding itself.
    pub fn variants_of(&self, representative: &str) -> Vec<&str> {
        self.iter()
            .filter(|(t, c)| *c == representative && *t != representative)
            .map(|(t, _)| t)
            .collect()
    }

    /// Attach the canonical topic to each record.
    ///
    /// A record whose topic is missing from the map means the map was built
    /// from a different batch, so this fails instead of guessing.
    pub fn annotate(&self, records: &[TopicRecord]) -> TrendResult<Vec<CanonicalTopicRecord>> {
        records
            .iter()
            .map(|record| {
                let canonical = self.get(&record.topic).ok_or_else(|| {
                    TrendError::DataQuality(format!(
                        "topic {:?} of review {} has no canonical mapping",
                        record.topic, record.review_id
                    ))
                })?;
                Ok(CanonicalTopicRecord {
                    record: record.clone(),
                    canonical_topic: canonical.to_string(),
                })
            })
            .collect()
    }
}

/// Unique raw topics in order of first appearance.
pub fn unique_topics(records: &[TopicRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.topic.as_str()))
        .map(|r| r.topic.clone())
        .collect()
}

/// Greedy first-match-wins clustering of `topics`.
///
/// `topics` is visited in the given order; repeated entries are skipped.
/// Returns an empty map for empty input. The threshold must be in (0, 1];
/// a score at exactly the threshold is a match.
pub fn canonicalize<S>(
    topics: &[String],
    similarity: &S,
    threshold: f64,
) -> TrendResult<CanonicalMap>
where
    S: TopicSimilarity + ?Sized,
{
    validate_threshold(threshold)?;

    let mut map = CanonicalMap::default();

    for topic in topics {
        if map.mapping.contains_key(topic) {
            continue;
        }

        let mut matched: Option<String> = None;
        for representative in &map.representatives {
            let score = similarity.similarity(topic, representative)?;
            check_score(score, topic, representative)?;
            if score >= threshold {
                matched = Some(representative.clone());
                break;
            }
        }

        match matched {
            Some(representative) => {
                debug!(topic = %topic, canonical = %representative, "Merged topic");
                map.insert(topic.clone(), representative);
            }
            None => {
                map.representatives.push(topic.clone());
                map.insert(topic.clone(), topic.clone());
            }
        }
    }

    debug!(
        topics = map.len(),
        canonical = map.canonical_count(),
        threshold = threshold,
        "Canonicalized topics"
    );

    Ok(map)
}

fn check_score(score: f64, a: &str, b: &str) -> TrendResult<()> {
    if (0.0..=1.0).contains(&score) {
        Ok(())
    } else {
        Err(TrendError::DataQuality(format!(
            "similarity({a:?}, {b:?}) = {score} is outside [0, 1]"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn exact(a: &str, b: &str) -> f64 {
        if a == b {
            1.0
        } else {
            0.0
        }
    }

    #[test]
    fn test_empty_input_gives_empty_map() {
        let map = canonicalize(&[], &exact, 0.85).unwrap();
        assert!(map.is_empty());
        assert_eq!(map.canonical_count(), 0);
    }

    #[test]
    fn test_all_distinct_are_their_own_representatives() {
        let map = canonicalize(&topics(&["a", "b", "c"]), &exact, 0.5).unwrap();
        assert_eq!(map.canonical_count(), 3);
        assert_eq!(map.get("b"), Some("b"));
    }

    #[test]
    fn test_repeated_topics_are_visited_once() {
        let calls = std::cell::Cell::new(0);
        let counting = |a: &str, b: &str| {
            calls.set(calls.get() + 1);
            exact(a, b)
        };
        let map = canonicalize(&topics(&["a", "a", "b", "a"]), &counting, 0.5).unwrap();
        assert_eq!(map.len(), 2);
        // Only "b" is compared, against "a"
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_first_representative_wins_ties() {
        // "c" is equally similar to "a" and "b", which stay separate
        let sim = |x: &str, y: &str| match (x, y) {
            ("c", _) => 0.9,
            _ => 0.1,
        };
        let map = canonicalize(&topics(&["a", "b", "c"]), &sim, 0.8).unwrap();
        assert_eq!(map.get("c"), Some("a"));
    }

    #[test]
    fn test_first_match_not_best_match() {
        let sim = |x: &str, y: &str| match (x, y) {
            ("c", "a") => 0.81,
            ("c", "b") => 0.99,
            _ => 0.0,
        };
        let map = canonicalize(&topics(&["a", "b", "c"]), &sim, 0.8).unwrap();
        assert_eq!(map.get("c"), Some("a"));
    }

    #[test]
    fn test_threshold_equal_is_accepted() {
        let sim = |_: &str, _: &str| 0.85;
        let map = canonicalize(&topics(&["a", "b"]), &sim, 0.85).unwrap();
        assert_eq!(map.get("b"), Some("a"));
    }

    #[test]
    fn test_invalid_threshold_rejected_before_scoring() {
        let panicking = |_: &str, _: &str| -> f64 { panic!("should not be called") };
        for t in [0.0, -1.0, 1.5, f64::NAN] {
            let err = canonicalize(&topics(&["a", "b"]), &panicking, t).unwrap_err();
            assert!(matches!(err, TrendError::Configuration(_)));
        }
    }

    #[test]
    fn test_nan_similarity_is_data_quality_error() {
        let sim = |_: &str, _: &str| f64::NAN;
        let err = canonicalize(&topics(&["a", "b"]), &sim, 0.5).unwrap_err();
        assert!(matches!(err, TrendError::DataQuality(_)));
    }

    #[test]
    fn test_out_of_range_similarity_is_data_quality_error() {
        let sim = |_: &str, _: &str| 1.2;
        let err = canonicalize(&topics(&["a", "b"]), &sim, 0.5).unwrap_err();
        assert!(matches!(err, TrendError::DataQuality(_)));
    }

    #[test]
    fn test_from_pairs_rebuilds_representatives() {
        let map = CanonicalMap::from_pairs(vec![("a", "a"), ("b", "a"), ("c", "c")]).unwrap();
        assert_eq!(map.representatives(), &["a".to_string(), "c".to_string()]);
        assert_eq!(map.variants_of("a"), vec!["b"]);
    }

    #[test]
    fn test_from_pairs_rejects_dangling_canonical() {
        let err = CanonicalMap::from_pairs(vec![("b", "a")]).unwrap_err();
        assert!(matches!(err, TrendError::DataQuality(_)));
    }

    #[test]
    fn test_from_pairs_rejects_conflicting_topic() {
        let pairs = vec![("a", "a"), ("c", "c"), ("b", "a"), ("b", "c")];
        let err = CanonicalMap::from_pairs(pairs).unwrap_err();
        assert!(matches!(err, TrendError::DataQuality(_)));
    }
}
