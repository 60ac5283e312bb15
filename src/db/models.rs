// Data models: the records that flow between pipeline stages.
//
// These are plain value types. They're kept apart from the SQL in queries.rs
// so the engine (topics, trend) can use them without touching rusqlite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw review pulled from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: String,
    pub user_name: String,
    pub content: String,
    /// Star rating, 1 to 5
    pub score: u8,
    pub at: DateTime<Utc>,
    pub thumbs_up: u32,
    pub app_version: Option<String>,
}

/// What kind of feedback a review carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Issue,
    FeatureRequest,
    Feedback,
    Other,
}

impl Category {
    /// Parse a label from the extractor or the database. Case and surrounding
    /// whitespace are ignored; "feature request" and "feature-request" are
    /// accepted alongside "feature_request".
    pub fn parse(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "issue" => Some(Category::Issue),
            "feature_request" => Some(Category::FeatureRequest),
            "feedback" => Some(Category::Feedback),
            "other" => Some(Category::Other),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Issue => "issue",
            Category::FeatureRequest => "feature_request",
            Category::Feedback => "feedback",
            Category::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One structured observation extracted from a single review.
///
/// `topic` is the raw label as the extractor produced it. Many records will
/// carry near-duplicate topics; canonicalization collapses them later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub review_id: String,
    pub timestamp: DateTime<Utc>,
    pub category: Category,
    pub topic: String,
    pub sentiment: Sentiment,
}

/// A TopicRecord annotated with the representative of its topic cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTopicRecord {
    #[serde(flatten)]
    pub record: TopicRecord,
    pub canonical_topic: String,
}

impl CanonicalTopicRecord {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.record.timestamp
    }
}
