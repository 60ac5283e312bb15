// Parsing of the language model's extraction answer.
//
// The model is asked for a JSON object, but it doesn't always comply. A reply
// that isn't a JSON object falls back to {feedback, first 50 characters of
// the review, neutral} with a warning. Within a valid object, unknown labels
// fall back per field.

use serde_json::Value;
use tracing::warn;

use crate::db::models::{Category, Review, Sentiment, TopicRecord};

/// How much of the review text stands in for a topic the model didn't give.
pub const FALLBACK_TOPIC_CHARS: usize = 50;

/// Build a TopicRecord from the raw model reply for `review`.
pub fn parse_extraction(reply: &str, review: &Review) -> TopicRecord {
    let parsed = serde_json::from_str::<Value>(strip_code_fence(reply))
        .ok()
        .filter(Value::is_object);

    let Some(obj) = parsed else {
        warn!(
            review_id = %review.review_id,
            "Extraction reply is not a JSON object, using fallback topic"
        );
        return TopicRecord {
            review_id: review.review_id.clone(),
            timestamp: review.at,
            category: Category::Feedback,
            topic: fallback_topic(&review.content),
            sentiment: Sentiment::Neutral,
        };
    };

    let field = |name: &str| obj.get(name).and_then(Value::as_str).map(str::trim);

    let topic = match field("topic") {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => fallback_topic(&review.content),
    };

    TopicRecord {
        review_id: review.review_id.clone(),
        timestamp: review.at,
        category: field("category")
            .and_then(Category::parse)
            .unwrap_or(Category::Other),
        topic,
        sentiment: field("sentiment")
            .and_then(Sentiment::parse)
            .unwrap_or(Sentiment::Neutral),
    }
}

/// First characters of the review text, by char not byte.
pub fn fallback_topic(content: &str) -> String {
    content.trim().chars().take(FALLBACK_TOPIC_CHARS).collect()
}

/// Models like to wrap JSON in ```json fences. Strip them if present.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
