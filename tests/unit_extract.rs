// Unit tests for parsing extraction replies into topic records.
//
// The model doesn't always answer with clean JSON; these pin down what each
// kind of bad answer turns into.

use chrono::{TimeZone, Utc};

use reviewtrend::db::models::{Category, Review, Sentiment};
use reviewtrend::extract::openai::build_prompt;
use reviewtrend::extract::parse::{fallback_topic, parse_extraction, FALLBACK_TOPIC_CHARS};

fn review(content: &str) -> Review {
    Review {
        review_id: "gp:AOqpTOF".to_string(),
        user_name: "Sam".to_string(),
        content: content.to_string(),
        score: 2,
        at: Utc.with_ymd_and_hms(2024, 4, 2, 7, 45, 0).unwrap(),
        thumbs_up: 3,
        app_version: Some("2.24.7.79".to_string()),
    }
}

#[test]
fn clean_json_reply() {
    let r = review("Calls keep dropping after the update");
    let record = parse_extraction(
        r#"{"category": "issue", "topic": "call drops", "sentiment": "negative"}"#,
        &r,
    );

    assert_eq!(record.review_id, r.review_id);
    assert_eq!(record.timestamp, r.at);
    assert_eq!(record.category, Category::Issue);
    assert_eq!(record.topic, "call drops");
    assert_eq!(record.sentiment, Sentiment::Negative);
}

#[test]
fn fenced_json_reply() {
    let record = parse_extraction(
        "```json\n{\"category\": \"feature request\", \"topic\": \"dark mode\", \"sentiment\": \"neutral\"}\n```",
        &review("Please add dark mode"),
    );
    assert_eq!(record.category, Category::FeatureRequest);
    assert_eq!(record.topic, "dark mode");
}

#[test]
fn prose_reply_falls_back_to_feedback_neutral() {
    let text = "I love this app but the new sticker picker is really confusing to use every day";
    let record = parse_extraction("Sure! The topic is stickers.", &review(text));

    assert_eq!(record.category, Category::Feedback);
    assert_eq!(record.sentiment, Sentiment::Neutral);
    assert_eq!(record.topic.chars().count(), FALLBACK_TOPIC_CHARS);
    assert!(text.starts_with(&record.topic));
}

#[test]
fn json_array_reply_is_not_an_object() {
    let record = parse_extraction(r#"["issue", "crash"]"#, &review("crash"));
    assert_eq!(record.category, Category::Feedback);
    assert_eq!(record.topic, "crash");
}

#[test]
fn unknown_labels_fall_back_per_field() {
    let record = parse_extraction(
        r#"{"category": "complaint", "topic": "ads", "sentiment": "furious"}"#,
        &review("Too many ads"),
    );
    assert_eq!(record.category, Category::Other);
    assert_eq!(record.topic, "ads");
    assert_eq!(record.sentiment, Sentiment::Neutral);
}

#[test]
fn blank_topic_uses_review_text() {
    let record = parse_extraction(
        r#"{"category": "issue", "topic": "   ", "sentiment": "negative"}"#,
        &review("  Backup stuck at 0%  "),
    );
    assert_eq!(record.topic, "Backup stuck at 0%");
    assert_eq!(record.category, Category::Issue);
}

#[test]
fn fallback_topic_counts_chars_not_bytes() {
    let text = "é".repeat(80);
    assert_eq!(fallback_topic(&text).chars().count(), FALLBACK_TOPIC_CHARS);
}

#[test]
fn prompt_embeds_review_and_labels() {
    let prompt = build_prompt("Status updates won't load");
    assert!(prompt.contains("Review: Status updates won't load"));
    assert!(prompt.contains("feature_request"));
    assert!(prompt.contains("sentiment"));
}
