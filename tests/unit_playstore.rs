// Unit tests for Play Store response parsing and the trailing-window filter.
//
// Fixtures mimic the batchexecute envelope: an XSSI prefix, an outer array,
// and the real payload nested as a JSON string at [0][2].

use chrono::{TimeDelta, TimeZone, Utc};
use serde_json::{json, Value};

use reviewtrend::db::models::Review;
use reviewtrend::playstore::client::parse_reviews_response;
use reviewtrend::playstore::reviews::retain_since;

fn review_item(id: &str, user: &str, score: u64, text: &str, epoch: i64, thumbs: u64) -> Value {
    json!([
        id,
        [user, [null, 2, null, null, null, null, null, null, null, null, null, null]],
        score,
        null,
        text,
        [epoch, 250000000],
        thumbs,
        null,
        null,
        null,
        "2.24.8.4"
    ])
}

fn envelope(data: Value) -> String {
    let outer = json!([["wrb.fr", "UsvDTd", data.to_string(), null, null, null, "generic"]]);
    format!(")]}}'\n\n{outer}")
}

#[test]
fn parses_reviews_and_token() {
    let data = json!([
        [
            review_item("gp:1", "Ana", 1, "Crashes when I open a chat", 1_711_900_000, 12),
            review_item("gp:2", "Ben", 5, "Love the new design", 1_711_800_000, 0),
        ],
        [null, "CsYBCgwI"]
    ]);

    let page = parse_reviews_response(&envelope(data)).unwrap();

    assert_eq!(page.reviews.len(), 2);
    let first = &page.reviews[0];
    assert_eq!(first.review_id, "gp:1");
    assert_eq!(first.user_name, "Ana");
    assert_eq!(first.score, 1);
    assert_eq!(first.content, "Crashes when I open a chat");
    assert_eq!(first.at, Utc.timestamp_opt(1_711_900_000, 0).unwrap());
    assert_eq!(first.thumbs_up, 12);
    assert_eq!(first.app_version.as_deref(), Some("2.24.8.4"));
    assert_eq!(page.next_token.as_deref(), Some("CsYBCgwI"));
}

#[test]
fn last_page_has_no_token() {
    let data = json!([[review_item("gp:9", "Cy", 3, "ok", 1_711_000_000, 1)], []]);
    let page = parse_reviews_response(&envelope(data)).unwrap();
    assert_eq!(page.reviews.len(), 1);
    assert_eq!(page.next_token, None);
}

#[test]
fn entries_without_timestamp_are_skipped() {
    let mut broken = review_item("gp:bad", "Dee", 2, "no date", 0, 0);
    broken[5] = Value::Null;
    let data = json!([[broken, review_item("gp:ok", "Eve", 4, "fine", 1_711_000_000, 0)]]);

    let page = parse_reviews_response(&envelope(data)).unwrap();

    assert_eq!(page.reviews.len(), 1);
    assert_eq!(page.reviews[0].review_id, "gp:ok");
}

#[test]
fn envelope_without_payload_is_empty_page() {
    let body = ")]}'\n\n[[\"wrb.fr\",\"UsvDTd\",null,null,null,[5],\"generic\"]]";
    let page = parse_reviews_response(body).unwrap();
    assert!(page.reviews.is_empty());
    assert!(page.next_token.is_none());
}

#[test]
fn garbage_body_is_an_error() {
    assert!(parse_reviews_response("<html>rate limited</html>").is_err());
}

#[test]
fn retain_since_keeps_cutoff_inclusive() {
    let cutoff = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let make = |id: &str, at| Review {
        review_id: id.to_string(),
        user_name: String::new(),
        content: "x".to_string(),
        score: 3,
        at,
        thumbs_up: 0,
        app_version: None,
    };
    let reviews = vec![
        make("new", cutoff + TimeDelta::days(3)),
        make("edge", cutoff),
        make("old", cutoff - TimeDelta::seconds(1)),
    ];

    let kept: Vec<String> = retain_since(reviews, cutoff)
        .into_iter()
        .map(|r| r.review_id)
        .collect();

    assert_eq!(kept, vec!["new", "edge"]);
}
