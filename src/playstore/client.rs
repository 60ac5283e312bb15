// Google Play Store review client: the `UsvDTd` batchexecute RPC.
//
// The store has no public review API. The web frontend pages reviews through
// `/_/PlayStoreUi/data/batchexecute`, posting a form field `f.req` that holds
// a JSON envelope around a second, string-encoded JSON request. The response
// is prefixed with `)]}'` and nests the payload as a JSON string again.
//
// Request building and response parsing are pure functions so they can be
// tested without network access.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::debug;

use crate::db::models::Review;

/// Default Play Store origin.
pub const DEFAULT_PLAY_STORE_URL: &str = "https://play.google.com";

/// RPC id of the review listing call.
pub const REVIEWS_RPC_ID: &str = "UsvDTd";

/// The store returns at most this many reviews per page.
pub const MAX_PAGE_SIZE: usize = 100;

/// Sort order code for "newest first".
const SORT_NEWEST: u8 = 2;

/// Prefix the RPC endpoint puts in front of every response body.
const XSSI_PREFIX: &str = ")]}'";

/// One page of reviews plus the token for the next page (if any).
#[derive(Debug, Clone, Default)]
pub struct ReviewPage {
    pub reviews: Vec<Review>,
    pub next_token: Option<String>,
}

/// Unauthenticated HTTP client for the Play Store review RPC.
pub struct PlayStoreClient {
    client: reqwest::Client,
    base_url: String,
    lang: String,
    country: String,
}

impl PlayStoreClient {
    /// Create a client for the given store origin, language and country.
    pub fn new(base_url: &str, lang: &str, country: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("reviewtrend/0.1 (review-trends)")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            lang: lang.to_string(),
            country: country.to_string(),
        })
    }

    /// Fetch one page of newest-first reviews.
    ///
    /// `token` is the continuation token from the previous page, or None for
    /// the first page.
    pub async fn fetch_page(
        &self,
        app_id: &str,
        count: usize,
        token: Option<&str>,
    ) -> Result<ReviewPage> {
        let url = format!("{}/_/PlayStoreUi/data/batchexecute", self.base_url);
        let payload = build_request_payload(app_id, count.min(MAX_PAGE_SIZE), token);

        debug!(app_id = app_id, count = count, "Play Store review page request");

        let response = self
            .client
            .post(&url)
            .query(&[("hl", self.lang.as_str()), ("gl", self.country.as_str())])
            .form(&[("f.req", payload.as_str())])
            .send()
            .await
            .with_context(|| format!("Review request failed for {app_id}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Play Store returned {status} for {app_id}: {body}");
        }

        let body = response
            .text()
            .await
            .context("Failed to read Play Store response")?;

        parse_reviews_response(&body)
            .with_context(|| format!("Failed to parse review page for {app_id}"))
    }
}

/// Build the `f.req` form value for a review page request.
pub fn build_request_payload(app_id: &str, count: usize, token: Option<&str>) -> String {
    let inner = json!([
        null,
        null,
        [2, SORT_NEWEST, [count, null, token], null, []],
        [app_id, 7]
    ]);
    json!([[[REVIEWS_RPC_ID, inner.to_string(), null, "generic"]]]).to_string()
}

/// Parse a batchexecute response body into a page of reviews.
///
/// An envelope with no payload (unknown app, no reviews) is an empty page.
/// Review entries without an id or timestamp are skipped.
pub fn parse_reviews_response(body: &str) -> Result<ReviewPage> {
    let json_text = body
        .trim_start()
        .strip_prefix(XSSI_PREFIX)
        .unwrap_or(body)
        .trim_start();

    let envelope: Value =
        serde_json::from_str(json_text).context("Response envelope is not JSON")?;

    let payload = match envelope.pointer("/0/2").and_then(Value::as_str) {
        Some(p) => p,
        None => return Ok(ReviewPage::default()),
    };

    let data: Value = serde_json::from_str(payload).context("Review payload is not JSON")?;

    let reviews: Vec<Review> = data
        .get(0)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_review).collect())
        .unwrap_or_default();

    Ok(ReviewPage {
        reviews,
        next_token: continuation_token(&data),
    })
}

/// The continuation token sits in the last slot of the second-to-last element.
fn continuation_token(data: &Value) -> Option<String> {
    let items = data.as_array()?;
    let from_end = |n: usize| {
        items
            .len()
            .checked_sub(n)
            .and_then(|i| items[i].as_array())
            .and_then(|a| a.last())
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    from_end(2).or_else(|| from_end(1))
}

fn parse_review(item: &Value) -> Option<Review> {
    let review_id = item.get(0)?.as_str()?.to_string();
    let seconds = item.pointer("/5/0")?.as_i64()?;
    let at = DateTime::<Utc>::from_timestamp(seconds, 0)?;

    let str_at = |path: &str| {
        item.pointer(path)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Some(Review {
        review_id,
        user_name: str_at("/1/0").unwrap_or_default(),
        content: str_at("/4").unwrap_or_default(),
        score: item
            .get(2)
            .and_then(Value::as_u64)
            .map(|s| s.min(5) as u8)
            .unwrap_or(0),
        at,
        thumbs_up: item
            .get(6)
            .and_then(Value::as_u64)
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        app_version: str_at("/10"),
    })
}
