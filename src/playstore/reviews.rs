// Review collection: paginated newest-first fetch with a trailing window.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::client::{PlayStoreClient, MAX_PAGE_SIZE};
use crate::db::models::Review;
use crate::trend::window_cutoff;

/// Fetch up to `max_reviews` newest reviews for `app_id`, then keep only
/// those written within `window_days` of `now`.
///
/// Pages through continuation tokens until enough reviews are collected or
/// the store runs out of pages.
pub async fn fetch_recent_reviews(
    client: &PlayStoreClient,
    app_id: &str,
    max_reviews: usize,
    window_days: i64,
    now: DateTime<Utc>,
) -> Result<Vec<Review>> {
    let cutoff = window_cutoff(now, window_days)?;
    let mut reviews: Vec<Review> = Vec::new();
    let mut token: Option<String> = None;

    while reviews.len() < max_reviews {
        let wanted = (max_reviews - reviews.len()).min(MAX_PAGE_SIZE);
        let page = client.fetch_page(app_id, wanted, token.as_deref()).await?;

        debug!(
            page_reviews = page.reviews.len(),
            total_collected = reviews.len() + page.reviews.len(),
            "Fetched page of reviews for {}",
            app_id
        );

        let page_empty = page.reviews.is_empty();
        reviews.extend(page.reviews);

        token = page.next_token;
        if token.is_none() || page_empty {
            break;
        }
    }

    reviews.truncate(max_reviews);
    let fetched = reviews.len();
    let recent = retain_since(reviews, cutoff);

    info!(
        fetched = fetched,
        kept = recent.len(),
        app_id = app_id,
        window_days = window_days,
        "Collected reviews"
    );

    Ok(recent)
}

/// Keep reviews written at or after `cutoff`, preserving order.
pub fn retain_since(mut reviews: Vec<Review>, cutoff: DateTime<Utc>) -> Vec<Review> {
    reviews.retain(|r| r.at >= cutoff);
    reviews
}
