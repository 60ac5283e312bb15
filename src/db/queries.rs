// Database queries: CRUD operations for all tables.
//
// Every database interaction goes through this module. Timestamps are stored
// as RFC 3339 strings with microsecond precision; reading one back that
// doesn't parse is a data quality error, never a silent default.

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{Category, Review, Sentiment, TopicRecord};
use crate::error::{TrendError, TrendResult};
use crate::topics::canonical::CanonicalMap;

/// Serialize a timestamp for storage.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
pub fn parse_timestamp(raw: &str) -> TrendResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TrendError::DataQuality(format!("unparsable timestamp {raw:?}: {e}")))
}

// --- Run state ---

/// Get a run state value by key (e.g., "last_collect_at:com.whatsapp").
pub fn get_run_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM run_state WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get(0)).optional()?;
    Ok(result)
}

/// Set a run state value (upsert).
pub fn set_run_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO run_state (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

// --- Reviews ---

/// Insert or refresh reviews for an app. Returns how many rows were written.
pub fn upsert_reviews(conn: &Connection, app_id: &str, reviews: &[Review]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO reviews (review_id, app_id, user_name, content, score, reviewed_at, thumbs_up, app_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(review_id) DO UPDATE SET
                user_name = ?3,
                content = ?4,
                score = ?5,
                reviewed_at = ?6,
                thumbs_up = ?7,
                app_version = ?8",
        )?;
        for review in reviews {
            stmt.execute(params![
                review.review_id,
                app_id,
                review.user_name,
                review.content,
                review.score,
                format_timestamp(&review.at),
                review.thumbs_up,
                review.app_version,
            ])?;
        }
    }
    tx.commit()?;
    Ok(reviews.len())
}

type ReviewRow = (String, String, String, u8, String, u32, Option<String>);

fn review_from_row(row: ReviewRow) -> TrendResult<Review> {
    let (review_id, user_name, content, score, reviewed_at, thumbs_up, app_version) = row;
    Ok(Review {
        review_id,
        user_name,
        content,
        score,
        at: parse_timestamp(&reviewed_at)?,
        thumbs_up,
        app_version,
    })
}

fn query_reviews(conn: &Connection, sql: &str, app_id: &str) -> Result<Vec<Review>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![app_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<ReviewRow>>>()?;

    Ok(rows
        .into_iter()
        .map(review_from_row)
        .collect::<TrendResult<Vec<_>>>()?)
}

/// All stored reviews for an app, newest first.
pub fn get_reviews(conn: &Connection, app_id: &str) -> Result<Vec<Review>> {
    query_reviews(
        conn,
        "SELECT review_id, user_name, content, score, reviewed_at, thumbs_up, app_version
         FROM reviews
         WHERE app_id = ?1
         ORDER BY reviewed_at DESC, review_id",
        app_id,
    )
}

/// Reviews that have no topic record yet, newest first.
///
/// Blank reviews never get a record, so they are left out here.
pub fn get_unextracted_reviews(conn: &Connection, app_id: &str) -> Result<Vec<Review>> {
    query_reviews(
        conn,
        "SELECT r.review_id, r.user_name, r.content, r.score, r.reviewed_at, r.thumbs_up, r.app_version
         FROM reviews r
         LEFT JOIN topic_records t ON t.review_id = r.review_id
         WHERE r.app_id = ?1
           AND t.review_id IS NULL
           AND trim(r.content, ' ' || char(9, 10, 13)) <> ''
         ORDER BY r.reviewed_at DESC, r.review_id",
        app_id,
    )
}

pub fn count_reviews(conn: &Connection, app_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE app_id = ?1",
        params![app_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// --- Topic records ---

/// Save (or overwrite) the topic record of one review.
pub fn upsert_topic_record(conn: &Connection, app_id: &str, record: &TopicRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO topic_records (review_id, app_id, reviewed_at, category, topic, sentiment, extracted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
         ON CONFLICT(review_id) DO UPDATE SET
            reviewed_at = ?3,
            category = ?4,
            topic = ?5,
            sentiment = ?6,
            extracted_at = datetime('now')",
        params![
            record.review_id,
            app_id,
            format_timestamp(&record.timestamp),
            record.category.as_str(),
            record.topic,
            record.sentiment.as_str(),
        ],
    )?;
    Ok(())
}

type TopicRow = (String, String, String, String, String);

fn topic_record_from_row(row: TopicRow) -> TrendResult<TopicRecord> {
    let (review_id, reviewed_at, category, topic, sentiment) = row;
    let category = Category::parse(&category).ok_or_else(|| {
        TrendError::DataQuality(format!("unknown category {category:?} for review {review_id}"))
    })?;
    let sentiment = Sentiment::parse(&sentiment).ok_or_else(|| {
        TrendError::DataQuality(format!(
            "unknown sentiment {sentiment:?} for review {review_id}"
        ))
    })?;
    if topic.trim().is_empty() {
        return Err(TrendError::DataQuality(format!(
            "empty topic for review {review_id}"
        )));
    }
    Ok(TopicRecord {
        timestamp: parse_timestamp(&reviewed_at)?,
        review_id,
        category,
        topic,
        sentiment,
    })
}

/// All topic records for an app, newest first (the order topics are first
/// encountered during clustering).
pub fn get_topic_records(conn: &Connection, app_id: &str) -> Result<Vec<TopicRecord>> {
    let mut stmt = conn.prepare(
        "SELECT review_id, reviewed_at, category, topic, sentiment
         FROM topic_records
         WHERE app_id = ?1
         ORDER BY reviewed_at DESC, review_id",
    )?;
    let rows = stmt
        .query_map(params![app_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<TopicRow>>>()?;

    Ok(rows
        .into_iter()
        .map(topic_record_from_row)
        .collect::<TrendResult<Vec<_>>>()?)
}

pub fn count_topic_records(conn: &Connection, app_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM topic_records WHERE app_id = ?1",
        params![app_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// --- Canonical topics ---

/// Replace the stored canonical map of an app.
pub fn save_canonical_map(
    conn: &Connection,
    app_id: &str,
    map: &CanonicalMap,
    threshold: f64,
    backend: &str,
) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM canonical_topics WHERE app_id = ?1",
        params![app_id],
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO canonical_topics (app_id, position, topic, canonical_topic, threshold, backend)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (position, (topic, canonical)) in map.iter().enumerate() {
            stmt.execute(params![
                app_id,
                position as i64,
                topic,
                canonical,
                threshold,
                backend
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Load the stored canonical map of an app (empty if dedup never ran).
pub fn get_canonical_map(conn: &Connection, app_id: &str) -> Result<CanonicalMap> {
    let mut stmt = conn.prepare(
        "SELECT topic, canonical_topic FROM canonical_topics
         WHERE app_id = ?1
         ORDER BY position",
    )?;
    let pairs = stmt
        .query_map(params![app_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(CanonicalMap::from_pairs(pairs)?)
}

/// Threshold and backend the stored map was built with, if any.
pub fn get_canonical_settings(conn: &Connection, app_id: &str) -> Result<Option<(f64, String)>> {
    let mut stmt = conn.prepare(
        "SELECT threshold, backend FROM canonical_topics WHERE app_id = ?1 LIMIT 1",
    )?;
    let result = stmt
        .query_row(params![app_id], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?;
    Ok(result)
}
