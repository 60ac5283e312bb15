// Trend aggregation: per-day topic counts over a trailing window.
//
// Records older than `now - window_days` are dropped, the rest are bucketed
// by (canonical topic, UTC calendar day) and counted, then laid out as a
// dense matrix. Every topic/day pair that was never observed is an explicit
// zero, so a downstream reader never has to guess what a missing cell means.

pub mod export;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use tracing::debug;

use crate::db::models::CanonicalTopicRecord;
use crate::error::{validate_window_days, TrendError, TrendResult};

/// Dense topic x day count table.
///
/// Rows are the distinct canonical topics observed after filtering (sorted
/// ascending), columns the distinct calendar days (ascending). Cells are
/// record counts; unobserved combinations are 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrendMatrix {
    topics: Vec<String>,
    days: Vec<NaiveDate>,
    /// counts[row][col], one row per topic, one column per day
    counts: Vec<Vec<u32>>,
}

impl TrendMatrix {
    /// Lay sparse (topic, day) counts out densely, filling gaps with zero.
    pub fn from_sparse(sparse: &BTreeMap<(String, NaiveDate), u32>) -> Self {
        let topics: Vec<String> = sparse
            .keys()
            .map(|(t, _)| t.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let days: Vec<NaiveDate> = sparse
            .keys()
            .map(|(_, d)| *d)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let counts = topics
            .iter()
            .map(|topic| {
                days.iter()
                    .map(|day| sparse.get(&(topic.clone(), *day)).copied().unwrap_or(0))
                    .collect()
            })
            .collect();

        Self {
            topics,
            days,
            counts,
        }
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    /// True when nothing survived the window: zero rows and zero columns.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Cell value, or None if the topic or day isn't part of the matrix.
    pub fn count(&self, topic: &str, day: NaiveDate) -> Option<u32> {
        let row = self.row(topic)?;
        let col = self.days.binary_search(&day).ok()?;
        Some(row[col])
    }

    /// All cells of one topic, aligned with `days()`.
    pub fn row(&self, topic: &str) -> Option<&[u32]> {
        let idx = self
            .topics
            .binary_search_by(|t| t.as_str().cmp(topic))
            .ok()?;
        Some(&self.counts[idx])
    }

    /// (topic, cells) in row order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[u32])> {
        self.topics
            .iter()
            .zip(self.counts.iter())
            .map(|(t, c)| (t.as_str(), c.as_slice()))
    }

    /// Total mentions of one topic across the window.
    pub fn total(&self, topic: &str) -> u32 {
        self.row(topic).map(|r| r.iter().sum()).unwrap_or(0)
    }

    /// Topics with their totals, most mentioned first (ties by name).
    pub fn ranked_topics(&self) -> Vec<(&str, u32)> {
        let mut ranked: Vec<(&str, u32)> = self
            .rows()
            .map(|(t, cells)| (t, cells.iter().sum()))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Inclusive lower bound of the trailing window.
pub fn window_cutoff(now: DateTime<Utc>, window_days: i64) -> TrendResult<DateTime<Utc>> {
    validate_window_days(window_days)?;
    TimeDelta::try_days(window_days)
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or_else(|| {
            TrendError::Configuration(format!("window of {window_days} days is out of range"))
        })
}

/// Count canonical topic mentions per calendar day over the trailing window.
///
/// A record exactly at `now - window_days` is included. Empty input, or input
/// that is entirely older than the cutoff, yields an empty matrix.
pub fn build_trend(
    records: &[CanonicalTopicRecord],
    window_days: i64,
    now: DateTime<Utc>,
) -> TrendResult<TrendMatrix> {
    let cutoff = window_cutoff(now, window_days)?;

    let mut sparse: BTreeMap<(String, NaiveDate), u32> = BTreeMap::new();
    let mut kept = 0usize;

    for record in records.iter().filter(|r| r.timestamp() >= cutoff) {
        let day = record.timestamp().date_naive();
        *sparse
            .entry((record.canonical_topic.clone(), day))
            .or_insert(0) += 1;
        kept += 1;
    }

    let matrix = TrendMatrix::from_sparse(&sparse);

    debug!(
        records = records.len(),
        kept = kept,
        topics = matrix.topics().len(),
        days = matrix.days().len(),
        cutoff = %cutoff,
        "Built trend matrix"
    );

    Ok(matrix)
}
