// Unit tests for trend aggregation: day bucketing, dense zero-fill and the
// trailing window boundary. `now` is always fixed so results don't depend on
// when the tests run.

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};

use reviewtrend::db::models::{CanonicalTopicRecord, Category, Sentiment, TopicRecord};
use reviewtrend::error::TrendError;
use reviewtrend::trend::{build_trend, window_cutoff};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
}

fn day(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn record(id: usize, canonical: &str, at: DateTime<Utc>) -> CanonicalTopicRecord {
    CanonicalTopicRecord {
        record: TopicRecord {
            review_id: format!("r{id}"),
            timestamp: at,
            category: Category::Issue,
            topic: format!("{canonical} (raw)"),
            sentiment: Sentiment::Negative,
        },
        canonical_topic: canonical.to_string(),
    }
}

// ============================================================
// Worked examples
// ============================================================

#[test]
fn two_topics_two_days() {
    let day1 = Utc.with_ymd_and_hms(2024, 3, 29, 9, 0, 0).unwrap();
    let day2 = Utc.with_ymd_and_hms(2024, 3, 30, 18, 30, 0).unwrap();
    let records = vec![record(1, "A", day1), record(2, "A", day1), record(3, "B", day2)];

    let matrix = build_trend(&records, 30, now()).unwrap();

    assert_eq!(matrix.topics(), ["A", "B"]);
    assert_eq!(matrix.days(), [day(3, 29), day(3, 30)]);
    assert_eq!(matrix.count("A", day(3, 29)), Some(2));
    assert_eq!(matrix.count("A", day(3, 30)), Some(0));
    assert_eq!(matrix.count("B", day(3, 29)), Some(0));
    assert_eq!(matrix.count("B", day(3, 30)), Some(1));
}

#[test]
fn no_records_gives_empty_matrix() {
    let matrix = build_trend(&[], 30, now()).unwrap();
    assert!(matrix.is_empty());
    assert!(matrix.topics().is_empty());
    assert!(matrix.days().is_empty());
}

#[test]
fn records_all_outside_window_give_empty_matrix() {
    let old = now() - TimeDelta::days(45);
    let matrix = build_trend(&[record(1, "A", old)], 30, now()).unwrap();
    assert!(matrix.is_empty());
}

// ============================================================
// Properties
// ============================================================

#[test]
fn every_cell_equals_exact_count() {
    let topics = ["crash", "battery", "dark mode", "login"];
    let records: Vec<CanonicalTopicRecord> = (0..60)
        .map(|i| {
            // Spread over 40 days so some fall outside a 30 day window.
            let at = now() - TimeDelta::hours(16 * i as i64);
            record(i, topics[(i * 7 + i / 3) % topics.len()], at)
        })
        .collect();

    let matrix = build_trend(&records, 30, now()).unwrap();
    let cutoff = window_cutoff(now(), 30).unwrap();

    let mut seen_total = 0;
    for topic in matrix.topics() {
        for &d in matrix.days() {
            let expected = records
                .iter()
                .filter(|r| r.timestamp() >= cutoff)
                .filter(|r| r.canonical_topic == *topic && r.timestamp().date_naive() == d)
                .count() as u32;
            assert_eq!(matrix.count(topic, d), Some(expected), "{topic} on {d}");
            seen_total += expected;
        }
    }

    let in_window = records.iter().filter(|r| r.timestamp() >= cutoff).count() as u32;
    assert_eq!(seen_total, in_window);
}

#[test]
fn unobserved_combinations_are_zero_not_missing() {
    let records = vec![
        record(1, "A", Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap()),
        record(2, "B", Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()),
        record(3, "C", Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap()),
    ];

    let matrix = build_trend(&records, 30, now()).unwrap();

    assert_eq!(matrix.topics().len(), 3);
    assert_eq!(matrix.days().len(), 3);
    for (topic, cells) in matrix.rows() {
        assert_eq!(cells.len(), 3, "row {topic} is dense");
        assert_eq!(cells.iter().filter(|&&c| c == 0).count(), 2);
        assert_eq!(cells.iter().sum::<u32>(), 1);
    }
    // Days with no records at all don't become columns.
    assert_eq!(matrix.count("A", day(3, 2)), None);
}

#[test]
fn record_exactly_at_cutoff_is_included() {
    let cutoff = now() - TimeDelta::days(7);
    let just_before = cutoff - TimeDelta::microseconds(1);

    let matrix = build_trend(
        &[record(1, "edge", cutoff), record(2, "edge", just_before)],
        7,
        now(),
    )
    .unwrap();

    assert_eq!(matrix.total("edge"), 1);
    assert_eq!(matrix.days(), [cutoff.date_naive()]);
}

#[test]
fn records_after_now_are_kept() {
    let later = now() + TimeDelta::hours(2);
    let matrix = build_trend(&[record(1, "A", later)], 1, now()).unwrap();
    assert_eq!(matrix.total("A"), 1);
}

// ============================================================
// Errors
// ============================================================

#[test]
fn window_below_one_day_is_configuration_error() {
    for bad in [0, -5] {
        assert!(matches!(
            build_trend(&[], bad, now()),
            Err(TrendError::Configuration(_))
        ));
    }
}
