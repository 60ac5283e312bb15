// Pipeline stages: collect -> extract -> dedup -> trend.
//
// Each stage reads its input from the database and writes its output back,
// so stages can run one at a time from the CLI or all together via `run`.

pub mod collect;
pub mod dedup;
pub mod extract;
pub mod trend;

use chrono::{DateTime, Utc};

use crate::db::models::TopicRecord;
use crate::error::TrendResult;
use crate::trend::window_cutoff;

/// run_state key recording when `stage` last finished for `app_id`.
pub fn last_run_key(stage: &str, app_id: &str) -> String {
    format!("last_{stage}_at:{app_id}")
}

/// Timestamp format used for run_state bookkeeping values.
pub(crate) fn run_stamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Keep the records at or after the window cutoff. Order is preserved.
pub fn records_in_window(
    records: Vec<TopicRecord>,
    window_days: i64,
    now: DateTime<Utc>,
) -> TrendResult<Vec<TopicRecord>> {
    let cutoff = window_cutoff(now, window_days)?;
    Ok(records
        .into_iter()
        .filter(|r| r.timestamp >= cutoff)
        .collect())
}
