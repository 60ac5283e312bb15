// Core error taxonomy for canonicalization and trend aggregation.
//
// The pure engine (topics::canonical, trend) returns these typed errors so
// callers can tell a bad setting apart from bad upstream data. Everything
// above the engine (pipeline, db, clients, CLI) works in anyhow::Result and
// picks these up through `?`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TrendError {
    /// A parameter is outside its allowed range. Raised before any work starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An upstream collaborator handed us something that breaks its contract
    /// (unparsable timestamp, NaN similarity, unmapped topic, ...).
    #[error("data quality error: {0}")]
    DataQuality(String),
}

pub type TrendResult<T> = std::result::Result<T, TrendError>;

/// Reject thresholds outside (0, 1]. NaN fails both comparisons and is rejected too.
pub fn validate_threshold(threshold: f64) -> TrendResult<()> {
    if threshold > 0.0 && threshold <= 1.0 {
        Ok(())
    } else {
        Err(TrendError::Configuration(format!(
            "similarity threshold must be in (0, 1], got {threshold}"
        )))
    }
}

pub fn validate_window_days(window_days: i64) -> TrendResult<()> {
    if window_days >= 1 {
        Ok(())
    } else {
        Err(TrendError::Configuration(format!(
            "window_days must be at least 1, got {window_days}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_bounds() {
        assert!(validate_threshold(1.0).is_ok());
        assert!(validate_threshold(0.85).is_ok());
        assert!(validate_threshold(0.0).is_err());
        assert!(validate_threshold(-0.1).is_err());
        assert!(validate_threshold(1.01).is_err());
        assert!(validate_threshold(f64::NAN).is_err());
    }

    #[test]
    fn test_window_days_bounds() {
        assert!(validate_window_days(1).is_ok());
        assert!(validate_window_days(30).is_ok());
        assert!(matches!(
            validate_window_days(0),
            Err(TrendError::Configuration(_))
        ));
    }

    #[test]
    fn test_error_converts_into_anyhow() {
        fn run() -> anyhow::Result<()> {
            validate_window_days(-3)?;
            Ok(())
        }
        let err = run().unwrap_err();
        assert!(err.to_string().contains("window_days"));
    }
}
