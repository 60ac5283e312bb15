// Colored terminal output for trend tables and topic clusters.
//
// This module handles all terminal-specific formatting: colors and column
// layout. The CLI and pipeline stages delegate here.

use colored::Colorize;

use super::truncate_chars;
use crate::topics::canonical::CanonicalMap;
use crate::trend::TrendMatrix;

/// Widest topic label printed before truncation.
const TOPIC_WIDTH: usize = 40;

/// One line of the trend summary: topic, total, and its most recent counts.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendLine {
    pub topic: String,
    pub total: u32,
    pub recent: Vec<u32>,
}

/// Pick the `top_n` most mentioned topics with their last `last_days` cells.
pub fn summarize_trend(matrix: &TrendMatrix, top_n: usize, last_days: usize) -> Vec<TrendLine> {
    matrix
        .ranked_topics()
        .into_iter()
        .take(top_n)
        .map(|(topic, total)| {
            let cells = matrix.row(topic).unwrap_or(&[]);
            let start = cells.len().saturating_sub(last_days);
            TrendLine {
                topic: topic.to_string(),
                total,
                recent: cells[start..].to_vec(),
            }
        })
        .collect()
}

/// Display the busiest topics of a trend table in the terminal.
pub fn display_trend_summary(matrix: &TrendMatrix, top_n: usize, last_days: usize) {
    if matrix.is_empty() {
        println!("No topic mentions inside the trend window.");
        return;
    }

    let days = matrix.days();
    println!(
        "\n{}",
        format!(
            "=== Topic Trends ({} topics, {} to {}) ===",
            matrix.topics().len(),
            days[0],
            days[days.len() - 1]
        )
        .bold()
    );
    println!();

    let shown_days = &days[days.len().saturating_sub(last_days)..];
    let day_header: Vec<String> = shown_days
        .iter()
        .map(|d| format!("{:>5}", d.format("%m-%d")))
        .collect();

    println!(
        "  {:>4}  {:<width$} {:>6}  {}",
        "Rank".dimmed(),
        "Topic".dimmed(),
        "Total".dimmed(),
        day_header.join(" ").dimmed(),
        width = TOPIC_WIDTH,
    );
    println!("  {}", "-".repeat(16 + TOPIC_WIDTH + 6 * shown_days.len()).dimmed());

    for (i, line) in summarize_trend(matrix, top_n, last_days).iter().enumerate() {
        let cells: Vec<String> = line
            .recent
            .iter()
            .map(|&c| {
                let cell = format!("{c:>5}");
                if c == 0 {
                    cell.dimmed().to_string()
                } else {
                    cell
                }
            })
            .collect();

        println!(
            "  {:>4}. {:<width$} {:>6}  {}",
            i + 1,
            truncate_chars(&line.topic, TOPIC_WIDTH - 3),
            line.total.to_string().bold(),
            cells.join(" "),
            width = TOPIC_WIDTH,
        );
    }

    let hidden = matrix.topics().len().saturating_sub(top_n);
    if hidden > 0 {
        println!("\n  {}", format!("... and {hidden} more topics").dimmed());
    }
}

/// Display canonical topics with the raw variants merged into them.
pub fn display_clusters(map: &CanonicalMap, limit: usize) {
    if map.is_empty() {
        println!("No topics to cluster yet. Run `reviewtrend extract` first.");
        return;
    }

    println!(
        "\n{}",
        format!(
            "=== Canonical Topics ({} raw → {} canonical) ===",
            map.len(),
            map.canonical_count()
        )
        .bold()
    );

    // Clusters that actually merged something are the interesting ones.
    let mut merged: Vec<(&str, Vec<&str>)> = map
        .representatives()
        .iter()
        .map(|rep| (rep.as_str(), map.variants_of(rep)))
        .filter(|(_, variants)| !variants.is_empty())
        .collect();
    merged.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

    if merged.is_empty() {
        println!("  {}", "No near-duplicates found; every topic is its own cluster.".dimmed());
        return;
    }

    for (rep, variants) in merged.iter().take(limit) {
        println!(
            "  {} {}",
            rep.green().bold(),
            format!("(+{})", variants.len()).dimmed()
        );
        for variant in variants {
            println!("      {} {}", "←".dimmed(), variant);
        }
    }

    if merged.len() > limit {
        println!(
            "\n  {}",
            format!("... and {} more merged clusters", merged.len() - limit).dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_summarize_trend_ranks_and_tails() {
        let mut sparse = BTreeMap::new();
        sparse.insert(("crash".to_string(), day(1)), 2);
        sparse.insert(("crash".to_string(), day(3)), 1);
        sparse.insert(("dark mode".to_string(), day(2)), 1);
        let matrix = TrendMatrix::from_sparse(&sparse);

        let lines = summarize_trend(&matrix, 5, 2);
        assert_eq!(
            lines,
            vec![
                TrendLine {
                    topic: "crash".to_string(),
                    total: 3,
                    recent: vec![0, 1],
                },
                TrendLine {
                    topic: "dark mode".to_string(),
                    total: 1,
                    recent: vec![1, 0],
                },
            ]
        );
    }

    #[test]
    fn test_summarize_trend_limits_topics() {
        let mut sparse = BTreeMap::new();
        sparse.insert(("a".to_string(), day(1)), 1);
        sparse.insert(("b".to_string(), day(1)), 3);
        let matrix = TrendMatrix::from_sparse(&sparse);

        let lines = summarize_trend(&matrix, 1, 7);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].topic, "b");
        assert_eq!(lines[0].recent, vec![3]);
    }

    #[test]
    fn test_summarize_empty_matrix() {
        assert!(summarize_trend(&TrendMatrix::default(), 10, 7).is_empty());
    }
}
