// System status display: DB stats, stage counts, last run times.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::db::Database;
use crate::pipeline::last_run_key;

const STAGES: [&str; 4] = ["collect", "extract", "dedup", "trend"];

/// Display system status for one app to the terminal.
pub async fn show(db: &Arc<dyn Database>, db_path: &str, app_id: &str) -> Result<()> {
    if !Path::new(db_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `reviewtrend init` to set up the database.");
        return Ok(());
    }

    // Database file size
    let file_size = std::fs::metadata(db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_path, file_size);
    println!("App: {app_id}");

    let reviews = db.count_reviews(app_id).await?;
    let records = db.count_topic_records(app_id).await?;
    println!("Reviews collected: {reviews}");
    if reviews > 0 {
        println!("Topics extracted: {records} of {reviews}");
    } else {
        println!("  Run `reviewtrend collect` to fetch reviews");
    }

    match db.get_canonical_settings(app_id).await? {
        Some((threshold, backend)) => {
            let map = db.get_canonical_map(app_id).await?;
            println!(
                "Canonical topics: {} from {} raw topics (threshold {threshold}, {backend})",
                map.canonical_count(),
                map.len(),
            );
        }
        None => {
            println!("Canonical topics: not yet built");
            if records > 0 {
                println!("  Run `reviewtrend dedup` to cluster topics");
            }
        }
    }

    for stage in STAGES {
        match db.get_run_state(&last_run_key(stage, app_id)).await? {
            Some(at) => println!("Last {stage}: {at}"),
            None => println!("Last {stage}: never"),
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
