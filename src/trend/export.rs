// CSV export of the trend matrix.
//
// Layout: a leading `canonical_topic` column, then one column per day
// (YYYY-MM-DD, ascending), each cell an integer count. Topics are quoted
// per RFC 4180 when they contain a comma, quote, or line break.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::TrendMatrix;

pub const TOPIC_COLUMN: &str = "canonical_topic";

/// Write the matrix as CSV. An empty matrix produces just the header cell.
pub fn write_csv<W: Write>(matrix: &TrendMatrix, mut out: W) -> io::Result<()> {
    write!(out, "{TOPIC_COLUMN}")?;
    for day in matrix.days() {
        write!(out, ",{}", day.format("%Y-%m-%d"))?;
    }
    writeln!(out)?;

    for (topic, cells) in matrix.rows() {
        write!(out, "{}", escape_field(topic))?;
        for count in cells {
            write!(out, ",{count}")?;
        }
        writeln!(out)?;
    }

    out.flush()
}

/// Save the matrix to `path`, creating parent directories.
///
/// Writes to a sibling temp file and renames it into place, so a reader
/// never sees a half-written table.
pub fn save_csv(matrix: &TrendMatrix, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    let tmp_path = path.with_extension("csv.tmp");
    let file = File::create(&tmp_path)
        .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
    write_csv(matrix, BufWriter::new(file))
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move trend table into {}", path.display()))?;

    info!(
        path = %path.display(),
        topics = matrix.topics().len(),
        days = matrix.days().len(),
        "Saved trend table"
    );
    Ok(())
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
