//! End-of-run report.

use anyhow::{Context, Result};
use chaos_core::RunSummary;
use std::fmt::Write as _;
use std::path::Path;

/// Human-readable summary: outcome, totals, then one row per label.
///
/// The empty label is shown as `(none)`.
pub fn render(summary: &RunSummary) -> String {
    let results = &summary.results;
    let mut out = String::new();

    let _ = writeln!(out, "outcome: {}", summary.outcome);
    let _ = writeln!(out, "total errors: {}", results.total_errors);
    let _ = writeln!(
        out,
        "total downtime: {:.2}s",
        results.total_downtime.as_secs_f64()
    );

    if results.stats.is_empty() {
        return out;
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{:<24} {:>8} {:>12}", "experiment", "errors", "downtime");
    for (label, stats) in &results.stats {
        let label = if label.is_empty() { "(none)" } else { label };
        let _ = writeln!(
            out,
            "{:<24} {:>8} {:>11.2}s",
            label,
            stats.error_count,
            stats.downtime.as_secs_f64()
        );
    }
    out
}

/// Write the summary as pretty JSON to `path`.
pub fn write_json(summary: &RunSummary, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize results")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write results to {}", path.display()))
}
