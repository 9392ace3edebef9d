pub mod diff;
pub mod show;

use std::path::Path;

use eyre::{Result, WrapErr};
use zoneprof::ZoneReport;

/// Reads a report printed by the JSON reporters.
///
/// Lines that are not JSON objects are skipped, so a captured stdout with
/// program output around the report can be passed as is.
pub fn read_report(path: &Path) -> Result<ZoneReport> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;

    if let Ok(report) = ZoneReport::from_json(&content) {
        return Ok(report);
    }

    content
        .lines()
        .filter(|line| line.trim_start().starts_with('{'))
        .find_map(|line| ZoneReport::from_json(line).ok())
        .ok_or_else(|| eyre::eyre!("no zone report found in {}", path.display()))
}
