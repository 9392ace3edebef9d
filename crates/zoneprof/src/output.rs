use colored::*;
use prettytable::{color, Attr, Cell, Row, Table};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::engine::Zone;

/// Output format for zone reports.
///
/// * `Table` - Human-readable table format (default)
/// * `Json` - Compact JSON format (single line)
/// * `JsonPretty` - Pretty-printed JSON format with indentation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Table,
    Json,
    JsonPretty,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(Format::Table),
            "json" => Ok(Format::Json),
            "json-pretty" | "json_pretty" => Ok(Format::JsonPretty),
            other => Err(format!(
                "unknown report format '{}', expected one of: table, json, json-pretty",
                other
            )),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Table => write!(f, "table"),
            Format::Json => write!(f, "json"),
            Format::JsonPretty => write!(f, "json-pretty"),
        }
    }
}

/// Net bytes attributed to one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneEntry {
    pub zone: String,
    pub bytes: i64,
}

/// Snapshot of a profiler's counters.
///
/// Zones are sorted by bytes, largest first, ties broken by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneReport {
    pub profiler: String,
    pub enabled: bool,
    pub current_zone: String,
    pub zones: Vec<ZoneEntry>,
}

impl ZoneReport {
    pub fn new(
        profiler: &str,
        enabled: bool,
        current_zone: &Zone,
        counters: impl IntoIterator<Item = (Zone, i64)>,
    ) -> Self {
        let mut zones: Vec<ZoneEntry> = counters
            .into_iter()
            .map(|(zone, bytes)| ZoneEntry {
                zone: zone.to_string(),
                bytes,
            })
            .collect();
        sort_entries(&mut zones);

        Self {
            profiler: profiler.to_string(),
            enabled,
            current_zone: current_zone.to_string(),
            zones,
        }
    }

    pub fn get(&self, zone: &str) -> Option<i64> {
        self.zones
            .iter()
            .find(|entry| entry.zone == zone)
            .map(|entry| entry.bytes)
    }

    /// Sum over all zones.
    pub fn total_bytes(&self) -> i64 {
        self.zones
            .iter()
            .fold(0i64, |total, entry| total.wrapping_add(entry.bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub(crate) fn table(&self, styled: bool) -> Table {
        let mut table = Table::new();

        let header_cells: Vec<Cell> = ["Zone", "Bytes", "Raw", "% Total"]
            .into_iter()
            .map(|header| {
                if styled {
                    Cell::new(header)
                        .with_style(Attr::Bold)
                        .with_style(Attr::ForegroundColor(color::CYAN))
                } else {
                    Cell::new(header).with_style(Attr::Bold)
                }
            })
            .collect();
        table.add_row(Row::new(header_cells));

        let total = self.total_bytes();
        for entry in &self.zones {
            table.add_row(Row::new(vec![
                Cell::new(display_zone(&entry.zone)),
                Cell::new(&format_bytes(entry.bytes)),
                Cell::new(&entry.bytes.to_string()),
                Cell::new(&format_share(entry.bytes, total)),
            ]));
        }

        table
    }
}

impl fmt::Display for ZoneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[zoneprof] {} - {} ({})",
            self.profiler,
            format_bytes(self.total_bytes()),
            if self.enabled { "enabled" } else { "disabled" }
        )?;
        write!(f, "{}", self.table(false))
    }
}

fn sort_entries(zones: &mut [ZoneEntry]) {
    zones.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.zone.cmp(&b.zone)));
}

fn display_zone(zone: &str) -> &str {
    if zone.is_empty() {
        "<none>"
    } else {
        zone
    }
}

fn format_share(bytes: i64, total: i64) -> String {
    if total <= 0 || bytes < 0 {
        return "-".to_string();
    }
    format!("{:.2}%", bytes as f64 * 100.0 / total as f64)
}

/// Per-zone change between two reports of the same profiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDiff {
    pub zone: String,
    pub before: i64,
    pub after: i64,
}

impl ZoneDiff {
    pub fn delta(&self) -> i64 {
        self.after.wrapping_sub(self.before)
    }
}

/// Lines up the zones of two reports; zones missing on one side count as 0.
/// Sorted by absolute change, largest first.
pub fn diff_reports(before: &ZoneReport, after: &ZoneReport) -> Vec<ZoneDiff> {
    let mut diffs: Vec<ZoneDiff> = after
        .zones
        .iter()
        .map(|entry| ZoneDiff {
            zone: entry.zone.clone(),
            before: before.get(&entry.zone).unwrap_or(0),
            after: entry.bytes,
        })
        .collect();

    for entry in &before.zones {
        if after.get(&entry.zone).is_none() {
            diffs.push(ZoneDiff {
                zone: entry.zone.clone(),
                before: entry.bytes,
                after: 0,
            });
        }
    }

    diffs.sort_by(|a, b| {
        b.delta()
            .unsigned_abs()
            .cmp(&a.delta().unsigned_abs())
            .then_with(|| a.zone.cmp(&b.zone))
    });
    diffs
}

/// Renders a diff as a table.
pub fn diff_table(diffs: &[ZoneDiff]) -> Table {
    let mut table = Table::new();
    table.add_row(Row::new(
        ["Zone", "Before", "After", "Change"]
            .into_iter()
            .map(|header| Cell::new(header).with_style(Attr::Bold))
            .collect(),
    ));

    for diff in diffs {
        let delta = diff.delta();
        let sign = if delta > 0 { "+" } else { "" };
        table.add_row(Row::new(vec![
            Cell::new(display_zone(&diff.zone)),
            Cell::new(&format_bytes(diff.before)),
            Cell::new(&format_bytes(diff.after)),
            Cell::new(&format!("{}{}", sign, format_bytes(delta))),
        ]));
    }

    table
}

/// Formats a signed byte count with binary units.
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let sign = if bytes < 0 { "-" } else { "" };
    let magnitude = bytes.unsigned_abs();
    let bytes_f = magnitude as f64;
    let unit_index = (bytes_f.log(THRESHOLD).floor() as usize).min(UNITS.len() - 1);
    let unit_value = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{}{} {}", sign, magnitude, UNITS[unit_index])
    } else {
        format!("{}{:.1} {}", sign, unit_value, UNITS[unit_index])
    }
}

/// Trait for implementing custom zone report output.
///
/// # Examples
///
/// ```rust
/// use zoneprof::{Reporter, ZoneReport};
/// use std::error::Error;
///
/// struct TopZone;
///
/// impl Reporter for TopZone {
///     fn report(&self, report: &ZoneReport) -> Result<(), Box<dyn Error>> {
///         if let Some(top) = report.zones.first() {
///             println!("{}: {} bytes", top.zone, top.bytes);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Reporter: Send + Sync {
    fn report(&self, report: &ZoneReport) -> Result<(), Box<dyn std::error::Error>>;
}

/// The built-in reporter for `format`.
pub fn reporter_for(format: Format) -> Box<dyn Reporter> {
    match format {
        Format::Table => Box::new(TableReporter),
        Format::Json => Box::new(JsonReporter),
        Format::JsonPretty => Box::new(JsonPrettyReporter),
    }
}

/// Prints the report as a table to stdout.
pub struct TableReporter;

impl Reporter for TableReporter {
    fn report(&self, report: &ZoneReport) -> Result<(), Box<dyn std::error::Error>> {
        let use_colors = std::env::var("NO_COLOR").is_err();

        if report.is_empty() {
            println!(
                "{} No zone counters recorded by {}",
                "[zoneprof]".blue().bold(),
                report.profiler.yellow().bold()
            );
            return Ok(());
        }

        println!(
            "{} {} - {}",
            "[zoneprof]".blue().bold(),
            report.profiler.yellow().bold(),
            format_bytes(report.total_bytes())
        );
        report.table(use_colors).printstd();
        Ok(())
    }
}

/// Prints the report as single-line JSON to stdout.
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(&self, report: &ZoneReport) -> Result<(), Box<dyn std::error::Error>> {
        println!("{}", report.to_json()?);
        Ok(())
    }
}

/// Prints the report as indented JSON to stdout.
pub struct JsonPrettyReporter;

impl Reporter for JsonPrettyReporter {
    fn report(&self, report: &ZoneReport) -> Result<(), Box<dyn std::error::Error>> {
        println!("{}", report.to_json_pretty()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ZoneReport {
        ZoneReport::new(
            "lmemprof",
            true,
            &Zone::from("render"),
            vec![
                (Zone::from("parse"), 32),
                (Zone::from("render"), 64),
                (Zone::none(), 64),
            ],
        )
    }

    #[test]
    fn test_report_sorted_by_bytes_then_name() {
        let report = sample();
        let order: Vec<&str> = report.zones.iter().map(|e| e.zone.as_str()).collect();
        assert_eq!(order, ["", "render", "parse"]);
        assert_eq!(report.total_bytes(), 160);
    }

    #[test]
    fn test_report_json_fields() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["profiler"], "lmemprof");
        assert_eq!(json["current_zone"], "render");
        assert_eq!(json["enabled"], true);
        assert_eq!(json["zones"][2]["zone"], "parse");
        assert_eq!(json["zones"][2]["bytes"], 32);
    }

    #[test]
    fn test_report_from_json() {
        let json = r#"{
            "profiler": "lgcprof",
            "enabled": false,
            "current_zone": "",
            "zones": [{ "zone": "tick", "bytes": -24 }]
        }"#;

        let report = ZoneReport::from_json(json).unwrap();
        assert_eq!(report.profiler, "lgcprof");
        assert_eq!(report.get("tick"), Some(-24));
        assert_eq!(report.get("missing"), None);
    }

    #[test]
    fn test_display_contains_zones() {
        let text = sample().to_string();
        assert!(text.contains("[zoneprof] lmemprof"));
        assert!(text.contains("parse"));
        assert!(text.contains("<none>"));
        assert!(text.contains("% Total"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(-2048), "-2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(format_bytes(i64::MIN), "-8388608.0 TB");
    }

    #[test]
    fn test_format_share() {
        assert_eq!(format_share(25, 100), "25.00%");
        assert_eq!(format_share(-5, 100), "-");
        assert_eq!(format_share(5, 0), "-");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("table".parse::<Format>(), Ok(Format::Table));
        assert_eq!("JSON".parse::<Format>(), Ok(Format::Json));
        assert_eq!("json-pretty".parse::<Format>(), Ok(Format::JsonPretty));
        assert!("xml".parse::<Format>().is_err());
        assert_eq!(Format::JsonPretty.to_string(), "json-pretty");
    }

    #[test]
    fn test_reporter_for_each_format() {
        let report = ZoneReport::new("lgcprof", false, &Zone::none(), Vec::new());
        for format in [Format::Table, Format::Json, Format::JsonPretty] {
            assert!(reporter_for(format).report(&report).is_ok());
        }
    }

    #[test]
    fn test_diff_reports() {
        let before = sample();
        let after = ZoneReport::new(
            "lmemprof",
            true,
            &Zone::none(),
            vec![(Zone::from("parse"), 1056), (Zone::from("load"), 10)],
        );

        let diffs = diff_reports(&before, &after);
        let zones: Vec<&str> = diffs.iter().map(|d| d.zone.as_str()).collect();
        assert_eq!(zones, ["parse", "", "render", "load"]);
        assert_eq!(diffs[0].delta(), 1024);
        assert_eq!(diffs[1].delta(), -64);
        assert_eq!(diffs[3].before, 0);

        let table = diff_table(&diffs).to_string();
        assert!(table.contains("+1.0 KB"));
    }
}
