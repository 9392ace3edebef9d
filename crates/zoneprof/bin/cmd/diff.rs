use std::path::PathBuf;

use clap::Parser;
use colored::*;
use eyre::Result;
use zoneprof::{diff_reports, diff_table, format_bytes};

use super::read_report;

#[derive(Debug, Parser)]
pub struct DiffArgs {
    #[arg(help = "Report taken first")]
    pub before: PathBuf,

    #[arg(help = "Report taken later")]
    pub after: PathBuf,
}

impl DiffArgs {
    pub fn run(&self) -> Result<()> {
        let before = read_report(&self.before)?;
        let after = read_report(&self.after)?;

        if before.profiler != after.profiler {
            tracing::warn!(
                before = %before.profiler,
                after = %after.profiler,
                "comparing reports of different profilers"
            );
        }

        let diffs = diff_reports(&before, &after);
        let total = after.total_bytes().wrapping_sub(before.total_bytes());
        let sign = if total > 0 { "+" } else { "" };

        println!(
            "{} {} - {}{}",
            "[zoneprof]".blue().bold(),
            after.profiler.yellow().bold(),
            sign,
            format_bytes(total)
        );

        if diffs.is_empty() {
            println!("No zones in either report");
            return Ok(());
        }

        diff_table(&diffs).printstd();
        Ok(())
    }
}
