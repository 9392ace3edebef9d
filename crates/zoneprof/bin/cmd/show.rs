use std::path::PathBuf;

use clap::Parser;
use eyre::Result;
use zoneprof::{reporter_for, Format};

use super::read_report;

#[derive(Debug, Parser)]
pub struct ShowArgs {
    #[arg(help = "Path to a JSON zone report")]
    pub report: PathBuf,

    #[arg(
        long,
        default_value_t = Format::Table,
        help = "Output format: table, json or json-pretty"
    )]
    pub format: Format,
}

impl ShowArgs {
    pub fn run(&self) -> Result<()> {
        let report = read_report(&self.report)?;

        reporter_for(self.format)
            .report(&report)
            .map_err(|e| eyre::eyre!("failed to render report: {}", e))
    }
}
