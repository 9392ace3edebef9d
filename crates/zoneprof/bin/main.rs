mod cmd;
use clap::{Parser, Subcommand};
use cmd::diff::DiffArgs;
use cmd::show::ShowArgs;
use eyre::Result;

#[derive(Subcommand, Debug)]
pub enum ZPSubcommand {
    #[command(about = "Render a saved zone report")]
    Show(ShowArgs),
    #[command(about = "Compare two zone reports of the same profiler")]
    Diff(DiffArgs),
}

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "zoneprof CLI: inspect zone reports written with ZONEPROF_REPORT=json"
)]
pub struct ZPArgs {
    #[command(subcommand)]
    pub cmd: ZPSubcommand,
}

fn main() -> Result<()> {
    zoneprof::init_logging();
    let root_args = ZPArgs::parse();

    match root_args.cmd {
        ZPSubcommand::Show(args) => {
            args.run()?;
        }
        ZPSubcommand::Diff(args) => {
            args.run()?;
        }
    }

    Ok(())
}
