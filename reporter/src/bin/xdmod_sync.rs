use clap::Parser as _;
use color_eyre::{eyre::Context as _, Result};
use report_data::{command::ShellRunner, ReportWindow};
use reporter::{cli::XdmodSyncArgs, config::Settings, logging::register_logging, xdmod::XdmodSync};
use tracing::info;

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = XdmodSyncArgs::parse();
    register_logging(args.common.log_level)?;

    info!("Loading config");
    let settings = Settings::new(args.common.config.as_deref()).context("parsing config file")?;
    let shredder_dir = args.shredder_dir.as_deref().unwrap_or(&settings.shredder_dir);

    let sync = XdmodSync {
        runner: &ShellRunner,
        sacct_binary: &settings.sacct_binary,
        shredder_dir,
        shred: args.shred,
    };
    let written = sync.sync(
        &settings.clusters_or_default(&args.clusters),
        &ReportWindow::new(args.start, args.end),
        args.common.dry_run,
    )?;
    info!(files = written.len(), "done");
    Ok(())
}
