use chrono::Local;
use clap::Parser as _;
use color_eyre::{eyre::Context as _, Result};
use report_data::{command::ShellRunner, ReportWindow};
use reporter::{
    cli::MonthlyUsageArgs,
    config::Settings,
    logging::register_logging,
    pipeline::{run_usage_report, sink_for, UsageRequest},
};
use tracing::info;

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = MonthlyUsageArgs::parse();
    register_logging(args.common.log_level)?;

    info!("Loading config");
    let settings = Settings::new(args.common.config.as_deref()).context("parsing config file")?;
    let roster = args.roster.load()?;

    let window = ReportWindow::previous_month(Local::now().date_naive());
    info!(%window, "reporting last month");
    let request = UsageRequest {
        roster: &roster,
        clusters: settings.clusters_or_default(&args.clusters),
        window,
        delivery: &args.delivery,
        dry_run: args.common.dry_run,
    };
    run_usage_report(&ShellRunner, sink_for(&settings).as_ref(), &settings, &request)
}
