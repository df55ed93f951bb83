use color_eyre::{
    eyre::{bail, Context as _},
    Result, Section as _, SectionExt as _,
};
use itertools::Itertools as _;
use report_data::{
    command::{CommandRunner, CommandTemplate},
    extract,
    report::ClusterUsage,
    ReportWindow, Roster, UsageMap,
};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    cli::DeliveryArgs,
    config::Settings,
    sink::{DirectorySink, RenderedReport, ReportSink, StdoutSink},
};

/// Queries one window on one cluster at a time. Nothing is shared between clusters.
pub struct UsageCollector<'a> {
    runner: &'a dyn CommandRunner,
    template: &'a CommandTemplate,
    window: ReportWindow,
}

#[derive(Debug, Default)]
pub struct Collected {
    pub reports: Vec<ClusterUsage>,
    pub failed: Vec<String>,
}

impl<'a> UsageCollector<'a> {
    pub fn new(runner: &'a dyn CommandRunner, template: &'a CommandTemplate, window: ReportWindow) -> Self {
        Self {
            runner,
            template,
            window,
        }
    }

    pub fn command(&self, cluster: &str) -> String {
        self.template.render(cluster, &self.window)
    }

    #[instrument(skip(self))]
    pub fn cluster_usage(&self, cluster: &str) -> Result<UsageMap> {
        let command = self.command(cluster);
        debug!(%command, "querying accounting");
        let output = self.runner.run(&command)?;
        if !output.success() {
            // the output may still be complete, let the extractor decide
            warn!(exit_code = ?output.exit_code, stderr = output.stderr.trim(), "accounting command failed");
        }

        extract(&output.stdout)
            .wrap_err_with(|| format!("parsing accounting report of {cluster} (exit code {:?})", output.exit_code))
            .with_section(|| output.stderr.trim().to_string().header("Stderr:"))
    }

    /// A failing cluster is logged and skipped, the others are still collected.
    pub fn collect(&self, clusters: &[String], roster: &Roster) -> Collected {
        let mut collected = Collected::default();
        for cluster in clusters {
            match self.cluster_usage(cluster) {
                Ok(usage) => {
                    let filtered = roster.filter(&usage);
                    debug!(%cluster, users = usage.len(), "filtered usage");
                    collected.reports.push(ClusterUsage::new(cluster.as_str(), self.window, filtered));
                }
                Err(e) => {
                    error!(%cluster, "{e:?}");
                    collected.failed.push(cluster.clone());
                }
            }
        }
        collected
    }
}

/// Everything a usage report run needs besides the collaborators.
#[derive(Debug, Clone)]
pub struct UsageRequest<'a> {
    pub roster: &'a Roster,
    pub clusters: Vec<String>,
    pub window: ReportWindow,
    pub delivery: &'a DeliveryArgs,
    pub dry_run: bool,
}

pub fn sink_for(settings: &Settings) -> Box<dyn ReportSink> {
    match &settings.report_dir {
        Some(dir) => Box::new(DirectorySink::new(dir)),
        None => Box::new(StdoutSink),
    }
}

#[instrument(skip_all, fields(window = %request.window))]
pub fn run_usage_report(
    runner: &dyn CommandRunner,
    sink: &dyn ReportSink,
    settings: &Settings,
    request: &UsageRequest,
) -> Result<()> {
    let collector = UsageCollector::new(runner, &settings.sreport_command, request.window);
    if request.dry_run {
        for cluster in &request.clusters {
            info!(%cluster, command = %collector.command(cluster), "dry run, not querying");
        }
        return Ok(());
    }

    info!(clusters = ?request.clusters, users = request.roster.user_count(), "collecting usage");
    let Collected { reports, mut failed } = collector.collect(&request.clusters, request.roster);
    for usage in &reports {
        if let Err(e) = deliver(sink, usage, request.delivery) {
            error!(cluster = %usage.cluster, "{e:?}");
            failed.push(usage.cluster.clone());
        }
    }

    if !failed.is_empty() {
        bail!("could not report usage for {}", failed.iter().join(", "));
    }
    Ok(())
}

fn deliver(sink: &dyn ReportSink, usage: &ClusterUsage, delivery: &DeliveryArgs) -> Result<()> {
    let report = RenderedReport::render(usage, delivery.format, delivery.recipient.as_deref())?;
    sink.deliver(&report).wrap_err_with(|| format!("delivering report for {}", usage.cluster))
}
