use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};
use color_eyre::{eyre::Context as _, Result};
use report_data::{roster::RosterFormat, ReportDate, Roster};
use tracing::Level;

/// Options every tool understands.
#[derive(Debug, Clone, PartialEq, Args)]
pub struct CommonArgs {
    /// TOML config file (default: `config/reporting.toml` if present)
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<Level>,
    /// Only log the commands that would run
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Args)]
#[group(required = true, multiple = false)]
pub struct RosterArgs {
    /// File containing the usernames to report on, one per line
    #[arg(long)]
    pub users: Option<PathBuf>,
    /// JSON file mapping organizations to their usernames
    #[arg(long)]
    pub groups: Option<PathBuf>,
}

impl RosterArgs {
    pub fn load(&self) -> Result<Roster> {
        let (path, format) = match (&self.users, &self.groups) {
            (Some(path), _) => (path, RosterFormat::Flat),
            (None, Some(path)) => (path, RosterFormat::Grouped),
            // clap enforces exactly one of them
            (None, None) => color_eyre::eyre::bail!("either --users or --groups is needed"),
        };
        Roster::load(path, format).wrap_err("loading roster")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct DeliveryArgs {
    /// Who the report is meant for
    #[arg(long)]
    pub recipient: Option<String>,
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Usage of the given users on the given clusters over a date range
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(version, about)]
pub struct UsageReportArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    #[command(flatten)]
    pub roster: RosterArgs,
    #[command(flatten)]
    pub delivery: DeliveryArgs,
    /// Cluster to get information for, repeatable (default: configured clusters)
    #[arg(long = "cluster")]
    pub clusters: Vec<String>,
    /// First day, dd/mm/yyyy
    #[arg(long)]
    pub start: ReportDate,
    /// Last day (exclusive), dd/mm/yyyy
    #[arg(long)]
    pub end: ReportDate,
}

/// Usage of the given users on the given clusters during last month
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(version, about)]
pub struct MonthlyUsageArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    #[command(flatten)]
    pub roster: RosterArgs,
    #[command(flatten)]
    pub delivery: DeliveryArgs,
    /// Cluster to get information for, repeatable (default: configured clusters)
    #[arg(long = "cluster")]
    pub clusters: Vec<String>,
}

/// Export finished jobs from sacct for the XDMoD shredder
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(version, about)]
pub struct XdmodSyncArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Cluster to get information for, repeatable (default: configured clusters)
    #[arg(long = "cluster")]
    pub clusters: Vec<String>,
    /// Start time for jobs, dd/mm/yyyy
    #[arg(long)]
    pub start: ReportDate,
    /// End time for jobs, dd/mm/yyyy
    #[arg(long)]
    pub end: ReportDate,
    /// Where to put the files for xdmod-shredder (default: from config)
    #[arg(long)]
    pub shredder_dir: Option<PathBuf>,
    /// Also run xdmod-shredder on the written files
    #[arg(long)]
    pub shred: bool,
}
