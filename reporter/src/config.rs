use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use report_data::command::{CommandTemplate, DEFAULT_SREPORT_TEMPLATE};
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "config/reporting";
const DEFAULT_CLUSTERS: [&str; 6] = ["skitty", "swalot", "victini", "kirlia", "doduo", "joltik"];
const DEFAULT_SACCT_BINARY: &str = "sacct";
const DEFAULT_SHREDDER_DIR: &str = "/var/tmp/xdmod-shredder";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// used when no `--cluster` is given
    pub clusters: Vec<String>,
    pub sreport_command: CommandTemplate,
    pub sacct_binary: String,
    pub shredder_dir: PathBuf,
    /// reports go to stdout if unset
    pub report_dir: Option<PathBuf>,
}

impl Settings {
    /// defaults < config file < `REPORTING_*` environment
    ///
    /// Without an explicit `path`, `config/reporting.toml` is read if it exists.
    pub fn new(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let builder = Config::builder()
            .set_default("clusters", DEFAULT_CLUSTERS.to_vec())?
            .set_default("sreport_command", DEFAULT_SREPORT_TEMPLATE)?
            .set_default("sacct_binary", DEFAULT_SACCT_BINARY)?
            .set_default("shredder_dir", DEFAULT_SHREDDER_DIR)?
            .add_source(file)
            .add_source(
                Environment::with_prefix("REPORTING")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("clusters"),
            )
            .build()?;

        builder.try_deserialize()
    }

    /// CLI clusters win over the configured ones.
    pub fn clusters_or_default(&self, requested: &[String]) -> Vec<String> {
        if requested.is_empty() {
            self.clusters.clone()
        } else {
            requested.to_vec()
        }
    }
}
