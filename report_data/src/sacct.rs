//! `sacct` export in the shape the XDMoD slurm shredder expects.
//!
//! Field list from the XDMoD guide, <https://open.xdmod.org/8.5/resource-manager-slurm.html>.

use std::{collections::BTreeMap, path::Path};

use itertools::Itertools as _;
use thiserror::Error;

use crate::window::ReportWindow;

pub const SACCT_FIELDS: [&str; 25] = [
    "jobid", "jobidraw", "cluster", "partition", "account", "group", "gid", "user", "uid", "submit", "eligible",
    "start", "end", "elapsed", "exitcode", "state", "nnodes", "ncpus", "reqcpus", "reqmem", "reqgres", "reqtres",
    "timelimit", "nodelist", "jobname",
];

const CLUSTER_FIELD: usize = 2;

/// Only finished jobs, the shredder ignores the rest anyways.
pub const SACCT_STATES: &str = "CANCELLED,COMPLETED,FAILED,NODE_FAIL,PREEMPTED,TIMEOUT";

/// midnight UTC, see `TZ=UTC` below
const SACCT_TIMESTAMP_FMT: &str = "%Y-%m-%dT00:00:00";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SacctParseError {
    #[error("line {line}: expected {expected} fields, got {found}")]
    FieldCount { line: usize, expected: usize, found: usize },
}

/// `sacct` in UTC, `--parsable2` so the fields are separated by `|` without trailing `|`.
pub fn sacct_command(binary: &str, clusters: &[String], window: &ReportWindow) -> String {
    [
        "TZ=UTC".to_owned(),
        binary.to_owned(),
        format!("--clusters {}", clusters.join(",")),
        "--allusers".to_owned(),
        "--parsable2".to_owned(),
        "--noheader".to_owned(),
        "--allocations".to_owned(),
        "--duplicates".to_owned(),
        format!("--format {}", SACCT_FIELDS.join(",")),
        format!("--state {SACCT_STATES}"),
        format!("--starttime {}", window.start.format(SACCT_TIMESTAMP_FMT)),
        format!("--endtime {}", window.end.format(SACCT_TIMESTAMP_FMT)),
    ]
    .join(" ")
}

pub fn shredder_command(cluster: &str, input_dir: &Path) -> String {
    format!("xdmod-shredder -f slurm -r {cluster} -d {}", input_dir.display())
}

/// One job allocation line, already checked to have all of [`SACCT_FIELDS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SacctRecord {
    fields: Vec<String>,
}

impl SacctRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        let index = SACCT_FIELDS.iter().position(|field| *field == name)?;
        self.fields.get(index).map(String::as_str)
    }

    pub fn cluster(&self) -> &str {
        &self.fields[CLUSTER_FIELD]
    }

    pub fn to_line(&self) -> String {
        self.fields.join("|")
    }
}

/// Parses `sacct --parsable2 --noheader` output. Blank lines are skipped, everything else has to
/// have one value per field in [`SACCT_FIELDS`]. sacct does not escape `|`, so the last field
/// (`jobname`) keeps whatever pipes are left.
pub fn parse_sacct(input: impl AsRef<str>) -> Result<Vec<SacctRecord>, SacctParseError> {
    input
        .as_ref()
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let fields = line.splitn(SACCT_FIELDS.len(), '|').map(String::from).collect_vec();
            if fields.len() != SACCT_FIELDS.len() {
                return Err(SacctParseError::FieldCount {
                    line: i + 1,
                    expected: SACCT_FIELDS.len(),
                    found: fields.len(),
                });
            }
            Ok(SacctRecord { fields })
        })
        .process_results(|records| records.collect())
}

/// The shredder gets fed one cluster (resource) at a time.
pub fn group_by_cluster(records: Vec<SacctRecord>) -> BTreeMap<String, Vec<SacctRecord>> {
    records
        .into_iter()
        .into_group_map_by(|record| record.cluster().to_owned())
        .into_iter()
        .collect()
}
