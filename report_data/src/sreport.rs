use std::{collections::HashMap, num::ParseIntError};

use derive_more::derive::{Deref, Display, From, Into};
use itertools::Itertools as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Display, From, Into, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlurmUser(pub String);

impl From<&str> for SlurmUser {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Hours used by one user on one cluster during one report window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub compute_hours: u64,
    pub accelerator_hours: u64,
}

impl UsageRecord {
    pub fn new(compute_hours: u64, accelerator_hours: u64) -> Self {
        Self {
            compute_hours,
            accelerator_hours,
        }
    }

    /// `None` if either component overflows.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        Some(Self {
            compute_hours: self.compute_hours.checked_add(other.compute_hours)?,
            accelerator_hours: self.accelerator_hours.checked_add(other.accelerator_hours)?,
        })
    }
}

pub type UsageMap = HashMap<SlurmUser, UsageRecord>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReportError {
    #[error("no section boundary found (saw {found} of 2 dashed lines)")]
    MissingBoundary { found: usize },
    #[error("unexpected header `{header}`, expected `Login` as second column")]
    UnexpectedHeader { header: String },
    #[error("line {line}: data row has fewer than three fields (`{row}`)")]
    ShortRow { line: usize, row: String },
    #[error("unpaired data row: got {rows} data rows, expected an even number")]
    UnpairedRow { rows: usize },
    #[error("row pair mismatch at line {line}: `{first}` is followed by `{second}`")]
    RowPairMismatch { line: usize, first: String, second: String },
    #[error("line {line}: non-numeric usage value `{value}`")]
    NonNumericUsage {
        line: usize,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("line {line}: usage of `{login}` summed over its accounts does not fit in 64 bits")]
    UsageOverflow { line: usize, login: String },
}

/// One `|`-separated line below the header. `line` is 1-based in the raw report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DataRow<'a> {
    line: usize,
    login: &'a str,
    used: u64,
}

impl<'a> DataRow<'a> {
    fn parse(line: usize, row: &'a str) -> Result<Self, MalformedReportError> {
        let fields = row.split('|').map(str::trim).collect_vec();
        match fields.as_slice() {
            &[_, login, .., used] => Ok(DataRow {
                line,
                login,
                used: used.parse().map_err(|source| MalformedReportError::NonNumericUsage {
                    line,
                    value: used.to_owned(),
                    source,
                })?,
            }),
            _ => Err(MalformedReportError::ShortRow {
                line,
                row: row.to_owned(),
            }),
        }
    }
}

fn is_boundary(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c == '-')
}

fn validate_header(header: &str) -> Result<(), MalformedReportError> {
    match header.split('|').nth(1).map(str::trim) {
        Some(login) if login.eq_ignore_ascii_case("login") => Ok(()),
        _ => Err(MalformedReportError::UnexpectedHeader {
            header: header.to_owned(),
        }),
    }
}

/// Turns the output of `sreport --parsable2 cluster UserUtilizationByAccount -T cpu,gres/gpu` into
/// per-user usage.
///
/// ```text
/// --------------------------------------------------------------------------------
/// Cluster/User/Account Utilization 2020-01-01T00:00:00 - 2020-01-31T23:59:59 (2678400 secs)
/// Usage reported in TRES Hours
/// --------------------------------------------------------------------------------
/// Cluster|Login|Account|TRES Name|Used
/// doduo|vsc40001|gvo00001|cpu|100
/// doduo|vsc40001|gvo00001|gres/gpu|5
/// ```
///
/// Everything up to the second dashed line is preamble, the line after it is the header. Data
/// rows come in pairs per user, compute hours first, accelerator hours second. A user that shows
/// up under several accounts gets the sum of all its pairs.
///
/// Either the whole report parses or nothing is returned.
pub fn extract(raw: &str) -> Result<UsageMap, MalformedReportError> {
    let mut lines = raw.lines().enumerate().map(|(i, line)| (i + 1, line));

    let mut found = 0;
    while found < 2 {
        match lines.next() {
            Some((_, line)) if is_boundary(line) => found += 1,
            Some(_) => {}
            None => return Err(MalformedReportError::MissingBoundary { found }),
        }
    }

    let mut lines = lines.filter(|(_, line)| !line.trim().is_empty());
    let Some((_, header)) = lines.next() else {
        debug!("report has no header, treating as empty");
        return Ok(UsageMap::new());
    };
    validate_header(header)?;

    let rows: Vec<DataRow> = lines
        .map(|(line, row)| DataRow::parse(line, row))
        .process_results(|rows| rows.collect())?;
    if rows.len() % 2 != 0 {
        return Err(MalformedReportError::UnpairedRow { rows: rows.len() });
    }

    let mut usage = UsageMap::new();
    for (compute, accelerator) in rows.into_iter().tuples() {
        if compute.login != accelerator.login {
            return Err(MalformedReportError::RowPairMismatch {
                line: accelerator.line,
                first: compute.login.to_owned(),
                second: accelerator.login.to_owned(),
            });
        }
        let total = usage.entry(SlurmUser::from(compute.login)).or_default();
        *total = total
            .checked_add(UsageRecord::new(compute.used, accelerator.used))
            .ok_or_else(|| MalformedReportError::UsageOverflow {
                line: accelerator.line,
                login: compute.login.to_owned(),
            })?;
    }
    debug!(users = usage.len(), "extracted usage");

    Ok(usage)
}
