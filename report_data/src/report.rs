use std::fmt;

use itertools::Itertools as _;
use serde::Serialize;

use crate::{
    roster::FilteredUsage,
    sreport::UsageMap,
    window::ReportWindow,
};

/// Filtered usage of one cluster over one window, ready to be sent somewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterUsage {
    pub cluster: String,
    pub window: ReportWindow,
    pub usage: FilteredUsage,
}

impl ClusterUsage {
    pub fn new(cluster: impl Into<String>, window: ReportWindow, usage: FilteredUsage) -> Self {
        Self {
            cluster: cluster.into(),
            window,
            usage,
        }
    }

    pub fn subject(&self) -> String {
        format!("Usage on {} for {}", self.cluster, self.window)
    }

    /// e.g. `doduo_20260901_20261001`
    pub fn file_stem(&self) -> String {
        const FMT: &str = "%Y%m%d";
        format!("{}_{}_{}", self.cluster, self.window.start.format(FMT), self.window.end.format(FMT))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn write_table(f: &mut fmt::Formatter<'_>, usage: &UsageMap) -> fmt::Result {
    writeln!(f, "{:<16} {:>14} {:>18}", "login", "compute hours", "accelerator hours")?;
    for (user, record) in usage.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
        writeln!(f, "{:<16} {:>14} {:>18}", user.as_str(), record.compute_hours, record.accelerator_hours)?;
    }
    let (compute, accelerator) = usage.values().fold((0u128, 0u128), |(compute, accelerator), record| {
        (compute + u128::from(record.compute_hours), accelerator + u128::from(record.accelerator_hours))
    });
    writeln!(f, "{:<16} {:>14} {:>18}", "total", compute, accelerator)
}

impl fmt::Display for ClusterUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.subject())?;
        if self.usage.is_empty() {
            return writeln!(f, "\nno usage recorded for the requested users");
        }
        match &self.usage {
            FilteredUsage::Flat(usage) => {
                writeln!(f)?;
                write_table(f, usage)
            }
            FilteredUsage::Grouped(organizations) => {
                for (organization, usage) in organizations {
                    writeln!(f, "\n[{organization}]")?;
                    write_table(f, usage)?;
                }
                Ok(())
            }
        }
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use color_eyre::Result;

    use super::*;
    use crate::{
        roster::Organization,
        sreport::{SlurmUser, UsageRecord},
    };

    fn usage() -> UsageMap {
        UsageMap::from([
            (SlurmUser::from("vsc40002"), UsageRecord::new(200, 0)),
            (SlurmUser::from("vsc40001"), UsageRecord::new(100, 5)),
        ])
    }

    fn window() -> Result<ReportWindow> {
        Ok(ReportWindow::parse("01/09/2026", "01/10/2026")?)
    }

    #[test]
    fn ClusterUsage__display_flat() -> Result<()> {
        let report = ClusterUsage::new("doduo", window()?, FilteredUsage::Flat(usage()));
        let expected = "\
Usage on doduo for 01/09/2026 - 01/10/2026

login             compute hours  accelerator hours
vsc40001                    100                  5
vsc40002                    200                  0
total                       300                  5
";
        assert_eq!(report.to_string(), expected);
        Ok(())
    }

    #[test]
    fn ClusterUsage__display_grouped() -> Result<()> {
        let grouped = BTreeMap::from([(Organization::from("acme"), usage())]);
        let report = ClusterUsage::new("doduo", window()?, FilteredUsage::Grouped(grouped));
        let text = report.to_string();
        assert!(text.contains("\n[acme]\nlogin"));
        assert!(text.ends_with("total                       300                  5\n"));
        Ok(())
    }

    #[test]
    fn ClusterUsage__display_total_beyond_u64() -> Result<()> {
        let usage = UsageMap::from([
            (SlurmUser::from("vsc40001"), UsageRecord::new(u64::MAX, 1)),
            (SlurmUser::from("vsc40002"), UsageRecord::new(1, 2)),
        ]);
        let report = ClusterUsage::new("doduo", window()?, FilteredUsage::Flat(usage));
        assert!(report.to_string().ends_with(&format!("{:<16} {:>14} {:>18}\n", "total", u128::from(u64::MAX) + 1, 3)));
        Ok(())
    }

    #[test]
    fn ClusterUsage__display_empty() -> Result<()> {
        let report = ClusterUsage::new("joltik", window()?, FilteredUsage::Grouped(BTreeMap::new()));
        assert!(report.to_string().ends_with("no usage recorded for the requested users\n"));
        Ok(())
    }

    #[test]
    fn ClusterUsage__json() -> Result<()> {
        let report = ClusterUsage::new("doduo", window()?, FilteredUsage::Flat(usage()));
        let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
        assert_eq!(json["cluster"], "doduo");
        assert_eq!(json["window"]["start"], "01/09/2026");
        assert_eq!(json["usage"]["vsc40001"]["compute_hours"], 100);
        assert_eq!(json["usage"]["vsc40001"]["accelerator_hours"], 5);
        Ok(())
    }

    #[test]
    fn ClusterUsage__file_stem() -> Result<()> {
        let report = ClusterUsage::new("doduo", window()?, FilteredUsage::Flat(UsageMap::new()));
        assert_eq!(report.file_stem(), "doduo_20260901_20261001");
        Ok(())
    }
}
