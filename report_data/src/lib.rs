pub mod command;
pub mod report;
pub mod roster;
pub mod sacct;
pub mod sreport;
pub mod window;

pub use roster::{FilteredUsage, Organization, Roster};
pub use sreport::{extract, MalformedReportError, SlurmUser, UsageMap, UsageRecord};
pub use window::{InvalidDateError, ReportDate, ReportWindow};
