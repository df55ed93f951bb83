use std::{
    fs,
    io::{self, Write as _},
    path::PathBuf,
};

use color_eyre::{eyre::Context as _, Result};
use report_data::report::ClusterUsage;
use tracing::info;

use crate::cli::OutputFormat;

/// A report rendered for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub recipient: Option<String>,
    pub subject: String,
    pub file_name: String,
    pub body: String,
}

impl RenderedReport {
    pub fn render(usage: &ClusterUsage, format: OutputFormat, recipient: Option<&str>) -> Result<Self> {
        let (body, extension) = match format {
            OutputFormat::Text => (usage.to_string(), "txt"),
            OutputFormat::Json => (usage.to_json().wrap_err("serializing report")?, "json"),
        };
        Ok(Self {
            recipient: recipient.map(str::to_owned),
            subject: usage.subject(),
            file_name: format!("{}.{extension}", usage.file_stem()),
            body,
        })
    }

    /// Mail-like header block followed by the body.
    pub fn to_message(&self) -> String {
        let mut message = String::new();
        if let Some(recipient) = &self.recipient {
            message.push_str(&format!("To: {recipient}\n"));
        }
        message.push_str(&format!("Subject: {}\n\n{}", self.subject, self.body));
        if !message.ends_with('\n') {
            message.push('\n');
        }
        message
    }
}

/// Where finished reports end up. Actual mail transport is somebody else's job.
pub trait ReportSink {
    fn deliver(&self, report: &RenderedReport) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn deliver(&self, report: &RenderedReport) -> Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", report.to_message()).context("writing report to stdout")
    }
}

/// One file per report, existing files get replaced.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ReportSink for DirectorySink {
    fn deliver(&self, report: &RenderedReport) -> Result<()> {
        fs::create_dir_all(&self.dir).wrap_err_with(|| format!("creating {}", self.dir.display()))?;
        let path = self.dir.join(&report.file_name);
        fs::write(&path, report.to_message()).wrap_err_with(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote report");
        Ok(())
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod test {
    use color_eyre::Result;
    use report_data::{FilteredUsage, ReportWindow, SlurmUser, UsageMap, UsageRecord};

    use super::*;

    fn usage() -> Result<ClusterUsage> {
        Ok(ClusterUsage::new(
            "doduo",
            ReportWindow::parse("01/09/2026", "01/10/2026")?,
            FilteredUsage::Flat(UsageMap::from([(SlurmUser::from("vsc40001"), UsageRecord::new(100, 5))])),
        ))
    }

    #[test]
    fn RenderedReport__message() -> Result<()> {
        let report = RenderedReport::render(&usage()?, OutputFormat::Text, Some("pi@example.org"))?;
        assert_eq!(report.file_name, "doduo_20260901_20261001.txt");
        let message = report.to_message();
        assert!(message.starts_with("To: pi@example.org\nSubject: Usage on doduo for 01/09/2026 - 01/10/2026\n\n"));
        assert!(message.contains("vsc40001"));

        let report = RenderedReport::render(&usage()?, OutputFormat::Json, None)?;
        assert_eq!(report.file_name, "doduo_20260901_20261001.json");
        assert!(report.to_message().starts_with("Subject: "));
        Ok(())
    }

    #[test]
    fn DirectorySink__writes_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sink = DirectorySink::new(dir.path().join("reports"));
        let report = RenderedReport::render(&usage()?, OutputFormat::Text, None)?;
        sink.deliver(&report)?;

        let written = fs::read_to_string(dir.path().join("reports").join(&report.file_name))?;
        assert_eq!(written, report.to_message());
        Ok(())
    }
}
