use std::process::Command;

use color_eyre::{eyre::Context as _, Result};
use derive_more::derive::Display;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::window::ReportWindow;

pub const DEFAULT_SREPORT_TEMPLATE: &str = "sreport --parsable2 cluster UserUtilizationByAccount \
     -t Hours -T cpu,gres/gpu clusters={cluster} start={start} end={end} \
     format=Cluster,Login,Account,TRESName,Used";

const PLACEHOLDERS: [&str; 3] = ["{cluster}", "{start}", "{end}"];

/// What came back from one external command. `stdout` is kept no matter the exit code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub trait CommandRunner {
    fn run(&self, command: &str) -> Result<CommandOutput>;
}

/// Runs through `sh -c`, templates may start with env assignments like `TZ=UTC`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    #[instrument(skip(self))]
    fn run(&self, command: &str) -> Result<CommandOutput> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .wrap_err_with(|| format!("spawning `{command}`"))?;
        debug!(status = ?output.status, stdout_len = output.stdout.len(), "command finished");

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("command template `{template}` lacks the {placeholder} placeholder")]
    MissingPlaceholder { template: String, placeholder: &'static str },
}

/// An accounting command with `{cluster}`, `{start}` and `{end}` placeholders. Values are pasted
/// in as they are, no shell quoting happens.
#[derive(Debug, Clone, PartialEq, Eq, Display, Deserialize)]
#[serde(try_from = "String")]
pub struct CommandTemplate(String);

impl TryFrom<String> for CommandTemplate {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match PLACEHOLDERS.into_iter().find(|placeholder| !value.contains(placeholder)) {
            Some(placeholder) => Err(TemplateError::MissingPlaceholder {
                template: value,
                placeholder,
            }),
            None => Ok(Self(value)),
        }
    }
}

impl Default for CommandTemplate {
    fn default() -> Self {
        Self(DEFAULT_SREPORT_TEMPLATE.to_owned())
    }
}

impl CommandTemplate {
    pub fn render(&self, cluster: &str, window: &ReportWindow) -> String {
        self.0
            .replace("{start}", &window.start.to_command_format())
            .replace("{end}", &window.end.to_command_format())
            .replace("{cluster}", cluster)
    }
}
