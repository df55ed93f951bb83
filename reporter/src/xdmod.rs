use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::{
    eyre::{bail, eyre, Context as _},
    Result, Section as _, SectionExt as _,
};
use itertools::Itertools as _;
use report_data::{
    command::CommandRunner,
    sacct::{group_by_cluster, parse_sacct, sacct_command, shredder_command, SacctRecord},
    ReportWindow,
};
use tracing::{error, info, instrument, warn};

/// Fetches finished jobs from `sacct` and lays them out for `xdmod-shredder`, one directory per
/// cluster.
pub struct XdmodSync<'a> {
    pub runner: &'a dyn CommandRunner,
    pub sacct_binary: &'a str,
    pub shredder_dir: &'a Path,
    /// run the shredder on every written directory
    pub shred: bool,
}

impl XdmodSync<'_> {
    /// Returns the files written.
    #[instrument(skip(self, window), fields(window = %window))]
    pub fn sync(&self, clusters: &[String], window: &ReportWindow, dry_run: bool) -> Result<Vec<PathBuf>> {
        let command = sacct_command(self.sacct_binary, clusters, window);
        if dry_run {
            info!(%command, "dry run, not querying");
            return Ok(Vec::new());
        }

        let output = self.runner.run(&command)?;
        if !output.success() {
            warn!(exit_code = ?output.exit_code, stderr = output.stderr.trim(), "sacct failed");
        }
        let records = parse_sacct(&output.stdout)
            .wrap_err("parsing sacct output")
            .with_section(|| output.stderr.trim().to_string().header("Stderr:"))?;
        info!(jobs = records.len(), "fetched jobs");

        let grouped = group_by_cluster(records);
        for cluster in clusters.iter().filter(|cluster| !grouped.contains_key(*cluster)) {
            info!(%cluster, "no finished jobs");
        }

        let written = grouped
            .iter()
            .map(|(cluster, records)| write_shredder_input(&self.shredder_dir.join(cluster), window, records))
            .collect::<Result<Vec<_>>>()?;

        let mut failed = Vec::new();
        for cluster in grouped.keys() {
            if let Err(e) = self.shred_dir(cluster, &self.shredder_dir.join(cluster)) {
                error!(%cluster, "{e:?}");
                failed.push(cluster.as_str());
            }
        }
        if !failed.is_empty() {
            bail!("xdmod-shredder failed for {}", failed.iter().join(", "));
        }

        Ok(written)
    }

    fn shred_dir(&self, cluster: &str, dir: &Path) -> Result<()> {
        let command = shredder_command(cluster, dir);
        if !self.shred {
            info!(%command, "shredder input ready");
            return Ok(());
        }

        let output = self.runner.run(&command)?;
        if !output.success() {
            return Err(eyre!("xdmod-shredder failed with status {:?}", output.exit_code)
                .note(output.stderr.trim().to_string().header("Stderr:")));
        }
        info!(%cluster, "shredded");
        Ok(())
    }
}

fn write_shredder_input(dir: &Path, window: &ReportWindow, records: &[SacctRecord]) -> Result<PathBuf> {
    const FMT: &str = "%Y%m%d";
    fs::create_dir_all(dir).wrap_err_with(|| format!("creating {}", dir.display()))?;

    let path = dir.join(format!("sacct_{}_{}.log", window.start.format(FMT), window.end.format(FMT)));
    let mut content = records.iter().map(SacctRecord::to_line).join("\n");
    content.push('\n');
    fs::write(&path, content).wrap_err_with(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), jobs = records.len(), "wrote shredder input");

    Ok(path)
}
