//! Finding helm charts under a source directory and rendering them into
//! the work dir.

use log::{info, warn};
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::common::command::{CommandLine, CommandRunner};
use crate::error::{ConfigError, KubecheckError, Result};
use crate::plugins::Resolution;
use crate::runner::ResourceLocation;

/// The file marking a directory as a chart root.
pub const CHART_DESCRIPTOR: &str = "Chart.yaml";

/// Find the chart directories under `dir`.
///
/// Non-recursive: `dir` itself must contain a chart descriptor, otherwise
/// this fails with a hint to enable recursion. Recursive: every directory
/// in the subtree that directly contains a descriptor is reported, in
/// traversal order; finding none is not an error.
pub fn discover_charts(dir: &Path, recurse: bool) -> Result<Vec<PathBuf>> {
    if !recurse {
        if !dir.join(CHART_DESCRIPTOR).is_file() {
            return Err(ConfigError::NotAChart(dir.to_path_buf()).into());
        }
        return Ok(vec![dir.to_path_buf()]);
    }

    let mut chart_dirs = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| KubecheckError::io(dir, e.into()))?;
        if !entry.file_type().is_file() || entry.file_name() != OsStr::new(CHART_DESCRIPTOR) {
            continue;
        }
        if let Some(chart_dir) = entry.path().parent() {
            info!("found chart in dir {}", chart_dir.display());
            chart_dirs.push(chart_dir.to_path_buf());
        }
    }
    Ok(chart_dirs)
}

/// The chart dir's path relative to the run root, always safe to join
/// under the work dir.
///
/// A run root of `.` matches any relative chart dir as-is. When the chart
/// dir does not live under the run root at all, its path is re-rooted by
/// keeping only the normal components, so the rendered output still lands
/// inside the work dir rather than next to the chart source.
fn relative_to_run_root(chart_dir: &Path, run_root: &Path) -> PathBuf {
    if let Ok(rel) = chart_dir.strip_prefix(run_root) {
        return rel.to_path_buf();
    }
    if run_root == Path::new(".") && chart_dir.is_relative() {
        return chart_dir.to_path_buf();
    }

    warn!(
        "failed to find relative chart dir from {} to {}",
        run_root.display(),
        chart_dir.display()
    );
    chart_dir
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

/// Render one chart release into the work dir via `helm template` and
/// return the location of the rendered output.
///
/// The output dir is `<work_dir>/<chart dir relative to run root>/<release>`.
/// A render failure is a hard error for this chart.
pub fn render_chart(
    helm: &Resolution,
    chart_dir: &Path,
    run_root: &Path,
    work_dir: &Path,
    release: &str,
    runner: &dyn CommandRunner,
) -> Result<ResourceLocation> {
    let rel = relative_to_run_root(chart_dir, run_root);
    let out_dir = work_dir.join(rel).join(release);
    fs::create_dir_all(&out_dir).map_err(|e| KubecheckError::io(&out_dir, e))?;

    let args = vec![
        "template".to_string(),
        "--output-dir".to_string(),
        out_dir.display().to_string(),
        release.to_string(),
        chart_dir.display().to_string(),
    ];
    let cmd = CommandLine::new(&helm.binary, args);

    let output = runner.run_streamed(&cmd)?;
    if !output.success {
        return Err(KubecheckError::CommandFailed {
            command: cmd.to_string(),
            status: output.describe_status(),
        });
    }

    Ok(ResourceLocation {
        description: format!("chart {} release {}", chart_dir.display(), release),
        output_dir: out_dir,
    })
}
