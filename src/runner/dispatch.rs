//! Running the enabled test kinds against one rendered-output location.

use log::{debug, info, warn};
use std::path::Path;
use walkdir::WalkDir;

use crate::common::command::{CommandLine, CommandRunner};
use crate::error::{KubecheckError, Result};
use crate::plugins::{PluginSet, Resolution};
use crate::runner::{sink, ResourceLocation};
use crate::settings::types::{SettingsSpec, TestConfig, TestKind, TestSet};

/// Run every enabled test kind against `location`, in the fixed order of
/// [`TestKind::ORDER`]. Disabled kinds are skipped entirely.
pub fn run_tests(
    location: &ResourceLocation,
    tests: &TestSet,
    spec: &SettingsSpec,
    plugins: &mut PluginSet,
    runner: &dyn CommandRunner,
) -> Result<()> {
    info!(
        "verifying {} output at {}",
        location.description,
        location.output_dir.display()
    );

    for kind in TestKind::ORDER {
        let Some(config) = tests.config(kind) else {
            continue;
        };
        run_test(kind, config, location, spec, plugins, runner).map_err(|e| {
            KubecheckError::Verify {
                description: format!("{} on {}", kind.tool_name(), location.description),
                source: Box::new(e),
            }
        })?;
    }
    Ok(())
}

fn run_test(
    kind: TestKind,
    config: &TestConfig,
    location: &ResourceLocation,
    spec: &SettingsSpec,
    plugins: &mut PluginSet,
    runner: &dyn CommandRunner,
) -> Result<()> {
    let name = kind.tool_name();
    let resolution = plugins.for_kind(kind).resolve(Some(config))?;

    let Some(cmd) = build_invocation(kind, &resolution, config, location, spec)? else {
        return Ok(());
    };

    info!("{} is verifying {}...", name, location.description);
    debug!("running {cmd}");

    // A spawn failure propagates as a hard error; a non-zero exit is the
    // tool's "found problems" signal and still produces a report.
    let output = runner.run(&cmd)?;
    if !output.success {
        info!("{} returned {}", name, output.describe_status());
        debug!("{} invocation was: {}", name, cmd);
    }

    sink::record(name, &output.text, spec)
}

/// Build the tool invocation for one test kind, or None when the kind has
/// nothing to operate on.
fn build_invocation(
    kind: TestKind,
    resolution: &Resolution,
    config: &TestConfig,
    location: &ResourceLocation,
    spec: &SettingsSpec,
) -> Result<Option<CommandLine>> {
    let dir = location.output_dir.display().to_string();

    let mut args: Vec<String> = match kind {
        TestKind::SchemaValidate => vec!["-d".to_string(), dir],
        TestKind::PolicyTest => vec!["test".to_string(), dir],
        TestKind::ScoreAudit => vec!["score".to_string()],
        TestKind::SecurityAudit => {
            vec!["audit".to_string(), "--audit-path".to_string(), dir]
        }
    };

    args.extend(resolution.args.iter().cloned());
    args.extend(config.args.iter().cloned());

    // kube-score takes individual manifest files rather than a directory.
    if kind == TestKind::ScoreAudit {
        let files = find_yaml_files(&location.output_dir)?;
        if files.is_empty() {
            warn!(
                "no YAML files found for {} in output dir {}",
                location.description,
                location.output_dir.display()
            );
            return Ok(None);
        }
        args.extend(files);
    }

    let (flag, option_name) = kind.format_flag();
    let args = add_format_flags(spec.format.as_deref(), flag, option_name, args);

    Ok(Some(CommandLine::new(&resolution.binary, args)))
}

/// Append the configured report format via the tool's format flag, unless
/// the flag is already present among the args.
pub fn add_format_flags(
    format: Option<&str>,
    flag: &str,
    option_name: &str,
    args: Vec<String>,
) -> Vec<String> {
    let Some(format) = format else {
        return args;
    };
    if format.is_empty() || has_option(&args, flag, option_name) {
        return args;
    }

    let mut args = args;
    args.push(format!("--{option_name}"));
    args.push(format.to_string());
    args
}

fn has_option(args: &[String], flag: &str, option_name: &str) -> bool {
    let short = format!("-{flag}");
    let long = format!("--{option_name}");
    let long_eq = format!("{long}=");

    for (i, arg) in args.iter().enumerate() {
        if (*arg == short || *arg == long) && args.get(i + 1).is_some() {
            return true;
        }
        if arg.starts_with(&long_eq) && arg.len() > long_eq.len() {
            return true;
        }
    }
    false
}

/// Collect all manifest files under `dir`, recursing into the
/// directory-per-resource-kind layout helm produces.
fn find_yaml_files(dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| KubecheckError::io(dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(".yaml") {
            files.push(entry.path().display().to_string());
        }
    }
    Ok(files)
}
