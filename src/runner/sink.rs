//! Recording test output: per-tool report files, or the console.

use colored::Colorize;
use log::info;
use std::fs;

use crate::error::{KubecheckError, Result};
use crate::settings::types::SettingsSpec;
use crate::settings::DEFAULT_FORMAT;

/// Record one tool's raw output.
///
/// With an output dir configured the output is written verbatim to
/// `<outputDir>/<name>.<format>`, overwriting any previous report of the
/// same name. Otherwise it is printed to the console.
pub fn record(name: &str, output: &str, spec: &SettingsSpec) -> Result<()> {
    let Some(output_dir) = &spec.output_dir else {
        info!("result:\n{}", output.green());
        return Ok(());
    };

    fs::create_dir_all(output_dir).map_err(|e| KubecheckError::io(output_dir, e))?;

    let format = spec.format.as_deref().unwrap_or(DEFAULT_FORMAT);
    let path = output_dir.join(format!("{name}.{format}"));
    fs::write(&path, output).map_err(|e| KubecheckError::io(&path, e))?;

    info!(
        "saved {} results in {}",
        name,
        path.display().to_string().cyan()
    );
    Ok(())
}
