//! Default plugin acquisition: locate a versioned binary in the plugin
//! directory, falling back to the tool on the PATH.

use log::{debug, info};
use std::env;
use std::path::PathBuf;

use super::AcquireFn;
use crate::error::{KubecheckError, Result};

/// Environment variable overriding the kubecheck home directory.
pub const HOME_ENV_VAR: &str = "KUBECHECK_HOME";

/// The directory plugin binaries are installed into:
/// `$KUBECHECK_HOME/plugins`, else `~/.kubecheck/plugins`.
pub fn plugin_bin_dir() -> Option<PathBuf> {
    plugin_bin_dir_from(|name| env::var(name).ok())
}

/// Env lookup goes through a function for easier testing.
pub fn plugin_bin_dir_from(lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(home) = lookup(HOME_ENV_VAR) {
        if !home.is_empty() {
            return Some(PathBuf::from(home).join("plugins"));
        }
    }
    dirs::home_dir().map(|home| home.join(".kubecheck").join("plugins"))
}

/// The default acquisition capability for `tool`.
pub fn acquire_fn(tool: &'static str) -> AcquireFn {
    Box::new(move |version| locate_binary(tool, version))
}

/// Find a usable binary for `tool` at `version`.
///
/// Checks `<plugin-bin-dir>/<tool>-<version>` first, then falls back to
/// the tool on the PATH (which may be any version).
pub fn locate_binary(tool: &str, version: &str) -> Result<PathBuf> {
    let bin_dir = plugin_bin_dir().ok_or_else(|| KubecheckError::Acquisition {
        tool: tool.to_string(),
        reason: "failed to find the plugin home dir".to_string(),
    })?;

    let candidate = bin_dir.join(binary_file_name(tool, version));
    if candidate.is_file() {
        debug!("using installed plugin {}", candidate.display());
        return Ok(candidate);
    }

    if let Some(found) = find_on_path(tool) {
        info!(
            "plugin {} {} is not installed, using {} from the PATH",
            tool,
            version,
            found.display()
        );
        return Ok(found);
    }

    Err(KubecheckError::Acquisition {
        tool: tool.to_string(),
        reason: format!(
            "no binary at {} and {} was not found on the PATH; install it there or pass --{}-binary",
            candidate.display(),
            tool,
            tool
        ),
    })
}

fn binary_file_name(tool: &str, version: &str) -> String {
    if cfg!(windows) {
        format!("{tool}-{version}.exe")
    } else {
        format!("{tool}-{version}")
    }
}

/// Scan the PATH entries for the tool.
fn find_on_path(tool: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        let candidate = dir.join(tool);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let candidate = dir.join(format!("{tool}.exe"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_env_var_takes_precedence() {
        let dir = plugin_bin_dir_from(|name| {
            (name == HOME_ENV_VAR).then(|| "/opt/kubecheck".to_string())
        })
        .unwrap();
        assert_eq!(dir, PathBuf::from("/opt/kubecheck/plugins"));
    }

    #[test]
    fn falls_back_to_home_dir() {
        if dirs::home_dir().is_none() {
            return;
        }
        let dir = plugin_bin_dir_from(|_| None).unwrap();
        assert!(dir.ends_with(".kubecheck/plugins"));
    }

    #[test]
    fn empty_env_var_is_ignored() {
        if dirs::home_dir().is_none() {
            return;
        }
        let dir = plugin_bin_dir_from(|_| Some(String::new())).unwrap();
        assert!(dir.ends_with(".kubecheck/plugins"));
    }
}
