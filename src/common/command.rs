//! External process execution seam.

use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{KubecheckError, Result};

/// A fully resolved external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub binary: PathBuf,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(binary: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.binary.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// What an external command produced.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Combined stdout and stderr text.
    pub text: String,
    /// Whether the process exited successfully.
    pub success: bool,
    /// The exit code, when the platform reports one.
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Human-readable exit status for error messages.
    pub fn describe_status(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "an unknown exit status".to_string(),
        }
    }
}

/// Runs external processes. The runner is injected into the orchestration
/// so tests can substitute a fake.
///
/// A non-zero exit is reported through [`CommandOutput::success`], not as
/// an error: the validators exit non-zero when they find violations.
/// Failing to spawn or wait on the process is an error.
pub trait CommandRunner {
    /// Run the command capturing combined output.
    fn run(&self, cmd: &CommandLine) -> Result<CommandOutput>;

    /// Run the command with stdout/stderr inherited, so long-running
    /// renders show their progress.
    fn run_streamed(&self, cmd: &CommandLine) -> Result<CommandOutput>;
}

/// The production runner backed by `std::process`.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &CommandLine) -> Result<CommandOutput> {
        let output = Command::new(&cmd.binary)
            .args(&cmd.args)
            .output()
            .map_err(|e| KubecheckError::Invocation {
                command: cmd.to_string(),
                source: e,
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }

        Ok(CommandOutput {
            text,
            success: output.status.success(),
            code: output.status.code(),
        })
    }

    fn run_streamed(&self, cmd: &CommandLine) -> Result<CommandOutput> {
        let status = Command::new(&cmd.binary)
            .args(&cmd.args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| KubecheckError::Invocation {
                command: cmd.to_string(),
                source: e,
            })?;

        Ok(CommandOutput {
            text: String::new(),
            success: status.success(),
            code: status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_display_joins_args() {
        let cmd = CommandLine::new(
            "kubeval",
            vec!["-d".to_string(), "out".to_string()],
        );
        assert_eq!(cmd.to_string(), "kubeval -d out");
    }

    #[test]
    fn missing_binary_is_an_invocation_error() {
        let cmd = CommandLine::new("kubecheck-no-such-binary", Vec::new());
        let err = SystemRunner.run(&cmd).unwrap_err();
        assert!(matches!(err, KubecheckError::Invocation { .. }));
    }
}
