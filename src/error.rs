//! Error types for kubecheck.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KubecheckError>;

/// Top-level error type for a kubecheck run.
#[derive(Error, Debug)]
pub enum KubecheckError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The acquisition capability could not produce a binary for a tool.
    #[error("failed to acquire the {tool} plugin: {reason}")]
    Acquisition { tool: String, reason: String },

    /// An external process could not be spawned or waited on. This is the
    /// "tool could not run" case, distinct from a tool reporting findings
    /// through a non-zero exit.
    #[error("failed to run {command}: {source}")]
    Invocation {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An external process whose exit status is a hard failure (helm).
    #[error("{command} failed with {status}")]
    CommandFailed { command: String, status: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to test charts at {dir}")]
    ChartsRule {
        dir: PathBuf,
        #[source]
        source: Box<KubecheckError>,
    },

    #[error("failed to test resources at {dir}")]
    ResourcesRule {
        dir: PathBuf,
        #[source]
        source: Box<KubecheckError>,
    },

    #[error("failed to test chart {chart}")]
    Chart {
        chart: PathBuf,
        #[source]
        source: Box<KubecheckError>,
    },

    #[error("failed to verify {description}")]
    Verify {
        description: String,
        #[source]
        source: Box<KubecheckError>,
    },

    /// Aggregate failure reported when the runner is configured to keep
    /// going after a rule fails.
    #[error("{0} rule(s) failed")]
    RulesFailed(usize),
}

impl KubecheckError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Render an error with its full source chain, `outer: cause: root`.
pub fn render_chain(err: &KubecheckError) -> String {
    let mut text = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Errors produced while loading or validating the rule model.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load settings file {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    #[error("rule {index} has neither charts nor resources")]
    RuleWithoutSource { index: usize },

    #[error("the resource dir {0} does not exist")]
    MissingResourceDir(PathBuf),

    #[error("the charts dir {0} does not exist")]
    MissingChartsDir(PathBuf),

    #[error(
        "the charts dir {0} does not contain a Chart.yaml file. \
         You can enable 'recurse: true' to find charts inside the directory"
    )]
    NotAChart(PathBuf),
}
