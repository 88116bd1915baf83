use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::plugins::{BinaryPlugin, PluginSet};

#[derive(Parser)]
#[command(name = "kubecheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate Kubernetes manifests and helm charts with pluggable external tools")]
#[command(
    long_about = "A CLI tool that renders helm charts (or takes directories of raw manifests) and runs the configured schema, policy, score and security tools against the output, collecting each tool's report."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run all of the configured Kubernetes manifest tests
    Run(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// The directory to run from; settings and relative chart paths are
    /// resolved against it
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub dir: PathBuf,

    /// The directory to look for helm charts when no settings file is found
    #[arg(long, default_value = "charts", value_name = "DIR")]
    pub charts_dir: PathBuf,

    /// Recurse through the charts dir to find charts when no settings file
    /// is found
    #[arg(
        short,
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_name = "BOOL"
    )]
    pub recurse: bool,

    /// The settings file to use; defaults to .kubecheck/settings.yaml in
    /// the run directory
    #[arg(short, long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// The work directory for rendered chart output; a new temporary dir
    /// when not specified
    #[arg(short, long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Abort on the first failing rule; pass false to run every rule and
    /// report all failures at the end
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_name = "BOOL"
    )]
    pub fail_fast: bool,

    /// The helm binary to use instead of the installed plugin
    #[arg(long, value_name = "PATH")]
    pub helm_binary: Option<PathBuf>,

    /// The helm version to use
    #[arg(long, value_name = "VERSION")]
    pub helm_version: Option<String>,

    /// The kubeval binary to use instead of the installed plugin
    #[arg(long, value_name = "PATH")]
    pub kubeval_binary: Option<PathBuf>,

    /// The kubeval version to use
    #[arg(long, value_name = "VERSION")]
    pub kubeval_version: Option<String>,

    /// Extra command line argument to pass to kubeval (repeatable)
    #[arg(long, value_name = "ARG", allow_hyphen_values = true)]
    pub kubeval_args: Vec<String>,

    /// The conftest binary to use instead of the installed plugin
    #[arg(long, value_name = "PATH")]
    pub conftest_binary: Option<PathBuf>,

    /// The conftest version to use
    #[arg(long, value_name = "VERSION")]
    pub conftest_version: Option<String>,

    /// Extra command line argument to pass to conftest (repeatable)
    #[arg(long, value_name = "ARG", allow_hyphen_values = true)]
    pub conftest_args: Vec<String>,

    /// The kube-score binary to use instead of the installed plugin
    #[arg(long, value_name = "PATH")]
    pub kube_score_binary: Option<PathBuf>,

    /// The kube-score version to use
    #[arg(long, value_name = "VERSION")]
    pub kube_score_version: Option<String>,

    /// Extra command line argument to pass to kube-score (repeatable)
    #[arg(long, value_name = "ARG", allow_hyphen_values = true)]
    pub kube_score_args: Vec<String>,

    /// The polaris binary to use instead of the installed plugin
    #[arg(long, value_name = "PATH")]
    pub polaris_binary: Option<PathBuf>,

    /// The polaris version to use
    #[arg(long, value_name = "VERSION")]
    pub polaris_version: Option<String>,

    /// Extra command line argument to pass to polaris (repeatable)
    #[arg(long, value_name = "ARG", allow_hyphen_values = true)]
    pub polaris_args: Vec<String>,
}

impl RunArgs {
    /// Build the plugin set with the command line overrides applied.
    pub fn plugin_set(&self) -> PluginSet {
        let mut plugins = PluginSet::with_default_acquisition();
        apply_overrides(&mut plugins.helm, &self.helm_binary, &self.helm_version, &[]);
        apply_overrides(
            &mut plugins.kubeval,
            &self.kubeval_binary,
            &self.kubeval_version,
            &self.kubeval_args,
        );
        apply_overrides(
            &mut plugins.conftest,
            &self.conftest_binary,
            &self.conftest_version,
            &self.conftest_args,
        );
        apply_overrides(
            &mut plugins.kube_score,
            &self.kube_score_binary,
            &self.kube_score_version,
            &self.kube_score_args,
        );
        apply_overrides(
            &mut plugins.polaris,
            &self.polaris_binary,
            &self.polaris_version,
            &self.polaris_args,
        );
        plugins
    }
}

fn apply_overrides(
    plugin: &mut BinaryPlugin,
    binary: &Option<PathBuf>,
    version: &Option<String>,
    args: &[String],
) {
    if let Some(binary) = binary {
        plugin.set_binary_override(binary.clone());
    }
    if let Some(version) = version {
        plugin.set_version(version.clone());
    }
    if !args.is_empty() {
        plugin.set_args(args.to_vec());
    }
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}
