//! # Kubecheck
//!
//! A Rust-based command-line application that validates Kubernetes resource
//! manifests. It renders helm charts (or takes directories of raw
//! manifests), runs the configured external validators against the output,
//! and collects each tool's report.
//!
//! ## Features
//!
//! - **Declarative rules**: a YAML ruleset pairs manifest sources with the
//!   tests to run against them
//! - **Chart discovery**: finds and renders every chart under a source tree
//! - **Pluggable tools**: schema validation (kubeval), policy tests
//!   (conftest), score audits (kube-score) and security audits (polaris),
//!   each with per-rule version and argument overrides
//! - **Report collection**: per-tool report files in a configurable format,
//!   or colorized console output

pub mod cli;
pub mod common;
pub mod error;
pub mod plugins;
pub mod runner;
pub mod settings;

// Re-export commonly used types
pub use error::{KubecheckError, Result};
pub use runner::{FailurePolicy, RunOptions};
pub use settings::types::{Settings, TestKind};

use cli::Commands;
use common::command::SystemRunner;

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run(args) => {
            let plugins = args.plugin_set();
            let mut options = RunOptions::new(plugins, Box::new(SystemRunner));
            options.dir = args.dir;
            options.charts_dir = args.charts_dir;
            options.recurse = args.recurse;
            options.settings_file = args.settings;
            if let Some(work_dir) = args.work_dir {
                options.work_dir = work_dir;
            }
            options.failure_policy = if args.fail_fast {
                FailurePolicy::FailFast
            } else {
                FailurePolicy::CollectAll
            };
            options.run()
        }
    }
}
