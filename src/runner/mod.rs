//! The run loop: load settings, walk the rules in order, render chart
//! sources, and dispatch the enabled tests.

pub mod discovery;
pub mod dispatch;
pub mod sink;

use log::{error, info};
use std::path::PathBuf;
use tempfile::TempDir;

use crate::common::command::CommandRunner;
use crate::error::{render_chain, ConfigError, KubecheckError, Result};
use crate::plugins::PluginSet;
use crate::settings::{self, types::*};

/// One unit of work: a directory of manifests to test and a description
/// of where it came from.
#[derive(Debug, Clone)]
pub struct ResourceLocation {
    pub description: String,
    pub output_dir: PathBuf,
}

/// What to do when a rule fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the run on the first failing rule.
    FailFast,
    /// Run every rule, log each failure, and fail the run at the end.
    CollectAll,
}

/// Options for one run of the rule engine.
pub struct RunOptions {
    /// Run root; relative chart paths and the default settings path are
    /// computed from it.
    pub dir: PathBuf,

    /// Settings file location; defaults to `.kubecheck/settings.yaml`
    /// under the run root.
    pub settings_file: Option<PathBuf>,

    /// Where rendered chart output goes. Empty means a fresh temp dir.
    pub work_dir: PathBuf,

    /// Chart source for the synthesized default rule.
    pub charts_dir: PathBuf,

    /// Recursion flag for the synthesized default rule.
    pub recurse: bool,

    /// Release names to render per chart. One synthetic entry by default;
    /// the list form leaves room for per-values-file releases.
    pub releases: Vec<String>,

    pub failure_policy: FailurePolicy,

    /// Pre-loaded settings; loaded from disk (or synthesized) when None.
    pub settings: Option<Settings>,

    pub plugins: PluginSet,
    pub runner: Box<dyn CommandRunner>,

    // Keeps a generated work dir alive for the duration of the run.
    temp_work_dir: Option<TempDir>,
}

impl RunOptions {
    pub fn new(plugins: PluginSet, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            dir: PathBuf::from("."),
            settings_file: None,
            work_dir: PathBuf::new(),
            charts_dir: PathBuf::from("charts"),
            recurse: true,
            releases: vec!["rel1".to_string()],
            failure_policy: FailurePolicy::FailFast,
            settings: None,
            plugins,
            runner,
            temp_work_dir: None,
        }
    }

    /// Fill in defaults and load (or synthesize) the settings.
    pub fn validate(&mut self) -> Result<()> {
        if self.work_dir.as_os_str().is_empty() {
            let tmp = tempfile::tempdir()
                .map_err(|e| KubecheckError::io(std::env::temp_dir(), e))?;
            self.work_dir = tmp.path().to_path_buf();
            self.temp_work_dir = Some(tmp);
        }

        let settings_file = self
            .settings_file
            .clone()
            .unwrap_or_else(|| settings::default_settings_path(&self.dir));

        if self.settings.is_none() {
            self.settings = Some(settings::load_settings(
                &settings_file,
                &self.charts_dir,
                self.recurse,
            )?);
        }
        Ok(())
    }

    /// Execute every rule in declaration order.
    pub fn run(&mut self) -> Result<()> {
        self.validate()?;

        let settings = self.settings.clone().ok_or_else(|| {
            KubecheckError::Config(ConfigError::LoadFailed {
                path: settings::default_settings_path(&self.dir),
                reason: "failed to discover or generate settings".to_string(),
            })
        })?;
        let spec = &settings.spec;

        let mut failures = 0usize;
        for (index, rule) in spec.rules.iter().enumerate() {
            if let Err(err) = self.run_rule(index, rule, spec) {
                match self.failure_policy {
                    FailurePolicy::FailFast => return Err(err),
                    FailurePolicy::CollectAll => {
                        failures += 1;
                        error!("rule {} failed: {}", index, render_chain(&err));
                    }
                }
            }
        }

        if failures > 0 {
            return Err(KubecheckError::RulesFailed(failures));
        }
        Ok(())
    }

    fn run_rule(&mut self, index: usize, rule: &Rule, spec: &SettingsSpec) -> Result<()> {
        match rule.source(index)? {
            RuleSource::Charts(charts) => {
                self.test_charts(rule, charts, spec)
                    .map_err(|e| KubecheckError::ChartsRule {
                        dir: charts.dir.clone(),
                        source: Box::new(e),
                    })
            }
            RuleSource::Resources(resources) => {
                self.test_resources(rule, resources, spec)
                    .map_err(|e| KubecheckError::ResourcesRule {
                        dir: resources.dir.clone(),
                        source: Box::new(e),
                    })
            }
        }
    }

    /// Test a directory of already-rendered resources.
    fn test_resources(
        &mut self,
        rule: &Rule,
        resources: &ResourceSource,
        spec: &SettingsSpec,
    ) -> Result<()> {
        let dir = &resources.dir;
        if !dir.is_dir() {
            return Err(ConfigError::MissingResourceDir(dir.clone()).into());
        }

        let location = ResourceLocation {
            description: format!("resources {}", dir.display()),
            output_dir: dir.clone(),
        };
        dispatch::run_tests(
            &location,
            &rule.tests,
            spec,
            &mut self.plugins,
            self.runner.as_ref(),
        )
    }

    /// Discover, render, and test every chart a chart rule names.
    fn test_charts(
        &mut self,
        rule: &Rule,
        charts: &ChartSource,
        spec: &SettingsSpec,
    ) -> Result<()> {
        let dir = &charts.dir;
        if !dir.is_dir() {
            return Err(ConfigError::MissingChartsDir(dir.clone()).into());
        }

        let chart_dirs = discovery::discover_charts(dir, charts.recurse)?;
        if chart_dirs.is_empty() {
            info!("no charts found in dir {}", dir.display());
            return Ok(());
        }

        // A failing chart does not stop its siblings; the rule still
        // fails once every chart has been attempted.
        let mut first_failure = None;
        for chart_dir in &chart_dirs {
            if let Err(e) = self.template_and_verify(rule, chart_dir, spec) {
                let e = KubecheckError::Chart {
                    chart: chart_dir.clone(),
                    source: Box::new(e),
                };
                error!("{}", render_chain(&e));
                first_failure.get_or_insert(e);
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn template_and_verify(
        &mut self,
        rule: &Rule,
        chart_dir: &std::path::Path,
        spec: &SettingsSpec,
    ) -> Result<()> {
        let helm = self.plugins.helm.resolve(None)?;
        let releases = self.releases.clone();

        for release in &releases {
            let location = discovery::render_chart(
                &helm,
                chart_dir,
                &self.dir,
                &self.work_dir,
                release,
                self.runner.as_ref(),
            )?;
            dispatch::run_tests(
                &location,
                &rule.tests,
                spec,
                &mut self.plugins,
                self.runner.as_ref(),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::command::{CommandLine, CommandOutput};
    use crate::plugins::BinaryPlugin;

    struct NoopRunner;

    impl CommandRunner for NoopRunner {
        fn run(&self, _cmd: &CommandLine) -> Result<CommandOutput> {
            Ok(CommandOutput {
                text: String::new(),
                success: true,
                code: Some(0),
            })
        }

        fn run_streamed(&self, cmd: &CommandLine) -> Result<CommandOutput> {
            self.run(cmd)
        }
    }

    fn fixed_plugins() -> PluginSet {
        fn plugin(name: &'static str) -> BinaryPlugin {
            BinaryPlugin::new(name, "0.0.0", Box::new(move |_| Ok(PathBuf::from(name))))
        }
        PluginSet {
            helm: plugin("helm"),
            kubeval: plugin("kubeval"),
            conftest: plugin("conftest"),
            kube_score: plugin("kube-score"),
            polaris: plugin("polaris"),
        }
    }

    fn settings_with_rules(rules: Vec<Rule>) -> Settings {
        let mut settings = Settings::default();
        settings.spec.rules = rules;
        settings
    }

    fn missing_resources_rule() -> Rule {
        Rule {
            resources: Some(ResourceSource {
                dir: PathBuf::from("definitely/not/here"),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn invalid_rule_fails_the_run() {
        let mut options = RunOptions::new(fixed_plugins(), Box::new(NoopRunner));
        options.settings = Some(settings_with_rules(vec![Rule::default()]));

        let err = options.run().unwrap_err();
        assert!(err.to_string().contains("neither charts nor resources"));
    }

    #[test]
    fn fail_fast_stops_at_the_first_failing_rule() {
        let tmp = tempfile::tempdir().unwrap();
        let good = Rule {
            resources: Some(ResourceSource {
                dir: tmp.path().to_path_buf(),
            }),
            ..Default::default()
        };

        let mut options = RunOptions::new(fixed_plugins(), Box::new(NoopRunner));
        options.settings = Some(settings_with_rules(vec![missing_resources_rule(), good]));

        let err = options.run().unwrap_err();
        assert!(matches!(err, KubecheckError::ResourcesRule { .. }));
    }

    #[test]
    fn collect_all_reports_the_failure_count() {
        let mut options = RunOptions::new(fixed_plugins(), Box::new(NoopRunner));
        options.failure_policy = FailurePolicy::CollectAll;
        options.settings = Some(settings_with_rules(vec![
            missing_resources_rule(),
            missing_resources_rule(),
        ]));

        let err = options.run().unwrap_err();
        assert!(matches!(err, KubecheckError::RulesFailed(2)));
    }

    #[test]
    fn chart_rule_with_no_charts_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let rule = Rule {
            charts: Some(ChartSource {
                dir: tmp.path().to_path_buf(),
                recurse: true,
            }),
            tests: TestSet {
                schema_validate: Some(TestConfig::default()),
                ..Default::default()
            },
            ..Default::default()
        };

        let mut options = RunOptions::new(fixed_plugins(), Box::new(NoopRunner));
        options.settings = Some(settings_with_rules(vec![rule]));

        options.run().unwrap();
    }

    #[test]
    fn validate_creates_a_work_dir_when_unset() {
        let mut options = RunOptions::new(fixed_plugins(), Box::new(NoopRunner));
        options.settings = Some(Settings::default());

        options.validate().unwrap();
        assert!(options.work_dir.is_dir());
    }
}
