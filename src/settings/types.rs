//! The declarative rule model: which manifest sources to test and with
//! which tools.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Root of the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub spec: SettingsSpec,
}

/// Process-wide configuration plus the ordered rule list. Rule order is
/// evaluation order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSpec {
    /// The rules to apply, in order.
    #[serde(default)]
    pub rules: Vec<Rule>,

    /// Directory to write per-tool report files into. When unset, results
    /// go to the console.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Report format passed to each tool's format flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// One declarative unit pairing a manifest source with a set of tests.
///
/// The wire format has two optional source keys; use [`Rule::source`] to
/// get the checked sum-type view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rule {
    /// A directory of already-rendered Kubernetes resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSource>,

    /// A helm chart, or a root to recurse through for charts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charts: Option<ChartSource>,

    /// The tests to run against the rendered output.
    #[serde(default)]
    pub tests: TestSet,
}

impl Rule {
    /// Resolve the rule into exactly one source kind. A rule with neither
    /// charts nor resources is invalid.
    pub fn source(&self, index: usize) -> Result<RuleSource<'_>, ConfigError> {
        if let Some(charts) = &self.charts {
            return Ok(RuleSource::Charts(charts));
        }
        if let Some(resources) = &self.resources {
            return Ok(RuleSource::Resources(resources));
        }
        Err(ConfigError::RuleWithoutSource { index })
    }
}

/// Checked view of a rule's source.
#[derive(Debug, Clone, Copy)]
pub enum RuleSource<'a> {
    Resources(&'a ResourceSource),
    Charts(&'a ChartSource),
}

/// A directory containing rendered Kubernetes resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSource {
    pub dir: PathBuf,
}

/// A directory containing a helm chart, or a root to search for charts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartSource {
    pub dir: PathBuf,

    /// Recurse through the directory looking for Chart.yaml files.
    #[serde(default)]
    pub recurse: bool,
}

/// Per-rule test enablement. A present key enables the test kind; its
/// value carries optional overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_validate: Option<TestConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_test: Option<TestConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_audit: Option<TestConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_audit: Option<TestConfig>,
}

impl TestSet {
    /// The configuration for a test kind, or None when it is disabled.
    pub fn config(&self, kind: TestKind) -> Option<&TestConfig> {
        match kind {
            TestKind::SchemaValidate => self.schema_validate.as_ref(),
            TestKind::PolicyTest => self.policy_test.as_ref(),
            TestKind::ScoreAudit => self.score_audit.as_ref(),
            TestKind::SecurityAudit => self.security_audit.as_ref(),
        }
    }
}

/// Per test-kind overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestConfig {
    /// Override of the tool version to use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Extra command line arguments appended to the invocation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// The fixed set of test kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestKind {
    SchemaValidate,
    PolicyTest,
    ScoreAudit,
    SecurityAudit,
}

impl TestKind {
    /// Execution order within a rule. This ordering is a contract: schema
    /// validation runs first, then policy tests, then the audits.
    pub const ORDER: [TestKind; 4] = [
        TestKind::SchemaValidate,
        TestKind::PolicyTest,
        TestKind::ScoreAudit,
        TestKind::SecurityAudit,
    ];

    /// The logical name of the external tool backing this test kind. Also
    /// used as the report file stem.
    pub fn tool_name(self) -> &'static str {
        match self {
            TestKind::SchemaValidate => "kubeval",
            TestKind::PolicyTest => "conftest",
            TestKind::ScoreAudit => "kube-score",
            TestKind::SecurityAudit => "polaris",
        }
    }

    /// The tool's format flag as (short name, long name).
    pub fn format_flag(self) -> (&'static str, &'static str) {
        match self {
            TestKind::SchemaValidate => ("o", "output"),
            TestKind::PolicyTest => ("o", "output"),
            TestKind::ScoreAudit => ("o", "output"),
            TestKind::SecurityAudit => ("f", "format"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_source_prefers_explicit_kind() {
        let rule = Rule {
            charts: Some(ChartSource {
                dir: PathBuf::from("charts"),
                recurse: true,
            }),
            ..Default::default()
        };
        assert!(matches!(rule.source(0), Ok(RuleSource::Charts(_))));

        let rule = Rule {
            resources: Some(ResourceSource {
                dir: PathBuf::from("manifests"),
            }),
            ..Default::default()
        };
        assert!(matches!(rule.source(0), Ok(RuleSource::Resources(_))));
    }

    #[test]
    fn rule_without_source_is_an_error() {
        let rule = Rule::default();
        let err = rule.source(3).unwrap_err();
        assert!(matches!(err, ConfigError::RuleWithoutSource { index: 3 }));
        assert!(err.to_string().contains("rule 3"));
    }

    #[test]
    fn deserializes_wire_format() {
        let yaml = r#"
spec:
  rules:
    - charts:
        dir: charts
        recurse: true
      tests:
        schemaValidate: {}
        policyTest:
          version: 0.25.0
          args: ["--policy", "policy/"]
  outputDir: reports
  format: tap
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.spec.rules.len(), 1);
        assert_eq!(settings.spec.output_dir, Some(PathBuf::from("reports")));
        assert_eq!(settings.spec.format.as_deref(), Some("tap"));

        let rule = &settings.spec.rules[0];
        assert!(rule.tests.schema_validate.is_some());
        assert!(rule.tests.score_audit.is_none());
        let policy = rule.tests.policy_test.as_ref().unwrap();
        assert_eq!(policy.version.as_deref(), Some("0.25.0"));
        assert_eq!(policy.args, vec!["--policy", "policy/"]);
    }
}
