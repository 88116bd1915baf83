//! Versioned external tool binaries, acquired on demand and cached for the
//! duration of a run.

pub mod install;

use log::debug;
use std::path::PathBuf;

use crate::error::{KubecheckError, Result};
use crate::settings::types::{TestConfig, TestKind};

/// Default helm version used to render charts.
pub const HELM_VERSION: &str = "3.12.3";

/// Default version of kubeval to use for schema validation.
pub const KUBEVAL_VERSION: &str = "0.16.1";

/// Default version of conftest to use for policy tests.
pub const CONFTEST_VERSION: &str = "0.24.0";

/// Default version of kube-score to use for score audits.
pub const KUBE_SCORE_VERSION: &str = "1.11.0";

/// Default version of polaris to use for security audits.
pub const POLARIS_VERSION: &str = "3.2.1";

/// The acquisition capability: fetch-or-locate a tool binary at a version.
pub type AcquireFn = Box<dyn Fn(&str) -> Result<PathBuf>>;

/// The outcome of resolving a plugin: an owned snapshot the caller can use
/// without holding a borrow on the plugin.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub binary: PathBuf,
    pub args: Vec<String>,
}

/// A versioned external binary tool.
///
/// Constructed once per tool at process start with a default version and
/// an acquisition capability. The resolved binary path is cached; a rule
/// requesting a different version invalidates the cache and forces a
/// fresh acquisition at that version.
pub struct BinaryPlugin {
    name: &'static str,
    binary_override: Option<PathBuf>,
    version: String,
    args: Vec<String>,
    acquire: AcquireFn,
    cached: Option<PathBuf>,
}

impl BinaryPlugin {
    pub fn new(name: &'static str, version: &str, acquire: AcquireFn) -> Self {
        Self {
            name,
            binary_override: None,
            version: version.to_string(),
            args: Vec::new(),
            acquire,
            cached: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Use an explicit binary path instead of acquiring one.
    pub fn set_binary_override(&mut self, binary: PathBuf) {
        self.binary_override = Some(binary);
    }

    /// Change the version the next acquisition will use.
    pub fn set_version(&mut self, version: String) {
        if version != self.version {
            self.cached = None;
        }
        self.version = version;
    }

    /// Replace the plugin-level extra arguments.
    pub fn set_args(&mut self, args: Vec<String>) {
        self.args = args;
    }

    /// Resolve a usable binary, applying a per-rule test configuration.
    ///
    /// An explicit binary override always wins and never acquires. A config
    /// requesting a different version drops the cached path and re-acquires;
    /// non-empty config args replace the stored plugin args. Otherwise the
    /// cached path is reused, acquiring once on first use.
    pub fn resolve(&mut self, config: Option<&TestConfig>) -> Result<Resolution> {
        if let Some(binary) = &self.binary_override {
            return Ok(Resolution {
                binary: binary.clone(),
                args: self.args.clone(),
            });
        }

        if let Some(config) = config {
            if let Some(version) = &config.version {
                if !version.is_empty() && *version != self.version {
                    debug!(
                        "{} version override {} replaces {}",
                        self.name, version, self.version
                    );
                    self.version = version.clone();
                    self.cached = None;
                }
                if !config.args.is_empty() {
                    self.args = config.args.clone();
                }
            }
        }

        let binary = match &self.cached {
            Some(binary) => binary.clone(),
            None => {
                let binary = (self.acquire)(&self.version).map_err(|e| {
                    KubecheckError::Acquisition {
                        tool: self.name.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                self.cached = Some(binary.clone());
                binary
            }
        };
        Ok(Resolution {
            binary,
            args: self.args.clone(),
        })
    }
}

/// The full set of plugins a run needs, passed explicitly into the runner.
pub struct PluginSet {
    pub helm: BinaryPlugin,
    pub kubeval: BinaryPlugin,
    pub conftest: BinaryPlugin,
    pub kube_score: BinaryPlugin,
    pub polaris: BinaryPlugin,
}

impl PluginSet {
    /// Plugins at their built-in default versions using the default
    /// locate-in-plugin-dir-or-PATH acquisition.
    pub fn with_default_acquisition() -> Self {
        Self {
            helm: BinaryPlugin::new("helm", HELM_VERSION, install::acquire_fn("helm")),
            kubeval: BinaryPlugin::new("kubeval", KUBEVAL_VERSION, install::acquire_fn("kubeval")),
            conftest: BinaryPlugin::new(
                "conftest",
                CONFTEST_VERSION,
                install::acquire_fn("conftest"),
            ),
            kube_score: BinaryPlugin::new(
                "kube-score",
                KUBE_SCORE_VERSION,
                install::acquire_fn("kube-score"),
            ),
            polaris: BinaryPlugin::new("polaris", POLARIS_VERSION, install::acquire_fn("polaris")),
        }
    }

    /// The plugin backing a test kind.
    pub fn for_kind(&mut self, kind: TestKind) -> &mut BinaryPlugin {
        match kind {
            TestKind::SchemaValidate => &mut self.kubeval,
            TestKind::PolicyTest => &mut self.conftest,
            TestKind::ScoreAudit => &mut self.kube_score,
            TestKind::SecurityAudit => &mut self.polaris,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// An acquisition capability that records every version it is asked
    /// for and returns a version-stamped path.
    fn counting_acquire(calls: Rc<RefCell<Vec<String>>>) -> AcquireFn {
        Box::new(move |version| {
            calls.borrow_mut().push(version.to_string());
            Ok(PathBuf::from(format!("/plugins/tool-{version}")))
        })
    }

    #[test]
    fn first_resolve_acquires_then_caches() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut plugin = BinaryPlugin::new("tool", "1.0.0", counting_acquire(calls.clone()));

        let first = plugin.resolve(None).unwrap();
        let second = plugin.resolve(None).unwrap();

        assert_eq!(first.binary, PathBuf::from("/plugins/tool-1.0.0"));
        assert_eq!(second.binary, first.binary);
        assert_eq!(*calls.borrow(), vec!["1.0.0"]);
    }

    #[test]
    fn version_override_forces_fresh_acquisition() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut plugin = BinaryPlugin::new("tool", "1.0.0", counting_acquire(calls.clone()));

        plugin.resolve(None).unwrap();

        let config = TestConfig {
            version: Some("2.0.0".to_string()),
            args: Vec::new(),
        };
        let resolved = plugin.resolve(Some(&config)).unwrap();

        assert_eq!(resolved.binary, PathBuf::from("/plugins/tool-2.0.0"));
        assert_eq!(*calls.borrow(), vec!["1.0.0", "2.0.0"]);

        // Same version again reuses the new cache entry.
        plugin.resolve(Some(&config)).unwrap();
        assert_eq!(calls.borrow().len(), 2);
    }

    #[test]
    fn config_args_replace_plugin_args_with_version_override() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut plugin = BinaryPlugin::new("tool", "1.0.0", counting_acquire(calls));
        plugin.set_args(vec!["--strict".to_string()]);

        let config = TestConfig {
            version: Some("2.0.0".to_string()),
            args: vec!["--lenient".to_string()],
        };
        let resolved = plugin.resolve(Some(&config)).unwrap();
        assert_eq!(resolved.args, vec!["--lenient"]);
    }

    #[test]
    fn binary_override_never_acquires() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut plugin = BinaryPlugin::new("tool", "1.0.0", counting_acquire(calls.clone()));
        plugin.set_binary_override(PathBuf::from("/usr/local/bin/tool"));

        let resolved = plugin.resolve(None).unwrap();
        assert_eq!(resolved.binary, PathBuf::from("/usr/local/bin/tool"));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn acquisition_failure_names_the_tool() {
        let mut plugin = BinaryPlugin::new(
            "polaris",
            "3.2.1",
            Box::new(|_| {
                Err(KubecheckError::Acquisition {
                    tool: "polaris".to_string(),
                    reason: "boom".to_string(),
                })
            }),
        );

        let err = plugin.resolve(None).unwrap_err();
        assert!(err.to_string().contains("polaris"));
    }
}
