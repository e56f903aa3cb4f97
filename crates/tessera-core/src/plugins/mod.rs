//! Plugin kernel: installs plugins, collects the rules they register and
//! drives their lifecycle hooks.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;

use crate::error::{BoxError, Result, TesseraError};
use crate::graph::knowledge_graph::KnowledgeGraph;
use crate::rules::Rule;

/// A bundle of rules with optional lifecycle hooks.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.0.0"
    }

    /// Plugins that must be installed first.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Register rules through `kernel`. An error leaves the plugin uninstalled.
    fn install(&self, kernel: &mut KernelAdapter<'_>) -> std::result::Result<(), BoxError>;

    /// Called with a freshly built graph.
    async fn on_init(&self, _graph: &KnowledgeGraph) -> std::result::Result<(), BoxError> {
        Ok(())
    }

    /// Called before the plugin is removed.
    async fn on_destroy(&self) -> std::result::Result<(), BoxError> {
        Ok(())
    }

    /// Receives failures of this plugin's own install and lifecycle hooks.
    fn on_error(&self, _error: &(dyn std::error::Error + Send + Sync + 'static)) {}
}

/// The kernel as seen from inside one plugin's `install`.
pub struct KernelAdapter<'k> {
    plugin_name: &'k str,
    config: &'k Value,
    registered: &'k [Arc<dyn Rule>],
    staged: Vec<Arc<dyn Rule>>,
}

impl<'k> KernelAdapter<'k> {
    pub fn plugin_name(&self) -> &str {
        self.plugin_name
    }

    pub fn config(&self) -> &Value {
        self.config
    }

    /// Add a rule. Names must be unique across every installed plugin.
    pub fn register_rule(&mut self, rule: Arc<dyn Rule>) -> Result<()> {
        let name = rule.name();
        let taken = self
            .registered
            .iter()
            .chain(self.staged.iter())
            .any(|existing| existing.name() == name);
        if taken {
            return Err(TesseraError::DuplicateRule(name.to_string()));
        }
        if !name.starts_with(&format!("{}/", self.plugin_name)) {
            log::warn!(
                "rule {name} is not prefixed with its plugin name `{}`",
                self.plugin_name
            );
        }
        self.staged.push(rule);
        Ok(())
    }

    pub fn register(&mut self, rule: impl Rule + 'static) -> Result<()> {
        self.register_rule(Arc::new(rule))
    }
}

struct InstalledPlugin {
    plugin: Arc<dyn Plugin>,
    config: Value,
    /// Names of the rules this plugin registered.
    rule_names: Vec<String>,
}

/// Which plugins initialised cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub initialized: Vec<String>,
    pub failed: Vec<String>,
}

/// Owns installed plugins (in install order) and their rules (in registration order).
#[derive(Default)]
pub struct PluginKernel {
    plugins: Vec<InstalledPlugin>,
    rules: Vec<Arc<dyn Rule>>,
}

impl PluginKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, plugin: Arc<dyn Plugin>, config: Value) -> Result<()> {
        let name = plugin.name().to_string();
        if self.has_plugin(&name) {
            return Err(TesseraError::DuplicatePlugin(name));
        }
        if let Some(dependency) = plugin
            .dependencies()
            .into_iter()
            .find(|dep| !self.has_plugin(dep))
        {
            return Err(TesseraError::MissingDependency {
                plugin: name,
                dependency,
            });
        }

        let mut adapter = KernelAdapter {
            plugin_name: &name,
            config: &config,
            registered: &self.rules,
            staged: Vec::new(),
        };
        let outcome = plugin.install(&mut adapter);
        let staged = adapter.staged;

        if let Err(source) = outcome {
            plugin.on_error(source.as_ref());
            return Err(TesseraError::PluginInstall {
                plugin: name,
                source,
            });
        }

        log::debug!(
            "installed plugin {name} {} with {} rules",
            plugin.version(),
            staged.len()
        );
        let rule_names = staged.iter().map(|rule| rule.name().to_string()).collect();
        self.rules.extend(staged);
        self.plugins.push(InstalledPlugin {
            plugin,
            config,
            rule_names,
        });
        Ok(())
    }

    /// Tear down and remove a plugin and every rule it registered.
    pub async fn uninstall(&mut self, name: &str) -> Result<()> {
        let idx = self
            .plugins
            .iter()
            .position(|p| p.plugin.name() == name)
            .ok_or_else(|| TesseraError::UnknownPlugin(name.to_string()))?;
        if let Some(dependent) = self
            .plugins
            .iter()
            .find(|p| p.plugin.dependencies().iter().any(|dep| dep == name))
        {
            return Err(TesseraError::PluginInUse {
                plugin: name.to_string(),
                dependent: dependent.plugin.name().to_string(),
            });
        }

        let plugin = Arc::clone(&self.plugins[idx].plugin);
        if let Err(err) = plugin.on_destroy().await {
            log::warn!("plugin {name} failed to tear down: {err}");
            plugin.on_error(err.as_ref());
        }

        let removed = self.plugins.remove(idx);
        self.rules
            .retain(|rule| !removed.rule_names.iter().any(|owned| owned == rule.name()));
        Ok(())
    }

    /// Run every plugin's init hook in install order. Failures are reported to
    /// the failing plugin's error hook and do not stop the others.
    pub async fn init_plugins(&self, graph: &KnowledgeGraph) -> InitReport {
        let mut report = InitReport::default();
        for installed in &self.plugins {
            let plugin = &installed.plugin;
            let outcome = match AssertUnwindSafe(plugin.on_init(graph)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => Err(BoxError::from(format!("plugin {} panicked during init", plugin.name()))),
            };
            match outcome {
                Ok(()) => report.initialized.push(plugin.name().to_string()),
                Err(err) => {
                    log::warn!("plugin {} failed to initialise: {err}", plugin.name());
                    plugin.on_error(err.as_ref());
                    report.failed.push(plugin.name().to_string());
                }
            }
        }
        report
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.iter().find(|rule| rule.name() == name)
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.plugin.name()).collect()
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.plugin.name() == name)
    }

    /// Configuration each plugin was installed with, keyed by plugin name.
    pub fn plugin_configs(&self) -> BTreeMap<String, Value> {
        self.plugins
            .iter()
            .map(|p| (p.plugin.name().to_string(), p.config.clone()))
            .collect()
    }
}
