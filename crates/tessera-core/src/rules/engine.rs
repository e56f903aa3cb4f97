//! Runs every registered rule over target files, applying suppression and
//! the blocking policy.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use ignore::gitignore::Gitignore;
use serde::Serialize;
use serde_json::Value;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::graph::knowledge_graph::KnowledgeGraph;
use crate::languages::SyntaxProvider;
use crate::phases::structure::build_matcher;
use crate::rules::context::RuleContext;
use crate::rules::suppression::{is_suppressed, SuppressionParser};
use crate::rules::{Finding, Rule, Severity};

static NO_CONFIG: Value = Value::Null;

/// Policy for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub root: PathBuf,
    /// Plugin name -> configuration handed to that plugin's rules.
    pub plugin_configs: BTreeMap<String, Value>,
    pub ignored_rules: BTreeSet<String>,
    /// Gitignore-style globs over file keys.
    pub ignored_files: Vec<String>,
    pub blocking_severities: Vec<Severity>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl RunOptions {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            root: config.root.clone(),
            plugin_configs: config.plugins.clone(),
            ignored_rules: config.ignored_rules.iter().cloned().collect(),
            ignored_files: config.ignored_files.clone(),
            blocking_severities: config.blocking_severities.clone(),
        }
    }

    pub fn with_plugin_configs(mut self, configs: BTreeMap<String, Value>) -> Self {
        self.plugin_configs.extend(configs);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub files_analyzed: usize,
    pub files_skipped: usize,
    pub rules_executed: usize,
    pub rule_failures: usize,
    pub findings: usize,
    pub suppressed: usize,
    pub duration_ms: f64,
}

/// Outcome of a run: findings grouped two ways, stats and the gate verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub by_severity: BTreeMap<Severity, Vec<Finding>>,
    pub by_file: BTreeMap<String, Vec<Finding>>,
    pub stats: RunStats,
    pub blocked: bool,
}

impl RunResult {
    /// Partition `findings` and decide whether any severity blocks.
    pub fn from_findings(findings: Vec<Finding>, blocking: &[Severity], stats: RunStats) -> Self {
        let mut result = RunResult {
            stats,
            ..Default::default()
        };
        result.stats.findings = findings.len();
        for finding in findings {
            let severity = finding.effective_severity();
            result.blocked |= blocking.contains(&severity);
            result
                .by_severity
                .entry(severity)
                .or_default()
                .push(finding.clone());
            result
                .by_file
                .entry(finding.file.clone())
                .or_default()
                .push(finding);
        }
        result
    }

    /// Every finding, grouped by file in key order.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.by_file.values().flatten()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).map_or(0, Vec::len)
    }
}

pub struct RuleEngine<'a> {
    graph: &'a KnowledgeGraph,
    provider: &'a dyn SyntaxProvider,
    options: RunOptions,
    ignored_files: Gitignore,
    parser: SuppressionParser,
}

impl<'a> RuleEngine<'a> {
    /// Fails only when an ignored-file glob is invalid.
    pub fn new(
        graph: &'a KnowledgeGraph,
        provider: &'a dyn SyntaxProvider,
        options: RunOptions,
    ) -> Result<Self> {
        let ignored_files = build_matcher(&options.root, &options.ignored_files)?;
        Ok(Self {
            graph,
            provider,
            options,
            ignored_files,
            parser: SuppressionParser::new(),
        })
    }

    pub fn with_suppression_parser(mut self, parser: SuppressionParser) -> Self {
        self.parser = parser;
        self
    }

    fn plugin_config(&self, rule_name: &str) -> &Value {
        let plugin = rule_name.split_once('/').map_or(rule_name, |(plugin, _)| plugin);
        self.options.plugin_configs.get(plugin).unwrap_or(&NO_CONFIG)
    }

    fn is_ignored_file(&self, key: &str) -> bool {
        self.ignored_files
            .matched_path_or_any_parents(key, false)
            .is_ignore()
    }

    /// Run over every file in the graph.
    pub async fn run_all(&self, rules: &[Arc<dyn Rule>]) -> RunResult {
        let targets: Vec<String> = self.graph.files().keys().cloned().collect();
        self.run(rules, &targets).await
    }

    /// Run `rules` over `targets` (file keys), one rule and one file at a time.
    pub async fn run(&self, rules: &[Arc<dyn Rule>], targets: &[String]) -> RunResult {
        let start = Instant::now();
        let mut stats = RunStats::default();
        let mut findings = Vec::new();

        for target in targets {
            let Some(file) = self.graph.file(target) else {
                log::debug!("skipped {target}: not in graph");
                stats.files_skipped += 1;
                continue;
            };
            if self.is_ignored_file(target) {
                log::debug!("skipped {target}: ignored");
                stats.files_skipped += 1;
                continue;
            }
            let Some(tree) = self.provider.tree(&self.options.root.join(target)) else {
                log::warn!("skipped {target}: no syntax tree");
                stats.files_skipped += 1;
                continue;
            };
            stats.files_analyzed += 1;
            let directives = self.parser.parse(tree.source());

            for rule in rules {
                let name = rule.name();
                if self.options.ignored_rules.contains(name) {
                    continue;
                }
                let ctx = RuleContext::new(file, &tree, self.graph, self.plugin_config(name));
                stats.rules_executed += 1;

                let failure = match AssertUnwindSafe(rule.check(&ctx)).catch_unwind().await {
                    Ok(Ok(emitted)) => {
                        for mut finding in emitted {
                            let rule_name = finding.rule.get_or_insert_with(|| name.to_string());
                            if is_suppressed(&directives, rule_name, finding.line) {
                                stats.suppressed += 1;
                                continue;
                            }
                            finding.severity.get_or_insert(rule.severity());
                            findings.push(finding);
                        }
                        None
                    }
                    Ok(Err(err)) => Some(err.to_string()),
                    Err(panic) => Some(panic_message(panic.as_ref())),
                };

                if let Some(error) = failure {
                    log::warn!("rule {name} failed on {target}: {error}");
                    stats.rule_failures += 1;
                    findings.push(
                        Finding::new(target.clone(), 1, 1, format!("Rule {name} failed: {error}"))
                            .with_rule(name)
                            .with_severity(Severity::Warning),
                    );
                }
            }
        }

        stats.duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let result = RunResult::from_findings(findings, &self.options.blocking_severities, stats);
        log::info!(
            "ran {} rules over {} files: {} findings, {} suppressed{}",
            rules.len(),
            result.stats.files_analyzed,
            result.stats.findings,
            result.stats.suppressed,
            if result.blocked { " (blocked)" } else { "" }
        );
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panicked".to_string()
    }
}
