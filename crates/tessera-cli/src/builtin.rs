//! The built-in `core` plugin.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tessera_core::languages::{NodeKind, Walk};
use tessera_core::phases::imports::resolve_specifier;
use tessera_core::rules::RuleCategory;
use tessera_core::{
    BoxError, Finding, GraphQuery, KernelAdapter, KnowledgeGraph, Plugin, Rule, RuleContext,
    Severity,
};

pub const DEFAULT_MAX_COMPLEXITY: u64 = 10;

type SharedCycles = Arc<RwLock<Vec<Vec<String>>>>;

/// Import-cycle and complexity checks. Cycles are computed once per graph in
/// `on_init` and shared with the cycle rule.
#[derive(Default)]
pub struct CorePlugin {
    cycles: SharedCycles,
}

#[async_trait]
impl Plugin for CorePlugin {
    fn name(&self) -> &str {
        "core"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn install(&self, kernel: &mut KernelAdapter<'_>) -> Result<(), BoxError> {
        kernel.register(NoImportCycles {
            cycles: Arc::clone(&self.cycles),
        })?;
        let max = kernel
            .config()
            .get("maxComplexity")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_MAX_COMPLEXITY);
        kernel.register(MaxComplexity { max })?;
        Ok(())
    }

    async fn on_init(&self, graph: &KnowledgeGraph) -> Result<(), BoxError> {
        let cycles = GraphQuery::new(graph).find_cycles();
        tracing::debug!("core: {} import cycles", cycles.len());
        *self.cycles.write().unwrap_or_else(PoisonError::into_inner) = cycles;
        Ok(())
    }

    fn on_error(&self, error: &(dyn std::error::Error + Send + Sync + 'static)) {
        tracing::error!("core plugin: {error}");
    }
}

struct NoImportCycles {
    cycles: SharedCycles,
}

#[async_trait]
impl Rule for NoImportCycles {
    fn name(&self) -> &str {
        "core/no-import-cycles"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn description(&self) -> &str {
        "Files must not import each other in a cycle"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Architecture
    }

    async fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, BoxError> {
        let key = ctx.file().path.as_str();
        let cycles = self
            .cycles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut findings = Vec::new();
        for cycle in &cycles {
            let Some(pos) = cycle.iter().position(|f| f == key) else {
                continue;
            };
            let Some(next) = cycle.get(pos + 1) else {
                continue;
            };
            let message = format!("Import cycle: {}", cycle.join(" -> "));
            let mut finding = None;
            ctx.walk(|kind, node| {
                if kind == NodeKind::Program {
                    return Walk::Continue;
                }
                if kind != NodeKind::ImportStatement && kind != NodeKind::ExportStatement {
                    return Walk::SkipChildren;
                }
                let target = node
                    .child_by_field_name("source")
                    .map(|s| ctx.text(s).trim_matches(|c| c == '"' || c == '\'').to_string())
                    .and_then(|spec| resolve_specifier(key, &spec));
                if target.as_deref() == Some(next.as_str()) {
                    finding = Some(ctx.finding(node, message.clone()));
                    return Walk::Stop;
                }
                Walk::SkipChildren
            });
            findings.push(finding.unwrap_or_else(|| Finding::new(key, 1, 1, message)));
        }
        Ok(findings)
    }
}

struct MaxComplexity {
    max: u64,
}

#[async_trait]
impl Rule for MaxComplexity {
    fn name(&self) -> &str {
        "core/max-complexity"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn description(&self) -> &str {
        "Functions must stay under the configured cyclomatic complexity"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Complexity
    }

    async fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, BoxError> {
        Ok(ctx
            .file()
            .functions
            .iter()
            .filter(|f| u64::from(f.complexity) > self.max)
            .map(|f| {
                Finding::new(
                    f.file.clone(),
                    f.start_line,
                    1,
                    format!(
                        "{} has complexity {} (max {})",
                        f.name, f.complexity, self.max
                    ),
                )
            })
            .collect())
    }
}
