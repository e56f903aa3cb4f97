//! Rule execution over the fixture project: stamping, suppression,
//! blocking and failure isolation.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::*;
use pretty_assertions::assert_eq;
use tessera_core::languages::KindAlias;
use tessera_core::rules::{Finding, Rule, RuleCategory, RuleContext, RuleEngine, RunOptions, Severity};
use tessera_core::BoxError;

/// Reports every function above `maxComplexity` from its plugin config.
struct MaxComplexity;

#[async_trait]
impl Rule for MaxComplexity {
    fn name(&self) -> &str {
        "core/max-complexity"
    }
    fn severity(&self) -> Severity {
        Severity::Warning
    }
    fn category(&self) -> RuleCategory {
        RuleCategory::Complexity
    }
    async fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, BoxError> {
        let max = ctx.config()["maxComplexity"].as_u64().unwrap_or(10) as u32;
        Ok(ctx
            .file()
            .functions
            .iter()
            .filter(|f| f.complexity > max)
            .map(|f| Finding::new(f.file.clone(), f.start_line, 1, format!("{} too complex", f.name)))
            .collect())
    }
}

/// Flags async functions, after yielding once.
struct AsyncFunctions;

#[async_trait]
impl Rule for AsyncFunctions {
    fn name(&self) -> &str {
        "style/async"
    }
    fn severity(&self) -> Severity {
        Severity::Info
    }
    fn category(&self) -> RuleCategory {
        RuleCategory::Style
    }
    async fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, BoxError> {
        let mut nodes = Vec::new();
        ctx.walk_alias(KindAlias::FunctionLike, |node| {
            if ctx.is_async(node) {
                nodes.push(ctx.finding(node, "async function"));
            }
        });
        tokio::task::yield_now().await;
        Ok(nodes)
    }
}

struct Failing;

#[async_trait]
impl Rule for Failing {
    fn name(&self) -> &str {
        "broken/fails"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn category(&self) -> RuleCategory {
        RuleCategory::Correctness
    }
    async fn check(&self, _ctx: &RuleContext<'_>) -> Result<Vec<Finding>, BoxError> {
        Err("cannot read tree".into())
    }
}

struct Panicking;

#[async_trait]
impl Rule for Panicking {
    fn name(&self) -> &str {
        "broken/panics"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn category(&self) -> RuleCategory {
        RuleCategory::Correctness
    }
    async fn check(&self, _ctx: &RuleContext<'_>) -> Result<Vec<Finding>, BoxError> {
        panic!("index out of bounds");
    }
}

/// Counts calls and emits one critical finding per file.
#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
}

#[async_trait]
impl Rule for Counting {
    fn name(&self) -> &str {
        "count/every-file"
    }
    fn severity(&self) -> Severity {
        Severity::Info
    }
    fn category(&self) -> RuleCategory {
        RuleCategory::Style
    }
    async fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Finding::new(ctx.file().path.clone(), 1, 1, "seen").with_severity(Severity::Critical)])
    }
}

fn options(b: &Built, max_complexity: u64) -> RunOptions {
    let mut options = RunOptions::from_config(&b.config);
    options
        .plugin_configs
        .insert("core".to_string(), serde_json::json!({ "maxComplexity": max_complexity }));
    options
}

fn targets(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn stamps_rule_name_and_severity() {
    let b = build_fixture("ts_project");
    let engine = RuleEngine::new(&b.kg, &b.provider, options(&b, 2)).unwrap();
    let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(MaxComplexity)];

    let result = engine
        .run(&rules, &targets(&["src/repositories/user.repository.ts"]))
        .await;

    let findings: Vec<&Finding> = result.findings().collect();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].rule.as_deref(), Some("core/max-complexity"));
    assert_eq!(findings[0].severity, Some(Severity::Warning));
    assert_eq!(findings[0].line, 6);
    assert!(!result.blocked);
}

#[tokio::test]
async fn disable_next_line_suppresses_one_finding() {
    let b = build_fixture("ts_project");
    let engine = RuleEngine::new(&b.kg, &b.provider, options(&b, 5)).unwrap();
    let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(MaxComplexity)];

    let result = engine.run(&rules, &targets(&["src/utils/complex.ts"])).await;

    let messages: Vec<&str> = result.findings().map(|f| f.message.as_str()).collect();
    assert_eq!(messages, vec!["score too complex"]);
    assert_eq!(result.stats.suppressed, 1);
    assert_eq!(result.stats.findings, 1);
}

#[tokio::test]
async fn rule_failures_become_single_warnings() {
    let b = build_fixture("ts_project");
    let engine = RuleEngine::new(&b.kg, &b.provider, options(&b, 10)).unwrap();
    let counting = Arc::new(Counting::default());
    let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(Failing), Arc::new(Panicking), counting.clone()];

    let result = engine
        .run(&rules, &targets(&["src/utils/format.ts", "src/types/user.ts"]))
        .await;

    assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.stats.rule_failures, 4);
    assert_eq!(result.stats.rules_executed, 6);

    let format = &result.by_file["src/utils/format.ts"];
    let summary: Vec<(Option<&str>, Option<Severity>)> = format
        .iter()
        .map(|f| (f.rule.as_deref(), f.severity))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Some("broken/fails"), Some(Severity::Warning)),
            (Some("broken/panics"), Some(Severity::Warning)),
            (Some("count/every-file"), Some(Severity::Critical)),
        ]
    );
    assert!(format[0].message.contains("broken/fails"));
    assert!(format[0].message.contains("cannot read tree"));
    assert!(format[1].message.contains("index out of bounds"));
    assert_eq!((format[0].line, format[0].column), (1, 1));
    // the explicit critical severity blocks, the synthetic warnings do not
    assert!(result.blocked);
    assert_eq!(result.count(Severity::Warning), 4);
}

#[tokio::test]
async fn blocking_follows_configured_severities() {
    let b = build_fixture("ts_project");
    let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(Counting::default())];
    let target = targets(&["src/index.ts"]);

    let engine = RuleEngine::new(&b.kg, &b.provider, options(&b, 10)).unwrap();
    assert!(engine.run(&rules, &target).await.blocked);

    let mut relaxed = options(&b, 10);
    relaxed.blocking_severities = vec![Severity::Error];
    let engine = RuleEngine::new(&b.kg, &b.provider, relaxed).unwrap();
    assert!(!engine.run(&rules, &target).await.blocked);
}

#[tokio::test]
async fn ignored_rules_and_files_are_skipped() {
    let b = build_fixture("ts_project");
    let counting = Arc::new(Counting::default());
    let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(Failing), counting.clone()];

    let mut opts = options(&b, 10);
    opts.ignored_rules.insert("broken/fails".to_string());
    opts.ignored_files.push("src/utils/**".to_string());
    let engine = RuleEngine::new(&b.kg, &b.provider, opts).unwrap();

    let result = engine
        .run(
            &rules,
            &targets(&["src/utils/format.ts", "src/index.ts", "src/missing.ts"]),
        )
        .await;

    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.stats.rule_failures, 0);
    assert_eq!(result.stats.files_analyzed, 1);
    assert_eq!(result.stats.files_skipped, 2);
    assert_eq!(result.by_file.keys().collect::<Vec<_>>(), vec!["src/index.ts"]);
}

#[tokio::test]
async fn async_rules_are_awaited_with_positions() {
    let b = build_fixture("ts_project");
    let engine = RuleEngine::new(&b.kg, &b.provider, options(&b, 10)).unwrap();
    let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(AsyncFunctions)];

    let result = engine.run_all(&rules).await;

    let positions: Vec<(&str, usize, usize)> = result
        .findings()
        .map(|f| (f.file.as_str(), f.line, f.column))
        .collect();
    assert_eq!(
        positions,
        vec![
            ("src/controllers/user.controller.ts", 7, 3),
            ("src/repositories/user.repository.ts", 6, 3),
            ("src/services/user.service.ts", 8, 3),
        ]
    );
    assert_eq!(result.stats.files_analyzed, 9);
    assert_eq!(result.count(Severity::Info), 3);
}
