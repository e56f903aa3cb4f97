//! Tessera CLI: import graph, cycle detection and rule checks for TypeScript projects.

mod builtin;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use tessera_core::graph::cache;
use tessera_core::phases::structure::normalize_key;
use tessera_core::pipeline::{self, ProgressCallback};
use tessera_core::{
    update_graph, AnalysisConfig, GraphQuery, KnowledgeGraph, PluginKernel, RuleEngine,
    RunOptions, RunResult, Severity, TypeScriptProvider,
};

use builtin::CorePlugin;

#[derive(Parser)]
#[command(
    name = "tessera",
    version,
    about = "Tessera - Map and check the import graph of a TypeScript project"
)]
struct Cli {
    #[command(flatten)]
    project: ProjectArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ProjectArgs {
    /// Project root
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Compiler configuration, relative to the root
    #[arg(long, global = true, default_value = "tsconfig.json")]
    tsconfig: PathBuf,

    /// Glob of files to include (repeatable)
    #[arg(long, global = true)]
    include: Vec<String>,

    /// Additional glob patterns to exclude
    #[arg(long, global = true)]
    exclude: Vec<String>,

    /// Architectural layer names, matched against file paths in order
    #[arg(long, global = true, value_delimiter = ',')]
    layers: Vec<String>,

    /// Do not read or write the graph cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Emit JSON instead of styled text
    #[arg(long, global = true)]
    json: bool,

    /// Show debug logging and phase timings
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every rule and exit non-zero when a blocking finding is reported
    Check {
        /// Only re-scan and check these files (e.g. staged files)
        #[arg(long, num_args = 1..)]
        files: Vec<PathBuf>,

        /// Rule names to skip
        #[arg(long = "ignore-rule")]
        ignore_rules: Vec<String>,

        /// Globs of files to skip
        #[arg(long = "ignore-file")]
        ignore_files: Vec<String>,

        /// Severities that fail the run
        #[arg(long = "block-on", value_delimiter = ',', default_values = ["critical", "error"])]
        block_on: Vec<Severity>,

        /// Complexity threshold for core/max-complexity
        #[arg(long, default_value_t = builtin::DEFAULT_MAX_COMPLEXITY)]
        max_complexity: u64,
    },
    /// Print graph statistics
    Stats,
    /// List import cycles
    Cycles,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.project.verbose);

    let mut config = project_config(&cli.project);
    let provider = TypeScriptProvider::new();

    match cli.command {
        Commands::Check {
            files,
            ignore_rules,
            ignore_files,
            block_on,
            max_complexity,
        } => {
            config.ignored_rules = ignore_rules;
            config.ignored_files = ignore_files;
            config.blocking_severities = block_on;
            config.plugins.insert(
                "core".to_string(),
                serde_json::json!({ "maxComplexity": max_complexity }),
            );
            let graph = load_graph(&config, &provider, &files, !cli.project.json);
            let blocked = run_check(&config, &provider, &graph, &files, cli.project.json).await;
            if blocked {
                std::process::exit(1);
            }
        }
        Commands::Stats => {
            let graph = load_graph(&config, &provider, &[], !cli.project.json);
            print_stats(&config, &graph, cli.project.json);
        }
        Commands::Cycles => {
            let graph = load_graph(&config, &provider, &[], !cli.project.json);
            print_cycles(&graph, cli.project.json);
        }
    }
}

/// `--verbose` turns on debug output for Tessera itself; otherwise
/// `RUST_LOG` is honoured, defaulting to warnings.
fn filter_directive(verbose: bool, env: Option<String>) -> String {
    match env {
        _ if verbose => "warn,tessera=debug,tessera_core=debug".to_string(),
        Some(env) if !env.trim().is_empty() => env,
        _ => "warn".to_string(),
    }
}

/// Log to stderr. The subscriber also installs the `log` bridge, so the
/// core's `log` records arrive here.
fn init_tracing(verbose: bool) {
    let directive = filter_directive(verbose, std::env::var(EnvFilter::DEFAULT_ENV).ok());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
}

fn project_config(args: &ProjectArgs) -> AnalysisConfig {
    let root = args.root.canonicalize().unwrap_or_else(|_| args.root.clone());
    let mut config = AnalysisConfig::for_root(root);
    config.compiler_config = args.tsconfig.clone();
    config.include = args.include.clone();
    config.exclude.extend(args.exclude.iter().cloned());
    config.layers = args.layers.clone();
    config.use_cache = !args.no_cache;
    config
}

fn fail(message: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("{} {message}: {err}", style("error:").red().bold());
    std::process::exit(2);
}

/// Cached graph patched with `changed`, or a fresh build.
fn load_graph(
    config: &AnalysisConfig,
    provider: &TypeScriptProvider,
    changed: &[PathBuf],
    show_progress: bool,
) -> KnowledgeGraph {
    let cached = if config.use_cache && !changed.is_empty() {
        cache::load(config.root())
    } else {
        None
    };

    let graph = match cached {
        Some(mut graph) => {
            if let Err(e) = update_graph(&mut graph, changed, config, provider) {
                fail("Update failed", e);
            }
            graph
        }
        None => build_with_progress(config, provider, show_progress),
    };

    if config.use_cache {
        if let Err(e) = cache::save(&graph, config.root()) {
            tracing::warn!("could not write graph cache: {e}");
        }
    }
    graph
}

fn build_with_progress(
    config: &AnalysisConfig,
    provider: &TypeScriptProvider,
    show_progress: bool,
) -> KnowledgeGraph {
    let start = Instant::now();
    let pb = if show_progress {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    };
    if let Ok(spinner) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(spinner.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message("Initialising...");
    pb.enable_steady_tick(std::time::Duration::from_millis(80));

    let progress: ProgressCallback = {
        let pb = pb.clone();
        Box::new(move |_name, label| {
            pb.set_message(label.to_string());
        })
    };

    let graph = match pipeline::build_graph_with_progress(config, provider, Some(progress)) {
        Ok(graph) => graph,
        Err(e) => {
            pb.finish_and_clear();
            fail("Analysis failed", e);
        }
    };
    pb.finish_and_clear();
    tracing::debug!(
        "graph built in {:.1}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    graph
}

fn target_keys(root: &Path, files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|f| {
            let abs = if f.is_absolute() { f.clone() } else { root.join(f) };
            normalize_key(root, &abs)
        })
        .collect()
}

async fn run_check(
    config: &AnalysisConfig,
    provider: &TypeScriptProvider,
    graph: &KnowledgeGraph,
    files: &[PathBuf],
    json: bool,
) -> bool {
    let mut kernel = PluginKernel::new();
    let core_config = config
        .plugins
        .get("core")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    if let Err(e) = kernel.install(Arc::new(CorePlugin::default()), core_config) {
        fail("Plugin install failed", e);
    }
    let report = kernel.init_plugins(graph).await;
    for name in &report.failed {
        tracing::warn!("plugin {name} did not initialise");
    }

    let options = RunOptions::from_config(config).with_plugin_configs(kernel.plugin_configs());
    let engine = match RuleEngine::new(graph, provider, options) {
        Ok(engine) => engine,
        Err(e) => fail("Invalid options", e),
    };
    let result = if files.is_empty() {
        engine.run_all(kernel.rules()).await
    } else {
        engine
            .run(kernel.rules(), &target_keys(config.root(), files))
            .await
    };

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(out) => println!("{out}"),
            Err(e) => fail("Could not serialize results", e),
        }
    } else {
        print_findings(&result);
    }
    result.blocked
}

fn severity_label(severity: Severity) -> console::StyledObject<&'static str> {
    match severity {
        Severity::Critical => style("critical").red().bold(),
        Severity::Error => style("error").red(),
        Severity::Warning => style("warning").yellow(),
        Severity::Info => style("info").blue(),
    }
}

fn print_findings(result: &RunResult) {
    for (file, findings) in &result.by_file {
        println!("\n{}", style(file).underlined());
        for finding in findings {
            println!(
                "  {:>4}:{:<3} {:<10} {}  {}",
                finding.line,
                finding.column,
                severity_label(finding.effective_severity()),
                finding.message,
                style(finding.rule.as_deref().unwrap_or("")).dim()
            );
        }
    }

    let stats = &result.stats;
    let counts: Vec<String> = Severity::ALL
        .iter()
        .rev()
        .filter(|sev| result.count(**sev) > 0)
        .map(|sev| format!("{} {}", result.count(*sev), sev))
        .collect();
    let mark = if result.blocked {
        style("✗").red().bold()
    } else {
        style("✓").green().bold()
    };
    println!(
        "\n{mark}  {} findings{} in {} files, {} suppressed, {:.1}ms",
        stats.findings,
        if counts.is_empty() {
            String::new()
        } else {
            format!(" ({})", counts.join(", "))
        },
        stats.files_analyzed,
        stats.suppressed,
        stats.duration_ms
    );
    if stats.rule_failures > 0 {
        println!(
            "   {} rule failures",
            style(stats.rule_failures).yellow()
        );
    }
}

fn print_stats(config: &AnalysisConfig, graph: &KnowledgeGraph, json: bool) {
    let stats = GraphQuery::new(graph).stats();
    if json {
        match serde_json::to_string_pretty(&stats) {
            Ok(out) => println!("{out}"),
            Err(e) => fail("Could not serialize stats", e),
        }
        return;
    }

    println!(
        "\n{}  Tessera: {}",
        style("✓").green().bold(),
        style(
            config
                .root()
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        )
        .bold()
    );
    println!("  {:<14} {}", "Files:", stats.file_count);
    println!("  {:<14} {}", "Symbols:", stats.symbol_count);
    println!("  {:<14} {}", "Imports:", stats.edge_count);
    println!("  {:<14} {}", "Functions:", stats.function_count);
    println!("  {:<14} {}", "Lines:", stats.total_lines);
    println!("  {:<14} {:.2}", "Complexity:", stats.average_complexity);

    if !stats.files_by_role.is_empty() {
        println!("\n  Roles:");
        for (role, count) in &stats.files_by_role {
            println!("    {:<14} {}", role.as_str(), count);
        }
    }
    if !stats.files_by_layer.is_empty() {
        println!("\n  Layers:");
        for (layer, count) in &stats.files_by_layer {
            println!("    {:<14} {}", layer, count);
        }
    }
}

fn print_cycles(graph: &KnowledgeGraph, json: bool) {
    let cycles = GraphQuery::new(graph).find_cycles();
    if json {
        match serde_json::to_string_pretty(&cycles) {
            Ok(out) => println!("{out}"),
            Err(e) => fail("Could not serialize cycles", e),
        }
        return;
    }
    if cycles.is_empty() {
        println!("{}  No import cycles", style("✓").green().bold());
        return;
    }
    println!(
        "{}  {} import cycles",
        style("✗").red().bold(),
        cycles.len()
    );
    for cycle in &cycles {
        println!("  {}", cycle.join(&format!(" {} ", style("->").dim())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_flag_overrides_the_environment() {
        let directive = filter_directive(true, Some("error".to_string()));
        assert_eq!(directive, "warn,tessera=debug,tessera_core=debug");
        assert!(EnvFilter::try_new(&directive).is_ok());
    }

    #[test]
    fn environment_filter_applies_without_verbose() {
        assert_eq!(filter_directive(false, Some("tessera_core=trace".to_string())), "tessera_core=trace");
        assert_eq!(filter_directive(false, Some("  ".to_string())), "warn");
        assert_eq!(filter_directive(false, None), "warn");
    }
}
