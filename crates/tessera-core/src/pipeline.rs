//! Full graph build: discover, parse, link, with per-phase timing.

use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::graph::knowledge_graph::KnowledgeGraph;
use crate::languages::SyntaxProvider;
use crate::phases::parsing::{extract_file, FileExtraction};
use crate::phases::structure::{is_declaration_key, normalize_key, PathPolicy};

/// Phase labels for progress reporting.
pub const PHASE_LABELS: &[(&str, &str)] = &[
    ("discover", "Discovering source files"),
    ("parse", "Parsing source files"),
    ("link", "Linking imports"),
];

/// Progress callback type: (phase_name, label).
pub type ProgressCallback<'a> = Box<dyn FnMut(&str, &str) + 'a>;

fn report(progress: &mut Option<ProgressCallback<'_>>, name: &str) {
    if let Some(cb) = progress {
        let label = PHASE_LABELS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, l)| *l)
            .unwrap_or(name);
        cb(name, label);
    }
}

/// Retained source files as (key, absolute path), sorted by key.
pub fn discover_sources(
    config: &AnalysisConfig,
    provider: &dyn SyntaxProvider,
) -> Result<Vec<(String, PathBuf)>> {
    let root = config.root();
    let policy = PathPolicy::new(root, &config.include, &config.exclude)?;
    let mut sources: Vec<(String, PathBuf)> = provider
        .source_paths(&config.compiler_config_path())?
        .into_iter()
        .filter_map(|path| {
            let key = normalize_key(root, &path);
            if is_declaration_key(&key) || !policy.retains(&key) {
                log::debug!("excluded {key}");
                return None;
            }
            Some((key, path))
        })
        .collect();
    sources.sort();
    sources.dedup_by(|a, b| a.0 == b.0);
    Ok(sources)
}

/// Build a graph from scratch.
pub fn build_graph(config: &AnalysisConfig, provider: &dyn SyntaxProvider) -> Result<KnowledgeGraph> {
    build_graph_with_progress(config, provider, None)
}

/// Build a graph from scratch, reporting each phase to `progress`.
pub fn build_graph_with_progress(
    config: &AnalysisConfig,
    provider: &dyn SyntaxProvider,
    mut progress: Option<ProgressCallback<'_>>,
) -> Result<KnowledgeGraph> {
    let total_start = Instant::now();

    report(&mut progress, "discover");
    let start = Instant::now();
    let sources = discover_sources(config, provider)?;
    log::debug!(
        "discover: {} files in {:.1}ms",
        sources.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    report(&mut progress, "parse");
    let start = Instant::now();
    let layers = &config.layers;
    let extractions: Vec<Option<FileExtraction>> = sources
        .par_iter()
        .map(|(key, path)| match provider.tree(path) {
            Some(tree) => Some(extract_file(&tree, key, layers)),
            None => {
                log::debug!("skipped {key}: no syntax tree");
                None
            }
        })
        .collect();
    log::debug!(
        "parse: {:.1}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );

    report(&mut progress, "link");
    let start = Instant::now();
    let mut graph = KnowledgeGraph::new();
    graph.set_layers(config.layers.clone());
    for extraction in extractions.into_iter().flatten() {
        graph.insert_extraction(extraction);
    }
    graph.rebuild_derived();
    log::debug!("link: {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);

    log::info!(
        "built graph: {} files, {} symbols, {} edges in {:.1}ms",
        graph.file_count(),
        graph.symbol_count(),
        graph.edge_count(),
        total_start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(graph)
}
