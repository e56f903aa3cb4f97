//! Shared test helpers for integration tests.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tessera_core::config::AnalysisConfig;
use tessera_core::graph::knowledge_graph::KnowledgeGraph;
use tessera_core::languages::TypeScriptProvider;
use tessera_core::pipeline::build_graph;
use walkdir::WalkDir;

// ---------------------------------------------------------------------------
// Fixture path resolution
// ---------------------------------------------------------------------------

/// Resolve `tests/fixtures/{name}` relative to the workspace root.
pub fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir)
        .join("../../tests/fixtures")
        .join(name)
        .canonicalize()
        .unwrap_or_else(|_| {
            Path::new(manifest_dir)
                .join("../../tests/fixtures")
                .join(name)
        })
}

/// Copy a fixture into a fresh temporary directory for tests that edit files.
pub fn copy_fixture(name: &str) -> tempfile::TempDir {
    let source = fixture_path(name);
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    for entry in WalkDir::new(&source) {
        let entry = entry.expect("Failed to walk fixture");
        let rel = entry.path().strip_prefix(&source).unwrap();
        let target = dir.path().join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
    dir
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub const PROJECT_LAYERS: &[&str] = &["controllers", "services", "repositories"];

pub fn config_for(root: &Path) -> AnalysisConfig {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let mut config = AnalysisConfig::for_root(root);
    config.layers = PROJECT_LAYERS.iter().map(|s| s.to_string()).collect();
    config
}

pub struct Built {
    pub kg: KnowledgeGraph,
    pub provider: TypeScriptProvider,
    pub config: AnalysisConfig,
}

pub fn build_at(root: &Path) -> Built {
    let config = config_for(root);
    let provider = TypeScriptProvider::new();
    let kg = build_graph(&config, &provider).expect("Failed to build graph");
    Built {
        kg,
        provider,
        config,
    }
}

pub fn build_fixture(name: &str) -> Built {
    build_at(&fixture_path(name))
}

// ---------------------------------------------------------------------------
// Extractors and invariants
// ---------------------------------------------------------------------------

pub fn file_keys(kg: &KnowledgeGraph) -> Vec<String> {
    kg.files().keys().cloned().collect()
}

pub fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Adjacency keys equal the file keys, and each maps to exactly the edge
/// targets of that file which are themselves files.
pub fn assert_adjacency_pure(kg: &KnowledgeGraph) {
    let adjacency_keys: Vec<&String> = kg.adjacency().keys().collect();
    let files: Vec<&String> = kg.files().keys().collect();
    assert_eq!(adjacency_keys, files, "adjacency keys must match file keys");

    for (from, targets) in kg.adjacency() {
        let expected: BTreeSet<String> = kg
            .edges()
            .iter()
            .filter(|e| &e.from == from && kg.has_file(&e.to))
            .map(|e| e.to.clone())
            .collect();
        assert_eq!(targets, &expected, "adjacency of {from}");
    }
}
