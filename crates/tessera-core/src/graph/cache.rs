//! Versioned JSON snapshot of a [`KnowledgeGraph`].
//!
//! Any problem reading a snapshot back (missing file, bad JSON, different
//! crate version) is a cache miss, never an error.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::{ConventionPattern, DependencyEdge, FileNode, Symbol};
use crate::error::Result;
use crate::graph::knowledge_graph::KnowledgeGraph;

pub const CACHE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Cache location relative to the project root.
pub const CACHE_PATH: &str = ".tessera/graph-cache.json";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheDocument {
    version: String,
    timestamp: String,
    files: Vec<(String, FileNode)>,
    symbols: Vec<(String, Symbol)>,
    edges: Vec<DependencyEdge>,
    layers: Vec<String>,
    patterns: Vec<ConventionPattern>,
    adjacency: Vec<(String, Vec<String>)>,
}

pub fn cache_path(root: &Path) -> PathBuf {
    root.join(CACHE_PATH)
}

pub fn serialize(graph: &KnowledgeGraph) -> Result<String> {
    let document = CacheDocument {
        version: CACHE_VERSION.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        files: graph
            .files()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        symbols: graph
            .symbols()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        edges: graph.edges().to_vec(),
        layers: graph.layers().to_vec(),
        patterns: graph.patterns().to_vec(),
        adjacency: graph
            .adjacency()
            .iter()
            .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
            .collect(),
    };
    Ok(serde_json::to_string(&document)?)
}

pub fn deserialize(blob: &str) -> Option<KnowledgeGraph> {
    let document: CacheDocument = match serde_json::from_str(blob) {
        Ok(document) => document,
        Err(err) => {
            log::debug!("graph cache unreadable: {err}");
            return None;
        }
    };
    if document.version != CACHE_VERSION {
        log::debug!(
            "graph cache version {} does not match {}",
            document.version,
            CACHE_VERSION
        );
        return None;
    }
    Some(KnowledgeGraph::from_parts(
        document.files.into_iter().collect(),
        document.symbols.into_iter().collect(),
        document.edges,
        document
            .adjacency
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().collect()))
            .collect(),
        document.layers,
        document.patterns,
    ))
}

/// Write the snapshot under `root`, creating the cache directory if needed.
pub fn save(graph: &KnowledgeGraph, root: &Path) -> Result<PathBuf> {
    let path = cache_path(root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, serialize(graph)?)?;
    log::debug!("graph cache written to {}", path.display());
    Ok(path)
}

pub fn load(root: &Path) -> Option<KnowledgeGraph> {
    let path = cache_path(root);
    match fs::read_to_string(&path) {
        Ok(blob) => deserialize(&blob),
        Err(err) => {
            log::debug!("no graph cache at {}: {err}", path.display());
            None
        }
    }
}

/// Remove the snapshot. A missing file is not an error.
pub fn invalidate(root: &Path) -> Result<()> {
    match fs::remove_file(cache_path(root)) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
