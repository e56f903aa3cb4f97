//! In-memory knowledge graph: files, exported symbols, import edges and the
//! adjacency derived from them.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{ConventionPattern, DependencyEdge, FileNode, Symbol};
use crate::phases::parsing::FileExtraction;

/// One consistent snapshot of the project.
///
/// `adjacency` and every symbol's `used_by` are derived from `files` and
/// `edges`; they are only ever regenerated through [`KnowledgeGraph::rebuild_derived`]
/// (or removed alongside a file), never edited independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeGraph {
    files: BTreeMap<String, FileNode>,
    symbols: BTreeMap<String, Symbol>,
    edges: Vec<DependencyEdge>,
    adjacency: BTreeMap<String, BTreeSet<String>>,
    layers: Vec<String>,
    patterns: Vec<ConventionPattern>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassemble a graph from its stored parts, as read back from the cache.
    pub(crate) fn from_parts(
        files: BTreeMap<String, FileNode>,
        symbols: BTreeMap<String, Symbol>,
        edges: Vec<DependencyEdge>,
        adjacency: BTreeMap<String, BTreeSet<String>>,
        layers: Vec<String>,
        patterns: Vec<ConventionPattern>,
    ) -> Self {
        Self {
            files,
            symbols,
            edges,
            adjacency,
            layers,
            patterns,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn files(&self) -> &BTreeMap<String, FileNode> {
        &self.files
    }

    pub fn file(&self, key: &str) -> Option<&FileNode> {
        self.files.get(key)
    }

    pub fn has_file(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }

    pub fn symbols(&self) -> &BTreeMap<String, Symbol> {
        &self.symbols
    }

    pub fn symbol(&self, id: &str) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn adjacency(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.adjacency
    }

    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    pub fn patterns(&self) -> &[ConventionPattern] {
        &self.patterns
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // -----------------------------------------------------------------------
    // Mutation (single writer: builder and incremental updater)
    // -----------------------------------------------------------------------

    pub fn set_layers(&mut self, layers: Vec<String>) {
        self.layers = layers;
    }

    /// Attach host-discovered conventions. The graph never interprets them.
    pub fn set_patterns(&mut self, patterns: Vec<ConventionPattern>) {
        self.patterns = patterns;
    }

    /// Insert (or replace) one file's records. Derived state is left stale
    /// until [`KnowledgeGraph::rebuild_derived`].
    ///
    /// Edges stay grouped by source file in key order, so a graph patched
    /// file by file compares equal to one built from scratch.
    pub fn insert_extraction(&mut self, extraction: FileExtraction) {
        let key = extraction.file.path.clone();
        if self.files.contains_key(&key) {
            self.remove_file(&key);
        }
        for symbol in extraction.symbols {
            self.symbols.insert(symbol.id.clone(), symbol);
        }
        let at = self.edges.partition_point(|edge| edge.from.as_str() <= key.as_str());
        self.edges.splice(at..at, extraction.edges);
        self.files.insert(key, extraction.file);
    }

    /// Remove a file, its symbols, its outgoing edges and every adjacency
    /// reference to it. Returns whether the file was present.
    ///
    /// Edges from other files into `key` stay, so re-inserting the file
    /// restores their adjacency on the next rebuild.
    pub fn remove_file(&mut self, key: &str) -> bool {
        let existed = self.files.remove(key).is_some();
        self.symbols.retain(|_, symbol| symbol.file != key);
        self.edges.retain(|edge| edge.from != key);
        self.adjacency.remove(key);
        for targets in self.adjacency.values_mut() {
            targets.remove(key);
        }
        existed
    }

    /// Regenerate adjacency and `used_by` from the current files and edges.
    pub fn rebuild_derived(&mut self) {
        self.rebuild_adjacency();
        self.rebuild_used_by();
    }

    fn rebuild_adjacency(&mut self) {
        let mut adjacency: BTreeMap<String, BTreeSet<String>> = self
            .files
            .keys()
            .map(|key| (key.clone(), BTreeSet::new()))
            .collect();
        for edge in &self.edges {
            if !self.files.contains_key(&edge.to) {
                continue;
            }
            if let Some(targets) = adjacency.get_mut(&edge.from) {
                targets.insert(edge.to.clone());
            }
        }
        self.adjacency = adjacency;
    }

    fn rebuild_used_by(&mut self) {
        for symbol in self.symbols.values_mut() {
            symbol.used_by.clear();
        }
        for edge in &self.edges {
            if !self.files.contains_key(&edge.from) {
                continue;
            }
            for specifier in &edge.specifiers {
                if specifier == "*" {
                    for symbol in self.symbols.values_mut().filter(|s| s.file == edge.to) {
                        symbol.used_by.insert(edge.from.clone());
                    }
                } else if let Some(symbol) = self
                    .symbols
                    .get_mut(&Symbol::make_id(&edge.to, specifier))
                {
                    symbol.used_by.insert(edge.from.clone());
                }
            }
        }
    }
}
