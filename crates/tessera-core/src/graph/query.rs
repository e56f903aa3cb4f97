//! Read-only lookups, cycle detection and aggregate statistics.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use serde::Serialize;

use crate::config::{FileNode, FileRole, Symbol};
use crate::graph::knowledge_graph::KnowledgeGraph;

/// Aggregate counts over a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub file_count: usize,
    pub symbol_count: usize,
    pub edge_count: usize,
    pub function_count: usize,
    pub total_lines: usize,
    /// Mean of per-file complexity; 0 for an empty graph.
    pub average_complexity: f64,
    pub files_by_role: BTreeMap<FileRole, usize>,
    pub files_by_layer: BTreeMap<String, usize>,
}

/// Query engine over a borrowed [`KnowledgeGraph`].
pub struct GraphQuery<'g> {
    graph: &'g KnowledgeGraph,
    index: DiGraphMap<&'g str, ()>,
}

impl<'g> GraphQuery<'g> {
    pub fn new(graph: &'g KnowledgeGraph) -> Self {
        let mut index = DiGraphMap::new();
        for (from, targets) in graph.adjacency() {
            index.add_node(from.as_str());
            for to in targets {
                index.add_edge(from.as_str(), to.as_str(), ());
            }
        }
        Self { graph, index }
    }

    pub fn graph(&self) -> &'g KnowledgeGraph {
        self.graph
    }

    /// Files that `key` imports.
    pub fn dependencies(&self, key: &str) -> Vec<&'g str> {
        self.graph
            .adjacency()
            .get(key)
            .map(|targets| targets.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Files that import `key`, in key order.
    pub fn dependents(&self, key: &str) -> Vec<&'g str> {
        let Some((key, _)) = self.graph.adjacency().get_key_value(key) else {
            return Vec::new();
        };
        let mut found: Vec<&'g str> = self
            .index
            .neighbors_directed(key.as_str(), Direction::Incoming)
            .collect();
        found.sort_unstable();
        found
    }

    /// Every file that reaches `key` through imports, excluding `key` itself.
    pub fn transitive_dependents(&self, key: &str) -> BTreeSet<&'g str> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&'g str> = self.dependents(key).into_iter().collect();
        while let Some(next) = queue.pop_front() {
            if next == key || !seen.insert(next) {
                continue;
            }
            queue.extend(self.dependents(next));
        }
        seen
    }

    /// Import cycles found by depth-first search from every file in key order.
    ///
    /// Each cycle lists the files from the first occurrence of the revisited
    /// file through the current file, with the revisited file repeated at the
    /// end. Files already explored from an earlier root are not explored
    /// again, so not every elementary cycle is reported.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let adjacency = self.graph.adjacency();
        let mut cycles = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut on_stack: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();

        fn dfs<'a>(
            node: &'a str,
            adjacency: &'a BTreeMap<String, BTreeSet<String>>,
            visited: &mut HashSet<&'a str>,
            on_stack: &mut HashSet<&'a str>,
            stack: &mut Vec<&'a str>,
            cycles: &mut Vec<Vec<String>>,
        ) {
            visited.insert(node);
            on_stack.insert(node);
            stack.push(node);

            if let Some(targets) = adjacency.get(node) {
                for next in targets {
                    let next = next.as_str();
                    if on_stack.contains(next) {
                        if let Some(start) = stack.iter().position(|n| *n == next) {
                            let mut cycle: Vec<String> =
                                stack[start..].iter().map(|n| n.to_string()).collect();
                            cycle.push(next.to_string());
                            cycles.push(cycle);
                        }
                    } else if !visited.contains(next) {
                        dfs(next, adjacency, visited, on_stack, stack, cycles);
                    }
                }
            }

            stack.pop();
            on_stack.remove(node);
        }

        for key in adjacency.keys() {
            if !visited.contains(key.as_str()) {
                dfs(
                    key,
                    adjacency,
                    &mut visited,
                    &mut on_stack,
                    &mut stack,
                    &mut cycles,
                );
            }
        }
        cycles
    }

    pub fn stats(&self) -> GraphStats {
        let files = self.graph.files();
        let mut stats = GraphStats {
            file_count: files.len(),
            symbol_count: self.graph.symbol_count(),
            edge_count: self.graph.edge_count(),
            ..Default::default()
        };
        let mut complexity_total: u64 = 0;
        for file in files.values() {
            stats.function_count += file.functions.len();
            stats.total_lines += file.lines;
            complexity_total += u64::from(file.complexity);
            *stats.files_by_role.entry(file.role).or_insert(0) += 1;
            if let Some(layer) = &file.layer {
                *stats.files_by_layer.entry(layer.clone()).or_insert(0) += 1;
            }
        }
        if !files.is_empty() {
            stats.average_complexity = complexity_total as f64 / files.len() as f64;
        }
        stats
    }

    pub fn files_with_role(&self, role: FileRole) -> Vec<&'g FileNode> {
        self.graph
            .files()
            .values()
            .filter(|file| file.role == role)
            .collect()
    }

    pub fn files_in_layer(&self, layer: &str) -> Vec<&'g FileNode> {
        self.graph
            .files()
            .values()
            .filter(|file| file.layer.as_deref() == Some(layer))
            .collect()
    }

    pub fn symbols_in_file(&self, key: &str) -> Vec<&'g Symbol> {
        self.graph
            .symbols()
            .values()
            .filter(|symbol| symbol.file == key)
            .collect()
    }
}
