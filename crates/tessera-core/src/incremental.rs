//! Patch a built graph from a list of changed paths.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::graph::knowledge_graph::KnowledgeGraph;
use crate::languages::SyntaxProvider;
use crate::phases::parsing::extract_file;
use crate::phases::structure::{is_declaration_key, normalize_key, PathPolicy};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    /// Keys of the paths that were passed in.
    pub changed_files: BTreeSet<String>,
    /// Changed files plus every file that imported one of them before the update.
    pub affected_files: BTreeSet<String>,
}

fn absolute(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Re-extract each changed file in place and rebuild derived state once.
///
/// A file that can no longer be read is treated as deleted. Paths outside
/// the root are ignored. Paths the include/exclude policy or the compiler
/// configuration rejects are removed and not re-inserted.
pub fn update_graph(
    graph: &mut KnowledgeGraph,
    changed: &[PathBuf],
    config: &AnalysisConfig,
    provider: &dyn SyntaxProvider,
) -> Result<UpdateResult> {
    let root = config.root();
    let compiler_config = config.compiler_config_path();
    let policy = PathPolicy::new(root, &config.include, &config.exclude)?;
    let layers = graph.layers().to_vec();
    let mut result = UpdateResult::default();

    for path in changed {
        let path = absolute(root, path);
        if !path.starts_with(root) {
            log::warn!("{} is outside {}; ignored", path.display(), root.display());
            continue;
        }
        let key = normalize_key(root, &path);

        let dependents: Vec<String> = graph
            .adjacency()
            .iter()
            .filter(|(_, targets)| targets.contains(&key))
            .map(|(importer, _)| importer.clone())
            .collect();
        result.affected_files.extend(dependents);
        result.affected_files.insert(key.clone());
        result.changed_files.insert(key.clone());

        graph.remove_file(&key);

        if is_declaration_key(&key)
            || !policy.retains(&key)
            || !provider.in_project(&compiler_config, &path)?
        {
            log::debug!("{key} is outside the project; removed");
            continue;
        }
        match provider.reparse(&path) {
            Some(tree) => graph.insert_extraction(extract_file(&tree, &key, &layers)),
            None => log::warn!("{key} could not be read; treating it as deleted"),
        }
    }

    graph.rebuild_derived();
    log::info!(
        "updated {} changed files, {} affected",
        result.changed_files.len(),
        result.affected_files.len()
    );
    Ok(result)
}
