//! Per-file extraction: one parsed tree in, File/Symbol/Edge records out.

use std::collections::BTreeSet;

use crate::config::{DependencyEdge, FileNode, Symbol};
use crate::languages::typescript::{extract_exports, extract_functions, extract_imports};
use crate::languages::SourceTree;
use crate::phases::imports::resolve_edges;
use crate::phases::structure::{assign_layer, classify_role};

/// Everything one file contributes to the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct FileExtraction {
    pub file: FileNode,
    pub symbols: Vec<Symbol>,
    pub edges: Vec<DependencyEdge>,
}

fn is_barrel(key: &str) -> bool {
    let name = key.rsplit('/').next().unwrap_or(key);
    name == "index.ts" || name == "index.tsx"
}

/// Extract the records for the file stored under `key`.
pub fn extract_file(tree: &SourceTree, key: &str, layers: &[String]) -> FileExtraction {
    let imports = extract_imports(tree);
    let exports = extract_exports(tree);
    let functions = extract_functions(tree, key);
    let public_api = is_barrel(key);

    let mut seen = BTreeSet::new();
    let symbols: Vec<Symbol> = exports
        .iter()
        .filter(|export| seen.insert(export.name.clone()))
        .map(|export| Symbol {
            id: Symbol::make_id(key, &export.name),
            name: export.name.clone(),
            kind: export.kind,
            file: key.to_string(),
            used_by: BTreeSet::new(),
            depends_on: BTreeSet::new(),
            is_public_api: public_api,
        })
        .collect();

    let edges = resolve_edges(key, &imports);

    let file = FileNode {
        path: key.to_string(),
        role: classify_role(key),
        layer: assign_layer(key, layers),
        exports: symbols.iter().map(|s| s.name.clone()).collect(),
        imports,
        complexity: functions.iter().map(|f| f.complexity).sum(),
        lines: tree.line_count(),
        functions,
    };

    FileExtraction {
        file,
        symbols,
        edges,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::{FileRole, SymbolKind};
    use crate::languages::TypeScriptProvider;

    fn extract(key: &str, source: &str) -> FileExtraction {
        let tree = TypeScriptProvider::parse_source(Path::new(key), source.to_string()).unwrap();
        extract_file(&tree, key, &["services".to_string()])
    }

    #[test]
    fn file_record_fields() {
        let x = extract(
            "src/services/user.service.ts",
            "import { findUser } from '../repositories/user.repository.js';\n\
             import express from 'express';\n\
             export function getUser(id: string) {\n  if (!id) { return null; }\n  return findUser(id);\n}\n\
             export default getUser;\n",
        );
        assert_eq!(x.file.role, FileRole::Service);
        assert_eq!(x.file.layer.as_deref(), Some("services"));
        assert_eq!(x.file.exports, vec!["getUser", "default"]);
        assert_eq!(x.file.imports.len(), 2);
        assert_eq!(x.file.lines, 7);
        assert_eq!(x.file.functions.len(), 1);
        assert_eq!(x.file.complexity, 2);

        assert_eq!(x.edges.len(), 1);
        assert_eq!(x.edges[0].to, "src/repositories/user.repository.ts");

        assert_eq!(x.symbols.len(), 2);
        assert_eq!(x.symbols[0].id, "src/services/user.service.ts:getUser");
        assert_eq!(x.symbols[1].kind, SymbolKind::Default);
        assert!(!x.symbols[0].is_public_api);
    }

    #[test]
    fn barrel_exports_are_public_api() {
        let x = extract("src/index.ts", "export { getUser } from './services/user.service';\n");
        assert_eq!(x.symbols.len(), 1);
        assert!(x.symbols[0].is_public_api);
        assert_eq!(x.symbols[0].kind, SymbolKind::ReExport);
        assert_eq!(x.edges[0].to, "src/services/user.service.ts");
    }

    #[test]
    fn file_without_functions_has_zero_complexity() {
        let x = extract("src/constants.ts", "export const LIMIT = 10;\n");
        assert_eq!(x.file.complexity, 0);
        assert!(x.file.functions.is_empty());
    }
}
