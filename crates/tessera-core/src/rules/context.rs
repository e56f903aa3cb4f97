//! The read-only bundle a rule sees for one file.

use serde_json::Value;
use tree_sitter::Node;

use crate::config::{FileNode, FileRole, Symbol};
use crate::graph::knowledge_graph::KnowledgeGraph;
use crate::languages::typescript::has_token;
use crate::languages::{KindAlias, NodeKind, SourceTree, Walk};
use crate::rules::Finding;

/// Per-file context handed to [`crate::rules::Rule::check`].
pub struct RuleContext<'a> {
    file: &'a FileNode,
    tree: &'a SourceTree,
    graph: &'a KnowledgeGraph,
    config: &'a Value,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        file: &'a FileNode,
        tree: &'a SourceTree,
        graph: &'a KnowledgeGraph,
        config: &'a Value,
    ) -> Self {
        Self {
            file,
            tree,
            graph,
            config,
        }
    }

    pub fn file(&self) -> &'a FileNode {
        self.file
    }

    pub fn tree(&self) -> &'a SourceTree {
        self.tree
    }

    pub fn graph(&self) -> &'a KnowledgeGraph {
        self.graph
    }

    /// The rule's plugin configuration; `Value::Null` when none was given.
    pub fn config(&self) -> &'a Value {
        self.config
    }

    pub fn source(&self) -> &'a str {
        self.tree.source()
    }

    /// Pre-order walk of the file's tree, dispatched on [`NodeKind`].
    pub fn walk(&self, visit: impl FnMut(NodeKind, Node<'a>) -> Walk) {
        self.tree.walk(visit);
    }

    /// Visit every node belonging to `alias`, outermost first.
    pub fn walk_alias(&self, alias: KindAlias, mut visit: impl FnMut(Node<'a>)) {
        let tree = self.tree;
        tree.walk(|_, node| {
            if tree.is(node, alias) {
                visit(node);
            }
            Walk::Continue
        });
    }

    /// 1-based (line, column) where `node` starts.
    pub fn position(&self, node: Node<'_>) -> (usize, usize) {
        self.tree.position(node.start_byte())
    }

    pub fn text(&self, node: Node<'_>) -> &'a str {
        self.tree.text(node)
    }

    pub fn is_function_like(&self, node: Node<'_>) -> bool {
        self.tree.is(node, KindAlias::FunctionLike)
    }

    /// Whether the declaration containing `node` is exported.
    pub fn is_exported(&self, node: Node<'_>) -> bool {
        let mut current = node.parent();
        while let Some(parent) = current {
            match self.tree.kind(parent) {
                NodeKind::ExportStatement => return true,
                NodeKind::VariableDeclarator
                | NodeKind::LexicalDeclaration
                | NodeKind::VariableDeclaration => current = parent.parent(),
                _ => return false,
            }
        }
        false
    }

    pub fn is_async(&self, node: Node<'_>) -> bool {
        has_token(&node, "async")
    }

    pub fn is_test_file(&self) -> bool {
        self.file.role == FileRole::Test
    }

    /// Declared type annotation of `node`, as written.
    pub fn type_of(&self, node: Node<'_>) -> Option<String> {
        self.tree.type_text(node)
    }

    /// Whether another file imports the export `name` of this file.
    pub fn is_externally_referenced(&self, name: &str) -> bool {
        self.graph
            .symbol(&Symbol::make_id(&self.file.path, name))
            .is_some_and(|symbol| !symbol.used_by.is_empty())
    }

    /// A finding in this file at the start of `node`.
    pub fn finding(&self, node: Node<'_>, message: impl Into<String>) -> Finding {
        let (line, column) = self.position(node);
        Finding::new(self.file.path.clone(), line, column, message)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::languages::TypeScriptProvider;
    use crate::phases::parsing::extract_file;

    const SOURCE: &str = "\
import { helper } from './helper';
export async function run(limit: number): Promise<void> {}
export const double = (n: number) => n * 2;
function local() {}
";

    fn graph_with(tree: &SourceTree) -> KnowledgeGraph {
        let mut kg = KnowledgeGraph::new();
        kg.insert_extraction(extract_file(tree, "src/app.ts", &[]));
        let consumer = TypeScriptProvider::parse_source(
            Path::new("src/main.ts"),
            "import { run } from './app';\n".to_string(),
        )
        .unwrap();
        kg.insert_extraction(extract_file(&consumer, "src/main.ts", &[]));
        kg.rebuild_derived();
        kg
    }

    #[test]
    fn helpers_over_a_real_tree() {
        let tree = TypeScriptProvider::parse_source(Path::new("src/app.ts"), SOURCE.to_string()).unwrap();
        let kg = graph_with(&tree);
        let file = kg.file("src/app.ts").unwrap();
        let config = Value::Null;
        let ctx = RuleContext::new(file, &tree, &kg, &config);

        let mut functions = Vec::new();
        ctx.walk_alias(KindAlias::FunctionLike, |node| functions.push(node));
        assert_eq!(functions.len(), 3);

        let run = functions[0];
        assert!(ctx.is_function_like(run));
        assert!(ctx.is_exported(run));
        assert!(ctx.is_async(run));
        assert_eq!(ctx.type_of(run).as_deref(), Some("Promise<void>"));
        assert_eq!(ctx.position(run), (2, 8));

        assert!(ctx.is_exported(functions[1]));
        assert!(!ctx.is_exported(functions[2]));

        assert!(ctx.is_externally_referenced("run"));
        assert!(!ctx.is_externally_referenced("double"));
        assert!(!ctx.is_test_file());
        assert!(ctx.config().is_null());

        let finding = ctx.finding(functions[2], "unused");
        assert_eq!((finding.file.as_str(), finding.line, finding.column), ("src/app.ts", 4, 1));
    }
}
