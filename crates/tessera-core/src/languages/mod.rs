//! Syntax-tree provider trait, parsed source trees and the node-kind table.
//!
//! The core never parses on its own: it asks a [`SyntaxProvider`] for source
//! paths and trees. Node kinds are classified once per grammar into a
//! [`KindTable`] indexed by tree-sitter kind id, so walking a tree matches on a
//! closed [`NodeKind`] enum instead of comparing kind strings per node.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tree_sitter::{Language, Node, Tree};

use crate::error::Result;

pub mod typescript;

pub use typescript::TypeScriptProvider;

/// Trait that syntax-tree providers implement.
pub trait SyntaxProvider: Send + Sync {
    /// Every project source path reachable from the compiler configuration,
    /// excluding declaration-only and vendored files.
    fn source_paths(&self, compiler_config: &Path) -> Result<Vec<PathBuf>>;

    /// Whether `path` would be among [`SyntaxProvider::source_paths`] for the
    /// same configuration, whether or not it currently exists.
    fn in_project(&self, compiler_config: &Path, path: &Path) -> Result<bool>;

    /// The live tree for `path`, parsing it on first request.
    fn tree(&self, path: &Path) -> Option<Arc<SourceTree>>;

    /// Fresh tree for a changed `path`: an in-memory buffer if the provider
    /// holds one, else a new parse from disk. Returns `None` (and forgets the
    /// path) when the file is gone or unreadable.
    fn reparse(&self, path: &Path) -> Option<Arc<SourceTree>>;
}

/// Closed set of node kinds the core and rules dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Program,
    Comment,
    ImportStatement,
    ExportStatement,
    FunctionDeclaration,
    GeneratorFunctionDeclaration,
    FunctionExpression,
    ArrowFunction,
    MethodDefinition,
    ClassDeclaration,
    ClassExpression,
    InterfaceDeclaration,
    TypeAliasDeclaration,
    EnumDeclaration,
    LexicalDeclaration,
    VariableDeclaration,
    VariableDeclarator,
    CallExpression,
    NewExpression,
    MemberExpression,
    AwaitExpression,
    Identifier,
    StringLiteral,
    TemplateString,
    IfStatement,
    SwitchCase,
    ForStatement,
    ForInStatement,
    WhileStatement,
    DoStatement,
    TryStatement,
    CatchClause,
    TernaryExpression,
    BinaryExpression,
    ReturnStatement,
    ThrowStatement,
    Other,
}

impl NodeKind {
    /// Map a named grammar node kind onto the closed enumeration.
    pub fn from_grammar_name(name: &str) -> Self {
        match name {
            "program" => Self::Program,
            "comment" => Self::Comment,
            "import_statement" => Self::ImportStatement,
            "export_statement" => Self::ExportStatement,
            "function_declaration" => Self::FunctionDeclaration,
            "generator_function_declaration" => Self::GeneratorFunctionDeclaration,
            "function_expression" | "function" | "generator_function" => {
                Self::FunctionExpression
            }
            "arrow_function" => Self::ArrowFunction,
            "method_definition" => Self::MethodDefinition,
            "class_declaration" | "abstract_class_declaration" => Self::ClassDeclaration,
            "class" => Self::ClassExpression,
            "interface_declaration" => Self::InterfaceDeclaration,
            "type_alias_declaration" => Self::TypeAliasDeclaration,
            "enum_declaration" => Self::EnumDeclaration,
            "lexical_declaration" => Self::LexicalDeclaration,
            "variable_declaration" => Self::VariableDeclaration,
            "variable_declarator" => Self::VariableDeclarator,
            "call_expression" => Self::CallExpression,
            "new_expression" => Self::NewExpression,
            "member_expression" => Self::MemberExpression,
            "await_expression" => Self::AwaitExpression,
            "identifier" => Self::Identifier,
            "string" => Self::StringLiteral,
            "template_string" => Self::TemplateString,
            "if_statement" => Self::IfStatement,
            "switch_case" => Self::SwitchCase,
            "for_statement" => Self::ForStatement,
            "for_in_statement" => Self::ForInStatement,
            "while_statement" => Self::WhileStatement,
            "do_statement" => Self::DoStatement,
            "try_statement" => Self::TryStatement,
            "catch_clause" => Self::CatchClause,
            "ternary_expression" => Self::TernaryExpression,
            "binary_expression" => Self::BinaryExpression,
            "return_statement" => Self::ReturnStatement,
            "throw_statement" => Self::ThrowStatement,
            _ => Self::Other,
        }
    }
}

/// Named groups of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindAlias {
    FunctionLike,
    Loop,
    Branch,
    ClassLike,
    ModuleBoundary,
}

const ALIAS_TABLE: &[(KindAlias, &[NodeKind])] = &[
    (
        KindAlias::FunctionLike,
        &[
            NodeKind::FunctionDeclaration,
            NodeKind::GeneratorFunctionDeclaration,
            NodeKind::FunctionExpression,
            NodeKind::ArrowFunction,
            NodeKind::MethodDefinition,
        ],
    ),
    (
        KindAlias::Loop,
        &[
            NodeKind::ForStatement,
            NodeKind::ForInStatement,
            NodeKind::WhileStatement,
            NodeKind::DoStatement,
        ],
    ),
    (
        KindAlias::Branch,
        &[
            NodeKind::IfStatement,
            NodeKind::SwitchCase,
            NodeKind::TernaryExpression,
            NodeKind::CatchClause,
        ],
    ),
    (
        KindAlias::ClassLike,
        &[NodeKind::ClassDeclaration, NodeKind::ClassExpression],
    ),
    (
        KindAlias::ModuleBoundary,
        &[NodeKind::ImportStatement, NodeKind::ExportStatement],
    ),
];

impl KindAlias {
    pub const ALL: [KindAlias; 5] = [
        KindAlias::FunctionLike,
        KindAlias::Loop,
        KindAlias::Branch,
        KindAlias::ClassLike,
        KindAlias::ModuleBoundary,
    ];

    /// Resolve an alias by the names rule authors use for it.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Function" | "FunctionLike" => Some(Self::FunctionLike),
            "Loop" => Some(Self::Loop),
            "Branch" | "Conditional" => Some(Self::Branch),
            "Class" | "ClassLike" => Some(Self::ClassLike),
            "Module" | "ModuleBoundary" => Some(Self::ModuleBoundary),
            _ => None,
        }
    }

    pub fn kinds(&self) -> &'static [NodeKind] {
        ALIAS_TABLE
            .iter()
            .find(|(alias, _)| alias == self)
            .map(|(_, kinds)| *kinds)
            .unwrap_or(&[])
    }

    pub fn contains(&self, kind: NodeKind) -> bool {
        self.kinds().contains(&kind)
    }

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

/// Kind-id → [`NodeKind`] table for one grammar, with alias membership
/// precomputed per id.
#[derive(Debug)]
pub struct KindTable {
    kinds: Vec<NodeKind>,
    aliases: Vec<u8>,
}

impl KindTable {
    pub fn for_language(language: &Language) -> Self {
        let count = language.node_kind_count();
        let mut kinds = Vec::with_capacity(count);
        let mut aliases = Vec::with_capacity(count);
        for id in 0..count {
            let id = id as u16;
            let kind = if language.node_kind_is_named(id) {
                language
                    .node_kind_for_id(id)
                    .map(NodeKind::from_grammar_name)
                    .unwrap_or(NodeKind::Other)
            } else {
                NodeKind::Other
            };
            let mask = KindAlias::ALL
                .iter()
                .filter(|alias| alias.contains(kind))
                .fold(0u8, |mask, alias| mask | alias.bit());
            kinds.push(kind);
            aliases.push(mask);
        }
        Self { kinds, aliases }
    }

    pub fn kind(&self, id: u16) -> NodeKind {
        self.kinds
            .get(id as usize)
            .copied()
            .unwrap_or(NodeKind::Other)
    }

    pub fn is(&self, id: u16, alias: KindAlias) -> bool {
        self.aliases
            .get(id as usize)
            .is_some_and(|mask| mask & alias.bit() != 0)
    }
}

/// Control returned by a [`SourceTree::walk`] visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Continue,
    SkipChildren,
    Stop,
}

/// A parsed source file together with its text.
pub struct SourceTree {
    path: PathBuf,
    source: String,
    tree: Tree,
    line_starts: Vec<usize>,
    kinds: &'static KindTable,
}

impl std::fmt::Debug for SourceTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceTree")
            .field("path", &self.path)
            .field("lines", &self.line_starts.len())
            .finish()
    }
}

impl SourceTree {
    pub fn new(path: PathBuf, source: String, tree: Tree, kinds: &'static KindTable) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            path,
            source,
            tree,
            line_starts,
            kinds,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn line_count(&self) -> usize {
        self.source.lines().count()
    }

    pub fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// 1-based (line, column) of a byte offset. Columns count bytes.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        (line + 1, offset - self.line_starts[line] + 1)
    }

    pub fn kind(&self, node: Node<'_>) -> NodeKind {
        self.kinds.kind(node.kind_id())
    }

    pub fn is(&self, node: Node<'_>, alias: KindAlias) -> bool {
        self.kinds.is(node.kind_id(), alias)
    }

    /// Pre-order walk of the whole tree.
    pub fn walk<'t>(&'t self, visit: impl FnMut(NodeKind, Node<'t>) -> Walk) {
        self.walk_from(self.root(), visit);
    }

    /// Pre-order walk of the subtree rooted at `start`.
    pub fn walk_from<'t>(&'t self, start: Node<'t>, mut visit: impl FnMut(NodeKind, Node<'t>) -> Walk) {
        let mut cursor = start.walk();
        loop {
            let node = cursor.node();
            let control = visit(self.kind(node), node);
            if control == Walk::Stop {
                return;
            }
            if control == Walk::Continue && cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return;
                }
            }
        }
    }

    /// Declared type of a node, rendered as source text.
    ///
    /// Reads the `type` field (variables, parameters, properties) or the
    /// `return_type` field (function-like nodes). No inference happens here.
    pub fn type_text(&self, node: Node<'_>) -> Option<String> {
        let annotation = node
            .child_by_field_name("type")
            .or_else(|| node.child_by_field_name("return_type"))?;
        let text = self.text(annotation).trim_start_matches(':').trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}
