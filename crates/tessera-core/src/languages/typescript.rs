//! TypeScript/TSX syntax provider and extractors.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use serde::Deserialize;
use ignore::gitignore::Gitignore;
use tree_sitter::{Language, Node, Parser};
use walkdir::WalkDir;

use super::{KindAlias, KindTable, NodeKind, SourceTree, SyntaxProvider, Walk};
use crate::config::{FunctionInfo, ImportDescriptor, Parameter, SymbolKind};
use crate::error::{Result, TesseraError};
use crate::phases::structure::build_matcher;

static TS_KINDS: LazyLock<KindTable> =
    LazyLock::new(|| KindTable::for_language(&typescript_language()));
static TSX_KINDS: LazyLock<KindTable> =
    LazyLock::new(|| KindTable::for_language(&tsx_language()));

/// Directory names never walked for sources.
const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    "node_modules",
    "dist",
    "build",
    "out",
    "coverage",
    ".tessera",
];

fn typescript_language() -> Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

fn tsx_language() -> Language {
    tree_sitter_typescript::LANGUAGE_TSX.into()
}

fn grammar_for(path: &Path) -> Option<(Language, &'static KindTable)> {
    let name = path.file_name()?.to_str()?;
    if is_declaration_file(name) {
        return None;
    }
    match path.extension()?.to_str()? {
        "ts" | "mts" | "cts" => Some((typescript_language(), &*TS_KINDS)),
        "tsx" => Some((tsx_language(), &*TSX_KINDS)),
        _ => None,
    }
}

fn is_declaration_file(name: &str) -> bool {
    name.ends_with(".d.ts") || name.ends_with(".d.mts") || name.ends_with(".d.cts")
}

/// The parts of `tsconfig.json` that decide which files belong to the project.
#[derive(Debug, Default, Deserialize)]
struct CompilerConfigFile {
    #[serde(default)]
    include: Option<Vec<String>>,
    #[serde(default)]
    exclude: Option<Vec<String>>,
    #[serde(default)]
    files: Option<Vec<String>>,
}

fn walks_into(dir_name: &std::ffi::OsStr) -> bool {
    let name = dir_name.to_string_lossy();
    !(name.starts_with('.') || DEFAULT_EXCLUDES.contains(&name.as_ref()))
}

/// Compiled `include`/`exclude`/`files` of one compiler configuration.
struct ProjectScope {
    base: PathBuf,
    include: Gitignore,
    exclude: Gitignore,
    files: Vec<PathBuf>,
}

impl ProjectScope {
    fn load(compiler_config: &Path) -> Result<Self> {
        let text = fs::read_to_string(compiler_config).map_err(|source| TesseraError::ConfigRead {
            path: compiler_config.to_path_buf(),
            source,
        })?;
        let parsed: CompilerConfigFile =
            serde_json::from_str(&strip_json_comments(&text)).map_err(|source| {
                TesseraError::ConfigParse {
                    path: compiler_config.to_path_buf(),
                    source,
                }
            })?;

        let base = compiler_config.parent().unwrap_or(Path::new(".")).to_path_buf();
        let include = build_matcher(&base, parsed.include.as_deref().unwrap_or_default())?;
        let exclude = build_matcher(&base, parsed.exclude.as_deref().unwrap_or_default())?;
        let files = parsed
            .files
            .unwrap_or_default()
            .into_iter()
            .map(|file| base.join(file))
            .filter(|path| grammar_for(path).is_some())
            .collect();
        Ok(Self {
            base,
            include,
            exclude,
            files,
        })
    }

    /// Whether a walked path passes the include/exclude patterns.
    fn matches_pattern(&self, path: &Path) -> bool {
        if grammar_for(path).is_none() {
            return false;
        }
        let Ok(rel) = path.strip_prefix(&self.base) else {
            return false;
        };
        let included = self.include.is_empty()
            || self.include.matched_path_or_any_parents(rel, false).is_ignore();
        included && !self.exclude.matched_path_or_any_parents(rel, false).is_ignore()
    }

    /// Whether `path` is one the directory walk or `files` would yield.
    fn contains(&self, path: &Path) -> bool {
        if self.files.iter().any(|file| file == path) {
            return true;
        }
        let Ok(rel) = path.strip_prefix(&self.base) else {
            return false;
        };
        let walked = rel
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .all(|dir| walks_into(dir.as_os_str()));
        walked && self.matches_pattern(path)
    }
}

/// Tree-sitter backed provider for `.ts`/`.tsx` sources.
///
/// Trees parsed from disk are cached per path. Buffers registered with
/// [`TypeScriptProvider::insert_source`] overlay the file on disk until
/// [`TypeScriptProvider::remove_source`] drops them; `reparse` keeps
/// returning the overlay.
#[derive(Default)]
pub struct TypeScriptProvider {
    overlays: RwLock<HashMap<PathBuf, Arc<SourceTree>>>,
    parsed: RwLock<HashMap<PathBuf, Arc<SourceTree>>>,
}

impl TypeScriptProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `source` as the contents of `path`.
    pub fn parse_source(path: &Path, source: String) -> Option<SourceTree> {
        let (language, kinds) = grammar_for(path)?;
        let mut parser = Parser::new();
        if parser.set_language(&language).is_err() {
            return None;
        }
        let tree = parser.parse(&source, None)?;
        Some(SourceTree::new(path.to_path_buf(), source, tree, kinds))
    }

    /// Register an in-memory buffer as the live contents of `path`.
    pub fn insert_source(
        &self,
        path: impl Into<PathBuf>,
        source: impl Into<String>,
    ) -> Option<Arc<SourceTree>> {
        let path = path.into();
        let tree = Arc::new(Self::parse_source(&path, source.into())?);
        self.overlays
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, Arc::clone(&tree));
        Some(tree)
    }

    /// Drop the in-memory buffer for `path`, falling back to the file on disk.
    pub fn remove_source(&self, path: &Path) -> bool {
        self.overlays
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .is_some()
    }

    fn overlay(&self, path: &Path) -> Option<Arc<SourceTree>> {
        self.overlays
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    fn parse_from_disk(path: &Path) -> Option<SourceTree> {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                log::debug!("cannot read {}: {err}", path.display());
                return None;
            }
        };
        Self::parse_source(path, source)
    }

    fn store(&self, path: &Path, tree: Option<SourceTree>) -> Option<Arc<SourceTree>> {
        let mut parsed = self.parsed.write().unwrap_or_else(PoisonError::into_inner);
        match tree {
            Some(tree) => {
                let tree = Arc::new(tree);
                parsed.insert(path.to_path_buf(), Arc::clone(&tree));
                Some(tree)
            }
            None => {
                parsed.remove(path);
                None
            }
        }
    }
}

impl SyntaxProvider for TypeScriptProvider {
    fn source_paths(&self, compiler_config: &Path) -> Result<Vec<PathBuf>> {
        let scope = ProjectScope::load(compiler_config)?;

        let mut paths = Vec::new();
        for entry in WalkDir::new(&scope.base)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_type().is_dir() || walks_into(e.file_name()))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if entry.file_type().is_file() && scope.matches_pattern(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        paths.extend(scope.files.iter().filter(|p| p.is_file()).cloned());

        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    fn in_project(&self, compiler_config: &Path, path: &Path) -> Result<bool> {
        let scope = ProjectScope::load(compiler_config)?;
        Ok(scope.contains(path))
    }

    fn tree(&self, path: &Path) -> Option<Arc<SourceTree>> {
        if let Some(tree) = self.overlay(path) {
            return Some(tree);
        }
        let cached = self
            .parsed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned();
        if cached.is_some() {
            return cached;
        }
        let parsed = Self::parse_from_disk(path)?;
        self.store(path, Some(parsed))
    }

    fn reparse(&self, path: &Path) -> Option<Arc<SourceTree>> {
        if let Some(tree) = self.overlay(path) {
            return Some(tree);
        }
        let parsed = Self::parse_from_disk(path);
        self.store(path, parsed)
    }
}

/// Remove `//` and `/* */` comments outside string literals. tsconfig files
/// are JSON with comments.
fn strip_json_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// A name exported by a file and what it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedName {
    pub name: String,
    pub kind: SymbolKind,
}

pub(crate) fn has_token(node: &Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| !c.is_named() && c.kind() == token);
    found
}

fn string_value(tree: &SourceTree, node: Node<'_>) -> String {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "string_fragment" {
            return tree.text(child).to_string();
        }
    }
    tree.text(node)
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

fn field_text(tree: &SourceTree, node: Node<'_>, field: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| tree.text(n).to_string())
}

/// Top-level `import` statements and `export ... from` re-exports.
pub fn extract_imports(tree: &SourceTree) -> Vec<ImportDescriptor> {
    let mut imports = Vec::new();
    let root = tree.root();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        let kind = tree.kind(child);
        if kind != NodeKind::ImportStatement && kind != NodeKind::ExportStatement {
            continue;
        }
        let Some(source) = child.child_by_field_name("source") else {
            continue;
        };
        let specifiers = if kind == NodeKind::ImportStatement {
            import_specifiers(tree, child)
        } else {
            reexport_specifiers(tree, child)
        };
        imports.push(ImportDescriptor {
            source: string_value(tree, source),
            specifiers,
            type_only: has_token(&child, "type"),
        });
    }
    imports
}

fn import_specifiers(tree: &SourceTree, statement: Node<'_>) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = statement.walk();
    let Some(clause) = statement
        .named_children(&mut cursor)
        .find(|c| c.kind() == "import_clause")
    else {
        return names;
    };
    let mut clause_cursor = clause.walk();
    for part in clause.named_children(&mut clause_cursor) {
        match part.kind() {
            "identifier" => names.push("default".to_string()),
            "namespace_import" => names.push("*".to_string()),
            "named_imports" => {
                let mut spec_cursor = part.walk();
                for spec in part.named_children(&mut spec_cursor) {
                    if spec.kind() == "import_specifier" {
                        if let Some(name) = field_text(tree, spec, "name") {
                            names.push(name);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    names
}

fn reexport_specifiers(tree: &SourceTree, statement: Node<'_>) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = statement.walk();
    for part in statement.children(&mut cursor) {
        match part.kind() {
            "*" | "namespace_export" => names.push("*".to_string()),
            "export_clause" => {
                let mut spec_cursor = part.walk();
                for spec in part.named_children(&mut spec_cursor) {
                    if spec.kind() == "export_specifier" {
                        if let Some(name) = field_text(tree, spec, "name") {
                            names.push(name);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    names
}

fn declaration_kind(kind: NodeKind, grammar_kind: &str) -> Option<SymbolKind> {
    match kind {
        NodeKind::FunctionDeclaration | NodeKind::GeneratorFunctionDeclaration => {
            Some(SymbolKind::Function)
        }
        NodeKind::ClassDeclaration => Some(SymbolKind::Class),
        NodeKind::InterfaceDeclaration => Some(SymbolKind::Interface),
        NodeKind::TypeAliasDeclaration => Some(SymbolKind::TypeAlias),
        NodeKind::EnumDeclaration => Some(SymbolKind::Enum),
        NodeKind::LexicalDeclaration | NodeKind::VariableDeclaration => {
            Some(SymbolKind::Variable)
        }
        _ if grammar_kind == "function_signature" => Some(SymbolKind::Function),
        _ => None,
    }
}

/// Names bound by a top-level declaration node.
fn declared_names(tree: &SourceTree, decl: Node<'_>) -> Vec<String> {
    match tree.kind(decl) {
        NodeKind::LexicalDeclaration | NodeKind::VariableDeclaration => {
            let mut cursor = decl.walk();
            decl.named_children(&mut cursor)
                .filter(|d| tree.kind(*d) == NodeKind::VariableDeclarator)
                .filter_map(|d| d.child_by_field_name("name"))
                .filter(|n| tree.kind(*n) == NodeKind::Identifier)
                .map(|n| tree.text(n).to_string())
                .collect()
        }
        _ => field_text(tree, decl, "name").into_iter().collect(),
    }
}

/// Every name the file exports, `default` included.
pub fn extract_exports(tree: &SourceTree) -> Vec<ExportedName> {
    let root = tree.root();

    // Kinds of top-level declarations, for classifying `export { local }`.
    let mut local_kinds: HashMap<String, SymbolKind> = HashMap::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if let Some(kind) = declaration_kind(tree.kind(child), child.kind()) {
            for name in declared_names(tree, child) {
                local_kinds.insert(name, kind);
            }
        }
    }

    let mut exports = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if tree.kind(child) != NodeKind::ExportStatement {
            continue;
        }
        if has_token(&child, "default") {
            exports.push(ExportedName {
                name: "default".to_string(),
                kind: SymbolKind::Default,
            });
            continue;
        }
        if let Some(decl) = child.child_by_field_name("declaration") {
            if let Some(kind) = declaration_kind(tree.kind(decl), decl.kind()) {
                for name in declared_names(tree, decl) {
                    exports.push(ExportedName { name, kind });
                }
            }
            continue;
        }
        let reexport = child.child_by_field_name("source").is_some();
        let mut part_cursor = child.walk();
        for part in child.named_children(&mut part_cursor) {
            if part.kind() != "export_clause" {
                continue;
            }
            let mut spec_cursor = part.walk();
            for spec in part.named_children(&mut spec_cursor) {
                if spec.kind() != "export_specifier" {
                    continue;
                }
                let Some(local) = field_text(tree, spec, "name") else {
                    continue;
                };
                let exported = field_text(tree, spec, "alias").unwrap_or_else(|| local.clone());
                let kind = if reexport {
                    SymbolKind::ReExport
                } else {
                    local_kinds
                        .get(&local)
                        .copied()
                        .unwrap_or(SymbolKind::Variable)
                };
                exports.push(ExportedName {
                    name: exported,
                    kind,
                });
            }
        }
    }
    exports
}

/// Name of a function-like node, if it has one worth tracking.
fn function_name(tree: &SourceTree, node: Node<'_>) -> Option<String> {
    match tree.kind(node) {
        NodeKind::FunctionDeclaration
        | NodeKind::GeneratorFunctionDeclaration
        | NodeKind::MethodDefinition => field_text(tree, node, "name"),
        NodeKind::ArrowFunction | NodeKind::FunctionExpression => {
            let parent = node.parent()?;
            if tree.kind(parent) != NodeKind::VariableDeclarator {
                return None;
            }
            let name = parent.child_by_field_name("name")?;
            (tree.kind(name) == NodeKind::Identifier).then(|| tree.text(name).to_string())
        }
        _ => None,
    }
}

fn parameters(tree: &SourceTree, node: Node<'_>) -> Vec<Parameter> {
    if let Some(single) = node.child_by_field_name("parameter") {
        return vec![Parameter {
            name: tree.text(single).to_string(),
            type_text: None,
            optional: false,
        }];
    }
    let Some(list) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut cursor = list.walk();
    list.named_children(&mut cursor)
        .filter(|p| matches!(p.kind(), "required_parameter" | "optional_parameter"))
        .map(|p| Parameter {
            name: field_text(tree, p, "pattern").unwrap_or_default(),
            type_text: p
                .child_by_field_name("type")
                .map(|t| tree.text(t).trim_start_matches(':').trim().to_string()),
            optional: p.kind() == "optional_parameter",
        })
        .collect()
}

fn is_logical_operator(node: Node<'_>) -> bool {
    node.child_by_field_name("operator")
        .is_some_and(|op| matches!(op.kind(), "&&" | "||" | "??"))
}

/// 1 + decision points in the function's own body.
pub fn cyclomatic_complexity(tree: &SourceTree, function: Node<'_>) -> u32 {
    let Some(body) = function.child_by_field_name("body") else {
        return 1;
    };
    let mut complexity = 1;
    tree.walk_from(body, |kind, node| {
        if tree.is(node, KindAlias::FunctionLike) {
            return Walk::SkipChildren;
        }
        match kind {
            NodeKind::IfStatement
            | NodeKind::ForStatement
            | NodeKind::ForInStatement
            | NodeKind::WhileStatement
            | NodeKind::DoStatement
            | NodeKind::SwitchCase
            | NodeKind::CatchClause
            | NodeKind::TernaryExpression => complexity += 1,
            NodeKind::BinaryExpression if is_logical_operator(node) => complexity += 1,
            _ => {}
        }
        Walk::Continue
    });
    complexity
}

/// Declarations, methods and named arrow/function expressions, outermost first.
pub fn extract_functions(tree: &SourceTree, file: &str) -> Vec<FunctionInfo> {
    let mut functions = Vec::new();
    tree.walk(|_, node| {
        if !tree.is(node, KindAlias::FunctionLike) {
            return Walk::Continue;
        }
        if let Some(name) = function_name(tree, node) {
            functions.push(FunctionInfo {
                name,
                file: file.to_string(),
                start_line: node.start_position().row + 1,
                end_line: node.end_position().row + 1,
                parameters: parameters(tree, node),
                return_type: node
                    .child_by_field_name("return_type")
                    .map(|t| tree.text(t).trim_start_matches(':').trim().to_string()),
                complexity: cyclomatic_complexity(tree, node),
                is_async: has_token(&node, "async"),
            });
        }
        Walk::Continue
    });
    functions
}
