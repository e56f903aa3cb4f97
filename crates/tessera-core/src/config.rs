//! Core data types and configuration for Tessera analysis.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::rules::Severity;

/// Coarse classification of a file inferred from its path.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    Controller,
    Service,
    Repository,
    Util,
    Type,
    Config,
    Test,
    #[default]
    Unknown,
}

impl FileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Controller => "controller",
            Self::Service => "service",
            Self::Repository => "repository",
            Self::Util => "util",
            Self::Type => "type",
            Self::Config => "config",
            Self::Test => "test",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of an exported symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    TypeAlias,
    Enum,
    Variable,
    Default,
    ReExport,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::TypeAlias => "typeAlias",
            Self::Enum => "enum",
            Self::Variable => "variable",
            Self::Default => "default",
            Self::ReExport => "reExport",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `import`/`export ... from` statement as written in the source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportDescriptor {
    /// The module specifier, e.g. `./user.service.js` or `express`.
    pub source: String,
    /// Imported names: `default` for a default binding, `*` for a namespace.
    pub specifiers: Vec<String>,
    pub type_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    pub type_text: Option<String>,
    pub optional: bool,
}

/// A function-like construct: declaration, method, or named arrow/function expression.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInfo {
    pub name: String,
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    /// Cyclomatic complexity, never below 1.
    pub complexity: u32,
    pub is_async: bool,
}

/// A source file in the project. Replaced wholesale whenever it is rescanned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    /// Project-relative, forward-slash path. Unique key of the file.
    pub path: String,
    pub role: FileRole,
    pub layer: Option<String>,
    pub exports: Vec<String>,
    pub imports: Vec<ImportDescriptor>,
    /// Sum of the complexity of the file's functions.
    pub complexity: u32,
    pub lines: usize,
    pub functions: Vec<FunctionInfo>,
}

/// An exported symbol, keyed `file:exportedName`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub file: String,
    /// Files importing this symbol. Recomputed from the edge list on every (re)build.
    #[serde(default)]
    pub used_by: BTreeSet<String>,
    /// Reserved for symbol-level dependencies; never populated by the core.
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
    pub is_public_api: bool,
}

impl Symbol {
    pub fn make_id(file: &str, name: &str) -> String {
        format!("{file}:{name}")
    }
}

/// A resolved relative import from one file to another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub specifiers: Vec<String>,
    pub type_only: bool,
}

/// A project convention discovered by the host. Carried, never interpreted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConventionPattern {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Configuration for an analysis session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Compiler configuration, relative to `root`.
    #[serde(default = "default_compiler_config")]
    pub compiler_config: PathBuf,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default = "default_blocking_severities")]
    pub blocking_severities: Vec<Severity>,
    #[serde(default)]
    pub ignored_rules: Vec<String>,
    #[serde(default)]
    pub ignored_files: Vec<String>,
    /// Plugin name -> plugin configuration.
    #[serde(default)]
    pub plugins: BTreeMap<String, serde_json::Value>,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_compiler_config() -> PathBuf {
    PathBuf::from("tsconfig.json")
}
fn default_exclude() -> Vec<String> {
    vec!["**/node_modules/**".to_string(), "**/*.d.ts".to_string()]
}
fn default_blocking_severities() -> Vec<Severity> {
    vec![Severity::Critical, Severity::Error]
}
fn default_use_cache() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            compiler_config: default_compiler_config(),
            include: Vec::new(),
            exclude: default_exclude(),
            layers: Vec::new(),
            blocking_severities: default_blocking_severities(),
            ignored_rules: Vec::new(),
            ignored_files: Vec::new(),
            plugins: BTreeMap::new(),
            use_cache: default_use_cache(),
        }
    }
}

impl AnalysisConfig {
    /// Config rooted at `root` with every other field defaulted.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn compiler_config_path(&self) -> PathBuf {
        if self.compiler_config.is_absolute() {
            self.compiler_config.clone()
        } else {
            self.root.join(&self.compiler_config)
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_config_defaults() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.compiler_config, PathBuf::from("tsconfig.json"));
        assert!(cfg.include.is_empty());
        assert_eq!(cfg.exclude, vec!["**/node_modules/**", "**/*.d.ts"]);
        assert_eq!(
            cfg.blocking_severities,
            vec![Severity::Critical, Severity::Error]
        );
        assert!(cfg.use_cache);
    }

    #[test]
    fn analysis_config_partial_json() {
        let cfg: AnalysisConfig =
            serde_json::from_str(r#"{"root": "/repo", "layers": ["domain"]}"#).unwrap();
        assert_eq!(cfg.root, PathBuf::from("/repo"));
        assert_eq!(cfg.layers, vec!["domain"]);
        assert_eq!(cfg.compiler_config_path(), PathBuf::from("/repo/tsconfig.json"));
        assert_eq!(cfg.exclude.len(), 2);
    }

    #[test]
    fn file_role_serializes_lowercase() {
        let json = serde_json::to_string(&FileRole::Repository).unwrap();
        assert_eq!(json, "\"repository\"");
        assert_eq!(FileRole::default(), FileRole::Unknown);
    }

    #[test]
    fn symbol_serialization() {
        let sym = Symbol {
            id: Symbol::make_id("src/a.ts", "run"),
            name: "run".to_string(),
            kind: SymbolKind::Function,
            file: "src/a.ts".to_string(),
            used_by: BTreeSet::from(["src/b.ts".to_string()]),
            depends_on: BTreeSet::new(),
            is_public_api: false,
        };
        let json = serde_json::to_string(&sym).unwrap();
        assert!(json.contains("\"id\":\"src/a.ts:run\""));
        assert!(json.contains("\"usedBy\":[\"src/b.ts\"]"));
        assert!(json.contains("\"kind\":\"function\""));
    }

    #[test]
    fn symbol_kind_display() {
        assert_eq!(SymbolKind::TypeAlias.to_string(), "typeAlias");
        assert_eq!(SymbolKind::Default.to_string(), "default");
    }
}
