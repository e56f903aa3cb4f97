//! Tessera Core: static analysis engine for TypeScript projects.
//!
//! This crate builds a knowledge graph of files, exported symbols and import
//! edges, keeps it current incrementally, and runs plugin-provided rules over
//! it with inline suppression and a severity-based blocking policy.

pub mod config;
pub mod error;
pub mod graph;
pub mod incremental;
pub mod languages;
pub mod phases;
pub mod pipeline;
pub mod plugins;
pub mod rules;

pub use config::AnalysisConfig;
pub use error::{BoxError, Result, TesseraError};
pub use graph::{GraphQuery, GraphStats, KnowledgeGraph};
pub use incremental::{update_graph, UpdateResult};
pub use languages::{SourceTree, SyntaxProvider, TypeScriptProvider};
pub use pipeline::build_graph;
pub use plugins::{KernelAdapter, Plugin, PluginKernel};
pub use rules::{Finding, Rule, RuleContext, RuleEngine, RunOptions, RunResult, Severity};
