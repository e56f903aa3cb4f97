//! The knowledge graph, its read-only query layer and the on-disk cache.

pub mod cache;
pub mod knowledge_graph;
pub mod query;

pub use knowledge_graph::KnowledgeGraph;
pub use query::{GraphQuery, GraphStats};
