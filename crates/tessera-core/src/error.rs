//! Error taxonomy for the core.
//!
//! Only configuration problems, kernel invariant violations and cache writes
//! surface as [`TesseraError`]. Per-file and per-rule failures are recovered
//! where they happen and never reach this type.

use std::path::PathBuf;

use thiserror::Error;

/// Failure raised by a rule body or a plugin hook.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum TesseraError {
    #[error("cannot read compiler configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid compiler configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid glob pattern `{pattern}`: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: ignore::Error,
    },

    #[error("plugin `{0}` is already installed")]
    DuplicatePlugin(String),

    #[error("plugin `{plugin}` requires `{dependency}`, which is not installed")]
    MissingDependency { plugin: String, dependency: String },

    #[error("plugin `{plugin}` is required by `{dependent}`")]
    PluginInUse { plugin: String, dependent: String },

    #[error("plugin `{0}` is not installed")]
    UnknownPlugin(String),

    #[error("rule `{0}` is already registered")]
    DuplicateRule(String),

    #[error("plugin `{plugin}` failed to install: {source}")]
    PluginInstall {
        plugin: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TesseraError>;
