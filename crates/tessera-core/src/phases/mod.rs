//! Per-file build phases shared by the full build and the incremental updater.

pub mod imports;
pub mod parsing;
pub mod structure;
