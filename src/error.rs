//! Error types for schema handling, overlay resolution and output

use thiserror::Error;

/// Malformed or unusable schema. Always fatal for the response.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unrecognized schema type `{kind}` at `{path}`")]
    UnknownKind { path: String, kind: String },

    #[error("schema at `{path}` is not an object: {found}")]
    Malformed { path: String, found: String },

    #[error("two columns share the header `{0}`")]
    DuplicateHeader(String),
}

/// A dynamic schema resolver failed; the whole response is aborted
#[derive(Debug, Error)]
#[error("failed to resolve dynamic schema at `{path}`")]
pub struct OverlayResolutionError {
    pub path: String,
    #[source]
    pub source: anyhow::Error,
}

/// Failure while pushing rows into an output sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("csv write failed")]
    Csv(#[from] csv::Error),

    #[error("output write failed")]
    Io(#[from] std::io::Error),

    #[error("worksheet write failed")]
    Worksheet(#[source] anyhow::Error),

    #[error("sink is already finished")]
    Finished,
}

/// Invalid process-wide configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("separator `{0}` must be a single ASCII character")]
    Separator(char),

    #[error("max_array_elements must be at least 1")]
    ArrayWidth,

    #[error("injection prefix `{0}` is itself a risky character")]
    RiskyPrefix(char),

    #[error("resolver_concurrency must be at least 1")]
    Concurrency,
}

/// Anything that can abort a tabular export
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Overlay(#[from] OverlayResolutionError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
