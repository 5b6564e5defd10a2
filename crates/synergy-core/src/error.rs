//! Centralized error types for synergy.

use thiserror::Error;

/// Main error type for synergy operations.
#[derive(Error, Debug)]
pub enum SynergyError {
    #[error("Store unreachable: {0}")]
    Connection(String),

    #[error("Relational store error during {op}: {message}")]
    Relational { op: String, message: String },

    #[error("Graph store error during {op}: {message}")]
    Graph { op: String, message: String },

    #[error("Resync batch at offset {offset} failed: {source}")]
    BatchFailed {
        offset: u64,
        #[source]
        source: Box<SynergyError>,
    },

    #[error("Resync batch at offset {offset} did not finish within {timeout:?}")]
    BatchTimedOut {
        offset: u64,
        timeout: std::time::Duration,
    },

    #[error("All {attempted} fuzzy queries failed; last error: {last}")]
    AllQueriesFailed {
        attempted: usize,
        #[source]
        last: Box<SynergyError>,
    },

    #[error("A resync is already in progress")]
    ResyncInProgress,

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for synergy operations.
pub type SynergyResult<T> = Result<T, SynergyError>;

impl SynergyError {
    /// Wrap a relational store failure with the operation it happened in.
    pub fn relational(op: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Relational {
            op: op.into(),
            message: err.to_string(),
        }
    }

    /// Wrap a graph store failure with the operation it happened in.
    pub fn graph(op: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Graph {
            op: op.into(),
            message: err.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
