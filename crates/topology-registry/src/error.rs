//! Error types for the topology layer.

use thiserror::Error;

/// Structural errors raised by the record codec or by a definition's merge.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("record has no name (expected an object with one key, found {found})")]
    MissingName { found: &'static str },

    #[error("record carries {count} names, expected exactly one")]
    AmbiguousRecord { count: usize },

    #[error("unterminated record at line {line}, column {column}")]
    Unterminated { line: usize, column: usize },

    #[error("record stream exhausted")]
    Exhausted,

    #[error("malformed record stream: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("invalid body for record '{record}': {reason}")]
    InvalidBody { record: String, reason: String },

    #[error("record stream i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for WireError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_eof() {
            WireError::Unterminated { line: e.line(), column: e.column() }
        } else if e.is_io() {
            WireError::Io(e.into())
        } else {
            WireError::Malformed(e)
        }
    }
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("cluster registry is closed")]
    Closed,
}

/// Failure while shutting a component down.
#[derive(Debug, Error)]
pub enum CloseError {
    #[error("close failed: {0}")]
    Failed(String),

    /// Every failure collected while cascading over a set of components.
    #[error("{} component(s) failed to close: {}", .0.len(), describe(.0))]
    Cascade(Vec<(String, CloseError)>),
}

impl CloseError {
    /// Fold a cascade's failures into a result.
    pub fn from_failures(failures: Vec<(String, CloseError)>) -> Result<(), CloseError> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CloseError::Cascade(failures))
        }
    }
}

fn describe(failures: &[(String, CloseError)]) -> String {
    failures
        .iter()
        .map(|(name, e)| format!("'{name}': {e}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum NamespaceError {
    #[error("asset '{path}' already has a view of type {type_name}")]
    DuplicateView { path: String, type_name: &'static str },
}
