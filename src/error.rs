//! Error types shared by the store, the CLI and the TUI.

use std::path::PathBuf;

use crate::config::ConfigError;

/// Errors raised by the task store and its persistence slot.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The slot exists but could not be read.
    #[error("failed to read task data from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The collection could not be written back.
    #[error("failed to write task data to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The stored value is not a valid task collection.
    #[error("corrupt task data in {location}: {source}")]
    Corrupt {
        location: String,
        source: serde_json::Error,
    },

    #[error("failed to encode tasks: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("task title must not be empty")]
    EmptyTitle,

    #[error("task {0} not found")]
    NotFound(String),
}

/// Top-level error for command handlers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A task identifier matched nothing, or more than one task.
    #[error("{0}")]
    Resolve(String),

    #[error("unrecognised due date '{0}'. Use YYYY-MM-DD, 'today', 'tomorrow', or 'in Nd'")]
    InvalidDue(String),

    #[error("a task cannot be its own ancestor")]
    ParentCycle,

    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
