//! Error types for watching and rendering.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the watch session and path registration.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to initialize watcher: {0}")]
    Init(#[source] notify::Error),

    #[error("cannot stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("cannot watch {path}: {source}")]
    PathWatch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("cannot unwatch {path}: {source}")]
    Unwatch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("{path} is not being watched")]
    NotWatched { path: PathBuf },

    /// Asynchronous failure reported by the backend while running.
    #[error("{0}")]
    Backend(#[source] notify::Error),

    #[error("backend dropped events, changes may have been missed")]
    Rescan,

    #[error("watch session is closed")]
    Closed,
}

/// Errors from compiling an output template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed action starting at offset {offset}")]
    Unclosed { offset: usize },

    #[error("empty action at offset {offset}")]
    EmptyAction { offset: usize },

    #[error("can't evaluate field {name} (available: Name, Op)")]
    UnknownField { name: String },

    #[error("unsupported action {{{{{action}}}}}")]
    InvalidAction { action: String },
}

/// An event kind name that isn't one of create, write, remove, rename or chmod.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown event kind `{0}` (expected create, write, remove, rename, chmod, all or an integer mask)")]
pub struct ParseOpError(pub String);
