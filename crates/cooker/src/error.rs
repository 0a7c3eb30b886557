//! Error types for the cooking pipeline.
//!
//! Every listed condition is fatal for the run: a partially-resolved load
//! order or a partially-written archive is not a valid artifact, so errors
//! propagate straight up to the caller with enough context (path, stage) to
//! diagnose. There are no automatic retries.

use std::path::PathBuf;
use thiserror::Error;

use crate::bsa::BsaError;

pub type Result<T> = std::result::Result<T, CookError>;

/// Errors that can abort a cooking run.
#[derive(Debug, Error)]
pub enum CookError {
    /// An input manifest line did not match its expected format.
    #[error("malformed manifest '{path}' at line {line}")]
    MalformedManifest { path: PathBuf, line: usize },

    /// The modlist path does not sit inside an MO2 profile directory, so the
    /// rest of the filesystem layout cannot be derived from it.
    #[error("'{path}' is not a modlist inside an MO2 profile directory")]
    InvalidLayout { path: PathBuf },

    /// An active plugin has no backing file in any enabled mod.
    #[error("active plugin '{plugin}' has no source file in any enabled mod")]
    MissingPluginSource { plugin: String },

    /// An archive container could not be opened or one of its entries could
    /// not be extracted.
    #[error("failed to read archive '{path}'")]
    ArchiveRead {
        path: PathBuf,
        #[source]
        source: BsaError,
    },

    /// Building or finalizing an output archive failed.
    #[error("failed to write archive '{path}'")]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: BsaError,
    },

    /// A filesystem operation failed.
    #[error("I/O error on '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A pooled task panicked or was cancelled before completing.
    #[error("background task failed: {reason}")]
    TaskJoin { reason: String },
}

impl CookError {
    /// Attach a path to a raw I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
