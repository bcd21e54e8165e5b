//! Error taxonomy for the import engine.
//!
//! Every failure that terminates an import attempt is one of the variants
//! below. None of them are retried; callers decide what to do next.
//! Transform-level problems never show up here because transforms are total.

use std::path::PathBuf;

use thiserror::Error;

/// A mapping document that cannot be turned into a [`crate::mapping::MappingSpec`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("validation error: cannot read mapping document {path:?}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("validation error: could not parse mapping document: {0}")]
    Malformed(String),

    #[error("validation error: mapping is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("validation error: target table name must not be empty")]
    EmptyTable,

    #[error("validation error: mapping defines no column mappings")]
    NoMappings,

    #[error("validation error: target column '{0}' is mapped more than once")]
    DuplicateTarget(String),

    #[error("validation error: column mapping for '{target}' does not name a source column")]
    MissingSourceColumn { target: String },

    #[error("validation error: unknown transform '{name}' on column '{target}'")]
    UnknownTransform { target: String, name: String },

    #[error("validation error: primary key '{0}' is not one of the target columns")]
    PrimaryKeyNotMapped(String),

    #[error("validation error: unsupported declared format '{0}'")]
    UnknownFormat(String),

    #[error("validation error: unknown encoding '{0}'")]
    UnknownEncoding(String),
}

/// Failures while materializing a source file into rows.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("load error: unsupported format '{format}' for {path:?}")]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("load error: cannot read {path:?}: {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("load error: malformed content in {path:?}: {reason}")]
    MalformedContent { path: PathBuf, reason: String },
}

impl LoadError {
    pub(crate) fn malformed(path: &std::path::Path, reason: impl ToString) -> Self {
        LoadError::MalformedContent {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// The target store rejected part of a write batch.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cannot open target store {handle}: {source}")]
    Open {
        handle: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("write to table '{table}' failed: {source}")]
    Write {
        table: String,
        #[source]
        source: rusqlite::Error,
    },
}

/// Anything that aborts a single `run_import` invocation.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("dataset not found: {0:?}")]
    DatasetNotFound(PathBuf),

    #[error("attachment not found: '{name}' in dataset '{dataset}'")]
    AttachmentNotFound { dataset: String, name: String },

    #[error("attachment registry error in {path:?}: {reason}")]
    Registry { path: PathBuf, reason: String },

    #[error("storage write error: {0}")]
    StorageWrite(#[from] StorageError),

    #[error("import log error in {path:?}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
