//! Error types for oscat_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using oscat_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving or materializing objects.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while reading the store.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Writing to the output sink failed.
    #[error("unable to write output: {source}")]
    Output { source: std::io::Error },

    /// Object file is corrupted or invalid.
    #[error("Corrupted object at {path}: {reason}")]
    CorruptedObject { path: PathBuf, reason: String },

    /// Object file header is malformed.
    #[error("Invalid object header: {reason}")]
    InvalidHeader { reason: String },

    /// Invalid hash format or encoding.
    #[error("Invalid hash: {reason}")]
    InvalidHash { reason: String },

    /// Object not found in store.
    #[error("Object not found: {hash}")]
    ObjectNotFound { hash: String },

    /// A user supplied object name did not resolve.
    #[error("Not a valid object name {name}")]
    InvalidObjectName { name: String },

    /// A hex prefix matched more than one object.
    #[error("short object ID {prefix} is ambiguous")]
    AmbiguousObjectName { prefix: String },

    /// A path inside a tree does not exist.
    #[error("path '{path}' does not exist in '{rev}'")]
    PathNotFound { rev: String, path: String },

    /// Operation needs a path and none was given.
    #[error("{operation} {name}: <object> must be <rev:path>")]
    PathRequired { operation: &'static str, name: String },

    /// Tag object header is missing or malformed.
    #[error("{hash} not a valid tag")]
    InvalidTag { hash: String },

    /// Store is invalid or not initialized.
    #[error("Invalid store at {path}: {reason}")]
    InvalidStore { path: PathBuf, reason: String },

    /// Invalid config file contents.
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// Invalid reference name or format.
    #[error("Invalid reference: {reason}")]
    InvalidRef { reason: String },

    /// Reference not found.
    #[error("Reference not found: {name}")]
    RefNotFound { name: String },

    /// Invalid object type.
    #[error("Invalid object type: expected {expected}, got {got}")]
    InvalidObjectType { expected: String, got: String },

    /// Object header names a type this store does not know.
    #[error("object {hash} has unknown type id {type_id}")]
    UnknownObjectType { hash: String, type_id: u8 },

    /// UTF-8 encoding error.
    #[error("UTF-8 error: {source}")]
    Utf8Error {
        #[from]
        source: std::str::Utf8Error,
    },

    /// Invalid tree entry.
    #[error("Invalid tree entry: {reason}")]
    InvalidTreeEntry { reason: String },

    /// Unsupported algorithm.
    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    /// Compression or decompression error.
    #[error("Compression error: {reason}")]
    Compression { reason: String },

    /// An external filter or textconv command failed.
    #[error("{kind} command '{command}' failed for '{path}': {reason}")]
    FilterFailed {
        kind: &'static str,
        command: String,
        path: String,
        reason: String,
    },
}

impl Error {
    /// Create an Output error.
    pub fn output(source: std::io::Error) -> Self {
        Error::Output { source }
    }

    /// Create a CorruptedObject error.
    pub fn corrupted_object(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptedObject {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidHeader error.
    pub fn invalid_header(reason: impl Into<String>) -> Self {
        Error::InvalidHeader {
            reason: reason.into(),
        }
    }

    /// Create an InvalidHash error.
    pub fn invalid_hash(reason: impl Into<String>) -> Self {
        Error::InvalidHash {
            reason: reason.into(),
        }
    }

    /// Create an ObjectNotFound error.
    pub fn object_not_found(hash: impl Into<String>) -> Self {
        Error::ObjectNotFound { hash: hash.into() }
    }

    /// Create an InvalidObjectName error.
    pub fn invalid_object_name(name: impl Into<String>) -> Self {
        Error::InvalidObjectName { name: name.into() }
    }

    /// Create an AmbiguousObjectName error.
    pub fn ambiguous_object_name(prefix: impl Into<String>) -> Self {
        Error::AmbiguousObjectName {
            prefix: prefix.into(),
        }
    }

    /// Create a PathNotFound error.
    pub fn path_not_found(rev: impl Into<String>, path: impl Into<String>) -> Self {
        Error::PathNotFound {
            rev: rev.into(),
            path: path.into(),
        }
    }

    /// Create a PathRequired error.
    pub fn path_required(operation: &'static str, name: impl Into<String>) -> Self {
        Error::PathRequired {
            operation,
            name: name.into(),
        }
    }

    /// Create an InvalidTag error.
    pub fn invalid_tag(hash: impl Into<String>) -> Self {
        Error::InvalidTag { hash: hash.into() }
    }

    /// Create an InvalidStore error.
    pub fn invalid_store(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an InvalidRef error.
    pub fn invalid_ref(reason: impl Into<String>) -> Self {
        Error::InvalidRef {
            reason: reason.into(),
        }
    }

    /// Create a RefNotFound error.
    pub fn ref_not_found(name: impl Into<String>) -> Self {
        Error::RefNotFound { name: name.into() }
    }

    /// Create an InvalidObjectType error.
    pub fn invalid_object_type(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::InvalidObjectType {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create an UnknownObjectType error.
    pub fn unknown_object_type(hash: impl Into<String>, type_id: u8) -> Self {
        Error::UnknownObjectType {
            hash: hash.into(),
            type_id,
        }
    }

    /// Create an InvalidTreeEntry error.
    pub fn invalid_tree_entry(reason: impl Into<String>) -> Self {
        Error::InvalidTreeEntry {
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedAlgorithm error.
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Error::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// Create a Compression error.
    pub fn compression_error(reason: impl Into<String>) -> Self {
        Error::Compression {
            reason: reason.into(),
        }
    }

    /// Create a FilterFailed error.
    pub fn filter_failed(
        kind: &'static str,
        command: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::FilterFailed {
            kind,
            command: command.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }
}

// Additional From implementations for external error types

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}

impl From<ignore::Error> for Error {
    fn from(err: ignore::Error) -> Self {
        // ignore::Error can wrap an io::Error or be a pattern/path error
        match err.io_error() {
            Some(io_err) => Error::Io {
                source: std::io::Error::new(io_err.kind(), io_err.to_string()),
            },
            None => Error::Io {
                source: std::io::Error::other(err.to_string()),
            },
        }
    }
}
