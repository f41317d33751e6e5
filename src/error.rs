//! Error types for rust-sqllineage

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a snapshot or writing the model document
#[derive(Error, Debug)]
pub enum LineageError {
    #[error("Failed to read snapshot file: {path}")]
    SnapshotReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode snapshot file: {path}")]
    SnapshotParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Snapshot file {path} is not valid text: {message}")]
    SnapshotEncodingError { path: PathBuf, message: String },

    #[error("Failed to read routine file: {path}")]
    RoutineReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize model document: {message}")]
    ModelSerializationError { message: String },

    #[error("Failed to write model document to {path}")]
    ModelWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<serde_json::Error> for LineageError {
    fn from(err: serde_json::Error) -> Self {
        LineageError::ModelSerializationError {
            message: err.to_string(),
        }
    }
}

/// A syntax error in one routine body. Never fatal to a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Line {line}: {message}")]
pub struct RoutineParseError {
    pub line: u64,
    pub message: String,
}

impl RoutineParseError {
    pub fn new(line: u64, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}
