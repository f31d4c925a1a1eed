// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use crate::store::StorageError;

/// Error type for every annotation model operation.
///
/// The first three variants carry the model's own taxonomy: bad input from
/// the caller, inconsistent imported data, and broken internal invariants.
/// The remaining variants wrap failures of the ambient stack (file I/O, JSON
/// and configuration parsing, persistence).
#[derive(Debug)]
pub enum Error {
    /// The caller supplied an invalid argument: wrong point count, unknown
    /// client id, mismatched labels in a merge, invalid attribute value.
    ArgumentError(String),
    /// Imported or constructed data is internally inconsistent, such as an
    /// unknown shape type string or attribute input type.
    DataError(String),
    /// An internal invariant was violated by the calling code, for example
    /// saving a shape with a frame other than its own.
    ScriptingError(String),
    /// An I/O error occurred during file operations.
    IoError(std::io::Error),
    /// JSON serialization or deserialization error.
    JsonError(serde_json::Error),
    /// Configuration parsing or loading error.
    ConfigError(config::ConfigError),
    /// The persistence collaborator failed.
    StorageError(StorageError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::ConfigError(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::StorageError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ArgumentError(s) => write!(f, "Argument error: {}", s),
            Error::DataError(s) => write!(f, "Data error: {}", s),
            Error::ScriptingError(s) => write!(f, "Scripting error: {}", s),
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::JsonError(e) => write!(f, "JSON error: {}", e),
            Error::ConfigError(e) => write!(f, "Configuration error: {}", e),
            Error::StorageError(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::JsonError(e) => Some(e),
            Error::ConfigError(e) => Some(e),
            Error::StorageError(e) => Some(e),
            _ => None,
        }
    }
}
