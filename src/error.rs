// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Library error type

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the gitmap core and its snapshot loader
#[derive(Debug, Error)]
pub enum GitmapError {
    /// A snapshot or output file could not be read or written
    #[error("I/O error: {source} (path: {path})")]
    Io {
        /// Underlying I/O failure
        source: std::io::Error,
        /// File involved
        path: PathBuf,
    },

    /// A snapshot document was missing required fields or was not valid JSON
    #[error("malformed snapshot {path}: {source}")]
    Snapshot {
        /// Decoder failure
        source: serde_json::Error,
        /// Snapshot file
        path: PathBuf,
    },

    /// Configuration values out of range or unreadable
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Nothing left to rank after cleaning
    #[error("no usable repositories in corpus")]
    EmptyCorpus,

    /// Adjacent hierarchy levels disagree about a cluster's identity
    #[error("tree consistency violation: expected {parent} to equal {child}")]
    TreeConsistency {
        /// Name of the node being collapsed
        parent: String,
        /// Name of its only child
        child: String,
    },
}

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, GitmapError>;

impl From<config::ConfigError> for GitmapError {
    fn from(e: config::ConfigError) -> Self {
        GitmapError::Config(e.to_string())
    }
}
