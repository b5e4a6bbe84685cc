//! Error types for the outreach-common crate.
//!
//! Both kinds here are fatal for a run: they surface before the first
//! contact is processed (or when the final save fails) and abort the process.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised by the contact store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The contact file does not exist.
    #[error("Contact file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Reading, writing or renaming the contact file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid delimited text.
    #[error("Malformed contact file: {0}")]
    Csv(#[from] csv::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Invalid or missing configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be used.
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The dotenv file exists but cannot be read or parsed.
    #[error("Cannot load {}: {reason}", path.display())]
    EnvFile { path: PathBuf, reason: String },
}
