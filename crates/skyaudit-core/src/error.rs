// SPDX-License-Identifier: Apache-2.0

//! Error types for skyaudit.
//!
//! Uses `thiserror` for deriving `std::error::Error` implementations.
//! These errors only ever describe programming faults or unusable
//! configuration. Cloud query failures are reported as findings.

use thiserror::Error;

/// Errors that can occur while running checks.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The response cache does not have the shape a lookup expected.
    #[error("Malformed cache at {path}: {reason}")]
    MalformedCache {
        /// Dotted key path where the fault was detected.
        path: String,
        /// What was wrong with the node.
        reason: String,
    },

    /// Configuration file or environment error.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// I/O error while reading a cache or configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache JSON could not be parsed.
    #[error("Invalid cache JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScanError {
    /// Builds a `MalformedCache` error for the given key path.
    pub(crate) fn malformed<S: AsRef<str>>(path: &[S], reason: impl Into<String>) -> Self {
        ScanError::MalformedCache {
            path: path
                .iter()
                .map(AsRef::<str>::as_ref)
                .collect::<Vec<_>>()
                .join("."),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for ScanError {
    fn from(err: config::ConfigError) -> Self {
        ScanError::Config {
            message: err.to_string(),
        }
    }
}
