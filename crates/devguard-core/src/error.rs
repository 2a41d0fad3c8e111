// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Error types.
//!
//! Only [`ConfigurationError`] ever reaches a caller. [`ProbeError`] stays inside
//! the probe that produced it and is downgraded to an outcome there.

use std::io;

use thiserror::Error;

/// Malformed or incomplete probe catalog. Raised at engine construction only.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("unsupported catalog format for {path} (expected .json or .toml)")]
    UnsupportedFormat { path: String },

    #[error("invalid JSON catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML catalog: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("category name must not be empty")]
    EmptyCategory,

    #[error("catalog defines no probes")]
    EmptyCatalog,

    #[error("probe {probe} has unknown kind '{kind}'")]
    UnknownKind { probe: String, kind: String },

    #[error("probe {probe} ({kind}) is missing required parameter '{parameter}'")]
    MissingParameter {
        probe: String,
        kind: String,
        parameter: &'static str,
    },

    #[error("probe {probe}: invalid value for '{parameter}': {message}")]
    InvalidParameter {
        probe: String,
        parameter: &'static str,
        message: String,
    },

    #[error("probe id '{0}' is declared more than once")]
    DuplicateProbeId(String),

    #[error("invalid sweep setting '{field}': {message}")]
    InvalidSetting { field: &'static str, message: String },
}

/// Why a single probe could not produce a definite answer.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The signal has no meaning on this platform.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The signal exists but could not be read right now.
    #[error("{0}")]
    Unavailable(String),
}

impl ProbeError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ProbeError::Unsupported(_))
    }
}
