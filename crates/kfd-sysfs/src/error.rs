// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the sysfs topology source.

use kfd_topology::TopologyError;

/// Errors that can occur when reading the KFD sysfs tree or procfs.
#[derive(Debug, thiserror::Error)]
pub enum SysfsError {
    /// Failed to read a sysfs or procfs file.
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    /// A file was readable but its contents were malformed.
    #[error("failed to parse value from {path}: {detail}")]
    ParseError { path: String, detail: String },

    /// The expected path does not exist (no KFD driver loaded?).
    #[error("sysfs path not found: {path}")]
    NotAvailable { path: String },

    /// Configuration could not be loaded or serialized.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<SysfsError> for TopologyError {
    fn from(e: SysfsError) -> Self {
        match &e {
            SysfsError::ReadError { path, .. }
            | SysfsError::ParseError { path, .. }
            | SysfsError::NotAvailable { path } => {
                TopologyError::unavailable(path.clone(), e.to_string())
            }
            SysfsError::Config(_) => TopologyError::unavailable("configuration", e.to_string()),
        }
    }
}
