// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for topology snapshotting.

/// Errors that can occur while building or reading a topology snapshot.
///
/// Only [`TopologyError::ResourceUnavailable`] and
/// [`TopologyError::OutOfMemory`] abort a pass outright. A
/// [`TopologyError::NotSupported`] link is skipped by the enumerator, and
/// [`TopologyError::Inconsistent`] is what the coordinator reports after its
/// retry budget is spent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    /// Storage for a candidate snapshot could not be reserved.
    #[error("out of memory while allocating {context}")]
    OutOfMemory { context: String },

    /// A node, bank, cache, or link record could not be read.
    #[error("resource unavailable: {resource}: {detail}")]
    ResourceUnavailable { resource: String, detail: String },

    /// The source does not support this record (e.g. a link to an
    /// inaccessible node).
    #[error("not supported: {resource}")]
    NotSupported { resource: String },

    /// The generation counter kept changing across every attempted pass.
    #[error("topology changed during enumeration ({attempts} attempts)")]
    Inconsistent { attempts: u32 },

    /// A node index outside the published snapshot.
    #[error("invalid node {node}: snapshot has {num_nodes} nodes")]
    InvalidNode { node: u32, num_nodes: u32 },

    /// No snapshot has been published yet.
    #[error("no topology snapshot has been taken")]
    NoSnapshot,
}

impl TopologyError {
    /// Shorthand for a [`TopologyError::ResourceUnavailable`].
    pub fn unavailable(resource: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            resource: resource.into(),
            detail: detail.into(),
        }
    }
}
