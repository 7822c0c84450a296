// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The enumeration source consumed by the snapshot pass.
//!
//! [`TopologySource`] bundles the three external collaborators a pass
//! talks to: the resource reader (per-node / per-record properties), the
//! generation oracle, and CPU identification. Every call may block on I/O.
//! Indices are stable user indices in `[0, num_nodes)`.

use crate::{
    CacheDescriptor, LinkRecord, MemoryBank, NodeProperties, SystemProperties, TopologyError,
};
use serde::{Deserialize, Serialize};

/// Outcome of reading one IO link entry.
///
/// `Unsupported` is a normal outcome (the remote node is not accessible)
/// and is consumed by the enumerator; it never reaches the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkRead {
    Found(LinkRecord),
    Unsupported,
    Failed(TopologyError),
}

/// Base properties of one node plus its peer-to-peer bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeReport {
    pub properties: NodeProperties,
    /// The node reported peer-to-peer links.
    pub p2p_links_present: bool,
    /// How many of `properties.num_io_links` are peer-to-peer entries.
    pub num_p2p_links: u32,
}

/// One logical processor as seen by CPU identification (`/proc/cpuinfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuIdRecord {
    pub proc_num: u32,
    pub apicid: u32,
    pub model_name: String,
}

/// The topology enumeration source.
pub trait TopologySource: Send + Sync {
    /// Current topology generation. Changes whenever the topology changes.
    fn generation(&self) -> Result<u32, TopologyError>;

    /// Platform summary, including the node count.
    fn system_properties(&self) -> Result<SystemProperties, TopologyError>;

    /// Base properties of node `node`.
    fn node_properties(&self, node: u32) -> Result<NodeReport, TopologyError>;

    /// Memory bank `bank` of node `node`.
    fn memory_bank(&self, node: u32, bank: u32) -> Result<MemoryBank, TopologyError>;

    /// Cache `cache` of node `node`.
    fn cache(&self, node: u32, cache: u32) -> Result<CacheDescriptor, TopologyError>;

    /// Link `link` of node `node`, from the peer-to-peer table if `p2p`.
    fn io_link(&self, node: u32, link: u32, p2p: bool) -> LinkRead;

    /// Per-processor identification records.
    fn cpu_identification(&self) -> Result<Vec<CpuIdRecord>, TopologyError>;

    /// Caches of CPU node `node` derived from CPU identification data. Used
    /// when the node itself reports no caches.
    fn cpu_caches(
        &self,
        node: u32,
        cpus: &[CpuIdRecord],
    ) -> Result<Vec<CacheDescriptor>, TopologyError>;
}
