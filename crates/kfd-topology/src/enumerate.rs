// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Node enumeration: one node and all its sub-resources per call.
//!
//! For each node the enumerator reads, in index order:
//!
//! 1. base properties (plus the node's peer-to-peer bookkeeping),
//! 2. the CPU model name, when the node has CPU cores,
//! 3. memory banks `0..num_memory_banks`,
//! 4. caches `0..num_caches`, or derived CPU caches for a CPU node that
//!    reports none,
//! 5. standard links, then peer-to-peer links, sharing one slot counter
//!    capped at `num_nodes - 1`.
//!
//! Every sub-collection is owned by the returned [`NodeRecord`]; on error
//! the partially built node is dropped before the error propagates.

use crate::{
    CacheDescriptor, CpuIdRecord, LinkKind, LinkRead, LinkRecord, NodeProperties, NodeRecord,
    NodeReport, PassStats, TopologyError, TopologySource,
};

/// A node plus whether it reported peer-to-peer links.
#[derive(Debug)]
pub(crate) struct EnumeratedNode {
    pub record: NodeRecord,
    pub p2p_links_present: bool,
}

/// Drives a [`TopologySource`] across the nodes of one pass.
pub(crate) struct NodeEnumerator<'a, S: TopologySource + ?Sized> {
    source: &'a S,
    num_nodes: u32,
    /// CPU identification, read at most once per pass.
    cpus: Option<Vec<CpuIdRecord>>,
    pub stats: PassStats,
}

impl<'a, S: TopologySource + ?Sized> NodeEnumerator<'a, S> {
    pub fn new(source: &'a S, num_nodes: u32) -> Self {
        Self {
            source,
            num_nodes,
            cpus: None,
            stats: PassStats::default(),
        }
    }

    /// Maximum links per node: one per other node.
    pub fn link_capacity(&self) -> usize {
        self.num_nodes.saturating_sub(1) as usize
    }

    pub fn enumerate_node(&mut self, node: u32) -> Result<EnumeratedNode, TopologyError> {
        let NodeReport {
            mut properties,
            p2p_links_present,
            num_p2p_links,
        } = self.source.node_properties(node)?;

        tracing::debug!(
            node,
            gpu_id = properties.gpu_id,
            banks = properties.num_memory_banks,
            caches = properties.num_caches,
            io_links = properties.num_io_links,
            p2p_links = num_p2p_links,
            "enumerating node"
        );

        if properties.num_cpu_cores > 0 {
            let cpus = cpu_records(&mut self.cpus, self.source)?;
            resolve_cpu_model_name(&mut properties, cpus);
        }

        let mut memory_banks = reserve(properties.num_memory_banks as usize, || {
            format!("memory banks of node {node}")
        })?;
        for bank in 0..properties.num_memory_banks {
            memory_banks.push(self.source.memory_bank(node, bank)?);
        }

        let caches = self.read_caches(node, &properties)?;
        properties.num_caches = caches.len() as u32;

        let capacity = self.link_capacity();
        let mut links = reserve(capacity, || format!("io links of node {node}"))?;
        let num_standard = properties.num_io_links.saturating_sub(num_p2p_links);
        self.read_links(node, num_standard, false, capacity, &mut links)?;
        self.read_links(node, num_p2p_links, true, capacity, &mut links)?;
        properties.num_io_links = links.len() as u32;

        self.stats.nodes += 1;
        self.stats.memory_banks += memory_banks.len() as u32;
        self.stats.caches += caches.len() as u32;

        Ok(EnumeratedNode {
            record: NodeRecord {
                properties,
                memory_banks,
                caches,
                links,
            },
            p2p_links_present,
        })
    }

    fn read_caches(
        &mut self,
        node: u32,
        properties: &NodeProperties,
    ) -> Result<Vec<CacheDescriptor>, TopologyError> {
        if properties.num_caches > 0 {
            let mut caches = reserve(properties.num_caches as usize, || {
                format!("caches of node {node}")
            })?;
            for cache in 0..properties.num_caches {
                caches.push(self.source.cache(node, cache)?);
            }
            Ok(caches)
        } else if !properties.is_gpu() {
            let cpus = cpu_records(&mut self.cpus, self.source)?;
            self.source.cpu_caches(node, cpus)
        } else {
            Ok(Vec::new())
        }
    }

    /// Reads `count` link entries from one table into `links`.
    ///
    /// The source index always advances; the slot count only advances on a
    /// found link. Stops early once `capacity` slots are filled.
    fn read_links(
        &mut self,
        node: u32,
        count: u32,
        p2p: bool,
        capacity: usize,
        links: &mut Vec<LinkRecord>,
    ) -> Result<(), TopologyError> {
        for link in 0..count {
            if links.len() >= capacity {
                tracing::debug!(node, link, p2p, "link slots exhausted");
                break;
            }
            match self.source.io_link(node, link, p2p) {
                LinkRead::Found(mut record) => {
                    record.kind = LinkKind::Direct;
                    record.p2p = p2p;
                    links.push(record);
                    if p2p {
                        self.stats.p2p_links += 1;
                    } else {
                        self.stats.direct_links += 1;
                    }
                }
                LinkRead::Unsupported => {
                    tracing::debug!(node, link, p2p, "skipping unsupported link");
                    self.stats.skipped_links += 1;
                }
                LinkRead::Failed(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Returns the pass's CPU identification records, reading them on first use.
fn cpu_records<'c, S: TopologySource + ?Sized>(
    slot: &'c mut Option<Vec<CpuIdRecord>>,
    source: &S,
) -> Result<&'c [CpuIdRecord], TopologyError> {
    if slot.is_none() {
        *slot = Some(source.cpu_identification()?);
    }
    Ok(slot.as_deref().unwrap_or(&[]))
}

/// Names a node after the processor whose APIC id matches its first CPU
/// core id.
pub(crate) fn resolve_cpu_model_name(properties: &mut NodeProperties, cpus: &[CpuIdRecord]) {
    let Some(cpu) = cpus.iter().find(|c| c.apicid == properties.ccompute_id_lo) else {
        return;
    };
    if properties.device_id == 0 {
        properties.amd_name = cpu.model_name.clone();
    }
    properties.marketing_name = cpu.model_name.clone();
}

/// Allocates a vector with exactly `n` slots, reporting allocation failure.
fn reserve<T>(n: usize, context: impl FnOnce() -> String) -> Result<Vec<T>, TopologyError> {
    let mut v = Vec::new();
    v.try_reserve_exact(n)
        .map_err(|_| TopologyError::OutOfMemory { context: context() })?;
    Ok(v)
}
