// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! An in-memory [`TopologySource`].
//!
//! [`StaticSource`] serves a fixed topology. It is serde-(de)serializable,
//! so a snapshot captured on real hardware can be written to disk with
//! [`StaticSource::from_snapshot`] and replayed later, and it doubles as the
//! fixture type for tests and benchmarks.

use crate::{
    CacheDescriptor, CpuIdRecord, IoLinkType, LinkKind, LinkRead, LinkRecord, MemoryBank,
    NodeProperties, NodeReport, SystemProperties, SystemSnapshot, TopologyError, TopologySource,
};
use serde::{Deserialize, Serialize};

/// One node of a [`StaticSource`].
///
/// Counts in `properties` are ignored; they are derived from the vectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticNode {
    pub properties: NodeProperties,
    pub memory_banks: Vec<MemoryBank>,
    pub caches: Vec<CacheDescriptor>,
    /// Standard link table. `None` entries read as not supported.
    pub io_links: Vec<Option<LinkRecord>>,
    /// Peer-to-peer link table.
    pub p2p_links: Vec<Option<LinkRecord>>,
    /// Caches served by CPU identification when `caches` is empty.
    pub cpu_caches: Vec<CacheDescriptor>,
}

impl StaticNode {
    /// A CPU node with `cores` cores.
    pub fn cpu(cores: u32) -> Self {
        Self {
            properties: NodeProperties {
                num_cpu_cores: cores,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// A GPU node with a public frame-buffer heap.
    pub fn gpu(gpu_id: u32) -> Self {
        Self {
            properties: NodeProperties {
                gpu_id,
                num_f_compute_cores: 64,
                num_xcc: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_properties(mut self, f: impl FnOnce(&mut NodeProperties)) -> Self {
        f(&mut self.properties);
        self
    }

    pub fn with_bank(mut self, bank: MemoryBank) -> Self {
        self.memory_banks.push(bank);
        self
    }

    pub fn with_cache(mut self, cache: CacheDescriptor) -> Self {
        self.caches.push(cache);
        self
    }

    pub fn with_cpu_cache(mut self, cache: CacheDescriptor) -> Self {
        self.cpu_caches.push(cache);
        self
    }

    /// Adds a standard link to `node_to`. `node_from` is set when the node
    /// is added to a source.
    pub fn with_link(mut self, node_to: u32, link_type: IoLinkType, weight: u32) -> Self {
        self.io_links.push(Some(direct(node_to, link_type, weight)));
        self
    }

    /// Adds a standard link entry that reads as not supported.
    pub fn with_unsupported_link(mut self) -> Self {
        self.io_links.push(None);
        self
    }

    pub fn with_p2p_link(mut self, node_to: u32, link_type: IoLinkType, weight: u32) -> Self {
        self.p2p_links.push(Some(direct(node_to, link_type, weight)));
        self
    }

    fn report(&self) -> NodeReport {
        let num_p2p_links = self.p2p_links.len() as u32;
        let mut properties = self.properties.clone();
        properties.num_memory_banks = self.memory_banks.len() as u32;
        properties.num_caches = self.caches.len() as u32;
        properties.num_io_links = self.io_links.len() as u32 + num_p2p_links;
        NodeReport {
            properties,
            p2p_links_present: num_p2p_links > 0,
            num_p2p_links,
        }
    }
}

fn direct(node_to: u32, link_type: IoLinkType, weight: u32) -> LinkRecord {
    LinkRecord {
        link_type,
        node_to,
        weight,
        ..Default::default()
    }
}

/// A fixed topology served from memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticSource {
    pub generation: u32,
    /// Platform fields. `num_nodes` is derived from `nodes`.
    pub system: SystemProperties,
    pub nodes: Vec<StaticNode>,
    pub cpus: Vec<CpuIdRecord>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node, stamping its index into every link's `node_from`.
    pub fn with_node(mut self, mut node: StaticNode) -> Self {
        let index = self.nodes.len() as u32;
        for link in node.io_links.iter_mut().chain(node.p2p_links.iter_mut()).flatten() {
            link.node_from = index;
        }
        self.nodes.push(node);
        self
    }

    pub fn with_cpu(mut self, cpu: CpuIdRecord) -> Self {
        self.cpus.push(cpu);
        self
    }

    pub fn with_generation(mut self, generation: u32) -> Self {
        self.generation = generation;
        self
    }

    /// Rebuilds the source a snapshot was read from.
    ///
    /// Indirect links are dropped since the resolver recreates them. Caches
    /// are served as reported caches.
    pub fn from_snapshot(snapshot: &SystemSnapshot) -> Self {
        let nodes = snapshot
            .nodes
            .iter()
            .map(|n| {
                let reported = n.links.iter().filter(|l| l.kind == LinkKind::Direct);
                StaticNode {
                    properties: n.properties.clone(),
                    memory_banks: n.memory_banks.clone(),
                    caches: n.caches.clone(),
                    io_links: reported.clone().filter(|l| !l.p2p).cloned().map(Some).collect(),
                    p2p_links: reported.filter(|l| l.p2p).cloned().map(Some).collect(),
                    cpu_caches: Vec::new(),
                }
            })
            .collect();
        Self {
            generation: snapshot.generation,
            system: snapshot.system,
            nodes,
            cpus: Vec::new(),
        }
    }

    fn node(&self, node: u32) -> Result<&StaticNode, TopologyError> {
        self.nodes
            .get(node as usize)
            .ok_or_else(|| TopologyError::unavailable(format!("node {node}"), "no such node"))
    }
}

impl TopologySource for StaticSource {
    fn generation(&self) -> Result<u32, TopologyError> {
        Ok(self.generation)
    }

    fn system_properties(&self) -> Result<SystemProperties, TopologyError> {
        Ok(SystemProperties {
            num_nodes: self.nodes.len() as u32,
            ..self.system
        })
    }

    fn node_properties(&self, node: u32) -> Result<NodeReport, TopologyError> {
        Ok(self.node(node)?.report())
    }

    fn memory_bank(&self, node: u32, bank: u32) -> Result<MemoryBank, TopologyError> {
        self.node(node)?
            .memory_banks
            .get(bank as usize)
            .cloned()
            .ok_or_else(|| {
                TopologyError::unavailable(format!("node {node} bank {bank}"), "no such bank")
            })
    }

    fn cache(&self, node: u32, cache: u32) -> Result<CacheDescriptor, TopologyError> {
        self.node(node)?
            .caches
            .get(cache as usize)
            .cloned()
            .ok_or_else(|| {
                TopologyError::unavailable(format!("node {node} cache {cache}"), "no such cache")
            })
    }

    fn io_link(&self, node: u32, link: u32, p2p: bool) -> LinkRead {
        let n = match self.node(node) {
            Ok(n) => n,
            Err(e) => return LinkRead::Failed(e),
        };
        let table = if p2p { &n.p2p_links } else { &n.io_links };
        match table.get(link as usize) {
            Some(Some(record)) => LinkRead::Found(record.clone()),
            Some(None) => LinkRead::Unsupported,
            None => LinkRead::Failed(TopologyError::unavailable(
                format!("node {node} link {link}"),
                "no such link",
            )),
        }
    }

    fn cpu_identification(&self) -> Result<Vec<CpuIdRecord>, TopologyError> {
        Ok(self.cpus.clone())
    }

    fn cpu_caches(
        &self,
        node: u32,
        _cpus: &[CpuIdRecord],
    ) -> Result<Vec<CacheDescriptor>, TopologyError> {
        Ok(self.node(node)?.cpu_caches.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_are_derived() {
        let src = StaticSource::new().with_node(
            StaticNode::gpu(7)
                .with_bank(MemoryBank::default())
                .with_link(1, IoLinkType::PciExpress, 20)
                .with_unsupported_link()
                .with_p2p_link(2, IoLinkType::Xgmi, 15),
        );
        let report = src.node_properties(0).unwrap();
        assert_eq!(report.properties.num_memory_banks, 1);
        assert_eq!(report.properties.num_io_links, 3);
        assert_eq!(report.num_p2p_links, 1);
        assert!(report.p2p_links_present);
    }

    #[test]
    fn test_node_from_is_stamped() {
        let src = StaticSource::new()
            .with_node(StaticNode::cpu(1))
            .with_node(StaticNode::gpu(1).with_link(0, IoLinkType::PciExpress, 20));
        match src.io_link(1, 0, false) {
            LinkRead::Found(l) => {
                assert_eq!(l.node_from, 1);
                assert_eq!(l.node_to, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_link_reads() {
        let src = StaticSource::new().with_node(StaticNode::cpu(1).with_unsupported_link());
        assert_eq!(src.io_link(0, 0, false), LinkRead::Unsupported);
        assert!(matches!(src.io_link(0, 1, false), LinkRead::Failed(_)));
        assert!(matches!(src.io_link(0, 0, true), LinkRead::Failed(_)));
        assert!(matches!(src.io_link(4, 0, false), LinkRead::Failed(_)));
    }

    #[test]
    fn test_json_roundtrip() {
        let src = StaticSource::new()
            .with_generation(9)
            .with_node(StaticNode::cpu(2).with_link(1, IoLinkType::PciExpress, 20))
            .with_node(StaticNode::gpu(3).with_unsupported_link());
        let json = serde_json::to_string(&src).unwrap();
        let back: StaticSource = serde_json::from_str(&json).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let back: StaticSource =
            serde_json::from_str(r#"{"nodes":[{"properties":{"num_cpu_cores":4}}]}"#).unwrap();
        assert_eq!(back.system_properties().unwrap().num_nodes, 1);
        assert_eq!(back.nodes[0].properties.num_cpu_cores, 4);
    }
}
