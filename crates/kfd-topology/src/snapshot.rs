// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The published topology graph.
//!
//! A [`SystemSnapshot`] is immutable once published: consumers hold it
//! through an `Arc` obtained from
//! [`SnapshotCoordinator::current_snapshot`](crate::SnapshotCoordinator::current_snapshot)
//! and it stays valid even after a newer snapshot replaces it.

use crate::{
    CacheDescriptor, LinkKind, LinkRecord, MemoryBank, NodeProperties, SystemProperties,
    TopologyError,
};

/// One fully enumerated CPU or GPU node.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeRecord {
    pub properties: NodeProperties,
    pub memory_banks: Vec<MemoryBank>,
    pub caches: Vec<CacheDescriptor>,
    /// Populated links, at most `num_nodes - 1`.
    pub links: Vec<LinkRecord>,
}

impl NodeRecord {
    pub fn is_gpu(&self) -> bool {
        self.properties.is_gpu()
    }

    /// Link from this node to `node_to`, if any.
    pub fn link_to(&self, node_to: u32) -> Option<&LinkRecord> {
        self.links.iter().find(|l| l.node_to == node_to)
    }

    pub fn indirect_links(&self) -> impl Iterator<Item = &LinkRecord> {
        self.links.iter().filter(|l| l.kind == LinkKind::Indirect)
    }
}

/// A complete, generation-consistent topology.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SystemSnapshot {
    pub system: SystemProperties,
    /// Nodes in index order.
    pub nodes: Vec<NodeRecord>,
    /// Generation counter the whole snapshot was read against.
    pub generation: u32,
}

impl SystemSnapshot {
    pub fn num_nodes(&self) -> u32 {
        self.system.num_nodes
    }

    /// Returns node `node`, or `InvalidNode` if out of range.
    pub fn node(&self, node: u32) -> Result<&NodeRecord, TopologyError> {
        self.nodes
            .get(node as usize)
            .ok_or(TopologyError::InvalidNode {
                node,
                num_nodes: self.system.num_nodes,
            })
    }

    pub fn memory_banks(&self, node: u32) -> Result<&[MemoryBank], TopologyError> {
        Ok(&self.node(node)?.memory_banks)
    }

    pub fn caches(&self, node: u32) -> Result<&[CacheDescriptor], TopologyError> {
        Ok(&self.node(node)?.caches)
    }

    pub fn io_links(&self, node: u32) -> Result<&[LinkRecord], TopologyError> {
        Ok(&self.node(node)?.links)
    }

    /// Link from `from` to `to`, if both exist and are connected.
    pub fn link_between(&self, from: u32, to: u32) -> Option<&LinkRecord> {
        self.nodes.get(from as usize)?.link_to(to)
    }

    pub fn gpu_nodes(&self) -> impl Iterator<Item = (u32, &NodeRecord)> {
        self.indexed().filter(|(_, n)| n.is_gpu())
    }

    pub fn cpu_nodes(&self) -> impl Iterator<Item = (u32, &NodeRecord)> {
        self.indexed().filter(|(_, n)| !n.is_gpu())
    }

    pub fn total_links(&self) -> usize {
        self.nodes.iter().map(|n| n.links.len()).sum()
    }

    fn indexed(&self) -> impl Iterator<Item = (u32, &NodeRecord)> {
        self.nodes.iter().enumerate().map(|(i, n)| (i as u32, n))
    }

    /// One-line summary suitable for logging.
    ///
    /// ```text
    /// Topology gen 7: 3 nodes (1 CPU, 2 GPU), 6 links (2 indirect)
    /// ```
    pub fn summary(&self) -> String {
        let gpus = self.gpu_nodes().count();
        let indirect: usize = self.nodes.iter().map(|n| n.indirect_links().count()).sum();
        format!(
            "Topology gen {}: {} nodes ({} CPU, {} GPU), {} links ({} indirect)",
            self.generation,
            self.nodes.len(),
            self.nodes.len() - gpus,
            gpus,
            self.total_links(),
            indirect,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SystemSnapshot {
        let cpu = NodeRecord {
            properties: NodeProperties {
                num_cpu_cores: 8,
                ..Default::default()
            },
            memory_banks: vec![MemoryBank::default()],
            caches: vec![],
            links: vec![LinkRecord {
                node_from: 0,
                node_to: 1,
                weight: 20,
                ..Default::default()
            }],
        };
        let gpu = NodeRecord {
            properties: NodeProperties {
                gpu_id: 4242,
                num_f_compute_cores: 240,
                ..Default::default()
            },
            memory_banks: vec![],
            caches: vec![],
            links: vec![LinkRecord::indirect(1, 0, Default::default(), 40)],
        };
        SystemSnapshot {
            system: SystemProperties {
                num_nodes: 2,
                ..Default::default()
            },
            nodes: vec![cpu, gpu],
            generation: 3,
        }
    }

    #[test]
    fn test_node_accessors() {
        let snap = sample();
        assert_eq!(snap.memory_banks(0).unwrap().len(), 1);
        assert!(snap.caches(1).unwrap().is_empty());
        assert_eq!(snap.io_links(0).unwrap()[0].node_to, 1);
    }

    #[test]
    fn test_invalid_node() {
        let snap = sample();
        assert_eq!(
            snap.node(5).unwrap_err(),
            TopologyError::InvalidNode {
                node: 5,
                num_nodes: 2
            }
        );
    }

    #[test]
    fn test_cpu_gpu_partition() {
        let snap = sample();
        let gpus: Vec<u32> = snap.gpu_nodes().map(|(i, _)| i).collect();
        let cpus: Vec<u32> = snap.cpu_nodes().map(|(i, _)| i).collect();
        assert_eq!(gpus, vec![1]);
        assert_eq!(cpus, vec![0]);
    }

    #[test]
    fn test_link_between() {
        let snap = sample();
        assert_eq!(snap.link_between(0, 1).unwrap().weight, 20);
        assert!(snap.link_between(0, 0).is_none());
        assert!(snap.link_between(9, 0).is_none());
    }

    #[test]
    fn test_summary() {
        let s = sample().summary();
        assert!(s.contains("gen 3"));
        assert!(s.contains("2 nodes (1 CPU, 1 GPU)"));
        assert!(s.contains("2 links (1 indirect)"));
    }
}
