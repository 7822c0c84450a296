// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Indirect link synthesis.
//!
//! When no node reports peer-to-peer links, GPU reachability routed through
//! CPU root complexes is derived from the direct links. Supported paths:
//!
//! ```text
//! GPU --w1-- CPU --w2-- GPU
//! GPU --w1-- CPU --w2-- CPU --w3-- GPU
//! GPU --w1-- CPU --w2-- CPU
//!            CPU --w2-- CPU --w3-- GPU
//! ```
//!
//! The synthesized weight is the sum of the hop weights and the link type is
//! that of the middle hop. A path whose total weight overflows `u32` is not
//! synthesized. Direct links are never removed or overwritten.

use crate::{HeapType, IoLinkType, LinkKind, LinkRecord, NodeRecord, PassStats};

/// CPU-to-CPU or GPU-to-CPU weights above this cross a socket.
const SAME_SOCKET_MAX_WEIGHT: u32 = 20;

/// Adds indirect links to `nodes` for every reachable pair without a link.
///
/// Every candidate is computed from the direct links first and then
/// inserted, so synthesized links never feed further synthesis. A node
/// with no free slot left keeps its links and the failure is logged.
pub(crate) fn synthesize_indirect_links(nodes: &mut [NodeRecord], stats: &mut PassStats) {
    let capacity = nodes.len().saturating_sub(1);
    let num_nodes = nodes.len() as u32;

    let mut candidates = Vec::new();
    for from in 0..num_nodes {
        for to in 0..num_nodes {
            if nodes[from as usize].link_to(to).is_some() {
                continue;
            }
            if let Some((link_type, weight)) = indirect_path(nodes, from, to) {
                candidates.push(LinkRecord::indirect(from, to, link_type, weight));
            }
        }
    }

    for link in candidates {
        let node = &mut nodes[link.node_from as usize];
        if node.links.len() >= capacity {
            tracing::warn!(
                from = link.node_from,
                to = link.node_to,
                "no free link slot for indirect link"
            );
            continue;
        }
        tracing::debug!(
            from = link.node_from,
            to = link.node_to,
            weight = link.weight,
            link_type = ?link.link_type,
            "adding indirect link"
        );
        node.links.push(link);
        node.properties.num_io_links += 1;
        stats.indirect_links += 1;
    }
}

/// The CPU a GPU hangs off: its first PCIe link within socket distance.
fn direct_cpu(nodes: &[NodeRecord], gpu: u32) -> Option<u32> {
    let node = &nodes[gpu as usize];
    if !node.is_gpu() {
        return None;
    }
    node.links
        .iter()
        .filter(|l| l.kind == LinkKind::Direct)
        .find(|l| l.link_type == IoLinkType::PciExpress && l.weight <= SAME_SOCKET_MAX_WEIGHT)
        .map(|l| l.node_to)
}

/// Type and weight of the direct link `from -> to`.
fn direct_hop(nodes: &[NodeRecord], from: u32, to: u32) -> Option<(IoLinkType, u32)> {
    nodes
        .get(from as usize)?
        .links
        .iter()
        .find(|l| l.kind == LinkKind::Direct && l.node_to == to)
        .map(|l| (l.link_type, l.weight))
}

/// Type and total weight of an indirect path `from -> to`, if one exists.
fn indirect_path(nodes: &[NodeRecord], from: u32, to: u32) -> Option<(IoLinkType, u32)> {
    if from == to {
        return None;
    }
    let (src, dst) = (&nodes[from as usize], &nodes[to as usize]);
    if !src.is_gpu() && !dst.is_gpu() {
        return None;
    }
    let (hive_src, hive_dst) = (src.properties.hive_id, dst.properties.hive_id);
    if hive_src != 0 && hive_src == hive_dst {
        return None;
    }

    let cpu_src = direct_cpu(nodes, from);
    let cpu_dst = direct_cpu(nodes, to);
    if cpu_src.is_none() && cpu_dst.is_none() {
        return None;
    }

    // The host must be able to reach a destination GPU's memory.
    if dst.is_gpu()
        && !dst
            .memory_banks
            .iter()
            .any(|b| b.heap_type == HeapType::FrameBufferPublic)
    {
        return None;
    }

    match (cpu_src, cpu_dst) {
        (Some(c1), Some(c2)) if c1 == c2 => {
            let (_, w1) = direct_hop(nodes, from, c1)?;
            let (link_type, w2) = direct_hop(nodes, c1, to)?;
            Some((link_type, w1.checked_add(w2)?))
        }
        (Some(c1), Some(c2)) => {
            let (_, w1) = direct_hop(nodes, from, c1)?;
            let (link_type, w2) = direct_hop(nodes, c1, c2)?;
            // GPUs behind different QPI sockets cannot reach each other.
            if link_type == IoLinkType::Qpi11 && w2 > SAME_SOCKET_MAX_WEIGHT {
                return None;
            }
            let (_, w3) = direct_hop(nodes, c2, to)?;
            Some((link_type, w1.checked_add(w2)?.checked_add(w3)?))
        }
        (Some(c1), None) => {
            let (_, w1) = direct_hop(nodes, from, c1)?;
            let (link_type, w2) = direct_hop(nodes, c1, to)?;
            Some((link_type, w1.checked_add(w2)?))
        }
        (None, Some(c2)) => {
            let (link_type, w2) = direct_hop(nodes, from, c2)?;
            let (_, w3) = direct_hop(nodes, c2, to)?;
            Some((link_type, w2.checked_add(w3)?))
        }
        (None, None) => None,
    }
}
