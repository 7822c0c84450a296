// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: full snapshot passes through the coordinator.
//!
//! The sources here wrap a [`StaticSource`] and inject the failures a live
//! topology produces: generation changes mid-pass, unreadable nodes, and
//! links to inaccessible nodes.

use kfd_topology::{
    CacheDescriptor, CpuIdRecord, HeapType, IoLinkType, LinkKind, LinkRead, MemoryBank,
    NodeReport, RetryPolicy, SnapshotCoordinator, StaticNode, StaticSource, SystemProperties,
    TopologyError, TopologySource,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────

fn fb_public() -> MemoryBank {
    MemoryBank {
        heap_type: HeapType::FrameBufferPublic,
        size_in_bytes: 16 << 30,
        ..Default::default()
    }
}

/// One CPU with 2 banks and 1 cache, one GPU with 1 bank, linked both ways.
fn cpu_gpu() -> StaticSource {
    StaticSource::new()
        .with_generation(1)
        .with_node(
            StaticNode::cpu(16)
                .with_bank(MemoryBank::default())
                .with_bank(MemoryBank::default())
                .with_cache(CacheDescriptor {
                    level: 1,
                    size_kb: 32,
                    ..Default::default()
                })
                .with_link(1, IoLinkType::PciExpress, 20),
        )
        .with_node(
            StaticNode::gpu(0x1002)
                .with_bank(fb_public())
                .with_link(0, IoLinkType::PciExpress, 20),
        )
}

/// One CPU socket with `gpus` GPUs behind it.
fn single_socket(gpus: u32) -> StaticSource {
    let mut cpu = StaticNode::cpu(16).with_bank(MemoryBank::default());
    for g in 1..=gpus {
        cpu = cpu.with_link(g, IoLinkType::PciExpress, 20);
    }
    let mut source = StaticSource::new().with_generation(1).with_node(cpu);
    for g in 1..=gpus {
        source = source.with_node(
            StaticNode::gpu(100 + g)
                .with_bank(fb_public())
                .with_link(0, IoLinkType::PciExpress, 20),
        );
    }
    source
}

/// Delegates to a [`StaticSource`] that can be replaced mid-pass.
///
/// When `swap_at` is set, reading that node's properties installs the
/// pending source, once.
struct MutatingSource {
    current: Mutex<StaticSource>,
    pending: Mutex<Option<StaticSource>>,
    swap_at: u32,
}

impl MutatingSource {
    fn new(before: StaticSource, after: StaticSource, swap_at: u32) -> Self {
        Self {
            current: Mutex::new(before),
            pending: Mutex::new(Some(after)),
            swap_at,
        }
    }
}

impl TopologySource for MutatingSource {
    fn generation(&self) -> Result<u32, TopologyError> {
        self.current.lock().generation()
    }

    fn system_properties(&self) -> Result<SystemProperties, TopologyError> {
        self.current.lock().system_properties()
    }

    fn node_properties(&self, node: u32) -> Result<NodeReport, TopologyError> {
        if node == self.swap_at {
            if let Some(next) = self.pending.lock().take() {
                *self.current.lock() = next;
            }
        }
        self.current.lock().node_properties(node)
    }

    fn memory_bank(&self, node: u32, bank: u32) -> Result<MemoryBank, TopologyError> {
        self.current.lock().memory_bank(node, bank)
    }

    fn cache(&self, node: u32, cache: u32) -> Result<CacheDescriptor, TopologyError> {
        self.current.lock().cache(node, cache)
    }

    fn io_link(&self, node: u32, link: u32, p2p: bool) -> LinkRead {
        self.current.lock().io_link(node, link, p2p)
    }

    fn cpu_identification(&self) -> Result<Vec<CpuIdRecord>, TopologyError> {
        self.current.lock().cpu_identification()
    }

    fn cpu_caches(
        &self,
        node: u32,
        cpus: &[CpuIdRecord],
    ) -> Result<Vec<CacheDescriptor>, TopologyError> {
        self.current.lock().cpu_caches(node, cpus)
    }
}

/// Fails reading node `node` while armed.
struct FailingSource {
    inner: StaticSource,
    node: u32,
    armed: AtomicBool,
}

impl TopologySource for FailingSource {
    fn generation(&self) -> Result<u32, TopologyError> {
        self.inner.generation()
    }

    fn system_properties(&self) -> Result<SystemProperties, TopologyError> {
        self.inner.system_properties()
    }

    fn node_properties(&self, node: u32) -> Result<NodeReport, TopologyError> {
        if node == self.node && self.armed.load(Ordering::SeqCst) {
            return Err(TopologyError::unavailable(format!("node {node}"), "injected"));
        }
        self.inner.node_properties(node)
    }

    fn memory_bank(&self, node: u32, bank: u32) -> Result<MemoryBank, TopologyError> {
        self.inner.memory_bank(node, bank)
    }

    fn cache(&self, node: u32, cache: u32) -> Result<CacheDescriptor, TopologyError> {
        self.inner.cache(node, cache)
    }

    fn io_link(&self, node: u32, link: u32, p2p: bool) -> LinkRead {
        self.inner.io_link(node, link, p2p)
    }

    fn cpu_identification(&self) -> Result<Vec<CpuIdRecord>, TopologyError> {
        self.inner.cpu_identification()
    }

    fn cpu_caches(
        &self,
        node: u32,
        cpus: &[CpuIdRecord],
    ) -> Result<Vec<CacheDescriptor>, TopologyError> {
        self.inner.cpu_caches(node, cpus)
    }
}

/// A generation counter that moves on every read.
struct ChurningSource {
    inner: StaticSource,
    generation: AtomicU32,
}

impl TopologySource for ChurningSource {
    fn generation(&self) -> Result<u32, TopologyError> {
        Ok(self.generation.fetch_add(1, Ordering::SeqCst))
    }

    fn system_properties(&self) -> Result<SystemProperties, TopologyError> {
        self.inner.system_properties()
    }

    fn node_properties(&self, node: u32) -> Result<NodeReport, TopologyError> {
        self.inner.node_properties(node)
    }

    fn memory_bank(&self, node: u32, bank: u32) -> Result<MemoryBank, TopologyError> {
        self.inner.memory_bank(node, bank)
    }

    fn cache(&self, node: u32, cache: u32) -> Result<CacheDescriptor, TopologyError> {
        self.inner.cache(node, cache)
    }

    fn io_link(&self, node: u32, link: u32, p2p: bool) -> LinkRead {
        self.inner.io_link(node, link, p2p)
    }

    fn cpu_identification(&self) -> Result<Vec<CpuIdRecord>, TopologyError> {
        self.inner.cpu_identification()
    }

    fn cpu_caches(
        &self,
        node: u32,
        cpus: &[CpuIdRecord],
    ) -> Result<Vec<CacheDescriptor>, TopologyError> {
        self.inner.cpu_caches(node, cpus)
    }
}

// ── Scenarios ──────────────────────────────────────────────────

#[test]
fn test_cpu_gpu_end_to_end() {
    let topology = SnapshotCoordinator::new(cpu_gpu());
    topology.take_topology_snapshot().unwrap();
    let snapshot = topology.current_snapshot().unwrap();

    assert_eq!(snapshot.num_nodes(), 2);
    assert_eq!(snapshot.nodes.len(), 2);

    let cpu = snapshot.node(0).unwrap();
    assert!(!cpu.is_gpu());
    assert_eq!(cpu.properties.num_caches, 1);
    assert_eq!(cpu.properties.num_memory_banks, 2);
    assert_eq!(cpu.links.len(), 1);

    let gpu = snapshot.node(1).unwrap();
    assert!(gpu.is_gpu());
    assert_eq!(gpu.properties.num_memory_banks, 1);
    assert_eq!(gpu.properties.num_caches, 0);
    assert_eq!(gpu.links.len(), 1);

    assert_eq!(snapshot.nodes.iter().flat_map(|n| n.indirect_links()).count(), 0);
    assert_eq!(
        snapshot.node(2).unwrap_err(),
        TopologyError::InvalidNode { node: 2, num_nodes: 2 }
    );
}

#[test]
fn test_cpu_nodes_named_from_identification() {
    let source = StaticSource::new()
        .with_node(StaticNode::cpu(8).with_bank(MemoryBank::default()))
        .with_node(
            StaticNode::cpu(8)
                .with_bank(MemoryBank::default())
                .with_properties(|p| {
                    p.ccompute_id_lo = 8;
                    p.device_id = 0x15d8;
                    p.amd_name = "GFX090c00".into();
                }),
        )
        .with_cpu(CpuIdRecord {
            proc_num: 0,
            apicid: 0,
            model_name: "AMD EPYC 7763".into(),
        })
        .with_cpu(CpuIdRecord {
            proc_num: 8,
            apicid: 8,
            model_name: "AMD Ryzen 7 4800U".into(),
        });
    let topology = SnapshotCoordinator::new(source);
    topology.take_topology_snapshot().unwrap();
    let s = topology.current_snapshot().unwrap();

    let socket = &s.node(0).unwrap().properties;
    assert_eq!(socket.marketing_name, "AMD EPYC 7763");
    assert_eq!(socket.amd_name, "AMD EPYC 7763");

    // An APU keeps its engine name.
    let apu = &s.node(1).unwrap().properties;
    assert_eq!(apu.marketing_name, "AMD Ryzen 7 4800U");
    assert_eq!(apu.amd_name, "GFX090c00");
}

#[test]
fn test_repeated_passes_are_identical() {
    let topology = SnapshotCoordinator::new(single_socket(3));
    topology.take_topology_snapshot().unwrap();
    let first = topology.current_snapshot().unwrap();
    topology.take_topology_snapshot().unwrap();
    let second = topology.current_snapshot().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(*first, *second);
}

#[test]
fn test_generation_change_retries_with_new_topology() {
    let before = single_socket(2).with_generation(1);
    let after = single_socket(3).with_generation(2);
    let expected = {
        let c = SnapshotCoordinator::new(after.clone());
        c.take_topology_snapshot().unwrap();
        c.current_snapshot().unwrap()
    };

    let topology = SnapshotCoordinator::with_retry(
        MutatingSource::new(before, after, 1),
        RetryPolicy::immediate(4),
    );
    topology.take_topology_snapshot().unwrap();
    let snapshot = topology.current_snapshot().unwrap();

    assert_eq!(snapshot.generation, 2);
    assert_eq!(*snapshot, *expected);
    assert_eq!(topology.last_pass_stats().unwrap().attempts, 2);
}

#[test]
fn test_failed_pass_keeps_previous_snapshot() {
    let topology = SnapshotCoordinator::new(FailingSource {
        inner: single_socket(3),
        node: 2,
        armed: AtomicBool::new(false),
    });
    topology.take_topology_snapshot().unwrap();
    let before = topology.current_snapshot().unwrap();
    let stats_before = topology.last_pass_stats();

    topology.source().armed.store(true, Ordering::SeqCst);
    let err = topology.take_topology_snapshot().unwrap_err();
    assert!(matches!(err, TopologyError::ResourceUnavailable { .. }));

    let after = topology.current_snapshot().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(topology.last_pass_stats(), stats_before);
}

#[test]
fn test_failure_before_first_snapshot_publishes_nothing() {
    let topology = SnapshotCoordinator::new(FailingSource {
        inner: cpu_gpu(),
        node: 0,
        armed: AtomicBool::new(true),
    });
    assert!(topology.take_topology_snapshot().is_err());
    assert!(topology.current_snapshot().is_none());
    assert!(topology.acquire_system_properties().is_err());
}

#[test]
fn test_unsupported_links_are_skipped() {
    let source = StaticSource::new()
        .with_node(
            StaticNode::cpu(8)
                .with_link(1, IoLinkType::PciExpress, 20)
                .with_unsupported_link()
                .with_link(2, IoLinkType::PciExpress, 20),
        )
        .with_node(StaticNode::gpu(1).with_bank(fb_public()))
        .with_node(StaticNode::gpu(2).with_bank(fb_public()));
    let topology = SnapshotCoordinator::new(source);
    topology.take_topology_snapshot().unwrap();

    let cpu = topology.current_snapshot().unwrap().node(0).unwrap().clone();
    assert_eq!(cpu.properties.num_io_links, 2);
    assert!(cpu.links.iter().all(|l| l.kind == LinkKind::Direct));
    assert_eq!(topology.last_pass_stats().unwrap().skipped_links, 1);
}

#[test]
fn test_indirect_links_fill_gaps() {
    let topology = SnapshotCoordinator::new(single_socket(3));
    topology.take_topology_snapshot().unwrap();
    let snapshot = topology.current_snapshot().unwrap();

    for (i, gpu) in snapshot.gpu_nodes() {
        assert_eq!(gpu.links.len(), 3);
        for (j, _) in snapshot.gpu_nodes().filter(|(j, _)| *j != i) {
            let link = snapshot.link_between(i, j).unwrap();
            assert_eq!(link.kind, LinkKind::Indirect);
            assert_eq!(link.weight, 40);
        }
        assert_eq!(snapshot.link_between(i, 0).unwrap().kind, LinkKind::Direct);
    }
    assert_eq!(topology.last_pass_stats().unwrap().indirect_links, 6);
}

#[test]
fn test_single_p2p_link_disables_synthesis() {
    let mut source = single_socket(3);
    source.nodes[3] = StaticNode::gpu(103)
        .with_bank(fb_public())
        .with_link(0, IoLinkType::PciExpress, 20)
        .with_p2p_link(1, IoLinkType::Xgmi, 15);
    // Rebuild so node_from is stamped on the replaced node.
    let source = source
        .nodes
        .into_iter()
        .fold(StaticSource::new().with_generation(1), StaticSource::with_node);

    let topology = SnapshotCoordinator::new(source);
    topology.take_topology_snapshot().unwrap();
    let snapshot = topology.current_snapshot().unwrap();

    assert_eq!(snapshot.nodes.iter().flat_map(|n| n.indirect_links()).count(), 0);
    let p2p = snapshot.link_between(3, 1).unwrap();
    assert!(p2p.p2p);
    assert_eq!(p2p.node_from, 3);
}

#[test]
fn test_link_bounds_hold() {
    let mut source = single_socket(4);
    // Over-report on every GPU: more entries than other nodes.
    for node in source.nodes.iter_mut().skip(1) {
        for to in 0..6 {
            *node = std::mem::take(node).with_link(to % 5, IoLinkType::PciExpress, 30);
        }
    }
    let source = source
        .nodes
        .into_iter()
        .fold(StaticSource::new(), StaticSource::with_node);

    let topology = SnapshotCoordinator::new(source);
    topology.take_topology_snapshot().unwrap();
    let snapshot = topology.current_snapshot().unwrap();
    let n = snapshot.num_nodes() as usize;

    assert!(snapshot.total_links() <= n * (n - 1));
    for node in &snapshot.nodes {
        assert!(node.links.len() <= n - 1);
        assert_eq!(node.properties.num_io_links as usize, node.links.len());
    }
}

#[test]
fn test_churning_generation_is_inconsistent() {
    let topology = SnapshotCoordinator::with_retry(
        ChurningSource {
            inner: cpu_gpu(),
            generation: AtomicU32::new(0),
        },
        RetryPolicy::immediate(3),
    );
    assert_eq!(
        topology.take_topology_snapshot().unwrap_err(),
        TopologyError::Inconsistent { attempts: 3 }
    );
    assert!(topology.current_snapshot().is_none());
}

#[test]
fn test_readers_see_whole_snapshots() {
    let topology = Arc::new(SnapshotCoordinator::new(single_socket(3)));
    topology.take_topology_snapshot().unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let topology = Arc::clone(&topology);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let s = topology.current_snapshot().unwrap();
                    assert_eq!(s.nodes.len(), s.num_nodes() as usize);
                    assert_eq!(s.total_links(), 12);
                }
            })
        })
        .collect();
    for _ in 0..50 {
        topology.take_topology_snapshot().unwrap();
    }
    for r in readers {
        r.join().unwrap();
    }
}

#[test]
fn test_replay_from_snapshot() {
    let topology = SnapshotCoordinator::new(single_socket(2));
    topology.take_topology_snapshot().unwrap();
    let original = topology.current_snapshot().unwrap();

    let replay = StaticSource::from_snapshot(&original);
    let json = serde_json::to_string(&replay).unwrap();
    let replay: StaticSource = serde_json::from_str(&json).unwrap();

    let replayed = SnapshotCoordinator::new(replay);
    replayed.take_topology_snapshot().unwrap();
    assert_eq!(*replayed.current_snapshot().unwrap(), *original);
}
