// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # kfd-topology
//!
//! Consistent snapshots of a heterogeneous CPU/GPU system topology.
//!
//! The crate enumerates nodes, memory banks, caches, and IO links from a
//! [`TopologySource`], guards every pass with the source's generation
//! counter, derives indirect GPU links when the platform reports no
//! peer-to-peer links, and publishes the result atomically.
//!
//! ## Modules
//!
//! - [`types`]: property records (node, memory bank, cache, link).
//! - [`source`]: the [`TopologySource`] trait consumed by a pass.
//! - [`snapshot`]: the published [`SystemSnapshot`] graph and accessors.
//! - [`coordinator`]: [`SnapshotCoordinator`], the retrying writer.
//! - [`static_source`]: an in-memory source for replay and tests.
//!
//! ## Example
//!
//! ```
//! use kfd_topology::{IoLinkType, SnapshotCoordinator, StaticNode, StaticSource};
//!
//! let source = StaticSource::new()
//!     .with_node(StaticNode::cpu(8).with_link(1, IoLinkType::PciExpress, 20))
//!     .with_node(StaticNode::gpu(0x1002).with_link(0, IoLinkType::PciExpress, 20));
//!
//! let topology = SnapshotCoordinator::new(source);
//! topology.take_topology_snapshot()?;
//! let snapshot = topology.current_snapshot().expect("just published");
//! assert_eq!(snapshot.num_nodes(), 2);
//! # Ok::<(), kfd_topology::TopologyError>(())
//! ```

pub mod coordinator;
mod enumerate;
pub mod error;
mod links;
pub mod retry;
pub mod snapshot;
pub mod source;
pub mod static_source;
pub mod stats;
pub mod types;

pub use coordinator::SnapshotCoordinator;
pub use error::TopologyError;
pub use retry::RetryPolicy;
pub use snapshot::{NodeRecord, SystemSnapshot};
pub use source::{CpuIdRecord, LinkRead, NodeReport, TopologySource};
pub use static_source::{StaticNode, StaticSource};
pub use stats::PassStats;
pub use types::{
    CacheDescriptor, CacheType, EngineId, HeapType, IoLinkType, LinkKind, LinkRecord, MemoryBank,
    NodeProperties, SystemProperties, CPU_SIBLINGS,
};
