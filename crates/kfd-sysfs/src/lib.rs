// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # kfd-sysfs
//!
//! Live topology discovery on Linux: a
//! [`TopologySource`](kfd_topology::TopologySource) that reads the AMD KFD
//! sysfs tree, `/proc/cpuinfo`, and the NUMA node tree.
//!
//! All paths come from [`SysfsPaths`], so the same code runs against a fake
//! tree in tests or a bind-mounted `/sys` in a container.

pub mod config;
pub mod cpu_cache;
pub mod cpuinfo;
pub mod error;
pub mod kfd;
pub mod parse;

pub use config::{SysfsPaths, TopologyConfig};
pub use error::SysfsError;
pub use kfd::KfdSysfs;

use kfd_topology::SnapshotCoordinator;

/// A coordinator over the live sysfs tree described by `config`.
pub fn open(config: &TopologyConfig) -> SnapshotCoordinator<KfdSysfs> {
    SnapshotCoordinator::with_retry(KfdSysfs::new(config.paths.clone()), config.retry)
}
