// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Topology configuration loaded from TOML files or constructed
//! programmatically.
//!
//! # TOML Format
//! ```toml
//! [paths]
//! kfd_topology = "/sys/devices/virtual/kfd/kfd/topology"
//! system_nodes = "/sys/devices/system/node"
//! system_cpus = "/sys/devices/system/cpu"
//! cpuinfo = "/proc/cpuinfo"
//! dri = "/dev/dri"
//!
//! [retry]
//! max_attempts = 16
//! initial_backoff_ms = 1
//! max_backoff_ms = 64
//! ```
//!
//! Every key is optional.

use crate::SysfsError;
use kfd_topology::RetryPolicy;
use std::path::{Path, PathBuf};

/// Filesystem roots read by [`KfdSysfs`](crate::KfdSysfs).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SysfsPaths {
    /// KFD topology root holding `generation_id`, `system_properties` and
    /// `nodes/`.
    pub kfd_topology: PathBuf,
    /// NUMA node tree used for CPU cache discovery.
    pub system_nodes: PathBuf,
    /// CPU tree used when the NUMA tree is absent.
    pub system_cpus: PathBuf,
    pub cpuinfo: PathBuf,
    /// Directory of DRM render nodes (`renderD<minor>`).
    pub dri: PathBuf,
}

impl Default for SysfsPaths {
    fn default() -> Self {
        Self {
            kfd_topology: PathBuf::from("/sys/devices/virtual/kfd/kfd/topology"),
            system_nodes: PathBuf::from("/sys/devices/system/node"),
            system_cpus: PathBuf::from("/sys/devices/system/cpu"),
            cpuinfo: PathBuf::from("/proc/cpuinfo"),
            dri: PathBuf::from("/dev/dri"),
        }
    }
}

impl SysfsPaths {
    /// All paths below one root, e.g. a fake tree in a test directory.
    pub fn under(root: &Path) -> Self {
        let defaults = Self::default();
        let rebase = |p: &Path| root.join(p.strip_prefix("/").unwrap_or(p));
        Self {
            kfd_topology: rebase(&defaults.kfd_topology),
            system_nodes: rebase(&defaults.system_nodes),
            system_cpus: rebase(&defaults.system_cpus),
            cpuinfo: rebase(&defaults.cpuinfo),
            dri: rebase(&defaults.dri),
        }
    }

    pub fn nodes_dir(&self) -> PathBuf {
        self.kfd_topology.join("nodes")
    }
}

/// Configuration for topology discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub paths: SysfsPaths,
    pub retry: RetryPolicy,
}

impl TopologyConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SysfsError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SysfsError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, SysfsError> {
        toml::from_str(toml_str).map_err(|e| SysfsError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, SysfsError> {
        toml::to_string_pretty(self)
            .map_err(|e| SysfsError::Config(format!("TOML serialise error: {e}")))
    }
}
