// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! [`TopologySource`] backed by the KFD sysfs tree.
//!
//! ```text
//! <kfd_topology>/
//!     generation_id
//!     system_properties
//!     nodes/<N>/
//!         gpu_id
//!         properties
//!         mem_banks/<B>/properties
//!         caches/<C>/properties
//!         io_links/<L>/properties
//!         p2p_links/<L>/properties
//! ```
//!
//! A GPU node is only exposed when its DRM render node can be opened.
//! Exposed nodes get dense user indices; every read maps the user index
//! back to the sysfs node id, and link endpoints are mapped forward.

use crate::cpu_cache::{self, numbered_dirs};
use crate::cpuinfo::read_cpuinfo;
use crate::parse::{read_sysfs_u64, Properties};
use crate::{SysfsError, SysfsPaths};
use kfd_topology::{
    CacheDescriptor, CacheType, CpuIdRecord, EngineId, HeapType, IoLinkType, LinkRead, LinkRecord,
    MemoryBank, NodeProperties, NodeReport, SystemProperties, TopologyError, TopologySource,
};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

/// The KFD sysfs topology source.
///
/// The node map is rebuilt by every `system_properties` call and read by
/// the node reads that follow it, so a `KfdSysfs` must be driven by a
/// single coordinator. [`crate::open`] hands out a coordinator that owns
/// its own instance.
#[derive(Debug)]
pub struct KfdSysfs {
    paths: SysfsPaths,
    /// User node index → sysfs node id, rebuilt by `system_properties`.
    node_map: RwLock<Vec<u32>>,
}

impl KfdSysfs {
    pub fn new(paths: SysfsPaths) -> Self {
        Self {
            paths,
            node_map: RwLock::new(Vec::new()),
        }
    }

    pub fn paths(&self) -> &SysfsPaths {
        &self.paths
    }

    /// Sysfs node ids of the nodes exposed by the last system read.
    pub fn sysfs_node_ids(&self) -> Vec<u32> {
        self.node_map.read().clone()
    }

    fn node_dir(&self, sysfs_id: u32) -> PathBuf {
        self.paths.nodes_dir().join(sysfs_id.to_string())
    }

    fn sysfs_id(&self, node: u32) -> Result<u32, TopologyError> {
        self.node_map
            .read()
            .get(node as usize)
            .copied()
            .ok_or_else(|| TopologyError::unavailable(format!("node {node}"), "no such node"))
    }

    fn user_index(&self, sysfs_id: u32) -> Option<u32> {
        self.node_map
            .read()
            .iter()
            .position(|&id| id == sysfs_id)
            .map(|i| i as u32)
    }

    fn gpu_id(&self, sysfs_id: u32) -> Result<u32, SysfsError> {
        let path = self.node_dir(sysfs_id).join("gpu_id");
        match read_sysfs_u64(&path) {
            Ok(id) => Ok(id as u32),
            Err(SysfsError::NotAvailable { .. }) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// CPU nodes are always supported; a GPU node needs an accessible
    /// render node.
    fn is_supported(&self, sysfs_id: u32) -> Result<bool, SysfsError> {
        if self.gpu_id(sysfs_id)? == 0 {
            return Ok(true);
        }
        let props = Properties::read(&self.node_dir(sysfs_id).join("properties"))?;
        let minor = props.u32_or_zero("drm_render_minor")?;
        let render = self.paths.dri.join(format!("renderD{minor}"));
        match std::fs::File::open(&render) {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(
                    node = sysfs_id,
                    render = %render.display(),
                    error = %e,
                    "GPU node not accessible, excluding it"
                );
                Ok(false)
            }
        }
    }

    fn rebuild_node_map(&self) -> Result<Vec<u32>, SysfsError> {
        let nodes_dir = self.paths.nodes_dir();
        if !nodes_dir.is_dir() {
            return Err(SysfsError::NotAvailable {
                path: nodes_dir.display().to_string(),
            });
        }
        let mut map = Vec::new();
        for (sysfs_id, _) in numbered_dirs(&nodes_dir, "")? {
            if self.is_supported(sysfs_id)? {
                map.push(sysfs_id);
            }
        }
        Ok(map)
    }

    fn read_node(&self, node: u32) -> Result<NodeReport, TopologyError> {
        let sysfs_id = self.sysfs_id(node)?;
        let props = Properties::read(&self.node_dir(sysfs_id).join("properties"))?;
        let gpu_id = self.gpu_id(sysfs_id)?;
        Ok(node_report(&props, gpu_id)?)
    }

    fn read_link(
        &self,
        node: u32,
        link: u32,
        p2p: bool,
    ) -> Result<Option<LinkRecord>, TopologyError> {
        let sysfs_id = self.sysfs_id(node)?;
        let table = if p2p { "p2p_links" } else { "io_links" };
        let path = self
            .node_dir(sysfs_id)
            .join(table)
            .join(link.to_string())
            .join("properties");
        let props = match Properties::read(&path) {
            Ok(p) => p,
            Err(SysfsError::NotAvailable { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let node_from = props.u32_or_zero("node_from")?;
        if node_from != sysfs_id {
            return Err(TopologyError::unavailable(
                path.display().to_string(),
                format!("node_from {node_from} does not match node {sysfs_id}"),
            ));
        }
        let Some(node_to) = self.user_index(props.u32_or_zero("node_to")?) else {
            return Ok(None);
        };

        Ok(Some(LinkRecord {
            link_type: IoLinkType::from(props.u32_or_zero("type")?),
            version_major: props.u32_or_zero("version_major")?,
            version_minor: props.u32_or_zero("version_minor")?,
            node_from: node,
            node_to,
            weight: props.u32_or_zero("weight")?,
            min_latency: props.u32_or_zero("min_latency")?,
            max_latency: props.u32_or_zero("max_latency")?,
            min_bandwidth: props.u32_or_zero("min_bandwidth")?,
            max_bandwidth: props.u32_or_zero("max_bandwidth")?,
            rec_transfer_size: props.u32_or_zero("recommended_transfer_size")?,
            rec_sdma_eng_id_mask: props.u32_or_zero("recommended_sdma_engine_id_mask")?,
            flags: props.u32_or_zero("flags")?,
            ..Default::default()
        }))
    }
}

impl Default for KfdSysfs {
    fn default() -> Self {
        Self::new(SysfsPaths::default())
    }
}

/// Translates a node `properties` file.
fn node_report(props: &Properties, gpu_id: u32) -> Result<NodeReport, SysfsError> {
    let num_p2p_links = props.u32_or_zero("p2p_links_count")?;
    let mut node = NodeProperties {
        num_cpu_cores: props.u32_or_zero("cpu_cores_count")?,
        num_f_compute_cores: props.u32_or_zero("simd_count")?,
        num_memory_banks: props.u32_or_zero("mem_banks_count")?,
        num_caches: props.u32_or_zero("caches_count")?,
        num_io_links: props
            .u32_or_zero("io_links_count")?
            .saturating_add(num_p2p_links),
        ccompute_id_lo: props.u32_or_zero("cpu_core_id_base")?,
        fcompute_id_lo: props.u32_or_zero("simd_id_base")?,
        gpu_id,
        hive_id: props.u64_or_zero("hive_id")?,
        unique_id: props.u64_or_zero("unique_id")?,
        vendor_id: props.u32_or_zero("vendor_id")? as u16,
        device_id: props.u32_or_zero("device_id")? as u16,
        location_id: props.u32_or_zero("location_id")?,
        domain: props.u32_or_zero("domain")?,
        drm_render_minor: props.u32_or_zero("drm_render_minor")? as i32,
        local_mem_size: props.u64_or_zero("local_mem_size")?,
        max_waves_per_simd: props.u32_or_zero("max_waves_per_simd")?,
        lds_size_in_kb: props.u32_or_zero("lds_size_in_kb")?,
        gds_size_in_kb: props.u32_or_zero("gds_size_in_kb")?,
        wave_front_size: props.u32_or_zero("wave_front_size")?,
        num_arrays: props.u32_or_zero("simd_arrays_per_engine")?,
        num_cu_per_array: props.u32_or_zero("cu_per_simd_array")?,
        num_simd_per_cu: props.u32_or_zero("simd_per_cu")?,
        max_slots_scratch_cu: props.u32_or_zero("max_slots_scratch_cu")?,
        max_engine_clock_mhz_fcompute: props.u32_or_zero("max_engine_clk_fcompute")?,
        max_engine_clock_mhz_ccompute: props.u32_or_zero("max_engine_clk_ccompute")?,
        num_sdma_engines: props.u32_or_zero("num_sdma_engines")?,
        num_sdma_xgmi_engines: props.u32_or_zero("num_sdma_xgmi_engines")?,
        num_sdma_queues_per_engine: props.u32_or_zero("num_sdma_queues_per_engine")? as u8,
        num_cp_queues: props.u32_or_zero("num_cp_queues")? as u8,
        num_gws: props.u32_or_zero("num_gws")? as u8,
        num_xcc: props.u32_or_zero("num_xcc")?,
        capability: props.u32_or_zero("capability")?,
        ..Default::default()
    };

    if node.num_f_compute_cores > 0 {
        if node.num_arrays != 0 {
            node.num_shader_banks = props.u32_or_zero("array_count")? / node.num_arrays;
        }
        let gfxv = props.u32_or_zero("gfx_target_version")?;
        if gfxv > 0 {
            node.engine_id = EngineId::from_gfx_target_version(gfxv);
            node.amd_name = format!("GFX{:06x}", node.engine_id.full());
        } else {
            tracing::warn!(device_id = node.device_id, "GPU node reports no gfx_target_version");
        }
        if node.num_xcc == 0 {
            node.num_xcc = 1;
        }
    }

    Ok(NodeReport {
        properties: node,
        p2p_links_present: num_p2p_links > 0,
        num_p2p_links,
    })
}

fn memory_bank(props: &Properties) -> Result<MemoryBank, SysfsError> {
    Ok(MemoryBank {
        heap_type: HeapType::from(props.u32_or_zero("heap_type")?),
        size_in_bytes: props.u64_or_zero("size_in_bytes")?,
        flags: props.u32_or_zero("flags")?,
        width: props.u32_or_zero("width")?,
        mem_clk_max: props.u32_or_zero("mem_clk_max")?,
    })
}

fn cache(props: &Properties) -> Result<CacheDescriptor, SysfsError> {
    Ok(CacheDescriptor {
        processor_id_low: props.u32_or_zero("processor_id_low")?,
        level: props.u32_or_zero("level")?,
        size_kb: props.u32_or_zero("size")?,
        line_size: props.u32_or_zero("cache_line_size")?,
        lines_per_tag: props.u32_or_zero("cache_lines_per_tag")?,
        associativity: props.u32_or_zero("association")?,
        latency: props.u32_or_zero("latency")?,
        cache_type: CacheType(props.u32_or_zero("type")?),
        sibling_map: props.list("sibling_map")?,
    })
}

fn read_record<T>(
    path: &Path,
    convert: impl FnOnce(&Properties) -> Result<T, SysfsError>,
) -> Result<T, TopologyError> {
    let props = Properties::read(path)?;
    Ok(convert(&props)?)
}

impl TopologySource for KfdSysfs {
    fn generation(&self) -> Result<u32, TopologyError> {
        Ok(read_sysfs_u64(&self.paths.kfd_topology.join("generation_id"))? as u32)
    }

    fn system_properties(&self) -> Result<SystemProperties, TopologyError> {
        let props = Properties::read(&self.paths.kfd_topology.join("system_properties"))?;
        let map = self.rebuild_node_map()?;
        let num_nodes = map.len() as u32;
        tracing::debug!(num_nodes, sysfs_nodes = ?map, "read KFD system properties");
        *self.node_map.write() = map;

        Ok(SystemProperties {
            num_nodes,
            platform_oem: props.u32_or_zero("platform_oem")?,
            platform_id: props.u32_or_zero("platform_id")?,
            platform_rev: props.u32_or_zero("platform_rev")?,
        })
    }

    fn node_properties(&self, node: u32) -> Result<NodeReport, TopologyError> {
        self.read_node(node)
    }

    fn memory_bank(&self, node: u32, bank: u32) -> Result<MemoryBank, TopologyError> {
        let dir = self.node_dir(self.sysfs_id(node)?);
        read_record(&dir.join("mem_banks").join(bank.to_string()).join("properties"), memory_bank)
    }

    fn cache(&self, node: u32, cache_index: u32) -> Result<CacheDescriptor, TopologyError> {
        let dir = self.node_dir(self.sysfs_id(node)?);
        read_record(&dir.join("caches").join(cache_index.to_string()).join("properties"), cache)
    }

    fn io_link(&self, node: u32, link: u32, p2p: bool) -> LinkRead {
        match self.read_link(node, link, p2p) {
            Ok(Some(record)) => LinkRead::Found(record),
            Ok(None) => LinkRead::Unsupported,
            Err(e) => LinkRead::Failed(e),
        }
    }

    fn cpu_identification(&self) -> Result<Vec<CpuIdRecord>, TopologyError> {
        Ok(read_cpuinfo(&self.paths.cpuinfo)?)
    }

    fn cpu_caches(
        &self,
        node: u32,
        cpus: &[CpuIdRecord],
    ) -> Result<Vec<CacheDescriptor>, TopologyError> {
        Ok(cpu_cache::cpu_caches(&self.paths, node, cpus)?)
    }
}
