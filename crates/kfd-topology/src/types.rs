// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Property records reported by the topology source.
//!
//! These mirror the KFD `properties` files: one record per node, memory
//! bank, cache, and IO link. Every record is plain data, `Clone`, and
//! serde-(de)serializable so a captured topology can be replayed through a
//! [`StaticSource`](crate::StaticSource).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of a cache sibling map (one slot per APIC id).
pub const CPU_SIBLINGS: usize = 256;

/// Platform-wide summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemProperties {
    /// Number of (supported) nodes.
    pub num_nodes: u32,
    pub platform_oem: u32,
    pub platform_id: u32,
    pub platform_rev: u32,
}

/// Graphics engine version decoded from `gfx_target_version`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineId {
    pub major: u8,
    pub minor: u8,
    pub stepping: u8,
}

impl EngineId {
    /// Decodes a decimal `gfx_target_version` such as `90010` (gfx90a).
    pub fn from_gfx_target_version(gfxv: u32) -> Self {
        Self {
            major: ((gfxv / 10000) % 100) as u8,
            minor: ((gfxv / 100) % 100) as u8,
            stepping: (gfxv % 100) as u8,
        }
    }

    /// Packed `0xMMmmss` form used for the `GFX` name.
    pub fn full(&self) -> u32 {
        (u32::from(self.major) << 16) | (u32::from(self.minor) << 8) | u32::from(self.stepping)
    }
}

/// Base properties of one CPU or GPU node.
///
/// Counts (`num_memory_banks`, `num_caches`, `num_io_links`) are what the
/// source reported; after enumeration `num_caches` and `num_io_links` are
/// rewritten to what was actually populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeProperties {
    pub num_cpu_cores: u32,
    /// SIMD count; zero for CPU nodes.
    pub num_f_compute_cores: u32,
    pub num_memory_banks: u32,
    pub num_caches: u32,
    /// Standard plus peer-to-peer links.
    pub num_io_links: u32,
    pub ccompute_id_lo: u32,
    pub fcompute_id_lo: u32,
    /// KFD GPU id. Zero for CPU nodes.
    pub gpu_id: u32,
    /// XGMI hive id. Zero when the GPU is not in a hive.
    pub hive_id: u64,
    pub unique_id: u64,
    pub vendor_id: u16,
    pub device_id: u16,
    pub location_id: u32,
    pub domain: u32,
    pub drm_render_minor: i32,
    pub local_mem_size: u64,
    pub max_waves_per_simd: u32,
    pub lds_size_in_kb: u32,
    pub gds_size_in_kb: u32,
    pub wave_front_size: u32,
    pub num_shader_banks: u32,
    pub num_arrays: u32,
    pub num_cu_per_array: u32,
    pub num_simd_per_cu: u32,
    pub max_slots_scratch_cu: u32,
    pub max_engine_clock_mhz_fcompute: u32,
    pub max_engine_clock_mhz_ccompute: u32,
    pub num_sdma_engines: u32,
    pub num_sdma_xgmi_engines: u32,
    pub num_sdma_queues_per_engine: u8,
    pub num_cp_queues: u8,
    pub num_gws: u8,
    pub num_xcc: u32,
    pub capability: u32,
    pub engine_id: EngineId,
    /// Short ASIC or CPU name (`GFX09000a`, or the CPU model).
    pub amd_name: String,
    /// Human-readable product name.
    pub marketing_name: String,
}

impl NodeProperties {
    /// A node is a GPU node iff it carries a non-zero GPU id.
    pub fn is_gpu(&self) -> bool {
        self.gpu_id != 0
    }
}

/// Memory heap kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeapType {
    #[default]
    System,
    /// CPU-visible part of device-local memory (large BAR).
    FrameBufferPublic,
    FrameBufferPrivate,
    GpuGds,
    GpuLds,
    GpuScratch,
    DeviceSvm,
    MmioRemap,
    Unknown(u32),
}

impl From<u32> for HeapType {
    fn from(v: u32) -> Self {
        match v {
            0 => Self::System,
            1 => Self::FrameBufferPublic,
            2 => Self::FrameBufferPrivate,
            3 => Self::GpuGds,
            4 => Self::GpuLds,
            5 => Self::GpuScratch,
            6 => Self::DeviceSvm,
            7 => Self::MmioRemap,
            other => Self::Unknown(other),
        }
    }
}

/// One memory bank of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryBank {
    pub heap_type: HeapType,
    pub size_in_bytes: u64,
    pub flags: u32,
    /// Memory interface width in bits.
    pub width: u32,
    pub mem_clk_max: u32,
}

/// Cache type bit set (`Data`, `Instruction`, `CPU`, `HSACU`).
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheType(pub u32);

impl CacheType {
    pub const DATA: u32 = 1 << 0;
    pub const INSTRUCTION: u32 = 1 << 1;
    pub const CPU: u32 = 1 << 2;
    pub const HSA_CU: u32 = 1 << 3;

    pub fn data(&self) -> bool {
        self.0 & Self::DATA != 0
    }

    pub fn instruction(&self) -> bool {
        self.0 & Self::INSTRUCTION != 0
    }

    pub fn cpu(&self) -> bool {
        self.0 & Self::CPU != 0
    }

    pub fn hsa_cu(&self) -> bool {
        self.0 & Self::HSA_CU != 0
    }
}

impl fmt::Debug for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.data() {
            parts.push("Data");
        }
        if self.instruction() {
            parts.push("Instruction");
        }
        if self.cpu() {
            parts.push("CPU");
        }
        if self.hsa_cu() {
            parts.push("HSACU");
        }
        write!(f, "CacheType({})", parts.join("|"))
    }
}

/// One cache level of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheDescriptor {
    pub processor_id_low: u32,
    pub level: u32,
    /// Size in KiB.
    pub size_kb: u32,
    pub line_size: u32,
    pub lines_per_tag: u32,
    pub associativity: u32,
    /// Latency in ns.
    pub latency: u32,
    pub cache_type: CacheType,
    /// APIC ids sharing this cache, as 0/1 flags. Empty if unknown.
    pub sibling_map: Vec<u32>,
}

/// Interconnect kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoLinkType {
    #[default]
    Undefined,
    HyperTransport,
    PciExpress,
    Amba,
    Mipi,
    Qpi11,
    RapidIo,
    Infiniband,
    Xgmi,
    Xgop,
    Gz,
    EthernetRdma,
    RdmaOther,
    Other,
    Unknown(u32),
}

impl From<u32> for IoLinkType {
    fn from(v: u32) -> Self {
        match v {
            0 => Self::Undefined,
            1 => Self::HyperTransport,
            2 => Self::PciExpress,
            3 => Self::Amba,
            4 => Self::Mipi,
            5 => Self::Qpi11,
            8 => Self::RapidIo,
            9 => Self::Infiniband,
            11 => Self::Xgmi,
            12 => Self::Xgop,
            13 => Self::Gz,
            14 => Self::EthernetRdma,
            15 => Self::RdmaOther,
            16 => Self::Other,
            other => Self::Unknown(other),
        }
    }
}

/// Whether a link was reported by the source or synthesized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkKind {
    #[default]
    Direct,
    Indirect,
}

/// A directed interconnect edge from `node_from` to `node_to`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRecord {
    pub link_type: IoLinkType,
    pub kind: LinkKind,
    /// Reported through the peer-to-peer table.
    pub p2p: bool,
    pub version_major: u32,
    pub version_minor: u32,
    pub node_from: u32,
    pub node_to: u32,
    /// Relative distance; larger is farther.
    pub weight: u32,
    pub min_latency: u32,
    pub max_latency: u32,
    pub min_bandwidth: u32,
    pub max_bandwidth: u32,
    pub rec_transfer_size: u32,
    pub rec_sdma_eng_id_mask: u32,
    pub flags: u32,
}

impl LinkRecord {
    /// A synthesized link.
    pub fn indirect(node_from: u32, node_to: u32, link_type: IoLinkType, weight: u32) -> Self {
        Self {
            link_type,
            kind: LinkKind::Indirect,
            node_from,
            node_to,
            weight,
            ..Default::default()
        }
    }
}
