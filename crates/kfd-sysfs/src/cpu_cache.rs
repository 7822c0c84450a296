// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CPU cache discovery for CPU nodes that report no KFD caches.
//!
//! Walks `<system_nodes>/node<N>/cpu<M>/cache/index<K>/`. A cache shared by
//! several CPUs is listed once, under the first CPU of its
//! `shared_cpu_list`. Without a NUMA tree, node 0 falls back to
//! `<system_cpus>` and other nodes report no caches.

use crate::parse::{cpus_in_mask, first_cpu_in_list, parse_cache_size_kb, read_sysfs_file};
use crate::{SysfsError, SysfsPaths};
use kfd_topology::{CacheDescriptor, CacheType, CpuIdRecord, CPU_SIBLINGS};
use std::path::{Path, PathBuf};

/// Caches of CPU node `node`, ordered by CPU then cache index.
pub fn cpu_caches(
    paths: &SysfsPaths,
    node: u32,
    cpus: &[CpuIdRecord],
) -> Result<Vec<CacheDescriptor>, SysfsError> {
    let numa_dir = paths.system_nodes.join(format!("node{node}"));
    let node_dir = if numa_dir.is_dir() {
        numa_dir
    } else if node == 0 {
        paths.system_cpus.clone()
    } else {
        tracing::debug!(node, "no NUMA tree for node, reporting no CPU caches");
        return Ok(Vec::new());
    };

    let mut caches = Vec::new();
    for (proc_num, cpu_dir) in numbered_dirs(&node_dir, "cpu")? {
        let cache_dir = cpu_dir.join("cache");
        if !cache_dir.is_dir() {
            continue;
        }
        for (_, index_dir) in numbered_dirs(&cache_dir, "index")? {
            if let Some(cache) = read_cache_index(&index_dir, proc_num, cpus)? {
                caches.push(cache);
            }
        }
    }
    if caches.is_empty() {
        tracing::debug!(node, dir = %node_dir.display(), "no CPU cache information");
    }
    Ok(caches)
}

/// Reads one `index<K>` directory. Returns `None` when the cache belongs to
/// another CPU of its sharing set.
fn read_cache_index(
    dir: &Path,
    proc_num: u32,
    cpus: &[CpuIdRecord],
) -> Result<Option<CacheDescriptor>, SysfsError> {
    let shared_list_path = dir.join("shared_cpu_list");
    let shared_list = read_sysfs_file(&shared_list_path)?;
    let owner = first_cpu_in_list(&shared_list).ok_or_else(|| SysfsError::ParseError {
        path: shared_list_path.display().to_string(),
        detail: format!("bad CPU list '{shared_list}'"),
    })?;
    if owner != proc_num {
        return Ok(None);
    }

    let mut cache_type = match read_sysfs_file(&dir.join("type"))?.as_str() {
        "Data" => CacheType::DATA,
        "Instruction" => CacheType::INSTRUCTION,
        "Unified" => CacheType::DATA | CacheType::INSTRUCTION,
        _ => 0,
    };
    cache_type |= CacheType::CPU;

    let size_path = dir.join("size");
    let size = read_sysfs_file(&size_path)?;
    let size_kb = parse_cache_size_kb(&size).ok_or_else(|| SysfsError::ParseError {
        path: size_path.display().to_string(),
        detail: format!("bad cache size '{size}'"),
    })?;

    let map_path = dir.join("shared_cpu_map");
    let map = read_sysfs_file(&map_path)?;
    let shared = cpus_in_mask(&map).ok_or_else(|| SysfsError::ParseError {
        path: map_path.display().to_string(),
        detail: format!("bad CPU mask '{map}'"),
    })?;

    Ok(Some(CacheDescriptor {
        processor_id_low: apicid_of(cpus, proc_num),
        level: read_u32(&dir.join("level"))?,
        size_kb,
        line_size: read_u32(&dir.join("coherency_line_size"))?,
        lines_per_tag: read_u32(&dir.join("physical_line_partition"))?,
        associativity: read_u32(&dir.join("ways_of_associativity"))?,
        latency: 0,
        cache_type: CacheType(cache_type),
        sibling_map: sibling_map(&shared, cpus),
    }))
}

/// 0/1 flags indexed by APIC id for every CPU sharing the cache.
fn sibling_map(shared: &[u32], cpus: &[CpuIdRecord]) -> Vec<u32> {
    let mut map = vec![0; CPU_SIBLINGS];
    for &proc_num in shared {
        let apicid = apicid_of(cpus, proc_num) as usize;
        match map.get_mut(apicid) {
            Some(slot) => *slot = 1,
            None => tracing::warn!(apicid, max = CPU_SIBLINGS, "sibling map too small"),
        }
    }
    map
}

fn apicid_of(cpus: &[CpuIdRecord], proc_num: u32) -> u32 {
    cpus.iter()
        .find(|c| c.proc_num == proc_num)
        .map_or(proc_num, |c| c.apicid)
}

fn read_u32(path: &Path) -> Result<u32, SysfsError> {
    let content = read_sysfs_file(path)?;
    content.parse::<u32>().map_err(|_| SysfsError::ParseError {
        path: path.display().to_string(),
        detail: format!("expected integer, got '{content}'"),
    })
}

/// Subdirectories named `<prefix><number>`, sorted by number.
pub(crate) fn numbered_dirs(
    dir: &Path,
    prefix: &str,
) -> Result<Vec<(u32, PathBuf)>, SysfsError> {
    let entries = std::fs::read_dir(dir).map_err(|e| SysfsError::ReadError {
        path: dir.display().to_string(),
        source: e,
    })?;
    numbered_entries(dir, prefix, entries.map(|e| e.map(|e| e.path())))
}

/// Filters directory listing `entries` of `dir`. A failed entry aborts the walk.
fn numbered_entries(
    dir: &Path,
    prefix: &str,
    entries: impl IntoIterator<Item = std::io::Result<PathBuf>>,
) -> Result<Vec<(u32, PathBuf)>, SysfsError> {
    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| SysfsError::ReadError {
            path: dir.display().to_string(),
            source: e,
        })?;
        let number = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix(prefix))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(number) = number {
            if path.is_dir() {
                dirs.push((number, path));
            }
        }
    }
    dirs.sort_by_key(|(n, _)| *n);
    Ok(dirs)
}
