// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `kfd-topo show` command: print a topology snapshot.

use kfd_sysfs::TopologyConfig;
use kfd_topology::{LinkKind, NodeRecord};
use std::path::PathBuf;

pub async fn execute(
    config: TopologyConfig,
    replay: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let (snapshot, stats) = super::snapshot(config, replay).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              kfd-topo · System Topology              ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
    println!("  {}", snapshot.summary());
    println!(
        "  Platform: oem {:#x}  id {:#x}  rev {}",
        snapshot.system.platform_oem, snapshot.system.platform_id, snapshot.system.platform_rev,
    );
    println!();

    for (i, node) in snapshot.nodes.iter().enumerate() {
        print_node(i, node);
    }

    if let Some(stats) = stats {
        println!("  Pass: {}", stats.summary());
    }
    Ok(())
}

fn print_node(index: usize, node: &NodeRecord) {
    let p = &node.properties;
    if node.is_gpu() {
        println!("  Node {index}  GPU  id {}  {}", p.gpu_id, p.amd_name);
        println!(
            "   SIMDs:        {}  ({} CU/array, {} XCC)",
            p.num_f_compute_cores, p.num_cu_per_array, p.num_xcc,
        );
        if p.hive_id != 0 {
            println!("   XGMI hive:    {:#x}", p.hive_id);
        }
    } else {
        println!("  Node {index}  CPU  {}", p.marketing_name);
        println!("   Cores:        {}", p.num_cpu_cores);
    }

    for bank in &node.memory_banks {
        println!(
            "   Memory:       {:?}  {} MB",
            bank.heap_type,
            bank.size_in_bytes / (1024 * 1024),
        );
    }
    for cache in &node.caches {
        println!(
            "   Cache:        L{}  {} KB  {:?}",
            cache.level, cache.size_kb, cache.cache_type,
        );
    }
    for link in &node.links {
        let kind = match (link.kind, link.p2p) {
            (LinkKind::Indirect, _) => "indirect",
            (LinkKind::Direct, true) => "p2p",
            (LinkKind::Direct, false) => "direct",
        };
        println!(
            "   Link:         -> {}  {:?}  weight {}  ({kind})",
            link.node_to, link.link_type, link.weight,
        );
    }
    println!();
}
