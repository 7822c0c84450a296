// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `kfd-topo generation` command.

use kfd_sysfs::{KfdSysfs, TopologyConfig};
use kfd_topology::TopologySource;

pub async fn execute(config: TopologyConfig) -> anyhow::Result<()> {
    let generation =
        tokio::task::spawn_blocking(move || KfdSysfs::new(config.paths).generation()).await??;
    println!("{generation}");
    Ok(())
}
