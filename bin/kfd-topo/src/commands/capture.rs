// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `kfd-topo capture` command: write the live topology as a replayable
//! [`StaticSource`] JSON file.

use anyhow::Context;
use kfd_sysfs::TopologyConfig;
use kfd_topology::StaticSource;
use std::path::PathBuf;

pub async fn execute(config: TopologyConfig, output: PathBuf) -> anyhow::Result<()> {
    let (snapshot, _) = super::snapshot(config, None).await?;
    let source = StaticSource::from_snapshot(&snapshot);
    let json = serde_json::to_string_pretty(&source)?;
    std::fs::write(&output, json).with_context(|| format!("writing {}", output.display()))?;

    tracing::info!(path = %output.display(), "captured topology");
    println!("{}", snapshot.summary());
    println!("Written to {}", output.display());
    Ok(())
}
