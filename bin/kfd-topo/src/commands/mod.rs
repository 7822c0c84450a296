// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

pub mod capture;
pub mod generation;
pub mod links;
pub mod show;

use anyhow::Context;
use kfd_sysfs::TopologyConfig;
use kfd_topology::{PassStats, SnapshotCoordinator, StaticSource, SystemSnapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<TopologyConfig> {
    match path {
        Some(p) => TopologyConfig::from_file(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(TopologyConfig::default()),
    }
}

/// Takes one snapshot, from live sysfs or a replay file, on the blocking
/// pool.
pub async fn snapshot(
    config: TopologyConfig,
    replay: Option<PathBuf>,
) -> anyhow::Result<(Arc<SystemSnapshot>, Option<PassStats>)> {
    tokio::task::spawn_blocking(move || match replay {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading replay file {}", path.display()))?;
            let source: StaticSource = serde_json::from_str(&content)
                .with_context(|| format!("parsing replay file {}", path.display()))?;
            take(&SnapshotCoordinator::with_retry(source, config.retry))
        }
        None => take(&kfd_sysfs::open(&config)),
    })
    .await?
}

fn take<S: kfd_topology::TopologySource>(
    topology: &SnapshotCoordinator<S>,
) -> anyhow::Result<(Arc<SystemSnapshot>, Option<PassStats>)> {
    topology
        .take_topology_snapshot()
        .context("taking topology snapshot")?;
    let snapshot = topology.snapshot()?;
    Ok((snapshot, topology.last_pass_stats()))
}
