// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `kfd-topo links` command: print the link weight matrix.
//!
//! Indirect links are marked with `*`; `-` means no link.

use kfd_sysfs::TopologyConfig;
use kfd_topology::{LinkKind, SystemSnapshot};
use std::path::PathBuf;

pub async fn execute(config: TopologyConfig, replay: Option<PathBuf>) -> anyhow::Result<()> {
    let (snapshot, _) = super::snapshot(config, replay).await?;
    print!("{}", weight_matrix(&snapshot));
    Ok(())
}

fn weight_matrix(snapshot: &SystemSnapshot) -> String {
    let n = snapshot.num_nodes();
    let mut out = String::from("from\\to");
    for to in 0..n {
        out.push_str(&format!("{to:>7}"));
    }
    out.push('\n');

    for from in 0..n {
        out.push_str(&format!("{from:>7}"));
        for to in 0..n {
            let cell = if from == to {
                "0".to_string()
            } else {
                match snapshot.link_between(from, to) {
                    Some(l) if l.kind == LinkKind::Indirect => format!("{}*", l.weight),
                    Some(l) => l.weight.to_string(),
                    None => "-".to_string(),
                }
            };
            out.push_str(&format!("{cell:>7}"));
        }
        out.push('\n');
    }
    out
}
