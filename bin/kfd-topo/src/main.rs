// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # kfd-topo
//!
//! Command-line interface for KFD topology snapshots.
//!
//! ## Usage
//! ```bash
//! # Print the live topology
//! kfd-topo show
//!
//! # Capture it for later replay, then replay it as JSON
//! kfd-topo capture --output node.json
//! kfd-topo show --replay node.json --json
//!
//! # Link weight matrix, including synthesized links
//! kfd-topo links
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kfd-topo",
    about = "Inspect and capture the KFD CPU/GPU topology",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file (sysfs paths, retry policy).
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a snapshot and print nodes, memory banks, caches, and links.
    Show {
        /// Print the snapshot as JSON.
        #[arg(long)]
        json: bool,

        /// Replay a captured topology instead of reading sysfs.
        #[arg(long)]
        replay: Option<std::path::PathBuf>,
    },

    /// Print the link weight matrix.
    Links {
        /// Replay a captured topology instead of reading sysfs.
        #[arg(long)]
        replay: Option<std::path::PathBuf>,
    },

    /// Print the current topology generation counter.
    Generation,

    /// Snapshot the live topology and write it as replayable JSON.
    Capture {
        /// Output file.
        #[arg(short, long)]
        output: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Show { json, replay } => commands::show::execute(config, replay, json).await,
        Commands::Links { replay } => commands::links::execute(config, replay).await,
        Commands::Generation => commands::generation::execute(config).await,
        Commands::Capture { output } => commands::capture::execute(config, output).await,
    }
}
