// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Snapshot coordination: generation-checked passes and atomic publish.
//!
//! A pass reads the generation, enumerates every node, synthesizes indirect
//! links when no peer-to-peer links were reported, and re-reads the
//! generation. A mismatch discards the whole candidate and retries under
//! the [`RetryPolicy`]. A consistent candidate is published with a single
//! atomic swap; readers holding the previous snapshot keep it alive until
//! they drop their handle.

use crate::enumerate::NodeEnumerator;
use crate::links::synthesize_indirect_links;
use crate::{
    PassStats, RetryPolicy, SystemProperties, SystemSnapshot, TopologyError, TopologySource,
};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::sync::Arc;

/// Outcome of one read pass.
enum Pass {
    Consistent(SystemSnapshot),
    GenerationChanged { start: u32, end: u32 },
}

/// Owns a topology source and the published snapshot built from it.
///
/// Any number of threads may read [`current_snapshot`](Self::current_snapshot)
/// concurrently. Passes are serialized: a second caller of
/// [`take_topology_snapshot`](Self::take_topology_snapshot) blocks until the
/// first one has committed or failed.
pub struct SnapshotCoordinator<S: TopologySource> {
    source: S,
    retry: RetryPolicy,
    published: ArcSwapOption<SystemSnapshot>,
    /// Held for a whole pass plus commit. Guards the stats of the last
    /// committed pass.
    writer: Mutex<Option<PassStats>>,
}

impl<S: TopologySource> SnapshotCoordinator<S> {
    pub fn new(source: S) -> Self {
        Self::with_retry(source, RetryPolicy::default())
    }

    pub fn with_retry(source: S, retry: RetryPolicy) -> Self {
        Self {
            source,
            retry,
            published: ArcSwapOption::empty(),
            writer: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Builds a fresh snapshot and publishes it.
    ///
    /// On error the previously published snapshot, if any, is left exactly
    /// as it was.
    pub fn take_topology_snapshot(&self) -> Result<(), TopologyError> {
        let mut last_stats = self.writer.lock();
        let (snapshot, stats) = self.consistent_pass()?;

        tracing::info!(
            generation = snapshot.generation,
            nodes = snapshot.num_nodes(),
            attempts = stats.attempts,
            "topology snapshot committed"
        );
        tracing::debug!("{}", stats.summary());

        let previous = self.published.swap(Some(Arc::new(snapshot)));
        *last_stats = Some(stats);
        drop(last_stats);
        drop(previous);
        Ok(())
    }

    /// The published snapshot, if any.
    pub fn current_snapshot(&self) -> Option<Arc<SystemSnapshot>> {
        self.published.load_full()
    }

    /// The published snapshot, or `NoSnapshot`.
    pub fn snapshot(&self) -> Result<Arc<SystemSnapshot>, TopologyError> {
        self.current_snapshot().ok_or(TopologyError::NoSnapshot)
    }

    /// System summary of the published snapshot, taking one first if none
    /// has been published yet.
    pub fn acquire_system_properties(&self) -> Result<SystemProperties, TopologyError> {
        if let Some(snapshot) = self.current_snapshot() {
            return Ok(snapshot.system);
        }
        self.take_topology_snapshot()?;
        Ok(self.snapshot()?.system)
    }

    /// Drops the published snapshot. Outstanding handles stay valid.
    pub fn release(&self) {
        let _writer = self.writer.lock();
        self.published.store(None);
    }

    /// Statistics of the last committed pass.
    pub fn last_pass_stats(&self) -> Option<PassStats> {
        self.writer.lock().clone()
    }

    /// Runs passes until one is generation-consistent or the retry budget
    /// is spent.
    fn consistent_pass(&self) -> Result<(SystemSnapshot, PassStats), TopologyError> {
        let max_attempts = self.retry.attempts();
        let mut stats = PassStats::default();
        for attempt in 1..=max_attempts {
            stats.attempts = attempt;
            stats.reset_counts();
            match self.read_pass(&mut stats)? {
                Pass::Consistent(snapshot) => return Ok((snapshot, stats)),
                Pass::GenerationChanged { start, end } => {
                    tracing::warn!(
                        attempt,
                        start,
                        end,
                        "topology generation changed during pass, retrying"
                    );
                    if attempt < max_attempts {
                        std::thread::sleep(self.retry.backoff(attempt));
                    }
                }
            }
        }
        Err(TopologyError::Inconsistent {
            attempts: max_attempts,
        })
    }

    /// One read pass. Every candidate allocation is owned by locals and is
    /// freed on any early return.
    fn read_pass(&self, stats: &mut PassStats) -> Result<Pass, TopologyError> {
        let start = self.source.generation()?;
        let system = self.source.system_properties()?;

        let mut enumerator = NodeEnumerator::new(&self.source, system.num_nodes);
        let mut nodes = Vec::new();
        nodes
            .try_reserve_exact(system.num_nodes as usize)
            .map_err(|_| TopologyError::OutOfMemory {
                context: format!("{} node records", system.num_nodes),
            })?;

        let mut p2p_links_present = false;
        for node in 0..system.num_nodes {
            let enumerated = enumerator.enumerate_node(node)?;
            p2p_links_present |= enumerated.p2p_links_present;
            nodes.push(enumerated.record);
        }
        let mut pass_stats = enumerator.stats;

        if !p2p_links_present {
            synthesize_indirect_links(&mut nodes, &mut pass_stats);
        }

        let end = self.source.generation()?;
        pass_stats.attempts = stats.attempts;
        *stats = pass_stats;
        if start != end {
            return Ok(Pass::GenerationChanged { start, end });
        }

        Ok(Pass::Consistent(SystemSnapshot {
            system,
            nodes,
            generation: end,
        }))
    }
}

impl<S: TopologySource + std::fmt::Debug> std::fmt::Debug for SnapshotCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCoordinator")
            .field("source", &self.source)
            .field("retry", &self.retry)
            .field("generation", &self.current_snapshot().map(|s| s.generation))
            .finish()
    }
}
