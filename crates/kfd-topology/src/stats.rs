// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Statistics for a committed snapshot pass.
//!
//! [`PassStats`] counts what a pass read and what it skipped. The
//! coordinator keeps the stats of the last committed pass for diagnostics.

/// Counters for one committed snapshot pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct PassStats {
    /// Passes started, including those discarded on a generation change.
    pub attempts: u32,
    pub nodes: u32,
    pub memory_banks: u32,
    pub caches: u32,
    /// Standard links populated.
    pub direct_links: u32,
    /// Peer-to-peer links populated.
    pub p2p_links: u32,
    /// Link entries skipped as not supported.
    pub skipped_links: u32,
    /// Links synthesized by the resolver.
    pub indirect_links: u32,
}

impl PassStats {
    /// Total populated links across all nodes.
    pub fn total_links(&self) -> u32 {
        self.direct_links + self.p2p_links + self.indirect_links
    }

    /// Resets the per-pass counters, keeping `attempts`.
    pub(crate) fn reset_counts(&mut self) {
        *self = Self {
            attempts: self.attempts,
            ..Self::default()
        };
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} nodes, {} banks, {} caches, {} links ({} direct, {} p2p, {} indirect, {} skipped) after {} attempt(s)",
            self.nodes,
            self.memory_banks,
            self.caches,
            self.total_links(),
            self.direct_links,
            self.p2p_links,
            self.indirect_links,
            self.skipped_links,
            self.attempts,
        )
    }
}
