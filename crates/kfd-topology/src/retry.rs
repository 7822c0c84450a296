// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Bounded retry for generation-checked passes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often, and how patiently, a pass is retried after the topology
/// generation changed underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total passes attempted before giving up. `0` is treated as `1`.
    pub max_attempts: u32,
    /// Sleep after the first failed attempt.
    pub initial_backoff_ms: u64,
    /// Upper bound for the doubling backoff.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 16,
            initial_backoff_ms: 1,
            max_backoff_ms: 64,
        }
    }
}

impl RetryPolicy {
    /// Retries immediately, without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Sleep after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(63);
        let ms = self
            .initial_backoff_ms
            .checked_mul(1u64 << shift)
            .unwrap_or(u64::MAX)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}
