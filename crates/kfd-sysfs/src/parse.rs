// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Parsers for sysfs file formats.
//!
//! - KFD `properties` files: one `key value` pair per line.
//! - CPU lists such as `shared_cpu_list`: `0-3,8,10-11`.
//! - CPU masks such as `shared_cpu_map`: comma-separated 32-bit hex words,
//!   most significant word first.

use crate::SysfsError;
use std::collections::BTreeMap;
use std::path::Path;

/// Reads a sysfs/procfs file and returns its trimmed content.
pub(crate) fn read_sysfs_file(path: &Path) -> Result<String, SysfsError> {
    if !path.exists() {
        return Err(SysfsError::NotAvailable {
            path: path.display().to_string(),
        });
    }
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| SysfsError::ReadError {
            path: path.display().to_string(),
            source: e,
        })
}

/// Reads and parses a single integer file (`generation_id`, `gpu_id`, ...).
pub(crate) fn read_sysfs_u64(path: &Path) -> Result<u64, SysfsError> {
    let content = read_sysfs_file(path)?;
    content.parse::<u64>().map_err(|_| SysfsError::ParseError {
        path: path.display().to_string(),
        detail: format!("expected integer, got '{content}'"),
    })
}

/// A parsed `key value` properties file.
///
/// Lines that do not split into exactly two fields are ignored. Lookups of
/// missing keys yield `None`; present keys with non-numeric values are
/// parse errors.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    path: String,
    values: BTreeMap<String, String>,
}

impl Properties {
    pub fn read(path: &Path) -> Result<Self, SysfsError> {
        let content = read_sysfs_file(path)?;
        Ok(Self::parse(&path.display().to_string(), &content))
    }

    pub fn parse(path: &str, content: &str) -> Self {
        let values = content
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                match (fields.next(), fields.next(), fields.next()) {
                    (Some(key), Some(value), None) => Some((key.to_string(), value.to_string())),
                    _ => None,
                }
            })
            .collect();
        Self {
            path: path.to_string(),
            values,
        }
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Result<Option<u64>, SysfsError> {
        self.raw(key)
            .map(|v| {
                v.parse::<u64>().map_err(|_| SysfsError::ParseError {
                    path: self.path.clone(),
                    detail: format!("{key}: expected integer, got '{v}'"),
                })
            })
            .transpose()
    }

    /// Value of `key`, or zero when absent.
    pub fn u64_or_zero(&self, key: &str) -> Result<u64, SysfsError> {
        Ok(self.get(key)?.unwrap_or(0))
    }

    /// Like [`u64_or_zero`](Self::u64_or_zero), truncated to 32 bits.
    pub fn u32_or_zero(&self, key: &str) -> Result<u32, SysfsError> {
        Ok(self.u64_or_zero(key)? as u32)
    }

    /// Comma-separated integer list, e.g. a KFD cache `sibling_map`.
    pub fn list(&self, key: &str) -> Result<Vec<u32>, SysfsError> {
        let Some(raw) = self.raw(key) else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.trim().parse::<u32>().map_err(|_| SysfsError::ParseError {
                    path: self.path.clone(),
                    detail: format!("{key}: bad list entry '{s}'"),
                })
            })
            .collect()
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// First CPU of a CPU list like `"4-7,12"` (→ 4).
pub(crate) fn first_cpu_in_list(s: &str) -> Option<u32> {
    let first = s.split(',').next()?.trim();
    let start = first.split_once('-').map_or(first, |(start, _)| start);
    start.trim().parse().ok()
}

/// CPUs set in a mask like `"00000000,0000000f"` (→ 0, 1, 2, 3).
pub(crate) fn cpus_in_mask(s: &str) -> Option<Vec<u32>> {
    let mut cpus = Vec::new();
    for (word_index, word) in s.trim().split(',').rev().enumerate() {
        let bits = u32::from_str_radix(word.trim(), 16).ok()?;
        for bit in 0..32 {
            if bits & (1 << bit) != 0 {
                cpus.push(word_index as u32 * 32 + bit);
            }
        }
    }
    Some(cpus)
}

/// Cache size in KiB from `size` (e.g. `"32K"`, `"8M"`, or bytes).
pub(crate) fn parse_cache_size_kb(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(k) = s.strip_suffix('K') {
        k.parse().ok()
    } else if let Some(m) = s.strip_suffix('M') {
        m.parse::<u32>().ok()?.checked_mul(1024)
    } else {
        s.parse::<u32>().ok().map(|bytes| bytes / 1024)
    }
}
