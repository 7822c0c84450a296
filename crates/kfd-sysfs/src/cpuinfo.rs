// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CPU identification from `/proc/cpuinfo`.
//!
//! Each `processor` line starts a record; `model name` and `apicid` fill it
//! in. Architectures without an `apicid` line get the processor number.

use crate::parse::read_sysfs_file;
use crate::SysfsError;
use kfd_topology::CpuIdRecord;
use std::path::Path;

/// Reads and parses a cpuinfo file.
pub fn read_cpuinfo(path: &Path) -> Result<Vec<CpuIdRecord>, SysfsError> {
    let content = read_sysfs_file(path)?;
    parse_cpuinfo(&path.display().to_string(), &content)
}

pub fn parse_cpuinfo(path: &str, content: &str) -> Result<Vec<CpuIdRecord>, SysfsError> {
    let mut records: Vec<CpuIdRecord> = Vec::new();
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        let parse = |what: &str| {
            value.parse::<u32>().map_err(|_| SysfsError::ParseError {
                path: path.to_string(),
                detail: format!("{what}: expected integer, got '{value}'"),
            })
        };

        if key == "processor" {
            let proc_num = parse("processor")?;
            records.push(CpuIdRecord {
                proc_num,
                apicid: proc_num,
                model_name: String::new(),
            });
            continue;
        }
        let Some(current) = records.last_mut() else {
            continue;
        };
        match key {
            "model name" => current.model_name = value.to_string(),
            "apicid" => current.apicid = parse("apicid")?,
            _ => {}
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const X86: &str = "\
processor\t: 0
vendor_id\t: AuthenticAMD
model name\t: AMD EPYC 7763 64-Core Processor
apicid\t\t: 0

processor\t: 1
vendor_id\t: AuthenticAMD
model name\t: AMD EPYC 7763 64-Core Processor
apicid\t\t: 2
";

    #[test]
    fn test_parse_x86() {
        let cpus = parse_cpuinfo("cpuinfo", X86).unwrap();
        assert_eq!(cpus.len(), 2);
        assert_eq!(cpus[1].proc_num, 1);
        assert_eq!(cpus[1].apicid, 2);
        assert_eq!(cpus[0].model_name, "AMD EPYC 7763 64-Core Processor");
    }

    #[test]
    fn test_apicid_defaults_to_processor() {
        let cpus =
            parse_cpuinfo("cpuinfo", "processor : 0\nprocessor : 1\nBogoMIPS : 50.00\n").unwrap();
        assert_eq!(cpus[1].apicid, 1);
        assert!(cpus[1].model_name.is_empty());
    }

    #[test]
    fn test_lines_before_first_processor_are_ignored() {
        let cpus = parse_cpuinfo("cpuinfo", "model name : ghost\nprocessor : 0\n").unwrap();
        assert_eq!(cpus.len(), 1);
        assert!(cpus[0].model_name.is_empty());
    }

    #[test]
    fn test_bad_apicid() {
        assert!(parse_cpuinfo("cpuinfo", "processor : 0\napicid : x\n").is_err());
    }
}
