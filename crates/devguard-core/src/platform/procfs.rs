// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! procfs readers for Linux and Android.

#![cfg_attr(not(any(target_os = "linux", target_os = "android")), allow(dead_code))]

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::debug;

use super::ProcessEntry;
use crate::error::ProbeError;

/// Upper bound for walking /proc, which can be large on busy hosts.
const PROCESS_SCAN_BUDGET: Duration = Duration::from_secs(1);

/// TracerPid of the current process; non-zero means a tracer is attached.
pub(crate) fn tracer_pid() -> Result<u32, ProbeError> {
    let status = fs::read_to_string("/proc/self/status")?;
    parse_tracer_pid(&status)
        .ok_or_else(|| ProbeError::Unavailable("TracerPid missing from /proc/self/status".into()))
}

pub(crate) fn parse_tracer_pid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|value| value.trim().parse::<u32>().ok())
}

/// Distinct file-backed mappings of the current process.
pub(crate) fn loaded_modules() -> Result<Vec<String>, ProbeError> {
    let maps = fs::read_to_string("/proc/self/maps")?;
    Ok(parse_maps(&maps))
}

/// Extract the pathname column from `/proc/<pid>/maps` content.
pub(crate) fn parse_maps(maps: &str) -> Vec<String> {
    let modules: BTreeSet<&str> = maps
        .lines()
        .filter_map(|line| line.split_whitespace().nth(5))
        .filter(|name| !name.is_empty())
        .collect();
    modules.into_iter().map(str::to_string).collect()
}

pub(crate) fn running_processes() -> Result<Vec<ProcessEntry>, ProbeError> {
    scan_processes(Path::new("/proc"), PROCESS_SCAN_BUDGET)
}

/// Read every `<root>/<pid>/cmdline`, stopping once `budget` is spent.
pub(crate) fn scan_processes(root: &Path, budget: Duration) -> Result<Vec<ProcessEntry>, ProbeError> {
    let start_time = Instant::now();
    let mut processes = Vec::new();

    for entry in fs::read_dir(root)? {
        if start_time.elapsed() > budget {
            debug!(scanned = processes.len(), "process scan budget exhausted");
            break;
        }

        let Ok(entry) = entry else { continue };
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };

        // Processes may exit mid-scan or be hidden by hidepid.
        if let Ok(raw) = fs::read(entry.path().join("cmdline")) {
            let command = decode_cmdline(&raw);
            if !command.is_empty() {
                processes.push(ProcessEntry { pid, command });
            }
        }
    }

    if processes.is_empty() {
        return Err(ProbeError::Unavailable(
            "no readable process command lines".to_string(),
        ));
    }
    Ok(processes)
}

fn decode_cmdline(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .split('\u{0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
