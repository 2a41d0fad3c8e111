// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Loaded-module and process-table scans.

use std::collections::BTreeSet;

use super::Observation;
use crate::platform::Platform;

/// Positive if any pattern occurs, case-insensitively, in a loaded module path.
pub(crate) fn loaded_modules(platform: &dyn Platform, patterns: &[String]) -> Observation {
    match platform.loaded_modules() {
        Ok(modules) => scan("loaded module", modules.iter().map(String::as_str), patterns),
        Err(e) => Observation::from_error(e),
    }
}

/// Positive if any pattern occurs, case-insensitively, in a running command line.
pub(crate) fn running_processes(platform: &dyn Platform, patterns: &[String]) -> Observation {
    match platform.running_processes() {
        Ok(processes) => scan(
            "running process",
            processes.iter().map(|p| p.command.as_str()),
            patterns,
        ),
        Err(e) => Observation::from_error(e),
    }
}

fn scan<'a>(label: &str, haystacks: impl Iterator<Item = &'a str>, patterns: &[String]) -> Observation {
    let needles: Vec<String> = patterns.iter().map(|p| p.to_lowercase()).collect();

    // Report the matched patterns, not the full paths or command lines.
    let mut matched = BTreeSet::new();
    for haystack in haystacks {
        let haystack = haystack.to_lowercase();
        for (needle, pattern) in needles.iter().zip(patterns) {
            if haystack.contains(needle.as_str()) {
                matched.insert(pattern.as_str());
            }
        }
    }

    if matched.is_empty() {
        Observation::negative()
    } else {
        let matched: Vec<&str> = matched.into_iter().collect();
        Observation::positive(format!("{} matches: {}", label, matched.join(", ")))
    }
}
