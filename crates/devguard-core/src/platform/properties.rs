// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Android build property files.

#![cfg_attr(not(target_os = "android"), allow(dead_code))]

use std::fs;
use std::io;

use crate::error::ProbeError;

/// Property files in lookup order; the first file defining a key wins.
const PROPERTY_FILES: &[&str] = &[
    "/system/build.prop",
    "/vendor/build.prop",
    "/product/build.prop",
    "/default.prop",
];

/// Look `name` up in the readable build.prop files.
pub(crate) fn read_build_property(name: &str) -> Result<Option<String>, ProbeError> {
    let mut readable = false;

    for path in PROPERTY_FILES {
        match fs::read_to_string(path) {
            Ok(content) => {
                readable = true;
                if let Some(value) = find_property(&content, name) {
                    return Ok(Some(value));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {}
            Err(e) => return Err(e.into()),
        }
    }

    if readable {
        Ok(None)
    } else {
        Err(ProbeError::Unavailable("no readable build.prop file".to_string()))
    }
}

/// Find `name=value` in build.prop syntax, ignoring comments.
pub(crate) fn find_property(content: &str, name: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
}
