// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

#![allow(dead_code)]

use std::collections::HashSet;

use devguard_core::{Platform, ProbeError, SyscallFlag};

/// Scriptable platform for integration tests.
#[derive(Debug, Default)]
pub struct FakePlatform {
    pub traced: Option<bool>,
    pub modules: Option<Vec<String>>,
    pub packages: Option<HashSet<String>>,
}

impl FakePlatform {
    pub fn traced() -> Self {
        Self {
            traced: Some(true),
            ..Self::default()
        }
    }

    pub fn untraced() -> Self {
        Self {
            traced: Some(false),
            ..Self::default()
        }
    }

    pub fn with_modules(mut self, modules: &[&str]) -> Self {
        self.modules = Some(modules.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn with_packages(mut self, packages: &[&str]) -> Self {
        self.packages = Some(packages.iter().map(|p| p.to_string()).collect());
        self
    }
}

impl Platform for FakePlatform {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn loaded_modules(&self) -> Result<Vec<String>, ProbeError> {
        self.modules
            .clone()
            .ok_or(ProbeError::Unsupported("loaded module list"))
    }

    fn syscall_flag(&self, flag: SyscallFlag) -> Result<bool, ProbeError> {
        match flag {
            SyscallFlag::TraceAttached => self.traced.ok_or(ProbeError::Unsupported("trace flag")),
            SyscallFlag::DebuggableBuild => Err(ProbeError::Unsupported("debuggable build flag")),
        }
    }

    fn package_installed(&self, package: &str) -> Result<bool, ProbeError> {
        self.packages
            .as_ref()
            .map(|packages| packages.contains(package))
            .ok_or(ProbeError::Unsupported("package registry"))
    }
}
