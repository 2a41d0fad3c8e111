// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Platform adapters.
//!
//! Signals that only exist on some operating systems (trace flags, the loaded
//! module list, package registries, code signing) are read through the
//! [`Platform`] trait. The engine receives one adapter value at construction;
//! every method defaults to [`ProbeError::Unsupported`] so an adapter only
//! implements what its OS can answer.
//!
//! [`NativePlatform`] reads what the native layer can see by itself (procfs,
//! build.prop files, `proc_pidinfo`, the dyld image list) and carries the
//! facts only the host UI layer knows, such as installed packages or the
//! signing certificate, handed over through its builder methods.

use std::collections::{HashMap, HashSet};

use crate::catalog::SyscallFlag;
use crate::error::ProbeError;

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod darwin;
pub(crate) mod procfs;
pub(crate) mod properties;

/// A running process as seen by a `running-process` probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    /// Command line with arguments separated by spaces.
    pub command: String,
}

/// OS-specific signal source.
#[cfg_attr(test, mockall::automock)]
pub trait Platform: Send + Sync {
    /// Short adapter name for logs.
    fn name(&self) -> &'static str;

    /// Paths of the images mapped into the current process.
    fn loaded_modules(&self) -> Result<Vec<String>, ProbeError> {
        Err(ProbeError::Unsupported("loaded module list"))
    }

    fn running_processes(&self) -> Result<Vec<ProcessEntry>, ProbeError> {
        Err(ProbeError::Unsupported("process table"))
    }

    /// `Ok(None)` when the property store is readable but the key is unset.
    fn system_property(&self, _name: &str) -> Result<Option<String>, ProbeError> {
        Err(ProbeError::Unsupported("system properties"))
    }

    fn syscall_flag(&self, flag: SyscallFlag) -> Result<bool, ProbeError> {
        let _ = flag;
        Err(ProbeError::Unsupported("syscall flag"))
    }

    fn package_installed(&self, _package: &str) -> Result<bool, ProbeError> {
        Err(ProbeError::Unsupported("package registry"))
    }

    fn can_open_url(&self, _url: &str) -> Result<bool, ProbeError> {
        Err(ProbeError::Unsupported("URL scheme resolution"))
    }

    /// DER bytes of the app's signing certificate, `Ok(None)` if the app is unsigned.
    fn signing_certificate(&self) -> Result<Option<Vec<u8>>, ProbeError> {
        Err(ProbeError::Unsupported("code signing information"))
    }
}

#[derive(Debug, Clone, Default)]
enum SigningInfo {
    #[default]
    Unknown,
    Unsigned,
    Certificate(Vec<u8>),
}

/// Adapter for the platform this crate was compiled for.
#[derive(Debug, Clone, Default)]
pub struct NativePlatform {
    installed_packages: Option<HashSet<String>>,
    openable_schemes: Option<HashSet<String>>,
    properties: HashMap<String, String>,
    signing: SigningInfo,
    debuggable_build: Option<bool>,
    debugger_connected: Option<bool>,
}

impl NativePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Package identifiers the host's package manager reports as installed.
    pub fn with_installed_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.installed_packages = Some(packages.into_iter().map(Into::into).collect());
        self
    }

    /// URL schemes (without `://`) the host reports as openable.
    pub fn with_openable_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.openable_schemes = Some(
            schemes
                .into_iter()
                .map(|s| Into::<String>::into(s).to_ascii_lowercase())
                .collect(),
        );
        self
    }

    /// Build properties known to the host (e.g. `ro.build.tags`). These take
    /// precedence over anything read from build.prop files.
    pub fn with_system_property(mut self, name: &str, value: &str) -> Self {
        self.properties.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_signing_certificate(mut self, der: Vec<u8>) -> Self {
        self.signing = SigningInfo::Certificate(der);
        self
    }

    /// The host looked for signing information and found none.
    pub fn with_missing_signature(mut self) -> Self {
        self.signing = SigningInfo::Unsigned;
        self
    }

    pub fn with_debuggable_build(mut self, debuggable: bool) -> Self {
        self.debuggable_build = Some(debuggable);
        self
    }

    /// Runtime-level debugger state (e.g. a JDWP debugger) reported by the host.
    pub fn with_debugger_connected(mut self, connected: bool) -> Self {
        self.debugger_connected = Some(connected);
        self
    }

    fn trace_attached(&self) -> Result<bool, ProbeError> {
        if self.debugger_connected == Some(true) {
            return Ok(true);
        }
        match native_trace_attached() {
            Err(e) if e.is_unsupported() => self
                .debugger_connected
                .ok_or(ProbeError::Unsupported("trace flag")),
            other => other,
        }
    }
}

impl Platform for NativePlatform {
    fn name(&self) -> &'static str {
        std::env::consts::OS
    }

    fn loaded_modules(&self) -> Result<Vec<String>, ProbeError> {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            procfs::loaded_modules()
        }
        #[cfg(any(target_os = "macos", target_os = "ios"))]
        {
            Ok(darwin::loaded_images())
        }
        #[cfg(not(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "ios"
        )))]
        {
            Err(ProbeError::Unsupported("loaded module list"))
        }
    }

    fn running_processes(&self) -> Result<Vec<ProcessEntry>, ProbeError> {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            procfs::running_processes()
        }
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        {
            Err(ProbeError::Unsupported("process table"))
        }
    }

    fn system_property(&self, name: &str) -> Result<Option<String>, ProbeError> {
        if let Some(value) = self.properties.get(name) {
            return Ok(Some(value.clone()));
        }

        #[cfg(target_os = "android")]
        {
            properties::read_build_property(name)
        }
        #[cfg(not(target_os = "android"))]
        {
            if self.properties.is_empty() {
                Err(ProbeError::Unsupported("system properties"))
            } else {
                Ok(None)
            }
        }
    }

    fn syscall_flag(&self, flag: SyscallFlag) -> Result<bool, ProbeError> {
        match flag {
            SyscallFlag::TraceAttached => self.trace_attached(),
            SyscallFlag::DebuggableBuild => self
                .debuggable_build
                .ok_or(ProbeError::Unsupported("debuggable build flag")),
        }
    }

    fn package_installed(&self, package: &str) -> Result<bool, ProbeError> {
        match &self.installed_packages {
            Some(packages) => Ok(packages.contains(package)),
            None => Err(ProbeError::Unsupported("package registry")),
        }
    }

    fn can_open_url(&self, url: &str) -> Result<bool, ProbeError> {
        let schemes = self
            .openable_schemes
            .as_ref()
            .ok_or(ProbeError::Unsupported("URL scheme resolution"))?;
        let scheme = url.split_once(':').map(|(s, _)| s).unwrap_or(url);
        Ok(schemes.contains(&scheme.to_ascii_lowercase()))
    }

    fn signing_certificate(&self) -> Result<Option<Vec<u8>>, ProbeError> {
        match &self.signing {
            SigningInfo::Unknown => Err(ProbeError::Unsupported("code signing information")),
            SigningInfo::Unsigned => Ok(None),
            SigningInfo::Certificate(der) => Ok(Some(der.clone())),
        }
    }
}

fn native_trace_attached() -> Result<bool, ProbeError> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        procfs::tracer_pid().map(|pid| pid != 0)
    }
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        darwin::is_traced()
    }
    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios"
    )))]
    {
        Err(ProbeError::Unsupported("trace flag"))
    }
}
