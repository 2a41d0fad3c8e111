// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Probe execution.
//!
//! [`run`] executes one [`ProbeDescriptor`] and always yields a [`ProbeResult`].
//! Expected failures (missing permission, absent API, refused socket) are
//! mapped to `Negative` or `Inconclusive` inside the probe; a panic is caught
//! and recorded as `Inconclusive`. Nothing escapes to abort a sweep.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{ProbeDescriptor, ProbeKind};
use crate::error::ProbeError;
use crate::platform::Platform;

mod debugger;
mod environment;
mod filesystem;
mod host;
mod network;
mod process;
mod signature;

/// Ternary result of one probe invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Signal of compromise found.
    Positive,
    /// Signal absent.
    Negative,
    /// The probe could not determine the signal.
    Inconclusive,
}

/// Outcome of a probe plus a short diagnostic note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub probe_id: String,
    pub outcome: ProbeOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl ProbeResult {
    /// Result for a probe that never started (e.g. the sweep deadline passed).
    pub fn skipped(probe_id: &str, reason: &str) -> Self {
        Self {
            probe_id: probe_id.to_string(),
            outcome: ProbeOutcome::Inconclusive,
            evidence: Some(reason.to_string()),
        }
    }
}

/// Per-invocation execution context handed to every probe.
#[derive(Clone, Copy)]
pub struct ProbeContext<'a> {
    pub platform: &'a dyn Platform,
}

impl<'a> ProbeContext<'a> {
    pub fn new(platform: &'a dyn Platform) -> Self {
        Self { platform }
    }
}

/// Execute one probe.
pub fn run(descriptor: &ProbeDescriptor, ctx: &ProbeContext<'_>) -> ProbeResult {
    let started = Instant::now();
    let observation = panic::catch_unwind(AssertUnwindSafe(|| observe(&descriptor.kind, ctx)))
        .unwrap_or_else(|_| Observation::inconclusive("probe panicked".to_string()));

    debug!(
        probe = %descriptor.id,
        kind = descriptor.kind.name(),
        outcome = ?observation.outcome,
        elapsed_us = started.elapsed().as_micros() as u64,
        "probe finished"
    );

    ProbeResult {
        probe_id: descriptor.id.clone(),
        outcome: observation.outcome,
        evidence: observation.evidence,
    }
}

fn observe(kind: &ProbeKind, ctx: &ProbeContext<'_>) -> Observation {
    let platform = ctx.platform;
    match kind {
        ProbeKind::PathExistence { paths } => filesystem::path_existence(paths),
        ProbeKind::SandboxedWriteTest { directories } => filesystem::sandboxed_write(directories),
        ProbeKind::PackageExistence { packages } => host::package_existence(platform, packages),
        ProbeKind::UrlSchemeProbe { urls } => host::url_scheme(platform, urls),
        ProbeKind::ProcessScan { patterns } => process::loaded_modules(platform, patterns),
        ProbeKind::RunningProcess { patterns } => process::running_processes(platform, patterns),
        ProbeKind::NetworkProbe { ports, timeout } => network::loopback_ports(ports, *timeout),
        ProbeKind::EnvVarCheck { variables } => environment::env_vars(variables),
        ProbeKind::SystemProperty {
            property,
            values,
            mode,
        } => environment::system_property(platform, property, values, *mode),
        ProbeKind::SyscallFlag { flag } => debugger::syscall_flag(platform, *flag),
        ProbeKind::SignatureCheck { expected_digest } => {
            signature::signature_check(platform, expected_digest.as_deref())
        }
    }
}

/// What a probe kind observed, before it is tagged with the probe id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Observation {
    pub outcome: ProbeOutcome,
    pub evidence: Option<String>,
}

impl Observation {
    pub fn positive(evidence: String) -> Self {
        Self {
            outcome: ProbeOutcome::Positive,
            evidence: Some(evidence),
        }
    }

    pub fn negative() -> Self {
        Self {
            outcome: ProbeOutcome::Negative,
            evidence: None,
        }
    }

    pub fn inconclusive(reason: String) -> Self {
        Self {
            outcome: ProbeOutcome::Inconclusive,
            evidence: Some(reason),
        }
    }

    /// Downgrade a probe error; it never leaves the probe.
    pub fn from_error(err: ProbeError) -> Self {
        if err.is_unsupported() {
            debug!(error = %err, "unsupported platform signal");
        }
        Self::inconclusive(err.to_string())
    }
}

/// Positive if `check` holds for any item. Inconclusive only when no item
/// could be checked at all.
pub(crate) fn any_of<T>(
    items: &[T],
    label: &str,
    describe: impl Fn(&T) -> String,
    mut check: impl FnMut(&T) -> Result<bool, ProbeError>,
) -> Observation {
    let mut hits = Vec::new();
    let mut answered = false;
    let mut first_error = None;

    for item in items {
        match check(item) {
            Ok(found) => {
                answered = true;
                if found {
                    hits.push(describe(item));
                }
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    if !hits.is_empty() {
        Observation::positive(format!("{}: {}", label, hits.join(", ")))
    } else if answered {
        Observation::negative()
    } else {
        first_error.map_or_else(Observation::negative, Observation::from_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SyscallFlag;
    use crate::platform::MockPlatform;
    use std::io;

    fn descriptor(kind: ProbeKind) -> ProbeDescriptor {
        ProbeDescriptor {
            id: "probe-under-test".to_string(),
            category: "test".to_string(),
            kind,
        }
    }

    #[test]
    fn test_any_of_mixed_errors_and_answers() {
        let items = [1, 2, 3];
        let observation = any_of(&items, "hit", |i| i.to_string(), |i| match i {
            1 => Err(ProbeError::Io(io::Error::from(io::ErrorKind::PermissionDenied))),
            _ => Ok(false),
        });
        assert_eq!(observation, Observation::negative());

        let observation = any_of(&items, "hit", |i| i.to_string(), |_| {
            Err(ProbeError::Unsupported("thing"))
        });
        assert_eq!(observation.outcome, ProbeOutcome::Inconclusive);

        let observation = any_of(&items, "hit", |i| i.to_string(), |i| Ok(*i != 2));
        assert_eq!(observation, Observation::positive("hit: 1, 3".to_string()));
    }

    #[test]
    fn test_run_tags_result_with_probe_id() {
        let mut platform = MockPlatform::new();
        platform
            .expect_syscall_flag()
            .returning(|_| Ok(true));

        let result = run(
            &descriptor(ProbeKind::SyscallFlag { flag: SyscallFlag::TraceAttached }),
            &ProbeContext::new(&platform),
        );
        assert_eq!(result.probe_id, "probe-under-test");
        assert_eq!(result.outcome, ProbeOutcome::Positive);
    }

    struct PanickingPlatform;

    impl Platform for PanickingPlatform {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn loaded_modules(&self) -> Result<Vec<String>, ProbeError> {
            panic!("adapter bug")
        }
    }

    #[test]
    fn test_panicking_probe_is_contained() {
        let platform = PanickingPlatform;

        let result = run(
            &descriptor(ProbeKind::ProcessScan { patterns: vec!["frida".to_string()] }),
            &ProbeContext::new(&platform),
        );
        assert_eq!(result.outcome, ProbeOutcome::Inconclusive);
        assert_eq!(result.evidence.as_deref(), Some("probe panicked"));
    }

    #[test]
    fn test_unsupported_signal_is_inconclusive() {
        let mut platform = MockPlatform::new();
        platform
            .expect_can_open_url()
            .returning(|_| Err(ProbeError::Unsupported("URL scheme resolution")));

        let result = run(
            &descriptor(ProbeKind::UrlSchemeProbe { urls: vec!["cydia://package/x".to_string()] }),
            &ProbeContext::new(&platform),
        );
        assert_eq!(result.outcome, ProbeOutcome::Inconclusive);
    }
}
