// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Probe catalog and engine configuration.
//!
//! Indicators (paths, packages, ports, ...) are data, not code: a host ships a
//! catalog document next to the app and can refresh it without rebuilding the
//! native library. Everything here is validated once, when the
//! [`Configuration`] is built, and is read-only afterwards.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Well-known category names used by the shipped catalogs.
pub mod categories {
    pub const ROOT: &str = "root";
    pub const HOOKING: &str = "hooking";
    pub const DEBUGGING: &str = "debugging";
    pub const BUILD_INTEGRITY: &str = "build-integrity";
    pub const DANGEROUS_APPS: &str = "dangerous-apps";
}

/// Default per-port connect timeout for network probes.
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_millis(200);

/// Upper bound accepted for any network probe timeout.
pub const MAX_NETWORK_TIMEOUT: Duration = Duration::from_secs(5);

/// OS-level flags readable by a `syscall-flag` probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyscallFlag {
    /// A tracer (debugger, ptrace-based instrumentation) is attached to this process.
    TraceAttached,
    /// The running build was produced with debugging enabled.
    DebuggableBuild,
}

impl SyscallFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyscallFlag::TraceAttached => "trace-attached",
            SyscallFlag::DebuggableBuild => "debuggable-build",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "trace-attached" => Some(SyscallFlag::TraceAttached),
            "debuggable-build" => Some(SyscallFlag::DebuggableBuild),
            _ => None,
        }
    }
}

/// How a `system-property` probe compares the property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    #[default]
    Exact,
    Contains,
}

impl MatchMode {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "exact" => Some(MatchMode::Exact),
            "contains" => Some(MatchMode::Contains),
            _ => None,
        }
    }

    pub fn matches(&self, actual: &str, expected: &str) -> bool {
        match self {
            MatchMode::Exact => actual == expected,
            MatchMode::Contains => actual.contains(expected),
        }
    }
}

/// A probe kind together with the parameters it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeKind {
    PathExistence { paths: Vec<PathBuf> },
    PackageExistence { packages: Vec<String> },
    ProcessScan { patterns: Vec<String> },
    RunningProcess { patterns: Vec<String> },
    NetworkProbe {
        ports: Vec<u16>,
        /// `None` until validation fills in the configured default.
        timeout: Option<Duration>,
    },
    EnvVarCheck { variables: Vec<String> },
    SystemProperty {
        property: String,
        values: Vec<String>,
        mode: MatchMode,
    },
    SyscallFlag { flag: SyscallFlag },
    SignatureCheck {
        /// Lowercase hex SHA-256. `None` falls back to the configuration's
        /// reference digest during validation.
        expected_digest: Option<String>,
    },
    SandboxedWriteTest { directories: Vec<PathBuf> },
    UrlSchemeProbe { urls: Vec<String> },
}

impl ProbeKind {
    /// The kind name as written in catalog documents.
    pub fn name(&self) -> &'static str {
        match self {
            ProbeKind::PathExistence { .. } => "path-existence",
            ProbeKind::PackageExistence { .. } => "package-existence",
            ProbeKind::ProcessScan { .. } => "process-scan",
            ProbeKind::RunningProcess { .. } => "running-process",
            ProbeKind::NetworkProbe { .. } => "network-probe",
            ProbeKind::EnvVarCheck { .. } => "env-var-check",
            ProbeKind::SystemProperty { .. } => "system-property",
            ProbeKind::SyscallFlag { .. } => "syscall-flag",
            ProbeKind::SignatureCheck { .. } => "signature-check",
            ProbeKind::SandboxedWriteTest { .. } => "sandboxed-write-test",
            ProbeKind::UrlSchemeProbe { .. } => "url-scheme-probe",
        }
    }
}

/// One configured probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeDescriptor {
    pub id: String,
    pub category: String,
    pub kind: ProbeKind,
}

impl fmt::Display for ProbeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.kind.name())
    }
}

/// Probes grouped by category, ordered by category name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: BTreeMap<String, Vec<ProbeDescriptor>>,
}

impl Catalog {
    pub fn category(&self, name: &str) -> Option<&[ProbeDescriptor]> {
        self.categories.get(name).map(Vec::as_slice)
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Categories with their probes, ordered by category name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ProbeDescriptor])> {
        self.categories
            .iter()
            .map(|(name, probes)| (name.as_str(), probes.as_slice()))
    }

    pub fn contains_category(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    /// Total number of probes across all categories.
    pub fn probe_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Defaults applied to every sweep unless a request overrides them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSettings {
    /// Run categories and probes on the rayon pool.
    pub parallel: bool,
    /// Stop a category at its first positive probe.
    pub fast_exit: bool,
    /// Aggregate budget for one sweep.
    pub deadline: Option<Duration>,
    /// Default per-port timeout for network probes.
    pub network_timeout: Duration,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            parallel: false,
            fast_exit: false,
            deadline: None,
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }
}

/// Validated, immutable engine configuration.
#[derive(Debug, Clone)]
pub struct Configuration {
    catalog: Catalog,
    settings: SweepSettings,
    signing_digest: Option<String>,
}

impl Configuration {
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    /// The pinned signing-certificate digest, lowercase hex.
    pub fn signing_digest(&self) -> Option<&str> {
        self.signing_digest.as_deref()
    }

    /// Parse and validate a JSON catalog document.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigurationError> {
        let document: CatalogDocument = serde_json::from_str(document)?;
        document.into_configuration()
    }

    /// Parse and validate a TOML catalog document.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigurationError> {
        let document: CatalogDocument = toml::from_str(document)?;
        document.into_configuration()
    }

    /// Load a catalog file; the format follows the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let content = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: display.clone(),
            source,
        })?;

        match extension.as_deref() {
            Some("json") => Self::from_json_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            _ => Err(ConfigurationError::UnsupportedFormat { path: display }),
        }
    }
}

/// Programmatic catalog construction, validated by [`CatalogBuilder::build`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    probes: Vec<ProbeDescriptor>,
    signing_digest: Option<String>,
    settings: SweepSettings,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(mut self, category: &str, id: &str, kind: ProbeKind) -> Self {
        self.probes.push(ProbeDescriptor {
            id: id.to_string(),
            category: category.to_string(),
            kind,
        });
        self
    }

    pub fn signing_digest(mut self, hex_digest: &str) -> Self {
        self.signing_digest = Some(hex_digest.to_string());
        self
    }

    pub fn settings(mut self, settings: SweepSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Result<Configuration, ConfigurationError> {
        assemble(self.probes, self.signing_digest, self.settings)
    }
}

// ============================================================================
// Document model
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogDocument {
    #[serde(default)]
    reference: ReferenceDocument,
    #[serde(default)]
    sweep: SweepDocument,
    #[serde(default)]
    categories: BTreeMap<String, Vec<ProbeDocument>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReferenceDocument {
    signing_certificate_sha256: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SweepDocument {
    #[serde(default)]
    parallel: bool,
    #[serde(default)]
    fast_exit: bool,
    deadline_ms: Option<u64>,
    network_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProbeDocument {
    id: Option<String>,
    kind: String,
    #[serde(default)]
    paths: Vec<String>,
    #[serde(default)]
    packages: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    ports: Vec<u16>,
    timeout_ms: Option<u64>,
    #[serde(default)]
    variables: Vec<String>,
    property: Option<String>,
    #[serde(default)]
    values: Vec<String>,
    #[serde(rename = "match")]
    match_mode: Option<String>,
    flag: Option<String>,
    expected_digest: Option<String>,
    #[serde(default)]
    urls: Vec<String>,
}

impl CatalogDocument {
    fn into_configuration(self) -> Result<Configuration, ConfigurationError> {
        let settings = self.sweep.into_settings()?;

        let mut probes = Vec::new();
        for (category, entries) in self.categories {
            for (index, entry) in entries.into_iter().enumerate() {
                let id = entry
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("{}.{}.{}", category, entry.kind, index));
                let kind = entry.into_kind(&id)?;
                probes.push(ProbeDescriptor {
                    id,
                    category: category.clone(),
                    kind,
                });
            }
        }

        assemble(probes, self.reference.signing_certificate_sha256, settings)
    }
}

impl SweepDocument {
    fn into_settings(self) -> Result<SweepSettings, ConfigurationError> {
        let network_timeout = match self.network_timeout_ms {
            Some(ms) => {
                checked_timeout(ms).map_err(|message| ConfigurationError::InvalidSetting {
                    field: "network_timeout_ms",
                    message,
                })?
            }
            None => DEFAULT_NETWORK_TIMEOUT,
        };

        let deadline = match self.deadline_ms {
            Some(0) => {
                return Err(ConfigurationError::InvalidSetting {
                    field: "deadline_ms",
                    message: "must be greater than zero".to_string(),
                })
            }
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        };

        Ok(SweepSettings {
            parallel: self.parallel,
            fast_exit: self.fast_exit,
            deadline,
            network_timeout,
        })
    }
}

impl ProbeDocument {
    fn into_kind(self, probe: &str) -> Result<ProbeKind, ConfigurationError> {
        let kind_name = self.kind.clone();
        let missing = |parameter: &'static str| ConfigurationError::MissingParameter {
            probe: probe.to_string(),
            kind: kind_name.clone(),
            parameter,
        };

        let kind = match self.kind.as_str() {
            "path-existence" => ProbeKind::PathExistence {
                paths: non_empty(self.paths, || missing("paths"))?
                    .into_iter()
                    .map(PathBuf::from)
                    .collect(),
            },
            "package-existence" => ProbeKind::PackageExistence {
                packages: non_empty(self.packages, || missing("packages"))?,
            },
            "process-scan" => ProbeKind::ProcessScan {
                patterns: non_empty(self.patterns, || missing("patterns"))?,
            },
            "running-process" => ProbeKind::RunningProcess {
                patterns: non_empty(self.patterns, || missing("patterns"))?,
            },
            "network-probe" => {
                let timeout = match self.timeout_ms {
                    Some(ms) => Some(checked_timeout(ms).map_err(|message| {
                        ConfigurationError::InvalidParameter {
                            probe: probe.to_string(),
                            parameter: "timeout_ms",
                            message,
                        }
                    })?),
                    None => None,
                };
                ProbeKind::NetworkProbe {
                    ports: non_empty(self.ports, || missing("ports"))?,
                    timeout,
                }
            }
            "env-var-check" => ProbeKind::EnvVarCheck {
                variables: non_empty(self.variables, || missing("variables"))?,
            },
            "system-property" => {
                let mode = match self.match_mode.as_deref() {
                    None => MatchMode::default(),
                    Some(value) => MatchMode::parse(value).ok_or_else(|| {
                        ConfigurationError::InvalidParameter {
                            probe: probe.to_string(),
                            parameter: "match",
                            message: format!("unknown match mode '{}'", value),
                        }
                    })?,
                };
                ProbeKind::SystemProperty {
                    property: self.property.ok_or_else(|| missing("property"))?,
                    values: non_empty(self.values, || missing("values"))?,
                    mode,
                }
            }
            "syscall-flag" => {
                let value = self.flag.ok_or_else(|| missing("flag"))?;
                let flag = SyscallFlag::parse(&value).ok_or_else(|| {
                    ConfigurationError::InvalidParameter {
                        probe: probe.to_string(),
                        parameter: "flag",
                        message: format!("unknown flag '{}'", value),
                    }
                })?;
                ProbeKind::SyscallFlag { flag }
            }
            "signature-check" => ProbeKind::SignatureCheck {
                expected_digest: self.expected_digest,
            },
            "sandboxed-write-test" => ProbeKind::SandboxedWriteTest {
                directories: non_empty(self.paths, || missing("paths"))?
                    .into_iter()
                    .map(PathBuf::from)
                    .collect(),
            },
            "url-scheme-probe" => ProbeKind::UrlSchemeProbe {
                urls: non_empty(self.urls, || missing("urls"))?,
            },
            other => {
                return Err(ConfigurationError::UnknownKind {
                    probe: probe.to_string(),
                    kind: other.to_string(),
                })
            }
        };

        Ok(kind)
    }
}

fn non_empty<T>(
    values: Vec<T>,
    missing: impl FnOnce() -> ConfigurationError,
) -> Result<Vec<T>, ConfigurationError> {
    if values.is_empty() {
        Err(missing())
    } else {
        Ok(values)
    }
}

fn checked_timeout(ms: u64) -> Result<Duration, String> {
    let timeout = Duration::from_millis(ms);
    if ms == 0 {
        Err("must be greater than zero".to_string())
    } else if timeout > MAX_NETWORK_TIMEOUT {
        Err(format!(
            "must not exceed {} ms",
            MAX_NETWORK_TIMEOUT.as_millis()
        ))
    } else {
        Ok(timeout)
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Validate descriptors, resolve defaults, and group them by category.
fn assemble(
    probes: Vec<ProbeDescriptor>,
    signing_digest: Option<String>,
    settings: SweepSettings,
) -> Result<Configuration, ConfigurationError> {
    if settings.network_timeout.is_zero() || settings.network_timeout > MAX_NETWORK_TIMEOUT {
        return Err(ConfigurationError::InvalidSetting {
            field: "network_timeout",
            message: format!(
                "must be within 1..={} ms",
                MAX_NETWORK_TIMEOUT.as_millis()
            ),
        });
    }

    let signing_digest = signing_digest
        .map(|digest| normalize_digest(&digest))
        .transpose()
        .map_err(|message| ConfigurationError::InvalidSetting {
            field: "reference.signing_certificate_sha256",
            message,
        })?;

    let mut seen = HashSet::new();
    let mut categories: BTreeMap<String, Vec<ProbeDescriptor>> = BTreeMap::new();

    for mut descriptor in probes {
        if descriptor.category.trim().is_empty() {
            return Err(ConfigurationError::EmptyCategory);
        }
        if descriptor.id.trim().is_empty() {
            return Err(ConfigurationError::InvalidParameter {
                probe: descriptor.to_string(),
                parameter: "id",
                message: "must not be empty".to_string(),
            });
        }
        if !seen.insert(descriptor.id.clone()) {
            return Err(ConfigurationError::DuplicateProbeId(descriptor.id));
        }

        validate_kind(&descriptor.id, &mut descriptor.kind, signing_digest.as_deref(), &settings)?;

        categories
            .entry(descriptor.category.clone())
            .or_default()
            .push(descriptor);
    }

    Ok(Configuration {
        catalog: Catalog { categories },
        settings,
        signing_digest,
    })
}

fn validate_kind(
    probe: &str,
    kind: &mut ProbeKind,
    reference_digest: Option<&str>,
    settings: &SweepSettings,
) -> Result<(), ConfigurationError> {
    let kind_name = kind.name();
    let missing = |parameter: &'static str| ConfigurationError::MissingParameter {
        probe: probe.to_string(),
        kind: kind_name.to_string(),
        parameter,
    };
    let invalid = |parameter: &'static str, message: &str| ConfigurationError::InvalidParameter {
        probe: probe.to_string(),
        parameter,
        message: message.to_string(),
    };

    match kind {
        ProbeKind::PathExistence { paths } => {
            if paths.is_empty() {
                return Err(missing("paths"));
            }
            if paths.iter().any(|p| p.as_os_str().is_empty()) {
                return Err(invalid("paths", "entries must not be empty"));
            }
        }
        ProbeKind::SandboxedWriteTest { directories } => {
            if directories.is_empty() {
                return Err(missing("paths"));
            }
            if directories.iter().any(|p| p.as_os_str().is_empty()) {
                return Err(invalid("paths", "entries must not be empty"));
            }
        }
        ProbeKind::PackageExistence { packages: values }
        | ProbeKind::ProcessScan { patterns: values }
        | ProbeKind::RunningProcess { patterns: values }
        | ProbeKind::UrlSchemeProbe { urls: values } => {
            let parameter = match kind_name {
                "package-existence" => "packages",
                "url-scheme-probe" => "urls",
                _ => "patterns",
            };
            if values.is_empty() {
                return Err(missing(parameter));
            }
            if values.iter().any(|v| v.trim().is_empty()) {
                return Err(invalid(parameter, "entries must not be empty"));
            }
        }
        ProbeKind::EnvVarCheck { variables } => {
            if variables.is_empty() {
                return Err(missing("variables"));
            }
            if variables.iter().any(|v| v.is_empty() || v.contains('=')) {
                return Err(invalid("variables", "names must be non-empty and contain no '='"));
            }
        }
        ProbeKind::NetworkProbe { ports, timeout } => {
            if ports.is_empty() {
                return Err(missing("ports"));
            }
            if ports.contains(&0) {
                return Err(invalid("ports", "port 0 cannot be probed"));
            }
            let resolved = match *timeout {
                Some(t) if t.is_zero() || t > MAX_NETWORK_TIMEOUT => {
                    return Err(invalid("timeout_ms", "out of range"));
                }
                Some(t) => t,
                None => settings.network_timeout,
            };
            *timeout = Some(resolved);
        }
        ProbeKind::SystemProperty {
            property,
            values,
            mode,
        } => {
            if property.trim().is_empty() {
                return Err(missing("property"));
            }
            if values.is_empty() {
                return Err(missing("values"));
            }
            // An empty substring matches every value.
            if *mode == MatchMode::Contains && values.iter().any(String::is_empty) {
                return Err(invalid("values", "entries must not be empty in contains mode"));
            }
        }
        ProbeKind::SyscallFlag { .. } => {}
        ProbeKind::SignatureCheck { expected_digest } => {
            let resolved = match expected_digest.as_deref() {
                Some(digest) => {
                    normalize_digest(digest).map_err(|message| invalid("expected_digest", &message))?
                }
                None => reference_digest
                    .map(str::to_string)
                    .ok_or_else(|| missing("expected_digest"))?,
            };
            *expected_digest = Some(resolved);
        }
    }

    Ok(())
}

/// Lowercase a hex SHA-256 digest, accepting `:` separators as printed by keytool.
fn normalize_digest(digest: &str) -> Result<String, String> {
    let cleaned: String = digest
        .trim()
        .chars()
        .filter(|c| *c != ':')
        .collect::<String>()
        .to_ascii_lowercase();

    match hex::decode(&cleaned) {
        Ok(bytes) if bytes.len() == 32 => Ok(cleaned),
        Ok(bytes) => Err(format!("expected 32 bytes, got {}", bytes.len())),
        Err(e) => Err(format!("not a hex digest: {}", e)),
    }
}
