// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Devguard: device integrity detection engine.
//!
//! Decides at runtime whether the hosting device is rooted or jailbroken,
//! instrumented by a hooking framework, under a debugger, running a re-signed
//! build, or co-resident with known attack tooling.
//!
//! Indicators come from a [`Configuration`] (JSON, TOML or [`CatalogBuilder`]);
//! OS-specific signals come from a [`Platform`] adapter. The [`Engine`] runs
//! the probes of each requested category and returns an [`IntegrityReport`].
//! It reports; deciding whether to warn or block is left to the host.
//!
//! ```no_run
//! use std::sync::Arc;
//! use devguard_core::{Engine, EvaluationRequest, NativePlatform};
//!
//! let catalog = r#"{ "categories": { "root": [
//!     { "kind": "path-existence", "paths": ["/system/xbin/su"] }
//! ] } }"#;
//! let engine = Engine::from_json_str(catalog, Arc::new(NativePlatform::new()))?;
//! let report = engine.evaluate(&EvaluationRequest::categories(["root"]));
//! println!("{}", report.to_json()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalog;
pub mod engine;
pub mod error;
mod evaluator;
pub mod logging;
pub mod platform;
pub mod probe;
pub mod report;

pub use catalog::{
    categories, CatalogBuilder, Configuration, MatchMode, ProbeDescriptor, ProbeKind,
    SweepSettings, SyscallFlag,
};
pub use engine::{Engine, EvaluationRequest};
pub use error::{ConfigurationError, ProbeError};
pub use platform::{NativePlatform, Platform, ProcessEntry};
pub use probe::{ProbeContext, ProbeOutcome, ProbeResult};
pub use report::{CategoryVerdict, IntegrityReport, Verdict};
