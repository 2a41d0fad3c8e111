// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! `devguard-scan`: run an integrity sweep from a catalog file and print the
//! JSON report.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use devguard_core::{Engine, EvaluationRequest, NativePlatform};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Exit code when `--strict` is set and a category is positive.
const EXIT_COMPROMISED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "devguard-scan", version, about = "Device integrity sweep")]
struct Cli {
    /// Catalog file (.json or .toml)
    catalog: PathBuf,

    /// Category to evaluate; repeat for several. Default: every category.
    #[arg(long = "category", short = 'c')]
    categories: Vec<String>,

    #[arg(long, help = "Run categories and probes in parallel")]
    parallel: bool,

    #[arg(long, help = "Stop a category at its first positive probe")]
    fast_exit: bool,

    #[arg(long, help = "Aggregate sweep budget in milliseconds")]
    deadline_ms: Option<u64>,

    /// Package reported as installed by the host (repeatable).
    #[arg(long = "package")]
    packages: Vec<String>,

    /// URL scheme reported as openable by the host (repeatable).
    #[arg(long = "scheme")]
    schemes: Vec<String>,

    /// System property known to the host, as NAME=VALUE (repeatable).
    #[arg(long = "property", value_parser = parse_property)]
    properties: Vec<(String, String)>,

    /// DER file of the signing certificate.
    #[arg(long)]
    signing_cert: Option<PathBuf>,

    #[arg(long, help = "Report the build as debuggable")]
    debuggable_build: bool,

    #[arg(long, help = "Pretty-print the report")]
    pretty: bool,

    #[arg(long, help = "Exit with status 2 when the device is compromised")]
    strict: bool,
}

fn parse_property(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, property)) if !name.is_empty() => Ok((name.to_string(), property.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", value)),
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let platform = platform_from(&cli)?;

    let engine = Engine::from_path(&cli.catalog, Arc::new(platform))
        .with_context(|| format!("loading catalog {}", cli.catalog.display()))?;

    let mut request = request_from(&cli.categories);
    if cli.parallel {
        request = request.parallel(true);
    }
    if cli.fast_exit {
        request = request.fast_exit(true);
    }
    if let Some(ms) = cli.deadline_ms {
        if ms == 0 {
            bail!("--deadline-ms must be greater than zero");
        }
        request = request.deadline(Duration::from_millis(ms));
    }

    debug!(catalog = %cli.catalog.display(), ?request, "starting sweep");
    let report = engine.evaluate(&request);
    let json = if cli.pretty {
        report.to_json_pretty()?
    } else {
        report.to_json()?
    };
    println!("{}", json);

    if cli.strict && report.is_compromised {
        return Ok(ExitCode::from(EXIT_COMPROMISED));
    }
    Ok(ExitCode::SUCCESS)
}

/// No `--category` flag means a full sweep.
fn request_from(categories: &[String]) -> EvaluationRequest {
    if categories.is_empty() {
        EvaluationRequest::all()
    } else {
        EvaluationRequest::categories(categories.iter().map(String::as_str))
    }
}

fn platform_from(cli: &Cli) -> Result<NativePlatform> {
    let mut platform = NativePlatform::new();

    if !cli.packages.is_empty() {
        platform = platform.with_installed_packages(cli.packages.iter().cloned());
    }
    if !cli.schemes.is_empty() {
        platform = platform.with_openable_schemes(cli.schemes.iter().cloned());
    }
    for (name, value) in &cli.properties {
        platform = platform.with_system_property(name, value);
    }
    if let Some(path) = &cli.signing_cert {
        let der = std::fs::read(path)
            .with_context(|| format!("reading signing certificate {}", path.display()))?;
        platform = platform.with_signing_certificate(der);
    }
    if cli.debuggable_build {
        platform = platform.with_debuggable_build(true);
    }

    Ok(platform)
}
