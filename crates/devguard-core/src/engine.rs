// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! The detection engine: a validated configuration plus a platform adapter.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::catalog::{Configuration, ProbeDescriptor};
use crate::error::ConfigurationError;
use crate::evaluator::{self, SweepPlan};
use crate::platform::Platform;
use crate::probe::ProbeContext;
use crate::report::{CategoryVerdict, IntegrityReport};

/// Which categories to evaluate, plus per-call overrides of the sweep defaults.
///
/// `None` selects every category in the catalog; an explicit set is taken
/// literally, so an empty set evaluates nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationRequest {
    categories: Option<BTreeSet<String>>,
    parallel: Option<bool>,
    fast_exit: Option<bool>,
    deadline: Option<Duration>,
}

impl EvaluationRequest {
    /// Full sweep with the configured defaults.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: Some(categories.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    pub fn fast_exit(mut self, fast_exit: bool) -> Self {
        self.fast_exit = Some(fast_exit);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Device integrity engine.
///
/// Cheap to clone and `Send + Sync`; concurrent sweeps share the read-only
/// configuration and nothing else.
#[derive(Clone)]
pub struct Engine {
    config: Arc<Configuration>,
    platform: Arc<dyn Platform>,
}

impl Engine {
    /// Build an engine from a validated configuration.
    pub fn load_configuration(
        config: Configuration,
        platform: Arc<dyn Platform>,
    ) -> Result<Self, ConfigurationError> {
        if config.catalog().probe_count() == 0 {
            return Err(ConfigurationError::EmptyCatalog);
        }

        info!(
            platform = platform.name(),
            categories = config.catalog().category_names().count(),
            probes = config.catalog().probe_count(),
            "integrity engine configured"
        );

        Ok(Self {
            config: Arc::new(config),
            platform,
        })
    }

    pub fn from_json_str(
        document: &str,
        platform: Arc<dyn Platform>,
    ) -> Result<Self, ConfigurationError> {
        Self::load_configuration(Configuration::from_json_str(document)?, platform)
    }

    /// Load a `.json` or `.toml` catalog file.
    pub fn from_path(
        path: impl AsRef<Path>,
        platform: Arc<dyn Platform>,
    ) -> Result<Self, ConfigurationError> {
        Self::load_configuration(Configuration::from_path(path)?, platform)
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Run the requested categories and reduce them to a report.
    ///
    /// Requested categories the catalog does not define are left out of the
    /// report. Never fails: probe errors are recorded as outcomes.
    pub fn evaluate(&self, request: &EvaluationRequest) -> IntegrityReport {
        let started = Instant::now();
        let settings = self.config.settings();
        let plan = SweepPlan {
            parallel: request.parallel.unwrap_or(settings.parallel),
            fast_exit: request.fast_exit.unwrap_or(settings.fast_exit),
            deadline_at: request
                .deadline
                .or(settings.deadline)
                .and_then(|budget| started.checked_add(budget)),
        };

        let selected = self.select(request);
        let ctx = ProbeContext::new(self.platform.as_ref());

        let verdicts: Vec<CategoryVerdict> = if plan.parallel {
            selected
                .par_iter()
                .map(|(name, probes)| evaluator::evaluate_category(name, probes, &ctx, &plan))
                .collect()
        } else {
            selected
                .iter()
                .map(|(name, probes)| evaluator::evaluate_category(name, probes, &ctx, &plan))
                .collect()
        };

        let report = IntegrityReport::new(verdicts, started.elapsed());

        if report.is_compromised {
            warn!(
                positive = ?report.positive_categories().collect::<Vec<_>>(),
                elapsed_ms = report.elapsed_ms,
                "integrity sweep found compromise signals"
            );
        } else {
            info!(
                categories = report.categories.len(),
                elapsed_ms = report.elapsed_ms,
                "integrity sweep clean"
            );
        }

        report
    }

    pub fn evaluate_all(&self) -> IntegrityReport {
        self.evaluate(&EvaluationRequest::all())
    }

    /// Run [`Engine::evaluate`] on tokio's blocking pool.
    pub async fn evaluate_async(&self, request: EvaluationRequest) -> IntegrityReport {
        let engine = self.clone();
        let blocking_request = request.clone();
        match tokio::task::spawn_blocking(move || engine.evaluate(&blocking_request)).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "blocking sweep did not complete, evaluating inline");
                self.evaluate(&request)
            }
        }
    }

    fn select(&self, request: &EvaluationRequest) -> Vec<(&str, &[ProbeDescriptor])> {
        let catalog = self.config.catalog();

        let Some(requested) = &request.categories else {
            return catalog.iter().collect();
        };

        for missing in requested
            .iter()
            .filter(|name| !catalog.contains_category(name))
        {
            debug!(category = %missing, "requested category not in catalog");
        }

        catalog
            .iter()
            .filter(|(name, _)| requested.contains(*name))
            .collect()
    }
}
