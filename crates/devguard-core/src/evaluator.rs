// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Category evaluation: run a category's probes and fold their outcomes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;

use crate::catalog::ProbeDescriptor;
use crate::probe::{self, ProbeContext, ProbeOutcome, ProbeResult};
use crate::report::CategoryVerdict;

const DEADLINE_ELAPSED: &str = "deadline elapsed";

/// Effective execution options for one sweep.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SweepPlan {
    pub parallel: bool,
    pub fast_exit: bool,
    /// Probes that have not started by this instant are skipped.
    pub deadline_at: Option<Instant>,
}

impl SweepPlan {
    fn expired(&self) -> bool {
        self.deadline_at.is_some_and(|at| Instant::now() >= at)
    }
}

pub(crate) fn evaluate_category(
    category: &str,
    probes: &[ProbeDescriptor],
    ctx: &ProbeContext<'_>,
    plan: &SweepPlan,
) -> CategoryVerdict {
    let results = if plan.parallel {
        run_parallel(probes, ctx, plan)
    } else {
        run_sequential(probes, ctx, plan)
    };

    if results.len() < probes.len() {
        debug!(
            category,
            run = results.len(),
            configured = probes.len(),
            "fast exit skipped remaining probes"
        );
    }

    CategoryVerdict::from_results(category, &results)
}

fn run_sequential(
    probes: &[ProbeDescriptor],
    ctx: &ProbeContext<'_>,
    plan: &SweepPlan,
) -> Vec<ProbeResult> {
    let mut results = Vec::with_capacity(probes.len());

    for descriptor in probes {
        let result = run_within_deadline(descriptor, ctx, plan);
        let positive = result.outcome == ProbeOutcome::Positive;
        results.push(result);

        if positive && plan.fast_exit {
            break;
        }
    }

    results
}

fn run_parallel(
    probes: &[ProbeDescriptor],
    ctx: &ProbeContext<'_>,
    plan: &SweepPlan,
) -> Vec<ProbeResult> {
    let found = AtomicBool::new(false);

    probes
        .par_iter()
        .filter_map(|descriptor| {
            if plan.fast_exit && found.load(Ordering::Relaxed) {
                return None;
            }
            let result = run_within_deadline(descriptor, ctx, plan);
            if result.outcome == ProbeOutcome::Positive {
                found.store(true, Ordering::Relaxed);
            }
            Some(result)
        })
        .collect()
}

fn run_within_deadline(
    descriptor: &ProbeDescriptor,
    ctx: &ProbeContext<'_>,
    plan: &SweepPlan,
) -> ProbeResult {
    if plan.expired() {
        debug!(probe = %descriptor.id, "deadline elapsed before probe start");
        return ProbeResult::skipped(&descriptor.id, DEADLINE_ELAPSED);
    }
    probe::run(descriptor, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ProbeKind, SyscallFlag};
    use crate::platform::MockPlatform;
    use crate::report::Verdict;
    use std::path::PathBuf;

    fn plan(parallel: bool, fast_exit: bool) -> SweepPlan {
        SweepPlan {
            parallel,
            fast_exit,
            deadline_at: None,
        }
    }

    fn missing_path(id: &str) -> ProbeDescriptor {
        ProbeDescriptor {
            id: id.to_string(),
            category: "debugging".to_string(),
            kind: ProbeKind::PathExistence {
                paths: vec![PathBuf::from("/does/not/exist")],
            },
        }
    }

    fn trace_flag(id: &str) -> ProbeDescriptor {
        ProbeDescriptor {
            id: id.to_string(),
            category: "debugging".to_string(),
            kind: ProbeKind::SyscallFlag {
                flag: SyscallFlag::TraceAttached,
            },
        }
    }

    fn traced_platform() -> MockPlatform {
        let mut platform = MockPlatform::new();
        platform.expect_syscall_flag().returning(|_| Ok(true));
        platform
    }

    #[test]
    fn test_fast_exit_stops_at_first_positive() {
        let platform = traced_platform();
        let ctx = ProbeContext::new(&platform);
        let probes = [missing_path("a"), trace_flag("b"), missing_path("c")];

        let full = evaluate_category("debugging", &probes, &ctx, &plan(false, false));
        let fast = evaluate_category("debugging", &probes, &ctx, &plan(false, true));

        assert_eq!(full.verdict, Verdict::Positive);
        assert_eq!(fast.verdict, Verdict::Positive);
        assert_eq!(fast.triggered, vec!["b"]);
    }

    #[test]
    fn test_parallel_agrees_with_sequential() {
        let platform = traced_platform();
        let ctx = ProbeContext::new(&platform);
        let probes = [missing_path("a"), trace_flag("b"), missing_path("c"), trace_flag("d")];

        let sequential = evaluate_category("debugging", &probes, &ctx, &plan(false, false));
        let parallel = evaluate_category("debugging", &probes, &ctx, &plan(true, false));

        assert_eq!(sequential, parallel);
        assert_eq!(parallel.triggered, vec!["b", "d"]);
    }

    #[test]
    fn test_expired_deadline_skips_probes() {
        let platform = MockPlatform::new();
        let ctx = ProbeContext::new(&platform);
        let expired = SweepPlan {
            parallel: false,
            fast_exit: false,
            deadline_at: Some(Instant::now()),
        };

        let verdict = evaluate_category("debugging", &[trace_flag("a"), trace_flag("b")], &ctx, &expired);

        assert_eq!(verdict.verdict, Verdict::Negative);
        assert_eq!(verdict.inconclusive, vec!["a", "b"]);
    }
}
