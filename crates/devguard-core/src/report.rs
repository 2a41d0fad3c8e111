// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Category verdicts and the integrity report handed to the host.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::probe::{ProbeOutcome, ProbeResult};

/// Binary outcome of a category. Inconclusive probes never produce `Positive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Positive,
    Negative,
}

/// Reduction of every probe in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryVerdict {
    pub category: String,
    pub verdict: Verdict,
    /// Ids of the probes that returned `Positive`; empty iff `Negative`.
    pub triggered: Vec<String>,
    /// Ids of the probes that could not decide.
    pub inconclusive: Vec<String>,
    pub evidence: Vec<String>,
}

impl CategoryVerdict {
    /// OR-of-positives over `results`. The order of `results` only affects
    /// the order of the id and evidence lists.
    pub fn from_results(category: &str, results: &[ProbeResult]) -> Self {
        let mut triggered = Vec::new();
        let mut inconclusive = Vec::new();
        let mut evidence = Vec::new();

        for result in results {
            match result.outcome {
                ProbeOutcome::Positive => {
                    triggered.push(result.probe_id.clone());
                    if let Some(note) = &result.evidence {
                        evidence.push(format!("{}: {}", result.probe_id, note));
                    }
                }
                ProbeOutcome::Inconclusive => inconclusive.push(result.probe_id.clone()),
                ProbeOutcome::Negative => {}
            }
        }

        let verdict = if triggered.is_empty() {
            Verdict::Negative
        } else {
            Verdict::Positive
        };

        Self {
            category: category.to_string(),
            verdict,
            triggered,
            inconclusive,
            evidence,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.verdict == Verdict::Positive
    }
}

/// Result of one sweep: the requested categories, ordered by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub categories: BTreeMap<String, CategoryVerdict>,
    pub is_compromised: bool,
    pub elapsed_ms: u64,
}

impl IntegrityReport {
    pub fn new(verdicts: impl IntoIterator<Item = CategoryVerdict>, elapsed: Duration) -> Self {
        let categories: BTreeMap<String, CategoryVerdict> = verdicts
            .into_iter()
            .map(|verdict| (verdict.category.clone(), verdict))
            .collect();
        let is_compromised = categories.values().any(CategoryVerdict::is_positive);

        Self {
            categories,
            is_compromised,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn get(&self, category: &str) -> Option<&CategoryVerdict> {
        self.categories.get(category)
    }

    /// Names of the positive categories, in report order.
    pub fn positive_categories(&self) -> impl Iterator<Item = &str> {
        self.categories
            .values()
            .filter(|verdict| verdict.is_positive())
            .map(|verdict| verdict.category.as_str())
    }

    /// JSON projection of the full report for a transport adapter.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, outcome: ProbeOutcome) -> ProbeResult {
        ProbeResult {
            probe_id: id.to_string(),
            outcome,
            evidence: match outcome {
                ProbeOutcome::Negative => None,
                _ => Some(format!("note for {}", id)),
            },
        }
    }

    #[test]
    fn test_positive_dominates() {
        let verdict = CategoryVerdict::from_results(
            "root",
            &[
                result("root.su", ProbeOutcome::Negative),
                result("root.props", ProbeOutcome::Inconclusive),
                result("root.magisk", ProbeOutcome::Positive),
            ],
        );

        assert_eq!(verdict.verdict, Verdict::Positive);
        assert_eq!(verdict.triggered, vec!["root.magisk"]);
        assert_eq!(verdict.inconclusive, vec!["root.props"]);
        assert_eq!(verdict.evidence, vec!["root.magisk: note for root.magisk"]);
    }

    #[test]
    fn test_inconclusive_alone_is_negative() {
        let verdict =
            CategoryVerdict::from_results("debugging", &[result("dbg.flag", ProbeOutcome::Inconclusive)]);
        assert_eq!(verdict.verdict, Verdict::Negative);
        assert!(verdict.triggered.is_empty());
    }

    #[test]
    fn test_report_json_shape() {
        let report = IntegrityReport::new(
            [
                CategoryVerdict::from_results("root", &[result("root.su", ProbeOutcome::Negative)]),
                CategoryVerdict::from_results("hooking", &[result("hook.frida", ProbeOutcome::Positive)]),
            ],
            Duration::from_millis(12),
        );

        assert!(report.is_compromised);
        assert_eq!(report.positive_categories().collect::<Vec<_>>(), vec!["hooking"]);

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["is_compromised"], true);
        assert_eq!(value["elapsed_ms"], 12);
        assert_eq!(value["categories"]["hooking"]["verdict"], "positive");
        assert_eq!(value["categories"]["hooking"]["triggered"][0], "hook.frida");
        assert_eq!(value["categories"]["root"]["verdict"], "negative");

        let keys: Vec<&String> = value["categories"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["hooking", "root"]);

        let back: IntegrityReport = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(back, report);
    }
}
