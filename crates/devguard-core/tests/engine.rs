// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakePlatform;
use devguard_core::{
    categories, CatalogBuilder, Configuration, ConfigurationError, Engine, EvaluationRequest,
    NativePlatform, ProbeKind, SyscallFlag, Verdict,
};
use rstest::rstest;

const ANDROID_CATALOG: &str = include_str!("../../../catalogs/android.json");
const IOS_CATALOG: &str = include_str!("../../../catalogs/ios.json");

fn engine(document: &str, platform: FakePlatform) -> Engine {
    Engine::from_json_str(document, Arc::new(platform)).unwrap()
}

#[test]
fn test_missing_root_path_is_negative() {
    let engine = engine(
        r#"{ "categories": { "root": [
            { "kind": "path-existence", "paths": ["/does/not/exist"] }
        ] } }"#,
        FakePlatform::default(),
    );

    let report = engine.evaluate(&EvaluationRequest::categories(["root"]));

    assert_eq!(report.categories.len(), 1);
    assert_eq!(report.get("root").unwrap().verdict, Verdict::Negative);
    assert!(!report.is_compromised);
}

#[test]
fn test_attached_debugger_is_positive() {
    let engine = engine(
        r#"{ "categories": { "debugging": [
            { "id": "debugging.tracer", "kind": "syscall-flag", "flag": "trace-attached" }
        ] } }"#,
        FakePlatform::traced(),
    );

    let report = engine.evaluate(&EvaluationRequest::categories(["debugging"]));

    let debugging = report.get("debugging").unwrap();
    assert_eq!(debugging.verdict, Verdict::Positive);
    assert_eq!(debugging.triggered, vec!["debugging.tracer"]);
    assert!(report.is_compromised);
}

#[test]
fn test_undefined_category_is_absent() {
    let engine = engine(
        r#"{ "categories": { "root": [
            { "kind": "path-existence", "paths": ["/does/not/exist"] }
        ] } }"#,
        FakePlatform::default(),
    );

    let report = engine.evaluate(&EvaluationRequest::categories(["root", "hooking"]));

    assert_eq!(report.categories.keys().collect::<Vec<_>>(), vec!["root"]);
    assert!(report.get("hooking").is_none());
}

#[test]
fn test_empty_category_set_evaluates_nothing() {
    let engine = engine(
        r#"{ "categories": {
            "debugging": [ { "kind": "syscall-flag", "flag": "trace-attached" } ],
            "root": [ { "kind": "path-existence", "paths": ["/does/not/exist"] } ]
        } }"#,
        FakePlatform::traced(),
    );

    let report = engine.evaluate(&EvaluationRequest::categories(Vec::<String>::new()));
    assert!(report.categories.is_empty());
    assert!(!report.is_compromised);

    let full = engine.evaluate(&EvaluationRequest::all());
    assert_eq!(full.categories.keys().collect::<Vec<_>>(), vec!["debugging", "root"]);
    assert!(full.is_compromised);
}

#[test]
fn test_compromise_is_or_of_requested_categories_only() {
    let config = CatalogBuilder::new()
        .probe(
            categories::DEBUGGING,
            "debugging.tracer",
            ProbeKind::SyscallFlag {
                flag: SyscallFlag::TraceAttached,
            },
        )
        .probe(
            categories::ROOT,
            "root.su",
            ProbeKind::PathExistence {
                paths: vec!["/does/not/exist/su".into()],
            },
        )
        .build()
        .unwrap();
    let engine = Engine::load_configuration(config, Arc::new(FakePlatform::traced())).unwrap();

    let root_only = engine.evaluate(&EvaluationRequest::categories([categories::ROOT]));
    assert!(!root_only.is_compromised);
    assert!(root_only.get(categories::DEBUGGING).is_none());

    let full = engine.evaluate_all();
    assert!(full.is_compromised);
    assert_eq!(full.categories.len(), 2);
}

#[test]
fn test_unknown_kind_rejected_at_load() {
    let result = Engine::from_json_str(
        r#"{ "categories": { "root": [ { "kind": "kernel-module-scan", "patterns": ["x"] } ] } }"#,
        Arc::new(FakePlatform::default()),
    );
    assert!(matches!(result, Err(ConfigurationError::UnknownKind { .. })));
}

#[test]
fn test_empty_catalog_rejected() {
    let result = Engine::from_json_str(r#"{ "categories": {} }"#, Arc::new(FakePlatform::default()));
    assert!(matches!(result, Err(ConfigurationError::EmptyCatalog)));
}

#[rstest]
#[case::sequential(false, false)]
#[case::parallel(true, false)]
#[case::sequential_fast_exit(false, true)]
#[case::parallel_fast_exit(true, true)]
fn test_execution_modes_agree_on_verdicts(#[case] parallel: bool, #[case] fast_exit: bool) {
    let engine = engine(
        r#"{ "categories": {
            "hooking": [
                { "id": "hooking.paths", "kind": "path-existence", "paths": ["/does/not/exist"] },
                { "id": "hooking.modules", "kind": "process-scan", "patterns": ["frida"] }
            ],
            "dangerous-apps": [
                { "id": "apps.tooling", "kind": "package-existence", "packages": ["com.example.cheat"] }
            ],
            "debugging": [
                { "id": "debugging.tracer", "kind": "syscall-flag", "flag": "trace-attached" }
            ]
        } }"#,
        FakePlatform::untraced()
            .with_modules(&["/system/lib64/libc.so", "/data/local/tmp/frida-agent-64.so"])
            .with_packages(&["com.example.bank"]),
    );

    let report = engine.evaluate(
        &EvaluationRequest::all()
            .parallel(parallel)
            .fast_exit(fast_exit),
    );

    assert_eq!(report.get("hooking").unwrap().verdict, Verdict::Positive);
    assert_eq!(report.get("hooking").unwrap().triggered, vec!["hooking.modules"]);
    assert_eq!(report.get("dangerous-apps").unwrap().verdict, Verdict::Negative);
    assert_eq!(report.get("debugging").unwrap().verdict, Verdict::Negative);
    assert!(report.is_compromised);
}

#[test]
fn test_unsupported_signals_never_compromise() {
    let engine = engine(
        r#"{ "categories": {
            "debugging": [ { "kind": "syscall-flag", "flag": "debuggable-build" } ],
            "dangerous-apps": [ { "kind": "package-existence", "packages": ["com.example.cheat"] } ]
        } }"#,
        FakePlatform::default(),
    );

    let report = engine.evaluate_all();

    assert!(!report.is_compromised);
    assert_eq!(
        report.get("debugging").unwrap().inconclusive,
        vec!["debugging.syscall-flag.0"]
    );
}

#[test]
fn test_request_deadline_marks_probes_inconclusive() {
    let engine = engine(
        r#"{ "categories": { "debugging": [
            { "id": "debugging.tracer", "kind": "syscall-flag", "flag": "trace-attached" }
        ] } }"#,
        FakePlatform::traced(),
    );

    let report = engine.evaluate(&EvaluationRequest::all().deadline(Duration::ZERO));

    let debugging = report.get("debugging").unwrap();
    assert_eq!(debugging.verdict, Verdict::Negative);
    assert_eq!(debugging.inconclusive, vec!["debugging.tracer"]);
}

#[test]
fn test_report_projection_is_lossless() {
    let engine = engine(
        r#"{ "categories": { "debugging": [
            { "id": "debugging.tracer", "kind": "syscall-flag", "flag": "trace-attached" }
        ] } }"#,
        FakePlatform::traced(),
    );
    let report = engine.evaluate_all();

    let json = report.to_json().unwrap();
    let decoded: devguard_core::IntegrityReport = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, report);
}

#[test]
fn test_engine_shared_across_threads() {
    let engine = engine(
        r#"{ "categories": { "debugging": [
            { "kind": "syscall-flag", "flag": "trace-attached" }
        ] } }"#,
        FakePlatform::traced(),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            std::thread::spawn(move || engine.evaluate_all().is_compromised)
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

#[tokio::test]
async fn test_evaluate_async_matches_sync() {
    let engine = engine(
        r#"{ "categories": { "debugging": [
            { "id": "debugging.tracer", "kind": "syscall-flag", "flag": "trace-attached" }
        ] } }"#,
        FakePlatform::traced(),
    );

    let report = engine
        .evaluate_async(EvaluationRequest::categories(["debugging"]))
        .await;

    assert!(report.is_compromised);
    assert_eq!(report.get("debugging").unwrap().triggered, vec!["debugging.tracer"]);
}

#[rstest]
#[case::android(ANDROID_CATALOG, 5)]
#[case::ios(IOS_CATALOG, 3)]
fn test_shipped_catalogs_load(#[case] document: &str, #[case] expected_categories: usize) {
    let config = Configuration::from_json_str(document).unwrap();
    assert_eq!(config.catalog().category_names().count(), expected_categories);
    assert!(config.catalog().contains_category(categories::ROOT));
    assert!(config.catalog().contains_category(categories::HOOKING));
    assert!(Engine::load_configuration(config, Arc::new(NativePlatform::new())).is_ok());
}

#[test]
fn test_toml_catalog_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.toml");
    std::fs::write(
        &path,
        r#"
[sweep]
fast_exit = true

[[categories.debugging]]
id = "debugging.tracer"
kind = "syscall-flag"
flag = "trace-attached"
"#,
    )
    .unwrap();

    let engine = Engine::from_path(&path, Arc::new(FakePlatform::traced())).unwrap();
    assert!(engine.configuration().settings().fast_exit);
    assert!(engine.evaluate_all().is_compromised);
}
