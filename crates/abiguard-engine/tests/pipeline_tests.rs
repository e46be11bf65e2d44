#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use abiguard_core::abiguard_core_types::schema::{EVENT_END, EVENT_START};
use abiguard_core::errors::ExErrorKind;
use abiguard_core::logging_facility::ops;
use abiguard_core::logging_facility::test_capture::init_test_capture;
use abiguard_core::policy::ReasonCode;
use abiguard_core::Verdict;
use abiguard_engine::commands::codegen::run_codegen_all;
use abiguard_engine::commands::generate::run_generate;
use abiguard_engine::commands::snapshot::{run_snapshot, write_snapshot};
use abiguard_engine::commands::sync::run_sync;
use abiguard_engine::commands::verify::{run_verify, ReportOutputs};
use abiguard_engine::{RunContext, RunFlags};
use abiguard_store::artifacts::{ArtifactStatus, WriteMode};
use abiguard_store::config::LoadedConfig;
use chrono::Duration;
use common::{ctx, header, now, write_header, write_project, BAR};
use std::fs;
use tempfile::TempDir;

// ----- Helpers -----

fn accept_baseline(loaded: &LoadedConfig) {
    let snapshots = run_snapshot(loaded, None, &ctx()).unwrap();
    write_snapshot(&loaded.resolve("abi/baselines/lumenrtc.json"), &snapshots[0]).unwrap();
}

fn verdict(loaded: &LoadedConfig, ctx: &RunContext) -> Verdict {
    run_verify(loaded, None, ctx, &ReportOutputs::default())
        .unwrap()
        .verdict()
}

// ----- Logging -----

#[test]
fn test_verify_brackets_each_target_with_run_id() {
    let capture = init_test_capture();
    let dir = TempDir::new().unwrap();
    let loaded = write_project(dir.path());
    accept_baseline(&loaded);
    let ctx = ctx();
    let run_id = ctx.run_id.to_string();

    run_verify(&loaded, None, &ctx, &ReportOutputs::default()).unwrap();

    let ours: Vec<_> = capture
        .events_for_op(ops::VERIFY)
        .into_iter()
        .filter(|e| e.field("run_id") == Some(run_id.as_str()))
        .collect();
    assert_eq!(ours.len(), 2);
    assert_eq!(ours[0].event.as_deref(), Some(EVENT_START));
    assert_eq!(ours[1].event.as_deref(), Some(EVENT_END));
    assert_eq!(ours[1].field("target"), Some("lumenrtc"));
}

// ----- Verify -----

#[test]
fn test_unchanged_header_passes() {
    let dir = TempDir::new().unwrap();
    let loaded = write_project(dir.path());
    accept_baseline(&loaded);

    assert_eq!(verdict(&loaded, &ctx()), Verdict::Pass);
}

#[test]
fn test_missing_baseline_is_not_found() {
    let dir = TempDir::new().unwrap();
    let loaded = write_project(dir.path());

    let err = run_verify(&loaded, None, &ctx(), &ReportOutputs::default()).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::NotFound);
    assert_eq!(err.target(), Some("lumenrtc"));
}

#[test]
fn test_removed_function_fails_breaking() {
    let dir = TempDir::new().unwrap();
    let loaded = write_project(dir.path());
    accept_baseline(&loaded);

    write_header(dir.path(), &header(1, 0, &[]));

    let run = run_verify(&loaded, None, &ctx(), &ReportOutputs::default()).unwrap();
    assert_eq!(run.verdict(), Verdict::FailBreaking);
    assert_eq!(run.verdict().exit_code(), 1);
    assert_eq!(run.reports[0].diff.removed_functions(), vec!["lrtc_bar".to_string()]);
}

#[test]
fn test_added_function_without_bump_is_unacknowledged() {
    let dir = TempDir::new().unwrap();
    let loaded = write_project(dir.path());
    accept_baseline(&loaded);

    write_header(
        dir.path(),
        &header(1, 0, &[BAR, "int LUMENRTC_CALL lrtc_version(void)"]),
    );

    assert_eq!(verdict(&loaded, &ctx()), Verdict::FailUnacknowledgedAdditive);
}

#[test]
fn test_expired_waiver_is_reported_under_strict_flag() {
    let dir = TempDir::new().unwrap();
    let config = format!(
        "{}\n[[targets.lumenrtc.policy.waivers]]\nid = \"W-1\"\nowner = \"interop\"\nreason = \"planned\"\nexpires_utc = \"2026-01-01T00:00:00Z\"\napplies_to = {{ pattern = \"lrtc_bar\" }}\n",
        common::CONFIG_TOML
    );
    let loaded = common::write_project_with(dir.path(), &config);
    accept_baseline(&loaded);
    write_header(dir.path(), &header(1, 0, &[]));

    let strict = common::ctx_with(RunFlags {
        fail_on_expired: true,
        ..RunFlags::default()
    });
    let run = run_verify(&loaded, None, &strict, &ReportOutputs::default()).unwrap();

    assert_eq!(run.verdict(), Verdict::FailBreaking);
    assert!(run.reports[0]
        .policy
        .reasons
        .iter()
        .any(|r| r.code == ReasonCode::WaiverExpired));
}

#[test]
fn test_report_files_are_written() {
    let dir = TempDir::new().unwrap();
    let loaded = write_project(dir.path());
    accept_baseline(&loaded);
    write_header(dir.path(), &header(1, 0, &[]));

    let reports = dir.path().join("reports");
    let outputs = ReportOutputs {
        json: Some(reports.join("verify.json")),
        markdown: Some(reports.join("verify.md")),
        sarif: Some(reports.join("verify.sarif")),
        changelog: Some((reports.join("CHANGELOG.md"), "v2.0.0".to_string())),
    };
    let run = run_verify(&loaded, None, &ctx(), &outputs).unwrap();

    assert_eq!(run.written.len(), 4);
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(reports.join("verify.json")).unwrap()).unwrap();
    assert_eq!(json["summary"]["verdict"], "fail-breaking");
    assert_eq!(json["reports"][0]["target_name"], "lumenrtc");
    assert!(fs::read_to_string(reports.join("CHANGELOG.md"))
        .unwrap()
        .contains("v2.0.0"));
    let sarif: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(reports.join("verify.sarif")).unwrap()).unwrap();
    assert_eq!(sarif["version"], "2.1.0");
}

// ----- Generate and codegen -----

#[test]
fn test_generate_is_byte_identical_across_runs() {
    let dir = TempDir::new().unwrap();
    let loaded = write_project(dir.path());
    let idl_path = loaded.resolve("abi/generated/lumenrtc.idl.json");

    let first = run_generate(&loaded, None, &ctx(), WriteMode::Write).unwrap();
    let bytes = fs::read(&idl_path).unwrap();

    let later = RunContext::new(now() + Duration::days(3), RunFlags::default());
    let second = run_generate(&loaded, None, &later, WriteMode::Write).unwrap();

    assert_eq!(first[0].artifact.status, ArtifactStatus::Written);
    assert_eq!(second[0].artifact.status, ArtifactStatus::Unchanged);
    assert_eq!(fs::read(&idl_path).unwrap(), bytes);
}

#[test]
fn test_codegen_synthesizes_missing_handle_wrapper() {
    let dir = TempDir::new().unwrap();
    let loaded = write_project(dir.path());
    run_generate(&loaded, None, &ctx(), WriteMode::Write).unwrap();

    let outcomes = run_codegen_all(&loaded, None, &ctx(), WriteMode::Write).unwrap();

    assert!(outcomes[0]
        .warnings
        .iter()
        .any(|w| w.contains("LumenRTC.FactoryHandle not found")));
    let handles = fs::read_to_string(loaded.resolve("bindings/generated/Handles.g.cs")).unwrap();
    assert!(handles.contains("sealed partial class FactoryHandle"));
}

#[test]
fn test_codegen_check_reports_drift_after_manual_edit() {
    let dir = TempDir::new().unwrap();
    let loaded = write_project(dir.path());
    run_generate(&loaded, None, &ctx(), WriteMode::Write).unwrap();
    run_codegen_all(&loaded, None, &ctx(), WriteMode::Write).unwrap();

    let clean = run_codegen_all(&loaded, None, &ctx(), WriteMode::Check).unwrap();
    assert!(!clean[0].has_drift());

    let native = loaded.resolve("bindings/generated/NativeMethods.g.cs");
    fs::write(&native, "// edited by hand\n").unwrap();

    let drifted = run_codegen_all(&loaded, None, &ctx(), WriteMode::Check).unwrap();
    assert!(drifted[0].has_drift());
    assert_eq!(fs::read_to_string(&native).unwrap(), "// edited by hand\n");
}

#[test]
fn test_codegen_without_idl_is_not_found() {
    let dir = TempDir::new().unwrap();
    let loaded = write_project(dir.path());

    let err = run_codegen_all(&loaded, None, &ctx(), WriteMode::Write).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

#[test]
fn test_non_partial_wrapper_aborts_codegen() {
    let dir = TempDir::new().unwrap();
    let loaded = write_project(dir.path());
    fs::write(
        dir.path().join("bindings/FactoryHandle.cs"),
        "namespace LumenRTC;\ninternal sealed class FactoryHandle : SafeHandle { }\n",
    )
    .unwrap();
    run_generate(&loaded, None, &ctx(), WriteMode::Write).unwrap();

    let err = run_codegen_all(&loaded, None, &ctx(), WriteMode::Write).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::HandleContractViolation);
    assert!(!loaded.resolve("bindings/generated/Handles.g.cs").exists());
}

// ----- Sync -----

#[test]
fn test_sync_blocked_by_failing_verdict() {
    let dir = TempDir::new().unwrap();
    let loaded = write_project(dir.path());
    accept_baseline(&loaded);
    let baseline_path = loaded.resolve("abi/baselines/lumenrtc.json");
    let before = fs::read(&baseline_path).unwrap();

    write_header(dir.path(), &header(1, 0, &[]));
    let outcomes = run_sync(&loaded, None, &ctx(), false).unwrap();

    assert!(!outcomes[0].applied());
    assert_eq!(outcomes[0].report.verdict, Verdict::FailBreaking);
    assert_eq!(fs::read(&baseline_path).unwrap(), before);
    assert!(!loaded.resolve("abi/generated/lumenrtc.idl.json").exists());
}

#[test]
fn test_sync_accepts_acknowledged_change_then_reports_no_drift() {
    let dir = TempDir::new().unwrap();
    let loaded = write_project(dir.path());
    accept_baseline(&loaded);

    write_header(
        dir.path(),
        &header(1, 1, &[BAR, "int LUMENRTC_CALL lrtc_version(void)"]),
    );

    let applied = run_sync(&loaded, None, &ctx(), false).unwrap();
    assert!(applied[0].applied());
    assert_eq!(applied[0].report.verdict, Verdict::Pass);
    assert_eq!(
        applied[0].baseline.as_ref().unwrap().status,
        ArtifactStatus::Written
    );
    let native = fs::read_to_string(loaded.resolve("bindings/generated/NativeMethods.g.cs")).unwrap();
    assert!(native.contains("lrtc_version"));

    let checked = run_sync(&loaded, None, &ctx(), true).unwrap();
    assert!(!checked[0].has_drift());
}

#[test]
fn test_sync_check_mode_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let loaded = write_project(dir.path());
    accept_baseline(&loaded);
    write_header(
        dir.path(),
        &header(1, 1, &[BAR, "int LUMENRTC_CALL lrtc_version(void)"]),
    );

    let outcomes = run_sync(&loaded, None, &ctx(), true).unwrap();

    assert!(outcomes[0].has_drift());
    assert!(!loaded.resolve("abi/generated/lumenrtc.idl.json").exists());
}
