//! CLI integration tests
//!
//! Drive the `abiguard` binary against a temporary project and check the
//! exit-code contract: 0 pass, 1 breaking or error, 2 unacknowledged
//! additive, 3 drift.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const CONFIG_TOML: &str = r#"
[targets.lumenrtc]
baseline = "abi/baselines/lumenrtc.json"

[targets.lumenrtc.header]
path = "include/lumenrtc.h"
api_macro = "LUMENRTC_API"
call_macro = "LUMENRTC_CALL"
symbol_prefix = "lrtc_"
version_macros = { major = "LUMENRTC_ABI_VERSION_MAJOR", minor = "LUMENRTC_ABI_VERSION_MINOR", patch = "LUMENRTC_ABI_VERSION_PATCH" }

[targets.lumenrtc.header.parser]
backend = "heuristic"

[targets.lumenrtc.codegen]
idl = "abi/generated/lumenrtc.idl.json"
"#;

fn header(minor: u64, extra: &[&str]) -> String {
    let mut text = format!(
        "#define LUMENRTC_API\n#define LUMENRTC_CALL\n\
         #define LUMENRTC_ABI_VERSION_MAJOR 1\n\
         #define LUMENRTC_ABI_VERSION_MINOR {}\n\
         #define LUMENRTC_ABI_VERSION_PATCH 0\n\n\
         typedef struct lrtc_factory_t lrtc_factory_t;\n\n\
         LUMENRTC_API lrtc_factory_t* LUMENRTC_CALL lrtc_factory_create(void);\n",
        minor
    );
    for decl in extra {
        text.push_str(&format!("LUMENRTC_API {};\n", decl));
    }
    text
}

const RELEASE: &str = "void LUMENRTC_CALL lrtc_factory_release(lrtc_factory_t* factory)";
const VERSION: &str = "const char* LUMENRTC_CALL lrtc_version(void)";

fn write_header(root: &Path, text: &str) {
    fs::write(root.join("include/lumenrtc.h"), text).unwrap();
}

fn abiguard(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_abiguard"))
        .current_dir(root)
        .args(["--config", "abiguard.toml", "--log-format", "json"])
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

fn code(output: &Output) -> i32 {
    output.status.code().expect("process exited with a code")
}

/// Project with a committed 1.0 baseline exporting create and release
fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("include")).unwrap();
    fs::write(dir.path().join("abiguard.toml"), CONFIG_TOML).unwrap();
    write_header(dir.path(), &header(0, &[RELEASE]));

    let output = abiguard(
        dir.path(),
        &["snapshot", "--out", "abi/baselines/lumenrtc.json"],
    );
    assert_eq!(
        code(&output),
        0,
        "snapshot failed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    dir
}

#[test]
fn test_snapshot_prints_canonical_json() {
    let dir = setup_project();

    let output = abiguard(dir.path(), &["snapshot"]);

    assert_eq!(code(&output), 0);
    let snapshot: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(snapshot["target_name"], "lumenrtc");
    assert!(snapshot["functions"]["lrtc_factory_release"].is_object());
}

#[test]
fn test_verify_unchanged_exits_zero() {
    let dir = setup_project();

    let output = abiguard(dir.path(), &["verify"]);

    assert_eq!(code(&output), 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[lumenrtc] pass"), "stdout: {}", stdout);
}

#[test]
fn test_verify_removal_exits_one() {
    let dir = setup_project();
    write_header(dir.path(), &header(0, &[]));

    let output = abiguard(dir.path(), &["verify"]);

    assert_eq!(code(&output), 1);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("fail-breaking"), "stdout: {}", stdout);
}

#[test]
fn test_verify_addition_without_bump_exits_two() {
    let dir = setup_project();
    write_header(dir.path(), &header(0, &[RELEASE, VERSION]));

    let output = abiguard(dir.path(), &["verify"]);

    assert_eq!(code(&output), 2);
}

#[test]
fn test_verify_writes_json_report() {
    let dir = setup_project();
    write_header(dir.path(), &header(0, &[]));

    let output = abiguard(
        dir.path(),
        &["verify", "--report-json", "out/report.json"],
    );

    assert_eq!(code(&output), 1);
    let text = fs::read_to_string(dir.path().join("out/report.json")).unwrap();
    let report: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(report["summary"]["verdict"], "fail-breaking");
}

#[test]
fn test_missing_config_exits_one() {
    let dir = TempDir::new().unwrap();

    let output = abiguard(dir.path(), &["verify"]);

    assert_eq!(code(&output), 1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr: {}", stderr);
}

#[test]
fn test_unknown_target_exits_one() {
    let dir = setup_project();

    let output = abiguard(dir.path(), &["verify", "--target", "nope"]);

    assert_eq!(code(&output), 1);
}

#[test]
fn test_generate_check_reports_drift() {
    let dir = setup_project();
    assert_eq!(code(&abiguard(dir.path(), &["generate"])), 0);
    assert_eq!(code(&abiguard(dir.path(), &["generate", "--check"])), 0);

    write_header(dir.path(), &header(1, &[RELEASE, VERSION]));
    let output = abiguard(dir.path(), &["generate", "--check"]);

    assert_eq!(code(&output), 3);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DRIFT"), "stdout: {}", stdout);
    assert!(stdout.contains("+"), "diff expected in stdout: {}", stdout);
}

#[test]
fn test_sync_blocked_leaves_baseline_alone() {
    let dir = setup_project();
    let baseline = dir.path().join("abi/baselines/lumenrtc.json");
    let before = fs::read_to_string(&baseline).unwrap();
    write_header(dir.path(), &header(0, &[]));

    let output = abiguard(dir.path(), &["sync"]);

    assert_eq!(code(&output), 1);
    assert_eq!(fs::read_to_string(&baseline).unwrap(), before);
}
