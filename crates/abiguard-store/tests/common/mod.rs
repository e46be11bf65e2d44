use abiguard_core::header::{extract_header, HeaderRequest, ParserSettings};
use abiguard_core::model::AbiSnapshot;
use abiguard_core::snapshot::{assemble_snapshot, check_binary, BinaryPlan};
use abiguard_core::TargetConfig;
use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::path::Path;

pub const HEADER: &str = "\
#define LUMENRTC_API
#define LUMENRTC_CALL
#define LUMENRTC_ABI_VERSION_MAJOR 1
#define LUMENRTC_ABI_VERSION_MINOR 0
#define LUMENRTC_ABI_VERSION_PATCH 0

typedef struct lrtc_factory_t lrtc_factory_t;

LUMENRTC_API lrtc_factory_t* LUMENRTC_CALL lrtc_factory_create(void);
LUMENRTC_API void LUMENRTC_CALL lrtc_factory_release(lrtc_factory_t* factory);
";

pub const CONFIG_TOML: &str = r#"
[policy]
fail_on_expired = true
waivers_file = "abi/waivers.yaml"

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
"#;

pub const WAIVERS_YAML: &str = "\
- id: W-100
  owner: interop-team
  reason: planned removal
  expires_utc: \"2026-12-31T00:00:00Z\"
  applies_to:
    pattern: lrtc_bar
    severity: breaking
";

#[allow(dead_code)]
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

/// Lay out a project: config, waivers file and header
#[allow(dead_code)]
pub fn write_project(root: &Path) {
    fs::create_dir_all(root.join("abi")).unwrap();
    fs::create_dir_all(root.join("include")).unwrap();
    fs::write(root.join("abiguard.toml"), CONFIG_TOML).unwrap();
    fs::write(root.join("abi/waivers.yaml"), WAIVERS_YAML).unwrap();
    fs::write(root.join("include/lumenrtc.h"), HEADER).unwrap();
}

/// Snapshot the target's header at `at`
#[allow(dead_code)]
pub fn snapshot_at(base: &Path, target: &TargetConfig, at: DateTime<Utc>) -> AbiSnapshot {
    let request = HeaderRequest::from_config("lumenrtc", &target.header, base).unwrap();
    let settings = ParserSettings::from_config(&target.header, base);
    let extraction = extract_header(&request, &settings, false).unwrap();
    let binary = check_binary(
        &BinaryPlan::NotConfigured,
        "lumenrtc",
        &extraction.header.functions,
        &target.header.symbol_prefix,
    )
    .unwrap();
    assemble_snapshot("lumenrtc", &target.header.path, extraction, binary, at).unwrap()
}
