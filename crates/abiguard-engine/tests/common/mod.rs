use abiguard_engine::{RunContext, RunFlags};
use abiguard_store::config::{load_config, LoadedConfig};
use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::path::Path;

pub const CONFIG_TOML: &str = r#"
[policy]
max_allowed_classification = "breaking"

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

[[targets.lumenrtc.codegen.generators]]
name = "csharp_native_methods"
output = "bindings/generated/NativeMethods.g.cs"

[[targets.lumenrtc.codegen.generators]]
name = "csharp_handles"
output = "bindings/generated/Handles.g.cs"

[targets.lumenrtc.bindings.csharp]
namespace = "LumenRTC.Interop"
library_name = "lumenrtc"
managed_sources = ["bindings"]
handles = [{ namespace = "LumenRTC", type_name = "FactoryHandle", access = "internal", release_function_name = "lrtc_factory_release", c_handle_type = "lrtc_factory_t*" }]
"#;

/// Header at `major.minor.0` with the given extra function declarations
#[allow(dead_code)]
pub fn header(major: u64, minor: u64, extra: &[&str]) -> String {
    let mut text = format!(
        "#define LUMENRTC_API\n#define LUMENRTC_CALL\n\
         #define LUMENRTC_ABI_VERSION_MAJOR {}\n\
         #define LUMENRTC_ABI_VERSION_MINOR {}\n\
         #define LUMENRTC_ABI_VERSION_PATCH 0\n\n\
         typedef struct lrtc_factory_t lrtc_factory_t;\n\n\
         LUMENRTC_API lrtc_factory_t* LUMENRTC_CALL lrtc_factory_create(void);\n\
         LUMENRTC_API void LUMENRTC_CALL lrtc_factory_release(lrtc_factory_t* factory);\n",
        major, minor
    );
    for decl in extra {
        text.push_str(&format!("LUMENRTC_API {};\n", decl));
    }
    text
}

pub const BAR: &str = "void LUMENRTC_CALL lrtc_bar(lrtc_factory_t* factory)";

#[allow(dead_code)]
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn ctx() -> RunContext {
    RunContext::new(now(), RunFlags::default())
}

#[allow(dead_code)]
pub fn ctx_with(flags: RunFlags) -> RunContext {
    RunContext::new(now(), flags)
}

/// Write the config and a 1.0 header exporting `lrtc_bar`
#[allow(dead_code)]
pub fn write_project(root: &Path) -> LoadedConfig {
    write_project_with(root, CONFIG_TOML)
}

#[allow(dead_code)]
pub fn write_project_with(root: &Path, config: &str) -> LoadedConfig {
    fs::create_dir_all(root.join("include")).unwrap();
    fs::create_dir_all(root.join("bindings")).unwrap();
    fs::write(root.join("abiguard.toml"), config).unwrap();
    write_header(root, &header(1, 0, &[BAR]));
    load_config(&root.join("abiguard.toml")).unwrap()
}

#[allow(dead_code)]
pub fn write_header(root: &Path, text: &str) {
    fs::write(root.join("include/lumenrtc.h"), text).unwrap();
}
