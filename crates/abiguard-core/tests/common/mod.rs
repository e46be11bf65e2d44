use abiguard_core::config::{HeaderConfig, ParserConfig, VersionMacros};
use abiguard_core::header::{extract_header, HeaderRequest, ParserSettings};
use abiguard_core::model::{AbiSnapshot, ParserBackend};
use abiguard_core::snapshot::{assemble_snapshot, check_binary, BinaryPlan};
use abiguard_core::{verify_snapshots, DiffOptions, EffectivePolicy, VerifyContext, VerifyReport};
use chrono::{DateTime, TimeZone, Utc};
use std::path::Path;
use tempfile::TempDir;

/// Fixed clock shared by every test
#[allow(dead_code)]
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

/// Header configuration for the `lumenrtc` fixture library
#[allow(dead_code)]
pub fn header_config() -> HeaderConfig {
    HeaderConfig {
        path: "include/lumenrtc.h".to_string(),
        api_macro: "LUMENRTC_API".to_string(),
        call_macro: "LUMENRTC_CALL".to_string(),
        symbol_prefix: "lrtc_".to_string(),
        version_macros: VersionMacros {
            major: "LUMENRTC_ABI_VERSION_MAJOR".to_string(),
            minor: "LUMENRTC_ABI_VERSION_MINOR".to_string(),
            patch: "LUMENRTC_ABI_VERSION_PATCH".to_string(),
        },
        parser: ParserConfig {
            backend: ParserBackend::Heuristic,
            ..ParserConfig::default()
        },
        ..HeaderConfig::default()
    }
}

/// Builder for header text
///
/// Starts from the fixture library at 1.0.0 with one opaque type, one enum,
/// one struct and two functions.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct HeaderText {
    pub version: (u64, u64, u64),
    pub extra_decls: Vec<String>,
    pub functions: Vec<String>,
    pub state_members: Vec<String>,
    pub config_fields: Vec<String>,
}

impl Default for HeaderText {
    fn default() -> Self {
        Self {
            version: (1, 0, 0),
            extra_decls: Vec::new(),
            functions: vec![
                "lrtc_factory_t* LUMENRTC_CALL lrtc_factory_create(void)".to_string(),
                "void LUMENRTC_CALL lrtc_bar(lrtc_factory_t* factory)".to_string(),
            ],
            state_members: vec![
                "LRTC_STATE_OK = 0".to_string(),
                "LRTC_STATE_ERROR = 1".to_string(),
            ],
            config_fields: vec!["int width".to_string(), "int height".to_string()],
        }
    }
}

#[allow(dead_code)]
impl HeaderText {
    pub fn version(mut self, major: u64, minor: u64, patch: u64) -> Self {
        self.version = (major, minor, patch);
        self
    }

    pub fn with_function(mut self, decl: &str) -> Self {
        self.functions.push(decl.to_string());
        self
    }

    pub fn without_function(mut self, name: &str) -> Self {
        self.functions.retain(|f| !f.contains(&format!(" {}(", name)));
        self
    }

    pub fn state_members(mut self, members: &[&str]) -> Self {
        self.state_members = members.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn config_fields(mut self, fields: &[&str]) -> Self {
        self.config_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_decl(mut self, decl: &str) -> Self {
        self.extra_decls.push(decl.to_string());
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("#ifndef LUMENRTC_H\n#define LUMENRTC_H\n\n");
        out.push_str("#define LUMENRTC_API\n#define LUMENRTC_CALL\n");
        out.push_str(&format!(
            "#define LUMENRTC_ABI_VERSION_MAJOR {}\n#define LUMENRTC_ABI_VERSION_MINOR {}\n#define LUMENRTC_ABI_VERSION_PATCH {}\n\n",
            self.version.0, self.version.1, self.version.2
        ));
        out.push_str("#ifdef __cplusplus\nextern \"C\" {\n#endif\n\n");
        out.push_str("typedef struct lrtc_factory_t lrtc_factory_t;\n\n");
        out.push_str(&format!(
            "typedef enum {{\n    {}\n}} lrtc_state_t;\n\n",
            self.state_members.join(",\n    ")
        ));
        out.push_str("typedef struct {\n");
        for field in &self.config_fields {
            out.push_str(&format!("    {};\n", field));
        }
        out.push_str("} lrtc_config_t;\n\n");
        for decl in &self.extra_decls {
            out.push_str(decl);
            out.push('\n');
        }
        for function in &self.functions {
            out.push_str(&format!("LUMENRTC_API {};\n", function));
        }
        out.push_str("\n#ifdef __cplusplus\n}\n#endif\n\n#endif /* LUMENRTC_H */\n");
        out
    }
}

/// Write `header` under a fresh directory and snapshot it with the heuristic backend
#[allow(dead_code)]
pub fn snapshot_of(header: &HeaderText) -> AbiSnapshot {
    let dir = TempDir::new().unwrap();
    snapshot_in(dir.path(), header)
}

#[allow(dead_code)]
pub fn snapshot_in(base: &Path, header: &HeaderText) -> AbiSnapshot {
    let config = header_config();
    let header_path = base.join(&config.path);
    std::fs::create_dir_all(header_path.parent().unwrap()).unwrap();
    std::fs::write(&header_path, header.render()).unwrap();

    let request = HeaderRequest::from_config("lumenrtc", &config, base).unwrap();
    let settings = ParserSettings::from_config(&config, base);
    let extraction = extract_header(&request, &settings, false).unwrap();
    let binary = check_binary(
        &BinaryPlan::NotConfigured,
        "lumenrtc",
        &extraction.header.functions,
        &config.symbol_prefix,
    )
    .unwrap();
    assemble_snapshot("lumenrtc", &config.path, extraction, binary, now()).unwrap()
}

/// Verify `current` against `baseline` under `policy`
#[allow(dead_code)]
pub fn verify_with(
    baseline: &AbiSnapshot,
    current: &AbiSnapshot,
    policy: &EffectivePolicy,
) -> VerifyReport {
    let context = VerifyContext {
        diff_options: DiffOptions::default(),
        policy,
        bindings_symbols: None,
        now: now(),
    };
    verify_snapshots(baseline, current, &context).unwrap()
}
