//! Header Extractor
//!
//! Two backends sit behind [`HeaderParser`]: the preprocessing backend
//! (preferred, needs a C preprocessor) and the heuristic backend that scans
//! raw text. [`extract_header`] picks the requested one, falls back when
//! allowed, and reports which backend actually ran in [`ParserInfo`].

pub mod cexpr;
pub mod decl;
pub mod declarations;
pub mod heuristic;
pub mod preprocess;
pub mod scan;

pub use declarations::{ExtractedHeader, FunctionRule};
pub use heuristic::HeuristicParser;
pub use preprocess::PreprocessedParser;

use crate::config::{compile_patterns, HeaderConfig, VersionMacros};
use crate::errors::{ExError, ExErrorKind, Result};
use crate::logging_facility::ops;
use crate::model::{ParserBackend, ParserInfo};
use crate::{log_op_end, log_op_error, log_op_start};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Name filter for enum and struct capture
#[derive(Debug, Clone)]
pub struct NameFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    ignore: BTreeSet<String>,
}

impl NameFilter {
    /// Build a filter; an empty include list defaults to `^<prefix>`
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming `<key>_include[i]` / `<key>_exclude[i]`.
    pub fn new(
        include: &[String],
        exclude: &[String],
        ignore: &[String],
        prefix: &str,
        key: &str,
    ) -> Result<Self> {
        let include = if include.is_empty() {
            vec![format!("^{}", regex::escape(prefix))]
        } else {
            include.to_vec()
        };
        Ok(Self {
            include: compile_patterns(&include, &format!("{}_include", key))?,
            exclude: compile_patterns(exclude, &format!("{}_exclude", key))?,
            ignore: ignore.iter().cloned().collect(),
        })
    }

    /// Filter accepting every name
    pub fn accept_all() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            ignore: BTreeSet::new(),
        }
    }

    pub fn accepts(&self, name: &str) -> bool {
        if self.ignore.contains(name) || self.exclude.iter().any(|re| re.is_match(name)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|re| re.is_match(name))
    }
}

/// Everything a backend needs to extract one target's header
#[derive(Debug, Clone)]
pub struct HeaderRequest {
    pub target_name: String,
    /// Filesystem path used for reading
    pub path: PathBuf,
    /// Path as configured, used in messages and in the snapshot
    pub display_path: String,
    pub api_macro: String,
    pub call_macro: String,
    pub symbol_prefix: String,
    pub version_macros: VersionMacros,
    pub enum_filter: NameFilter,
    pub struct_filter: NameFilter,
}

impl HeaderRequest {
    /// Build a request from a validated header configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when a name pattern does not compile.
    pub fn from_config(target_name: &str, header: &HeaderConfig, base_dir: &Path) -> Result<Self> {
        let key = format!("targets.{}.header", target_name);
        Ok(Self {
            target_name: target_name.to_string(),
            path: base_dir.join(&header.path),
            display_path: header.path.clone(),
            api_macro: header.api_macro.clone(),
            call_macro: header.call_macro.clone(),
            symbol_prefix: header.symbol_prefix.clone(),
            version_macros: header.version_macros.clone(),
            enum_filter: NameFilter::new(
                &header.enum_include,
                &header.enum_exclude,
                &header.enum_ignore,
                &header.symbol_prefix,
                &format!("{}.enum", key),
            )?,
            struct_filter: NameFilter::new(
                &header.struct_include,
                &header.struct_exclude,
                &header.struct_ignore,
                &header.symbol_prefix,
                &format!("{}.struct", key),
            )?,
        })
    }
}

/// Backend selection and preprocessor invocation settings
#[derive(Debug, Clone)]
pub struct ParserSettings {
    pub backend: ParserBackend,
    pub fallback_to_heuristic: bool,
    pub compiler: Option<String>,
    pub include_dirs: Vec<PathBuf>,
    pub defines: Vec<String>,
    pub args: Vec<String>,
}

impl ParserSettings {
    /// Resolve include directories against `base_dir`
    pub fn from_config(header: &HeaderConfig, base_dir: &Path) -> Self {
        let parser = &header.parser;
        Self {
            backend: parser.backend,
            fallback_to_heuristic: parser.fallback_to_heuristic,
            compiler: parser.compiler.clone(),
            include_dirs: parser
                .include_dirs
                .iter()
                .map(|dir| base_dir.join(dir))
                .collect(),
            defines: parser.defines.clone(),
            args: parser.args.clone(),
        }
    }
}

/// A header parsing backend
pub trait HeaderParser {
    fn backend(&self) -> ParserBackend;

    /// Extract declarations for `request`
    ///
    /// # Errors
    ///
    /// `BackendUnavailable` when the backend cannot run at all; parse and
    /// interpretation errors otherwise.
    fn parse(&self, request: &HeaderRequest) -> Result<ExtractedHeader>;
}

/// Extraction result plus the record of which backend produced it
#[derive(Debug, Clone)]
pub struct Extraction {
    pub header: ExtractedHeader,
    pub parser: ParserInfo,
}

/// Extract a header with the configured backend.
///
/// When the preprocessing backend is unavailable and fallback is allowed
/// (config `fallback_to_heuristic` and not `no_fallback`), the heuristic
/// backend runs instead and `fallback_used` is recorded with the reason.
///
/// # Errors
///
/// Any backend error other than a permitted fallback is returned as is.
pub fn extract_header(
    request: &HeaderRequest,
    settings: &ParserSettings,
    no_fallback: bool,
) -> Result<Extraction> {
    let start = Instant::now();
    log_op_start!(ops::EXTRACT_HEADER, target = %request.target_name, backend = %settings.backend);

    let result = extract_with_fallback(request, settings, no_fallback);

    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(extraction) => {
            log_op_end!(
                ops::EXTRACT_HEADER,
                duration_ms = duration_ms,
                target = %request.target_name,
                backend = %extraction.parser.backend,
                function_count = extraction.header.functions.len()
            );
        }
        Err(err) => {
            log_op_error!(ops::EXTRACT_HEADER, err, duration_ms = duration_ms);
        }
    }
    result
}

fn extract_with_fallback(
    request: &HeaderRequest,
    settings: &ParserSettings,
    no_fallback: bool,
) -> Result<Extraction> {
    let requested = settings.backend;
    let info = |backend, details: Option<String>| ParserInfo {
        backend_requested: requested,
        backend,
        fallback_used: details.is_some(),
        details,
    };

    match requested {
        ParserBackend::Heuristic => Ok(Extraction {
            header: HeuristicParser.parse(request)?,
            parser: info(ParserBackend::Heuristic, None),
        }),
        ParserBackend::Preprocessed => {
            let parser = PreprocessedParser::new(settings);
            match parser.parse(request) {
                Ok(header) => Ok(Extraction {
                    header,
                    parser: info(ParserBackend::Preprocessed, None),
                }),
                Err(err) if err.kind() == ExErrorKind::BackendUnavailable => {
                    if no_fallback || !settings.fallback_to_heuristic {
                        return Err(ExError::new(ExErrorKind::BackendUnavailable)
                            .with_op(ops::EXTRACT_HEADER)
                            .with_target(request.target_name.clone())
                            .with_message("preprocessed backend unavailable and fallback is disabled")
                            .with_source(err));
                    }
                    tracing::warn!(
                        target = %request.target_name,
                        reason = %err.message(),
                        "preprocessed backend unavailable, falling back to heuristic parser"
                    );
                    Ok(Extraction {
                        header: HeuristicParser.parse(request)?,
                        parser: info(
                            ParserBackend::Heuristic,
                            Some(err.message().to_string()),
                        ),
                    })
                }
                Err(err) => Err(err),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_request() -> HeaderRequest {
        HeaderRequest {
            target_name: "lumenrtc".to_string(),
            path: PathBuf::from("lumenrtc.h"),
            display_path: "include/lumenrtc.h".to_string(),
            api_macro: "LUMENRTC_API".to_string(),
            call_macro: "LUMENRTC_CALL".to_string(),
            symbol_prefix: "lrtc_".to_string(),
            version_macros: VersionMacros {
                major: "LUMENRTC_ABI_VERSION_MAJOR".to_string(),
                minor: "LUMENRTC_ABI_VERSION_MINOR".to_string(),
                patch: "LUMENRTC_ABI_VERSION_PATCH".to_string(),
            },
            enum_filter: NameFilter::new(&[], &[], &[], "lrtc_", "enum").unwrap(),
            struct_filter: NameFilter::new(&[], &[], &[], "lrtc_", "struct").unwrap(),
        }
    }

    #[test]
    fn test_name_filter_defaults_to_prefix() {
        let filter = NameFilter::new(&[], &["_internal".to_string()], &[], "lrtc_", "k").unwrap();
        assert!(filter.accepts("lrtc_state_t"));
        assert!(!filter.accepts("other_t"));
        assert!(!filter.accepts("lrtc_internal_t"));
    }

    #[test]
    fn test_name_filter_ignore_list() {
        let filter =
            NameFilter::new(&[], &[], &["lrtc_legacy_t".to_string()], "lrtc_", "k").unwrap();
        assert!(!filter.accepts("lrtc_legacy_t"));
        assert!(NameFilter::accept_all().accepts("anything"));
    }

    #[test]
    fn test_missing_header_is_not_a_fallback_case() {
        let mut request = sample_request();
        request.path = PathBuf::from("/nonexistent/abiguard/never.h");
        let settings = ParserSettings {
            backend: ParserBackend::Preprocessed,
            fallback_to_heuristic: true,
            compiler: Some("abiguard-no-such-compiler".to_string()),
            include_dirs: Vec::new(),
            defines: Vec::new(),
            args: Vec::new(),
        };
        // canonicalize fails first for a missing file, which is not a fallback case
        let err = extract_header(&request, &settings, true).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
    }
}
