use super::declarations::{interpret, ExtractedHeader, FunctionRule};
use super::scan::scan;
use super::{HeaderParser, HeaderRequest, ParserSettings};
use crate::errors::{ExError, ExErrorKind, Result};
use crate::model::ParserBackend;
use std::path::{Path, PathBuf};
use std::process::Command;

const COMPILER_CANDIDATES: &[&str] = &["clang", "gcc", "cc"];

/// Runs a C preprocessor (`-E -dD`) and scans its output
///
/// Linemarkers in the output keep locations pointing at the original
/// files, and declarations from outside the header's directory are ignored.
#[derive(Debug, Clone)]
pub struct PreprocessedParser {
    compiler: Option<String>,
    include_dirs: Vec<PathBuf>,
    defines: Vec<String>,
    args: Vec<String>,
}

impl PreprocessedParser {
    pub fn new(settings: &ParserSettings) -> Self {
        Self {
            compiler: settings.compiler.clone(),
            include_dirs: settings.include_dirs.clone(),
            defines: settings.defines.clone(),
            args: settings.args.clone(),
        }
    }

    fn unavailable(request: &HeaderRequest, message: String) -> ExError {
        ExError::new(ExErrorKind::BackendUnavailable)
            .with_op("preprocess_header")
            .with_target(request.target_name.clone())
            .with_path(request.display_path.clone())
            .with_message(message)
    }

    fn run_preprocessor(&self, request: &HeaderRequest, header: &Path) -> Result<String> {
        let candidates: Vec<&str> = match &self.compiler {
            Some(compiler) => vec![compiler.as_str()],
            None => COMPILER_CANDIDATES.to_vec(),
        };

        let mut failures = Vec::new();
        for compiler in candidates {
            let mut command = Command::new(compiler);
            command.args(["-E", "-dD", "-x", "c"]);
            for dir in &self.include_dirs {
                command.arg("-I").arg(dir);
            }
            for define in &self.defines {
                command.arg(format!("-D{}", define));
            }
            command.args(&self.args).arg(header);

            match command.output() {
                Ok(output) if output.status.success() => {
                    tracing::debug!(compiler, "preprocessor succeeded");
                    return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
                }
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    let first = stderr.lines().next().unwrap_or("").trim().to_string();
                    failures.push(format!("{} exited with {}: {}", compiler, output.status, first));
                }
                Err(e) => failures.push(format!("{} could not be started: {}", compiler, e)),
            }
        }

        Err(Self::unavailable(
            request,
            format!("no usable preprocessor ({})", failures.join("; ")),
        ))
    }
}

impl HeaderParser for PreprocessedParser {
    fn backend(&self) -> ParserBackend {
        ParserBackend::Preprocessed
    }

    fn parse(&self, request: &HeaderRequest) -> Result<ExtractedHeader> {
        let header = request.path.canonicalize().map_err(|e| {
            ExError::new(ExErrorKind::NotFound)
                .with_op("read_header")
                .with_target(request.target_name.clone())
                .with_path(request.display_path.clone())
                .with_message(format!("cannot resolve header: {}", e))
        })?;
        let scope_dir = header.parent().map(PathBuf::from);

        let output = self.run_preprocessor(request, &header)?;
        let origin = header.display().to_string();
        let statements = scan(&output, &origin, true)
            .map_err(|e| ExError::from(e).with_target(request.target_name.clone()))?;
        interpret(
            &statements,
            request,
            FunctionRule::AnyPrefixed,
            scope_dir.as_deref(),
        )
        .map_err(|e| e.with_target(request.target_name.clone()))
    }
}
