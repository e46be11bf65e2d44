use thiserror::Error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that callers (the CLI, CI
/// wrappers, tests) can match on without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Configuration
    InvalidInput,
    InvalidConfig,
    MissingConfigKey,
    NotFound,

    // Extraction
    /// A declaration could not be scanned or interpreted (carries path/line)
    HeaderParse,
    MissingVersionMacro,
    NoExportedFunctions,
    /// The preprocessing backend could not run and fallback is disallowed
    BackendUnavailable,
    ExportsUnreadable,

    // Snapshot / IDL documents
    InvalidSnapshot,
    UnsupportedSchemaVersion,
    DeterminismViolation,

    // Policy
    InvalidWaiver,

    // Codegen
    HandleContractViolation,
    UnknownGenerator,
    CodegenFailed,
    /// Check-only mode found committed output that differs from a fresh render
    Drift,

    // Integration/IO
    Io,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::MissingConfigKey => "ERR_MISSING_CONFIG_KEY",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::HeaderParse => "ERR_HEADER_PARSE",
            ExErrorKind::MissingVersionMacro => "ERR_MISSING_VERSION_MACRO",
            ExErrorKind::NoExportedFunctions => "ERR_NO_EXPORTED_FUNCTIONS",
            ExErrorKind::BackendUnavailable => "ERR_BACKEND_UNAVAILABLE",
            ExErrorKind::ExportsUnreadable => "ERR_EXPORTS_UNREADABLE",
            ExErrorKind::InvalidSnapshot => "ERR_INVALID_SNAPSHOT",
            ExErrorKind::UnsupportedSchemaVersion => "ERR_UNSUPPORTED_SCHEMA_VERSION",
            ExErrorKind::DeterminismViolation => "ERR_DETERMINISM_VIOLATION",
            ExErrorKind::InvalidWaiver => "ERR_INVALID_WAIVER",
            ExErrorKind::HandleContractViolation => "ERR_HANDLE_CONTRACT_VIOLATION",
            ExErrorKind::UnknownGenerator => "ERR_UNKNOWN_GENERATOR",
            ExErrorKind::CodegenFailed => "ERR_CODEGEN_FAILED",
            ExErrorKind::Drift => "ERR_DRIFT",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Classification fields support programmatic handling; the location fields
/// (`target`, `path`, `line`, `key`) are what a maintainer needs to find the
/// offending declaration or configuration entry.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    target: Option<String>,
    path: Option<String>,
    line: Option<u32>,
    key: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
    diagnostics: Option<Vec<String>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            target: None,
            path: None,
            line: None,
            key: None,
            message: String::new(),
            source: None,
            diagnostics: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add target context
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Add file path context
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add 1-based line context
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Add configuration key context (dotted path)
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attach individual diagnostics (used by handle validation and drift checks)
    pub fn with_diagnostics(mut self, diagnostics: Vec<String>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the target context, if any
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Get the file path context, if any
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Get the line context, if any
    pub fn line(&self) -> Option<u32> {
        self.line
    }

    /// Get the configuration key context, if any
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Get attached diagnostics, if any
    pub fn diagnostics(&self) -> Option<&[String]> {
        self.diagnostics.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if let Some(target) = &self.target {
            write!(f, " for target '{}'", target)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        match (&self.path, self.line) {
            (Some(path), Some(line)) => write!(f, " ({}:{})", path, line)?,
            (Some(path), None) => write!(f, " ({})", path)?,
            (None, Some(line)) => write!(f, " (line {})", line)?,
            (None, None) => {}
        }
        if let Some(key) = &self.key {
            write!(f, " (key: {})", key)?;
        }
        if let Some(source) = &self.source {
            write!(f, "; caused by: {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<serde_json::Error> for ExError {
    fn from(err: serde_json::Error) -> Self {
        ExError::new(ExErrorKind::Serialization).with_message(err.to_string())
    }
}

// ========== End Error Facility ==========

/// Failures raised while scanning header text
///
/// Every variant carries the file and 1-based line of the offending
/// construct; conversion into [`ExError`] keeps both.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("unterminated block comment")]
    UnterminatedComment { path: String, line: u32 },

    #[error("unbalanced '{found}' (expected '{expected}')")]
    UnbalancedDelimiter {
        path: String,
        line: u32,
        found: char,
        expected: char,
    },

    #[error("unexpected '{found}' with no matching opener")]
    UnexpectedCloser { path: String, line: u32, found: char },

    #[error("'{open}' is never closed")]
    UnclosedDelimiter { path: String, line: u32, open: char },

    #[error("declaration is not terminated by ';'")]
    UnterminatedDeclaration { path: String, line: u32 },

    #[error("malformed declaration: {reason}")]
    MalformedDeclaration {
        path: String,
        line: u32,
        reason: String,
    },
}

impl ScanError {
    /// File the error was raised in
    pub fn path(&self) -> &str {
        match self {
            ScanError::UnterminatedComment { path, .. }
            | ScanError::UnbalancedDelimiter { path, .. }
            | ScanError::UnexpectedCloser { path, .. }
            | ScanError::UnclosedDelimiter { path, .. }
            | ScanError::UnterminatedDeclaration { path, .. }
            | ScanError::MalformedDeclaration { path, .. } => path,
        }
    }

    /// 1-based line of the offending construct
    pub fn line(&self) -> u32 {
        match self {
            ScanError::UnterminatedComment { line, .. }
            | ScanError::UnbalancedDelimiter { line, .. }
            | ScanError::UnexpectedCloser { line, .. }
            | ScanError::UnclosedDelimiter { line, .. }
            | ScanError::UnterminatedDeclaration { line, .. }
            | ScanError::MalformedDeclaration { line, .. } => *line,
        }
    }
}

impl From<ScanError> for ExError {
    fn from(err: ScanError) -> Self {
        ExError::new(ExErrorKind::HeaderParse)
            .with_op("scan_header")
            .with_path(err.path().to_string())
            .with_line(err.line())
            .with_message(err.to_string())
    }
}
