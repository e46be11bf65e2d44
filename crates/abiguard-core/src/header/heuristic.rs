use super::declarations::{interpret, ExtractedHeader, FunctionRule};
use super::scan::scan;
use super::{HeaderParser, HeaderRequest};
use crate::errors::{ExError, ExErrorKind, Result};
use crate::model::ParserBackend;

/// Scans the raw header text; exported functions must carry the API macro
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicParser;

impl HeuristicParser {
    /// Parse already-loaded header text
    ///
    /// # Errors
    ///
    /// Returns `HeaderParse` (with location) for malformed declarations, or
    /// the interpretation errors of [`interpret`].
    pub fn parse_text(&self, text: &str, request: &HeaderRequest) -> Result<ExtractedHeader> {
        let statements = scan(text, &request.display_path, false)
            .map_err(|e| ExError::from(e).with_target(request.target_name.clone()))?;
        interpret(&statements, request, FunctionRule::ApiMacro, None)
            .map_err(|e| e.with_target(request.target_name.clone()))
    }
}

impl HeaderParser for HeuristicParser {
    fn backend(&self) -> ParserBackend {
        ParserBackend::Heuristic
    }

    fn parse(&self, request: &HeaderRequest) -> Result<ExtractedHeader> {
        let text = std::fs::read_to_string(&request.path).map_err(|e| {
            ExError::new(ExErrorKind::NotFound)
                .with_op("read_header")
                .with_target(request.target_name.clone())
                .with_path(request.display_path.clone())
                .with_message(format!("cannot read header: {}", e))
        })?;
        self.parse_text(&text, request)
    }
}
