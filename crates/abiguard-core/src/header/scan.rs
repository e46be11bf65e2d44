//! Header text scanning.
//!
//! Turns header text into a flat list of top-level statements (declarations
//! terminated by `;`, and preprocessor directives) with their source
//! location. Comments are blanked first while keeping line structure, so
//! every statement knows the line it starts on.
//!
//! ## Guarantees
//!
//! - Unbalanced `()`, `[]`, `{}` and unterminated comments or declarations
//!   are hard errors carrying file and line.
//! - `extern "C" { ... }` blocks are transparent.
//! - Inline function definitions (`... ) { ... }`) are dropped.
//! - Linemarkers (`# 12 "file.h"`) emitted by a preprocessor re-map the
//!   reported file and line.

use crate::errors::ScanError;

/// What a statement is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// A `#...` line (continuations joined)
    Directive,
    /// Declaration text up to, not including, the terminating `;`
    Declaration,
}

/// A top-level statement with the location it starts at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    pub text: String,
    pub path: String,
    pub line: u32,
}

/// Replace comments with whitespace, preserving newlines.
///
/// # Errors
///
/// Returns `ScanError::UnterminatedComment` when a block comment never closes.
pub fn strip_comments(text: &str, path: &str) -> Result<String, ScanError> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut line: u32 = 1;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c == '/' && next == Some('/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            out.push(' ');
            continue;
        }

        if c == '/' && next == Some('*') {
            let start_line = line;
            i += 2;
            let mut closed = false;
            while i < chars.len() {
                if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                    i += 2;
                    closed = true;
                    break;
                }
                if chars[i] == '\n' {
                    out.push('\n');
                    line += 1;
                }
                i += 1;
            }
            if !closed {
                return Err(ScanError::UnterminatedComment {
                    path: path.to_string(),
                    line: start_line,
                });
            }
            out.push(' ');
            continue;
        }

        if c == '"' || c == '\'' {
            out.push(c);
            i += 1;
            while i < chars.len() {
                let ch = chars[i];
                out.push(ch);
                i += 1;
                if ch == '\\' {
                    if let Some(&escaped) = chars.get(i) {
                        out.push(escaped);
                        i += 1;
                    }
                    continue;
                }
                if ch == c || ch == '\n' {
                    if ch == '\n' {
                        line += 1;
                    }
                    break;
                }
            }
            continue;
        }

        if c == '\n' {
            line += 1;
        }
        out.push(c);
        i += 1;
    }

    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Paren,
    Bracket,
    Brace,
    Extern,
}

impl Frame {
    fn closer(self) -> char {
        match self {
            Frame::Paren => ')',
            Frame::Bracket => ']',
            Frame::Brace | Frame::Extern => '}',
        }
    }

    fn opener(self) -> char {
        match self {
            Frame::Paren => '(',
            Frame::Bracket => '[',
            Frame::Brace | Frame::Extern => '{',
        }
    }
}

struct Splitter {
    path: String,
    line: u32,
    stack: Vec<(Frame, u32)>,
    buf: String,
    buf_start: Option<(String, u32)>,
    out: Vec<Statement>,
}

impl Splitter {
    fn depth(&self) -> usize {
        self.stack.iter().filter(|(f, _)| *f != Frame::Extern).count()
    }

    fn push_char(&mut self, c: char) {
        if self.buf_start.is_none() && !c.is_whitespace() {
            self.buf_start = Some((self.path.clone(), self.line));
        }
        self.buf.push(c);
    }

    fn take_declaration(&mut self) {
        let text = self.buf.trim().to_string();
        if let Some((path, line)) = self.buf_start.take() {
            if !text.is_empty() {
                self.out.push(Statement {
                    kind: StatementKind::Declaration,
                    text,
                    path,
                    line,
                });
            }
        }
        self.buf.clear();
    }

    fn discard(&mut self) {
        self.buf.clear();
        self.buf_start = None;
    }
}

/// Parse a linemarker (`# 12 "file"` or `#line 12 "file"`).
fn parse_linemarker(directive: &str) -> Option<(u32, Option<String>)> {
    let body = directive.trim_start_matches('#').trim_start();
    let body = body.strip_prefix("line").map(str::trim_start).unwrap_or(body);
    let mut parts = body.splitn(2, char::is_whitespace);
    let number: u32 = parts.next()?.parse().ok()?;
    let file = parts.next().and_then(|rest| {
        let rest = rest.trim_start();
        let rest = rest.strip_prefix('"')?;
        let end = rest.find('"')?;
        Some(rest[..end].to_string())
    });
    Some((number, file))
}

fn looks_like_function_definition(text: &str) -> bool {
    let head = match text.find('{') {
        Some(idx) => text[..idx].trim_end(),
        None => return false,
    };
    let first = head.split_whitespace().next().unwrap_or("");
    head.ends_with(')') && !matches!(first, "typedef" | "struct" | "enum" | "union")
}

/// Split comment-free header text into statements.
///
/// `honor_linemarkers` is set when scanning preprocessor output.
///
/// # Errors
///
/// Returns a [`ScanError`] for unbalanced delimiters or text left without a
/// terminating `;` at end of input.
pub fn split_statements(
    text: &str,
    path: &str,
    honor_linemarkers: bool,
) -> Result<Vec<Statement>, ScanError> {
    let chars: Vec<char> = text.chars().collect();
    let mut s = Splitter {
        path: path.to_string(),
        line: 1,
        stack: Vec::new(),
        buf: String::new(),
        buf_start: None,
        out: Vec::new(),
    };
    let mut at_line_start = true;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '#' && at_line_start {
            let start_line = s.line;
            let mut directive = String::new();
            while i < chars.len() && chars[i] != '\n' {
                if chars[i] == '\\' && chars.get(i + 1) == Some(&'\n') {
                    directive.push(' ');
                    s.line += 1;
                    i += 2;
                    continue;
                }
                directive.push(chars[i]);
                i += 1;
            }
            let directive = directive.trim().to_string();
            let marker = if honor_linemarkers {
                parse_linemarker(&directive)
            } else {
                None
            };
            match marker {
                Some((number, file)) => {
                    if let Some(file) = file {
                        s.path = file;
                    }
                    // The marker names the number of the line that follows it.
                    if i < chars.len() {
                        i += 1;
                    }
                    s.line = number;
                    at_line_start = true;
                    continue;
                }
                None => s.out.push(Statement {
                    kind: StatementKind::Directive,
                    text: directive,
                    path: s.path.clone(),
                    line: start_line,
                }),
            }
            continue;
        }

        if c == '\n' {
            s.line += 1;
            at_line_start = true;
            s.push_char(' ');
            i += 1;
            continue;
        }
        if !c.is_whitespace() {
            at_line_start = false;
        }

        match c {
            '"' | '\'' => {
                s.push_char(c);
                i += 1;
                while i < chars.len() {
                    let ch = chars[i];
                    s.push_char(ch);
                    i += 1;
                    if ch == '\\' {
                        if let Some(&escaped) = chars.get(i) {
                            s.push_char(escaped);
                            i += 1;
                        }
                        continue;
                    }
                    if ch == c {
                        break;
                    }
                }
                continue;
            }
            '(' => {
                s.stack.push((Frame::Paren, s.line));
                s.push_char(c);
            }
            '[' => {
                s.stack.push((Frame::Bracket, s.line));
                s.push_char(c);
            }
            '{' => {
                if s.depth() == 0 && s.buf.trim() == "extern \"C\"" {
                    s.discard();
                    s.stack.push((Frame::Extern, s.line));
                } else {
                    s.stack.push((Frame::Brace, s.line));
                    s.push_char(c);
                }
            }
            ')' | ']' | '}' => {
                let (frame, _) = match s.stack.pop() {
                    Some(top) => top,
                    None => {
                        return Err(ScanError::UnexpectedCloser {
                            path: s.path.clone(),
                            line: s.line,
                            found: c,
                        })
                    }
                };
                if frame.closer() != c {
                    return Err(ScanError::UnbalancedDelimiter {
                        path: s.path.clone(),
                        line: s.line,
                        found: c,
                        expected: frame.closer(),
                    });
                }
                if frame == Frame::Extern {
                    if let Some((path, line)) = s.buf_start.clone() {
                        if !s.buf.trim().is_empty() {
                            return Err(ScanError::UnterminatedDeclaration { path, line });
                        }
                    }
                    s.discard();
                } else {
                    s.push_char(c);
                    if c == '}' && s.depth() == 0 && looks_like_function_definition(&s.buf) {
                        s.discard();
                    }
                }
            }
            ';' if s.depth() == 0 => s.take_declaration(),
            _ => s.push_char(c),
        }
        i += 1;
    }

    if let Some((frame, line)) = s.stack.last() {
        return Err(ScanError::UnclosedDelimiter {
            path: s.path.clone(),
            line: *line,
            open: frame.opener(),
        });
    }
    if !s.buf.trim().is_empty() {
        if let Some((path, line)) = s.buf_start.take() {
            return Err(ScanError::UnterminatedDeclaration { path, line });
        }
    }

    Ok(s.out)
}

/// Strip comments and split in one step.
///
/// # Errors
///
/// Propagates any [`ScanError`] from either phase.
pub fn scan(text: &str, path: &str, honor_linemarkers: bool) -> Result<Vec<Statement>, ScanError> {
    let stripped = strip_comments(text, path)?;
    split_statements(&stripped, path, honor_linemarkers)
}
