//! Interpretation of scanned statements into ABI declarations.
//!
//! Both parser backends produce a statement list; this module turns it into
//! functions, enums, structs, opaque handles, callbacks, constants and the
//! declared version.

use super::cexpr::eval_int_expr;
use super::decl::{
    is_identifier, matching_close, matching_open, normalize_c_type, normalize_ws, parse_params,
    parse_struct_field, split_top_level, strip_attributes, strip_calling_conventions,
    strip_declarator_macros, trailing_identifier, CALLING_CONVENTION_KEYWORDS,
};
use super::scan::{Statement, StatementKind};
use super::HeaderRequest;
use crate::errors::{ExError, ExErrorKind, Result, ScanError};
use crate::model::{
    AbiVersion, CallbackTypedef, EnumMember, EnumType, StructField, StructType, Symbol,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

const MAX_DEFINE_DEPTH: u8 = 16;

/// How exported functions are recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionRule {
    /// Raw header: declarations introduced by the API macro
    ApiMacro,
    /// Preprocessed output: any prefixed function declaration
    AnyPrefixed,
}

/// Everything a backend extracts from one header
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedHeader {
    pub version: AbiVersion,
    pub functions: BTreeMap<String, Symbol>,
    pub enums: BTreeMap<String, EnumType>,
    pub structs: BTreeMap<String, StructType>,
    pub opaque_types: BTreeSet<String>,
    pub callbacks: BTreeMap<String, CallbackTypedef>,
    pub constants: BTreeMap<String, String>,
}

struct Define {
    value: String,
    in_scope: bool,
}

struct Interpreter<'a> {
    request: &'a HeaderRequest,
    rule: FunctionRule,
    scope_dir: Option<&'a Path>,
    defines: BTreeMap<String, Define>,
    members: HashMap<String, i64>,
    out: ExtractedHeader,
}

fn malformed(stmt: &Statement, reason: impl Into<String>) -> ExError {
    ScanError::MalformedDeclaration {
        path: stmt.path.clone(),
        line: stmt.line,
        reason: reason.into(),
    }
    .into()
}

/// `#define NAME value` (object-like only)
fn parse_define(directive: &str) -> Option<(String, String)> {
    let body = directive.strip_prefix('#')?.trim_start();
    let rest = body.strip_prefix("define")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let name_len = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .count();
    let name = &rest[..name_len];
    if !is_identifier(name) || rest[name_len..].starts_with('(') {
        return None;
    }
    Some((name.to_string(), normalize_ws(&rest[name_len..])))
}

fn resolve_identifier(
    name: &str,
    defines: &BTreeMap<String, Define>,
    members: &HashMap<String, i64>,
    depth: u8,
) -> Option<i64> {
    if let Some(value) = members.get(name) {
        return Some(*value);
    }
    if depth >= MAX_DEFINE_DEPTH {
        return None;
    }
    let define = defines.get(name)?;
    eval_int_expr(&define.value, &|inner| {
        resolve_identifier(inner, defines, members, depth + 1)
    })
}

impl<'a> Interpreter<'a> {
    fn eval(&self, expr: &str) -> Option<i64> {
        eval_int_expr(expr, &|name| {
            resolve_identifier(name, &self.defines, &self.members, 0)
        })
    }

    fn version_component(&self, macro_name: &str) -> Result<u64> {
        let err = |message: String| {
            ExError::new(ExErrorKind::MissingVersionMacro)
                .with_op("extract_header")
                .with_target(self.request.target_name.clone())
                .with_path(self.request.display_path.clone())
                .with_message(message)
        };
        let define = self
            .defines
            .get(macro_name)
            .ok_or_else(|| err(format!("version macro '{}' is not defined", macro_name)))?;
        self.eval(&define.value)
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| {
                err(format!(
                    "version macro '{}' must be a non-negative integer, found '{}'",
                    macro_name, define.value
                ))
            })
    }

    fn in_scope(&self, stmt: &Statement) -> bool {
        match self.scope_dir {
            Some(dir) => Path::new(&stmt.path).starts_with(dir),
            None => true,
        }
    }

    fn run(mut self, statements: &[Statement]) -> Result<ExtractedHeader> {
        for stmt in statements {
            if stmt.kind == StatementKind::Directive {
                if let Some((name, value)) = parse_define(&stmt.text) {
                    let in_scope = self.in_scope(stmt);
                    self.defines.insert(name, Define { value, in_scope });
                }
            }
        }

        for stmt in statements {
            if stmt.kind != StatementKind::Declaration || !self.in_scope(stmt) {
                continue;
            }
            self.declaration(stmt)?;
        }

        let request = self.request;
        let macros = &request.version_macros;
        self.out.version = AbiVersion::new(
            self.version_component(&macros.major)?,
            self.version_component(&macros.minor)?,
            self.version_component(&macros.patch)?,
        );

        let upper_prefix = request.symbol_prefix.to_uppercase();
        let version_names = [&macros.major, &macros.minor, &macros.patch];
        for (name, define) in &self.defines {
            if define.in_scope
                && !define.value.is_empty()
                && name.starts_with(&upper_prefix)
                && !version_names.contains(&name)
            {
                self.out.constants.insert(name.clone(), define.value.clone());
            }
        }

        if self.out.functions.is_empty() {
            return Err(ExError::new(ExErrorKind::NoExportedFunctions)
                .with_op("extract_header")
                .with_target(self.request.target_name.clone())
                .with_path(self.request.display_path.clone())
                .with_message(format!(
                    "no exported '{}' functions found",
                    self.request.symbol_prefix
                )));
        }

        Ok(self.out)
    }

    fn declaration(&mut self, stmt: &Statement) -> Result<()> {
        let text = normalize_ws(&strip_attributes(&stmt.text));
        match text.split_whitespace().next() {
            Some("typedef") => return self.typedef(stmt, text["typedef".len()..].trim()),
            Some("struct" | "enum" | "union" | "static") | None => return Ok(()),
            _ => {}
        }

        match self.rule {
            FunctionRule::ApiMacro => {
                let api = &self.request.api_macro;
                let Some(rest) = after_word(&text, api) else {
                    return Ok(());
                };
                let symbol = parse_function(&rest, &self.request.call_macro, false)
                    .map_err(|reason| malformed(stmt, reason))?;
                self.add_function(stmt, symbol)
            }
            FunctionRule::AnyPrefixed => {
                let text = text.strip_prefix("extern ").unwrap_or(&text);
                match parse_function(text, &self.request.call_macro, true) {
                    Ok(symbol) if symbol.name.starts_with(&self.request.symbol_prefix) => {
                        self.add_function(stmt, symbol)
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    fn add_function(&mut self, stmt: &Statement, symbol: Symbol) -> Result<()> {
        if let Some(existing) = self.out.functions.get(&symbol.name) {
            if existing.same_signature(&symbol) {
                return Ok(());
            }
            return Err(malformed(
                stmt,
                format!("conflicting declarations of '{}'", symbol.name),
            ));
        }
        self.out.functions.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    fn typedef(&mut self, stmt: &Statement, body: &str) -> Result<()> {
        let first = body.split_whitespace().next().unwrap_or("");
        match first {
            "enum" if body.contains('{') => self.typedef_enum(stmt, body),
            "struct" if body.contains('{') => self.typedef_struct(stmt, body),
            "struct" => {
                let words: Vec<&str> = body.split_whitespace().collect();
                if let [_, _, name] = words.as_slice() {
                    if is_identifier(name) && name.starts_with(&self.request.symbol_prefix) {
                        self.out.opaque_types.insert((*name).to_string());
                    }
                }
                Ok(())
            }
            _ if body.contains('(') => self.typedef_callback(stmt, body),
            _ => Ok(()),
        }
    }

    fn typedef_enum(&mut self, stmt: &Statement, body: &str) -> Result<()> {
        let (name, inner) = braced_typedef(body).map_err(|reason| malformed(stmt, reason))?;

        let mut members = Vec::new();
        let mut previous: Option<Option<i64>> = None;
        for item in split_top_level(inner, ',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (member, expr) = match item.split_once('=') {
                Some((member, expr)) => (member.trim(), Some(normalize_ws(expr))),
                None => (item, None),
            };
            if !is_identifier(member) {
                return Err(malformed(
                    stmt,
                    format!("invalid enum member '{}' in '{}'", member, name),
                ));
            }
            let value = match &expr {
                Some(expr) => self.eval(expr),
                None => match previous {
                    None => Some(0),
                    Some(prev) => prev.and_then(|v| v.checked_add(1)),
                },
            };
            if let Some(v) = value {
                self.members.insert(member.to_string(), v);
            }
            previous = Some(value);
            members.push(EnumMember {
                name: member.to_string(),
                value,
                value_expr: expr,
            });
        }

        if self.request.enum_filter.accepts(&name) {
            self.out
                .enums
                .insert(name.clone(), EnumType { name, members });
        }
        Ok(())
    }

    fn typedef_struct(&mut self, stmt: &Statement, body: &str) -> Result<()> {
        let (name, inner) = braced_typedef(body).map_err(|reason| malformed(stmt, reason))?;
        if !self.request.struct_filter.accepts(&name) {
            return Ok(());
        }
        let fields: Vec<StructField> = split_top_level(inner, ';')
            .iter()
            .map(|raw| raw.trim())
            .filter(|raw| !raw.is_empty())
            .enumerate()
            .map(|(index, raw)| parse_struct_field(raw, index))
            .collect();
        self.out
            .structs
            .insert(name.clone(), StructType { name, fields });
        Ok(())
    }

    fn typedef_callback(&mut self, stmt: &Statement, body: &str) -> Result<()> {
        let Some(open) = body.find('(') else {
            return Ok(());
        };
        let Some(close) = matching_close(body, open) else {
            return Err(malformed(stmt, "unbalanced callback declarator"));
        };
        let declarator = &body[open + 1..close];
        let Some(star) = declarator.find('*') else {
            return Ok(());
        };
        let name = declarator[star + 1..].trim();
        if !is_identifier(name) || !name.starts_with(&self.request.symbol_prefix) {
            return Ok(());
        }

        let rest = body[close + 1..].trim();
        let params = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(|| malformed(stmt, format!("callback '{}' has no parameter list", name)))?;

        self.out.callbacks.insert(
            name.to_string(),
            CallbackTypedef {
                name: name.to_string(),
                return_type: normalize_c_type(&body[..open]),
                parameters: parse_params(params),
                declaration: format!(
                    "typedef {}",
                    normalize_ws(&strip_declarator_macros(body))
                ),
            },
        );
        Ok(())
    }
}

/// Text following the first whole-word occurrence of `word`
fn after_word(text: &str, word: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let idx = words.iter().position(|w| *w == word)?;
    Some(words[idx + 1..].join(" "))
}

/// `<kw> [TAG] { inner } NAME` -> (NAME, inner)
fn braced_typedef(body: &str) -> std::result::Result<(String, &str), String> {
    let open = body.find('{').ok_or("missing '{'")?;
    let close = body.rfind('}').ok_or("missing '}'")?;
    if close < open {
        return Err("mismatched braces".to_string());
    }
    let trailer = body[close + 1..].trim();
    let name = trailer.split(',').next().unwrap_or("").trim();
    if !is_identifier(name) {
        return Err(format!(
            "typedef is missing a type name after '}}' (found '{}')",
            trailer
        ));
    }
    Ok((name.to_string(), &body[open + 1..close]))
}

/// Parse `<ret> <CALL> <name>(<params>)`.
///
/// With `lenient` the calling convention may be absent (it was expanded
/// away by the preprocessor) and the configured macro name is recorded.
pub(crate) fn parse_function(
    text: &str,
    call_macro: &str,
    lenient: bool,
) -> std::result::Result<Symbol, String> {
    let text = text.trim();
    if !text.ends_with(')') {
        return Err("expected a parameter list after the function name".to_string());
    }
    let close = text.len() - 1;
    let open = matching_open(text, close).ok_or("unbalanced parameter list")?;
    let params = &text[open + 1..close];
    let before = text[..open].trim_end();

    let (name_start, name) =
        trailing_identifier(before).ok_or("missing function name before '('")?;
    let head = before[..name_start].trim_end();

    let (return_part, convention) = match trailing_identifier(head) {
        Some((start, word)) if word == call_macro => (&head[..start], call_macro.to_string()),
        Some((start, word)) if CALLING_CONVENTION_KEYWORDS.contains(&word) => {
            let convention = if lenient { call_macro } else { word };
            (&head[..start], convention.to_string())
        }
        _ if lenient => (head, call_macro.to_string()),
        _ => {
            return Err(format!(
                "missing calling convention macro '{}' before '{}'",
                call_macro, name
            ))
        }
    };

    let return_type = normalize_c_type(&strip_calling_conventions(return_part));
    if return_type.is_empty() {
        return Err(format!("missing return type for '{}'", name));
    }

    Ok(Symbol {
        name: name.to_string(),
        return_type,
        parameters: parse_params(params),
        calling_convention: convention,
    })
}

/// Interpret scanned statements for `request`.
///
/// With `scope_dir` set, declarations and constants located outside that
/// directory (system headers pulled in by a preprocessor) are ignored.
///
/// # Errors
///
/// Fails on malformed declarations (with location), missing version
/// macros, or when no exported function is found.
pub fn interpret(
    statements: &[Statement],
    request: &HeaderRequest,
    rule: FunctionRule,
    scope_dir: Option<&Path>,
) -> Result<ExtractedHeader> {
    Interpreter {
        request,
        rule,
        scope_dir,
        defines: BTreeMap::new(),
        members: HashMap::new(),
        out: ExtractedHeader::default(),
    }
    .run(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParamModifier;

    #[test]
    fn test_parse_define() {
        assert_eq!(
            parse_define("#define LRTC_MAX 16u"),
            Some(("LRTC_MAX".to_string(), "16u".to_string()))
        );
        assert_eq!(parse_define("#define LRTC_F(x) (x)"), None);
        assert_eq!(
            parse_define("#  define GUARD_H"),
            Some(("GUARD_H".to_string(), String::new()))
        );
        assert_eq!(parse_define("#include <stdint.h>"), None);
    }

    #[test]
    fn test_parse_function_strict() {
        let sym = parse_function(
            "lrtc_factory_t* LRTC_CALL lrtc_factory_create(const char* name, void (*cb)(int))",
            "LRTC_CALL",
            false,
        )
        .unwrap();
        assert_eq!(sym.name, "lrtc_factory_create");
        assert_eq!(sym.return_type, "lrtc_factory_t*");
        assert_eq!(sym.calling_convention, "LRTC_CALL");
        assert_eq!(sym.parameters[1].modifier, ParamModifier::FunctionPointer);
    }

    #[test]
    fn test_parse_function_missing_convention_is_error() {
        let err = parse_function("int lrtc_x(void)", "LRTC_CALL", false).unwrap_err();
        assert!(err.contains("LRTC_CALL"));
    }

    #[test]
    fn test_parse_function_lenient_records_macro() {
        let sym = parse_function("int __cdecl lrtc_x(void)", "LRTC_CALL", true).unwrap();
        assert_eq!(sym.calling_convention, "LRTC_CALL");
        assert_eq!(sym.return_type, "int");
        assert!(sym.parameters.is_empty());
    }

    #[test]
    fn test_braced_typedef_requires_name() {
        assert!(braced_typedef("enum { A }").is_err());
        let (name, inner) = braced_typedef("enum lrtc_state { A, B } lrtc_state_t").unwrap();
        assert_eq!(name, "lrtc_state_t");
        assert_eq!(inner.trim(), "A, B");
    }
}
