//! Declaration text normalization and declarator parsing.
//!
//! Everything here works on a single statement's text, after comments are
//! gone. Types are normalized so that two spellings of the same declaration
//! (`char *p`, `char * p`, `char*p`) compare equal in a snapshot.

use crate::model::{Param, ParamModifier, StructField};

/// Calling-convention keywords removed from types
pub const CALLING_CONVENTION_KEYWORDS: &[&str] = &[
    "__cdecl",
    "__stdcall",
    "__fastcall",
    "__vectorcall",
    "__thiscall",
];

const ATTRIBUTE_KEYWORDS: &[&str] = &["__attribute__", "__attribute", "__declspec"];

const STRIPPED_WORDS: &[&str] = &["restrict", "__restrict", "__restrict__", "__extension__"];

/// Words that can never be a parameter or field name
const TYPE_WORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "bool",
    "const", "volatile", "struct", "enum", "union",
];

const QUALIFIER_WORDS: &[&str] = &[
    "const", "volatile", "struct", "enum", "union", "signed", "unsigned",
];

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if is_ident_start(c)) && chars.all(is_ident_char)
}

/// Collapse runs of whitespace into one space and trim
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte ranges of every whole-word occurrence of `word`
fn word_positions(text: &str, word: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(rel) = text[from..].find(word) {
        let start = from + rel;
        let end = start + word.len();
        let before_ok = start == 0 || !is_ident_char(bytes[start - 1] as char);
        let after_ok = end >= bytes.len() || !is_ident_char(bytes[end] as char);
        if before_ok && after_ok {
            out.push(start);
        }
        from = end;
    }
    out
}

/// Replace every whole-word occurrence of `word`
pub(crate) fn replace_word(text: &str, word: &str, replacement: &str) -> String {
    let positions = word_positions(text, word);
    if positions.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for start in positions {
        out.push_str(&text[last..start]);
        out.push_str(replacement);
        last = start + word.len();
    }
    out.push_str(&text[last..]);
    out
}

/// Remove `__attribute__((...))` and `__declspec(...)` with balanced parentheses
pub fn strip_attributes(text: &str) -> String {
    let mut current = text.to_string();
    for keyword in ATTRIBUTE_KEYWORDS {
        loop {
            let Some(start) = word_positions(&current, keyword).into_iter().next() else {
                break;
            };
            let after = start + keyword.len();
            let rest = &current[after..];
            let trimmed = rest.trim_start();
            let open = after + (rest.len() - trimmed.len());
            let end = if trimmed.starts_with('(') {
                match matching_close(&current, open) {
                    Some(close) => close + 1,
                    None => current.len(),
                }
            } else {
                after
            };
            current.replace_range(start..end, " ");
        }
    }
    current
}

/// Index of the `)` matching the `(` at `open`
pub(crate) fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices().skip_while(|(i, _)| *i < open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Index of the `(` matching the `)` at `close`
pub(crate) fn matching_open(text: &str, close: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[..=close].char_indices().rev() {
        match c {
            ')' => depth += 1,
            '(' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Remove calling-convention keywords
pub fn strip_calling_conventions(text: &str) -> String {
    CALLING_CONVENTION_KEYWORDS
        .iter()
        .fold(text.to_string(), |acc, kw| replace_word(&acc, kw, " "))
}

/// Drop the words between `(` and `*` of a function-pointer declarator.
///
/// `void (LUMENRTC_CALL *cb)(int)` and `void ( *cb)(int)` both become
/// `void (*cb)(int)`, which is what a preprocessor leaves once the
/// calling-convention macro expands to nothing.
pub fn strip_declarator_macros(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('(') {
        out.push_str(&rest[..=open]);
        let inner = &rest[open + 1..];
        rest = match declarator_prefix_len(inner) {
            Some(len) => &inner[len..],
            None => inner,
        };
    }
    out.push_str(rest);
    out
}

/// Bytes before the `*` when `inner` continues as `[WORD..] *[name])(`
fn declarator_prefix_len(inner: &str) -> Option<usize> {
    let star = inner.find('*')?;
    let words_only = inner[..star]
        .split_whitespace()
        .all(|w| is_identifier(w) && !TYPE_WORDS.contains(&w));
    if !words_only {
        return None;
    }
    let after = inner[star..].trim_start_matches(|c: char| c == '*' || c.is_whitespace());
    let name_len = after.chars().take_while(|c| is_ident_char(*c)).count();
    let tail = after[name_len..].trim_start().strip_prefix(')')?;
    if !tail.trim_start().starts_with('(') {
        return None;
    }
    Some(star)
}

/// Canonical spelling of a C type (or declarator) text.
///
/// Drops attributes, calling conventions and `restrict`, maps `_Bool` to
/// `bool`, collapses whitespace and glues `*` to the preceding token.
/// A `*` is followed by one space only when an identifier comes next.
pub fn normalize_c_type(text: &str) -> String {
    let mut t = strip_declarator_macros(&strip_calling_conventions(&strip_attributes(text)));
    for word in STRIPPED_WORDS {
        t = replace_word(&t, word, " ");
    }
    t = replace_word(&t, "_Bool", "bool");
    let t = normalize_ws(&t);

    let chars: Vec<char> = t.chars().collect();
    let mut out = String::with_capacity(t.len());
    for (i, &c) in chars.iter().enumerate() {
        match c {
            ' ' => {
                let prev = out.chars().last();
                let next = chars.get(i + 1).copied();
                let keep = match prev {
                    None | Some(' ' | '(' | '[') => false,
                    Some('*') => next.is_some_and(is_ident_start),
                    Some(_) => !matches!(next, Some('*' | '(' | ')' | '[' | ']' | ',')),
                };
                if keep {
                    out.push(' ');
                }
            }
            ',' => out.push_str(", "),
            _ => out.push(c),
        }
    }
    out.trim_end().to_string()
}

/// Split on `sep` at nesting depth zero
pub fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
        if c == sep && depth == 0 {
            out.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    out.push(current);
    out
}

/// Start index of the identifier that ends `text` (ignoring trailing spaces)
pub(crate) fn trailing_identifier(text: &str) -> Option<(usize, &str)> {
    let trimmed = text.trim_end();
    let start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_ident_char(*c))
        .last()
        .map(|(i, _)| i)?;
    let ident = &trimmed[start..];
    if is_identifier(ident) {
        Some((start, ident))
    } else {
        None
    }
}

/// Locate `(*name)` in a normalized declarator; returns the name's byte range
fn function_pointer_name(decl: &str) -> Option<(usize, usize)> {
    let open = decl.find("(*")?;
    let after = open + 2;
    let rest = &decl[after..];
    let len = rest.chars().take_while(|c| is_ident_char(*c)).count();
    if len == 0 || !rest[len..].starts_with(')') {
        return None;
    }
    Some((after, after + len))
}

fn only_qualifiers(text: &str) -> bool {
    text.split_whitespace().all(|w| QUALIFIER_WORDS.contains(&w))
}

/// Split a normalized `type name` into its parts when a name is present
fn split_type_and_name(decl: &str) -> Option<(String, String)> {
    let (start, name) = trailing_identifier(decl)?;
    if TYPE_WORDS.contains(&name) {
        return None;
    }
    let left = decl[..start].trim_end();
    if left.is_empty() || only_qualifiers(left) {
        return None;
    }
    Some((normalize_c_type(left), name.to_string()))
}

/// Parse a parameter list (the text between the parentheses)
pub fn parse_params(text: &str) -> Vec<Param> {
    let cleaned = normalize_ws(&strip_attributes(text));
    if cleaned.is_empty() || cleaned == "void" {
        return Vec::new();
    }

    split_top_level(&cleaned, ',')
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            Some(parse_param(raw, index))
        })
        .collect()
}

fn parse_param(raw: &str, index: usize) -> Param {
    let unnamed = || format!("arg{}", index);

    if raw == "..." {
        return Param {
            name: "...".to_string(),
            c_type: "...".to_string(),
            modifier: ParamModifier::Variadic,
        };
    }

    let decl = normalize_c_type(raw);

    if decl.contains("(*") {
        let (name, c_type) = match function_pointer_name(&decl) {
            Some((start, end)) => {
                let mut c_type = decl.clone();
                c_type.replace_range(start..end, "");
                (decl[start..end].to_string(), normalize_c_type(&c_type))
            }
            None => (unnamed(), decl.clone()),
        };
        return Param {
            name,
            c_type,
            modifier: ParamModifier::FunctionPointer,
        };
    }

    if decl.ends_with(']') {
        if let Some(bracket) = decl.find('[') {
            let left = decl[..bracket].trim_end();
            let (base, name) = match split_type_and_name(left) {
                Some((base, name)) => (base, name),
                None => (normalize_c_type(left), unnamed()),
            };
            return Param {
                name,
                c_type: format!("{}*", base),
                modifier: ParamModifier::Array,
            };
        }
    }

    match split_type_and_name(&decl) {
        Some((c_type, name)) => Param {
            name,
            c_type,
            modifier: ParamModifier::None,
        },
        None => Param {
            name: unnamed(),
            c_type: decl,
            modifier: ParamModifier::None,
        },
    }
}

/// Parse one struct field declaration (text between two top-level `;`)
pub fn parse_struct_field(raw: &str, index: usize) -> StructField {
    let declaration = normalize_ws(&strip_declarator_macros(raw));
    let decl = normalize_c_type(raw);
    let unnamed = || StructField {
        name: format!("__unnamed_{}", index),
        c_type: decl.clone(),
        array_size: None,
        bit_width: None,
        declaration: declaration.clone(),
    };

    if decl.contains("(*") {
        return match function_pointer_name(&decl) {
            Some((start, end)) => {
                let mut c_type = decl.clone();
                c_type.replace_range(start..end, "");
                StructField {
                    name: decl[start..end].to_string(),
                    c_type: normalize_c_type(&c_type),
                    array_size: None,
                    bit_width: None,
                    declaration,
                }
            }
            None => unnamed(),
        };
    }

    if let Some((left, width)) = decl.rsplit_once(':') {
        let width = width.trim();
        if let Ok(bits) = width.parse::<u32>() {
            return match split_type_and_name(left.trim()) {
                Some((c_type, name)) => StructField {
                    name,
                    c_type,
                    array_size: None,
                    bit_width: Some(bits),
                    declaration,
                },
                None => StructField {
                    bit_width: Some(bits),
                    c_type: normalize_c_type(left),
                    ..unnamed()
                },
            };
        }
    }

    if decl.ends_with(']') {
        if let Some(bracket) = decl.find('[') {
            let dims = &decl[bracket..];
            let size = dims
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string();
            if let Some((c_type, name)) = split_type_and_name(&decl[..bracket]) {
                return StructField {
                    name,
                    c_type,
                    array_size: Some(size),
                    bit_width: None,
                    declaration,
                };
            }
        }
    }

    match split_type_and_name(&decl) {
        Some((c_type, name)) => StructField {
            name,
            c_type,
            array_size: None,
            bit_width: None,
            declaration,
        },
        None => unnamed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pointer_spacing() {
        assert_eq!(normalize_c_type("const char *"), "const char*");
        assert_eq!(normalize_c_type("char * * out"), "char** out");
        assert_eq!(normalize_c_type("char * const p"), "char* const p");
        assert_eq!(
            normalize_c_type("void ( * ) ( void * user , int code )"),
            "void(*)(void* user, int code)"
        );
    }

    #[test]
    fn test_normalize_drops_attributes_and_conventions() {
        assert_eq!(
            normalize_c_type("__attribute__((nonnull(1))) _Bool __stdcall"),
            "bool"
        );
        assert_eq!(normalize_c_type("int * restrict p"), "int* p");
    }

    #[test]
    fn test_params_void_and_empty() {
        assert!(parse_params("void").is_empty());
        assert!(parse_params("  ").is_empty());
    }

    #[test]
    fn test_params_regular_and_unnamed() {
        let params = parse_params("lrtc_factory_t* factory, uint32_t, const char *name");
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].name, "factory");
        assert_eq!(params[0].c_type, "lrtc_factory_t*");
        assert_eq!(params[1].name, "arg1");
        assert_eq!(params[1].c_type, "uint32_t");
        assert_eq!(params[2].name, "name");
        assert_eq!(params[2].c_type, "const char*");
    }

    #[test]
    fn test_params_keyword_is_not_a_name() {
        let params = parse_params("unsigned int");
        assert_eq!(params[0].name, "arg0");
        assert_eq!(params[0].c_type, "unsigned int");
    }

    #[test]
    fn test_params_function_pointer() {
        let params = parse_params("void (*cb)(void *user, int code), void* user");
        assert_eq!(params[0].name, "cb");
        assert_eq!(params[0].c_type, "void(*)(void* user, int code)");
        assert_eq!(params[0].modifier, ParamModifier::FunctionPointer);
        assert_eq!(params[1].name, "user");
    }

    #[test]
    fn test_params_array_decays() {
        let params = parse_params("const uint8_t data[16]");
        assert_eq!(params[0].name, "data");
        assert_eq!(params[0].c_type, "const uint8_t*");
        assert_eq!(params[0].modifier, ParamModifier::Array);
    }

    #[test]
    fn test_params_variadic() {
        let params = parse_params("const char* fmt, ...");
        assert_eq!(params[1].modifier, ParamModifier::Variadic);
    }

    #[test]
    fn test_struct_field_forms() {
        let f = parse_struct_field("void (*on_event)(void* user)", 0);
        assert_eq!(f.name, "on_event");
        assert_eq!(f.c_type, "void(*)(void* user)");

        let f = parse_struct_field("unsigned int flags : 3", 1);
        assert_eq!(f.name, "flags");
        assert_eq!(f.bit_width, Some(3));
        assert_eq!(f.c_type, "unsigned int");

        let f = parse_struct_field("char label[LRTC_LABEL_MAX]", 2);
        assert_eq!(f.name, "label");
        assert_eq!(f.array_size.as_deref(), Some("LRTC_LABEL_MAX"));
        assert_eq!(f.c_type, "char");

        let f = parse_struct_field("const char *  name", 3);
        assert_eq!(f.name, "name");
        assert_eq!(f.c_type, "const char*");
        assert_eq!(f.declaration, "const char * name");
    }

    #[test]
    fn test_declarator_macros_are_dropped() {
        assert_eq!(
            strip_declarator_macros("void (LUMENRTC_CALL *cb)(int)"),
            "void (*cb)(int)"
        );
        assert_eq!(strip_declarator_macros("void ( *cb)(int)"), "void (*cb)(int)");
        assert_eq!(
            strip_declarator_macros("void (WINAPI LRTC_CALL **cb)(void)"),
            "void (**cb)(void)"
        );
        // not a declarator: left alone
        assert_eq!(strip_declarator_macros("char buf[sizeof(int *)]"), "char buf[sizeof(int *)]");
        assert_eq!(strip_declarator_macros("f(a * b)"), "f(a * b)");
    }

    #[test]
    fn test_struct_field_function_pointer_with_call_macro() {
        let f = parse_struct_field(
            "void (LUMENRTC_CALL *on_data_channel)(void* user_data, lrtc_data_channel_t* channel)",
            5,
        );
        assert_eq!(f.name, "on_data_channel");
        assert_eq!(f.c_type, "void(*)(void* user_data, lrtc_data_channel_t* channel)");
        assert_eq!(
            f.declaration,
            "void (*on_data_channel)(void* user_data, lrtc_data_channel_t* channel)"
        );

        let expanded = parse_struct_field(
            "void ( *on_data_channel)(void* user_data, lrtc_data_channel_t* channel)",
            5,
        );
        assert_eq!(expanded, f);
    }

    #[test]
    fn test_params_function_pointer_with_call_macro() {
        let params = parse_params("void (LUMENRTC_CALL *cb)(void *user, int code), void* user");
        assert_eq!(params[0].name, "cb");
        assert_eq!(params[0].c_type, "void(*)(void* user, int code)");
        assert_eq!(params[0].modifier, ParamModifier::FunctionPointer);

        let expanded = parse_params("void ( *cb)(void *user, int code), void* user");
        assert_eq!(expanded, params);
    }

    #[test]
    fn test_struct_field_unnamed() {
        let f = parse_struct_field("int", 4);
        assert_eq!(f.name, "__unnamed_4");
        assert_eq!(f.c_type, "int");
    }
}
