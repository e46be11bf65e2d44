//! C# generators: interop types, `[DllImport]` declarations and handle
//! wrapper scaffolding.

use super::handles::WrapperStatus;
use super::{missing_bindings, GeneratedFile, Generator, GeneratorContext, Rendered, GENERATED_BANNER};
use crate::config::{FunctionBinding, ParamDirection};
use crate::errors::Result;
use crate::header::cexpr::eval_int_expr;
use crate::idl::{IdlDocument, IdlFunction, IdlParameter};
use crate::model::{EnumType, ParamModifier, StructField, StructType};
use std::collections::{BTreeMap, BTreeSet};

const KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked", "class",
    "const", "continue", "decimal", "default", "delegate", "do", "double", "else", "enum", "event",
    "explicit", "extern", "false", "finally", "fixed", "float", "for", "foreach", "goto", "if",
    "implicit", "in", "int", "interface", "internal", "is", "lock", "long", "namespace", "new",
    "null", "object", "operator", "out", "override", "params", "private", "protected", "public",
    "readonly", "ref", "return", "sbyte", "sealed", "short", "sizeof", "stackalloc", "static",
    "string", "struct", "switch", "this", "throw", "true", "try", "typeof", "uint", "ulong",
    "unchecked", "unsafe", "ushort", "using", "virtual", "void", "volatile", "while",
];

/// Escape C# keywords used as identifiers
pub fn identifier(name: &str) -> String {
    if KEYWORDS.contains(&name) {
        format!("@{}", name)
    } else {
        name.to_string()
    }
}

/// `lrtc_peer_state_t` -> `LrtcPeerState`, `LRTC_STATE_OK` -> `LrtcStateOk`
pub fn pascal_case(name: &str) -> String {
    let trimmed = name.strip_suffix("_t").unwrap_or(name);
    let mut out = String::new();
    for part in trimmed.split('_').filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Longest `_`-terminated prefix shared by every member name
fn common_member_prefix(names: &[&str]) -> usize {
    let Some(first) = names.first() else {
        return 0;
    };
    if names.len() < 2 {
        return 0;
    }
    let mut len = first
        .char_indices()
        .filter(|(_, c)| *c == '_')
        .map(|(i, _)| i + 1)
        .filter(|end| names.iter().all(|n| n.len() > *end && n.starts_with(&first[..*end])))
        .last()
        .unwrap_or(0);
    // keep the trimmed names valid identifiers
    while len > 0 && names.iter().any(|n| n[len..].starts_with(|c: char| c.is_ascii_digit())) {
        len = first[..len - 1].rfind('_').map_or(0, |i| i + 1);
    }
    len
}

fn calling_convention(cc: &str) -> &'static str {
    let lower = cc.to_ascii_lowercase();
    if lower.contains("stdcall") {
        "StdCall"
    } else if lower.contains("fastcall") {
        "FastCall"
    } else if lower.contains("thiscall") {
        "ThisCall"
    } else {
        "Cdecl"
    }
}

fn scalar(base: &str) -> Option<&'static str> {
    Some(match base {
        "void" => "void",
        "bool" | "_Bool" => "bool",
        "char" | "unsigned char" | "uint8_t" => "byte",
        "signed char" | "int8_t" => "sbyte",
        "short" | "short int" | "signed short" | "int16_t" => "short",
        "unsigned short" | "unsigned short int" | "uint16_t" => "ushort",
        "int" | "signed" | "signed int" | "int32_t" => "int",
        "unsigned" | "unsigned int" | "uint32_t" => "uint",
        "long long" | "long long int" | "signed long long" | "int64_t" => "long",
        "unsigned long long" | "unsigned long long int" | "uint64_t" => "ulong",
        "long" | "long int" | "signed long" => "CLong",
        "unsigned long" | "unsigned long int" => "CULong",
        "float" => "float",
        "double" => "double",
        "size_t" | "uintptr_t" => "nuint",
        "ssize_t" | "ptrdiff_t" | "intptr_t" => "nint",
        _ => return None,
    })
}

/// A managed type with optional marshaling attribute argument
#[derive(Debug, Clone, PartialEq, Eq)]
struct CsType {
    name: String,
    marshal: Option<String>,
}

impl CsType {
    fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            marshal: None,
        }
    }

    fn marshaled(name: &str, marshal: &str) -> Self {
        Self {
            name: name.to_string(),
            marshal: Some(marshal.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Parameter,
    Return,
    Field,
    Callback,
}

/// Maps C types to managed types using the IDL's declared header types
struct TypeMapper<'a> {
    idl: &'a IdlDocument,
}

impl<'a> TypeMapper<'a> {
    fn new(idl: &'a IdlDocument) -> Self {
        Self { idl }
    }

    fn base_name(c_type: &str) -> (String, usize) {
        let depth = c_type.matches('*').count();
        let base = c_type
            .replace('*', " ")
            .split_whitespace()
            .filter(|w| !matches!(*w, "const" | "volatile" | "struct" | "enum" | "restrict"))
            .collect::<Vec<_>>()
            .join(" ");
        (base, depth)
    }

    fn map(&self, c_type: &str, position: Position) -> Option<CsType> {
        if c_type.contains("(*") {
            return Some(CsType::plain("IntPtr"));
        }
        let (base, depth) = Self::base_name(c_type);
        let types = &self.idl.header_types;

        if depth == 1 && base == "char" {
            return Some(match position {
                Position::Parameter => CsType::marshaled("string", "LPUTF8Str"),
                _ => CsType::plain("IntPtr"),
            });
        }
        if depth > 0 {
            return Some(CsType::plain("IntPtr"));
        }
        if base == "bool" || base == "_Bool" {
            return Some(CsType::marshaled("bool", "I1"));
        }
        if let Some(s) = scalar(&base) {
            return Some(CsType::plain(s));
        }
        if types.enums.contains_key(&base)
            || types.structs.contains_key(&base)
            || types.callbacks.contains_key(&base)
        {
            return Some(CsType::plain(pascal_case(&base)));
        }
        None
    }

    /// Mapped type, or `IntPtr` plus a warning when the type is unknown
    fn map_or_warn(&self, c_type: &str, position: Position, context: &str, warnings: &mut Vec<String>) -> CsType {
        self.map(c_type, position).unwrap_or_else(|| {
            warnings.push(format!("{}: unmapped C type '{}', using IntPtr", context, c_type));
            CsType::plain("IntPtr")
        })
    }

    fn resolve_size(&self, expr: &str) -> Option<i64> {
        let constants = &self.idl.header_types.constants;
        fn lookup(constants: &BTreeMap<String, String>, name: &str, depth: u32) -> Option<i64> {
            if depth > 16 {
                return None;
            }
            let text = constants.get(name)?;
            eval_int_expr(text, &|n| lookup(constants, n, depth + 1))
        }
        eval_int_expr(expr, &|n| lookup(constants, n, 0))
    }
}

fn file_header(namespace: &str) -> String {
    let mut output = String::new();
    output.push_str("// <auto-generated>\n");
    output.push_str(&format!("// {}\n", GENERATED_BANNER));
    output.push_str("// </auto-generated>\n");
    output.push_str("#nullable enable\n");
    output.push_str("using System;\n");
    output.push_str("using System.Runtime.InteropServices;\n\n");
    output.push_str(&format!("namespace {};\n", namespace));
    output
}

fn attribute(marshal: &Option<String>) -> String {
    match marshal {
        Some(m) => format!("[MarshalAs(UnmanagedType.{})] ", m),
        None => String::new(),
    }
}

fn param_list(
    mapper: &TypeMapper<'_>,
    params: &[IdlParameter],
    position: Position,
    context: &str,
    binding: Option<&FunctionBinding>,
    warnings: &mut Vec<String>,
) -> String {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let name = if p.name.is_empty() {
                format!("arg{}", i)
            } else {
                identifier(&p.name)
            };
            let mut ty = if p.modifier == ParamModifier::Array {
                CsType::plain("IntPtr")
            } else {
                mapper.map_or_warn(&p.c_type, position, context, warnings)
            };
            let mut direction = ParamDirection::None;
            if let Some(over) = binding.and_then(|b| b.parameters.get(&p.name)) {
                if let Some(managed) = &over.managed_type {
                    ty = CsType::plain(managed.clone());
                }
                if over.marshal_as.is_some() {
                    ty.marshal = over.marshal_as.clone();
                }
                direction = over.modifier;
            }
            let keyword = match direction {
                ParamDirection::None => "",
                ParamDirection::In => "in ",
                ParamDirection::Out => "out ",
                ParamDirection::Ref => "ref ",
            };
            format!("{}{}{} {}", attribute(&ty.marshal), keyword, ty.name, name)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// ========== csharp_interop ==========

pub struct CSharpInterop;

impl CSharpInterop {
    fn render_enum(output: &mut String, enum_type: &EnumType, warnings: &mut Vec<String>) {
        let names: Vec<&str> = enum_type.members.iter().map(|m| m.name.as_str()).collect();
        let prefix = common_member_prefix(&names);
        let wide = enum_type
            .members
            .iter()
            .filter_map(|m| m.value)
            .any(|v| i32::try_from(v).is_err());

        output.push_str(&format!(
            "\npublic enum {} : {}\n{{\n",
            pascal_case(&enum_type.name),
            if wide { "long" } else { "int" }
        ));
        for member in &enum_type.members {
            let name = pascal_case(&member.name[prefix..]);
            match member.value {
                Some(value) => output.push_str(&format!("    {} = {},\n", name, value)),
                None => {
                    warnings.push(format!(
                        "enum {}: member {} has an unresolved value and was omitted",
                        enum_type.name, member.name
                    ));
                    output.push_str(&format!(
                        "    // {} omitted: unresolved value {}\n",
                        member.name,
                        member.value_expr.as_deref().unwrap_or("?")
                    ));
                }
            }
        }
        output.push_str("}\n");
    }

    fn render_field(mapper: &TypeMapper<'_>, struct_name: &str, field: &StructField) -> std::result::Result<String, String> {
        if field.bit_width.is_some() {
            return Err(format!("struct {}: bit-field '{}' has no sequential layout equivalent", struct_name, field.name));
        }
        let name = identifier(&field.name);
        if let Some(size) = &field.array_size {
            let count = mapper
                .resolve_size(size)
                .ok_or_else(|| format!("struct {}: array size '{}' of '{}' is not resolvable", struct_name, size, field.name))?;
            let element = mapper
                .map(&field.c_type, Position::Field)
                .map(|t| if t.name == "bool" { "byte".to_string() } else { t.name })
                .ok_or_else(|| format!("struct {}: unmapped element type '{}'", struct_name, field.c_type))?;
            return Ok(format!(
                "    [MarshalAs(UnmanagedType.ByValArray, SizeConst = {})]\n    public {}[] {};\n",
                count, element, name
            ));
        }
        let ty = mapper
            .map(&field.c_type, Position::Field)
            .ok_or_else(|| format!("struct {}: unmapped field type '{}' of '{}'", struct_name, field.c_type, field.name))?;
        let mut text = String::new();
        if let Some(marshal) = &ty.marshal {
            text.push_str(&format!("    [MarshalAs(UnmanagedType.{})]\n", marshal));
        }
        text.push_str(&format!("    public {} {};\n", ty.name, name));
        Ok(text)
    }

    fn render_struct(output: &mut String, mapper: &TypeMapper<'_>, struct_type: &StructType, warnings: &mut Vec<String>) {
        let mut body = String::new();
        for field in &struct_type.fields {
            match Self::render_field(mapper, &struct_type.name, field) {
                Ok(text) => body.push_str(&text),
                Err(reason) => {
                    warnings.push(format!("{}; struct skipped", reason));
                    return;
                }
            }
        }
        output.push_str("\n[StructLayout(LayoutKind.Sequential)]\n");
        output.push_str(&format!("public struct {}\n{{\n", pascal_case(&struct_type.name)));
        output.push_str(&body);
        output.push_str("}\n");
    }

    fn render_constants(output: &mut String, mapper: &TypeMapper<'_>, idl: &IdlDocument, warnings: &mut Vec<String>) {
        let constants = &idl.header_types.constants;
        if constants.is_empty() {
            return;
        }
        output.push_str(&format!("\npublic static class {}Constants\n{{\n", pascal_case(&idl.target)));
        for (name, text) in constants {
            let literal = text.trim();
            if literal.starts_with('"') && literal.ends_with('"') && literal.len() >= 2 {
                output.push_str(&format!("    public const string {} = {};\n", name, literal));
            } else if let Some(value) = mapper.resolve_size(literal) {
                let ty = if i32::try_from(value).is_ok() { "int" } else { "long" };
                output.push_str(&format!("    public const {} {} = {};\n", ty, name, value));
            } else {
                warnings.push(format!("constant {} = {} is not representable and was omitted", name, literal));
            }
        }
        output.push_str("}\n");
    }
}

impl Generator for CSharpInterop {
    fn name(&self) -> &'static str {
        "csharp_interop"
    }

    fn render(&self, idl: &IdlDocument, ctx: &GeneratorContext<'_>) -> Result<Rendered> {
        let bindings = ctx.csharp.ok_or_else(|| missing_bindings(self.name()))?;
        let mapper = TypeMapper::new(idl);
        let mut warnings = Vec::new();
        let mut output = file_header(&bindings.namespace);

        for enum_type in idl.header_types.enums.values() {
            Self::render_enum(&mut output, enum_type, &mut warnings);
        }
        Self::render_constants(&mut output, &mapper, idl, &mut warnings);
        for struct_type in idl.header_types.structs.values() {
            Self::render_struct(&mut output, &mapper, struct_type, &mut warnings);
        }
        for callback in idl.header_types.callbacks.values() {
            let context = format!("callback {}", callback.name);
            let ret = mapper.map_or_warn(&callback.return_type, Position::Return, &context, &mut warnings);
            let params: Vec<IdlParameter> = callback
                .parameters
                .iter()
                .map(|p| IdlParameter {
                    name: p.name.clone(),
                    c_type: p.c_type.clone(),
                    modifier: p.modifier,
                    pointer_depth: 0,
                    variadic: p.modifier == ParamModifier::Variadic,
                })
                .collect();
            let list = param_list(&mapper, &params, Position::Callback, &context, None, &mut warnings);
            output.push_str("\n[UnmanagedFunctionPointer(CallingConvention.Cdecl)]\n");
            if let Some(marshal) = &ret.marshal {
                output.push_str(&format!("[return: MarshalAs(UnmanagedType.{})]\n", marshal));
            }
            output.push_str(&format!(
                "public delegate {} {}({});\n",
                ret.name,
                pascal_case(&callback.name),
                list
            ));
        }

        Ok(Rendered {
            files: vec![GeneratedFile {
                path: ctx.output.to_string(),
                contents: output,
            }],
            warnings,
        })
    }
}

// ========== csharp_native_methods ==========

pub struct CSharpNativeMethods;

impl CSharpNativeMethods {
    fn render_function(
        output: &mut String,
        mapper: &TypeMapper<'_>,
        function: &IdlFunction,
        binding: Option<&FunctionBinding>,
        warnings: &mut Vec<String>,
    ) {
        let context = format!("function {}", function.name);
        if let Some(b) = binding {
            let known: BTreeSet<&str> = function.parameters.iter().map(|p| p.name.as_str()).collect();
            for name in b.parameters.keys().filter(|n| !known.contains(n.as_str())) {
                warnings.push(format!("{}: override for unknown parameter '{}'", context, name));
            }
        }

        let mut ret = mapper.map_or_warn(&function.c_return_type, Position::Return, &context, warnings);
        if let Some(managed) = binding.and_then(|b| b.return_type.clone()) {
            ret = CsType::plain(managed);
        }
        if let Some(marshal) = binding.and_then(|b| b.return_marshal_as.clone()) {
            ret.marshal = Some(marshal);
        }
        let params = param_list(mapper, &function.parameters, Position::Parameter, &context, binding, warnings);

        output.push('\n');
        if let Some(doc) = &function.documentation {
            output.push_str(&format!("    /// <summary>{}</summary>\n", doc));
        }
        if let Some(deprecated) = &function.deprecated {
            output.push_str(&format!("    [Obsolete(\"{}\")]\n", deprecated.replace('"', "\\\"")));
        }
        output.push_str(&format!(
            "    [DllImport(LibraryName, EntryPoint = \"{}\", CallingConvention = CallingConvention.{})]\n",
            function.name,
            calling_convention(&function.calling_convention)
        ));
        if let Some(marshal) = &ret.marshal {
            output.push_str(&format!("    [return: MarshalAs(UnmanagedType.{})]\n", marshal));
        }
        output.push_str(&format!(
            "    internal static extern {} {}({});\n",
            ret.name, function.name, params
        ));
    }
}

impl Generator for CSharpNativeMethods {
    fn name(&self) -> &'static str {
        "csharp_native_methods"
    }

    fn render(&self, idl: &IdlDocument, ctx: &GeneratorContext<'_>) -> Result<Rendered> {
        let bindings = ctx.csharp.ok_or_else(|| missing_bindings(self.name()))?;
        let mapper = TypeMapper::new(idl);
        let mut warnings = Vec::new();
        let mut output = file_header(&bindings.namespace);

        output.push_str(&format!("\ninternal static partial class {}\n{{\n", bindings.class_name));
        output.push_str(&format!(
            "    internal const string LibraryName = \"{}\";\n",
            bindings.library_name
        ));
        for function in idl.codegen_functions() {
            if function.is_variadic() {
                warnings.push(format!(
                    "function {} is variadic and has no DllImport equivalent; skipped",
                    function.name
                ));
                continue;
            }
            Self::render_function(
                &mut output,
                &mapper,
                function,
                bindings.overrides.get(&function.name),
                &mut warnings,
            );
        }
        output.push_str("}\n");

        Ok(Rendered {
            files: vec![GeneratedFile {
                path: ctx.output.to_string(),
                contents: output,
            }],
            warnings,
        })
    }
}

// ========== csharp_handles ==========

pub struct CSharpHandles;

impl Generator for CSharpHandles {
    fn name(&self) -> &'static str {
        "csharp_handles"
    }

    fn render(&self, _idl: &IdlDocument, ctx: &GeneratorContext<'_>) -> Result<Rendered> {
        let bindings = ctx.csharp.ok_or_else(|| missing_bindings(self.name()))?;
        let native = format!("global::{}.{}", bindings.namespace, bindings.class_name);

        let mut by_namespace: BTreeMap<&str, Vec<&super::HandleWrapper>> = BTreeMap::new();
        for wrapper in &ctx.handles.wrappers {
            by_namespace
                .entry(wrapper.metadata.namespace.as_str())
                .or_default()
                .push(wrapper);
        }

        let mut output = String::new();
        output.push_str("// <auto-generated>\n");
        output.push_str(&format!("// {}\n", GENERATED_BANNER));
        output.push_str("// </auto-generated>\n");
        output.push_str("#nullable enable\n");
        output.push_str("using System;\n");
        output.push_str("using System.Runtime.InteropServices;\n");

        for (namespace, wrappers) in by_namespace {
            output.push_str(&format!("\nnamespace {}\n{{\n", namespace));
            for (i, wrapper) in wrappers.iter().enumerate() {
                if i > 0 {
                    output.push('\n');
                }
                let meta = &wrapper.metadata;
                match wrapper.status {
                    WrapperStatus::Synthesized => {
                        output.push_str(&format!(
                            "    {} sealed partial class {} : {}\n    {{\n",
                            meta.access.as_str(),
                            meta.type_name,
                            meta.base_type
                        ));
                        if meta.base_type.ends_with("ZeroOrMinusOneIsInvalid") {
                            output.push_str(&format!(
                                "        public {}() : base(ownsHandle: true) {{ }}\n\n",
                                meta.type_name
                            ));
                        } else {
                            output.push_str(&format!(
                                "        public {}() : base(IntPtr.Zero, ownsHandle: true) {{ }}\n\n",
                                meta.type_name
                            ));
                            output.push_str("        public override bool IsInvalid => handle == IntPtr.Zero;\n\n");
                        }
                    }
                    WrapperStatus::Existing { .. } => {
                        output.push_str(&format!(
                            "    {} partial class {}\n    {{\n",
                            meta.access.as_str(),
                            meta.type_name
                        ));
                    }
                }
                output.push_str("        protected override bool ReleaseHandle()\n        {\n");
                output.push_str(&format!(
                    "            {}.{}(handle);\n",
                    native, meta.release_function_name
                ));
                output.push_str("            return true;\n        }\n    }\n");
            }
            output.push_str("}\n");
        }

        Ok(Rendered {
            files: vec![GeneratedFile {
                path: ctx.output.to_string(),
                contents: output,
            }],
            warnings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::tests::bindings;
    use crate::codegen::HandlePlan;
    use crate::config::ParamBinding;
    use crate::idl::generate_idl;
    use crate::model::{EnumMember, StructField, StructType};

    fn render(generator: &dyn Generator, idl: &IdlDocument, csharp: &crate::config::CSharpBindings) -> Rendered {
        let plan = HandlePlan::default();
        let ctx = GeneratorContext {
            output: "out.cs",
            csharp: Some(csharp),
            handles: &plan,
        };
        generator.render(idl, &ctx).unwrap()
    }

    fn field(name: &str, c_type: &str, array_size: Option<&str>) -> StructField {
        StructField {
            name: name.to_string(),
            c_type: c_type.to_string(),
            array_size: array_size.map(str::to_string),
            bit_width: None,
            declaration: format!("{} {}", c_type, name),
        }
    }

    #[test]
    fn test_pascal_case_and_prefix() {
        assert_eq!(pascal_case("lrtc_peer_state_t"), "LrtcPeerState");
        assert_eq!(pascal_case("OK"), "Ok");
        assert_eq!(
            common_member_prefix(&["LRTC_STATE_OK", "LRTC_STATE_ERROR"]),
            "LRTC_STATE_".len()
        );
        assert_eq!(common_member_prefix(&["LRTC_RES_720P", "LRTC_RES_1080P"]), "LRTC_".len());
        assert_eq!(identifier("string"), "@string");
    }

    #[test]
    fn test_interop_enums_structs_and_delegates() {
        let mut snapshot = crate::idl::tests::sample_snapshot();
        snapshot.constants.insert("LRTC_MAX_NAME".to_string(), "(8 * 2)".to_string());
        snapshot.structs.insert(
            "lrtc_config_t".to_string(),
            StructType {
                name: "lrtc_config_t".to_string(),
                fields: vec![
                    field("width", "int", None),
                    field("name", "char", Some("LRTC_MAX_NAME")),
                    field("enabled", "bool", None),
                    field("state", "lrtc_state_t", None),
                ],
            },
        );
        if let Some(e) = snapshot.enums.get_mut("lrtc_state_t") {
            e.members.push(EnumMember {
                name: "LRTC_STATE_CUSTOM".to_string(),
                value: None,
                value_expr: Some("LRTC_EXTERNAL".to_string()),
            });
        }
        let idl = generate_idl(&snapshot, None).unwrap();
        let rendered = render(&CSharpInterop, &idl, &bindings());
        let text = &rendered.files[0].contents;

        assert!(text.contains("namespace LumenRTC.Interop;"));
        assert!(text.contains("public enum LrtcState : int\n{\n    Ok = 0,\n    Error = 1,\n"));
        assert!(text.contains("    public const int LRTC_MAX_NAME = 16;"));
        assert!(text.contains("[MarshalAs(UnmanagedType.ByValArray, SizeConst = 16)]\n    public byte[] name;"));
        assert!(text.contains("    [MarshalAs(UnmanagedType.I1)]\n    public bool enabled;"));
        assert!(text.contains("    public LrtcState state;"));
        assert_eq!(rendered.warnings.len(), 1);
    }

    #[test]
    fn test_native_methods_with_overrides() {
        let idl = generate_idl(&crate::idl::tests::sample_snapshot(), None).unwrap();
        let mut csharp = bindings();
        let mut binding = FunctionBinding::default();
        binding.parameters.insert(
            "factory".to_string(),
            ParamBinding {
                managed_type: Some("FactoryHandle".to_string()),
                modifier: ParamDirection::None,
                marshal_as: None,
            },
        );
        csharp.overrides.insert("lrtc_set_observer".to_string(), binding);

        let rendered = render(&CSharpNativeMethods, &idl, &csharp);
        let text = &rendered.files[0].contents;

        assert!(text.contains("internal const string LibraryName = \"lumenrtc\";"));
        assert!(text.contains(
            "    [DllImport(LibraryName, EntryPoint = \"lrtc_factory_create\", CallingConvention = CallingConvention.Cdecl)]\n    internal static extern IntPtr lrtc_factory_create();"
        ));
        assert!(text.contains("internal static extern void lrtc_set_observer(FactoryHandle factory, IntPtr cb);"));
        assert!(!text.contains("lrtc_log("));
        assert!(rendered.warnings[0].contains("lrtc_log is variadic"));
    }
}
