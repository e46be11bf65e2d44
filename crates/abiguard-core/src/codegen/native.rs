//! Native generators: a consolidated C header and a linker version script.

use super::{GeneratedFile, Generator, GeneratorContext, Rendered, GENERATED_BANNER};
use crate::errors::Result;
use crate::idl::{IdlDocument, IdlFunction};
use crate::model::{EnumMember, Param};
use std::collections::BTreeSet;

fn macro_prefix(target: &str) -> String {
    target
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

fn prototype(function: &IdlFunction, export_macro: &str) -> String {
    let params = if function.parameters.is_empty() {
        "void".to_string()
    } else {
        function
            .parameters
            .iter()
            .map(|p| {
                Param {
                    name: p.name.clone(),
                    c_type: p.c_type.clone(),
                    modifier: p.modifier,
                }
                .render_c()
            })
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "{} {} {} {}({});",
        export_macro, function.c_return_type, function.calling_convention, function.name, params
    )
}

fn enum_member(member: &EnumMember) -> String {
    match (&member.value_expr, member.value) {
        (Some(expr), _) => format!("    {} = {},", member.name, expr),
        (None, Some(value)) => format!("    {} = {},", member.name, value),
        (None, None) => format!("    {},", member.name),
    }
}

fn is_macro_name(text: &str) -> bool {
    !text.is_empty()
        && text.starts_with(|c: char| c.is_ascii_uppercase() || c == '_')
        && text.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

pub struct NativeHeader;

impl Generator for NativeHeader {
    fn name(&self) -> &'static str {
        "native_header"
    }

    fn render(&self, idl: &IdlDocument, ctx: &GeneratorContext<'_>) -> Result<Rendered> {
        let prefix = macro_prefix(&idl.target);
        let guard = format!("{}_ABI_GENERATED_H", prefix);
        let export_macro = format!("{}_GENERATED_API", prefix);
        let types = &idl.header_types;
        let mut output = String::new();

        output.push_str(&format!("/* {} */\n", GENERATED_BANNER));
        output.push_str(&format!("#ifndef {}\n#define {}\n\n", guard, guard));
        output.push_str("#include <stdbool.h>\n#include <stddef.h>\n#include <stdint.h>\n\n");

        output.push_str("#if defined(_WIN32)\n");
        output.push_str(&format!("#  define {} __declspec(dllimport)\n", export_macro));
        output.push_str("#else\n");
        output.push_str(&format!(
            "#  define {} __attribute__((visibility(\"default\")))\n",
            export_macro
        ));
        output.push_str("#endif\n");

        let conventions: BTreeSet<&str> = idl
            .functions
            .iter()
            .map(|f| f.calling_convention.as_str())
            .filter(|cc| is_macro_name(cc))
            .collect();
        for cc in conventions {
            output.push_str(&format!("#ifndef {}\n#  define {}\n#endif\n", cc, cc));
        }

        output.push_str("\n#ifdef __cplusplus\nextern \"C\" {\n#endif\n\n");

        output.push_str(&format!(
            "#define {}_ABI_VERSION_MAJOR {}\n#define {}_ABI_VERSION_MINOR {}\n#define {}_ABI_VERSION_PATCH {}\n",
            prefix,
            idl.abi_version.major,
            prefix,
            idl.abi_version.minor,
            prefix,
            idl.abi_version.patch
        ));
        for (name, value) in &types.constants {
            output.push_str(&format!("#define {} {}\n", name, value));
        }

        if !types.opaque_types.is_empty() {
            output.push('\n');
            for opaque in &types.opaque_types {
                output.push_str(&format!("typedef struct {} {};\n", opaque, opaque));
            }
        }

        for enum_type in types.enums.values() {
            output.push_str("\ntypedef enum {\n");
            for member in &enum_type.members {
                output.push_str(&enum_member(member));
                output.push('\n');
            }
            output.push_str(&format!("}} {};\n", enum_type.name));
        }

        for struct_type in types.structs.values() {
            output.push_str("\ntypedef struct {\n");
            for field in &struct_type.fields {
                output.push_str(&format!("    {};\n", field.declaration));
            }
            output.push_str(&format!("}} {};\n", struct_type.name));
        }

        if !types.callbacks.is_empty() {
            output.push('\n');
            for callback in types.callbacks.values() {
                output.push_str(&format!("{};\n", callback.declaration));
            }
        }

        output.push('\n');
        for function in idl.codegen_functions() {
            if let Some(doc) = &function.documentation {
                output.push_str(&format!("/* {} */\n", doc));
            }
            output.push_str(&prototype(function, &export_macro));
            output.push('\n');
        }

        output.push_str("\n#ifdef __cplusplus\n}\n#endif\n\n");
        output.push_str(&format!("#endif /* {} */\n", guard));

        Ok(Rendered {
            files: vec![GeneratedFile {
                path: ctx.output.to_string(),
                contents: output,
            }],
            warnings: Vec::new(),
        })
    }
}

pub struct ExportMap;

impl Generator for ExportMap {
    fn name(&self) -> &'static str {
        "export_map"
    }

    fn render(&self, idl: &IdlDocument, ctx: &GeneratorContext<'_>) -> Result<Rendered> {
        let mut output = String::new();
        output.push_str(&format!("/* {} */\n", GENERATED_BANNER));
        output.push_str("{\n  global:\n");
        for function in &idl.functions {
            output.push_str(&format!("    {};\n", function.name));
        }
        output.push_str("  local:\n    *;\n};\n");

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
    use crate::codegen::HandlePlan;
    use crate::idl::generate_idl;

    fn render(generator: &dyn Generator) -> String {
        let idl = generate_idl(&crate::idl::tests::sample_snapshot(), None).unwrap();
        let plan = HandlePlan::default();
        let ctx = GeneratorContext {
            output: "out",
            csharp: None,
            handles: &plan,
        };
        generator.render(&idl, &ctx).unwrap().files.remove(0).contents
    }

    #[test]
    fn test_native_header_layout() {
        let text = render(&NativeHeader);
        assert!(text.starts_with("/* Generated by abiguard"));
        assert!(text.contains("#ifndef LUMENRTC_ABI_GENERATED_H"));
        assert!(text.contains("#define LUMENRTC_ABI_VERSION_MINOR 2"));
        assert!(text.contains("typedef struct lrtc_factory_t lrtc_factory_t;"));
        assert!(text.contains("    LRTC_STATE_OK = 0,\n    LRTC_STATE_ERROR = 1,\n} lrtc_state_t;"));
        assert!(text.contains(
            "LUMENRTC_GENERATED_API void LUMENRTC_CALL lrtc_factory_release(lrtc_factory_t* factory);"
        ));
        assert!(text.contains("lrtc_log(const char* fmt, ...);"));
        assert!(text.contains("#ifndef LUMENRTC_CALL"));
    }

    #[test]
    fn test_export_map_lists_every_function() {
        let text = render(&ExportMap);
        assert!(text.contains("  global:\n    lrtc_factory_create;\n    lrtc_factory_release;\n    lrtc_log;\n    lrtc_set_observer;\n  local:\n    *;\n};\n"));
    }
}
