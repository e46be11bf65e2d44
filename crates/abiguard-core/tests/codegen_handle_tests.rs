#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use abiguard_core::codegen::{run_codegen, ManagedSource};
use abiguard_core::config::{
    Accessibility, BindingsConfig, CSharpBindings, CodegenConfig, GeneratorEntry, HandleMetadata,
};
use abiguard_core::{generate_idl, ExErrorKind, IdlDocument, TargetConfig};
use common::{header_config, snapshot_of, HeaderText};

// ----- Helpers -----

fn header() -> HeaderText {
    HeaderText::default()
        .with_function("void LUMENRTC_CALL lrtc_factory_release(lrtc_factory_t* factory)")
}

fn handle(release: &str, c_type: &str) -> HandleMetadata {
    HandleMetadata {
        namespace: "LumenRTC".to_string(),
        type_name: "FactoryHandle".to_string(),
        access: Accessibility::Internal,
        release_function_name: release.to_string(),
        c_handle_type: c_type.to_string(),
        base_type: "SafeHandle".to_string(),
    }
}

fn target(handles: Vec<HandleMetadata>) -> TargetConfig {
    TargetConfig {
        header: header_config(),
        codegen: Some(CodegenConfig {
            idl: "abi/lumenrtc.idl.json".to_string(),
            exclude_symbols: vec!["^lrtc_bar$".to_string()],
            generators: vec![
                GeneratorEntry {
                    name: "csharp_native_methods".to_string(),
                    output: "bindings/NativeMethods.g.cs".to_string(),
                },
                GeneratorEntry {
                    name: "csharp_handles".to_string(),
                    output: "bindings/Handles.g.cs".to_string(),
                },
            ],
            ..CodegenConfig::default()
        }),
        bindings: BindingsConfig {
            symbols: None,
            csharp: Some(CSharpBindings {
                namespace: "LumenRTC.Interop".to_string(),
                library_name: "lumenrtc".to_string(),
                class_name: "NativeMethods".to_string(),
                managed_sources: vec!["bindings/*.cs".to_string()],
                handles,
                overrides: Default::default(),
            }),
        },
        ..TargetConfig::default()
    }
}

fn idl(target: &TargetConfig) -> IdlDocument {
    generate_idl(&snapshot_of(&header()), target.codegen.as_ref()).unwrap()
}

fn managed(text: &str) -> Vec<ManagedSource> {
    vec![ManagedSource {
        path: "bindings/FactoryHandle.cs".to_string(),
        text: text.to_string(),
    }]
}

fn file<'a>(output: &'a abiguard_core::codegen::CodegenOutput, path: &str) -> &'a str {
    &output
        .files
        .iter()
        .find(|f| f.path == path)
        .expect("generated file present")
        .contents
}

// ----- Scenarios -----

#[test]
fn test_missing_wrapper_is_synthesized_with_warning() {
    let config = target(vec![handle("lrtc_factory_release", "lrtc_factory_t*")]);
    let output = run_codegen("lumenrtc", &idl(&config), &config, &[]).unwrap();

    let handles = file(&output, "bindings/Handles.g.cs");
    assert!(handles.contains("namespace LumenRTC\n{"));
    assert!(handles.contains("    internal sealed partial class FactoryHandle : SafeHandle\n"));
    assert!(handles.contains("public override bool IsInvalid => handle == IntPtr.Zero;"));
    assert!(handles.contains(
        "global::LumenRTC.Interop.NativeMethods.lrtc_factory_release(handle);"
    ));
    assert!(output
        .warnings
        .iter()
        .any(|w| w.contains("LumenRTC.FactoryHandle not found")));
}

#[test]
fn test_existing_partial_wrapper_gets_only_the_release_half() {
    let config = target(vec![handle("lrtc_factory_release", "lrtc_factory_t*")]);
    let sources = managed(
        "namespace LumenRTC;\n\ninternal partial class FactoryHandle : SafeHandle\n{\n    public FactoryHandle() : base(IntPtr.Zero, true) { }\n}\n",
    );

    let output = run_codegen("lumenrtc", &idl(&config), &config, &sources).unwrap();

    let handles = file(&output, "bindings/Handles.g.cs");
    assert!(handles.contains("    internal partial class FactoryHandle\n"));
    assert!(!handles.contains("sealed"));
    assert!(handles.contains("protected override bool ReleaseHandle()"));
    assert!(output.warnings.iter().all(|w| !w.contains("synthesizing")));
}

#[test]
fn test_non_partial_wrapper_is_a_contract_violation() {
    let config = target(vec![handle("lrtc_factory_release", "lrtc_factory_t*")]);
    let sources = managed("namespace LumenRTC;\ninternal sealed class FactoryHandle : SafeHandle { }\n");

    let err = run_codegen("lumenrtc", &idl(&config), &config, &sources).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::HandleContractViolation);
    let diagnostics = err.diagnostics().unwrap();
    assert!(diagnostics[0].contains("is not declared partial"));
    assert!(diagnostics[0].contains("bindings/FactoryHandle.cs:2"));
}

#[test]
fn test_wrong_accessibility_is_a_contract_violation() {
    let config = target(vec![handle("lrtc_factory_release", "lrtc_factory_t*")]);
    let sources = managed("namespace LumenRTC;\npublic partial class FactoryHandle : SafeHandle { }\n");

    let err = run_codegen("lumenrtc", &idl(&config), &config, &sources).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::HandleContractViolation);
    assert!(err
        .diagnostics()
        .unwrap()
        .iter()
        .any(|d| d.contains("is public, expected internal")));
}

#[test]
fn test_unknown_release_function_is_rejected_before_rendering() {
    let config = target(vec![handle("lrtc_factory_destroy", "lrtc_factory_t*")]);

    let err = run_codegen("lumenrtc", &idl(&config), &config, &[]).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::HandleContractViolation);
    assert_eq!(err.target(), Some("lumenrtc"));
    assert!(err
        .diagnostics()
        .unwrap()
        .iter()
        .any(|d| d.contains("release function 'lrtc_factory_destroy' is not in the IDL")));
}

#[test]
fn test_non_opaque_handle_type_is_rejected() {
    let config = target(vec![handle("lrtc_factory_release", "lrtc_config_t*")]);

    let err = run_codegen("lumenrtc", &idl(&config), &config, &[]).unwrap_err();

    let diagnostics = err.diagnostics().unwrap();
    assert!(diagnostics
        .iter()
        .any(|d| d.contains("'lrtc_config_t*' is not a declared opaque type")));
    assert!(diagnostics
        .iter()
        .any(|d| d.contains("first parameter of 'lrtc_factory_release'")));
}

#[test]
fn test_reference_to_excluded_function_fails_codegen() {
    let config = target(Vec::new());
    let sources = managed("namespace LumenRTC;\nstatic class Use { static void F() => NativeMethods.lrtc_bar(IntPtr.Zero); }\n");

    let err = run_codegen("lumenrtc", &idl(&config), &config, &sources).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::CodegenFailed);
    assert_eq!(
        err.diagnostics().unwrap(),
        &["NativeMethods.lrtc_bar is excluded from codegen".to_string()]
    );
}

#[test]
fn test_native_methods_cover_selected_functions_only() {
    let config = target(Vec::new());
    let output = run_codegen("lumenrtc", &idl(&config), &config, &[]).unwrap();

    let native = file(&output, "bindings/NativeMethods.g.cs");
    assert!(native.contains("internal static partial class NativeMethods"));
    assert!(native.contains("EntryPoint = \"lrtc_factory_create\""));
    assert!(native.contains("EntryPoint = \"lrtc_factory_release\""));
    assert!(!native.contains("lrtc_bar"));
}
