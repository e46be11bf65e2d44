//! Compile-time generator registry

use super::csharp::{CSharpHandles, CSharpInterop, CSharpNativeMethods};
use super::native::{ExportMap, NativeHeader};
use super::Generator;

/// Every generator, in the order they are documented
pub static GENERATORS: &[&dyn Generator] = &[
    &NativeHeader,
    &ExportMap,
    &CSharpInterop,
    &CSharpNativeMethods,
    &CSharpHandles,
];

pub fn lookup(name: &str) -> Option<&'static dyn Generator> {
    GENERATORS.iter().copied().find(|g| g.name() == name)
}

pub fn is_known(name: &str) -> bool {
    lookup(name).is_some()
}

/// Registered generator names
pub fn names() -> Vec<&'static str> {
    GENERATORS.iter().map(|g| g.name()).collect()
}
