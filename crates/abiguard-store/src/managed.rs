//! Managed-source discovery
//!
//! Each configured entry is a C# file or a directory walked recursively
//! for `*.cs` files. Generated files (`*.g.cs`) are skipped since they are
//! outputs, not hand-written wrappers.

use crate::errors::{io_error, Result};
use abiguard_core::codegen::ManagedSource;
use abiguard_core::errors::{ExError, ExErrorKind};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn is_hand_written_cs(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.ends_with(".cs") && !name.ends_with(".g.cs")
}

fn display_path(base_dir: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base_dir).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

/// Read the managed sources configured for a target
///
/// Missing entries are logged and skipped; wrappers they would have held
/// are then synthesized by codegen. Paths are reported relative to
/// `base_dir` with forward slashes, sorted for deterministic scans.
///
/// # Errors
///
/// Returns `Io` when a directory cannot be walked or a file cannot be read.
pub fn discover_managed_sources(base_dir: &Path, entries: &[String]) -> Result<Vec<ManagedSource>> {
    let mut files: BTreeSet<PathBuf> = BTreeSet::new();

    for entry in entries {
        let root = base_dir.join(entry);
        if root.is_file() {
            files.insert(root);
            continue;
        }
        if !root.is_dir() {
            tracing::warn!(managed_source = %entry, "managed source path does not exist; skipping");
            continue;
        }
        for item in WalkDir::new(&root).follow_links(false) {
            let item = item.map_err(|e| {
                ExError::new(ExErrorKind::Io)
                    .with_op("discover_managed_sources")
                    .with_path(root.display().to_string())
                    .with_message(e.to_string())
            })?;
            if item.file_type().is_file() && is_hand_written_cs(item.path()) {
                files.insert(item.into_path());
            }
        }
    }

    files
        .into_iter()
        .map(|path| {
            let text = fs::read_to_string(&path)
                .map_err(|e| io_error("read_managed_source", &path, e))?;
            Ok(ManagedSource {
                path: display_path(base_dir, &path),
                text,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generated_files_are_not_managed_sources() {
        assert!(is_hand_written_cs(Path::new("bindings/FactoryHandle.cs")));
        assert!(!is_hand_written_cs(Path::new("bindings/NativeMethods.g.cs")));
        assert!(!is_hand_written_cs(Path::new("bindings/README.md")));
    }

    #[test]
    fn test_directories_are_walked_in_sorted_order() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("bindings");
        fs::create_dir_all(root.join("Handles")).unwrap();
        fs::write(root.join("Handles").join("PeerHandle.cs"), "class PeerHandle {}").unwrap();
        fs::write(root.join("FactoryHandle.cs"), "class FactoryHandle {}").unwrap();
        fs::write(root.join("NativeMethods.g.cs"), "generated").unwrap();

        let sources = discover_managed_sources(dir.path(), &["bindings".to_string()]).unwrap();

        let paths: Vec<&str> = sources.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["bindings/FactoryHandle.cs", "bindings/Handles/PeerHandle.cs"]
        );
    }

    #[test]
    fn test_missing_entry_is_skipped() {
        let dir = TempDir::new().unwrap();
        let sources = discover_managed_sources(dir.path(), &["absent".to_string()]).unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_file_entry_is_read_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Wrapper.cs"), "partial class W {}").unwrap();

        let sources = discover_managed_sources(
            dir.path(),
            &["Wrapper.cs".to_string(), "Wrapper.cs".to_string()],
        )
        .unwrap();

        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].text, "partial class W {}");
    }
}
