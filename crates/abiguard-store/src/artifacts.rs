//! Idempotent artifact writes
//!
//! Generated files are only rewritten when their bytes change. In check
//! mode nothing is written; a difference is reported as drift together
//! with a unified diff of committed vs. freshly generated content.

use crate::atomic::atomic_write;
use crate::errors::{io_error, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

const CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    Write,
    /// Compare only; differences are drift
    Check,
    /// Compare only; differences are reported as pending writes
    DryRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Unchanged,
    Written,
    WouldWrite,
    Drifted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactOutcome {
    /// Path as configured (relative to the configuration directory)
    pub path: String,
    pub status: ArtifactStatus,
    /// Unified diff for `WouldWrite` and `Drifted`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

impl ArtifactOutcome {
    pub fn is_drift(&self) -> bool {
        self.status == ArtifactStatus::Drifted
    }
}

/// Read a file, treating a missing one as absent
///
/// # Errors
///
/// Returns `Io` for anything other than a missing file.
pub fn read_existing(operation: &str, path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(operation, path, e)),
    }
}

/// Decide what to do with `contents` given what is on disk
///
/// `same` says whether the existing text is equivalent to the new one; it
/// lets callers ignore fields such as timestamps.
///
/// # Errors
///
/// Returns `Io` when the existing file cannot be read or the write fails.
pub fn write_artifact_with(
    path: &Path,
    display: &str,
    contents: &str,
    mode: WriteMode,
    same: impl Fn(&str) -> bool,
) -> Result<ArtifactOutcome> {
    let existing = read_existing("write_artifact", path)?;
    if existing.as_deref().is_some_and(&same) {
        return Ok(ArtifactOutcome {
            path: display.to_string(),
            status: ArtifactStatus::Unchanged,
            diff: None,
        });
    }

    let old = existing.unwrap_or_default();
    let outcome = match mode {
        WriteMode::Write => {
            atomic_write(path, contents.as_bytes())?;
            let artifact = display;
            tracing::debug!(artifact = %artifact, "artifact written");
            ArtifactOutcome {
                path: display.to_string(),
                status: ArtifactStatus::Written,
                diff: None,
            }
        }
        WriteMode::Check => {
            let artifact = display;
            tracing::warn!(artifact = %artifact, "drift: committed artifact differs from generated output");
            ArtifactOutcome {
                path: display.to_string(),
                status: ArtifactStatus::Drifted,
                diff: Some(unified_diff(&old, contents, display, display)),
            }
        }
        WriteMode::DryRun => ArtifactOutcome {
            path: display.to_string(),
            status: ArtifactStatus::WouldWrite,
            diff: Some(unified_diff(&old, contents, display, display)),
        },
    };
    Ok(outcome)
}

/// Write `contents` unless the file already holds exactly these bytes
///
/// # Errors
///
/// Returns `Io` when the existing file cannot be read or the write fails.
pub fn write_artifact(
    path: &Path,
    display: &str,
    contents: &str,
    mode: WriteMode,
) -> Result<ArtifactOutcome> {
    write_artifact_with(path, display, contents, mode, |existing| existing == contents)
}

// ========== Line diff ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Keep(usize, usize),
    Delete(usize),
    Insert(usize),
}

/// Longest-common-subsequence edit script over lines
fn line_edits(old: &[&str], new: &[&str]) -> Vec<Edit> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let a = &old[prefix..old.len() - suffix];
    let b = &new[prefix..new.len() - suffix];

    // lcs[i * width + j] = LCS length of a[i..] and b[j..]
    let width = b.len() + 1;
    let mut lcs = vec![0u32; (a.len() + 1) * width];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i * width + j] = if a[i] == b[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut edits: Vec<Edit> = (0..prefix).map(|i| Edit::Keep(i, i)).collect();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            edits.push(Edit::Keep(prefix + i, prefix + j));
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            edits.push(Edit::Delete(prefix + i));
            i += 1;
        } else {
            edits.push(Edit::Insert(prefix + j));
            j += 1;
        }
    }
    edits.extend((i..a.len()).map(|i| Edit::Delete(prefix + i)));
    edits.extend((j..b.len()).map(|j| Edit::Insert(prefix + j)));
    edits.extend(
        (0..suffix).map(|k| Edit::Keep(old.len() - suffix + k, new.len() - suffix + k)),
    );
    edits
}

fn hunk_start(before: usize, count: usize) -> usize {
    if count == 0 {
        before
    } else {
        before + 1
    }
}

/// Unified diff of two texts with three lines of context
///
/// Returns an empty string when the texts have the same lines.
pub fn unified_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> String {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();
    let edits = line_edits(&a, &b);

    let changes: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, e)| !matches!(e, Edit::Keep(..)))
        .map(|(idx, _)| idx)
        .collect();
    if changes.is_empty() {
        return String::new();
    }

    let mut out = format!("--- {}\n+++ {}\n", old_label, new_label);
    let mut k = 0;
    while k < changes.len() {
        let start = changes[k].saturating_sub(CONTEXT);
        let mut end = changes[k];
        while k + 1 < changes.len() && changes[k + 1] <= end + 2 * CONTEXT + 1 {
            k += 1;
            end = changes[k];
        }
        let stop = (end + CONTEXT + 1).min(edits.len());
        let hunk = &edits[start..stop];

        let old_before = edits[..start]
            .iter()
            .filter(|e| !matches!(e, Edit::Insert(_)))
            .count();
        let new_before = edits[..start]
            .iter()
            .filter(|e| !matches!(e, Edit::Delete(_)))
            .count();
        let old_count = hunk.iter().filter(|e| !matches!(e, Edit::Insert(_))).count();
        let new_count = hunk.iter().filter(|e| !matches!(e, Edit::Delete(_))).count();

        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            hunk_start(old_before, old_count),
            old_count,
            hunk_start(new_before, new_count),
            new_count
        ));
        for edit in hunk {
            match *edit {
                Edit::Keep(i, _) => out.push_str(&format!(" {}\n", a[i])),
                Edit::Delete(i) => out.push_str(&format!("-{}\n", a[i])),
                Edit::Insert(j) => out.push_str(&format!("+{}\n", b[j])),
            }
        }
        k += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_identical_texts_have_no_diff() {
        assert_eq!(unified_diff("a\nb\n", "a\nb\n", "x", "x"), "");
    }

    #[test]
    fn test_single_line_change() {
        let diff = unified_diff("a\nb\nc\n", "a\nB\nc\n", "old.cs", "new.cs");
        assert_eq!(
            diff,
            "--- old.cs\n+++ new.cs\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n"
        );
    }

    #[test]
    fn test_new_file_diff_is_all_insertions() {
        let diff = unified_diff("", "x\ny\n", "f", "f");
        assert_eq!(diff, "--- f\n+++ f\n@@ -0,0 +1,2 @@\n+x\n+y\n");
    }

    #[test]
    fn test_distant_changes_make_separate_hunks() {
        let old: String = (1..=20).map(|i| format!("line{}\n", i)).collect();
        let new = old.replace("line2\n", "LINE2\n").replace("line18\n", "LINE18\n");

        let diff = unified_diff(&old, &new, "f", "f");

        assert_eq!(diff.matches("@@ -").count(), 2);
        assert!(diff.contains("@@ -1,5 +1,5 @@\n"));
        assert!(diff.contains("@@ -15,6 +15,6 @@\n"));
    }

    #[test]
    fn test_write_mode_skips_identical_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("NativeMethods.g.cs");

        let first = write_artifact(&path, "NativeMethods.g.cs", "class A {}\n", WriteMode::Write).unwrap();
        let second = write_artifact(&path, "NativeMethods.g.cs", "class A {}\n", WriteMode::Write).unwrap();

        assert_eq!(first.status, ArtifactStatus::Written);
        assert_eq!(second.status, ArtifactStatus::Unchanged);
    }

    #[test]
    fn test_check_mode_reports_drift_without_writing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("NativeMethods.g.cs");
        fs::write(&path, "class A {}\n").unwrap();

        let outcome = write_artifact(&path, "NativeMethods.g.cs", "class B {}\n", WriteMode::Check).unwrap();

        assert!(outcome.is_drift());
        assert!(outcome.diff.as_deref().unwrap().contains("-class A {}\n+class B {}\n"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "class A {}\n");
    }

    #[test]
    fn test_check_mode_treats_missing_file_as_drift() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.g.cs");

        let outcome = write_artifact(&path, "missing.g.cs", "x\n", WriteMode::Check).unwrap();

        assert_eq!(outcome.status, ArtifactStatus::Drifted);
        assert!(!path.exists());
    }

    #[test]
    fn test_dry_run_reports_pending_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.g.cs");

        let outcome = write_artifact(&path, "out.g.cs", "x\n", WriteMode::DryRun).unwrap();

        assert_eq!(outcome.status, ArtifactStatus::WouldWrite);
        assert!(!outcome.is_drift());
        assert!(!path.exists());
    }
}
