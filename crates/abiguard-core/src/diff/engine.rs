//! Diff computation engine.
//!
//! The core entry point is [`compute_diff`], which compares a baseline and a
//! current [`AbiSnapshot`] and produces a [`DiffResult`].

use crate::diff::model::{
    ChangeKind, ChangeRecord, DiffResult, DiffSummary, Scope, Severity, DIFF_SCHEMA_VERSION,
};
use crate::errors::{ExError, ExErrorKind, Result};
use crate::model::{AbiSnapshot, EnumMember, EnumType, StructField, StructType};
use std::collections::{BTreeMap, BTreeSet};

/// Classification options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    /// Appending fields at the end of a struct is breaking unless this is false
    pub struct_tail_addition_is_breaking: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            struct_tail_addition_is_breaking: true,
        }
    }
}

/// Compare two snapshots.
///
/// Names present on both sides with an identical declaration produce no
/// record, so a symbol removed and re-added with the same signature nets out.
pub fn compute_diff(
    baseline: &AbiSnapshot,
    current: &AbiSnapshot,
    options: &DiffOptions,
) -> DiffResult {
    let mut records = Vec::new();

    diff_functions(baseline, current, &mut records);
    diff_enums(&baseline.enums, &current.enums, &mut records);
    diff_structs(&baseline.structs, &current.structs, options, &mut records);
    diff_opaque_types(&baseline.opaque_types, &current.opaque_types, &mut records);
    diff_callbacks(baseline, current, &mut records);

    if baseline.version != current.version {
        let severity = if current.version < baseline.version {
            Severity::Breaking
        } else {
            Severity::None
        };
        records.push(
            ChangeRecord::new(ChangeKind::VersionMismatch, Scope::Version, "abi_version", severity)
                .with_before(baseline.version.to_string())
                .with_after(current.version.to_string()),
        );
    }

    records.sort();
    records.dedup();

    let summary = summarize(&records);
    let classification = records
        .iter()
        .map(|r| r.severity)
        .max()
        .unwrap_or(Severity::None);

    DiffResult {
        diff_schema_version: DIFF_SCHEMA_VERSION,
        baseline_version: baseline.version,
        current_version: current.version,
        classification,
        summary,
        records,
    }
}

fn summarize(records: &[ChangeRecord]) -> DiffSummary {
    let mut summary = DiffSummary {
        total: records.len(),
        ..DiffSummary::default()
    };
    for record in records {
        match record.severity {
            Severity::Breaking => summary.breaking += 1,
            Severity::Additive => summary.additive += 1,
            Severity::None => summary.none += 1,
        }
    }
    summary
}

/// Added/removed records for a keyed collection
fn set_changes<'a>(
    scope: Scope,
    before: impl Iterator<Item = &'a String>,
    after: impl Iterator<Item = &'a String>,
    render: impl Fn(&str, bool) -> Option<String>,
    out: &mut Vec<ChangeRecord>,
) -> BTreeSet<&'a String> {
    let before: BTreeSet<&String> = before.collect();
    let after: BTreeSet<&String> = after.collect();

    for name in before.difference(&after) {
        let mut record = ChangeRecord::new(ChangeKind::SymbolRemoved, scope, *name, Severity::Breaking);
        record.before = render(name, true);
        out.push(record);
    }
    for name in after.difference(&before) {
        let mut record = ChangeRecord::new(ChangeKind::SymbolAdded, scope, *name, Severity::Additive);
        record.after = render(name, false);
        out.push(record);
    }
    before.intersection(&after).copied().collect()
}

fn diff_functions(baseline: &AbiSnapshot, current: &AbiSnapshot, out: &mut Vec<ChangeRecord>) {
    let common = set_changes(
        Scope::Function,
        baseline.functions.keys(),
        current.functions.keys(),
        |name, from_baseline| {
            let side = if from_baseline { baseline } else { current };
            side.functions.get(name).map(|s| s.signature())
        },
        out,
    );
    for name in common {
        let (Some(before), Some(after)) = (baseline.functions.get(name), current.functions.get(name))
        else {
            continue;
        };
        if !before.same_signature(after) {
            out.push(
                ChangeRecord::new(ChangeKind::ParamChanged, Scope::Function, name, Severity::Breaking)
                    .with_before(before.signature())
                    .with_after(after.signature()),
            );
        }
    }
}

fn diff_callbacks(baseline: &AbiSnapshot, current: &AbiSnapshot, out: &mut Vec<ChangeRecord>) {
    let common = set_changes(
        Scope::Callback,
        baseline.callbacks.keys(),
        current.callbacks.keys(),
        |name, from_baseline| {
            let side = if from_baseline { baseline } else { current };
            side.callbacks.get(name).map(|c| c.declaration.clone())
        },
        out,
    );
    for name in common {
        let (Some(before), Some(after)) = (baseline.callbacks.get(name), current.callbacks.get(name))
        else {
            continue;
        };
        let same = before.return_type == after.return_type && before.parameters == after.parameters;
        if !same {
            out.push(
                ChangeRecord::new(ChangeKind::ParamChanged, Scope::Callback, name, Severity::Breaking)
                    .with_before(before.declaration.clone())
                    .with_after(after.declaration.clone()),
            );
        }
    }
}

fn diff_opaque_types(
    baseline: &BTreeSet<String>,
    current: &BTreeSet<String>,
    out: &mut Vec<ChangeRecord>,
) {
    set_changes(
        Scope::OpaqueType,
        baseline.iter(),
        current.iter(),
        |_, _| None,
        out,
    );
}

/// Resolved values compare numerically; otherwise the declared text decides.
fn member_changed(before: &EnumMember, after: &EnumMember) -> bool {
    match (before.value, after.value) {
        (Some(a), Some(b)) => a != b,
        _ => (before.value, &before.value_expr) != (after.value, &after.value_expr),
    }
}

fn diff_enums(
    baseline: &BTreeMap<String, EnumType>,
    current: &BTreeMap<String, EnumType>,
    out: &mut Vec<ChangeRecord>,
) {
    let common = set_changes(
        Scope::Enum,
        baseline.keys(),
        current.keys(),
        |name, _| Some(format!("enum {}", name)),
        out,
    );
    for name in common {
        let (Some(before), Some(after)) = (baseline.get(name), current.get(name)) else {
            continue;
        };
        let before_members: BTreeMap<&str, &EnumMember> =
            before.members.iter().map(|m| (m.name.as_str(), m)).collect();
        let after_members: BTreeMap<&str, &EnumMember> =
            after.members.iter().map(|m| (m.name.as_str(), m)).collect();

        for (member, value) in &before_members {
            let subject = format!("{}.{}", name, member);
            match after_members.get(member) {
                None => out.push(
                    ChangeRecord::new(ChangeKind::EnumMemberRemoved, Scope::Enum, subject, Severity::Breaking)
                        .with_before(value.describe_value()),
                ),
                Some(new_value) if member_changed(value, new_value) => out.push(
                    ChangeRecord::new(ChangeKind::EnumMemberChanged, Scope::Enum, subject, Severity::Breaking)
                        .with_before(value.describe_value())
                        .with_after(new_value.describe_value()),
                ),
                Some(_) => {}
            }
        }
        for (member, value) in &after_members {
            if !before_members.contains_key(member) {
                out.push(
                    ChangeRecord::new(
                        ChangeKind::EnumMemberAdded,
                        Scope::Enum,
                        format!("{}.{}", name, member),
                        Severity::Additive,
                    )
                    .with_after(value.describe_value()),
                );
            }
        }
    }
}

fn field_names(fields: &[StructField]) -> String {
    fields
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn diff_struct(
    name: &str,
    before: &StructType,
    after: &StructType,
    options: &DiffOptions,
    out: &mut Vec<ChangeRecord>,
) {
    if before.fields == after.fields {
        return;
    }

    let before_names: BTreeSet<&str> = before.fields.iter().map(|f| f.name.as_str()).collect();
    let after_names: BTreeSet<&str> = after.fields.iter().map(|f| f.name.as_str()).collect();
    let base_is_prefix = after.fields.len() >= before.fields.len()
        && after.fields[..before.fields.len()] == before.fields[..];

    for field in &before.fields {
        if !after_names.contains(field.name.as_str()) {
            out.push(
                ChangeRecord::new(
                    ChangeKind::StructFieldRemoved,
                    Scope::Struct,
                    format!("{}.{}", name, field.name),
                    Severity::Breaking,
                )
                .with_before(field.declaration.clone()),
            );
        }
    }

    for (index, field) in after.fields.iter().enumerate() {
        if before_names.contains(field.name.as_str()) {
            continue;
        }
        let in_tail = base_is_prefix && index >= before.fields.len();
        let severity = if in_tail && !options.struct_tail_addition_is_breaking {
            Severity::Additive
        } else {
            Severity::Breaking
        };
        out.push(
            ChangeRecord::new(
                ChangeKind::StructFieldAdded,
                Scope::Struct,
                format!("{}.{}", name, field.name),
                severity,
            )
            .with_after(field.declaration.clone()),
        );
    }

    for old in &before.fields {
        let Some(new) = after.fields.iter().find(|f| f.name == old.name) else {
            continue;
        };
        if old.layout_key() != new.layout_key() {
            out.push(
                ChangeRecord::new(
                    ChangeKind::StructFieldRetyped,
                    Scope::Struct,
                    format!("{}.{}", name, old.name),
                    Severity::Breaking,
                )
                .with_before(old.declaration.clone())
                .with_after(new.declaration.clone()),
            );
        }
    }

    // Relative order of the fields both sides share
    let shared_before: Vec<&StructField> = before
        .fields
        .iter()
        .filter(|f| after_names.contains(f.name.as_str()))
        .collect();
    let shared_after: Vec<&StructField> = after
        .fields
        .iter()
        .filter(|f| before_names.contains(f.name.as_str()))
        .collect();
    let reordered = shared_before
        .iter()
        .zip(&shared_after)
        .any(|(a, b)| a.name != b.name);
    if reordered {
        let render = |fields: &[&StructField]| {
            fields
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        out.push(
            ChangeRecord::new(ChangeKind::StructFieldReordered, Scope::Struct, name, Severity::Breaking)
                .with_before(render(shared_before.as_slice()))
                .with_after(render(shared_after.as_slice())),
        );
    }
}

fn diff_structs(
    baseline: &BTreeMap<String, StructType>,
    current: &BTreeMap<String, StructType>,
    options: &DiffOptions,
    out: &mut Vec<ChangeRecord>,
) {
    let common = set_changes(
        Scope::Struct,
        baseline.keys(),
        current.keys(),
        |name, from_baseline| {
            let side = if from_baseline { baseline } else { current };
            side.get(name)
                .map(|s| format!("struct {} {{ {} }}", name, field_names(&s.fields)))
        },
        out,
    );
    for name in common {
        if let (Some(before), Some(after)) = (baseline.get(name), current.get(name)) {
            diff_struct(name, before, after, options, out);
        }
    }
}

/// Re-encode the diff and require a stable round trip
///
/// # Errors
///
/// `DeterminismViolation` when the encodings differ.
pub fn ensure_diff_deterministic(diff: &DiffResult) -> Result<()> {
    let first = serde_json::to_string(diff)?;
    let reparsed: DiffResult = serde_json::from_str(&first)?;
    let second = serde_json::to_string(&reparsed)?;
    if first != second {
        return Err(ExError::new(ExErrorKind::DeterminismViolation)
            .with_op("compute_diff")
            .with_message("diff encoding is not stable across a round trip"));
    }
    Ok(())
}
