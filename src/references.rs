//! C4 — reference resolver.
//!
//! Builds and walks the reference graph, enforces acyclicity at registration
//! time (§9 Design Notes) and referential integrity on delete (I5, §4.2.3).

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use crate::error::{RegistryError, Result};
use crate::model::{Schema, SchemaReference, SchemaType};
use crate::parsers::ResolvedReference;
use crate::storage::Storage;

/// Resolves each declared reference to an existing, non-soft-deleted version
/// in the same context (unless `allow_soft_deleted` is set for IMPORT mode,
/// §9 "IMPORT mode semantics"). Returns the resolved schema text and type for
/// each so parsers can splice them into their namespace.
pub async fn resolve<'a>(
    storage: &dyn Storage,
    context: &str,
    references: &'a [SchemaReference],
    allow_soft_deleted: bool,
) -> Result<Vec<(SchemaReference, Schema)>> {
    let mut resolved = Vec::with_capacity(references.len());
    for r in references {
        let version = storage
            .get_version(context, &r.subject, r.version)
            .await
            .ok_or_else(|| {
                RegistryError::InvalidSchema(format!(
                    "reference {} -> {}/{} does not resolve",
                    r.name, r.subject, r.version
                ))
            })?;
        if version.permanently_deleted || (version.deleted && !allow_soft_deleted) {
            return Err(RegistryError::InvalidSchema(format!(
                "reference {} -> {}/{} is deleted",
                r.name, r.subject, r.version
            )));
        }
        let schema = storage
            .get_schema_by_id(context, version.schema_id)
            .await
            .ok_or_else(|| RegistryError::InvalidSchema(format!("reference {} schema missing", r.name)))?;
        resolved.push((r.clone(), schema));
    }
    Ok(resolved)
}

/// Converts resolved references into the parser-facing borrow type.
pub fn as_parser_refs(resolved: &[(SchemaReference, Schema)]) -> Vec<ResolvedReference<'_>> {
    resolved
        .iter()
        .map(|(r, schema)| ResolvedReference {
            reference: r,
            canonical_text: schema.canonical_text.as_str(),
            schema_type: schema.schema_type,
        })
        .collect()
}

/// BFS from the new version's reference set, looking for a path back to
/// `(subject, None)` — i.e. a cycle through the context's reference graph.
/// `new_subject` is the subject the version-to-be is registered under; a
/// back-edge means some transitively-referenced version itself references
/// (directly or transitively) a version of `new_subject`.
pub async fn check_acyclic(storage: &dyn Storage, context: &str, new_subject: &str, references: &[SchemaReference]) -> Result<()> {
    let mut visited: BTreeSet<(String, i32)> = BTreeSet::new();
    let mut queue: VecDeque<(String, i32)> = references.iter().map(|r| (r.subject.clone(), r.version)).collect();

    while let Some((subject, version)) = queue.pop_front() {
        if subject == new_subject {
            return Err(RegistryError::InvalidSchema(format!(
                "reference graph cycle detected through {subject}/{version}"
            )));
        }
        if !visited.insert((subject.clone(), version)) {
            continue;
        }
        if let Some(v) = storage.get_version(context, &subject, version).await {
            if let Some(schema) = storage.get_schema_by_id(context, v.schema_id).await {
                for r in &schema.references {
                    queue.push_back((r.subject.clone(), r.version));
                }
            }
        }
    }
    Ok(())
}

/// Enforces I5: no active version may be soft-deleted while any
/// non-permanently-deleted version in the context still references it.
pub async fn assert_no_active_referrers(storage: &dyn Storage, context: &str, subject: &str, version: i32) -> Result<()> {
    let referrers = storage.referenced_by(context, subject, version).await;
    let mut live = Vec::new();
    for (s, v) in referrers {
        if let Some(version_row) = storage.get_version(context, &s, v).await {
            if version_row.is_live() {
                live.push(format!("{s}/{v}"));
            }
        }
    }
    if !live.is_empty() {
        return Err(RegistryError::ReferenceIntegrityViolation(format!(
            "{subject}/{version} is still referenced by: {}",
            live.join(", ")
        )));
    }
    Ok(())
}

/// Materializes the reference edges for a newly-persisted version.
pub async fn materialize_edges(storage: &Arc<dyn Storage>, context: &str, subject: &str, version: i32, references: &[SchemaReference]) {
    for r in references {
        storage.add_reference_edge(context, subject, version, &r.subject, r.version).await;
    }
}

pub fn validate_schema_type_consistency(schema_type: SchemaType, resolved: &[(SchemaReference, Schema)]) -> Result<()> {
    for (r, schema) in resolved {
        if schema.schema_type != schema_type {
            return Err(RegistryError::InvalidSchema(format!(
                "reference {} is {:?} but the referring schema is {:?}",
                r.name, schema.schema_type, schema_type
            )));
        }
    }
    Ok(())
}
