//! C9 — import pipeline.
//!
//! Batch ingestion with caller-supplied ids, run as two passes so that
//! references within the same batch resolve regardless of item order (§9
//! "IMPORT mode semantics").

use std::sync::Arc;

use crate::error::RegistryError;
use crate::fingerprint::Fingerprint;
use crate::model::{Schema, SchemaReference, SchemaType, SubjectVersion};
use crate::parsers::{self, ParsedSchema};
use crate::storage::Storage;

#[derive(Debug, Clone)]
pub struct ImportItem {
    pub id: i64,
    pub subject: String,
    pub version: i32,
    pub schema: String,
    pub schema_type: SchemaType,
    pub references: Vec<SchemaReference>,
}

#[derive(Debug, Default, Clone)]
pub struct ImportOutcome {
    pub imported: i32,
    pub errors: i32,
    pub error_messages: Vec<String>,
}

/// Runs the batch to completion. A single malformed item never aborts the
/// rest (§4.8, §7 "Global commit-atomicity is per item, not per batch").
pub async fn import_batch(storage: &Arc<dyn Storage>, context: &str, items: Vec<ImportItem>) -> ImportOutcome {
    storage.ensure_context(context).await;
    let mut outcome = ImportOutcome::default();
    let mut accepted: Vec<(ImportItem, ParsedSchema)> = Vec::new();

    // Pass 1: parse each item ignoring its reference set and persist the
    // schema + version rows, so pass 2 can resolve references against
    // siblings imported earlier in the same call.
    for item in items {
        match parsers::parse(item.schema_type, &item.schema, &[]) {
            Ok(parsed) => {
                let canonical = parsed.canonicalize(false);
                let fingerprint = Fingerprint::compute(item.schema_type, &canonical, &item.references);

                // Check for a subject/version conflict before binding the id —
                // bind_explicit has side effects (advances next_id, claims the
                // fingerprint) that must not happen for an item we're about to
                // reject, or the id is left dangling with no backing schema row.
                if let Some(existing) = storage.get_version(context, &item.subject, item.version).await {
                    if existing.schema_id != item.id {
                        outcome.errors += 1;
                        outcome.error_messages.push(format!(
                            "{}/{} already exists with a different id",
                            item.subject, item.version
                        ));
                        continue;
                    }
                }

                let alloc = storage.id_allocator(context).await;
                if let Err(existing_fp) = alloc.bind_explicit(item.id, fingerprint) {
                    let _ = existing_fp;
                    outcome.errors += 1;
                    outcome.error_messages.push(format!("id {} already bound to a different fingerprint", item.id));
                    continue;
                }

                storage
                    .insert_schema(
                        context,
                        Schema {
                            id: item.id,
                            schema_type: item.schema_type,
                            canonical_text: canonical,
                            references: item.references.clone(),
                            metadata: None,
                            rule_set: None,
                        },
                    )
                    .await;

                storage.ensure_subject(context, &item.subject).await;
                let mut meta = storage.get_subject(context, &item.subject).await.unwrap_or_default();
                if item.version >= meta.next_version {
                    meta.next_version = item.version + 1;
                }
                storage.save_subject_meta(context, &item.subject, meta).await;

                storage
                    .insert_version(
                        context,
                        SubjectVersion {
                            subject: item.subject.clone(),
                            version: item.version,
                            schema_id: item.id,
                            deleted: false,
                            permanently_deleted: false,
                            metadata: None,
                            rule_set: None,
                        },
                    )
                    .await;
                storage.add_schema_referrer(context, item.id, &item.subject, item.version).await;

                accepted.push((item, parsed));
                outcome.imported += 1;
            }
            Err(e) => {
                outcome.errors += 1;
                outcome.error_messages.push(format!("{}/{}: {e}", item.subject, item.version));
            }
        }
    }

    // Pass 2: materialize reference edges now every sibling in the batch exists.
    for (item, _parsed) in &accepted {
        for r in &item.references {
            storage.add_reference_edge(context, &item.subject, item.version, &r.subject, r.version).await;
        }
    }

    outcome
}

pub fn parse_error_to_message(err: RegistryError) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    #[tokio::test]
    async fn imports_independent_items() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let items = vec![
            ImportItem { id: 50000, subject: "a".into(), version: 1, schema: "\"string\"".into(), schema_type: SchemaType::Avro, references: vec![] },
            ImportItem { id: 50001, subject: "b".into(), version: 1, schema: "\"long\"".into(), schema_type: SchemaType::Avro, references: vec![] },
        ];
        let outcome = import_batch(&storage, ".", items).await;
        assert_eq!(outcome.imported, 2);
        assert_eq!(outcome.errors, 0);
    }

    #[tokio::test]
    async fn conflicting_id_is_counted_as_error_without_aborting_batch() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let items = vec![
            ImportItem { id: 1, subject: "a".into(), version: 1, schema: "\"string\"".into(), schema_type: SchemaType::Avro, references: vec![] },
            ImportItem { id: 1, subject: "b".into(), version: 1, schema: "\"long\"".into(), schema_type: SchemaType::Avro, references: vec![] },
            ImportItem { id: 2, subject: "c".into(), version: 1, schema: "\"int\"".into(), schema_type: SchemaType::Avro, references: vec![] },
        ];
        let outcome = import_batch(&storage, ".", items).await;
        assert_eq!(outcome.imported, 2);
        assert_eq!(outcome.errors, 1);
    }

    #[tokio::test]
    async fn advances_next_id_past_imported_id() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let items = vec![ImportItem { id: 50000, subject: "a".into(), version: 1, schema: "\"string\"".into(), schema_type: SchemaType::Avro, references: vec![] }];
        import_batch(&storage, ".", items).await;
        let alloc = storage.id_allocator(".").await;
        assert!(alloc.peek_next() > 50000);
    }
}
