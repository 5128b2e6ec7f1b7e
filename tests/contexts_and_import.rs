//! Context isolation (§4.7) and the batch IMPORT pipeline (§4.8, §9 "IMPORT
//! mode semantics").

use std::sync::Arc;

use schema_registry_core::context_router;
use schema_registry_core::import::{self, ImportItem};
use schema_registry_core::model::SchemaType;
use schema_registry_core::storage::Storage;
use schema_registry_core::{InMemoryStorage, RegisterRequest, RegistryCore};

fn req(context: &str, subject: &str, text: &str) -> RegisterRequest {
    RegisterRequest {
        context: context.to_owned(),
        subject: subject.to_owned(),
        schema_type: SchemaType::Avro,
        schema_text: text.to_owned(),
        references: vec![],
        metadata: None,
        rule_set: None,
        normalize_query: None,
        explicit_id: None,
    }
}

#[tokio::test]
async fn same_subject_name_in_two_contexts_allocates_independent_ids() {
    let core = RegistryCore::new(Arc::new(InMemoryStorage::new()));
    let default_ctx = core.register(req(".", "events", "\"string\"")).await.unwrap();
    let tenant_ctx = core.register(req(".tenant-a", "events", "\"string\"")).await.unwrap();

    assert_eq!(default_ctx.id, 1);
    assert_eq!(tenant_ctx.id, 1);

    let contexts = core.list_contexts().await;
    assert!(contexts.contains(&".tenant-a".to_owned()));
}

#[tokio::test]
async fn qualified_subject_routes_to_the_right_context() {
    let routed = context_router::parse_qualified_subject(":.tenant-a:events").unwrap();
    assert_eq!(routed.context.as_str(), ".tenant-a");
    assert_eq!(routed.subject, "events");

    let wire = context_router::qualify(&routed.context, &routed.subject);
    assert_eq!(wire, ":.tenant-a:events");
}

#[tokio::test]
async fn import_batch_accepts_explicit_ids_out_of_subject_order() {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let items = vec![
        ImportItem { id: 100, subject: "a".into(), version: 3, schema: "\"string\"".into(), schema_type: SchemaType::Avro, references: vec![] },
        ImportItem { id: 99, subject: "a".into(), version: 1, schema: "\"long\"".into(), schema_type: SchemaType::Avro, references: vec![] },
    ];
    let outcome = import::import_batch(&storage, ".", items).await;
    assert_eq!(outcome.imported, 2);
    assert_eq!(outcome.errors, 0);

    let core = RegistryCore::new(storage);
    let schema = core.get_schema_by_id(".", 100).await.unwrap();
    assert_eq!(schema.canonical_text, "\"string\"");
}

#[tokio::test]
async fn import_batch_resolves_cross_item_references_regardless_of_order() {
    use schema_registry_core::model::SchemaReference;

    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let items = vec![
        ImportItem {
            id: 2,
            subject: "order".into(),
            version: 1,
            schema: "\"string\"".into(),
            schema_type: SchemaType::Avro,
            references: vec![SchemaReference { name: "Address".into(), subject: "address".into(), version: 1 }],
        },
        ImportItem {
            id: 1,
            subject: "address".into(),
            version: 1,
            schema: "\"string\"".into(),
            schema_type: SchemaType::Avro,
            references: vec![],
        },
    ];
    let outcome = import::import_batch(&storage, ".", items).await;
    assert_eq!(outcome.imported, 2);
    assert_eq!(outcome.errors, 0);

    let referenced_by = storage.referenced_by(".", "address", 1).await;
    assert_eq!(referenced_by, vec![("order".to_owned(), 1)]);
}
