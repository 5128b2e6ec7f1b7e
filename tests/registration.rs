//! End-to-end registration behavior (§4.2.1, §4.2.2) against the in-memory
//! storage backend, exercised through the public `RegistryCore` API only.

use std::sync::Arc;

use schema_registry_core::model::SchemaType;
use schema_registry_core::{InMemoryStorage, RegisterRequest, RegistryCore, VersionLookup};

fn core() -> RegistryCore {
    RegistryCore::new(Arc::new(InMemoryStorage::new()))
}

fn req(subject: &str, text: &str) -> RegisterRequest {
    RegisterRequest {
        context: ".".to_owned(),
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
async fn version_numbers_increment_per_subject() {
    let core = core();
    let v1 = core.register(req("events", "\"string\"")).await.unwrap();
    let v2 = core
        .register(req("events", r#"{"type":"record","name":"E","fields":[{"name":"a","type":"string","default":""}]}"#))
        .await
        .unwrap();
    assert_eq!(v1.version, 1);
    assert_eq!(v2.version, 2);
    assert_ne!(v1.id, v2.id);
}

#[tokio::test]
async fn lookup_schema_under_subject_finds_existing_version() {
    let core = core();
    let registered = core.register(req("events", "\"string\"")).await.unwrap();
    let found = core
        .lookup_schema_under_subject(".", "events", SchemaType::Avro, "\"string\"", &[], false, None)
        .await
        .unwrap();
    assert_eq!(found.version, registered.version);
    assert_eq!(found.schema_id, registered.id);
}

#[tokio::test]
async fn lookup_schema_not_registered_under_subject_is_not_found() {
    let core = core();
    core.register(req("events", "\"string\"")).await.unwrap();
    let err = core
        .lookup_schema_under_subject(".", "events", SchemaType::Avro, "\"long\"", &[], false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, schema_registry_core::RegistryError::SchemaNotFound(_)));
}

#[tokio::test]
async fn latest_resolves_to_highest_active_version() {
    let core = core();
    core.register(req("events", "\"string\"")).await.unwrap();
    core.register(req("events", "\"long\"")).await.unwrap();
    let latest = core.get_version(".", "events", VersionLookup::Latest, false).await.unwrap();
    assert_eq!(latest.version, 2);
}

#[tokio::test]
async fn unknown_subject_is_not_found() {
    let core = core();
    let err = core.get_version(".", "missing", VersionLookup::Latest, false).await.unwrap_err();
    assert!(matches!(err, schema_registry_core::RegistryError::SubjectNotFound(_)));
}

#[tokio::test]
async fn listing_subjects_excludes_fully_deleted_subjects_by_default() {
    let core = core();
    core.register(req("a", "\"string\"")).await.unwrap();
    core.register(req("b", "\"string\"")).await.unwrap();
    core.soft_delete_subject(".", "b").await.unwrap();

    let visible = core.list_subjects(".", None, false, false).await.unwrap();
    assert_eq!(visible, vec!["a".to_owned()]);

    let with_deleted = core.list_subjects(".", None, true, false).await.unwrap();
    assert_eq!(with_deleted, vec!["a".to_owned(), "b".to_owned()]);
}
