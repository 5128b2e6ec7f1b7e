//! Soft-delete / permanent-delete lifecycle and referential integrity
//! (§4.2.3–§4.2.6, invariant I5).

use std::sync::Arc;

use schema_registry_core::model::{SchemaReference, SchemaType};
use schema_registry_core::{InMemoryStorage, RegisterRequest, RegistryCore, RegistryError, VersionLookup};

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
async fn soft_delete_then_permanent_delete_succeeds_in_order() {
    let core = core();
    core.register(req("events", "\"string\"")).await.unwrap();
    core.soft_delete_version(".", "events", 1).await.unwrap();
    core.permanent_delete_version(".", "events", 1).await.unwrap();

    let err = core.get_version(".", "events", VersionLookup::Number(1), true).await.unwrap_err();
    assert!(matches!(err, RegistryError::VersionNotFound { .. }));
}

#[tokio::test]
async fn permanent_delete_without_prior_soft_delete_is_rejected() {
    let core = core();
    core.register(req("events", "\"string\"")).await.unwrap();
    let err = core.permanent_delete_version(".", "events", 1).await.unwrap_err();
    assert!(matches!(err, RegistryError::VersionNotSoftDeleted { .. }));
}

#[tokio::test]
async fn soft_delete_blocked_while_an_active_version_still_references_it() {
    let core = core();
    core.register(req("address", "\"string\"")).await.unwrap();

    let mut order = req("order", "\"string\"");
    order.references = vec![SchemaReference { name: "Address".into(), subject: "address".into(), version: 1 }];
    core.register(order).await.unwrap();

    let err = core.soft_delete_version(".", "address", 1).await.unwrap_err();
    assert!(matches!(err, RegistryError::ReferenceIntegrityViolation(_)));

    // Once the referrer is gone, the soft-delete the referenced version succeeds.
    core.soft_delete_version(".", "order", 1).await.unwrap();
    core.permanent_delete_version(".", "order", 1).await.unwrap();
    core.soft_delete_version(".", "address", 1).await.unwrap();
}

#[tokio::test]
async fn soft_delete_then_permanent_delete_subject_in_order() {
    let core = core();
    core.register(req("events", "\"string\"")).await.unwrap();
    core.register(req("events", "\"long\"")).await.unwrap();

    let affected = core.soft_delete_subject(".", "events").await.unwrap();
    assert_eq!(affected.len(), 2);

    let removed = core.permanent_delete_subject(".", "events").await.unwrap();
    assert_eq!(removed.len(), 2);

    let err = core.get_version(".", "events", VersionLookup::Latest, true).await.unwrap_err();
    assert!(matches!(err, RegistryError::SubjectNotFound(_)));
}

#[tokio::test]
async fn permanent_delete_subject_without_prior_soft_delete_is_rejected() {
    let core = core();
    core.register(req("events", "\"string\"")).await.unwrap();
    let err = core.permanent_delete_subject(".", "events").await.unwrap_err();
    assert!(matches!(err, RegistryError::SubjectNotSoftDeleted(_)));
}

#[tokio::test]
async fn referenced_by_survives_permanent_deletion_of_the_originally_referenced_sibling() {
    let core = core();
    core.register(req("s1", "\"string\"")).await.unwrap();
    core.register(req("s2", "\"string\"")).await.unwrap();

    let mut consumer = req("consumer", "\"long\"");
    consumer.references = vec![SchemaReference { name: "Shared".into(), subject: "s1".into(), version: 1 }];
    let consumer = core.register(consumer).await.unwrap();

    core.soft_delete_subject(".", "s1").await.unwrap();
    core.permanent_delete_subject(".", "s1").await.unwrap();

    let referrers = core.referenced_by(".", "s2", 1).await.unwrap();
    assert_eq!(referrers, vec![consumer.id]);
}

#[tokio::test]
async fn permanent_delete_of_one_sibling_leaves_shared_schema_id_resolvable_via_the_other() {
    let core = core();
    let a = core.register(req("s1", "\"string\"")).await.unwrap();
    core.register(req("s2", "\"string\"")).await.unwrap();

    core.soft_delete_version(".", "s1", 1).await.unwrap();
    core.permanent_delete_version(".", "s1", 1).await.unwrap();

    let schema = core.get_schema_by_id(".", a.id).await.unwrap();
    assert_eq!(schema.id, a.id);
}
