//! JSON Schema compatibility enforcement at registration time (§4.3).

use std::sync::Arc;

use schema_registry_core::model::SchemaType;
use schema_registry_core::{InMemoryStorage, RegisterRequest, RegistryCore};

fn core() -> RegistryCore {
    RegistryCore::new(Arc::new(InMemoryStorage::new()))
}

fn req(subject: &str, text: &str) -> RegisterRequest {
    RegisterRequest {
        context: ".".to_owned(),
        subject: subject.to_owned(),
        schema_type: SchemaType::Json,
        schema_text: text.to_owned(),
        references: vec![],
        metadata: None,
        rule_set: None,
        normalize_query: None,
        explicit_id: None,
    }
}

#[tokio::test]
async fn adding_open_property_on_open_writer_is_rejected_by_default() {
    let core = core();
    core.register(req("events", r#"{"type":"object","properties":{"a":{"type":"integer"}}}"#)).await.unwrap();

    let err = core
        .register(req(
            "events",
            r#"{"type":"object","properties":{"a":{"type":"integer"},"b":{"type":"integer"}}}"#,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, schema_registry_core::RegistryError::IncompatibleSchema(_)));
}

#[tokio::test]
async fn adding_property_on_closed_writer_is_accepted() {
    let core = core();
    core.register(req(
        "events",
        r#"{"type":"object","additionalProperties":false,"properties":{"a":{"type":"integer"}}}"#,
    ))
    .await
    .unwrap();

    let result = core
        .register(req(
            "events",
            r#"{"type":"object","properties":{"a":{"type":"integer"},"b":{"type":"integer"}}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(result.version, 2);
}

#[tokio::test]
async fn new_required_field_without_default_is_rejected() {
    let core = core();
    core.register(req("events", r#"{"type":"object","properties":{"a":{"type":"string"}},"required":["a"]}"#))
        .await
        .unwrap();

    let err = core
        .register(req(
            "events",
            r#"{"type":"object","properties":{"a":{"type":"string"},"b":{"type":"string"}},"required":["a","b"]}"#,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, schema_registry_core::RegistryError::IncompatibleSchema(_)));
}

#[tokio::test]
async fn dangling_internal_ref_is_rejected_as_invalid_schema() {
    let core = core();
    let err = core
        .register(req("events", r##"{"type":"object","properties":{"id":{"$ref":"#/$defs/Missing"}}}"##))
        .await
        .unwrap_err();
    assert!(matches!(err, schema_registry_core::RegistryError::InvalidSchema(_)));
}
