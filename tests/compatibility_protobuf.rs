//! Protobuf compatibility enforcement at registration time (§4.3).

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
        schema_type: SchemaType::Protobuf,
        schema_text: text.to_owned(),
        references: vec![],
        metadata: None,
        rule_set: None,
        normalize_query: None,
        explicit_id: None,
    }
}

#[tokio::test]
async fn adding_a_field_is_compatible() {
    let core = core();
    core.register(req("events", "syntax = \"proto3\"; message M { string a = 1; }")).await.unwrap();
    let result = core
        .register(req("events", "syntax = \"proto3\"; message M { string a = 1; int32 b = 2; }"))
        .await
        .unwrap();
    assert_eq!(result.version, 2);
}

#[tokio::test]
async fn changing_field_number_alone_is_compatible() {
    let core = core();
    core.register(req("events", "syntax = \"proto3\"; message M { string a = 1; }")).await.unwrap();
    let result = core.register(req("events", "syntax = \"proto3\"; message M { string a = 5; }")).await.unwrap();
    assert_eq!(result.version, 2);
}

#[tokio::test]
async fn scalar_type_change_across_wire_classes_is_incompatible() {
    let core = core();
    core.register(req("events", "syntax = \"proto3\"; message M { int32 a = 1; }")).await.unwrap();
    let err = core.register(req("events", "syntax = \"proto3\"; message M { string a = 1; }")).await.unwrap_err();
    assert!(matches!(err, schema_registry_core::RegistryError::IncompatibleSchema(_)));
}

#[tokio::test]
async fn removing_a_message_is_incompatible() {
    let core = core();
    core.register(req(
        "events",
        "syntax = \"proto3\"; message M { string a = 1; } message N { string b = 1; }",
    ))
    .await
    .unwrap();
    let err = core
        .register(req("events", "syntax = \"proto3\"; message M { string a = 1; }"))
        .await
        .unwrap_err();
    assert!(matches!(err, schema_registry_core::RegistryError::IncompatibleSchema(_)));
}
