//! Avro compatibility enforcement at registration time (§4.2.1 step 6, §4.3).

use std::sync::Arc;

use schema_registry_core::model::{CompatibilityLevel, ConfigEntry, SchemaType};
use schema_registry_core::{InMemoryStorage, RegisterRequest, RegistryCore};

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
async fn backward_default_rejects_field_addition_without_default() {
    let core = core();
    core.register(req("events", r#"{"type":"record","name":"E","fields":[{"name":"a","type":"string"}]}"#))
        .await
        .unwrap();

    let err = core
        .register(req(
            "events",
            r#"{"type":"record","name":"E","fields":[{"name":"a","type":"string"},{"name":"b","type":"string"}]}"#,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, schema_registry_core::RegistryError::IncompatibleSchema(_)));
}

#[tokio::test]
async fn backward_accepts_field_addition_with_default() {
    let core = core();
    core.register(req("events", r#"{"type":"record","name":"E","fields":[{"name":"a","type":"string"}]}"#))
        .await
        .unwrap();

    let result = core
        .register(req(
            "events",
            r#"{"type":"record","name":"E","fields":[{"name":"a","type":"string"},{"name":"b","type":"string","default":"x"}]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(result.version, 2);
}

#[tokio::test]
async fn compatibility_none_allows_any_change() {
    let core = core();
    core.set_global_config(
        ".",
        ConfigEntry { compatibility_level: Some(CompatibilityLevel::None), ..Default::default() },
    )
    .await
    .unwrap();

    core.register(req("events", r#"{"type":"record","name":"E","fields":[{"name":"a","type":"string"}]}"#))
        .await
        .unwrap();
    let result = core.register(req("events", "\"long\"")).await.unwrap();
    assert_eq!(result.version, 2);
}

#[tokio::test]
async fn transitive_level_checks_every_prior_active_version() {
    let core = core();
    core.set_global_config(
        ".",
        ConfigEntry { compatibility_level: Some(CompatibilityLevel::FullTransitive), ..Default::default() },
    )
    .await
    .unwrap();

    core.register(req("events", r#"{"type":"record","name":"E","fields":[{"name":"a","type":"string"}]}"#))
        .await
        .unwrap();
    core.register(req(
        "events",
        r#"{"type":"record","name":"E","fields":[{"name":"a","type":"string"},{"name":"b","type":"string","default":"x"}]}"#,
    ))
    .await
    .unwrap();

    // Dropping the now-required-by-v1 field `a` altogether breaks FULL
    // compatibility against v1 even though it might pass against v2 alone.
    let err = core
        .register(req("events", r#"{"type":"record","name":"E","fields":[{"name":"b","type":"string","default":"x"}]}"#))
        .await
        .unwrap_err();
    assert!(matches!(err, schema_registry_core::RegistryError::IncompatibleSchema(_)));
}
