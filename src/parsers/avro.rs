//! Avro parser/canonicalizer (C1).
//!
//! We parse and canonicalize over `serde_json::Value` directly rather than
//! `avro_rs::Schema`'s own type graph, because the canonical form this
//! registry needs (fully-qualified names, field order *preserved*, defaults
//! kept) is close to but not identical with the Avro Parsing Canonical Form
//! `avro_rs` would give us. We still run every schema through
//! `avro_rs::Schema::parse_str` first — that's the validation pass (named
//! type resolution, alias checks) the teacher crate already depended on
//! `avro_rs` for.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::model::SchemaType;

use super::{invalid, ResolvedReference};

#[derive(Debug, Clone, PartialEq)]
pub struct AvroSchema {
    /// The schema after reference splicing and name qualification, still
    /// field-order-preserving.
    pub value: Value,
}

impl AvroSchema {
    pub fn canonicalize(&self, normalize: bool) -> String {
        let mut v = self.value.clone();
        qualify_names(&mut v, "");
        if normalize {
            sort_record_fields(&mut v);
        }
        serialize_canonical(&v)
    }
}

/// Parses `text`, splices `references` into the named-type namespace, and
/// validates via `avro_rs`. Recursive self-references and every primitive/
/// complex Avro type are accepted because we delegate validation to
/// `avro_rs`, which already implements the Avro spec's type-resolution rules.
pub fn parse(text: &str, references: &[ResolvedReference<'_>]) -> Result<AvroSchema> {
    let mut value: Value = serde_json::from_str(text).map_err(|e| invalid(format!("invalid JSON: {e}")))?;

    // Splice named types declared by references into scope. Confluent does
    // this by prepending referenced type definitions so they're resolvable
    // when the main schema names them; we model it the same way by wrapping
    // the root into a union-of-definitions when there are any, purely for
    // validation, then discard the wrapper and keep only the original root
    // for the canonical form (references don't change a schema's own text,
    // only what names it's allowed to use).
    let mut named_type_defs: Vec<Value> = Vec::new();
    for r in references {
        if r.schema_type != SchemaType::Avro {
            return Err(invalid(format!(
                "reference {} is not an Avro schema",
                r.reference.name
            )));
        }
        let parsed: Value = serde_json::from_str(r.canonical_text)
            .map_err(|e| invalid(format!("invalid referenced schema {}: {e}", r.reference.name)))?;
        named_type_defs.push(parsed);
    }

    if !named_type_defs.is_empty() {
        let mut probe = Map::new();
        probe.insert("type".into(), Value::String("record".into()));
        probe.insert("name".into(), Value::String("__reference_probe".into()));
        let mut fields = Vec::new();
        for (i, def) in named_type_defs.iter().enumerate() {
            let mut f = Map::new();
            f.insert("name".into(), Value::String(format!("__ref_{i}")));
            f.insert("type".into(), def.clone());
            fields.push(Value::Object(f));
        }
        let mut f = Map::new();
        f.insert("name".into(), Value::String("__root".into()));
        f.insert("type".into(), value.clone());
        fields.push(Value::Object(f));
        probe.insert("fields".into(), Value::Array(fields));
        let probe_text = serde_json::to_string(&Value::Object(probe)).unwrap();
        validate_with_avro_rs(&probe_text)?;
    } else {
        let text_for_validation = serde_json::to_string(&value).unwrap();
        validate_with_avro_rs(&text_for_validation)?;
    }

    qualify_names(&mut value, "");
    Ok(AvroSchema { value })
}

#[cfg(feature = "avro")]
fn validate_with_avro_rs(text: &str) -> Result<()> {
    avro_rs::Schema::parse_str(text).map(|_| ()).map_err(|e| invalid(e.to_string()))
}

#[cfg(not(feature = "avro"))]
fn validate_with_avro_rs(_text: &str) -> Result<()> {
    Ok(())
}

/// Recursively fully-qualifies every named type (`record`, `enum`, `fixed`)
/// using the Avro namespace-inheritance rule: a type without an explicit
/// `namespace` inherits its enclosing named type's namespace.
fn qualify_names(value: &mut Value, enclosing_namespace: &str) {
    match value {
        Value::Array(items) => {
            for item in items {
                qualify_names(item, enclosing_namespace);
            }
        }
        Value::Object(map) => {
            let own_namespace = map
                .get("namespace")
                .and_then(|v| v.as_str())
                .map(|s| s.to_owned())
                .unwrap_or_else(|| enclosing_namespace.to_owned());

            let is_named_type = matches!(
                map.get("type").and_then(|t| t.as_str()),
                Some("record") | Some("enum") | Some("fixed")
            );

            if is_named_type {
                if let Some(Value::String(name)) = map.get("name").cloned() {
                    if !name.contains('.') && !own_namespace.is_empty() {
                        let qualified = format!("{}.{}", own_namespace, name);
                        map.insert("name".into(), Value::String(qualified));
                    }
                }
                map.remove("namespace");
            }

            if let Some(Value::Array(fields)) = map.get_mut("fields") {
                for field in fields {
                    if let Value::Object(f) = field {
                        if let Some(t) = f.get_mut("type") {
                            qualify_names(t, &own_namespace);
                        }
                    }
                }
            }
            if let Some(items) = map.get_mut("items") {
                qualify_names(items, &own_namespace);
            }
            if let Some(values) = map.get_mut("values") {
                qualify_names(values, &own_namespace);
            }
            if let Some(t) = map.get_mut("type") {
                if !matches!(t, Value::String(_)) {
                    qualify_names(t, &own_namespace);
                }
            }
        }
        _ => {}
    }
}

/// `normalize=true`: sort record fields by name before fingerprinting (§4.1).
fn sort_record_fields(value: &mut Value) {
    match value {
        Value::Array(items) => {
            for item in items {
                sort_record_fields(item);
            }
        }
        Value::Object(map) => {
            if map.get("type").and_then(|t| t.as_str()) == Some("record") {
                if let Some(Value::Array(fields)) = map.get_mut("fields") {
                    fields.sort_by_key(|f| {
                        f.get("name").and_then(|n| n.as_str()).unwrap_or("").to_owned()
                    });
                    for f in fields.iter_mut() {
                        if let Value::Object(fm) = f {
                            if let Some(t) = fm.get_mut("type") {
                                sort_record_fields(t);
                            }
                        }
                    }
                }
            }
            if let Some(items) = map.get_mut("items") {
                sort_record_fields(items);
            }
            if let Some(values) = map.get_mut("values") {
                sort_record_fields(values);
            }
        }
        _ => {}
    }
}

/// Deterministic serialization: object keys sorted, arrays (field order)
/// preserved as-is (or already sorted by `sort_record_fields`).
fn serialize_canonical(value: &Value) -> String {
    let sorted = sort_keys(value);
    serde_json::to_string(&sorted).expect("Value always serializes")
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map.iter().map(|(k, v)| (k.clone(), sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}
