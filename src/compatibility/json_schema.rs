//! JSON Schema compatibility rules (§4.3).
//!
//! `backward_compatible(reader, writer)`: every instance `writer` accepts
//! must also be accepted by `reader`.

use std::collections::BTreeSet;

use serde_json::Value;

fn type_set(schema: &Value) -> BTreeSet<String> {
    match schema.get("type") {
        Some(Value::String(s)) => std::iter::once(s.clone()).collect(),
        Some(Value::Array(arr)) => arr.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect(),
        _ => BTreeSet::new(),
    }
}

fn is_closed(schema: &Value) -> bool {
    schema.get("additionalProperties") == Some(&Value::Bool(false))
}

pub fn backward_compatible(reader: &Value, writer: &Value) -> Vec<String> {
    let mut issues = Vec::new();
    compare(reader, writer, "$", &mut issues);
    issues
}

fn compare(reader: &Value, writer: &Value, path: &str, issues: &mut Vec<String>) {
    if let Some(writer_one_of) = writer.get("oneOf").and_then(|v| v.as_array()) {
        match reader.get("oneOf").and_then(|v| v.as_array()) {
            Some(reader_one_of) => {
                for (i, w_alt) in writer_one_of.iter().enumerate() {
                    let compatible = reader_one_of.iter().any(|r_alt| {
                        let mut probe = Vec::new();
                        compare(r_alt, w_alt, path, &mut probe);
                        probe.is_empty()
                    });
                    if !compatible {
                        issues.push(format!("{path}.oneOf[{i}]: no reader alternative accepts this writer alternative"));
                    }
                }
            }
            None => issues.push(format!("{path}: reader dropped oneOf present in writer")),
        }
        return;
    }

    let reader_types = type_set(reader);
    let writer_types = type_set(writer);
    if !reader_types.is_empty() && !writer_types.is_empty() {
        for t in &writer_types {
            let accepted = reader_types.contains(t) || (t == "integer" && reader_types.contains("number"));
            if !accepted {
                issues.push(format!("{path}: writer type '{t}' not accepted by reader types {reader_types:?}"));
            }
        }
    }

    if let Some(writer_enum) = writer.get("enum").and_then(|v| v.as_array()) {
        if let Some(reader_enum) = reader.get("enum").and_then(|v| v.as_array()) {
            let reader_set: BTreeSet<&Value> = reader_enum.iter().collect();
            for v in writer_enum {
                if !reader_set.contains(v) {
                    issues.push(format!("{path}: writer enum value {v} not present in reader enum"));
                }
            }
        }
    }

    let writer_open = !is_closed(writer);
    if let Some(reader_props) = reader.get("properties").and_then(|v| v.as_object()) {
        let writer_props = writer.get("properties").and_then(|v| v.as_object());
        for (name, r_schema) in reader_props {
            match writer_props.and_then(|m| m.get(name)) {
                Some(w_schema) => compare(r_schema, w_schema, &format!("{path}.{name}"), issues),
                None if writer_open => {
                    issues.push(format!(
                        "{path}.{name}: reader constrains a property the open-content writer did not define"
                    ));
                }
                None => {}
            }
        }
    }

    let writer_required: BTreeSet<&str> = writer
        .get("required")
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    let reader_required: BTreeSet<&str> = reader
        .get("required")
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    for name in reader_required.difference(&writer_required) {
        let has_default = reader
            .get("properties")
            .and_then(|p| p.get(*name))
            .and_then(|s| s.get("default"))
            .is_some();
        if !has_default {
            issues.push(format!("{path}: new required field '{name}' has no default"));
        }
    }

    if let (Some(r_items), Some(w_items)) = (reader.get("items"), writer.get("items")) {
        compare(r_items, w_items, &format!("{path}[]"), issues);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn adding_property_to_open_reader_is_incompatible() {
        let writer = json!({"type":"object","properties":{"a":{"type":"integer"}}});
        let reader = json!({"type":"object","properties":{"a":{"type":"integer"},"b":{"type":"integer"}}});
        assert!(!backward_compatible(&reader, &writer).is_empty());
    }

    #[test]
    fn adding_property_to_closed_writer_schema_is_compatible() {
        let writer = json!({"type":"object","additionalProperties":false,"properties":{"a":{"type":"integer"}}});
        let reader = json!({"type":"object","properties":{"a":{"type":"integer"},"b":{"type":"integer"}}});
        assert!(backward_compatible(&reader, &writer).is_empty());
    }

    #[test]
    fn integer_to_number_widening_is_compatible() {
        let writer = json!({"type":"integer"});
        let reader = json!({"type":"number"});
        assert!(backward_compatible(&reader, &writer).is_empty());
    }

    #[test]
    fn number_to_integer_narrowing_is_incompatible() {
        let writer = json!({"type":"number"});
        let reader = json!({"type":"integer"});
        assert!(!backward_compatible(&reader, &writer).is_empty());
    }

    #[test]
    fn adding_required_field_without_default_is_incompatible() {
        let writer = json!({"type":"object","properties":{"a":{"type":"string"}},"required":["a"]});
        let reader = json!({"type":"object","properties":{"a":{"type":"string"},"b":{"type":"string"}},"required":["a","b"]});
        assert!(!backward_compatible(&reader, &writer).is_empty());
    }

    #[test]
    fn adding_required_field_with_default_is_compatible() {
        let writer = json!({"type":"object","properties":{"a":{"type":"string"}},"required":["a"]});
        let reader = json!({"type":"object","properties":{"a":{"type":"string"},"b":{"type":"string","default":"x"}},"required":["a","b"]});
        assert!(backward_compatible(&reader, &writer).is_empty());
    }
}
