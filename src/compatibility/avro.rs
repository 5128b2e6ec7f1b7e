//! Avro compatibility rules (§4.3).
//!
//! `backward_compatible(reader, writer)` answers: can `reader` read every
//! instance `writer` can produce? `FORWARD`/`FULL` reduce to calling this
//! with the roles swapped (see `compatibility::check_pair`).

use std::collections::BTreeSet;

use serde_json::Value;

fn type_tag(v: &Value) -> &str {
    match v {
        Value::String(s) => s.as_str(),
        Value::Object(m) => m.get("type").and_then(|t| t.as_str()).unwrap_or(""),
        Value::Array(_) => "union",
        _ => "",
    }
}

fn is_numeric_widening(reader_type: &str, writer_type: &str) -> bool {
    let rank = |t: &str| match t {
        "int" => Some(0),
        "long" => Some(1),
        "float" => Some(2),
        "double" => Some(3),
        _ => None,
    };
    match (rank(writer_type), rank(reader_type)) {
        (Some(w), Some(r)) => r >= w,
        _ => reader_type == writer_type,
    }
}

fn aliases_of(field: &Value) -> BTreeSet<String> {
    field
        .get("aliases")
        .and_then(|a| a.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect())
        .unwrap_or_default()
}

fn has_default(field: &Value) -> bool {
    field.as_object().map(|m| m.contains_key("default")).unwrap_or(false)
}

fn fields_of(schema: &Value) -> Vec<&Value> {
    schema.get("fields").and_then(|f| f.as_array()).map(|v| v.iter().collect()).unwrap_or_default()
}

fn field_name(field: &Value) -> &str {
    field.get("name").and_then(|n| n.as_str()).unwrap_or("")
}

fn field_type(field: &Value) -> &Value {
    field.get("type").unwrap_or(&Value::Null)
}

/// Finds the writer field that the reader field `name` resolves against,
/// either by exact name match or by one of the reader field's declared
/// aliases matching a writer field's name (rename-with-alias, §4.3).
fn find_writer_field<'a>(reader_field: &Value, writer_fields: &'a [&'a Value]) -> Option<&'a Value> {
    let name = field_name(reader_field);
    let aliases = aliases_of(reader_field);
    writer_fields.iter().copied().find(|wf| {
        let wname = field_name(wf);
        wname == name || aliases.contains(wname)
    })
}

pub fn backward_compatible(reader: &Value, writer: &Value) -> Vec<String> {
    let mut issues = Vec::new();
    compare(reader, writer, "$", &mut issues);
    issues
}

fn compare(reader: &Value, writer: &Value, path: &str, issues: &mut Vec<String>) {
    let reader_tag = type_tag(reader);
    let writer_tag = type_tag(writer);

    if writer_tag == "union" {
        // Every alternative the writer might produce must be readable.
        let writer_alts = writer.as_array().cloned().unwrap_or_default();
        for (i, alt) in writer_alts.iter().enumerate() {
            compare(reader, alt, &format!("{path}[{i}]"), issues);
        }
        return;
    }

    if reader_tag == "union" {
        let reader_alts = reader.as_array().cloned().unwrap_or_default();
        let compatible = reader_alts.iter().any(|alt| {
            let mut probe = Vec::new();
            compare(alt, writer, path, &mut probe);
            probe.is_empty()
        });
        if !compatible {
            issues.push(format!("{path}: no reader union alternative can read writer type {writer_tag}"));
        }
        return;
    }

    match (reader_tag, writer_tag) {
        ("record", "record") => {
            let writer_fields: Vec<&Value> = fields_of(writer);
            let reader_fields: Vec<&Value> = fields_of(reader);

            for rf in &reader_fields {
                match find_writer_field(rf, &writer_fields) {
                    Some(wf) => {
                        compare(field_type(rf), field_type(wf), &format!("{path}.{}", field_name(rf)), issues);
                    }
                    None => {
                        if !has_default(rf) {
                            issues.push(format!("{path}.{}: new field has no default and is missing from writer", field_name(rf)));
                        }
                    }
                }
            }
        }
        ("enum", "enum") => {
            let reader_symbols: BTreeSet<&str> = reader
                .get("symbols")
                .and_then(|s| s.as_array())
                .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            let writer_symbols: BTreeSet<&str> = writer
                .get("symbols")
                .and_then(|s| s.as_array())
                .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            for sym in writer_symbols.difference(&reader_symbols) {
                issues.push(format!("{path}: writer symbol '{sym}' not present in reader enum"));
            }
        }
        ("array", "array") => {
            compare(
                reader.get("items").unwrap_or(&Value::Null),
                writer.get("items").unwrap_or(&Value::Null),
                &format!("{path}[]"),
                issues,
            );
        }
        ("map", "map") => {
            compare(
                reader.get("values").unwrap_or(&Value::Null),
                writer.get("values").unwrap_or(&Value::Null),
                &format!("{path}{{}}"),
                issues,
            );
        }
        ("fixed", "fixed") => {
            if reader.get("size") != writer.get("size") {
                issues.push(format!("{path}: fixed size changed"));
            }
        }
        (r, w) if r == w => {}
        (r, w) => {
            if !is_numeric_widening(r, w) {
                issues.push(format!("{path}: incompatible type change from '{w}' to '{r}'"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn adding_field_with_default_is_compatible() {
        let writer = json!({"type":"record","name":"R","fields":[{"name":"a","type":"string"}]});
        let reader = json!({"type":"record","name":"R","fields":[{"name":"a","type":"string"},{"name":"b","type":"string","default":"x"}]});
        assert!(backward_compatible(&reader, &writer).is_empty());
    }

    #[test]
    fn adding_field_without_default_is_incompatible() {
        let writer = json!({"type":"record","name":"R","fields":[{"name":"a","type":"string"}]});
        let reader = json!({"type":"record","name":"R","fields":[{"name":"a","type":"string"},{"name":"b","type":"string"}]});
        assert!(!backward_compatible(&reader, &writer).is_empty());
    }

    #[test]
    fn removing_field_is_backward_compatible() {
        let writer = json!({"type":"record","name":"R","fields":[{"name":"a","type":"string"},{"name":"b","type":"string"}]});
        let reader = json!({"type":"record","name":"R","fields":[{"name":"a","type":"string"}]});
        assert!(backward_compatible(&reader, &writer).is_empty());
    }

    #[test]
    fn widening_union_is_backward_compatible() {
        let writer = json!({"type":"record","name":"R","fields":[{"name":"a","type":"string"}]});
        let reader = json!({"type":"record","name":"R","fields":[{"name":"a","type":["string","null"]}]});
        assert!(backward_compatible(&reader, &writer).is_empty());
    }

    #[test]
    fn narrowing_union_is_incompatible() {
        let writer = json!({"type":"record","name":"R","fields":[{"name":"a","type":["string","null"]}]});
        let reader = json!({"type":"record","name":"R","fields":[{"name":"a","type":"string"}]});
        assert!(!backward_compatible(&reader, &writer).is_empty());
    }

    #[test]
    fn int_to_long_widening_is_compatible() {
        let writer = json!({"type":"record","name":"R","fields":[{"name":"a","type":"int"}]});
        let reader = json!({"type":"record","name":"R","fields":[{"name":"a","type":"long"}]});
        assert!(backward_compatible(&reader, &writer).is_empty());
    }

    #[test]
    fn long_to_int_narrowing_is_incompatible() {
        let writer = json!({"type":"record","name":"R","fields":[{"name":"a","type":"long"}]});
        let reader = json!({"type":"record","name":"R","fields":[{"name":"a","type":"int"}]});
        assert!(!backward_compatible(&reader, &writer).is_empty());
    }

    #[test]
    fn rename_with_alias_is_compatible() {
        let writer = json!({"type":"record","name":"R","fields":[{"name":"old","type":"string"}]});
        let reader = json!({"type":"record","name":"R","fields":[{"name":"new","type":"string","aliases":["old"]}]});
        assert!(backward_compatible(&reader, &writer).is_empty());
    }

    #[test]
    fn enum_symbol_widening_is_compatible() {
        let writer = json!({"type":"enum","name":"E","symbols":["A","B"]});
        let reader = json!({"type":"enum","name":"E","symbols":["A","B","C"]});
        assert!(backward_compatible(&reader, &writer).is_empty());
    }

    #[test]
    fn enum_symbol_narrowing_is_incompatible() {
        let writer = json!({"type":"enum","name":"E","symbols":["A","B","C"]});
        let reader = json!({"type":"enum","name":"E","symbols":["A","B"]});
        assert!(!backward_compatible(&reader, &writer).is_empty());
    }
}
