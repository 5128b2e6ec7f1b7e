//! Protobuf compatibility rules (§4.3).
//!
//! Exhaustive enumeration of the forty-plus diff classes lives in the
//! project's BDD feature corpus; this implements the key classes the spec
//! calls out explicitly. Fields are matched across writer/reader by *name*
//! (the spec is explicit that a field-number change alone is compatible —
//! "it's the descriptor that matters" — so number is not part of identity
//! here).

use std::collections::HashMap;

use crate::parsers::protobuf::{wire_type_class, FieldLabel, Message, ProtoFile};

pub fn diff(writer: &ProtoFile, reader: &ProtoFile) -> Vec<String> {
    let mut issues = Vec::new();

    if writer.package != reader.package {
        issues.push(format!(
            "package renamed from {:?} to {:?}",
            writer.package, reader.package
        ));
    }

    let writer_msgs: HashMap<&str, &Message> = writer.messages.iter().map(|m| (m.name.as_str(), m)).collect();
    let reader_msgs: HashMap<&str, &Message> = reader.messages.iter().map(|m| (m.name.as_str(), m)).collect();

    for (name, wmsg) in &writer_msgs {
        match reader_msgs.get(name) {
            Some(rmsg) => diff_message(wmsg, rmsg, name, &mut issues),
            None => issues.push(format!("message {name} removed")),
        }
    }

    issues
}

fn diff_message(writer: &Message, reader: &Message, path: &str, issues: &mut Vec<String>) {
    let writer_fields: HashMap<&str, _> = writer.fields.iter().map(|f| (f.name.as_str(), f)).collect();
    let reader_fields: HashMap<&str, _> = reader.fields.iter().map(|f| (f.name.as_str(), f)).collect();

    for (name, wf) in &writer_fields {
        match reader_fields.get(name) {
            None => {
                if wf.label == FieldLabel::Required {
                    issues.push(format!("{path}.{name}: removed required field"));
                }
            }
            Some(rf) => {
                if wf.type_name != rf.type_name {
                    let compatible = match (wire_type_class(&wf.type_name), wire_type_class(&rf.type_name)) {
                        (Some(a), Some(b)) => a == b,
                        _ => false,
                    };
                    if !compatible {
                        issues.push(format!(
                            "{path}.{name}: incompatible scalar type change {} -> {}",
                            wf.type_name, rf.type_name
                        ));
                    }
                }
                if wf.oneof_index.is_some() && rf.oneof_index.is_none() {
                    issues.push(format!("{path}.{name}: field moved out of oneof"));
                }
            }
        }
    }

    let writer_nested: HashMap<&str, &Message> = writer.nested_messages.iter().map(|m| (m.name.as_str(), m)).collect();
    let reader_nested: HashMap<&str, &Message> = reader.nested_messages.iter().map(|m| (m.name.as_str(), m)).collect();
    for (name, wm) in &writer_nested {
        match reader_nested.get(name) {
            Some(rm) => diff_message(wm, rm, &format!("{path}.{name}"), issues),
            None => issues.push(format!("{path}.{name}: nested message removed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::protobuf::parse;

    fn parse_file(text: &str) -> ProtoFile {
        parse(text, &[]).unwrap()
    }

    #[test]
    fn adding_a_field_is_compatible() {
        let writer = parse_file("syntax=\"proto3\"; message M { string a = 1; }");
        let reader = parse_file("syntax=\"proto3\"; message M { string a = 1; int32 b = 2; }");
        assert!(diff(&writer, &reader).is_empty());
    }

    #[test]
    fn removing_required_field_is_incompatible() {
        let writer = parse_file("syntax=\"proto2\"; message M { required string a = 1; }");
        let reader = parse_file("syntax=\"proto2\"; message M { }");
        assert!(!diff(&writer, &reader).is_empty());
    }

    #[test]
    fn changing_field_number_alone_is_compatible() {
        let writer = parse_file("syntax=\"proto3\"; message M { string a = 1; }");
        let reader = parse_file("syntax=\"proto3\"; message M { string a = 5; }");
        assert!(diff(&writer, &reader).is_empty());
    }

    #[test]
    fn scalar_type_change_within_wire_class_is_compatible() {
        let writer = parse_file("syntax=\"proto3\"; message M { int32 a = 1; }");
        let reader = parse_file("syntax=\"proto3\"; message M { int64 a = 1; }");
        assert!(diff(&writer, &reader).is_empty());
    }

    #[test]
    fn scalar_type_change_across_wire_class_is_incompatible() {
        let writer = parse_file("syntax=\"proto3\"; message M { int32 a = 1; }");
        let reader = parse_file("syntax=\"proto3\"; message M { string a = 1; }");
        assert!(!diff(&writer, &reader).is_empty());
    }

    #[test]
    fn moving_field_out_of_oneof_is_incompatible() {
        let writer = parse_file("syntax=\"proto3\"; message M { oneof c { string a = 1; } }");
        let reader = parse_file("syntax=\"proto3\"; message M { string a = 1; }");
        assert!(!diff(&writer, &reader).is_empty());
    }

    #[test]
    fn package_rename_is_incompatible() {
        let writer = parse_file("syntax=\"proto3\"; package a; message M { string x = 1; }");
        let reader = parse_file("syntax=\"proto3\"; package b; message M { string x = 1; }");
        assert!(!diff(&writer, &reader).is_empty());
    }
}
