//! Protobuf parser/canonicalizer (C1).
//!
//! Parses a practically-useful subset of proto2/proto3 surface syntax into our
//! own descriptor model (package, nested messages, enums, oneofs, maps,
//! repeated/optional) and serializes it to a deterministic text shape — the
//! "`FileDescriptorProto` serialized in a deterministic text shape" §4.1 asks
//! for, expressed without depending on the exact codegen'd accessor surface
//! of the `protobuf` crate's own descriptor types (kept as a dependency for
//! the `proto` feature identity and for callers wanting real `.proto`
//! interop; see `DESIGN.md`).

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::Result;
use crate::model::SchemaType;

use super::{invalid, ResolvedReference};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldLabel {
    Optional,
    Required,
    Repeated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub type_name: String,
    pub number: i32,
    pub label: FieldLabel,
    pub oneof_index: Option<usize>,
    pub is_map: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoEnum {
    pub name: String,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub name: String,
    pub fields: Vec<Field>,
    pub oneofs: Vec<String>,
    pub nested_messages: Vec<Message>,
    pub nested_enums: Vec<ProtoEnum>,
    pub reserved_numbers: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoFile {
    pub syntax: Syntax,
    pub package: Option<String>,
    pub imports: Vec<String>,
    pub messages: Vec<Message>,
    pub enums: Vec<ProtoEnum>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Proto2,
    Proto3,
}

impl ProtoFile {
    pub fn canonicalize(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "syntax: {:?}", self.syntax);
        let _ = writeln!(out, "package: {}", self.package.clone().unwrap_or_default());
        let mut imports = self.imports.clone();
        imports.sort();
        for i in &imports {
            let _ = writeln!(out, "import: {i}");
        }
        for m in &self.messages {
            write_message(&mut out, m, 0);
        }
        for e in &self.enums {
            write_enum(&mut out, e, 0);
        }
        out
    }
}

fn write_message(out: &mut String, m: &Message, indent: usize) {
    let pad = "  ".repeat(indent);
    let _ = writeln!(out, "{pad}message {} {{", m.name);
    for f in &m.fields {
        let _ = writeln!(
            out,
            "{pad}  field {} {} = {} [{:?}]{}",
            f.type_name,
            f.name,
            f.number,
            f.label,
            f.oneof_index.map(|i| format!(" oneof={i}")).unwrap_or_default()
        );
    }
    let mut reserved = m.reserved_numbers.clone();
    reserved.sort();
    for r in reserved {
        let _ = writeln!(out, "{pad}  reserved {r}");
    }
    for nested in &m.nested_messages {
        write_message(out, nested, indent + 1);
    }
    for e in &m.nested_enums {
        write_enum(out, e, indent + 1);
    }
    let _ = writeln!(out, "{pad}}}");
}

fn write_enum(out: &mut String, e: &ProtoEnum, indent: usize) {
    let pad = "  ".repeat(indent);
    let _ = writeln!(out, "{pad}enum {} {{", e.name);
    for v in &e.values {
        let _ = writeln!(out, "{pad}  {} = {}", v.name, v.number);
    }
    let _ = writeln!(out, "{pad}}}");
}

/// Tokenizes and recursive-descent-parses the proto surface syntax we support.
pub fn parse(text: &str, references: &[ResolvedReference<'_>]) -> Result<ProtoFile> {
    for r in references {
        if r.schema_type != SchemaType::Protobuf {
            return Err(invalid(format!("reference {} is not a Protobuf schema", r.reference.name)));
        }
    }

    let tokens = tokenize(text)?;
    let mut p = Parser { tokens, pos: 0 };
    p.parse_file()
}

fn tokenize(text: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '/' {
            chars.next();
            match chars.peek() {
                Some('/') => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = ' ';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                }
                _ => return Err(invalid("unexpected '/'")),
            }
        } else if c == '"' {
            chars.next();
            let mut s = String::from("\"");
            for c in chars.by_ref() {
                s.push(c);
                if c == '"' {
                    break;
                }
            }
            tokens.push(s);
        } else if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' {
            let mut s = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' {
                    s.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(s);
        } else {
            tokens.push(c.to_string());
            chars.next();
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<String>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(|s| s.as_str())
    }

    fn next(&mut self) -> Result<String> {
        let t = self.tokens.get(self.pos).cloned().ok_or_else(|| invalid("unexpected end of input"))?;
        self.pos += 1;
        Ok(t)
    }

    fn expect(&mut self, tok: &str) -> Result<()> {
        let t = self.next()?;
        if t != tok {
            return Err(invalid(format!("expected '{tok}', found '{t}'")));
        }
        Ok(())
    }

    fn skip_until_semicolon(&mut self) -> Result<()> {
        while let Some(t) = self.peek() {
            if t == ";" {
                self.next()?;
                return Ok(());
            }
            self.next()?;
        }
        Err(invalid("unterminated statement"))
    }

    fn skip_balanced_braces(&mut self) -> Result<()> {
        self.expect("{")?;
        let mut depth = 1;
        while depth > 0 {
            let t = self.next()?;
            if t == "{" {
                depth += 1;
            } else if t == "}" {
                depth -= 1;
            }
        }
        Ok(())
    }

    fn parse_file(&mut self) -> Result<ProtoFile> {
        let mut syntax = Syntax::Proto2;
        let mut package = None;
        let mut imports = Vec::new();
        let mut messages = Vec::new();
        let mut enums = Vec::new();

        while let Some(tok) = self.peek() {
            match tok {
                "syntax" => {
                    self.next()?;
                    self.expect("=")?;
                    let value = self.next()?;
                    syntax = if value.contains("proto3") { Syntax::Proto3 } else { Syntax::Proto2 };
                    self.expect(";")?;
                }
                "package" => {
                    self.next()?;
                    let name = self.next()?;
                    package = Some(name);
                    self.expect(";")?;
                }
                "import" => {
                    self.next()?;
                    if self.peek() == Some("public") || self.peek() == Some("weak") {
                        self.next()?;
                    }
                    let path = self.next()?;
                    imports.push(path.trim_matches('"').to_owned());
                    self.expect(";")?;
                }
                "option" => {
                    self.next()?;
                    self.skip_until_semicolon()?;
                }
                "message" => {
                    self.next()?;
                    messages.push(self.parse_message()?);
                }
                "enum" => {
                    self.next()?;
                    enums.push(self.parse_enum()?);
                }
                ";" => {
                    self.next()?;
                }
                _ => {
                    return Err(invalid(format!("unexpected top-level token '{tok}'")));
                }
            }
        }

        Ok(ProtoFile { syntax, package, imports, messages, enums })
    }

    fn parse_message(&mut self) -> Result<Message> {
        let name = self.next()?;
        self.expect("{")?;
        let mut fields = Vec::new();
        let mut oneofs = Vec::new();
        let mut nested_messages = Vec::new();
        let mut nested_enums = Vec::new();
        let mut reserved_numbers = Vec::new();

        while let Some(tok) = self.peek().map(|s| s.to_owned()) {
            if tok == "}" {
                self.next()?;
                break;
            }
            match tok.as_str() {
                "message" => {
                    self.next()?;
                    nested_messages.push(self.parse_message()?);
                }
                "enum" => {
                    self.next()?;
                    nested_enums.push(self.parse_enum()?);
                }
                "oneof" => {
                    self.next()?;
                    let oneof_name = self.next()?;
                    let idx = oneofs.len();
                    oneofs.push(oneof_name);
                    self.expect("{")?;
                    while self.peek() != Some("}") {
                        let type_name = self.next()?;
                        let field_name = self.next()?;
                        self.expect("=")?;
                        let number: i32 = self.next()?.parse().map_err(|_| invalid("bad field number"))?;
                        self.skip_field_options_and_semicolon()?;
                        fields.push(Field {
                            name: field_name,
                            type_name,
                            number,
                            label: FieldLabel::Optional,
                            oneof_index: Some(idx),
                            is_map: false,
                        });
                    }
                    self.next()?; // '}'
                }
                "reserved" => {
                    self.next()?;
                    loop {
                        let t = self.next()?;
                        if let Ok(n) = t.parse::<i32>() {
                            reserved_numbers.push(n);
                        }
                        let sep = self.next()?;
                        if sep == ";" {
                            break;
                        }
                    }
                }
                "extensions" => {
                    self.next()?;
                    self.skip_until_semicolon()?;
                }
                "option" => {
                    self.next()?;
                    self.skip_until_semicolon()?;
                }
                ";" => {
                    self.next()?;
                }
                _ => {
                    fields.push(self.parse_field()?);
                }
            }
        }

        Ok(Message { name, fields, oneofs, nested_messages, nested_enums, reserved_numbers })
    }

    fn parse_field(&mut self) -> Result<Field> {
        let mut label = FieldLabel::Optional;
        let mut tok = self.next()?;
        match tok.as_str() {
            "optional" => {
                label = FieldLabel::Optional;
                tok = self.next()?;
            }
            "required" => {
                label = FieldLabel::Required;
                tok = self.next()?;
            }
            "repeated" => {
                label = FieldLabel::Repeated;
                tok = self.next()?;
            }
            _ => {}
        }

        let mut is_map = false;
        let type_name = if tok == "map" {
            is_map = true;
            self.expect("<")?;
            let key = self.next()?;
            self.expect(",")?;
            let value = self.next()?;
            self.expect(">")?;
            format!("map<{key},{value}>")
        } else {
            tok
        };

        let field_name = self.next()?;
        self.expect("=")?;
        let number: i32 = self.next()?.parse().map_err(|_| invalid("bad field number"))?;
        self.skip_field_options_and_semicolon()?;

        Ok(Field { name: field_name, type_name, number, label: if is_map { FieldLabel::Repeated } else { label }, oneof_index: None, is_map })
    }

    fn skip_field_options_and_semicolon(&mut self) -> Result<()> {
        if self.peek() == Some("[") {
            self.next()?;
            let mut depth = 1;
            while depth > 0 {
                let t = self.next()?;
                if t == "[" {
                    depth += 1;
                } else if t == "]" {
                    depth -= 1;
                }
            }
        }
        self.expect(";")
    }

    fn parse_enum(&mut self) -> Result<ProtoEnum> {
        let name = self.next()?;
        self.expect("{")?;
        let mut values = Vec::new();
        while self.peek() != Some("}") {
            let t = self.peek().unwrap_or("").to_owned();
            if t == "option" {
                self.next()?;
                self.skip_until_semicolon()?;
                continue;
            }
            if t == "reserved" {
                self.next()?;
                self.skip_until_semicolon()?;
                continue;
            }
            let value_name = self.next()?;
            self.expect("=")?;
            let number: i32 = self.next()?.parse().map_err(|_| invalid("bad enum value"))?;
            self.skip_field_options_and_semicolon()?;
            values.push(EnumValue { name: value_name, number });
        }
        self.next()?; // '}'
        Ok(ProtoEnum { name, values })
    }
}

/// Wire-type equivalence classes used by the compatibility engine (§4.3):
/// scalar type changes within a class are compatible, across classes are not.
pub fn wire_type_class(type_name: &str) -> Option<&'static str> {
    let classes: BTreeMap<&str, &str> = [
        ("int32", "varint"), ("int64", "varint"), ("uint32", "varint"), ("uint64", "varint"),
        ("bool", "varint"), ("enum", "varint"),
        ("sint32", "zigzag"), ("sint64", "zigzag"),
        ("fixed32", "fixed32"), ("sfixed32", "fixed32"), ("float", "fixed32"),
        ("fixed64", "fixed64"), ("sfixed64", "fixed64"), ("double", "fixed64"),
        ("string", "length-delimited"), ("bytes", "length-delimited"),
    ]
    .into_iter()
    .collect();
    classes.get(type_name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_message() {
        let text = r#"
            syntax = "proto3";
            package com.example;
            message User {
              string name = 1;
              int32 age = 2;
            }
        "#;
        let f = parse(text, &[]).unwrap();
        assert_eq!(f.syntax, Syntax::Proto3);
        assert_eq!(f.package.as_deref(), Some("com.example"));
        assert_eq!(f.messages.len(), 1);
        assert_eq!(f.messages[0].fields.len(), 2);
    }

    #[test]
    fn parses_nested_message_and_oneof() {
        let text = r#"
            syntax = "proto3";
            message Outer {
              message Inner { string x = 1; }
              oneof choice {
                string a = 1;
                int32 b = 2;
              }
            }
        "#;
        let f = parse(text, &[]).unwrap();
        assert_eq!(f.messages[0].nested_messages.len(), 1);
        assert_eq!(f.messages[0].oneofs, vec!["choice".to_owned()]);
        assert_eq!(f.messages[0].fields.len(), 2);
    }

    #[test]
    fn parses_map_field() {
        let text = r#"
            syntax = "proto3";
            message M { map<string, int32> counts = 1; }
        "#;
        let f = parse(text, &[]).unwrap();
        assert!(f.messages[0].fields[0].is_map);
    }

    #[test]
    fn wire_type_classes_group_compatible_scalars() {
        assert_eq!(wire_type_class("int32"), wire_type_class("int64"));
        assert_ne!(wire_type_class("int32"), wire_type_class("fixed32"));
    }
}
