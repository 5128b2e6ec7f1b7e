//! C1 — schema parsers.
//!
//! One variant per schema language, each exposing `parse`/`canonicalize`. The
//! registry core only ever sees the opaque `ParsedSchema` enum here, never a
//! language-specific type (§9 Design Notes — "do not leak language-specific
//! types into the registry signature").

pub mod avro;
pub mod json_schema;
pub mod protobuf;

use crate::error::{RegistryError, Result};
use crate::model::{SchemaReference, SchemaType};

/// A successfully parsed schema, still tagged by language.
#[derive(Debug, Clone)]
pub enum ParsedSchema {
    Avro(avro::AvroSchema),
    Protobuf(protobuf::ProtoFile),
    Json(json_schema::JsonSchema),
}

impl ParsedSchema {
    pub fn schema_type(&self) -> SchemaType {
        match self {
            ParsedSchema::Avro(_) => SchemaType::Avro,
            ParsedSchema::Protobuf(_) => SchemaType::Protobuf,
            ParsedSchema::Json(_) => SchemaType::Json,
        }
    }

    /// Canonical text used for fingerprinting (§4.1, §9 Open Question 2 —
    /// canonicalization always runs regardless of the `normalize` query flag;
    /// `normalize` only controls the additional sort/case-fold pass).
    pub fn canonicalize(&self, normalize: bool) -> String {
        match self {
            ParsedSchema::Avro(s) => s.canonicalize(normalize),
            ParsedSchema::Protobuf(s) => s.canonicalize(),
            ParsedSchema::Json(s) => s.canonicalize(normalize),
        }
    }

    pub fn as_avro(&self) -> Option<&avro::AvroSchema> {
        match self {
            ParsedSchema::Avro(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_protobuf(&self) -> Option<&protobuf::ProtoFile> {
        match self {
            ParsedSchema::Protobuf(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&json_schema::JsonSchema> {
        match self {
            ParsedSchema::Json(s) => Some(s),
            _ => None,
        }
    }
}

/// A referenced schema, already resolved to its canonical text by C4, handed
/// to the parser so it can splice the target into its namespace (Avro) or
/// import table (Protobuf, JSON `$ref`).
pub struct ResolvedReference<'a> {
    pub reference: &'a SchemaReference,
    pub canonical_text: &'a str,
    pub schema_type: SchemaType,
}

/// Dispatches to the right language parser. Every failure surfaces as
/// `INVALID_SCHEMA (42201)` per §4.1.
pub fn parse(
    schema_type: SchemaType,
    text: &str,
    references: &[ResolvedReference<'_>],
) -> Result<ParsedSchema> {
    match schema_type {
        SchemaType::Avro => avro::parse(text, references).map(ParsedSchema::Avro),
        SchemaType::Protobuf => protobuf::parse(text, references).map(ParsedSchema::Protobuf),
        SchemaType::Json => json_schema::parse(text, references).map(ParsedSchema::Json),
    }
}

pub(crate) fn invalid(msg: impl Into<String>) -> RegistryError {
    RegistryError::InvalidSchema(msg.into())
}
