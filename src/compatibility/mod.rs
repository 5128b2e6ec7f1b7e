//! C5 — compatibility engine.
//!
//! The checker never throws for *semantic* incompatibility (§4.3) — only
//! `ParsedSchema` construction can fail. `check` always returns a verdict.

pub mod avro;
pub mod json_schema;
pub mod protobuf;

use crate::model::CompatibilityLevel;
use crate::parsers::ParsedSchema;

/// `{is_compatible, messages}` (§4.3 output shape).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompatVerdict {
    pub is_compatible: bool,
    pub messages: Vec<String>,
}

impl CompatVerdict {
    fn ok() -> Self {
        Self { is_compatible: true, messages: Vec::new() }
    }

    fn from_issues(issues: Vec<String>) -> Self {
        Self { is_compatible: issues.is_empty(), messages: issues }
    }

    fn merge(mut self, other: CompatVerdict) -> Self {
        self.is_compatible &= other.is_compatible;
        self.messages.extend(other.messages);
        self
    }
}

/// Checks `candidate` against `existing`, where `existing` is ordered oldest
/// to newest. For non-transitive levels only `existing.last()` (the latest
/// non-soft-deleted version) is consulted; transitive levels check every
/// entry (§4.2.1 step 6, §4.3).
pub fn check(level: CompatibilityLevel, candidate: &ParsedSchema, existing: &[ParsedSchema]) -> CompatVerdict {
    if matches!(level, CompatibilityLevel::None) {
        return CompatVerdict::ok();
    }

    let targets: Vec<&ParsedSchema> = if level.is_transitive() {
        existing.iter().collect()
    } else {
        existing.last().into_iter().collect()
    };

    let mut verdict = CompatVerdict::ok();
    for target in targets {
        if level.checks_backward() {
            verdict = verdict.merge(check_pair(candidate, target, Direction::Backward));
        }
        if level.checks_forward() {
            verdict = verdict.merge(check_pair(candidate, target, Direction::Forward));
        }
    }
    verdict
}

enum Direction {
    /// `candidate` is the reader, `existing` is the writer.
    Backward,
    /// `candidate` is the writer, `existing` is the reader.
    Forward,
}

fn check_pair(candidate: &ParsedSchema, existing: &ParsedSchema, direction: Direction) -> CompatVerdict {
    let (reader, writer) = match direction {
        Direction::Backward => (candidate, existing),
        Direction::Forward => (existing, candidate),
    };

    let issues = match (reader, writer) {
        (ParsedSchema::Avro(r), ParsedSchema::Avro(w)) => avro::backward_compatible(&r.value, &w.value),
        (ParsedSchema::Json(r), ParsedSchema::Json(w)) => json_schema::backward_compatible(r.root(), w.root()),
        (ParsedSchema::Protobuf(r), ParsedSchema::Protobuf(w)) => protobuf::diff(w, r),
        _ => vec!["schema type mismatch between candidate and existing version".to_owned()],
    };
    CompatVerdict::from_issues(issues)
}
