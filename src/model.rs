//! Core data model shared by every component in §3 of the design.
//!
//! These types carry no storage-engine assumptions; `crate::storage::Storage`
//! persists and retrieves them by value.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Default, reserved context name. Its name is literally `.` on the wire.
pub const DEFAULT_CONTEXT: &str = ".";

/// A tenant partition (§3 Context).
///
/// Owns its own id sequence, subject namespace and global config. The struct
/// itself is just identity; the sequence and indexes live in `storage`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextName(String);

impl ContextName {
    /// Validates `^\.[A-Za-z0-9._-]+$` or the bare default `"."`.
    pub fn parse(raw: &str) -> Result<Self, crate::error::RegistryError> {
        if raw == DEFAULT_CONTEXT {
            return Ok(Self(DEFAULT_CONTEXT.to_owned()));
        }
        let valid = raw.starts_with('.')
            && raw.len() > 1
            && raw[1..]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if valid {
            Ok(Self(raw.to_owned()))
        } else {
            Err(crate::error::RegistryError::InvalidContextName(raw.to_owned()))
        }
    }

    pub fn default_context() -> Self {
        Self(DEFAULT_CONTEXT.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_CONTEXT
    }
}

impl std::fmt::Display for ContextName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three schema languages the registry understands (C1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    Avro,
    Protobuf,
    Json,
}

impl Default for SchemaType {
    fn default() -> Self {
        SchemaType::Avro
    }
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SchemaType::Avro => "AVRO",
            SchemaType::Protobuf => "PROTOBUF",
            SchemaType::Json => "JSON",
        };
        write!(f, "{}", s)
    }
}

/// `{name, subject, version}` — a directed edge from a referring schema to a target version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaReference {
    pub name: String,
    pub subject: String,
    pub version: i32,
}

/// Identity of a `SubjectVersion` within a context: used as the node key for the
/// reference graph (C4) and the referenced-by index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionKey {
    pub subject: String,
    pub version: i32,
}

/// Immutable, content-addressed schema (§3 Schema).
///
/// `metadata`/`ruleSet` intentionally do not participate in `Fingerprint` — see
/// `crate::fingerprint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub id: i64,
    pub schema_type: SchemaType,
    pub canonical_text: String,
    pub references: Vec<SchemaReference>,
    pub metadata: Option<Metadata>,
    pub rule_set: Option<RuleSet>,
}

/// Per-field metadata attached at registration time (§4.6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensitive: Vec<String>,
}

/// `kind` of a domain/migration rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleKind {
    Condition,
    Transform,
}

/// `mode` of a rule — domain/encoding rules use `Write/Read/WriteRead`,
/// migration rules use `Upgrade/Downgrade/UpDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleMode {
    #[serde(rename = "WRITE")]
    Write,
    #[serde(rename = "READ")]
    Read,
    #[serde(rename = "WRITEREAD")]
    WriteRead,
    #[serde(rename = "UPGRADE")]
    Upgrade,
    #[serde(rename = "DOWNGRADE")]
    Downgrade,
    #[serde(rename = "UPDOWN")]
    UpDown,
}

/// `onSuccess`/`onFailure` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleAction {
    None,
    Dlq,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub kind: RuleKind,
    pub mode: RuleMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<RuleAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<RuleAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub migration_rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub encoding_rules: Vec<Rule>,
}

/// One entry in a subject's version history (§3 SubjectVersion).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectVersion {
    pub subject: String,
    pub version: i32,
    pub schema_id: i64,
    pub deleted: bool,
    pub permanently_deleted: bool,
    pub metadata: Option<Metadata>,
    pub rule_set: Option<RuleSet>,
}

impl SubjectVersion {
    /// Non-permanently-deleted (active or soft-deleted) — the set every "latest"
    /// computation, reference check, and listing-without-`deleted=true` must use.
    pub fn is_live(&self) -> bool {
        !self.permanently_deleted
    }

    pub fn is_active(&self) -> bool {
        !self.deleted && !self.permanently_deleted
    }
}

/// Compatibility policy levels (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    None,
    Backward,
    BackwardTransitive,
    Forward,
    ForwardTransitive,
    Full,
    FullTransitive,
}

impl Default for CompatibilityLevel {
    fn default() -> Self {
        CompatibilityLevel::Backward
    }
}

impl CompatibilityLevel {
    pub fn parse_case_insensitive(raw: &str) -> Option<Self> {
        let upper = raw.to_ascii_uppercase();
        Some(match upper.as_str() {
            "NONE" => Self::None,
            "BACKWARD" => Self::Backward,
            "BACKWARD_TRANSITIVE" => Self::BackwardTransitive,
            "FORWARD" => Self::Forward,
            "FORWARD_TRANSITIVE" => Self::ForwardTransitive,
            "FULL" => Self::Full,
            "FULL_TRANSITIVE" => Self::FullTransitive,
            _ => return None,
        })
    }

    pub fn is_transitive(&self) -> bool {
        matches!(
            self,
            Self::BackwardTransitive | Self::ForwardTransitive | Self::FullTransitive
        )
    }

    pub fn checks_backward(&self) -> bool {
        matches!(self, Self::Backward | Self::BackwardTransitive | Self::Full | Self::FullTransitive)
    }

    pub fn checks_forward(&self) -> bool {
        matches!(self, Self::Forward | Self::ForwardTransitive | Self::Full | Self::FullTransitive)
    }
}

/// Read/write mode of a context or subject (§3 Mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    ReadWrite,
    ReadOnly,
    Import,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::ReadWrite
    }
}

impl Mode {
    pub fn parse_case_insensitive(raw: &str) -> Option<Self> {
        let upper = raw.to_ascii_uppercase();
        Some(match upper.as_str() {
            "READWRITE" => Self::ReadWrite,
            "READONLY" => Self::ReadOnly,
            "IMPORT" => Self::Import,
            _ => return None,
        })
    }
}

/// One per context (§3 GlobalConfig); also reused, field-for-field, as the
/// per-subject override (`SubjectConfig`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub compatibility_level: Option<CompatibilityLevel>,
    pub default_metadata: Option<Metadata>,
    pub override_metadata: Option<Metadata>,
    pub default_rule_set: Option<RuleSet>,
    pub override_rule_set: Option<RuleSet>,
    pub validate_fields: Option<bool>,
    pub normalize: Option<bool>,
}

/// A named sequence of versions within a context (§3 Subject).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectMeta {
    pub alias: Option<String>,
    pub next_version: i32,
    /// Whole-subject soft-delete flag (§4.2.5) — distinct from any single
    /// version's `deleted` bit.
    pub deleted: bool,
}
