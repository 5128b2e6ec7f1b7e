//! Wire request/response shapes for the HTTP surface (§6). Kept intentionally
//! thin: the DTOs borrow `model` types directly wherever the wire shape and
//! the domain shape coincide, the way the teacher's client-side request
//! builders reused its own domain structs instead of duplicating them.

use serde::{Deserialize, Serialize};

use crate::model::{CompatibilityLevel, ConfigEntry, Metadata, Mode, RuleSet, SchemaReference, SchemaType};
use crate::registry::RegisterResponse;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterSchemaRequest {
    pub schema: String,
    #[serde(default, rename = "schemaType")]
    pub schema_type: Option<SchemaType>,
    #[serde(default)]
    pub references: Vec<SchemaReference>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default, rename = "ruleSet")]
    pub rule_set: Option<RuleSet>,
    /// Caller-supplied id, accepted only while the context is in IMPORT mode (§4.2.1 step 2).
    #[serde(default)]
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterSchemaResponse {
    pub id: i64,
    pub subject: String,
    pub version: i32,
    #[serde(rename = "schemaType")]
    pub schema_type: SchemaType,
}

impl From<RegisterResponse> for RegisterSchemaResponse {
    fn from(r: RegisterResponse) -> Self {
        Self { id: r.id, subject: r.subject, version: r.version, schema_type: r.schema_type }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaVersionResponse {
    pub subject: String,
    pub id: i64,
    pub version: i32,
    pub schema: String,
    #[serde(rename = "schemaType")]
    pub schema_type: SchemaType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SchemaReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "ruleSet")]
    pub rule_set: Option<RuleSet>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaByIdResponse {
    pub schema: String,
    #[serde(rename = "schemaType")]
    pub schema_type: SchemaType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SchemaReference>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectVersionPair {
    pub subject: String,
    pub version: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupSchemaRequest {
    pub schema: String,
    #[serde(default, rename = "schemaType")]
    pub schema_type: Option<SchemaType>,
    #[serde(default)]
    pub references: Vec<SchemaReference>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigUpdateRequest {
    #[serde(default, rename = "compatibility")]
    pub compatibility_level: Option<CompatibilityLevel>,
    #[serde(default, rename = "defaultMetadata")]
    pub default_metadata: Option<Metadata>,
    #[serde(default, rename = "overrideMetadata")]
    pub override_metadata: Option<Metadata>,
    #[serde(default, rename = "defaultRuleSet")]
    pub default_rule_set: Option<RuleSet>,
    #[serde(default, rename = "overrideRuleSet")]
    pub override_rule_set: Option<RuleSet>,
    #[serde(default, rename = "validateFields")]
    pub validate_fields: Option<bool>,
    #[serde(default)]
    pub normalize: Option<bool>,
}

impl From<ConfigUpdateRequest> for ConfigEntry {
    fn from(r: ConfigUpdateRequest) -> Self {
        Self {
            compatibility_level: r.compatibility_level,
            default_metadata: r.default_metadata,
            override_metadata: r.override_metadata,
            default_rule_set: r.default_rule_set,
            override_rule_set: r.override_rule_set,
            validate_fields: r.validate_fields,
            normalize: r.normalize,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigResponse {
    #[serde(rename = "compatibilityLevel")]
    pub compatibility_level: CompatibilityLevel,
}

impl From<ConfigEntry> for ConfigResponse {
    fn from(c: ConfigEntry) -> Self {
        Self { compatibility_level: c.compatibility_level.unwrap_or_default() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModeUpdateRequest {
    pub mode: Mode,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModeResponse {
    pub mode: Mode,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompatibilityCheckResponse {
    #[serde(rename = "is_compatible")]
    pub is_compatible: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error_code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportBatchResponse {
    pub imported: i32,
    pub errors: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportBatchRequest {
    pub schemas: Vec<ImportSchemaItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportSchemaItem {
    pub id: i64,
    pub subject: String,
    pub version: i32,
    pub schema: String,
    #[serde(default, rename = "schemaType")]
    pub schema_type: Option<SchemaType>,
    #[serde(default)]
    pub references: Vec<SchemaReference>,
}
