//! C7 — registry core.
//!
//! Orchestrates C1 (parse) → C4 (resolve refs) → C6 (merge) → C5 (compat) →
//! C2 (fingerprint/allocate) → C3 (persist), owning every invariant in §3 and
//! the per-subject critical section from §5. This is the only module the
//! HTTP layer and the import pipeline need to know about to mutate state.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::compatibility;
use crate::config;
use crate::error::{RegistryError, Result};
use crate::fingerprint::Fingerprint;
use crate::model::{
    CompatibilityLevel, ConfigEntry, Metadata, Mode, RuleSet, Schema, SchemaReference, SchemaType,
    SubjectVersion,
};
use crate::parsers::{self, ParsedSchema};
use crate::references;
use crate::storage::Storage;

#[cfg(feature = "trace")]
use trace::{info, warn};
#[cfg(not(feature = "trace"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "trace"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

/// Orchestration layer. Cheap to clone — it only holds the shared storage handle.
#[derive(Clone)]
pub struct RegistryCore {
    storage: Arc<dyn Storage>,
}

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub context: String,
    pub subject: String,
    pub schema_type: SchemaType,
    pub schema_text: String,
    pub references: Vec<SchemaReference>,
    pub metadata: Option<Metadata>,
    pub rule_set: Option<RuleSet>,
    pub normalize_query: Option<bool>,
    /// Caller-supplied id (register-time IMPORT, distinct from the batch
    /// pipeline in `crate::import`). `None` for ordinary registration.
    pub explicit_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterResponse {
    pub id: i64,
    pub subject: String,
    pub version: i32,
    pub schema_type: SchemaType,
}

#[derive(Debug, Clone, Copy)]
pub enum VersionLookup {
    Number(i32),
    Latest,
}

impl RegistryCore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    async fn effective_mode(&self, context: &str, subject: &str) -> Mode {
        match self.storage.subject_mode(context, subject).await {
            Some(m) => m,
            None => self.storage.global_mode(context).await,
        }
    }

    async fn check_writable(&self, context: &str, subject: &str) -> Result<Mode> {
        let mode = self.effective_mode(context, subject).await;
        if mode == Mode::ReadOnly {
            warn!(context, subject, "write rejected: subject is in READONLY mode");
            return Err(RegistryError::OperationNotPermitted(format!(
                "{subject} is in READONLY mode"
            )));
        }
        Ok(mode)
    }

    /// Parses a stored schema back into `ParsedSchema`, re-resolving its
    /// references (§4.3 compatibility check needs every existing version
    /// parsed the same way the candidate is).
    async fn parse_stored(&self, context: &str, schema: &Schema) -> Result<ParsedSchema> {
        let resolved = references::resolve(self.storage.as_ref(), context, &schema.references, true).await?;
        let refs = references::as_parser_refs(&resolved);
        parsers::parse(schema.schema_type, &schema.canonical_text, &refs)
    }

    async fn parsed_for_version(&self, context: &str, version: &SubjectVersion) -> Result<ParsedSchema> {
        let schema = self
            .storage
            .get_schema_by_id(context, version.schema_id)
            .await
            .ok_or_else(|| RegistryError::SchemaNotFound(version.schema_id.to_string()))?;
        self.parse_stored(context, &schema).await
    }

    /// C7.1 — register a schema (§4.2.1).
    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse> {
        let context = req.context.as_str();
        let subject = req.subject.as_str();

        // Step 1/2: mode gate.
        self.check_writable(context, subject).await?;
        let global_mode = self.storage.global_mode(context).await;
        if global_mode == Mode::Import && req.explicit_id.is_none() {
            return Err(RegistryError::OperationNotPermitted(
                "global mode is IMPORT; registration requires an explicit id".into(),
            ));
        }
        let allow_soft_deleted_refs = global_mode == Mode::Import;

        self.storage.ensure_context(context).await;
        let lock = self.storage.per_subject_lock(context, subject).await;
        let _guard = lock.lock().await;

        // Step 3: parse + resolve references + acyclicity.
        let resolved = references::resolve(self.storage.as_ref(), context, &req.references, allow_soft_deleted_refs).await?;
        references::validate_schema_type_consistency(req.schema_type, &resolved)?;
        references::check_acyclic(self.storage.as_ref(), context, subject, &req.references).await?;
        let parser_refs = references::as_parser_refs(&resolved);
        let parsed = parsers::parse(req.schema_type, &req.schema_text, &parser_refs)?;

        let rows = self.storage.list_versions(context, subject).await;
        let previous_row = rows.last().cloned();

        // Step 4: 3-layer metadata/ruleSet merge, subject overrides global.
        let global_config = self.storage.global_config(context).await;
        let subject_config = self.storage.subject_config(context, subject).await;

        let default_metadata = subject_config
            .as_ref()
            .and_then(|c| c.default_metadata.clone())
            .or_else(|| global_config.default_metadata.clone());
        let override_metadata = subject_config
            .as_ref()
            .and_then(|c| c.override_metadata.clone())
            .or_else(|| global_config.override_metadata.clone());
        let default_rule_set = subject_config
            .as_ref()
            .and_then(|c| c.default_rule_set.clone())
            .or_else(|| global_config.default_rule_set.clone());
        let override_rule_set = subject_config
            .as_ref()
            .and_then(|c| c.override_rule_set.clone())
            .or_else(|| global_config.override_rule_set.clone());

        let request_or_inherited_metadata = req
            .metadata
            .clone()
            .or_else(|| previous_row.as_ref().and_then(|v| v.metadata.clone()));
        let request_or_inherited_rule_set = req
            .rule_set
            .clone()
            .or_else(|| previous_row.as_ref().and_then(|v| v.rule_set.clone()));

        let merged_metadata = config::merge_metadata(
            default_metadata.as_ref(),
            request_or_inherited_metadata.as_ref(),
            override_metadata.as_ref(),
        );
        let merged_rule_set = config::merge_rule_set(
            default_rule_set.as_ref(),
            request_or_inherited_rule_set.as_ref(),
            override_rule_set.as_ref(),
        );
        config::validate_rule_set(&merged_rule_set)?;

        // Step 5: reserved-field validation.
        let validate_fields = config::effective_validate_fields(&global_config, subject_config.as_ref());
        if validate_fields {
            let field_names = extract_field_names(&parsed);
            config::validate_reserved_fields(
                &merged_metadata,
                &field_names,
                previous_row.as_ref().and_then(|v| v.metadata.as_ref()),
            )?;
        }

        // Step 6: compatibility check (skipped for NONE and IMPORT).
        let compat_level = subject_config
            .as_ref()
            .and_then(|c| c.compatibility_level)
            .unwrap_or_else(|| global_config.compatibility_level.unwrap_or_default());
        if global_mode != Mode::Import && !matches!(compat_level, CompatibilityLevel::None) {
            let active_rows: Vec<&SubjectVersion> = rows.iter().filter(|v| v.is_active()).collect();
            let targets: Vec<&SubjectVersion> = if compat_level.is_transitive() {
                active_rows
            } else {
                active_rows.last().into_iter().copied().collect()
            };
            let mut existing_parsed = Vec::with_capacity(targets.len());
            for v in targets {
                existing_parsed.push(self.parsed_for_version(context, v).await?);
            }
            let verdict = compatibility::check(compat_level, &parsed, &existing_parsed);
            if !verdict.is_compatible {
                return Err(RegistryError::IncompatibleSchema(verdict.messages));
            }
        }

        // Step 7/8: fingerprint, dedup, allocate.
        let normalize = config::effective_normalize(&global_config, subject_config.as_ref(), req.normalize_query);
        let canonical = parsed.canonicalize(normalize);
        let fingerprint = Fingerprint::compute(req.schema_type, &canonical, &req.references);
        let alloc = self.storage.id_allocator(context).await;

        let schema_id = if let Some(explicit_id) = req.explicit_id {
            alloc
                .bind_explicit(explicit_id, fingerprint)
                .map_err(|_| RegistryError::InvalidSchema(format!("id {explicit_id} already bound to a different schema")))?;
            explicit_id
        } else if let Some(existing) = alloc.lookup(fingerprint) {
            existing
        } else {
            alloc.allocate(fingerprint)
        };

        // Soft-deleted versions never resurrect: only an *active* version
        // pointing at this schema id short-circuits registration.
        if let Some(existing_active) = rows.iter().find(|v| v.is_active() && v.schema_id == schema_id) {
            return Ok(RegisterResponse {
                id: schema_id,
                subject: subject.to_owned(),
                version: existing_active.version,
                schema_type: req.schema_type,
            });
        }

        if self.storage.get_schema_by_id(context, schema_id).await.is_none() {
            self.storage
                .insert_schema(
                    context,
                    Schema {
                        id: schema_id,
                        schema_type: req.schema_type,
                        canonical_text: canonical,
                        references: req.references.clone(),
                        metadata: None,
                        rule_set: None,
                    },
                )
                .await;
        }

        let mut subject_meta = self.storage.ensure_subject(context, subject).await;
        let new_version = subject_meta.next_version;
        subject_meta.next_version += 1;
        self.storage.save_subject_meta(context, subject, subject_meta).await;

        let mut final_metadata = merged_metadata;
        config::stamp_version(&mut final_metadata, new_version);

        self.storage
            .insert_version(
                context,
                SubjectVersion {
                    subject: subject.to_owned(),
                    version: new_version,
                    schema_id,
                    deleted: false,
                    permanently_deleted: false,
                    metadata: Some(final_metadata),
                    rule_set: Some(merged_rule_set),
                },
            )
            .await;
        self.storage.add_schema_referrer(context, schema_id, subject, new_version).await;
        references::materialize_edges(&self.storage, context, subject, new_version, &req.references).await;

        info!(context, subject, version = new_version, schema_id, "registered schema");
        Ok(RegisterResponse {
            id: schema_id,
            subject: subject.to_owned(),
            version: new_version,
            schema_type: req.schema_type,
        })
    }

    /// C7.2 — lookup schema under subject (§4.2.2).
    pub async fn lookup_schema_under_subject(
        &self,
        context: &str,
        subject: &str,
        schema_type: SchemaType,
        schema_text: &str,
        schema_refs: &[SchemaReference],
        include_deleted: bool,
        normalize_query: Option<bool>,
    ) -> Result<SubjectVersion> {
        if self.storage.get_subject(context, subject).await.is_none() {
            return Err(RegistryError::SubjectNotFound(subject.to_owned()));
        }
        let resolved = references::resolve(self.storage.as_ref(), context, schema_refs, include_deleted).await?;
        let parser_refs = references::as_parser_refs(&resolved);
        let parsed = parsers::parse(schema_type, schema_text, &parser_refs)?;

        let global_config = self.storage.global_config(context).await;
        let subject_config = self.storage.subject_config(context, subject).await;
        let normalize = config::effective_normalize(&global_config, subject_config.as_ref(), normalize_query);
        let canonical = parsed.canonicalize(normalize);
        let fingerprint = Fingerprint::compute(schema_type, &canonical, schema_refs);

        let alloc = self.storage.id_allocator(context).await;
        let schema_id = alloc
            .lookup(fingerprint)
            .ok_or_else(|| RegistryError::SchemaNotFound(subject.to_owned()))?;

        let rows = self.storage.list_versions(context, subject).await;
        rows.into_iter()
            .find(|v| v.schema_id == schema_id && (include_deleted || !v.deleted))
            .ok_or_else(|| RegistryError::SchemaNotFound(subject.to_owned()))
    }

    /// C7 read path — resolves `latest` per §9 Open Question 1.
    pub async fn get_version(&self, context: &str, subject: &str, spec: VersionLookup, include_deleted: bool) -> Result<SubjectVersion> {
        let rows = self.storage.list_versions(context, subject).await;
        if self.storage.get_subject(context, subject).await.is_none() {
            return Err(RegistryError::SubjectNotFound(subject.to_owned()));
        }
        match spec {
            VersionLookup::Number(n) => rows
                .into_iter()
                .find(|v| v.version == n && (include_deleted || !v.deleted))
                .ok_or(RegistryError::VersionNotFound { subject: subject.to_owned(), version: n }),
            VersionLookup::Latest => {
                if let Some(active) = rows.iter().filter(|v| !v.deleted).next_back() {
                    return Ok(active.clone());
                }
                if include_deleted {
                    if let Some(soft) = rows.last() {
                        return Ok(soft.clone());
                    }
                }
                Err(RegistryError::VersionNotFound { subject: subject.to_owned(), version: -1 })
            }
        }
    }

    pub async fn get_schema_by_id(&self, context: &str, id: i64) -> Result<Schema> {
        let schema = self
            .storage
            .get_schema_by_id(context, id)
            .await
            .ok_or_else(|| RegistryError::SchemaNotFound(id.to_string()))?;
        if self.storage.schema_referrers(context, id).await.is_empty() {
            return Err(RegistryError::SchemaNotFound(id.to_string()));
        }
        Ok(schema)
    }

    pub async fn schema_subjects(&self, context: &str, id: i64) -> Result<Vec<(String, i32)>> {
        self.get_schema_by_id(context, id).await?;
        let mut referrers = self.storage.schema_referrers(context, id).await;
        referrers.sort();
        Ok(referrers)
    }

    pub async fn referenced_by(&self, context: &str, subject: &str, version: i32) -> Result<Vec<i64>> {
        self.get_version(context, subject, VersionLookup::Number(version), true).await?;
        let pairs = self.storage.referenced_by(context, subject, version).await;
        let mut ids = BTreeSet::new();
        for (s, v) in pairs {
            if let Some(row) = self.storage.get_version(context, &s, v).await {
                ids.insert(row.schema_id);
            }
        }
        Ok(ids.into_iter().collect())
    }

    pub async fn list_subjects(&self, context: &str, prefix: Option<&str>, deleted: bool, deleted_only: bool) -> Result<Vec<String>> {
        let all = self.storage.list_subjects(context).await;
        let mut out = Vec::new();
        for s in all {
            if let Some(p) = prefix {
                if !s.starts_with(p) {
                    continue;
                }
            }
            let rows = self.storage.list_versions(context, &s).await;
            let has_active = rows.iter().any(|v| v.is_active());
            if deleted_only {
                if !has_active {
                    out.push(s);
                }
            } else if deleted {
                out.push(s);
            } else if has_active {
                out.push(s);
            }
        }
        out.sort();
        Ok(out)
    }

    pub async fn list_versions(&self, context: &str, subject: &str, deleted: bool, deleted_only: bool) -> Result<Vec<i32>> {
        if self.storage.get_subject(context, subject).await.is_none() {
            return Err(RegistryError::SubjectNotFound(subject.to_owned()));
        }
        let rows = self.storage.list_versions(context, subject).await;
        Ok(rows
            .into_iter()
            .filter(|v| if deleted_only { v.deleted } else { deleted || !v.deleted })
            .map(|v| v.version)
            .collect())
    }

    /// C7.3 — soft-delete version (§4.2.3).
    pub async fn soft_delete_version(&self, context: &str, subject: &str, version: i32) -> Result<i32> {
        self.check_writable(context, subject).await?;
        let lock = self.storage.per_subject_lock(context, subject).await;
        let _guard = lock.lock().await;

        let mut row = self
            .storage
            .get_version(context, subject, version)
            .await
            .ok_or(RegistryError::VersionNotFound { subject: subject.to_owned(), version })?;
        references::assert_no_active_referrers(self.storage.as_ref(), context, subject, version).await?;
        row.deleted = true;
        self.storage.save_version(context, row).await;
        info!(context, subject, version, "soft-deleted version");
        Ok(version)
    }

    /// C7.4 — permanent-delete version (§4.2.4).
    pub async fn permanent_delete_version(&self, context: &str, subject: &str, version: i32) -> Result<i32> {
        self.check_writable(context, subject).await?;
        let lock = self.storage.per_subject_lock(context, subject).await;
        let _guard = lock.lock().await;

        let row = self
            .storage
            .get_version(context, subject, version)
            .await
            .ok_or(RegistryError::VersionNotFound { subject: subject.to_owned(), version })?;
        if !row.deleted {
            return Err(RegistryError::VersionNotSoftDeleted { subject: subject.to_owned(), version });
        }
        self.storage.remove_version(context, subject, version).await;
        self.storage.remove_reference_edges_from(context, subject, version).await;
        self.storage.remove_schema_referrer(context, row.schema_id, subject, version).await;
        info!(context, subject, version, schema_id = row.schema_id, "permanently deleted version");
        Ok(version)
    }

    /// C7.5 — soft-delete subject (§4.2.5).
    pub async fn soft_delete_subject(&self, context: &str, subject: &str) -> Result<Vec<i32>> {
        self.check_writable(context, subject).await?;
        let lock = self.storage.per_subject_lock(context, subject).await;
        let _guard = lock.lock().await;

        let mut meta = self
            .storage
            .get_subject(context, subject)
            .await
            .ok_or_else(|| RegistryError::SubjectNotFound(subject.to_owned()))?;
        let rows = self.storage.list_versions(context, subject).await;
        let mut affected = Vec::new();
        for mut row in rows {
            if !row.deleted {
                row.deleted = true;
                affected.push(row.version);
                self.storage.save_version(context, row).await;
            }
        }
        meta.deleted = true;
        self.storage.save_subject_meta(context, subject, meta).await;
        info!(context, subject, versions_affected = affected.len(), "soft-deleted subject");
        Ok(affected)
    }

    /// C7.6 — permanent-delete subject (§4.2.6).
    pub async fn permanent_delete_subject(&self, context: &str, subject: &str) -> Result<Vec<i32>> {
        self.check_writable(context, subject).await?;
        let lock = self.storage.per_subject_lock(context, subject).await;
        let _guard = lock.lock().await;

        let meta = self
            .storage
            .get_subject(context, subject)
            .await
            .ok_or_else(|| RegistryError::SubjectNotFound(subject.to_owned()))?;
        if !meta.deleted {
            return Err(RegistryError::SubjectNotSoftDeleted(subject.to_owned()));
        }
        let rows = self.storage.list_versions(context, subject).await;
        let mut removed = Vec::new();
        for row in rows {
            self.storage.remove_reference_edges_from(context, subject, row.version).await;
            self.storage.remove_schema_referrer(context, row.schema_id, subject, row.version).await;
            removed.push(row.version);
        }
        self.storage.remove_subject(context, subject).await;
        info!(context, subject, versions_removed = removed.len(), "permanently deleted subject");
        Ok(removed)
    }

    /// C7.7 — mode transitions (§4.2.7).
    pub async fn set_global_mode(&self, context: &str, mode: Mode, force: bool) -> Result<()> {
        let current = self.storage.global_mode(context).await;
        if mode == Mode::Import && current != Mode::Import {
            if !force && self.storage.live_schema_count(context).await > 0 {
                return Err(RegistryError::OperationNotPermitted(
                    "context has schemas; pass force=true to enter IMPORT mode".into(),
                ));
            }
        }
        self.storage.set_global_mode(context, mode).await;
        info!(context, ?mode, "global mode transition");
        Ok(())
    }

    pub async fn set_subject_mode(&self, context: &str, subject: &str, mode: Mode, force: bool) -> Result<()> {
        let current = self.storage.subject_mode(context, subject).await.unwrap_or(Mode::ReadWrite);
        if mode == Mode::Import && current != Mode::Import {
            if !force && self.storage.live_schema_count(context).await > 0 {
                return Err(RegistryError::OperationNotPermitted(
                    "context has schemas; pass force=true to enter IMPORT mode".into(),
                ));
            }
        }
        self.storage.set_subject_mode(context, subject, Some(mode)).await;
        info!(context, subject, ?mode, "subject mode transition");
        Ok(())
    }

    pub async fn delete_subject_mode(&self, context: &str, subject: &str) {
        self.storage.set_subject_mode(context, subject, None).await;
    }

    pub async fn get_global_mode(&self, context: &str) -> Mode {
        self.storage.global_mode(context).await
    }

    pub async fn get_subject_mode(&self, context: &str, subject: &str, default_to_global: bool) -> Result<Mode> {
        match self.storage.subject_mode(context, subject).await {
            Some(m) => Ok(m),
            None if default_to_global => Ok(self.storage.global_mode(context).await),
            None => Err(RegistryError::PlainNotFound(format!("mode not set for subject {subject}"))),
        }
    }

    pub async fn get_global_config(&self, context: &str) -> ConfigEntry {
        self.storage.global_config(context).await
    }

    pub async fn set_global_config(&self, context: &str, config: ConfigEntry) -> Result<()> {
        validate_config_rules(&config)?;
        self.storage.set_global_config(context, config).await;
        Ok(())
    }

    pub async fn get_subject_config(&self, context: &str, subject: &str, default_to_global: bool) -> Result<ConfigEntry> {
        match self.storage.subject_config(context, subject).await {
            Some(c) => Ok(c),
            None if default_to_global => Ok(self.storage.global_config(context).await),
            None => Err(RegistryError::SubjectCompatibilityNotConfigured(subject.to_owned())),
        }
    }

    pub async fn set_subject_config(&self, context: &str, subject: &str, config: ConfigEntry) -> Result<()> {
        validate_config_rules(&config)?;
        self.storage.set_subject_config(context, subject, Some(config)).await;
        Ok(())
    }

    pub async fn delete_subject_config(&self, context: &str, subject: &str) {
        self.storage.set_subject_config(context, subject, None).await;
    }

    pub async fn list_contexts(&self) -> Vec<String> {
        self.storage.list_contexts().await
    }

    pub async fn check_compatibility(
        &self,
        context: &str,
        subject: &str,
        version: VersionLookup,
        schema_type: SchemaType,
        schema_text: &str,
        schema_refs: &[SchemaReference],
        _normalize_query: Option<bool>,
    ) -> Result<compatibility::CompatVerdict> {
        let target_row = self.get_version(context, subject, version, false).await?;
        let target_parsed = self.parsed_for_version(context, &target_row).await?;

        let resolved = references::resolve(self.storage.as_ref(), context, schema_refs, false).await?;
        let parser_refs = references::as_parser_refs(&resolved);
        let parsed = parsers::parse(schema_type, schema_text, &parser_refs)?;

        let global_config = self.storage.global_config(context).await;
        let subject_config = self.storage.subject_config(context, subject).await;
        let level = subject_config
            .as_ref()
            .and_then(|c| c.compatibility_level)
            .unwrap_or_else(|| global_config.compatibility_level.unwrap_or_default());

        Ok(compatibility::check(level, &parsed, &[target_parsed]))
    }
}

fn validate_config_rules(config: &ConfigEntry) -> Result<()> {
    if let Some(rs) = &config.default_rule_set {
        crate::config::validate_rule_set(rs)?;
    }
    if let Some(rs) = &config.override_rule_set {
        crate::config::validate_rule_set(rs)?;
    }
    Ok(())
}

fn extract_field_names(parsed: &ParsedSchema) -> BTreeSet<String> {
    match parsed {
        ParsedSchema::Avro(a) => a
            .value
            .get("fields")
            .and_then(|f| f.as_array())
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| f.get("name").and_then(|n| n.as_str()).map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default(),
        ParsedSchema::Protobuf(p) => p
            .messages
            .iter()
            .flat_map(|m| m.fields.iter().map(|f| f.name.clone()))
            .collect(),
        ParsedSchema::Json(j) => j
            .value
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    fn core() -> RegistryCore {
        RegistryCore::new(Arc::new(InMemoryStorage::new()))
    }

    fn register_req(subject: &str, text: &str) -> RegisterRequest {
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
    async fn first_registration_allocates_id_one() {
        let core = core();
        let resp = core.register(register_req("s1", "\"string\"")).await.unwrap();
        assert_eq!(resp.id, 1);
        assert_eq!(resp.version, 1);
    }

    #[tokio::test]
    async fn identical_schema_under_new_subject_dedups_id() {
        let core = core();
        let first = core.register(register_req("s1", "\"string\"")).await.unwrap();
        let second = core.register(register_req("s2", "\"string\"")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.version, 1);
    }

    #[tokio::test]
    async fn reregistering_identical_schema_under_same_subject_does_not_bump_version() {
        let core = core();
        let first = core.register(register_req("s1", "\"string\"")).await.unwrap();
        let second = core.register(register_req("s1", "\"string\"")).await.unwrap();
        assert_eq!(first.version, second.version);
    }

    #[tokio::test]
    async fn readonly_mode_rejects_registration() {
        let core = core();
        core.set_global_mode(".", Mode::ReadOnly, false).await.unwrap();
        let err = core.register(register_req("s1", "\"string\"")).await.unwrap_err();
        assert!(matches!(err, RegistryError::OperationNotPermitted(_)));
    }

    #[tokio::test]
    async fn soft_delete_then_permanent_delete_version() {
        let core = core();
        core.register(register_req("s1", "\"string\"")).await.unwrap();
        core.soft_delete_version(".", "s1", 1).await.unwrap();
        let err = core.permanent_delete_version(".", "s1", 2).await.unwrap_err();
        assert!(matches!(err, RegistryError::VersionNotFound { .. }));
        core.permanent_delete_version(".", "s1", 1).await.unwrap();
        let err = core.get_version(".", "s1", VersionLookup::Number(1), true).await.unwrap_err();
        assert!(matches!(err, RegistryError::VersionNotFound { .. }));
    }

    #[tokio::test]
    async fn permanent_delete_of_sibling_keeps_shared_schema_id_resolvable() {
        let core = core();
        let a = core.register(register_req("s1", "\"string\"")).await.unwrap();
        core.register(register_req("s2", "\"string\"")).await.unwrap();
        core.soft_delete_version(".", "s1", 1).await.unwrap();
        core.permanent_delete_version(".", "s1", 1).await.unwrap();
        let schema = core.get_schema_by_id(".", a.id).await.unwrap();
        assert_eq!(schema.id, a.id);
    }

    #[tokio::test]
    async fn mode_transition_to_import_requires_empty_context_without_force() {
        let core = core();
        core.register(register_req("s1", "\"string\"")).await.unwrap();
        let err = core.set_global_mode(".", Mode::Import, false).await.unwrap_err();
        assert!(matches!(err, RegistryError::OperationNotPermitted(_)));
        core.set_global_mode(".", Mode::Import, true).await.unwrap();
    }
}
