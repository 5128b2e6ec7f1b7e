//! C6 — config / metadata / ruleSet manager.
//!
//! The three-layer merge (§4.6) and reserved-field validation. This module is
//! pure: it never touches storage, so the registry core can call it inside
//! the per-subject critical section without extra await points.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{RegistryError, Result};
use crate::model::{ConfigEntry, Metadata, Rule, RuleKind, RuleMode, RuleSet};

/// `final = (default ∪ request_or_inherited) ∪ override`, key-level
/// last-write-wins for `properties`; per-key list union for `tags`; list
/// union (dedup) for `sensitive` (§4.6).
pub fn merge_metadata(
    default: Option<&Metadata>,
    request_or_inherited: Option<&Metadata>,
    overrid: Option<&Metadata>,
) -> Metadata {
    let mut properties = BTreeMap::new();
    let mut tags: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut sensitive: BTreeSet<String> = BTreeSet::new();

    for layer in [default, request_or_inherited, overrid] {
        if let Some(m) = layer {
            for (k, v) in &m.properties {
                properties.insert(k.clone(), v.clone());
            }
            for (k, v) in &m.tags {
                tags.entry(k.clone()).or_default().extend(v.iter().cloned());
            }
            sensitive.extend(m.sensitive.iter().cloned());
        }
    }

    Metadata {
        properties,
        tags,
        sensitive: sensitive.into_iter().collect(),
    }
}

/// Stamps `confluent:version` — always populated after merge (§4.2.1 step 4).
pub fn stamp_version(metadata: &mut Metadata, version: i32) {
    metadata.properties.insert("confluent:version".to_owned(), version.to_string());
}

/// Rule lists: concatenate default + request_or_inherited, then for every
/// rule in `overrid`, replace any rule with the same name or append if new.
fn merge_rule_list(default: &[Rule], request_or_inherited: &[Rule], overrid: &[Rule]) -> Vec<Rule> {
    let mut merged: Vec<Rule> = default.iter().cloned().chain(request_or_inherited.iter().cloned()).collect();
    for rule in overrid {
        if let Some(existing) = merged.iter_mut().find(|r| r.name == rule.name) {
            *existing = rule.clone();
        } else {
            merged.push(rule.clone());
        }
    }
    merged
}

pub fn merge_rule_set(default: Option<&RuleSet>, request_or_inherited: Option<&RuleSet>, overrid: Option<&RuleSet>) -> RuleSet {
    let empty = RuleSet::default();
    let d = default.unwrap_or(&empty);
    let r = request_or_inherited.unwrap_or(&empty);
    let o = overrid.unwrap_or(&empty);
    RuleSet {
        domain_rules: merge_rule_list(&d.domain_rules, &r.domain_rules, &o.domain_rules),
        migration_rules: merge_rule_list(&d.migration_rules, &r.migration_rules, &o.migration_rules),
        encoding_rules: merge_rule_list(&d.encoding_rules, &r.encoding_rules, &o.encoding_rules),
    }
}

/// §4.6 rule validation: always runs before storage, independent of
/// `validateFields`.
pub fn validate_rule_set(rule_set: &RuleSet) -> Result<()> {
    for rule in rule_set.domain_rules.iter().chain(rule_set.encoding_rules.iter()) {
        validate_rule(rule, &[RuleMode::Write, RuleMode::Read, RuleMode::WriteRead])?;
    }
    for rule in &rule_set.migration_rules {
        validate_rule(rule, &[RuleMode::Upgrade, RuleMode::Downgrade, RuleMode::UpDown])?;
    }
    Ok(())
}

fn validate_rule(rule: &Rule, allowed_modes: &[RuleMode]) -> Result<()> {
    if rule.name.trim().is_empty() {
        return Err(RegistryError::InvalidSchema("rule name must not be empty".into()));
    }
    if !matches!(rule.kind, RuleKind::Condition | RuleKind::Transform) {
        return Err(RegistryError::InvalidSchema(format!("rule {} has invalid kind", rule.name)));
    }
    if !allowed_modes.contains(&rule.mode) {
        return Err(RegistryError::InvalidSchema(format!("rule {} has a mode not valid for its rule list", rule.name)));
    }
    Ok(())
}

/// Parses the `confluent:reserved` token list: comma/whitespace separated.
fn reserved_tokens(metadata: &Metadata) -> BTreeSet<String> {
    metadata
        .properties
        .get("confluent:reserved")
        .map(|raw| {
            raw.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// §4.6 reserved-field rules, only invoked when `validateFields` resolves to
/// `true`. Rule 1: no field name collides with a reserved token. Rule 2: the
/// previous version's reserved set must be a subset of this version's.
pub fn validate_reserved_fields(
    merged_metadata: &Metadata,
    field_names: &BTreeSet<String>,
    previous_version_metadata: Option<&Metadata>,
) -> Result<()> {
    let reserved = reserved_tokens(merged_metadata);

    for field in field_names {
        if reserved.contains(field) {
            return Err(RegistryError::InvalidSchema(format!(
                "field '{field}' collides with a confluent:reserved token"
            )));
        }
    }

    if let Some(prev) = previous_version_metadata {
        let prev_reserved = reserved_tokens(prev);
        if !prev_reserved.is_subset(&reserved) {
            let missing: Vec<&String> = prev_reserved.difference(&reserved).collect();
            return Err(RegistryError::InvalidSchema(format!(
                "reserved tokens dropped from previous version: {missing:?}"
            )));
        }
    }

    Ok(())
}

/// Resolves `validateFields` for a registration: subject-level wins over
/// global (§4.6).
pub fn effective_validate_fields(global: &ConfigEntry, subject: Option<&ConfigEntry>) -> bool {
    subject
        .and_then(|c| c.validate_fields)
        .or(global.validate_fields)
        .unwrap_or(false)
}

/// Resolves `normalize` for fingerprinting when the query flag is absent.
pub fn effective_normalize(global: &ConfigEntry, subject: Option<&ConfigEntry>, query_flag: Option<bool>) -> bool {
    query_flag
        .or_else(|| subject.and_then(|c| c.normalize))
        .or(global.normalize)
        .unwrap_or(false)
}
