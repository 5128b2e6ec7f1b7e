//! C3 — storage interface.
//!
//! The core mandates only this trait (§6 "Persisted state shape"); the engine
//! behind it is an implementation detail. `InMemoryStorage` is the reference
//! implementation used by the registry core and by every test in this crate.
//! A durable backend (sled, postgres, ...) would implement the same trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{RegistryError, Result};
use crate::fingerprint::{Fingerprint, IdAllocator};
use crate::model::{ConfigEntry, Mode, Schema, SubjectMeta, SubjectVersion};

/// Everything the registry core needs to read and mutate, scoped to one context.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Creates the context row if it doesn't exist yet (implicit creation, §4.7).
    async fn ensure_context(&self, context: &str);

    async fn context_exists(&self, context: &str) -> bool;

    /// Lists all known context names (always includes the default).
    async fn list_contexts(&self) -> Vec<String>;

    /// Removes a context. Caller must have already verified it is empty.
    async fn remove_context(&self, context: &str) -> Result<()>;

    async fn id_allocator(&self, context: &str) -> Arc<IdAllocator>;

    async fn per_subject_lock(&self, context: &str, subject: &str) -> Arc<AsyncMutex<()>>;

    async fn get_schema_by_id(&self, context: &str, id: i64) -> Option<Schema>;

    async fn insert_schema(&self, context: &str, schema: Schema);

    /// Reverse index used for schema-id GC (§9 Open Question 3): the set of
    /// live `(subject, version)` pairs that still reference `id`.
    async fn schema_referrers(&self, context: &str, id: i64) -> Vec<(String, i32)>;

    async fn add_schema_referrer(&self, context: &str, id: i64, subject: &str, version: i32);

    async fn remove_schema_referrer(&self, context: &str, id: i64, subject: &str, version: i32);

    async fn get_subject(&self, context: &str, subject: &str) -> Option<SubjectMeta>;

    async fn list_subjects(&self, context: &str) -> Vec<String>;

    async fn ensure_subject(&self, context: &str, subject: &str) -> SubjectMeta;

    async fn save_subject_meta(&self, context: &str, subject: &str, meta: SubjectMeta);

    async fn remove_subject(&self, context: &str, subject: &str);

    async fn list_versions(&self, context: &str, subject: &str) -> Vec<SubjectVersion>;

    async fn get_version(&self, context: &str, subject: &str, version: i32) -> Option<SubjectVersion>;

    async fn insert_version(&self, context: &str, version: SubjectVersion);

    async fn save_version(&self, context: &str, version: SubjectVersion);

    async fn remove_version(&self, context: &str, subject: &str, version: i32);

    async fn global_config(&self, context: &str) -> ConfigEntry;

    async fn set_global_config(&self, context: &str, config: ConfigEntry);

    async fn subject_config(&self, context: &str, subject: &str) -> Option<ConfigEntry>;

    async fn set_subject_config(&self, context: &str, subject: &str, config: Option<ConfigEntry>);

    async fn global_mode(&self, context: &str) -> Mode;

    async fn set_global_mode(&self, context: &str, mode: Mode);

    async fn subject_mode(&self, context: &str, subject: &str) -> Option<Mode>;

    async fn set_subject_mode(&self, context: &str, subject: &str, mode: Option<Mode>);

    /// Referenced-by index: versions that hold a `Ref` pointing at whichever
    /// schema id `(subject, version)` currently resolves to. Resolved through
    /// the schema-id equivalence class rather than the literal pair, so a
    /// reference survives the deletion of the particular sibling it was
    /// originally declared against as long as another live version still
    /// shares that schema id (§8 scenario 5).
    async fn referenced_by(&self, context: &str, subject: &str, version: i32) -> Vec<(String, i32)>;

    async fn add_reference_edge(
        &self,
        context: &str,
        from_subject: &str,
        from_version: i32,
        to_subject: &str,
        to_version: i32,
    );

    async fn remove_reference_edges_from(&self, context: &str, subject: &str, version: i32);

    /// Total count of non-permanently-deleted schemas in the context (used by
    /// the READWRITE→IMPORT mode-transition guard, §4.2.7).
    async fn live_schema_count(&self, context: &str) -> usize;
}

#[derive(Default)]
struct ContextData {
    schemas: DashMap<i64, Schema>,
    schema_referrers: DashMap<i64, std::collections::BTreeSet<(String, i32)>>,
    subjects: DashMap<String, SubjectMeta>,
    versions: DashMap<String, BTreeMap<i32, SubjectVersion>>,
    global_config: AsyncMutexState<ConfigEntry>,
    subject_config: DashMap<String, ConfigEntry>,
    global_mode: AsyncMutexState<Mode>,
    subject_mode: DashMap<String, Mode>,
    /// Keyed by the *target's schema id*, not the literal `(subject,
    /// version)` it was declared against — see `Storage::referenced_by`.
    refs_by_target: DashMap<i64, std::collections::BTreeSet<(String, i32)>>,
    /// Per-edge bookkeeping for `remove_reference_edges_from`: the target
    /// schema id is captured at edge-creation time so removal never needs to
    /// re-resolve a target that may itself have since been deleted.
    refs_by_source: DashMap<(String, i32), Vec<(i64, String, i32)>>,
    id_alloc: Arc<IdAllocator>,
    subject_locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

/// Tiny wrapper so plain values can live behind a `std::sync::RwLock` without
/// pulling `tokio::sync::RwLock` in for data that's never held across `.await`.
struct AsyncMutexState<T>(std::sync::RwLock<T>);

impl<T: Default> Default for AsyncMutexState<T> {
    fn default() -> Self {
        Self(std::sync::RwLock::new(T::default()))
    }
}

impl<T: Clone> AsyncMutexState<T> {
    fn get(&self) -> T {
        self.0.read().unwrap().clone()
    }
    fn set(&self, v: T) {
        *self.0.write().unwrap() = v;
    }
}

/// Reference storage implementation: everything lives in-process, keyed by
/// context name. Suitable for tests and for single-node deployments; a
/// production backend would swap this struct out behind the same trait.
#[derive(Default)]
pub struct InMemoryStorage {
    contexts: DashMap<String, Arc<ContextData>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self, context: &str) -> Arc<ContextData> {
        self.contexts
            .entry(context.to_owned())
            .or_insert_with(|| Arc::new(ContextData::default()))
            .clone()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn ensure_context(&self, context: &str) {
        self.data(context);
    }

    async fn context_exists(&self, context: &str) -> bool {
        context == crate::model::DEFAULT_CONTEXT || self.contexts.contains_key(context)
    }

    async fn list_contexts(&self) -> Vec<String> {
        let mut names: Vec<String> = self.contexts.iter().map(|e| e.key().clone()).collect();
        if !names.iter().any(|n| n == crate::model::DEFAULT_CONTEXT) {
            names.push(crate::model::DEFAULT_CONTEXT.to_owned());
        }
        names.sort();
        names
    }

    async fn remove_context(&self, context: &str) -> Result<()> {
        self.contexts.remove(context);
        Ok(())
    }

    async fn id_allocator(&self, context: &str) -> Arc<IdAllocator> {
        self.data(context).id_alloc.clone()
    }

    async fn per_subject_lock(&self, context: &str, subject: &str) -> Arc<AsyncMutex<()>> {
        let data = self.data(context);
        data.subject_locks
            .entry(subject.to_owned())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    async fn get_schema_by_id(&self, context: &str, id: i64) -> Option<Schema> {
        self.data(context).schemas.get(&id).map(|e| e.clone())
    }

    async fn insert_schema(&self, context: &str, schema: Schema) {
        self.data(context).schemas.insert(schema.id, schema);
    }

    async fn schema_referrers(&self, context: &str, id: i64) -> Vec<(String, i32)> {
        self.data(context)
            .schema_referrers
            .get(&id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn add_schema_referrer(&self, context: &str, id: i64, subject: &str, version: i32) {
        self.data(context)
            .schema_referrers
            .entry(id)
            .or_default()
            .insert((subject.to_owned(), version));
    }

    async fn remove_schema_referrer(&self, context: &str, id: i64, subject: &str, version: i32) {
        let data = self.data(context);
        if let Some(mut set) = data.schema_referrers.get_mut(&id) {
            set.remove(&(subject.to_owned(), version));
        }
    }

    async fn get_subject(&self, context: &str, subject: &str) -> Option<SubjectMeta> {
        self.data(context).subjects.get(subject).map(|e| e.clone())
    }

    async fn list_subjects(&self, context: &str) -> Vec<String> {
        self.data(context).subjects.iter().map(|e| e.key().clone()).collect()
    }

    async fn ensure_subject(&self, context: &str, subject: &str) -> SubjectMeta {
        let data = self.data(context);
        data.subjects
            .entry(subject.to_owned())
            .or_insert_with(|| SubjectMeta { alias: None, next_version: 1, deleted: false })
            .clone()
    }

    async fn save_subject_meta(&self, context: &str, subject: &str, meta: SubjectMeta) {
        self.data(context).subjects.insert(subject.to_owned(), meta);
    }

    async fn remove_subject(&self, context: &str, subject: &str) {
        let data = self.data(context);
        data.subjects.remove(subject);
        data.versions.remove(subject);
        data.subject_config.remove(subject);
        data.subject_mode.remove(subject);
    }

    async fn list_versions(&self, context: &str, subject: &str) -> Vec<SubjectVersion> {
        self.data(context)
            .versions
            .get(subject)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    async fn get_version(&self, context: &str, subject: &str, version: i32) -> Option<SubjectVersion> {
        self.data(context)
            .versions
            .get(subject)
            .and_then(|m| m.get(&version).cloned())
    }

    async fn insert_version(&self, context: &str, version: SubjectVersion) {
        let data = self.data(context);
        data.versions
            .entry(version.subject.clone())
            .or_default()
            .insert(version.version, version);
    }

    async fn save_version(&self, context: &str, version: SubjectVersion) {
        self.insert_version(context, version).await;
    }

    async fn remove_version(&self, context: &str, subject: &str, version: i32) {
        let data = self.data(context);
        if let Some(mut m) = data.versions.get_mut(subject) {
            m.remove(&version);
        }
    }

    async fn global_config(&self, context: &str) -> ConfigEntry {
        self.data(context).global_config.get()
    }

    async fn set_global_config(&self, context: &str, config: ConfigEntry) {
        self.data(context).global_config.set(config);
    }

    async fn subject_config(&self, context: &str, subject: &str) -> Option<ConfigEntry> {
        self.data(context).subject_config.get(subject).map(|e| e.clone())
    }

    async fn set_subject_config(&self, context: &str, subject: &str, config: Option<ConfigEntry>) {
        let data = self.data(context);
        match config {
            Some(c) => {
                data.subject_config.insert(subject.to_owned(), c);
            }
            None => {
                data.subject_config.remove(subject);
            }
        }
    }

    async fn global_mode(&self, context: &str) -> Mode {
        self.data(context).global_mode.get()
    }

    async fn set_global_mode(&self, context: &str, mode: Mode) {
        self.data(context).global_mode.set(mode);
    }

    async fn subject_mode(&self, context: &str, subject: &str) -> Option<Mode> {
        self.data(context).subject_mode.get(subject).map(|e| *e)
    }

    async fn set_subject_mode(&self, context: &str, subject: &str, mode: Option<Mode>) {
        let data = self.data(context);
        match mode {
            Some(m) => {
                data.subject_mode.insert(subject.to_owned(), m);
            }
            None => {
                data.subject_mode.remove(subject);
            }
        }
    }

    async fn referenced_by(&self, context: &str, subject: &str, version: i32) -> Vec<(String, i32)> {
        let data = self.data(context);
        let schema_id = data.versions.get(subject).and_then(|m| m.get(&version).map(|v| v.schema_id));
        match schema_id {
            Some(id) => data.refs_by_target.get(&id).map(|s| s.iter().cloned().collect()).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    async fn add_reference_edge(
        &self,
        context: &str,
        from_subject: &str,
        from_version: i32,
        to_subject: &str,
        to_version: i32,
    ) {
        let data = self.data(context);
        let to_schema_id = data.versions.get(to_subject).and_then(|m| m.get(&to_version).map(|v| v.schema_id));
        let Some(to_schema_id) = to_schema_id else { return };
        data.refs_by_target
            .entry(to_schema_id)
            .or_default()
            .insert((from_subject.to_owned(), from_version));
        data.refs_by_source
            .entry((from_subject.to_owned(), from_version))
            .or_default()
            .push((to_schema_id, to_subject.to_owned(), to_version));
    }

    async fn remove_reference_edges_from(&self, context: &str, subject: &str, version: i32) {
        let data = self.data(context);
        if let Some((_, targets)) = data.refs_by_source.remove(&(subject.to_owned(), version)) {
            for (to_schema_id, _to_subject, _to_version) in targets {
                if let Some(mut set) = data.refs_by_target.get_mut(&to_schema_id) {
                    set.remove(&(subject.to_owned(), version));
                }
            }
        }
    }

    async fn live_schema_count(&self, context: &str) -> usize {
        self.data(context)
            .schema_referrers
            .iter()
            .filter(|e| !e.value().is_empty())
            .count()
    }
}

/// Convenience used by callers that only deal with storage errors in the
/// generic (non-domain) sense, e.g. a durable backend's I/O failure.
pub fn storage_error(msg: impl Into<String>) -> RegistryError {
    RegistryError::Storage(msg.into())
}
