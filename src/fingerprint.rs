//! C2 — fingerprint / id allocator.
//!
//! The fingerprint is a deterministic function of `(schemaType, canonicalText,
//! sorted(references))`. Allocation is a per-context atomic counter guarded by
//! `dashmap`, which already tolerates concurrent reads during a write (§5).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;

use crate::model::{SchemaReference, SchemaType};

/// A 64-bit digest of `(schemaType, canonicalText, references)`.
///
/// `DefaultHasher` (SipHash) is adequate here: fingerprints are compared for
/// equality within a single process's lifetime, never persisted across
/// versions of the hasher, so there's no cross-version stability requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn compute(schema_type: SchemaType, canonical_text: &str, references: &[SchemaReference]) -> Self {
        let mut sorted_refs: Vec<&SchemaReference> = references.iter().collect();
        sorted_refs.sort_by(|a, b| (a.subject.as_str(), a.version, a.name.as_str()).cmp(&(b.subject.as_str(), b.version, b.name.as_str())));

        let mut hasher = DefaultHasher::new();
        schema_type.hash(&mut hasher);
        canonical_text.hash(&mut hasher);
        for r in sorted_refs {
            r.name.hash(&mut hasher);
            r.subject.hash(&mut hasher);
            r.version.hash(&mut hasher);
        }
        Self(hasher.finish())
    }
}

/// Per-context id sequence plus the fingerprint→id dedup index (§4.4).
///
/// One instance lives per context inside `storage::InMemoryStorage`.
#[derive(Debug)]
pub struct IdAllocator {
    next_id: AtomicI64,
    fingerprint_to_id: DashMap<Fingerprint, i64>,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            fingerprint_to_id: DashMap::new(),
        }
    }

    /// Looks up an existing id for `fingerprint` without allocating.
    pub fn lookup(&self, fingerprint: Fingerprint) -> Option<i64> {
        self.fingerprint_to_id.get(&fingerprint).map(|v| *v)
    }

    /// Auto-allocates the next id and binds it to `fingerprint`.
    ///
    /// Caller must already hold the per-subject critical section (§5); this is
    /// the monotone counter bump, not a compare-and-swap retry loop.
    pub fn allocate(&self, fingerprint: Fingerprint) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.fingerprint_to_id.insert(fingerprint, id);
        id
    }

    /// Binds an explicit, caller-supplied id (IMPORT / C9) to `fingerprint`.
    ///
    /// Advances `next_id` to `max(next_id, id + 1)` per I4. Returns `Err` if
    /// `id` is already bound to a *different* fingerprint.
    pub fn bind_explicit(&self, id: i64, fingerprint: Fingerprint) -> Result<(), Fingerprint> {
        if let Some(existing) = self.fingerprint_to_id.iter().find(|e| *e.value() == id) {
            if *existing.key() != fingerprint {
                return Err(*existing.key());
            }
        }
        self.fingerprint_to_id.insert(fingerprint, id);
        self.advance_past(id);
        Ok(())
    }

    fn advance_past(&self, id: i64) {
        self.next_id.fetch_max(id + 1, Ordering::SeqCst);
    }

    pub fn peek_next(&self) -> i64 {
        self.next_id.load(Ordering::SeqCst)
    }
}
