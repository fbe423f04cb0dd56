//! Resolution coordinator.
//!
//! Runs the matcher against the contact index, then either merges the record
//! into the matched contact or creates a new one, persisting through the
//! [`ContactStore`]. Match-then-write runs inside a per-identity critical
//! section so that concurrent resolves for one person create at most one
//! contact.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::confidence::Confidence;
use crate::config::ResolverConfig;
use crate::contact::{CanonicalContact, ContactId, RawRecord};
use crate::error::{ResolveError, ResolveResult};
use crate::fingerprint::{describe, fingerprints_for, Fingerprint, FingerprintLocks};
use crate::index::ContactIndex;
use crate::matcher::{MatchReason, MatchResult, Matcher};
use crate::merge::MergePolicy;
use crate::normalize::Normalizer;
use crate::storage::{ContactStore, StorageError};

/// Outcome of [`Resolver::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    /// The contact as persisted.
    pub contact: CanonicalContact,
    /// True when no acceptable match existed and a contact was created.
    pub created: bool,
    /// Which rule decided the match.
    pub reason: MatchReason,
    /// Confidence of the best match, even when it fell below the minimum.
    pub confidence: Confidence,
    /// Score of the deciding signal.
    pub score: f64,
}

/// Resolution coordinator over a contact store.
pub struct Resolver {
    store: Arc<dyn ContactStore>,
    config: ResolverConfig,
    normalizer: Normalizer,
    matcher: Matcher,
    merge: MergePolicy,
    index: RwLock<ContactIndex>,
    locks: FingerprintLocks,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Creates a resolver and loads its index from the store.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid config, or a storage error if
    /// the initial `list_all` fails.
    pub fn new(store: Arc<dyn ContactStore>, config: ResolverConfig) -> ResolveResult<Self> {
        config.validate()?;

        let normalizer = Normalizer::new(&config.normalization);
        let index = ContactIndex::build(normalizer.clone(), store.list_all()?);
        info!(contacts = index.len(), "contact index loaded");

        Ok(Self {
            matcher: Matcher::new(config.matching.clone()),
            merge: MergePolicy::new(config.merge.clone()),
            index: RwLock::new(index),
            locks: FingerprintLocks::new(),
            normalizer,
            store,
            config,
        })
    }

    /// Creates a resolver with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the initial `list_all` fails.
    pub fn with_defaults(store: Arc<dyn ContactStore>) -> ResolveResult<Self> {
        Self::new(store, ResolverConfig::default())
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The backing contact store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ContactStore> {
        &self.store
    }

    fn read_index(&self) -> ResolveResult<RwLockReadGuard<'_, ContactIndex>> {
        self.index
            .read()
            .map_err(|_| ResolveError::internal("poisoned lock: resolver.index"))
    }

    fn write_index(&self) -> ResolveResult<RwLockWriteGuard<'_, ContactIndex>> {
        self.index
            .write()
            .map_err(|_| ResolveError::internal("poisoned lock: resolver.index"))
    }

    /// Number of contacts in the index.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Internal` if the index lock is poisoned.
    pub fn indexed_len(&self) -> ResolveResult<usize> {
        Ok(self.read_index()?.len())
    }

    /// Previews linkage without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Internal` if the index lock is poisoned.
    pub fn find_best_match(&self, record: &RawRecord) -> ResolveResult<MatchResult> {
        let index = self.read_index()?;
        Ok(self.matcher.find_best_match(&index, record))
    }

    /// Resolves a record using the configured `min_confidence`.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve`].
    pub fn resolve_default(&self, record: &RawRecord) -> ResolveResult<Resolution> {
        self.resolve(record, self.config.min_confidence)
    }

    /// Links `record` to an existing contact or creates a new one.
    ///
    /// A match is accepted when its confidence is at least `min_confidence`;
    /// a `None` result never merges.
    ///
    /// # Errors
    ///
    /// - `ValidationError::MissingIdentity` when a create is required and the
    ///   record has neither name nor email.
    /// - `StorageError` when the store fails; nothing is mutated in that case.
    pub fn resolve(&self, record: &RawRecord, min_confidence: Confidence) -> ResolveResult<Resolution> {
        let identity = self.normalizer.record_identity(record);
        let fingerprints = fingerprints_for(&identity, &self.normalizer);
        let fingerprint = describe(&fingerprints);

        let guard = self.locks.lock_identity(fingerprints)?;

        let result = {
            let index = self.read_index()?;
            self.matcher.find_best_match_for(&index, record, &identity)
        };
        debug!(
            fingerprint = %fingerprint,
            exclusive = guard.is_exclusive(),
            confidence = %result.confidence,
            reason = %result.reason,
            score = result.score,
            "match evaluated"
        );

        let accept = result.confidence != Confidence::None && result.confidence.meets(min_confidence);
        match result.contact_id() {
            Some(id) if accept => self.merge_into(id, record, &result, &fingerprint),
            _ => self.create_from(record, &result, &fingerprint),
        }
    }

    fn merge_into(
        &self,
        id: ContactId,
        record: &RawRecord,
        result: &MatchResult,
        fingerprint: &str,
    ) -> ResolveResult<Resolution> {
        // Disjoint identities can still land on the same contact.
        let _contact = self.locks.claim(vec![Fingerprint::contact(id)])?;

        let existing = self
            .store
            .get(id)?
            .ok_or(StorageError::ContactNotFound(id))?;
        let mut merged = self.merge.merge(&existing, record);
        merged.touch(Utc::now());
        let stored = self.store.update(merged)?;
        self.write_index()?.upsert(stored.clone());

        if result.is_ambiguous() {
            warn!(
                contact_id = %stored.id,
                fingerprint = %fingerprint,
                confidence = %result.confidence,
                reason = %result.reason,
                "accepted ambiguous match"
            );
        }
        info!(
            contact_id = %stored.id,
            version = stored.version,
            source = %record.lead_source_tag,
            reason = %result.reason,
            "merged record into contact"
        );

        Ok(Resolution {
            contact: stored,
            created: false,
            reason: result.reason,
            confidence: result.confidence,
            score: result.score,
        })
    }

    fn create_from(
        &self,
        record: &RawRecord,
        result: &MatchResult,
        fingerprint: &str,
    ) -> ResolveResult<Resolution> {
        let contact = self.merge.create(record)?;
        let stored = self.store.create(contact)?;
        self.write_index()?.upsert(stored.clone());

        info!(
            contact_id = %stored.id,
            fingerprint = %fingerprint,
            source = %record.lead_source_tag,
            best_confidence = %result.confidence,
            "created contact"
        );

        Ok(Resolution {
            contact: stored,
            created: true,
            reason: result.reason,
            confidence: result.confidence,
            score: result.score,
        })
    }

    /// Rebuilds the index from the store.
    ///
    /// Needed only when other writers share the store. Takes the identity gate
    /// exclusively so no resolve observes a half-built index.
    ///
    /// # Errors
    ///
    /// Returns a storage error if `list_all` fails; the old index is kept.
    pub fn refresh_index(&self) -> ResolveResult<usize> {
        let _guard = self.locks.lock_identity(Vec::new())?;
        let contacts = self.store.list_all()?;
        let mut index = self.write_index()?;
        *index = ContactIndex::build(self.normalizer.clone(), contacts);
        info!(contacts = index.len(), "contact index refreshed");
        Ok(index.len())
    }
}
