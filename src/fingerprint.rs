//! Identity fingerprints and the claim table that serializes resolves.
//!
//! A fingerprint is a blake3 digest of a normalized identity key. Two resolves
//! whose records share a fingerprint never run their match-then-write section
//! at the same time; records without any fingerprint run alone.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use blake3::Hasher;

use crate::contact::ContactId;
use crate::error::{ResolveError, ResolveResult};
use crate::normalize::{NormalizedIdentity, Normalizer};

/// Length of the hex prefix used when a fingerprint is logged.
const SHORT_HEX_LEN: usize = 12;

/// Digest of a normalized identity key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    fn derive(kind: &str, key: &str) -> Self {
        let mut h = Hasher::new();
        h.update(kind.as_bytes());
        h.update(b":");
        h.update(key.as_bytes());
        Self(*h.finalize().as_bytes())
    }

    /// Fingerprint of a normalized email.
    #[must_use]
    pub fn email(normalized: &str) -> Self {
        Self::derive("email", normalized)
    }

    /// Fingerprint of normalized phone digits.
    #[must_use]
    pub fn phone(digits: &str) -> Self {
        Self::derive("phone", digits)
    }

    /// Fingerprint guarding writes to one stored contact.
    #[must_use]
    pub fn contact(id: ContactId) -> Self {
        Self::derive("contact", &id.to_string())
    }

    /// Short hex form for logs. Never reveals the underlying key.
    #[must_use]
    pub fn short(&self) -> String {
        let hex = blake3::Hash::from(self.0).to_hex();
        hex.as_str()[..SHORT_HEX_LEN].to_string()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Fingerprints for an identity: its email, then its phone if usable.
///
/// Sorted and deduplicated. Empty when the record carries neither.
#[must_use]
pub fn fingerprints_for(identity: &NormalizedIdentity, normalizer: &Normalizer) -> Vec<Fingerprint> {
    let mut out = Vec::with_capacity(2);
    if !identity.email.is_empty() {
        out.push(Fingerprint::email(&identity.email));
    }
    if normalizer.is_usable_phone(&identity.phone) {
        out.push(Fingerprint::phone(&identity.phone));
    }
    out.sort();
    out.dedup();
    out
}

/// Joins fingerprints for a log field.
pub(crate) fn describe(fingerprints: &[Fingerprint]) -> String {
    if fingerprints.is_empty() {
        return "-".to_string();
    }
    fingerprints
        .iter()
        .map(Fingerprint::short)
        .collect::<Vec<_>>()
        .join(",")
}

fn poisoned(context: &'static str) -> ResolveError {
    ResolveError::internal(format!("poisoned lock: {context}"))
}

/// Table of currently claimed fingerprints.
///
/// Claims are all-or-nothing: a caller waits until none of its fingerprints
/// is held, then takes all of them at once, so overlapping claims cannot
/// deadlock. Released fingerprints are removed from the table.
#[derive(Debug, Default)]
pub struct FingerprintLocks {
    gate: RwLock<()>,
    held: Mutex<BTreeSet<Fingerprint>>,
    released: Condvar,
}

// Guards are held only for their drop.
#[allow(dead_code)]
enum Gate<'a> {
    Shared(RwLockReadGuard<'a, ()>),
    Exclusive(RwLockWriteGuard<'a, ()>),
}

/// A set of claimed fingerprints, released on drop.
#[must_use = "the claim is released when dropped"]
pub struct Claim<'a> {
    locks: &'a FingerprintLocks,
    fingerprints: Vec<Fingerprint>,
}

impl Claim<'_> {
    /// The claimed fingerprints, sorted.
    #[must_use]
    pub fn fingerprints(&self) -> &[Fingerprint] {
        &self.fingerprints
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if self.fingerprints.is_empty() {
            return;
        }
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for fp in &self.fingerprints {
            held.remove(fp);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}

/// Exclusive access to one identity for the duration of a resolve.
#[must_use = "the identity is unlocked when dropped"]
pub struct IdentityGuard<'a> {
    // Declared before the gate so claims are released first.
    claim: Claim<'a>,
    gate: Gate<'a>,
}

impl IdentityGuard<'_> {
    /// True when the record had no fingerprint and runs alone.
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        matches!(self.gate, Gate::Exclusive(_))
    }

    /// The fingerprints held by this guard.
    #[must_use]
    pub fn fingerprints(&self) -> &[Fingerprint] {
        self.claim.fingerprints()
    }
}

impl FingerprintLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks an identity.
    ///
    /// With no fingerprints the gate is taken exclusively, serializing the
    /// caller against every other resolve.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Internal` if a lock is poisoned.
    pub fn lock_identity(&self, fingerprints: Vec<Fingerprint>) -> ResolveResult<IdentityGuard<'_>> {
        if fingerprints.is_empty() {
            let gate = self.gate.write().map_err(|_| poisoned("fingerprint.gate"))?;
            return Ok(IdentityGuard {
                claim: Claim {
                    locks: self,
                    fingerprints: Vec::new(),
                },
                gate: Gate::Exclusive(gate),
            });
        }

        let gate = self.gate.read().map_err(|_| poisoned("fingerprint.gate"))?;
        let claim = self.claim(fingerprints)?;
        Ok(IdentityGuard {
            claim,
            gate: Gate::Shared(gate),
        })
    }

    /// Claims fingerprints, waiting while any of them is held elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Internal` if the table lock is poisoned.
    pub fn claim(&self, mut fingerprints: Vec<Fingerprint>) -> ResolveResult<Claim<'_>> {
        fingerprints.sort();
        fingerprints.dedup();

        let mut held: MutexGuard<'_, BTreeSet<Fingerprint>> =
            self.held.lock().map_err(|_| poisoned("fingerprint.claim"))?;
        while fingerprints.iter().any(|fp| held.contains(fp)) {
            held = self
                .released
                .wait(held)
                .map_err(|_| poisoned("fingerprint.claim"))?;
        }
        held.extend(fingerprints.iter().copied());

        Ok(Claim {
            locks: self,
            fingerprints,
        })
    }

    /// Number of fingerprints currently claimed.
    #[must_use]
    pub fn held_len(&self) -> usize {
        self.held
            .lock()
            .map(|held| held.len())
            .unwrap_or_else(|e| e.into_inner().len())
    }
}
