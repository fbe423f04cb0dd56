//! In-memory storage backend.
//!
//! Thread-safe implementation of [`ContactStore`]. It is intended for
//! embedded usage, tests, and as a reference implementation.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::contact::{CanonicalContact, ContactId};
use crate::storage::traits::{ContactStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct ContactState {
    by_id: BTreeMap<ContactId, CanonicalContact>,
    versions: BTreeMap<ContactId, BTreeMap<u64, CanonicalContact>>,
}

fn record_contact_version(
    state: &mut ContactState,
    contact: &CanonicalContact,
    context: &'static str,
) -> Result<(), StorageError> {
    let versions = state.versions.entry(contact.id).or_default();
    if versions.contains_key(&contact.version) {
        return Err(StorageError::BackendError(format!(
            "duplicate contact version ({context}): id={} version={}",
            contact.id, contact.version
        )));
    }
    versions.insert(contact.version, contact.clone());
    Ok(())
}

/// Thread-safe in-memory contact store.
#[derive(Debug, Default)]
pub struct InMemoryContactStore {
    state: RwLock<ContactState>,
}

impl InMemoryContactStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with contacts.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` if two contacts share an id.
    pub fn with_contacts(
        contacts: impl IntoIterator<Item = CanonicalContact>,
    ) -> Result<Self, StorageError> {
        let store = Self::new();
        for contact in contacts {
            store.create(contact)?;
        }
        Ok(store)
    }

    /// Number of stored contacts.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("contact.len"))?;
        Ok(state.by_id.len())
    }

    /// Returns true if no contact is stored.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl ContactStore for InMemoryContactStore {
    fn create(&self, contact: CanonicalContact) -> Result<CanonicalContact, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("contact.create"))?;
        if state.by_id.contains_key(&contact.id) {
            return Err(StorageError::DuplicateKey(contact.id.to_string()));
        }

        record_contact_version(&mut state, &contact, "contact.create")?;
        state.by_id.insert(contact.id, contact.clone());
        Ok(contact)
    }

    fn get(&self, id: ContactId) -> Result<Option<CanonicalContact>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("contact.get"))?;
        Ok(state.by_id.get(&id).cloned())
    }

    fn update(&self, contact: CanonicalContact) -> Result<CanonicalContact, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("contact.update"))?;
        let stored = state
            .by_id
            .get(&contact.id)
            .map(|prev| prev.version)
            .ok_or(StorageError::ContactNotFound(contact.id))?;

        if contact.version <= stored {
            return Err(StorageError::VersionConflict {
                id: contact.id,
                stored,
                attempted: contact.version,
            });
        }

        record_contact_version(&mut state, &contact, "contact.update")?;
        state.by_id.insert(contact.id, contact.clone());
        Ok(contact)
    }

    fn list_all(&self) -> Result<Vec<CanonicalContact>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("contact.list_all"))?;
        Ok(state.by_id.values().cloned().collect())
    }

    fn list_versions(&self, id: ContactId) -> Result<Vec<CanonicalContact>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("contact.list_versions"))?;
        Ok(state
            .versions
            .get(&id)
            .map(|versions| versions.values().cloned().collect())
            .unwrap_or_default())
    }
}
