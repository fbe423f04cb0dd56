//! Abstract storage traits for canonical contacts.
//!
//! Storage of canonical contacts is owned by an external collaborator. These
//! traits define the contract it must honour so that resolution can run over:
//! - In-memory backends for testing and embedded use
//! - Relational or key-value backends in production

use thiserror::Error;

use crate::contact::{CanonicalContact, ContactId};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Contact not found.
    #[error("Contact not found: {0}")]
    ContactNotFound(ContactId),

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// An update did not advance the stored version.
    #[error("Version conflict for {id}: stored={stored} attempted={attempted}")]
    VersionConflict {
        /// The contact being updated.
        id: ContactId,
        /// Version currently stored.
        stored: u64,
        /// Version the update carried.
        attempted: u64,
    },

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Connection failed.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The backend did not answer in time.
    #[error("Storage operation timed out after {duration_ms}ms")]
    Timeout {
        /// How long the call ran before giving up.
        duration_ms: u64,
    },
}

/// Storage trait for canonical contacts.
///
/// # Safety Considerations
/// - All mutations should be atomic: a failed call leaves no partial state
/// - Implementations should handle concurrent access safely
pub trait ContactStore: Send + Sync {
    /// Persist a new contact. Returns `DuplicateKey` if the id already exists.
    fn create(&self, contact: CanonicalContact) -> Result<CanonicalContact, StorageError>;

    /// Get a contact by id.
    fn get(&self, id: ContactId) -> Result<Option<CanonicalContact>, StorageError>;

    /// Replace an existing contact.
    ///
    /// # Errors
    /// - `ContactNotFound`: no contact with this id exists
    /// - `VersionConflict`: `contact.version` is not greater than the stored version
    fn update(&self, contact: CanonicalContact) -> Result<CanonicalContact, StorageError>;

    /// All contacts, ascending by id.
    fn list_all(&self) -> Result<Vec<CanonicalContact>, StorageError>;

    /// Every stored version of a contact, ascending by version.
    ///
    /// Returns an empty list for unknown ids.
    fn list_versions(&self, id: ContactId) -> Result<Vec<CanonicalContact>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure the trait is object-safe
    fn _assert_contact_store_object_safe(_: &dyn ContactStore) {}

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::ContactNotFound(ContactId::new());
        assert!(err.to_string().contains("Contact not found"));

        let err = StorageError::BackendError("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));

        let err = StorageError::VersionConflict {
            id: ContactId::new(),
            stored: 3,
            attempted: 3,
        };
        assert!(err.to_string().contains("stored=3"));
    }
}
