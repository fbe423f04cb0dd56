//! Storage collaborator interface for canonical contacts.
//!
//! The trait defines what resolution needs from a backend; the in-memory
//! implementation is the reference backend.

mod memory;
mod traits;

pub use memory::InMemoryContactStore;
pub use traits::{ContactStore, StorageError};
