//! # contactlink - Contact Identity Resolution
//!
//! contactlink decides whether an incoming contact record from an upstream
//! platform (a booking tool, a CRM, a form) describes a person already known
//! to the system, and if so folds the new observation into that person's
//! canonical contact without losing data from either side.
//!
//! ## Core Concepts
//!
//! - **Canonical contact**: the single merged record for one real person
//! - **Raw record**: one observation of a person from one lead source
//! - **Confidence**: ordered classification of a match (`Exact > High > Medium > Low > None`)
//! - **Fingerprint**: normalized email or phone key that serializes concurrent creates
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use contactlink::{Confidence, InMemoryContactStore, RawRecord, Resolver};
//!
//! let resolver = Resolver::with_defaults(Arc::new(InMemoryContactStore::new()))?;
//!
//! let record = RawRecord::new("calendly")
//!     .with_name("Bob Smith")
//!     .with_email("j.doe+calendly@gmail.com");
//!
//! // Preview without mutating storage
//! let preview = resolver.find_best_match(&record)?;
//!
//! // Link or create
//! let resolution = resolver.resolve(&record, Confidence::High)?;
//! assert!(resolution.created || resolution.confidence >= Confidence::High);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod confidence;
pub mod config;
pub mod contact;
pub mod error;

// Matching
pub mod index;
pub mod matcher;
pub mod normalize;
pub mod similarity;

// Resolution
pub mod batch;
pub mod fingerprint;
pub mod merge;
pub mod resolver;
pub mod runtime;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use batch::{BatchOutcome, BatchReport, SkippedRecord};
pub use confidence::Confidence;
pub use config::{
    EmailProviderRule, MatchingConfig, MergeConfig, NormalizationConfig, ResolverConfig,
    RuntimeConfig,
};
pub use contact::{CanonicalContact, ContactId, LeadSources, RawRecord};
pub use error::{BatchError, ConfigError, ResolveError, ResolveResult, ValidationError};
pub use fingerprint::Fingerprint;
pub use index::ContactIndex;
pub use matcher::{MatchReason, MatchResult, Matcher};
pub use merge::MergePolicy;
pub use normalize::{NormalizedIdentity, NormalizedName, Normalizer};
pub use resolver::{Resolution, Resolver};
pub use runtime::{JobHandle, ResolutionRuntime};
pub use storage::{ContactStore, InMemoryContactStore, StorageError};
