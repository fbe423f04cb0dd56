//! Field-level merge of an incoming record into a matched contact.
//!
//! The policy is asymmetric: data already on the canonical contact generally
//! wins, and incoming data fills gaps. Each field has an explicit rule:
//!
//! | Field               | Rule                                                    |
//! |---------------------|---------------------------------------------------------|
//! | `name`              | multi-token beats single-token, then longer wins        |
//! | `email`             | keep existing; adopt incoming only if none               |
//! | `phone`             | adopt incoming if it has strictly more digits            |
//! | `company`, `title`  | keep existing; adopt incoming only if none               |
//! | `lead_source`       | union                                                    |
//! | `notes`             | append incoming unless it is already the latest entry    |
//! | `status`            | sales stages are sticky; otherwise adopt incoming        |
//! | `last_activity_date`| later of the two                                         |
//! | `metadata`          | key-wise union, existing keys win                        |

use crate::config::MergeConfig;
use crate::contact::{non_blank, CanonicalContact, ContactId, LeadSources, RawRecord};
use crate::error::ValidationError;
use crate::normalize::normalize_phone;

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// A stored value that is not blank, returned exactly as stored.
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn is_full_name(name: &str) -> bool {
    name.split_whitespace().nth(1).is_some()
}

fn merge_name(existing: Option<&str>, incoming: Option<&str>) -> Option<String> {
    let (existing, incoming) = match (present(existing), non_blank(incoming)) {
        (Some(e), Some(i)) => (e, i),
        (e, i) => return owned(e.or(i)),
    };
    let current = existing.trim();
    let pick = match (is_full_name(current), is_full_name(incoming)) {
        (true, false) => existing,
        (false, true) => incoming,
        _ if incoming.chars().count() > current.chars().count() => incoming,
        _ => existing,
    };
    Some(pick.to_string())
}

fn keep_existing(existing: Option<&str>, incoming: Option<&str>) -> Option<String> {
    owned(present(existing).or_else(|| non_blank(incoming)))
}

fn merge_phone(existing: Option<&str>, incoming: Option<&str>) -> Option<String> {
    match (present(existing), non_blank(incoming)) {
        (Some(e), Some(i)) if normalize_phone(i).len() > normalize_phone(e).len() => owned(Some(i)),
        (Some(e), _) => owned(Some(e)),
        (None, i) => owned(i),
    }
}

fn merge_metadata(primary: &serde_json::Value, secondary: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match (primary, secondary) {
        (Value::Null, other) => other.clone(),
        (Value::Object(a), Value::Object(b)) => {
            let mut out = a.clone();
            for (k, v) in b {
                out.entry(k.clone()).or_insert_with(|| v.clone());
            }
            Value::Object(out)
        }
        (a, _) => a.clone(),
    }
}

/// Merge policy engine.
#[derive(Debug, Clone, Default)]
pub struct MergePolicy {
    config: MergeConfig,
}

impl MergePolicy {
    /// Creates a policy from merge settings.
    #[must_use]
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// The merge settings in use.
    #[must_use]
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    fn is_sales_stage(&self, status: &str) -> bool {
        self.config
            .sales_stages
            .iter()
            .any(|stage| stage.trim().eq_ignore_ascii_case(status))
    }

    fn merge_status(&self, existing: Option<&str>, incoming: Option<&str>) -> Option<String> {
        match (present(existing), non_blank(incoming)) {
            (Some(e), _) if self.is_sales_stage(e.trim()) => owned(Some(e)),
            (e, i) => owned(i.or(e)),
        }
    }

    fn merge_notes(&self, existing: Option<&str>, incoming: Option<&str>) -> Option<String> {
        match (present(existing), non_blank(incoming)) {
            (Some(e), Some(i)) => {
                let delimiter = self.config.notes_delimiter.as_str();
                // A retried record finds its note as the latest entry; earlier
                // entries never suppress an append.
                let last = e.trim_end();
                let retried = last == i
                    || (!delimiter.is_empty() && last.ends_with(&format!("{delimiter}{i}")));
                if retried {
                    owned(Some(e))
                } else {
                    Some(format!("{e}{delimiter}{i}"))
                }
            }
            (e, i) => owned(e.or(i)),
        }
    }

    /// Merges `incoming` into `existing`.
    ///
    /// Total and deterministic. Identity (`id`, `created_at`) and bookkeeping
    /// (`version`, `updated_at`) are carried over unchanged; the caller bumps
    /// them when persisting.
    #[must_use]
    pub fn merge(&self, existing: &CanonicalContact, incoming: &RawRecord) -> CanonicalContact {
        let incoming_activity = incoming.activity_at();
        CanonicalContact {
            id: existing.id,
            name: merge_name(existing.name.as_deref(), incoming.name.as_deref()),
            email: keep_existing(existing.email.as_deref(), incoming.email.as_deref()),
            phone: merge_phone(existing.phone.as_deref(), incoming.phone.as_deref()),
            company: keep_existing(existing.company.as_deref(), incoming.company.as_deref()),
            title: keep_existing(existing.title.as_deref(), incoming.title.as_deref()),
            lead_source: existing
                .lead_source
                .union(&LeadSources::single(&incoming.lead_source_tag)),
            status: self.merge_status(existing.status.as_deref(), incoming.status.as_deref()),
            notes: self.merge_notes(existing.notes.as_deref(), incoming.notes.as_deref()),
            last_activity_date: Some(
                existing
                    .last_activity_date
                    .map_or(incoming_activity, |e| e.max(incoming_activity)),
            ),
            created_at: existing.created_at,
            updated_at: existing.updated_at,
            version: existing.version,
            metadata: merge_metadata(&existing.metadata, &incoming.metadata),
        }
    }

    /// Builds a new canonical contact from a record that matched nothing.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingIdentity` when the record has neither
    /// a name nor an email.
    pub fn create(&self, incoming: &RawRecord) -> Result<CanonicalContact, ValidationError> {
        if non_blank(incoming.name.as_deref()).is_none()
            && non_blank(incoming.email.as_deref()).is_none()
        {
            return Err(ValidationError::MissingIdentity);
        }

        let mut contact = CanonicalContact::with_id(ContactId::new());
        contact.name = owned(non_blank(incoming.name.as_deref()));
        contact.email = owned(non_blank(incoming.email.as_deref()));
        contact.phone = owned(non_blank(incoming.phone.as_deref()));
        contact.company = owned(non_blank(incoming.company.as_deref()));
        contact.title = owned(non_blank(incoming.title.as_deref()));
        contact.lead_source = LeadSources::single(&incoming.lead_source_tag);
        contact.status = owned(
            non_blank(incoming.status.as_deref()).or(Some(self.config.default_status.as_str())),
        );
        contact.notes = owned(non_blank(incoming.notes.as_deref()));
        contact.last_activity_date = Some(incoming.activity_at());
        contact.created_at = incoming.created_at;
        contact.metadata = incoming.metadata.clone();
        Ok(contact)
    }
}
