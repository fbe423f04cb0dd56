//! Contact types and identity management.
//!
//! A [`CanonicalContact`] is the durable, merged identity of one real-world
//! person. A [`RawRecord`] is a partial, untrusted observation of a person
//! produced by one upstream source; it is consumed by resolution and never
//! persisted as-is.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Stable canonical contact identifier.
///
/// Ordered so that tie-breaks between equally scored candidates are
/// deterministic (lowest id wins).
///
/// # Examples
///
/// ```
/// use contactlink::ContactId;
///
/// let id = ContactId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(Uuid);

impl ContactId {
    /// Creates a new random contact ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a contact ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for ContactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ContactId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The set of source tags a contact has been observed from.
///
/// Serialized as a comma-joined string (`"calendly,hubspot"`). Tags are
/// trimmed; empty tags and duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadSources(BTreeSet<String>);

impl LeadSources {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set holding a single tag.
    #[must_use]
    pub fn single(tag: &str) -> Self {
        let mut sources = Self::new();
        sources.insert(tag);
        sources
    }

    /// Parses a comma-joined tag list.
    #[must_use]
    pub fn parse(joined: &str) -> Self {
        let mut sources = Self::new();
        for tag in joined.split(',') {
            sources.insert(tag);
        }
        sources
    }

    /// Adds a tag. Returns true if it was not already present.
    pub fn insert(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() {
            return false;
        }
        self.0.insert(tag.to_string())
    }

    /// Returns the union of both sets.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).cloned().collect())
    }

    /// Returns true if the tag is present.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag.trim())
    }

    /// Iterates the tags in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of distinct tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no tag is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma-joined form.
    #[must_use]
    pub fn joined(&self) -> String {
        self.iter().collect::<Vec<_>>().join(",")
    }
}

impl fmt::Display for LeadSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

impl Serialize for LeadSources {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.joined())
    }
}

impl<'de> Deserialize<'de> for LeadSources {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let joined = String::deserialize(deserializer)?;
        Ok(Self::parse(&joined))
    }
}

/// A partial observation of a person from one upstream source.
///
/// # Examples
///
/// ```
/// use contactlink::RawRecord;
///
/// let record = RawRecord::new("calendly")
///     .with_name("Jane Doe")
///     .with_email("jane@example.com");
/// assert_eq!(record.lead_source_tag, "calendly");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    /// Full name as the source wrote it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email as the source wrote it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Phone as the source wrote it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Company as the source wrote it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Job title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Which platform produced this observation.
    pub lead_source_tag: String,

    /// Lifecycle status reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Free-text note to append to the contact history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// When the person was last active according to the source, if it says.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<DateTime<Utc>>,

    /// When the source observed the person.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Source-specific extra fields.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl RawRecord {
    /// Creates an empty record from the given source.
    #[must_use]
    pub fn new(lead_source_tag: impl Into<String>) -> Self {
        Self {
            name: None,
            email: None,
            phone: None,
            company: None,
            title: None,
            lead_source_tag: lead_source_tag.into(),
            status: None,
            notes: None,
            last_activity_at: None,
            created_at: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the phone.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Sets the company.
    #[must_use]
    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    /// Sets the job title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the note.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets the last activity timestamp.
    #[must_use]
    pub fn with_last_activity_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_activity_at = Some(at);
        self
    }

    /// Sets the observation timestamp.
    #[must_use]
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Sets source-specific metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// The activity timestamp this observation implies.
    #[must_use]
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at.unwrap_or(self.created_at)
    }
}

/// The durable, merged identity of one person across all sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalContact {
    /// Stable identifier.
    pub id: ContactId,

    /// Best known full name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email; authoritative once set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Phone as stored; the longest digit string seen wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Company; never overwritten once set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Job title; never overwritten once set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Every source this person was seen in.
    #[serde(default)]
    pub lead_source: LeadSources,

    /// Lifecycle status; sales stages are sticky.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Accumulated, delimiter-separated note history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Most recent activity across all sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_date: Option<DateTime<Utc>>,

    /// When the contact was first created.
    pub created_at: DateTime<Utc>,
    /// When the contact was last persisted.
    pub updated_at: DateTime<Utc>,

    /// Starts at 1 on create and increments on every persisted merge.
    pub version: u64,

    /// Merged source-specific fields; existing keys win.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl CanonicalContact {
    /// Creates an empty contact with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(ContactId::new())
    }

    /// Creates an empty contact with a specific id.
    ///
    /// This is useful when you need to control the contact id, such as
    /// during data migration or testing.
    #[must_use]
    pub fn with_id(id: ContactId) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: None,
            email: None,
            phone: None,
            company: None,
            title: None,
            lead_source: LeadSources::new(),
            status: None,
            notes: None,
            last_activity_date: None,
            created_at: now,
            updated_at: now,
            version: 1,
            metadata: serde_json::Value::Null,
        }
    }

    /// Updates `updated_at` and increments the version.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }
}

impl Default for CanonicalContact {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for CanonicalContact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.version == other.version
    }
}

impl Eq for CanonicalContact {}

/// Returns the trimmed value, or `None` when absent or blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_id_creation() {
        let id1 = ContactId::new();
        let id2 = ContactId::new();
        assert_ne!(id1, id2);
        assert!(!id1.is_nil());
    }

    #[test]
    fn test_contact_id_ordering() {
        let low = ContactId::from_uuid(Uuid::from_u128(1));
        let high = ContactId::from_uuid(Uuid::from_u128(2));
        assert!(low < high);
    }

    #[test]
    fn test_lead_sources_dedup_and_order() {
        let mut sources = LeadSources::parse("hubspot, calendly,,hubspot ");
        assert_eq!(sources.len(), 2);
        assert_eq!(sources.joined(), "calendly,hubspot");
        assert!(!sources.insert("calendly"));
        assert!(sources.insert("zoom"));
        assert!(!sources.insert("   "));
        assert_eq!(sources.to_string(), "calendly,hubspot,zoom");
    }

    #[test]
    fn test_lead_sources_union() {
        let a = LeadSources::parse("a,b");
        let b = LeadSources::parse("b,c");
        let u = a.union(&b);
        assert_eq!(u.joined(), "a,b,c");
    }

    #[test]
    fn test_lead_sources_serialize_as_string() {
        let sources = LeadSources::parse("zoom,calendly");
        let json = serde_json::to_string(&sources).unwrap();
        assert_eq!(json, "\"calendly,zoom\"");
        let back: LeadSources = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sources);
    }

    #[test]
    fn test_raw_record_activity_falls_back_to_created_at() {
        let created = Utc::now() - chrono::Duration::days(3);
        let record = RawRecord::new("zoom").with_created_at(created);
        assert_eq!(record.activity_at(), created);

        let later = Utc::now();
        let record = record.with_last_activity_at(later);
        assert_eq!(record.activity_at(), later);
    }

    #[test]
    fn test_raw_record_deserializes_minimal_json() {
        let record: RawRecord =
            serde_json::from_str(r#"{"leadSourceTag":"typeform","email":"a@b.co"}"#).unwrap();
        assert_eq!(record.email.as_deref(), Some("a@b.co"));
        assert!(record.name.is_none());
        assert!(record.metadata.is_null());
    }

    #[test]
    fn test_contact_touch() {
        let mut contact = CanonicalContact::new();
        let before = contact.updated_at;
        contact.touch(before + chrono::Duration::seconds(5));
        assert_eq!(contact.version, 2);
        assert!(contact.updated_at > before);
    }

    #[test]
    fn test_contact_serialization() {
        let mut contact = CanonicalContact::new();
        contact.name = Some("Ada Lovelace".to_string());
        contact.lead_source = LeadSources::parse("zoom,hubspot");
        let json = serde_json::to_value(&contact).unwrap();
        assert_eq!(json["leadSource"], "hubspot,zoom");
        let back: CanonicalContact = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, contact.id);
        assert_eq!(back.lead_source, contact.lead_source);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  x ")), Some("x"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
