//! Best-match search over the canonical contact set.
//!
//! Matching is a priority cascade; the first tier that reaches a decision wins:
//!
//! 1. email (normalized equality) → `Exact`
//! 2. shared usable phone → `High` if the names correlate, else `Medium`
//! 3. same company and similar name → `Medium`
//! 4. strongly similar name → `Low`
//!
//! Within a tier the highest score wins and equal scores go to the lowest
//! contact id. The matcher never mutates anything.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::confidence::Confidence;
use crate::config::MatchingConfig;
use crate::contact::{CanonicalContact, ContactId, RawRecord};
use crate::index::{ContactIndex, IndexedContact};
use crate::normalize::NormalizedIdentity;
use crate::similarity::{self, EmailMatch, INITIAL_SCORE};

/// Score reported for an email that matched only after provider normalization.
pub const NORMALIZED_EMAIL_SCORE: f64 = 0.98;

/// Why a match was (or was not) made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    /// Emails equal as written (case-insensitive).
    ExactEmail,
    /// Emails equal after provider alias normalization.
    NormalizedEmail,
    /// Shared phone; one name is the initial form of the other.
    PhoneInitialName,
    /// Shared phone and similar names.
    PhoneAndName,
    /// Shared phone, divergent names. Possibly a different person on a shared line.
    PhoneOnly,
    /// Same company and similar names.
    NameAndCompany,
    /// Names alone are similar enough.
    NameOnly,
    /// Nothing cleared any tier.
    NoMatch,
}

impl MatchReason {
    /// Human-readable description.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExactEmail => "exact email match",
            Self::NormalizedEmail => "normalized email match (alias)",
            Self::PhoneInitialName => "phone match with initial-format name",
            Self::PhoneAndName => "phone and name match",
            Self::PhoneOnly => "phone match with divergent name",
            Self::NameAndCompany => "name and company match",
            Self::NameOnly => "name-only match",
            Self::NoMatch => "no match",
        }
    }
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a best-match search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Confidence tier of the match.
    pub confidence: Confidence,
    /// `None` exactly when `confidence` is `None`.
    pub contact: Option<CanonicalContact>,
    /// Which rule decided the match.
    pub reason: MatchReason,
    /// Score of the deciding signal in `[0, 1]`.
    pub score: f64,
}

impl MatchResult {
    /// The "no information" result.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            confidence: Confidence::None,
            contact: None,
            reason: MatchReason::NoMatch,
            score: 0.0,
        }
    }

    fn found(confidence: Confidence, contact: &IndexedContact, reason: MatchReason, score: f64) -> Self {
        Self {
            confidence,
            contact: Some(contact.contact.clone()),
            reason,
            score,
        }
    }

    /// Returns true if a contact was linked.
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.contact.is_some()
    }

    /// MEDIUM/LOW: linked, but the caller should decide whether to trust it.
    #[must_use]
    pub const fn is_ambiguous(&self) -> bool {
        self.confidence.is_ambiguous()
    }

    /// Id of the matched contact, if any.
    #[must_use]
    pub fn contact_id(&self) -> Option<ContactId> {
        self.contact.as_ref().map(|c| c.id)
    }
}

/// Picks the highest score; candidates arrive in ascending id order so the
/// first of equal scores is the lowest id.
fn pick_best<'a>(
    candidates: impl IntoIterator<Item = (f64, &'a IndexedContact)>,
) -> Option<(f64, &'a IndexedContact)> {
    let mut best: Option<(f64, &IndexedContact)> = None;
    for (score, candidate) in candidates {
        if best.map_or(true, |(top, _)| score > top) {
            best = Some((score, candidate));
        }
    }
    best
}

/// Tiered matcher.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatchingConfig,
}

impl Matcher {
    /// Creates a matcher with the given thresholds.
    #[must_use]
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// The thresholds in use.
    #[must_use]
    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Finds the best canonical contact for a record.
    ///
    /// Deterministic for a fixed index and record.
    #[must_use]
    pub fn find_best_match(&self, index: &ContactIndex, record: &RawRecord) -> MatchResult {
        let identity = index.normalizer().record_identity(record);
        self.find_best_match_for(index, record, &identity)
    }

    /// As [`Matcher::find_best_match`] with a precomputed record identity.
    #[must_use]
    pub fn find_best_match_for(
        &self,
        index: &ContactIndex,
        record: &RawRecord,
        identity: &NormalizedIdentity,
    ) -> MatchResult {
        self.email_tier(index, record, identity)
            .or_else(|| self.phone_tier(index, identity))
            .or_else(|| self.company_tier(index, identity))
            .or_else(|| self.name_tier(index, identity))
            .unwrap_or_else(MatchResult::none)
    }

    fn email_tier(
        &self,
        index: &ContactIndex,
        record: &RawRecord,
        identity: &NormalizedIdentity,
    ) -> Option<MatchResult> {
        if identity.email.is_empty() {
            return None;
        }
        let raw = record.email.as_deref().unwrap_or_default();
        let normalizer = index.normalizer();
        let scored = index.with_email(&identity.email).map(|candidate| {
            let stored = candidate.contact.email.as_deref().unwrap_or_default();
            let score = match similarity::email_match(normalizer, raw, stored) {
                EmailMatch::Exact => 1.0,
                _ => NORMALIZED_EMAIL_SCORE,
            };
            (score, candidate)
        });
        let (score, best) = pick_best(scored)?;
        let reason = if score >= 1.0 {
            MatchReason::ExactEmail
        } else {
            MatchReason::NormalizedEmail
        };
        Some(MatchResult::found(Confidence::Exact, best, reason, score))
    }

    fn phone_tier(&self, index: &ContactIndex, identity: &NormalizedIdentity) -> Option<MatchResult> {
        if !index.normalizer().is_usable_phone(&identity.phone) {
            return None;
        }
        let candidates: Vec<&IndexedContact> = index.with_phone(&identity.phone).collect();
        if candidates.is_empty() {
            return None;
        }

        if let Some(initial) = candidates
            .iter()
            .find(|c| similarity::is_initial_format(&identity.name, &c.identity.name))
        {
            return Some(MatchResult::found(
                Confidence::High,
                initial,
                MatchReason::PhoneInitialName,
                INITIAL_SCORE,
            ));
        }

        let (score, best) = pick_best(candidates.iter().map(|c| {
            (similarity::name_similarity(&identity.name, &c.identity.name).score, *c)
        }))?;
        if score >= self.config.similar_name_threshold {
            Some(MatchResult::found(Confidence::High, best, MatchReason::PhoneAndName, score))
        } else {
            Some(MatchResult::found(Confidence::Medium, best, MatchReason::PhoneOnly, score))
        }
    }

    fn company_tier(&self, index: &ContactIndex, identity: &NormalizedIdentity) -> Option<MatchResult> {
        if identity.name.is_empty() || identity.company.is_empty() {
            return None;
        }
        let scored = index.with_company(&identity.company).map(|c| {
            (similarity::name_similarity(&identity.name, &c.identity.name).score, c)
        });
        let (score, best) = pick_best(scored)?;
        (score >= self.config.similar_name_threshold).then(|| {
            MatchResult::found(Confidence::Medium, best, MatchReason::NameAndCompany, score)
        })
    }

    fn name_tier(&self, index: &ContactIndex, identity: &NormalizedIdentity) -> Option<MatchResult> {
        if identity.name.is_empty() {
            return None;
        }
        // Contacts outside the candidate set score zero, which only a zero
        // threshold accepts.
        let narrow = self.config.narrow_name_candidates && self.config.name_only_threshold > 0.0;
        let candidates: Vec<&IndexedContact> = if narrow {
            index.name_candidates(&identity.name)
        } else {
            index.iter().collect()
        };
        let (score, best) = pick_best(candidates.into_iter().map(|c| {
            (similarity::name_similarity(&identity.name, &c.identity.name).score, c)
        }))?;
        (score >= self.config.name_only_threshold)
            .then(|| MatchResult::found(Confidence::Low, best, MatchReason::NameOnly, score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use uuid::Uuid;

    fn contact(n: u128) -> CanonicalContact {
        CanonicalContact::with_id(ContactId::from_uuid(Uuid::from_u128(n)))
    }

    fn id(n: u128) -> Option<ContactId> {
        Some(ContactId::from_uuid(Uuid::from_u128(n)))
    }

    fn index(contacts: Vec<CanonicalContact>) -> ContactIndex {
        ContactIndex::build(Normalizer::default(), contacts)
    }

    #[test]
    fn test_exact_email() {
        let mut a = contact(1);
        a.email = Some("Jane@Acme.io".to_string());
        let result = Matcher::default()
            .find_best_match(&index(vec![a]), &RawRecord::new("x").with_email("jane@acme.io"));
        assert_eq!(result.confidence, Confidence::Exact);
        assert_eq!(result.reason, MatchReason::ExactEmail);
        assert!((result.score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_alias_email() {
        let mut a = contact(1);
        a.email = Some("jdoe@gmail.com".to_string());
        let result = Matcher::default().find_best_match(
            &index(vec![a]),
            &RawRecord::new("calendly").with_email("j.doe+calendly@gmail.com"),
        );
        assert_eq!(result.confidence, Confidence::Exact);
        assert_eq!(result.reason, MatchReason::NormalizedEmail);
    }

    #[test]
    fn test_exact_email_preferred_over_alias() {
        let mut alias = contact(1);
        alias.email = Some("j.doe@gmail.com".to_string());
        let mut exact = contact(2);
        exact.email = Some("jdoe@gmail.com".to_string());
        let result = Matcher::default()
            .find_best_match(&index(vec![alias, exact]), &RawRecord::new("x").with_email("jdoe@gmail.com"));
        assert_eq!(result.contact_id(), id(2));
        assert_eq!(result.reason, MatchReason::ExactEmail);
    }

    #[test]
    fn test_email_tie_goes_to_lowest_id() {
        let mut a = contact(9);
        a.email = Some("j.doe@gmail.com".to_string());
        let mut b = contact(4);
        b.email = Some("jd.oe@gmail.com".to_string());
        let result = Matcher::default()
            .find_best_match(&index(vec![a, b]), &RawRecord::new("x").with_email("jdoe@gmail.com"));
        assert_eq!(result.contact_id(), id(4));
    }

    #[test]
    fn test_phone_with_nickname_is_high() {
        let mut a = contact(1);
        a.name = Some("Robert Smith".to_string());
        a.phone = Some("(555) 123-4567".to_string());
        let result = Matcher::default().find_best_match(
            &index(vec![a]),
            &RawRecord::new("x").with_name("Bob Smith").with_phone("5551234567"),
        );
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.reason, MatchReason::PhoneAndName);
        assert!((result.score - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn test_phone_with_initial_is_high() {
        let mut a = contact(1);
        a.name = Some("John Doe".to_string());
        a.phone = Some("555-000-1111".to_string());
        let result = Matcher::default().find_best_match(
            &index(vec![a]),
            &RawRecord::new("x").with_name("J. Doe").with_phone("5550001111"),
        );
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.reason, MatchReason::PhoneInitialName);
    }

    #[test]
    fn test_phone_with_divergent_name_is_medium() {
        let mut a = contact(1);
        a.name = Some("Maria Garcia".to_string());
        a.phone = Some("5550001111".to_string());
        let result = Matcher::default().find_best_match(
            &index(vec![a]),
            &RawRecord::new("x").with_name("Tom Brown").with_phone("5550001111"),
        );
        assert_eq!(result.confidence, Confidence::Medium);
        assert_eq!(result.reason, MatchReason::PhoneOnly);
        assert!(result.is_ambiguous());
    }

    #[test]
    fn test_short_phone_ignored() {
        let mut a = contact(1);
        a.phone = Some("12345".to_string());
        let result = Matcher::default()
            .find_best_match(&index(vec![a]), &RawRecord::new("x").with_phone("12345"));
        assert_eq!(result, MatchResult::none());
    }

    #[test]
    fn test_name_and_company_is_medium() {
        let mut a = contact(1);
        a.name = Some("Alice Brown".to_string());
        a.company = Some("Acme".to_string());
        let result = Matcher::default().find_best_match(
            &index(vec![a]),
            &RawRecord::new("x").with_name("Alice Brown").with_company("ACME"),
        );
        assert_eq!(result.confidence, Confidence::Medium);
        assert_eq!(result.reason, MatchReason::NameAndCompany);
    }

    #[test]
    fn test_company_without_similar_name_falls_through() {
        let mut a = contact(1);
        a.name = Some("Alice Brown".to_string());
        a.company = Some("Acme".to_string());
        let result = Matcher::default().find_best_match(
            &index(vec![a]),
            &RawRecord::new("x").with_name("Zed Quinn").with_company("Acme"),
        );
        assert_eq!(result.confidence, Confidence::None);
        assert!(result.contact.is_none());
    }

    #[test]
    fn test_name_only_is_low() {
        let mut a = contact(1);
        a.name = Some("Robert Smith".to_string());
        let result = Matcher::default()
            .find_best_match(&index(vec![a]), &RawRecord::new("x").with_name("Bob Smith"));
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.reason, MatchReason::NameOnly);
    }

    #[test]
    fn test_name_only_below_threshold() {
        let mut a = contact(1);
        a.name = Some("Jennifer Garner".to_string());
        let result = Matcher::default()
            .find_best_match(&index(vec![a]), &RawRecord::new("x").with_name("Jen Lopez"));
        assert_eq!(result.confidence, Confidence::None);
    }

    #[test]
    fn test_exhaustive_name_scan_agrees() {
        let mut a = contact(1);
        a.name = Some("Mary Ann Smith".to_string());
        let idx = index(vec![a]);
        let record = RawRecord::new("x").with_name("Ann Smith");
        let narrow = Matcher::default().find_best_match(&idx, &record);
        let full = Matcher::new(MatchingConfig {
            narrow_name_candidates: false,
            ..MatchingConfig::default()
        })
        .find_best_match(&idx, &record);
        assert_eq!(narrow, full);
        assert_eq!(narrow.confidence, Confidence::Low);
    }

    #[test]
    fn test_narrowing_keeps_match_without_shared_initial() {
        let mut a = contact(1);
        a.name = Some("Xabcdefghijklmnop".to_string());
        let mut b = contact(2);
        b.name = Some("Quentin Blake".to_string());
        let idx = index(vec![a, b]);
        // A typo in the first letter: no token initial in common.
        let record = RawRecord::new("x").with_name("Yabcdefghijklmnop");
        let narrow = Matcher::default().find_best_match(&idx, &record);
        let full = Matcher::new(MatchingConfig {
            narrow_name_candidates: false,
            ..MatchingConfig::default()
        })
        .find_best_match(&idx, &record);
        assert_eq!(narrow, full);
        assert_eq!(narrow.confidence, Confidence::Low);
        assert_eq!(narrow.contact_id(), id(1));
    }

    #[test]
    fn test_narrowing_agrees_with_full_scan() {
        let names = [
            "Bob Smithson", "Robert Smith", "Peggy Olson", "J Doe", "Q", "Ann", "Joann Smithers",
            "Kim Lee", "Al",
        ];
        let contacts: Vec<CanonicalContact> = names
            .iter()
            .zip(1u128..)
            .map(|(name, n)| {
                let mut c = contact(n);
                c.name = Some((*name).to_string());
                c
            })
            .collect();
        let idx = index(contacts);
        let probes = [
            "Bob Smith", "Margaret Olsen", "John Doe", "q", "Annie", "Smith", "Alice", "Kimberly Lee",
        ];
        for threshold in [0.0, 0.5, 0.85] {
            let narrow = Matcher::new(MatchingConfig {
                name_only_threshold: threshold,
                ..MatchingConfig::default()
            });
            let full = Matcher::new(MatchingConfig {
                name_only_threshold: threshold,
                narrow_name_candidates: false,
                ..MatchingConfig::default()
            });
            for probe in probes {
                let record = RawRecord::new("x").with_name(probe);
                assert_eq!(
                    narrow.find_best_match(&idx, &record),
                    full.find_best_match(&idx, &record),
                    "{probe} at {threshold}"
                );
            }
        }
    }

    #[test]
    fn test_empty_record() {
        let mut a = contact(1);
        a.name = Some("Anyone".to_string());
        let result = Matcher::default().find_best_match(&index(vec![a]), &RawRecord::new("x"));
        assert_eq!(result, MatchResult::none());
    }
}
