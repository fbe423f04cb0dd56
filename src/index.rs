//! Lookup indexes over the canonical contact set.
//!
//! Email and phone tiers resolve through hash lookups; the company tier reads a
//! company bucket. The name-only tier reads the contacts that share a character
//! bigram or a formal first name with the record, plus the few names too short
//! to have a bigram; every contact left out scores exactly zero against the
//! record, so narrowing never changes the outcome. Id sets are ordered so that
//! candidate iteration, and therefore tie-breaking, is deterministic.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

use crate::contact::{CanonicalContact, ContactId};
use crate::normalize::{NormalizedIdentity, NormalizedName, Normalizer};
use crate::similarity::{bigrams, canonical_first_name};

/// A contact together with its cached normalized identity.
#[derive(Debug, Clone)]
pub struct IndexedContact {
    /// The contact as last indexed.
    pub contact: CanonicalContact,
    /// Its cached normalized identity.
    pub identity: NormalizedIdentity,
}

/// Keys under which one contact is indexed.
#[derive(Debug, Default)]
struct IndexKeys {
    email: Option<String>,
    phone: Option<String>,
    company: Option<String>,
    bigrams: BTreeSet<(char, char)>,
    first_name: Option<String>,
    /// Non-empty name without any bigram (a single character).
    bigramless: bool,
}

fn name_bigrams(name: &NormalizedName) -> BTreeSet<(char, char)> {
    bigrams(&name.full).into_iter().collect()
}

fn formal_first_name(name: &NormalizedName) -> Option<String> {
    (!name.is_empty()).then(|| canonical_first_name(&name.first_token).to_string())
}

fn add_key<K: Eq + Hash>(map: &mut HashMap<K, BTreeSet<ContactId>>, key: K, id: ContactId) {
    map.entry(key).or_default().insert(id);
}

fn drop_key<K: Eq + Hash>(map: &mut HashMap<K, BTreeSet<ContactId>>, key: &K, id: ContactId) {
    if let Some(set) = map.get_mut(key) {
        set.remove(&id);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

/// Indexed view of canonical contacts used by the matcher.
#[derive(Debug, Default, Clone)]
pub struct ContactIndex {
    normalizer: Normalizer,
    contacts: BTreeMap<ContactId, IndexedContact>,
    by_email: HashMap<String, BTreeSet<ContactId>>,
    by_phone: HashMap<String, BTreeSet<ContactId>>,
    by_company: HashMap<String, BTreeSet<ContactId>>,
    by_bigram: HashMap<(char, char), BTreeSet<ContactId>>,
    by_first_name: HashMap<String, BTreeSet<ContactId>>,
    bigramless: BTreeSet<ContactId>,
}

impl ContactIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            normalizer,
            ..Self::default()
        }
    }

    /// Builds an index over a snapshot of contacts.
    #[must_use]
    pub fn build(normalizer: Normalizer, contacts: impl IntoIterator<Item = CanonicalContact>) -> Self {
        let mut index = Self::new(normalizer);
        for contact in contacts {
            index.upsert(contact);
        }
        index
    }

    /// The normalizer identities are computed with.
    #[must_use]
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    fn keys_for(&self, identity: &NormalizedIdentity) -> IndexKeys {
        IndexKeys {
            email: Some(identity.email.clone()).filter(|e| !e.is_empty()),
            phone: Some(identity.phone.clone()).filter(|p| self.normalizer.is_usable_phone(p)),
            company: Some(identity.company.clone()).filter(|c| !c.is_empty()),
            bigrams: name_bigrams(&identity.name),
            first_name: formal_first_name(&identity.name),
            bigramless: !identity.name.is_empty() && identity.name.full.chars().count() < 2,
        }
    }

    fn unlink(&mut self, id: ContactId, keys: &IndexKeys) {
        if let Some(email) = &keys.email {
            drop_key(&mut self.by_email, email, id);
        }
        if let Some(phone) = &keys.phone {
            drop_key(&mut self.by_phone, phone, id);
        }
        if let Some(company) = &keys.company {
            drop_key(&mut self.by_company, company, id);
        }
        for bigram in &keys.bigrams {
            drop_key(&mut self.by_bigram, bigram, id);
        }
        if let Some(first) = &keys.first_name {
            drop_key(&mut self.by_first_name, first, id);
        }
        self.bigramless.remove(&id);
    }

    /// Inserts a contact or replaces the indexed copy, re-keying it.
    pub fn upsert(&mut self, contact: CanonicalContact) {
        let id = contact.id;
        if let Some(prev) = self.contacts.remove(&id) {
            let prev_keys = self.keys_for(&prev.identity);
            self.unlink(id, &prev_keys);
        }

        let identity = self.normalizer.contact_identity(&contact);
        let keys = self.keys_for(&identity);
        if let Some(email) = keys.email {
            add_key(&mut self.by_email, email, id);
        }
        if let Some(phone) = keys.phone {
            add_key(&mut self.by_phone, phone, id);
        }
        if let Some(company) = keys.company {
            add_key(&mut self.by_company, company, id);
        }
        for bigram in keys.bigrams {
            add_key(&mut self.by_bigram, bigram, id);
        }
        if let Some(first) = keys.first_name {
            add_key(&mut self.by_first_name, first, id);
        }
        if keys.bigramless {
            self.bigramless.insert(id);
        }

        self.contacts.insert(id, IndexedContact { contact, identity });
    }

    /// Removes a contact from the index.
    pub fn remove(&mut self, id: ContactId) -> Option<CanonicalContact> {
        let prev = self.contacts.remove(&id)?;
        let keys = self.keys_for(&prev.identity);
        self.unlink(id, &keys);
        Some(prev.contact)
    }

    /// Looks up one contact by id.
    #[must_use]
    pub fn get(&self, id: ContactId) -> Option<&IndexedContact> {
        self.contacts.get(&id)
    }

    /// Number of indexed contacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Returns true if no contact is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// All contacts, ascending by id.
    pub fn iter(&self) -> impl Iterator<Item = &IndexedContact> {
        self.contacts.values()
    }

    fn lookup<'a>(
        &'a self,
        map: &'a HashMap<String, BTreeSet<ContactId>>,
        key: &str,
    ) -> impl Iterator<Item = &'a IndexedContact> + 'a {
        map.get(key)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.contacts.get(id))
    }

    /// Contacts whose normalized email equals `email`, ascending by id.
    pub fn with_email<'a>(&'a self, email: &str) -> impl Iterator<Item = &'a IndexedContact> + 'a {
        self.lookup(&self.by_email, email)
    }

    /// Contacts whose normalized phone equals `phone`, ascending by id.
    pub fn with_phone<'a>(&'a self, phone: &str) -> impl Iterator<Item = &'a IndexedContact> + 'a {
        self.lookup(&self.by_phone, phone)
    }

    /// Contacts whose company key equals `company`, ascending by id.
    pub fn with_company<'a>(
        &'a self,
        company: &str,
    ) -> impl Iterator<Item = &'a IndexedContact> + 'a {
        self.lookup(&self.by_company, company)
    }

    /// Contacts whose name can score above zero against `name`, ascending by id.
    ///
    /// A name without bigrams (a single character) can be contained in any
    /// other name, so it reads every contact.
    #[must_use]
    pub fn name_candidates(&self, name: &NormalizedName) -> Vec<&IndexedContact> {
        if name.is_empty() {
            return Vec::new();
        }
        let keys = name_bigrams(name);
        if keys.is_empty() {
            return self.iter().collect();
        }
        let mut ids = self.bigramless.clone();
        for bigram in &keys {
            if let Some(set) = self.by_bigram.get(bigram) {
                ids.extend(set.iter().copied());
            }
        }
        if let Some(set) = formal_first_name(name).and_then(|f| self.by_first_name.get(&f)) {
            ids.extend(set.iter().copied());
        }
        ids.iter().filter_map(|id| self.contacts.get(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn contact(n: u128) -> CanonicalContact {
        CanonicalContact::with_id(ContactId::from_uuid(Uuid::from_u128(n)))
    }

    fn ids<'a>(it: impl IntoIterator<Item = &'a IndexedContact>) -> Vec<u128> {
        it.into_iter().map(|c| c.contact.id.as_uuid().as_u128()).collect()
    }

    #[test]
    fn test_email_and_phone_lookup() {
        let mut a = contact(1);
        a.email = Some("J.Doe@gmail.com".to_string());
        a.phone = Some("(555) 123-4567".to_string());
        let mut b = contact(2);
        b.email = Some("jdoe+x@gmail.com".to_string());

        let index = ContactIndex::build(Normalizer::default(), [b, a]);
        assert_eq!(ids(index.with_email("jdoe@gmail.com")), vec![1, 2]);
        assert_eq!(ids(index.with_phone("5551234567")), vec![1]);
        assert!(index.with_phone("0000000000").next().is_none());
    }

    #[test]
    fn test_short_phone_not_indexed() {
        let mut a = contact(1);
        a.phone = Some("123".to_string());
        let index = ContactIndex::build(Normalizer::default(), [a]);
        assert!(index.with_phone("123").next().is_none());
    }

    #[test]
    fn test_upsert_rekeys() {
        let mut a = contact(1);
        a.company = Some("Acme".to_string());
        a.name = Some("Alice Brown".to_string());
        let mut index = ContactIndex::build(Normalizer::default(), [a.clone()]);
        assert_eq!(ids(index.with_company("acme")), vec![1]);

        a.company = Some("Globex".to_string());
        a.name = Some("Zoe Young".to_string());
        index.upsert(a);
        assert!(index.with_company("acme").next().is_none());
        assert_eq!(ids(index.with_company("globex")), vec![1]);
        assert!(index
            .name_candidates(&crate::normalize::normalize_name("Alice Brown"))
            .is_empty());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_name_candidates() {
        let mut a = contact(1);
        a.name = Some("Robert Smith".to_string());
        let mut b = contact(2);
        b.name = Some("Peggy Olson".to_string());
        let mut c = contact(3);
        c.name = Some("Kim Lee".to_string());
        let index = ContactIndex::build(Normalizer::default(), [a, b, c]);

        let name = crate::normalize::normalize_name("Bob Smith");
        assert_eq!(ids(index.name_candidates(&name)), vec![1]);

        // No shared bigram, but the same formal first name.
        let name = crate::normalize::normalize_name("Margaret");
        assert_eq!(ids(index.name_candidates(&name)), vec![2]);

        let name = crate::normalize::normalize_name("Qzv");
        assert!(index.name_candidates(&name).is_empty());
    }

    #[test]
    fn test_single_character_names_are_candidates() {
        let mut a = contact(1);
        a.name = Some("Q".to_string());
        let mut b = contact(2);
        b.name = Some("Zed Young".to_string());
        let index = ContactIndex::build(Normalizer::default(), [a, b]);

        let name = crate::normalize::normalize_name("Quinn");
        assert_eq!(ids(index.name_candidates(&name)), vec![1]);

        // A single-character record name reads every contact.
        let name = crate::normalize::normalize_name("z");
        assert_eq!(ids(index.name_candidates(&name)), vec![1, 2]);
    }

    #[test]
    fn test_remove() {
        let mut a = contact(1);
        a.email = Some("a@x.io".to_string());
        let mut index = ContactIndex::build(Normalizer::default(), [a]);
        let removed = index.remove(ContactId::from_uuid(Uuid::from_u128(1)));
        assert!(removed.is_some());
        assert!(index.is_empty());
        assert!(index.with_email("a@x.io").next().is_none());
    }
}
