//! Canonical forms for raw contact fields.
//!
//! Normalization is total: every input, including empty or malformed strings,
//! yields a normalized form and nothing here fails. Every function is
//! idempotent, `f(f(x)) == f(x)`.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{EmailProviderRule, NormalizationConfig};
use crate::contact::{CanonicalContact, RawRecord};

/// Generational and professional suffixes dropped from the end of a name.
const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "v", "phd", "md", "esq"];

static PUNCTUATION: OnceLock<Regex> = OnceLock::new();

fn punctuation() -> &'static Regex {
    PUNCTUATION
        .get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("punctuation pattern is valid"))
}

/// A name split into comparable tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedName {
    /// Tokens joined by single spaces.
    pub full: String,
    /// First token of the name.
    pub first_token: String,
    /// Equal to `first_token` for single-token names.
    pub last_token: String,
    /// All tokens, in order.
    pub tokens: Vec<String>,
}

impl NormalizedName {
    /// Returns true if the name has no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Returns true for names with more than one token.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.tokens.len() > 1
    }
}

/// Normalized fields of one record or contact, cached for a single matching pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedIdentity {
    /// Provider-normalized email; empty when absent.
    pub email: String,
    /// Digits only.
    pub phone: String,
    /// Normalized name.
    pub name: NormalizedName,
    /// Trimmed, lowercased company.
    pub company: String,
}

fn is_suffix(token: &str) -> bool {
    let bare: String = token.chars().filter(|c| *c != '.').collect();
    NAME_SUFFIXES.contains(&bare.as_str())
}

fn strip_trailing_suffixes(tokens: &mut Vec<String>) {
    while tokens.len() > 1 && tokens.last().is_some_and(|t| is_suffix(t)) {
        tokens.pop();
    }
}

/// Normalizes a person name.
///
/// Lowercases, drops trailing suffixes (`Jr.`, `III`, `PhD`, ...), replaces
/// punctuation with spaces and collapses whitespace.
///
/// # Examples
///
/// ```
/// use contactlink::normalize::normalize_name;
///
/// let name = normalize_name("  O'Neil,  Mary-Kate  Jr. ");
/// assert_eq!(name.full, "o neil mary kate");
/// assert_eq!(name.first_token, "o");
/// assert_eq!(name.last_token, "kate");
/// ```
#[must_use]
pub fn normalize_name(raw: &str) -> NormalizedName {
    let lowered = raw.to_lowercase();

    // Suffixes are matched before punctuation removal so "Ph.D." is recognized.
    let mut tokens: Vec<String> = lowered
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    strip_trailing_suffixes(&mut tokens);

    let joined = tokens.join(" ");
    let cleaned = punctuation().replace_all(&joined, " ");
    let mut tokens: Vec<String> = cleaned.split_whitespace().map(str::to_string).collect();
    strip_trailing_suffixes(&mut tokens);

    let first_token = tokens.first().cloned().unwrap_or_default();
    let last_token = tokens.last().cloned().unwrap_or_default();
    NormalizedName {
        full: tokens.join(" "),
        first_token,
        last_token,
        tokens,
    }
}

/// Strips every non-digit character.
///
/// ```
/// use contactlink::normalize::normalize_phone;
///
/// assert_eq!(normalize_phone("(555) 123-4567"), "5551234567");
/// assert_eq!(normalize_phone(""), "");
/// ```
#[must_use]
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Key used for case-insensitive company equality.
#[must_use]
pub fn company_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Configured normalizer.
///
/// Holds the email provider rules and the minimum usable phone length.
#[derive(Debug, Clone)]
pub struct Normalizer {
    providers: HashMap<String, EmailProviderRule>,
    min_phone_digits: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizationConfig::default())
    }
}

impl Normalizer {
    /// Builds a normalizer from configuration.
    #[must_use]
    pub fn new(config: &NormalizationConfig) -> Self {
        let mut providers = HashMap::new();
        for rule in &config.email_providers {
            for domain in &rule.domains {
                providers.insert(domain.to_lowercase(), rule.clone());
            }
        }
        Self {
            providers,
            min_phone_digits: config.min_phone_digits,
        }
    }

    /// Normalizes an email address.
    ///
    /// Always trims and lowercases. Addresses without exactly one `@` stop
    /// there. For configured providers the local part is cut at the first
    /// `+` and/or stripped of dots, and the domain is rewritten to the
    /// provider's canonical domain.
    ///
    /// ```
    /// use contactlink::Normalizer;
    ///
    /// let n = Normalizer::default();
    /// assert_eq!(n.email("J.Doe+calendly@Gmail.com"), "jdoe@gmail.com");
    /// assert_eq!(n.email("j.doe+x@example.com"), "j.doe+x@example.com");
    /// assert_eq!(n.email("not-an-email"), "not-an-email");
    /// ```
    #[must_use]
    pub fn email(&self, raw: &str) -> String {
        let lowered = raw.trim().to_lowercase();
        let Some((local, domain)) = lowered.split_once('@') else {
            return lowered;
        };
        if domain.contains('@') || local.is_empty() || domain.is_empty() {
            return lowered;
        }
        let Some(rule) = self.providers.get(domain) else {
            return lowered;
        };

        let mut local = local;
        if rule.strip_plus {
            local = local.split('+').next().unwrap_or(local);
        }
        let local: String = if rule.strip_dots {
            local.chars().filter(|c| *c != '.').collect()
        } else {
            local.to_string()
        };
        if local.is_empty() {
            return lowered;
        }

        let domain = rule.canonical_domain.as_deref().unwrap_or(domain);
        format!("{local}@{domain}")
    }

    /// Normalizes a phone number to digits.
    #[must_use]
    pub fn phone(&self, raw: &str) -> String {
        normalize_phone(raw)
    }

    /// Returns true if a normalized phone is long enough to be a match key.
    #[must_use]
    pub fn is_usable_phone(&self, digits: &str) -> bool {
        !digits.is_empty() && digits.len() >= self.min_phone_digits
    }

    /// Normalizes a name.
    #[must_use]
    pub fn name(&self, raw: &str) -> NormalizedName {
        normalize_name(raw)
    }

    /// Normalizes a set of optional fields.
    #[must_use]
    pub fn identity(
        &self,
        name: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
        company: Option<&str>,
    ) -> NormalizedIdentity {
        NormalizedIdentity {
            email: email.map(|e| self.email(e)).unwrap_or_default(),
            phone: phone.map(normalize_phone).unwrap_or_default(),
            name: name.map(normalize_name).unwrap_or_default(),
            company: company.map(company_key).unwrap_or_default(),
        }
    }

    /// Normalizes an incoming record.
    #[must_use]
    pub fn record_identity(&self, record: &RawRecord) -> NormalizedIdentity {
        self.identity(
            record.name.as_deref(),
            record.email.as_deref(),
            record.phone.as_deref(),
            record.company.as_deref(),
        )
    }

    /// Normalizes a canonical contact.
    #[must_use]
    pub fn contact_identity(&self, contact: &CanonicalContact) -> NormalizedIdentity {
        self.identity(
            contact.name.as_deref(),
            contact.email.as_deref(),
            contact.phone.as_deref(),
            contact.company.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_gmail_alias() {
        let n = Normalizer::default();
        assert_eq!(n.email("j.doe+calendly@gmail.com"), "jdoe@gmail.com");
        assert_eq!(n.email("JDoe@googlemail.com"), "jdoe@gmail.com");
    }

    #[test]
    fn test_email_plus_only_provider_keeps_dots() {
        let n = Normalizer::default();
        assert_eq!(n.email("jane.doe+news@outlook.com"), "jane.doe@outlook.com");
    }

    #[test]
    fn test_email_unknown_domain_only_lowercased() {
        let n = Normalizer::default();
        assert_eq!(n.email("  Jane.Doe+x@Acme.IO "), "jane.doe+x@acme.io");
    }

    #[test]
    fn test_email_malformed_returned_unchanged() {
        let n = Normalizer::default();
        assert_eq!(n.email("a@b@gmail.com"), "a@b@gmail.com");
        assert_eq!(n.email("@gmail.com"), "@gmail.com");
        assert_eq!(n.email("jdoe@"), "jdoe@");
        assert_eq!(n.email(""), "");
    }

    #[test]
    fn test_email_empty_local_after_stripping() {
        let n = Normalizer::default();
        assert_eq!(n.email("+promo@gmail.com"), "+promo@gmail.com");
        assert_eq!(n.email("...@gmail.com"), "...@gmail.com");
    }

    #[test]
    fn test_email_idempotent() {
        let n = Normalizer::default();
        for raw in [
            "J.Doe+calendly@Gmail.com",
            "x@googlemail.com",
            "a+b+c@hotmail.com",
            "weird@@",
            "+promo@gmail.com",
            "plain",
            "",
        ] {
            let once = n.email(raw);
            assert_eq!(n.email(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_phone() {
        assert_eq!(normalize_phone("+1 (555) 123-4567 ext. 9"), "155512345679");
        assert_eq!(normalize_phone("n/a"), "");
        let n = Normalizer::default();
        assert!(n.is_usable_phone("123456"));
        assert!(!n.is_usable_phone("12345"));
        assert!(!n.is_usable_phone(""));
    }

    #[test]
    fn test_name_suffixes() {
        assert_eq!(normalize_name("John Smith Jr.").full, "john smith");
        assert_eq!(normalize_name("Jane Roe, PhD").full, "jane roe");
        assert_eq!(normalize_name("Jane Roe, Ph.D.").full, "jane roe");
        assert_eq!(normalize_name("Henry Ford III").full, "henry ford");
        assert_eq!(normalize_name("Saul Goodman Esq").full, "saul goodman");
        assert_eq!(normalize_name("Jim Jones Jr Sr").full, "jim jones");
        // A lone suffix-looking token is a name, not a suffix.
        assert_eq!(normalize_name("V").full, "v");
    }

    #[test]
    fn test_name_suffix_only_when_trailing() {
        assert_eq!(normalize_name("Md Rahman").full, "md rahman");
    }

    #[test]
    fn test_name_tokens() {
        let name = normalize_name("  Robert   J. Smith ");
        assert_eq!(name.full, "robert j smith");
        assert_eq!(name.first_token, "robert");
        assert_eq!(name.last_token, "smith");
        assert_eq!(name.tokens.len(), 3);
        assert!(name.is_full());

        let single = normalize_name("Cher");
        assert_eq!(single.first_token, "cher");
        assert_eq!(single.last_token, "cher");
        assert!(!single.is_full());
    }

    #[test]
    fn test_name_empty() {
        let name = normalize_name("   ");
        assert!(name.is_empty());
        assert_eq!(name.full, "");
        assert_eq!(name.first_token, "");
    }

    #[test]
    fn test_name_idempotent() {
        for raw in [
            "John Smith Jr.",
            "doe-v",
            "Mary-Kate O'Neil",
            "  A.  B.  ",
            "José Álvarez III",
            "",
        ] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once.full), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_identity_of_record() {
        let n = Normalizer::default();
        let record = RawRecord::new("zoom")
            .with_name("Bob Smith")
            .with_phone("555.123.4567")
            .with_company("  ACME ");
        let identity = n.record_identity(&record);
        assert_eq!(identity.email, "");
        assert_eq!(identity.phone, "5551234567");
        assert_eq!(identity.name.full, "bob smith");
        assert_eq!(identity.company, "acme");
    }
}
