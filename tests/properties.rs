use contactlink::normalize::{normalize_name, normalize_phone};
use contactlink::{
    CanonicalContact, Confidence, ContactIndex, LeadSources, Matcher, MatchingConfig, MergePolicy,
    Normalizer, RawRecord,
};

const EMAILS: &[&str] = &[
    "J.Doe+calendly@Gmail.com",
    "  jdoe@googlemail.com ",
    "first.last+tag+more@outlook.com",
    "+onlytag@gmail.com",
    "...@gmail.com",
    "not-an-email",
    "two@@signs.com",
    "a@b@c.com",
    "@nolocal.com",
    "nodomain@",
    "Mixed.Case@Example.ORG",
    "",
    "   ",
    "ünïcödé.user+x@icloud.com",
];

const PHONES: &[&str] = &["(555) 123-4567", "+1 555.123.4567", "ext 12", "", "555-CALL-NOW", "١٢٣٤٥٦٧"];

const NAMES: &[&str] = &[
    "Robert Smith Jr.",
    "Smith, Robert",
    "  MARY-ANN   o'neil ",
    "Dr. John Q. Public III",
    "Jr.",
    "jr sr",
    "Sr., Jr",
    "José Álvarez, PhD",
    "",
    "!!!",
    "v v v",
];

#[test]
fn email_normalization_is_idempotent() {
    let normalizer = Normalizer::default();
    for raw in EMAILS {
        let once = normalizer.email(raw);
        assert_eq!(normalizer.email(&once), once, "input {raw:?}");
    }
}

#[test]
fn phone_normalization_is_idempotent() {
    for raw in PHONES {
        let once = normalize_phone(raw);
        assert_eq!(normalize_phone(&once), once, "input {raw:?}");
    }
}

#[test]
fn name_normalization_is_idempotent() {
    for raw in NAMES {
        let once = normalize_name(raw);
        assert_eq!(normalize_name(&once.full), once, "input {raw:?}");
    }
}

fn corpus() -> Vec<CanonicalContact> {
    let rows: &[(&str, Option<&str>, Option<&str>, Option<&str>)] = &[
        ("Robert Smith", Some("rsmith@acme.io"), Some("(555) 123-4567"), Some("Acme")),
        ("Bob Smith", None, Some("555-123-4567"), Some("Acme")),
        ("Alice Brown", Some("alice@globex.com"), None, Some("Globex")),
        ("Alice Browne", None, None, Some("Globex")),
        ("Jennifer Lopez", Some("jlo@gmail.com"), None, None),
        ("J Lopez", None, Some("4155550100"), None),
    ];
    rows.iter()
        .map(|(name, email, phone, company)| {
            let mut c = CanonicalContact::new();
            c.name = Some((*name).to_string());
            c.email = email.map(str::to_string);
            c.phone = phone.map(str::to_string);
            c.company = company.map(str::to_string);
            c
        })
        .collect()
}

fn probes() -> Vec<RawRecord> {
    vec![
        RawRecord::new("p").with_email("R.Smith@acme.io"),
        RawRecord::new("p").with_name("Rob Smith").with_phone("5551234567"),
        RawRecord::new("p").with_name("Alice Brown").with_company("globex "),
        RawRecord::new("p").with_name("Jen Lopez"),
        RawRecord::new("p").with_name("Jennifer Lopez").with_phone("415 555 0100"),
        RawRecord::new("p").with_name("Nobody Known"),
    ]
}

#[test]
fn find_best_match_is_deterministic() {
    let contacts = corpus();
    let matcher = Matcher::new(MatchingConfig::default());
    let forward = ContactIndex::build(Normalizer::default(), contacts.clone());
    let reversed = ContactIndex::build(Normalizer::default(), contacts.into_iter().rev());

    for record in probes() {
        let a = matcher.find_best_match(&forward, &record);
        let b = matcher.find_best_match(&forward, &record);
        let c = matcher.find_best_match(&reversed, &record);
        assert_eq!(a, b);
        assert_eq!(a.contact_id(), c.contact_id());
        assert_eq!(a.confidence, c.confidence);
        assert_eq!(a.contact.is_none(), a.confidence == Confidence::None);
    }
}

#[test]
fn case_insensitive_email_is_always_exact() {
    let matcher = Matcher::new(MatchingConfig::default());
    let mut contact = CanonicalContact::new();
    contact.name = Some("Zed Quinn".to_string());
    contact.email = Some("Someone@Example.com".to_string());
    contact.phone = Some("9998887777".to_string());
    contact.company = Some("Other".to_string());
    let index = ContactIndex::build(Normalizer::default(), [contact]);

    // Conflicting name, phone and company do not weaken an email match.
    let record = RawRecord::new("p")
        .with_name("Totally Different")
        .with_email("someone@example.COM")
        .with_phone("1112223333")
        .with_company("Acme");
    let result = matcher.find_best_match(&index, &record);
    assert_eq!(result.confidence, Confidence::Exact);
    assert!((result.score - 1.0).abs() < f64::EPSILON);
}

#[test]
fn merge_never_overwrites_keep_existing_fields() {
    let policy = MergePolicy::default();
    let mut existing = CanonicalContact::new();
    existing.email = Some("keep@x.io".to_string());
    existing.company = Some("Keep Co".to_string());
    existing.title = Some("Keeper".to_string());

    let incomings = [
        RawRecord::new("a"),
        RawRecord::new("b").with_email("other@y.io"),
        RawRecord::new("c").with_company("Other Co").with_title("Other"),
        RawRecord::new("d").with_email("").with_company("   ").with_title("x"),
    ];
    for incoming in &incomings {
        let merged = policy.merge(&existing, incoming);
        assert_eq!(merged.email, existing.email);
        assert_eq!(merged.company, existing.company);
        assert_eq!(merged.title, existing.title);
    }
}

#[test]
fn merge_keeps_padded_existing_values_verbatim() {
    let policy = MergePolicy::default();
    let mut existing = CanonicalContact::new();
    existing.email = Some("a@x.io ".to_string());
    existing.company = Some(" Acme ".to_string());
    existing.title = Some("\tFounder".to_string());

    for incoming in [
        RawRecord::new("a").with_company("Other").with_email("b@y.io"),
        RawRecord::new("b").with_title("CEO"),
        RawRecord::new("c").with_company("  "),
    ] {
        let merged = policy.merge(&existing, &incoming);
        assert_eq!(merged.email, existing.email);
        assert_eq!(merged.company, existing.company);
        assert_eq!(merged.title, existing.title);
    }
}

#[test]
fn merge_lead_source_is_a_union() {
    let policy = MergePolicy::default();
    let mut existing = CanonicalContact::new();
    existing.lead_source = LeadSources::parse("hubspot, zoom,calendly");

    for tag in ["zoom", "typeform", " typeform ", ""] {
        let merged = policy.merge(&existing, &RawRecord::new(tag));
        for t in existing.lead_source.iter() {
            assert!(merged.lead_source.contains(t));
        }
        if !tag.trim().is_empty() {
            assert!(merged.lead_source.contains(tag.trim()));
        }
        let tags: Vec<&str> = merged.lead_source.iter().collect();
        let mut deduped = tags.clone();
        deduped.dedup();
        assert_eq!(tags, deduped);
    }
}
