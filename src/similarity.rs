//! Pairwise similarity signals between a record and a canonical contact.
//!
//! Name similarity is a cascade; the first rule that applies decides the score:
//!
//! | Rule                                              | Score |
//! |---------------------------------------------------|-------|
//! | identical normalized names                        | 1.0   |
//! | one full name a substring of the other            | 0.9   |
//! | nickname first tokens, same last token            | 0.95  |
//! | nickname first tokens, different last token       | 0.8   |
//! | initial format (`j doe` vs `john doe`)            | 0.85  |
//! | character-bigram Jaccard                          | [0,1) |

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::normalize::{company_key, NormalizedName, Normalizer};

/// Score for identical normalized names.
pub const IDENTICAL_SCORE: f64 = 1.0;
/// Score when one full name contains the other.
pub const CONTAINED_SCORE: f64 = 0.9;
/// Score for nickname first names with the same last name.
pub const NICKNAME_SAME_LAST_SCORE: f64 = 0.95;
/// Score for nickname first names with different last names.
pub const NICKNAME_SCORE: f64 = 0.8;
/// Score for the initial format (`j doe` vs `john doe`).
pub const INITIAL_SCORE: f64 = 0.85;

/// Formal first name and the short forms that refer to it.
///
/// A short form maps to the first group that lists it.
const NICKNAMES: &[(&str, &[&str])] = &[
    ("robert", &["bob", "bobby", "rob", "robbie", "bert"]),
    ("william", &["bill", "billy", "will", "willy", "liam"]),
    ("jennifer", &["jen", "jenn", "jenny"]),
    ("james", &["jim", "jimmy", "jamie"]),
    ("john", &["jack", "johnny"]),
    ("jonathan", &["jon", "jonny"]),
    ("michael", &["mike", "mikey", "mick"]),
    ("richard", &["rick", "ricky", "rich", "dick"]),
    ("thomas", &["tom", "tommy"]),
    ("elizabeth", &["liz", "lizzie", "beth", "betsy", "eliza", "betty"]),
    ("katherine", &["kate", "kathy", "katie", "kat"]),
    ("catherine", &["cathy", "cat"]),
    ("margaret", &["maggie", "meg", "peggy"]),
    ("christopher", &["chris", "topher"]),
    ("christine", &["chrissy", "tina"]),
    ("daniel", &["dan", "danny"]),
    ("david", &["dave", "davey"]),
    ("joseph", &["joe", "joey"]),
    ("edward", &["ed", "eddie", "ted", "ned"]),
    ("anthony", &["tony"]),
    ("steven", &["steve", "stevie"]),
    ("stephen", &["steph"]),
    ("matthew", &["matt"]),
    ("andrew", &["andy", "drew"]),
    ("alexander", &["alex", "xander"]),
    ("alexandra", &["lexi", "sandra"]),
    ("benjamin", &["ben", "benny"]),
    ("samuel", &["sam", "sammy"]),
    ("nicholas", &["nick", "nicky"]),
    ("patricia", &["pat", "patty", "trish"]),
    ("susan", &["sue", "susie"]),
    ("deborah", &["deb", "debbie"]),
    ("rebecca", &["becky", "becca"]),
    ("timothy", &["tim", "timmy"]),
    ("kenneth", &["ken", "kenny"]),
    ("charles", &["charlie", "chuck"]),
    ("gregory", &["greg"]),
    ("jeffrey", &["jeff"]),
    ("joshua", &["josh"]),
    ("zachary", &["zach", "zack"]),
    ("victoria", &["vicky", "tori"]),
    ("abigail", &["abby"]),
    ("theodore", &["theo"]),
    ("frederick", &["fred", "freddie"]),
    ("lawrence", &["larry"]),
    ("raymond", &["ray"]),
    ("ronald", &["ron", "ronnie"]),
    ("donald", &["don", "donny"]),
    ("douglas", &["doug"]),
    ("peter", &["pete"]),
    ("philip", &["phil"]),
    ("samantha", &["sammie"]),
    ("jessica", &["jess", "jessie"]),
    ("kimberly", &["kim"]),
    ("pamela", &["pam"]),
];

static NICKNAME_INDEX: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

fn nickname_index() -> &'static HashMap<&'static str, &'static str> {
    NICKNAME_INDEX.get_or_init(|| {
        let mut index = HashMap::new();
        for (formal, shorts) in NICKNAMES {
            index.entry(*formal).or_insert(*formal);
            for short in *shorts {
                index.entry(*short).or_insert(*formal);
            }
        }
        index
    })
}

/// Maps a lowercase first name to its formal form; unknown names map to themselves.
///
/// ```
/// use contactlink::similarity::canonical_first_name;
///
/// assert_eq!(canonical_first_name("bob"), "robert");
/// assert_eq!(canonical_first_name("robert"), "robert");
/// assert_eq!(canonical_first_name("zelda"), "zelda");
/// ```
#[must_use]
pub fn canonical_first_name(token: &str) -> &str {
    nickname_index().get(token).copied().unwrap_or(token)
}

/// Which rule produced a name similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatchKind {
    /// At least one side has no name.
    Missing,
    /// Equal normalized full names.
    Identical,
    /// One full name contains the other.
    Contained,
    /// First names are nickname variants.
    Nickname {
        /// Both names are full and share a last token.
        same_last: bool,
    },
    /// One first name is the initial of the other.
    Initial,
    /// Character-bigram Jaccard fallback.
    Bigram,
}

/// A name similarity score together with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NameSimilarity {
    /// Similarity in `[0, 1]`.
    pub score: f64,
    /// The rule that produced the score.
    pub kind: NameMatchKind,
}

impl NameSimilarity {
    const fn new(score: f64, kind: NameMatchKind) -> Self {
        Self { score, kind }
    }
}

fn is_nickname_pair(a: &NormalizedName, b: &NormalizedName) -> bool {
    a.first_token != b.first_token
        && canonical_first_name(&a.first_token) == canonical_first_name(&b.first_token)
}

/// Returns true if one name abbreviates the other's first token to its
/// initial and both share a last token (`j doe` vs `john doe`).
#[must_use]
pub fn is_initial_format(a: &NormalizedName, b: &NormalizedName) -> bool {
    if !a.is_full() || !b.is_full() || a.last_token != b.last_token {
        return false;
    }
    let initial_of = |short: &str, long: &str| {
        short.chars().count() == 1 && long.chars().count() > 1 && long.starts_with(short)
    };
    initial_of(&a.first_token, &b.first_token) || initial_of(&b.first_token, &a.first_token)
}

pub(crate) fn bigrams(s: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Jaccard similarity of the consecutive-character pairs of two strings.
///
/// ```
/// use contactlink::similarity::bigram_jaccard;
///
/// assert!((bigram_jaccard("night", "nacht") - 1.0 / 7.0).abs() < 1e-9);
/// assert_eq!(bigram_jaccard("a", "b"), 0.0);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bigram_jaccard(a: &str, b: &str) -> f64 {
    let a = bigrams(a);
    let b = bigrams(b);
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(&b).count();
    intersection as f64 / union as f64
}

/// Scores two normalized names in `[0, 1]`.
#[must_use]
pub fn name_similarity(a: &NormalizedName, b: &NormalizedName) -> NameSimilarity {
    if a.is_empty() || b.is_empty() {
        return NameSimilarity::new(0.0, NameMatchKind::Missing);
    }
    if a.full == b.full {
        return NameSimilarity::new(IDENTICAL_SCORE, NameMatchKind::Identical);
    }
    if a.full.contains(b.full.as_str()) || b.full.contains(a.full.as_str()) {
        return NameSimilarity::new(CONTAINED_SCORE, NameMatchKind::Contained);
    }
    if is_nickname_pair(a, b) {
        let same_last = a.is_full() && b.is_full() && a.last_token == b.last_token;
        let score = if same_last {
            NICKNAME_SAME_LAST_SCORE
        } else {
            NICKNAME_SCORE
        };
        return NameSimilarity::new(score, NameMatchKind::Nickname { same_last });
    }
    if is_initial_format(a, b) {
        return NameSimilarity::new(INITIAL_SCORE, NameMatchKind::Initial);
    }
    NameSimilarity::new(bigram_jaccard(&a.full, &b.full), NameMatchKind::Bigram)
}

/// Returns true if both phones are equal, non-empty digit strings of usable length.
#[must_use]
pub fn phones_match(normalizer: &Normalizer, a: &str, b: &str) -> bool {
    let a = normalizer.phone(a);
    normalizer.is_usable_phone(&a) && a == normalizer.phone(b)
}

/// Case-insensitive exact company equality. Blank companies never match.
#[must_use]
pub fn companies_match(a: &str, b: &str) -> bool {
    let a = company_key(a);
    !a.is_empty() && a == company_key(b)
}

/// How two email addresses relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailMatch {
    /// Case-insensitively equal as written.
    Exact,
    /// Different as written, equal after provider normalization.
    Normalized,
    /// Neither form matches.
    None,
}

/// Compares two raw email addresses.
#[must_use]
pub fn email_match(normalizer: &Normalizer, a: &str, b: &str) -> EmailMatch {
    let raw_a = a.trim().to_lowercase();
    if raw_a.is_empty() {
        return EmailMatch::None;
    }
    if raw_a == b.trim().to_lowercase() {
        return EmailMatch::Exact;
    }
    if normalizer.email(a) == normalizer.email(b) {
        return EmailMatch::Normalized;
    }
    EmailMatch::None
}
