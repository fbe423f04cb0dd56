//! Resolver configuration.
//!
//! Every section has a `Default` matching the production rule set, so an
//! empty TOML document is a valid configuration.
//!
//! ```toml
//! min_confidence = "high"
//!
//! [normalization]
//! min_phone_digits = 7
//!
//! [[normalization.email_providers]]
//! domains = ["gmail.com", "googlemail.com"]
//! strip_dots = true
//! strip_plus = true
//! canonical_domain = "gmail.com"
//!
//! [merge]
//! sales_stages = ["opportunity", "customer"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::confidence::Confidence;
use crate::error::{ConfigError, ValidationError};

/// Mailbox rules for one family of provider domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailProviderRule {
    /// Lowercase domains the rule applies to.
    pub domains: Vec<String>,
    /// The provider ignores dots in the local part.
    #[serde(default)]
    pub strip_dots: bool,
    /// The provider delivers `local+tag@` to `local@`.
    #[serde(default)]
    pub strip_plus: bool,
    /// Domain all of `domains` are rewritten to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_domain: Option<String>,
}

impl EmailProviderRule {
    fn plus_only(domains: &[&str]) -> Self {
        Self {
            domains: domains.iter().map(|d| (*d).to_string()).collect(),
            strip_dots: false,
            strip_plus: true,
            canonical_domain: None,
        }
    }
}

/// Normalizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Phones with fewer digits are never used as a match key.
    pub min_phone_digits: usize,
    /// Provider-specific email rules; a domain may appear in one rule only.
    pub email_providers: Vec<EmailProviderRule>,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            min_phone_digits: 6,
            email_providers: vec![
                EmailProviderRule {
                    domains: vec!["gmail.com".to_string(), "googlemail.com".to_string()],
                    strip_dots: true,
                    strip_plus: true,
                    canonical_domain: Some("gmail.com".to_string()),
                },
                EmailProviderRule::plus_only(&["outlook.com", "hotmail.com", "live.com"]),
                EmailProviderRule::plus_only(&["icloud.com", "me.com"]),
                EmailProviderRule::plus_only(&["fastmail.com"]),
                EmailProviderRule::plus_only(&["protonmail.com", "proton.me"]),
            ],
        }
    }
}

/// Matcher thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Name similarity that counts as "similar" for phone- and company-assisted tiers.
    pub similar_name_threshold: f64,
    /// Name similarity required for a name-only match.
    pub name_only_threshold: f64,
    /// Score the name-only tier against indexed candidates instead of every contact.
    pub narrow_name_candidates: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similar_name_threshold: 0.7,
            name_only_threshold: 0.85,
            narrow_name_candidates: true,
        }
    }
}

/// Merge policy settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Statuses that are never overwritten by an incoming record.
    pub sales_stages: Vec<String>,
    /// Separator placed between appended notes.
    pub notes_delimiter: String,
    /// Status for contacts created from records that carry none.
    pub default_status: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            sales_stages: vec![
                "opportunity".to_string(),
                "customer".to_string(),
                "deal".to_string(),
            ],
            notes_delimiter: "\n".to_string(),
            default_status: "lead".to_string(),
        }
    }
}

/// Worker runtime sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Maximum queued jobs before submissions are rejected.
    pub queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
        }
    }
}

/// Complete resolver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Default gate for batch and CLI callers.
    pub min_confidence: Confidence,
    /// Normalizer settings.
    pub normalization: NormalizationConfig,
    /// Matcher thresholds.
    pub matching: MatchingConfig,
    /// Merge policy settings.
    pub merge: MergeConfig,
    /// Worker runtime sizing.
    pub runtime: RuntimeConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_confidence: Confidence::High,
            normalization: NormalizationConfig::default(),
            matching: MatchingConfig::default(),
            merge: MergeConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl ResolverConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` on malformed TOML and `ConfigError::Invalid`
    /// when a value is out of range.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`ResolverConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Checks value ranges and rule consistency.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_threshold(
            "matching.similar_name_threshold",
            self.matching.similar_name_threshold,
        )?;
        check_threshold(
            "matching.name_only_threshold",
            self.matching.name_only_threshold,
        )?;

        if self.normalization.min_phone_digits == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "normalization.min_phone_digits must be at least 1".to_string(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for rule in &self.normalization.email_providers {
            if rule.domains.is_empty() {
                return Err(ValidationError::InvalidConfig {
                    reason: "email provider rule without domains".to_string(),
                });
            }
            for domain in &rule.domains {
                if domain.is_empty() || domain.contains('@') || *domain != domain.to_lowercase() {
                    return Err(ValidationError::InvalidConfig {
                        reason: format!("invalid provider domain '{domain}'"),
                    });
                }
                // Each domain belongs to exactly one rule.
                if !seen.insert(domain.as_str()) {
                    return Err(ValidationError::InvalidConfig {
                        reason: format!("provider domain '{domain}' listed twice"),
                    });
                }
            }
            // Rewriting into a domain governed by another rule would make
            // normalization non-idempotent.
            if let Some(canonical) = &rule.canonical_domain {
                if !rule.domains.contains(canonical) {
                    return Err(ValidationError::InvalidConfig {
                        reason: format!(
                            "canonical domain '{canonical}' must be one of the rule's domains"
                        ),
                    });
                }
            }
        }

        if self.runtime.workers == 0 || self.runtime.queue_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "runtime.workers and runtime.queue_capacity must be non-zero".to_string(),
            });
        }

        Ok(())
    }
}

fn check_threshold(field: &str, value: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidThreshold {
            field: field.to_string(),
            value,
        })
    }
}
