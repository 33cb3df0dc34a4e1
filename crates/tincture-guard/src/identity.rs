//! Reverse-DNS package identities.
//!
//! An identity names an override package on the host. Only identities that
//! match [`is_valid_identity`] ever reach the broker; the sanitizing entry
//! point [`validate_package_identity`] exists for caller-supplied strings and
//! reports whether anything had to be removed.

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::error::{GuardError, Result};

/// Host limit on package name length.
pub const MAX_IDENTITY_LEN: usize = 255;

/// Longest segment produced by [`slug_segment`].
pub const MAX_SLUG_LEN: usize = 32;

fn identity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9_]*(\.[a-z][a-z0-9_]*)+$").expect("identity regex")
    })
}

/// An identity that passed validation, possibly after stripping characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitizedIdentity {
    value: String,
    modified: bool,
}

impl SanitizedIdentity {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// `true` when the sanitized value differs from the caller's input.
    #[must_use]
    pub fn was_modified(&self) -> bool {
        self.modified
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.value
    }
}

impl AsRef<str> for SanitizedIdentity {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

/// Strict check: no sanitization, exact reverse-DNS shape.
#[must_use]
pub fn is_valid_identity(input: &str) -> bool {
    input.len() <= MAX_IDENTITY_LEN && identity_pattern().is_match(input)
}

/// Strip characters outside `[a-z0-9_.]` and validate what remains.
pub fn validate_package_identity(input: &str) -> Result<SanitizedIdentity> {
    let value: String = input
        .chars()
        .filter(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '.'))
        .collect();
    if !is_valid_identity(&value) {
        return Err(GuardError::InvalidIdentity {
            input: input.to_string(),
        });
    }
    let modified = value != input;
    Ok(SanitizedIdentity { value, modified })
}

/// Strict form returning a typed error, for values that must already be clean.
pub fn require_identity(input: &str) -> Result<&str> {
    if is_valid_identity(input) {
        Ok(input)
    } else {
        Err(GuardError::InvalidIdentity {
            input: input.to_string(),
        })
    }
}

/// Turn free text into one identity segment (`[a-z][a-z0-9_]*`).
///
/// Runs of other characters collapse to a single `_`. A leading digit gets a
/// `t` prefix and an empty result becomes `theme`.
#[must_use]
pub fn slug_segment(text: &str) -> String {
    let mut slug = String::with_capacity(text.len().min(MAX_SLUG_LEN));
    let mut pending_separator = false;
    for ch in text.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(ch);
        } else {
            pending_separator = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    if slug.is_empty() {
        return "theme".to_string();
    }
    if slug.starts_with(|c: char| c.is_ascii_digit()) {
        slug.insert(0, 't');
        slug.truncate(MAX_SLUG_LEN);
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_reverse_dns_names() {
        assert!(is_valid_identity("com.example.theme"));
        assert!(is_valid_identity("a.b"));
        assert!(is_valid_identity("com.tincture.overlay.ocean_1700000000000_1"));
    }

    #[test]
    fn rejects_malformed_names() {
        for input in [
            "",
            "com",
            "Com.example",
            "com..example",
            ".com.example",
            "com.example.",
            "com.1example",
            "_com.example",
            "com.example-theme",
        ] {
            assert!(!is_valid_identity(input), "{input:?}");
        }
        assert!(!is_valid_identity(&format!("a.{}", "b".repeat(254))));
    }

    #[test]
    fn sanitizing_reports_modification() {
        let clean = validate_package_identity("com.example.theme").expect("clean identity");
        assert_eq!(clean.as_str(), "com.example.theme");
        assert!(!clean.was_modified());

        let stripped = validate_package_identity("com.example.the-me!").expect("strippable");
        assert_eq!(stripped.as_str(), "com.example.theme");
        assert!(stripped.was_modified());
    }

    #[test]
    fn sanitizing_still_rejects_unrecoverable_input() {
        assert_eq!(
            validate_package_identity("rm -rf /"),
            Err(GuardError::InvalidIdentity {
                input: "rm -rf /".to_string()
            })
        );
        assert!(validate_package_identity("COM.EXAMPLE").is_err());
    }

    #[test]
    fn require_identity_does_not_sanitize() {
        assert!(require_identity("com.example.theme").is_ok());
        assert!(require_identity("com.example.theme;").is_err());
    }

    #[test]
    fn slug_segment_produces_identity_segments() {
        assert_eq!(slug_segment("Ocean"), "ocean");
        assert_eq!(slug_segment("Deep  Ocean / Night"), "deep_ocean_night");
        assert_eq!(slug_segment("  --  "), "theme");
        assert_eq!(slug_segment("2024 Sunset"), "t2024_sunset");
        assert_eq!(slug_segment("Łódź"), "d");
        assert!(slug_segment(&"abc ".repeat(40)).len() <= MAX_SLUG_LEN);
        assert!(is_valid_identity(&format!("com.x.{}", slug_segment("Ocean!"))));
    }
}
