//! Character-level gates for untrusted strings.
//!
//! These checks never repair their input. A value that fails
//! [`contains_dangerous_characters`] is rejected outright; callers are not
//! expected to strip the offending characters and try again.

use crate::error::{GuardError, Result};

/// Shell metacharacters and line breaks that must never reach the helper.
pub const DANGEROUS_CHARS: [char; 10] = [';', '&', '|', '$', '`', '>', '<', '\n', '\r', '\0'];

/// Directory traversal sequences for both separator styles.
pub const TRAVERSAL_SEQUENCES: [&str; 2] = ["../", "..\\"];

/// Maximum display name length, counted in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 64;

/// Returns `true` if `input` contains a shell metacharacter, a line break, or
/// a traversal sequence.
#[must_use]
pub fn contains_dangerous_characters(input: &str) -> bool {
    input.contains(DANGEROUS_CHARS) || TRAVERSAL_SEQUENCES.iter().any(|seq| input.contains(seq))
}

/// Fails with [`GuardError::Dangerous`] naming `field` when `input` trips
/// [`contains_dangerous_characters`].
pub fn reject_dangerous(field: &'static str, input: &str) -> Result<()> {
    if contains_dangerous_characters(input) {
        Err(GuardError::Dangerous { field })
    } else {
        Ok(())
    }
}

/// `#` followed by exactly 6 (`RRGGBB`) or 8 (`AARRGGBB`) hex digits.
#[must_use]
pub fn validate_color(hex: &str) -> bool {
    let Some(digits) = hex.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 6 | 8) && digits.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parse a color literal accepted by [`validate_color`] into packed ARGB.
///
/// Six-digit literals are opaque.
pub fn parse_color(hex: &str) -> Result<u32> {
    let invalid = || GuardError::InvalidColor {
        input: hex.to_string(),
    };
    if !validate_color(hex) {
        return Err(invalid());
    }
    let digits = &hex[1..];
    let value = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;
    Ok(if digits.len() == 6 {
        0xFF00_0000 | value
    } else {
        value
    })
}

/// Canonical `#AARRGGBB` literal for a packed ARGB value.
#[must_use]
pub fn format_color(argb: u32) -> String {
    format!("#{argb:08X}")
}

/// Validate a human-facing theme name and return it trimmed.
pub fn validate_display_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(GuardError::InvalidDisplayName { reason: "empty" });
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(GuardError::InvalidDisplayName {
            reason: "longer than 64 characters",
        });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(GuardError::InvalidDisplayName {
            reason: "contains control characters",
        });
    }
    reject_dangerous("display name", trimmed)?;
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_metacharacters_are_dangerous() {
        for input in [
            "a;b", "a&b", "a|b", "$HOME", "`id`", "a>b", "a<b", "a\nb", "a\rb", "a\0b",
        ] {
            assert!(contains_dangerous_characters(input), "{input:?}");
        }
    }

    #[test]
    fn traversal_sequences_are_dangerous() {
        assert!(contains_dangerous_characters("../etc/passwd"));
        assert!(contains_dangerous_characters("themes\\..\\..\\boot"));
        assert!(contains_dangerous_characters("/data/app/../x"));
    }

    #[test]
    fn ordinary_values_pass() {
        for input in ["com.example.theme", "/data/app/x.pkg", "Ocean Blue", "1.25", "..."] {
            assert!(!contains_dangerous_characters(input), "{input:?}");
        }
    }

    #[test]
    fn color_literals_accept_six_and_eight_digits() {
        assert!(validate_color("#6200EE"));
        assert!(validate_color("#FF6200ee"));
        assert!(!validate_color("6200EE"));
        assert!(!validate_color("#6200E"));
        assert!(!validate_color("#6200EEF"));
        assert!(!validate_color("#6200EEFF0"));
        assert!(!validate_color("#6200EG"));
        assert!(!validate_color("#"));
        assert!(!validate_color(""));
    }

    #[test]
    fn parse_color_makes_short_literals_opaque() {
        assert_eq!(parse_color("#6200EE"), Ok(0xFF62_00EE));
        assert_eq!(parse_color("#806200EE"), Ok(0x8062_00EE));
        assert_eq!(
            parse_color("#xyz"),
            Err(GuardError::InvalidColor {
                input: "#xyz".to_string()
            })
        );
    }

    #[test]
    fn format_color_round_trips_through_parse() {
        let literal = format_color(0xFF12_ABCD);
        assert_eq!(literal, "#FF12ABCD");
        assert_eq!(parse_color(&literal), Ok(0xFF12_ABCD));
    }

    #[test]
    fn display_names_are_trimmed_and_bounded() {
        assert_eq!(validate_display_name("  Ocean "), Ok("Ocean"));
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(65)).is_err());
        assert!(validate_display_name(&"x".repeat(64)).is_ok());
        assert!(validate_display_name("Ocean\tDeep").is_err());
        assert_eq!(
            validate_display_name("Ocean; rm -rf /"),
            Err(GuardError::Dangerous {
                field: "display name"
            })
        );
    }
}
