#![forbid(unsafe_code)]

//! Input gates for tincture.
//!
//! # Role in tincture
//! `tincture-guard` is the only place raw caller strings are interpreted.
//! Identities, paths, colors, display names and privileged commands leave
//! this crate either as typed values or as a [`GuardError`]; nothing
//! downstream re-parses the original string.
//!
//! # This crate provides
//! - [`validate_package_identity`] and [`is_valid_identity`] for reverse-DNS
//!   package names.
//! - [`contains_dangerous_characters`], the hard reject gate for shell
//!   metacharacters and traversal sequences.
//! - [`validate_file_path`] for symlink-resolved root containment.
//! - [`validate_color`] / [`parse_color`] for `#RRGGBB` and `#AARRGGBB`.
//! - [`PrivilegedCommand`], the structured verb menu, with
//!   [`validate_command`] as its default-deny string entry point.

/// The privileged verb menu.
pub mod command;
/// Error type for rejected input.
pub mod error;
/// Reverse-DNS package identities.
pub mod identity;
/// Character-level gates, colors, and display names.
pub mod input;
/// Path containment checks.
pub mod path;

pub use command::{
    OverlayVerb, PRIORITY_MAX, PRIORITY_MIN, PrivilegedCommand, SettingKey, SettingNamespace,
    ValueRule, check_priority, validate_command,
};
pub use error::{GuardError, Result};
pub use identity::{
    MAX_IDENTITY_LEN, SanitizedIdentity, is_valid_identity, require_identity, slug_segment,
    validate_package_identity,
};
pub use input::{
    contains_dangerous_characters, format_color, parse_color, reject_dangerous, validate_color,
    validate_display_name,
};
pub use path::{resolve_path, validate_file_path};
