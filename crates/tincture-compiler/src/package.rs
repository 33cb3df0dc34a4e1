//! Compiled override packages.

use std::fmt;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::archive::ArchiveReader;
use crate::error::Result;

/// A compiled archive plus the metadata the registry records for it.
///
/// Immutable once built; an update produces a new package with a higher
/// `version` under the same identity.
#[derive(Clone, PartialEq, Eq)]
pub struct OverridePackage {
    pub identity: String,
    pub payload: Vec<u8>,
    pub targets: Vec<String>,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub version: u32,
    pub display_name: String,
    /// Lowercase hex SHA-256 of `payload`.
    pub digest: String,
}

impl OverridePackage {
    /// Parse the payload back into its manifest and tables.
    pub fn open(&self) -> Result<ArchiveReader> {
        ArchiveReader::from_bytes(&self.payload)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// First 12 digest characters, for log lines.
    #[must_use]
    pub fn short_digest(&self) -> &str {
        self.digest.get(..12).unwrap_or(&self.digest)
    }
}

impl fmt::Debug for OverridePackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverridePackage")
            .field("identity", &self.identity)
            .field("payload_bytes", &self.payload.len())
            .field("targets", &self.targets)
            .field("priority", &self.priority)
            .field("created_at", &self.created_at)
            .field("version", &self.version)
            .field("display_name", &self.display_name)
            .field("digest", &self.digest)
            .finish()
    }
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input_is_the_known_constant() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn debug_output_omits_payload_bytes() {
        let package = OverridePackage {
            identity: "com.example.theme".to_string(),
            payload: vec![7; 4096],
            targets: Vec::new(),
            priority: 0,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            version: 1,
            display_name: "Example".to_string(),
            digest: sha256_hex(&[7; 4096]),
        };
        let rendered = format!("{package:?}");
        assert!(rendered.contains("payload_bytes: 4096"));
        assert!(!rendered.contains("7, 7, 7"));
        assert_eq!(package.short_digest().len(), 12);
        assert_eq!(package.size(), 4096);
    }
}
