//! Registry records.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tincture_compiler::OverridePackage;

/// One installed overlay as the registry believes the host has it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayEntry {
    pub identity: String,
    pub display_name: String,
    pub enabled: bool,
    pub priority: i32,
    pub targets: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub conflicts_with: BTreeSet<String>,
    pub version: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OverlayEntry {
    /// Fresh record for a package the host just accepted.
    #[must_use]
    pub fn from_package(
        package: &OverridePackage,
        enabled: bool,
        priority: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            identity: package.identity.clone(),
            display_name: package.display_name.clone(),
            enabled,
            priority,
            targets: package.targets.clone(),
            depends_on: BTreeSet::new(),
            conflicts_with: BTreeSet::new(),
            version: package.version,
            digest: package.digest.clone(),
            installed_at: now,
            updated_at: now,
        }
    }

    /// Copy package metadata from a reinstall; relations and state stay.
    pub fn apply_update(&mut self, package: &OverridePackage, now: DateTime<Utc>) {
        self.display_name.clone_from(&package.display_name);
        self.targets.clone_from(&package.targets);
        self.version = package.version;
        self.digest.clone_from(&package.digest);
        self.updated_at = now;
    }
}
