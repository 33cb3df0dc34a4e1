//! The caller's description of a theme.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tincture_guard::{GuardError, check_priority, validate_color, validate_display_name};
use tincture_style::Argb;

use crate::feature::{TargetFeature, targets_for};

/// One compile request. Immutable once handed to the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSpec {
    pub base_color: Argb,
    pub display_name: String,
    #[serde(default)]
    pub target_features: BTreeSet<TargetFeature>,
    /// Overlay priority; the compiler default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl ThemeSpec {
    pub fn new(
        base_color: Argb,
        display_name: impl Into<String>,
        target_features: impl IntoIterator<Item = TargetFeature>,
    ) -> Self {
        Self {
            base_color,
            display_name: display_name.into(),
            target_features: target_features.into_iter().collect(),
            priority: None,
        }
    }

    /// Build from a `#RRGGBB` / `#AARRGGBB` literal.
    pub fn from_hex(
        hex: &str,
        display_name: impl Into<String>,
        target_features: impl IntoIterator<Item = TargetFeature>,
    ) -> Result<Self, GuardError> {
        Ok(Self::new(Argb::from_hex(hex)?, display_name, target_features))
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Target identifiers implied by the feature set.
    #[must_use]
    pub fn targets(&self) -> Vec<String> {
        targets_for(self.target_features.iter().copied())
    }

    /// Check every field and return the trimmed display name.
    pub fn validate(&self) -> Result<&str, GuardError> {
        let hex = self.base_color.to_hex();
        if !validate_color(&hex) {
            return Err(GuardError::InvalidColor { input: hex });
        }
        if let Some(priority) = self.priority {
            check_priority(i64::from(priority))?;
        }
        validate_display_name(&self.display_name)
    }
}
