//! Archive manifest and resource tables.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tincture_style::{Argb, DerivedPalette, RampTier};

use crate::feature::TargetFeature;

/// Manifest layout version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

pub const MANIFEST_PATH: &str = "manifest.json";
pub const ASSETS_DIR: &str = "assets";
pub const RESOURCES_DIR: &str = "res";

/// Resource tier, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceTier {
    Baseline,
    Rich,
}

impl ResourceTier {
    /// Directory holding this tier's tables.
    #[must_use]
    pub const fn dir(self) -> &'static str {
        match self {
            Self::Baseline => "res/values",
            Self::Rich => "res/values-rich",
        }
    }

    #[must_use]
    pub const fn table_path(self) -> &'static str {
        match self {
            Self::Baseline => "res/values/colors.json",
            Self::Rich => "res/values-rich/colors.json",
        }
    }

    #[must_use]
    pub const fn ramp_tier(self) -> RampTier {
        match self {
            Self::Baseline => RampTier::Baseline,
            Self::Rich => RampTier::Rich,
        }
    }
}

/// `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub identity: String,
    pub display_name: String,
    pub targets: Vec<String>,
    pub features: Vec<TargetFeature>,
    pub priority: i32,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub tiers: Vec<ResourceTier>,
    pub source_color: Argb,
}

/// Flat `role -> #AARRGGBB` map for one tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceTable {
    colors: BTreeMap<String, Argb>,
}

impl ResourceTable {
    #[must_use]
    pub fn from_palette(palette: &DerivedPalette) -> Self {
        Self {
            colors: palette.entries().into_iter().collect(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Argb> {
        self.colors.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Argb)> {
        self.colors.iter().map(|(name, color)| (name.as_str(), *color))
    }

    /// Ramp entries sorted by step.
    #[must_use]
    pub fn ramp(&self) -> Vec<(u16, Argb)> {
        let mut ramp: Vec<(u16, Argb)> = self
            .colors
            .iter()
            .filter_map(|(name, color)| {
                let step = name.strip_prefix("ramp_")?.parse::<u16>().ok()?;
                Some((step, *color))
            })
            .collect();
        ramp.sort_unstable_by_key(|(step, _)| *step);
        ramp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_serializes_as_a_flat_hex_map() {
        let palette = DerivedPalette::derive(Argb(0xFF62_00EE), RampTier::Baseline);
        let table = ResourceTable::from_palette(&palette);
        let json = serde_json::to_value(&table).expect("serialize");
        assert_eq!(json["primary"], "#FF6200EE");
        assert_eq!(json["on-primary"], "#FFFFFFFF");
        assert_eq!(json["ramp_0"], "#FFFFFFFF");
        assert_eq!(json["ramp_1000"], "#FF000000");
    }

    #[test]
    fn ramp_accessor_orders_numerically() {
        let palette = DerivedPalette::derive(Argb(0xFF00_9688), RampTier::Baseline);
        let table = ResourceTable::from_palette(&palette);
        let steps: Vec<u16> = table.ramp().into_iter().map(|(step, _)| step).collect();
        assert_eq!(steps, tincture_style::BASELINE_STEPS.to_vec());
    }

    #[test]
    fn tiers_map_to_fixed_paths() {
        assert_eq!(ResourceTier::Baseline.table_path(), "res/values/colors.json");
        assert_eq!(ResourceTier::Rich.dir(), "res/values-rich");
        assert_eq!(ResourceTier::Rich.ramp_tier(), RampTier::Rich);
    }
}
