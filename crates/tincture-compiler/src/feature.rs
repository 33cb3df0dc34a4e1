//! Host features a theme can restyle, and the components they resolve to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tincture_guard::GuardError;

const SYSTEM_UI: &str = "com.android.systemui";

/// A named part of the host UI.
///
/// Several features live in the same host component, so the mapping to
/// target identifiers is many-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetFeature {
    StatusBar,
    QuickSettings,
    Notifications,
    NavigationBar,
    Settings,
    Launcher,
    Keyboard,
    SystemAccents,
    LockScreen,
    VolumePanel,
}

impl TargetFeature {
    pub const ALL: [TargetFeature; 10] = [
        TargetFeature::StatusBar,
        TargetFeature::QuickSettings,
        TargetFeature::Notifications,
        TargetFeature::NavigationBar,
        TargetFeature::Settings,
        TargetFeature::Launcher,
        TargetFeature::Keyboard,
        TargetFeature::SystemAccents,
        TargetFeature::LockScreen,
        TargetFeature::VolumePanel,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StatusBar => "status_bar",
            Self::QuickSettings => "quick_settings",
            Self::Notifications => "notifications",
            Self::NavigationBar => "navigation_bar",
            Self::Settings => "settings",
            Self::Launcher => "launcher",
            Self::Keyboard => "keyboard",
            Self::SystemAccents => "system_accents",
            Self::LockScreen => "lock_screen",
            Self::VolumePanel => "volume_panel",
        }
    }

    /// Identifier of the host component this feature overrides.
    #[must_use]
    pub const fn target(self) -> &'static str {
        match self {
            Self::StatusBar
            | Self::QuickSettings
            | Self::Notifications
            | Self::NavigationBar
            | Self::LockScreen
            | Self::VolumePanel => SYSTEM_UI,
            Self::Settings => "com.android.settings",
            Self::Launcher => "com.android.launcher3",
            Self::Keyboard => "com.android.inputmethod.latin",
            Self::SystemAccents => "android",
        }
    }
}

impl fmt::Display for TargetFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetFeature {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|feature| feature.as_str() == normalized)
            .ok_or_else(|| GuardError::argument("compile", format!("unknown feature {s:?}")))
    }
}

/// Target identifiers for `features`, de-duplicated in first-seen order.
pub fn targets_for(features: impl IntoIterator<Item = TargetFeature>) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    for feature in features {
        let target = feature.target();
        if !targets.iter().any(|existing| existing == target) {
            targets.push(target.to_string());
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for feature in TargetFeature::ALL {
            assert_eq!(feature.as_str().parse::<TargetFeature>(), Ok(feature));
        }
        assert_eq!("Status-Bar".parse::<TargetFeature>(), Ok(TargetFeature::StatusBar));
        assert!("wallpaper".parse::<TargetFeature>().is_err());
    }

    #[test]
    fn targets_are_deduplicated_in_order() {
        let targets = targets_for([
            TargetFeature::Settings,
            TargetFeature::StatusBar,
            TargetFeature::QuickSettings,
            TargetFeature::Settings,
            TargetFeature::SystemAccents,
        ]);
        assert_eq!(
            targets,
            vec!["com.android.settings", SYSTEM_UI, "android"]
        );
        assert!(targets_for([]).is_empty());
    }

    #[test]
    fn serde_uses_snake_case_names() {
        let json = serde_json::to_string(&TargetFeature::VolumePanel).expect("serialize");
        assert_eq!(json, "\"volume_panel\"");
    }
}
