//! The privileged verb menu.
//!
//! Every command the broker may issue is a [`PrivilegedCommand`]. Commands
//! are rendered to an argument vector, never to a shell string, and parsing
//! matches the leading tokens exactly against the menu below; anything else
//! is denied regardless of shape.
//!
//! | Command | argv |
//! |---------|------|
//! | install | `pm install -r <path>` |
//! | uninstall | `pm uninstall <identity>` |
//! | enable | `cmd overlay enable <identity>` |
//! | disable | `cmd overlay disable <identity>` |
//! | set-priority | `cmd overlay set-priority <identity> <n>` |
//! | settings-get | `settings get <namespace> <key>` |
//! | settings-put | `settings put <namespace> <key> <value>` |

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{GuardError, Result};
use crate::identity::is_valid_identity;
use crate::input::{contains_dangerous_characters, reject_dangerous};

/// Lowest overlay priority the host accepts.
pub const PRIORITY_MIN: i32 = -1000;
/// Highest overlay priority the host accepts.
pub const PRIORITY_MAX: i32 = 1000;

/// Longest value accepted by a settings write.
pub const MAX_SETTING_VALUE_LEN: usize = 4096;

/// Validate an overlay priority.
pub fn check_priority(value: i64) -> Result<i32> {
    i32::try_from(value)
        .ok()
        .filter(|v| (PRIORITY_MIN..=PRIORITY_MAX).contains(v))
        .ok_or(GuardError::PriorityOutOfRange {
            value,
            min: PRIORITY_MIN,
            max: PRIORITY_MAX,
        })
}

/// State change applied to an installed overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayVerb {
    Enable,
    Disable,
    SetPriority(i32),
}

impl OverlayVerb {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::SetPriority(_) => "set-priority",
        }
    }
}

/// Settings table a key lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingNamespace {
    System,
    Secure,
    Global,
}

impl SettingNamespace {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Secure => "secure",
            Self::Global => "global",
        }
    }
}

/// Accepted shape of a settings value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRule {
    /// Integer in an inclusive range.
    Integer { min: i64, max: i64 },
    /// Decimal in an inclusive range.
    Decimal { min: f64, max: f64 },
    /// Single opaque token: no whitespace, no dangerous characters.
    Token,
}

impl ValueRule {
    fn check(self, verb: &'static str, value: &str) -> Result<()> {
        if value.is_empty() || value.len() > MAX_SETTING_VALUE_LEN {
            return Err(GuardError::argument(verb, "value length out of range"));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(GuardError::argument(verb, "value contains whitespace"));
        }
        reject_dangerous("setting value", value)?;
        match self {
            Self::Integer { min, max } => {
                let parsed = value
                    .parse::<i64>()
                    .map_err(|_| GuardError::argument(verb, "value is not an integer"))?;
                if !(min..=max).contains(&parsed) {
                    return Err(GuardError::argument(
                        verb,
                        format!("value {parsed} outside [{min}, {max}]"),
                    ));
                }
            }
            Self::Decimal { min, max } => {
                let parsed = value
                    .parse::<f64>()
                    .map_err(|_| GuardError::argument(verb, "value is not a number"))?;
                if !parsed.is_finite() || parsed < min || parsed > max {
                    return Err(GuardError::argument(
                        verb,
                        format!("value {value} outside [{min}, {max}]"),
                    ));
                }
            }
            Self::Token => {}
        }
        Ok(())
    }
}

/// The enumerated host settings the agent may read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    ThemeCustomizationOverlayPackages,
    UiNightMode,
    FontScale,
    WindowAnimationScale,
    TransitionAnimationScale,
    AnimatorDurationScale,
}

impl SettingKey {
    pub const ALL: [SettingKey; 6] = [
        SettingKey::ThemeCustomizationOverlayPackages,
        SettingKey::UiNightMode,
        SettingKey::FontScale,
        SettingKey::WindowAnimationScale,
        SettingKey::TransitionAnimationScale,
        SettingKey::AnimatorDurationScale,
    ];

    #[must_use]
    pub fn namespace(self) -> SettingNamespace {
        match self {
            Self::ThemeCustomizationOverlayPackages | Self::UiNightMode => {
                SettingNamespace::Secure
            }
            Self::FontScale => SettingNamespace::System,
            Self::WindowAnimationScale
            | Self::TransitionAnimationScale
            | Self::AnimatorDurationScale => SettingNamespace::Global,
        }
    }

    /// Key name as the host spells it.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ThemeCustomizationOverlayPackages => "theme_customization_overlay_packages",
            Self::UiNightMode => "ui_night_mode",
            Self::FontScale => "font_scale",
            Self::WindowAnimationScale => "window_animation_scale",
            Self::TransitionAnimationScale => "transition_animation_scale",
            Self::AnimatorDurationScale => "animator_duration_scale",
        }
    }

    #[must_use]
    pub fn value_rule(self) -> ValueRule {
        match self {
            Self::ThemeCustomizationOverlayPackages => ValueRule::Token,
            Self::UiNightMode => ValueRule::Integer { min: 0, max: 2 },
            Self::FontScale => ValueRule::Decimal { min: 0.5, max: 2.0 },
            Self::WindowAnimationScale
            | Self::TransitionAnimationScale
            | Self::AnimatorDurationScale => ValueRule::Decimal { min: 0.0, max: 10.0 },
        }
    }

    /// Look a key up by namespace and name.
    #[must_use]
    pub fn lookup(namespace: &str, name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.namespace().as_str() == namespace && key.name() == name)
    }
}

impl FromStr for SettingKey {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.name() == s)
            .ok_or_else(|| GuardError::argument("settings", format!("unknown setting {s:?}")))
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace().as_str(), self.name())
    }
}

/// One entry from the privileged verb menu.
///
/// Variant fields are public for matching; the constructors validate them,
/// and [`PrivilegedCommand::validate`] re-checks a value of unknown origin
/// before it is issued.
#[derive(Debug, Clone, PartialEq)]
pub enum PrivilegedCommand {
    Install { path: PathBuf },
    Uninstall { identity: String },
    Overlay { identity: String, verb: OverlayVerb },
    ReadSetting { key: SettingKey },
    WriteSetting { key: SettingKey, value: String },
}

impl PrivilegedCommand {
    pub fn install(path: impl Into<PathBuf>) -> Result<Self> {
        let command = Self::Install { path: path.into() };
        command.validate()?;
        Ok(command)
    }

    pub fn uninstall(identity: &str) -> Result<Self> {
        let command = Self::Uninstall {
            identity: identity.to_string(),
        };
        command.validate()?;
        Ok(command)
    }

    pub fn overlay(identity: &str, verb: OverlayVerb) -> Result<Self> {
        let command = Self::Overlay {
            identity: identity.to_string(),
            verb,
        };
        command.validate()?;
        Ok(command)
    }

    #[must_use]
    pub fn read_setting(key: SettingKey) -> Self {
        Self::ReadSetting { key }
    }

    pub fn write_setting(key: SettingKey, value: &str) -> Result<Self> {
        let command = Self::WriteSetting {
            key,
            value: value.to_string(),
        };
        command.validate()?;
        Ok(command)
    }

    /// Re-check every argument against its per-verb rule.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Install { path } => check_install_path(path),
            Self::Uninstall { identity } => check_identity("uninstall", identity),
            Self::Overlay { identity, verb } => {
                check_identity(verb.as_str(), identity)?;
                if let OverlayVerb::SetPriority(priority) = verb {
                    check_priority(i64::from(*priority))?;
                }
                Ok(())
            }
            Self::ReadSetting { .. } => Ok(()),
            Self::WriteSetting { key, value } => key.value_rule().check("settings-put", value),
        }
    }

    /// Stable verb label for logs and errors.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Install { .. } => "install",
            Self::Uninstall { .. } => "uninstall",
            Self::Overlay { verb, .. } => verb.as_str(),
            Self::ReadSetting { .. } => "settings-get",
            Self::WriteSetting { .. } => "settings-put",
        }
    }

    /// What the command acts on: an identity, a path, or a setting.
    #[must_use]
    pub fn target(&self) -> String {
        match self {
            Self::Install { path } => path.display().to_string(),
            Self::Uninstall { identity } | Self::Overlay { identity, .. } => identity.clone(),
            Self::ReadSetting { key } | Self::WriteSetting { key, .. } => key.to_string(),
        }
    }

    /// Argument vector handed to the helper.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        match self {
            Self::Install { path } => vec![
                "pm".into(),
                "install".into(),
                "-r".into(),
                path.display().to_string(),
            ],
            Self::Uninstall { identity } => vec!["pm".into(), "uninstall".into(), identity.clone()],
            Self::Overlay { identity, verb } => {
                let mut words = vec![
                    "cmd".into(),
                    "overlay".into(),
                    verb.as_str().into(),
                    identity.clone(),
                ];
                if let OverlayVerb::SetPriority(priority) = verb {
                    words.push(priority.to_string());
                }
                words
            }
            Self::ReadSetting { key } => vec![
                "settings".into(),
                "get".into(),
                key.namespace().as_str().into(),
                key.name().into(),
            ],
            Self::WriteSetting { key, value } => vec![
                "settings".into(),
                "put".into(),
                key.namespace().as_str().into(),
                key.name().into(),
                value.clone(),
            ],
        }
    }

    /// Parse a command line against the menu. Default deny.
    pub fn parse(command: &str) -> Result<Self> {
        if contains_dangerous_characters(command) {
            return Err(GuardError::Dangerous { field: "command" });
        }
        let not_allowed = || GuardError::CommandNotAllowed {
            command: command.to_string(),
        };
        let tokens: Vec<&str> = command.split_ascii_whitespace().collect();
        match tokens.as_slice() {
            ["pm", "install", "-r", path] | ["pm", "install", path] => Self::install(*path),
            ["pm", "uninstall", identity] => Self::uninstall(identity),
            ["cmd", "overlay", "enable", identity] => Self::overlay(identity, OverlayVerb::Enable),
            ["cmd", "overlay", "disable", identity] => {
                Self::overlay(identity, OverlayVerb::Disable)
            }
            ["cmd", "overlay", "set-priority", identity, priority] => {
                let value = priority
                    .parse::<i64>()
                    .map_err(|_| GuardError::argument("set-priority", "priority is not an integer"))?;
                Self::overlay(identity, OverlayVerb::SetPriority(check_priority(value)?))
            }
            ["settings", "get", namespace, name] => SettingKey::lookup(namespace, name)
                .map(Self::read_setting)
                .ok_or_else(not_allowed),
            ["settings", "put", namespace, name, value] => {
                let key = SettingKey::lookup(namespace, name).ok_or_else(not_allowed)?;
                Self::write_setting(key, value)
            }
            _ => Err(not_allowed()),
        }
    }
}

impl FromStr for PrivilegedCommand {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PrivilegedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// `true` only if `command` parses into a [`PrivilegedCommand`].
#[must_use]
pub fn validate_command(command: &str) -> bool {
    PrivilegedCommand::parse(command).is_ok()
}

fn check_identity(verb: &'static str, identity: &str) -> Result<()> {
    if is_valid_identity(identity) {
        Ok(())
    } else {
        Err(GuardError::argument(
            verb,
            format!("invalid identity {identity:?}"),
        ))
    }
}

fn check_install_path(path: &Path) -> Result<()> {
    let rendered = path.to_str().ok_or_else(|| GuardError::PathNotAllowed {
        path: path.display().to_string(),
    })?;
    let rejected = || GuardError::PathNotAllowed {
        path: rendered.to_string(),
    };
    if !path.is_absolute() || rendered.chars().any(char::is_whitespace) {
        return Err(rejected());
    }
    reject_dangerous("install path", rendered)?;
    if path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(rejected());
    }
    Ok(())
}
