//! Agent configuration.
//!
//! Loaded from TOML at startup; every field has a default, so an empty file
//! (or no file) is a valid configuration.
//!
//! ```toml
//! scratch_dir = "/data/local/tmp/tincture"
//! registry_path = "/data/local/tmp/tincture/registry.json"
//! call_timeout = "30s"
//! log_format = "json"
//! enable_failure_policy = "keep-disabled"
//!
//! [helper]
//! program = "tincture-helper"
//! args = []
//! probe = ["settings", "get", "secure", "ui_night_mode"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tincture_broker::BrokerConfig;
use tincture_compiler::{CompilerOptions, DEFAULT_IDENTITY_PREFIX};
use tincture_guard::{PRIORITY_MAX, PRIORITY_MIN, contains_dangerous_characters, is_valid_identity};
use tincture_registry::EnableFailurePolicy;

use crate::util::parse_duration;

pub const DEFAULT_SCRATCH_DIR: &str = "/data/local/tmp/tincture";
pub const DEFAULT_REGISTRY_FILE: &str = "registry.json";
pub const DEFAULT_HELPER: &str = "tincture-helper";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Fmt,
    Json,
}

/// How to reach the privileged helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelperConfig {
    /// Absolute path, or a name resolved on `PATH`.
    pub program: String,
    /// Arguments placed before every command's own words.
    pub args: Vec<String>,
    /// Command run at connect time; exit 0 grants permission.
    pub probe: Option<Vec<String>>,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_HELPER.to_string(),
            args: Vec::new(),
            probe: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Compiled archives are written here before install.
    pub scratch_dir: PathBuf,
    /// Registry file; relative paths resolve against `scratch_dir`.
    pub registry_path: PathBuf,
    /// Roots an install path must sit under. Empty means `scratch_dir`.
    pub install_roots: Vec<PathBuf>,
    pub helper: HelperConfig,
    /// Per-call helper deadline, e.g. `30s` or `1500ms`.
    pub call_timeout: String,
    pub identity_prefix: String,
    pub default_priority: i32,
    pub emit_rich_tier: bool,
    pub enable_failure_policy: EnableFailurePolicy,
    pub log_format: LogFormat,
    /// Overrides `TINCTURE_LOG` when set.
    pub log_filter: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
            registry_path: PathBuf::from(DEFAULT_REGISTRY_FILE),
            install_roots: Vec::new(),
            helper: HelperConfig::default(),
            call_timeout: "30s".to_string(),
            identity_prefix: DEFAULT_IDENTITY_PREFIX.to_string(),
            default_priority: 0,
            emit_rich_tier: true,
            enable_failure_policy: EnableFailurePolicy::default(),
            log_format: LogFormat::default(),
            log_filter: None,
        }
    }
}

impl AgentConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load `path` if given, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_toml_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Problems found; empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.scratch_dir.is_absolute() {
            errors.push(format!(
                "scratch_dir must be absolute, got {}",
                self.scratch_dir.display()
            ));
        }
        for root in &self.install_roots {
            if !root.is_absolute() {
                errors.push(format!("install root must be absolute, got {}", root.display()));
            }
        }
        if !self.install_roots.is_empty()
            && !self.install_roots.iter().any(|r| self.scratch_dir.starts_with(r))
        {
            errors.push("scratch_dir must sit under one of install_roots".to_string());
        }

        match parse_duration(&self.call_timeout) {
            Ok(timeout) if timeout.is_zero() => {
                errors.push("call_timeout must be greater than zero".to_string());
            }
            Ok(_) => {}
            Err(err) => errors.push(format!("call_timeout: {err}")),
        }

        if self.helper.program.trim().is_empty() {
            errors.push("helper.program must not be empty".to_string());
        }
        let helper_words = self
            .helper
            .args
            .iter()
            .chain(self.helper.probe.iter().flatten());
        for word in helper_words {
            if contains_dangerous_characters(word) {
                errors.push(format!("helper argument contains shell metacharacters: {word:?}"));
            }
        }

        if !is_valid_identity(&self.identity_prefix) {
            errors.push(format!(
                "identity_prefix is not a valid package identity: {:?}",
                self.identity_prefix
            ));
        }
        if !(PRIORITY_MIN..=PRIORITY_MAX).contains(&self.default_priority) {
            errors.push(format!(
                "default_priority must be in [{PRIORITY_MIN}, {PRIORITY_MAX}], got {}",
                self.default_priority
            ));
        }

        if let Some(filter) = &self.log_filter {
            if filter.trim().is_empty() {
                errors.push("log_filter must not be empty when set".to_string());
            }
        }

        errors
    }

    /// `validate` as a `Result`.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    #[must_use]
    pub fn registry_file(&self) -> PathBuf {
        if self.registry_path.is_absolute() {
            self.registry_path.clone()
        } else {
            self.scratch_dir.join(&self.registry_path)
        }
    }

    #[must_use]
    pub fn effective_install_roots(&self) -> Vec<PathBuf> {
        if self.install_roots.is_empty() {
            vec![self.scratch_dir.clone()]
        } else {
            self.install_roots.clone()
        }
    }

    /// Parsed `call_timeout`; falls back to 30s if it does not parse.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        parse_duration(&self.call_timeout).unwrap_or(Duration::from_secs(30))
    }

    #[must_use]
    pub fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            identity_prefix: self.identity_prefix.clone(),
            default_priority: self.default_priority,
            emit_rich_tier: self.emit_rich_tier,
        }
    }

    #[must_use]
    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            install_roots: self.effective_install_roots(),
            call_timeout: self.call_timeout(),
        }
    }
}
