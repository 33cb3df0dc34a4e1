use std::path::PathBuf;

use thiserror::Error;
use tincture_broker::BrokerError;
use tincture_guard::GuardError;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Persistence failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("unsupported registry file version: {found} (expected {expected})")]
    Version { found: u64, expected: u64 },

    #[error("failed to serialize registry: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("registry store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The broker call gating this mutation failed; nothing was recorded.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Invalid(#[from] GuardError),

    #[error("overlay not found: {identity}")]
    NotFound { identity: String },

    #[error("overlay already installed: {identity}")]
    AlreadyInstalled { identity: String },

    #[error("cannot enable {identity}: dependency {dependency} is not enabled")]
    DependencyNotEnabled { identity: String, dependency: String },

    #[error("cannot enable {identity}: conflicts with enabled overlay {conflict}")]
    Conflict { identity: String, conflict: String },

    #[error("cannot disable or remove {identity}: enabled overlay {dependent} depends on it")]
    DependentEnabled { identity: String, dependent: String },

    /// Enable failed and the compensating uninstall failed too; the overlay
    /// is recorded disabled.
    #[error("rollback of {identity} failed (enable: {enable}; uninstall: {uninstall})")]
    RollbackFailed {
        identity: String,
        enable: String,
        uninstall: String,
    },

    /// The host changed but the change could not be persisted. In-memory
    /// state already reflects the host.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl RegistryError {
    pub(crate) fn not_found(identity: &str) -> Self {
        Self::NotFound {
            identity: identity.to_string(),
        }
    }

    /// `true` when the caller's input or the table's relations refused the
    /// operation before any broker call.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Invalid(_)
            | Self::NotFound { .. }
            | Self::AlreadyInstalled { .. }
            | Self::DependencyNotEnabled { .. }
            | Self::Conflict { .. }
            | Self::DependentEnabled { .. } => true,
            Self::Broker(err) => err.is_rejected(),
            Self::RollbackFailed { .. } | Self::Storage(_) => false,
        }
    }
}
