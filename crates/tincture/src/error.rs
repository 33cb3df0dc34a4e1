use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tincture_broker::BrokerError;
use tincture_compiler::CompileError;
use tincture_guard::GuardError;
use tincture_registry::{BatchReport, RegistryError};

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, AgentError>;

/// Caller-facing failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed or dangerous input, refused before any I/O.
    Validation,
    /// No permission or a dead helper; needs a fresh permission request.
    BrokerUnavailable,
    /// The helper ran and failed, could not be spawned, or timed out.
    PrivilegedCallFailed,
    PartialBatchFailure,
    Storage,
    Io,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::BrokerUnavailable => "broker_unavailable",
            Self::PrivilegedCallFailed => "privileged_call_failed",
            Self::PartialBatchFailure => "partial_batch_failure",
            Self::Storage => "storage",
            Self::Io => "io",
        }
    }

    /// Process exit code used by the CLI.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Validation => 2,
            Self::BrokerUnavailable => 3,
            Self::PrivilegedCallFailed => 4,
            Self::PartialBatchFailure => 5,
            Self::Storage => 6,
            Self::Io => 7,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("{operation}: {} of {} failed ({})", .report.failed.len(), .report.attempted(), .report.failed_identities().join(", "))]
    PartialBatch {
        operation: &'static str,
        report: BatchReport,
    },

    #[error("{message}")]
    Exit { code: i32, message: String },
}

impl AgentError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn exit(code: i32, message: impl Into<String>) -> Self {
        Self::Exit {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Guard(_) | Self::InvalidArgument { .. } | Self::Config(_) => {
                FailureKind::Validation
            }
            Self::Compile(err) => match err {
                CompileError::Io(_) | CompileError::Serialize { .. } => FailureKind::Io,
                CompileError::Invalid(_) | CompileError::Malformed(_) => FailureKind::Validation,
            },
            Self::Broker(err) => broker_kind(err),
            Self::Registry(err) => match err {
                RegistryError::Broker(err) => broker_kind(err),
                RegistryError::RollbackFailed { .. } => FailureKind::PrivilegedCallFailed,
                RegistryError::Storage(_) => FailureKind::Storage,
                _ => FailureKind::Validation,
            },
            Self::Io { .. } | Self::Json(_) => FailureKind::Io,
            Self::PartialBatch { .. } => FailureKind::PartialBatchFailure,
            Self::Exit { .. } => FailureKind::Validation,
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exit { code, .. } => *code,
            other => other.kind().exit_code(),
        }
    }
}

fn broker_kind(err: &BrokerError) -> FailureKind {
    match err {
        BrokerError::Unavailable { .. } => FailureKind::BrokerUnavailable,
        BrokerError::Rejected(_) | BrokerError::PathNotAllowed { .. } => FailureKind::Validation,
        BrokerError::Transport { .. } | BrokerError::CallFailed { .. } => {
            FailureKind::PrivilegedCallFailed
        }
    }
}
