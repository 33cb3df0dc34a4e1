use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tincture_guard::GuardError;

use crate::connection::ConnectionState;

pub type Result<T> = std::result::Result<T, BrokerError>;

/// Failure of a single transport call, before verb context is attached.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("helper program not found: {0}")]
    HelperMissing(String),

    #[error("failed to spawn helper: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed waiting on helper: {0}")]
    Wait(#[source] std::io::Error),

    #[error("helper did not finish within {}ms", .0.as_millis())]
    TimedOut(Duration),
}

#[derive(Debug, Error)]
pub enum BrokerError {
    /// No permission, or the helper binder is gone.
    #[error("privileged broker unavailable ({state}): {reason}")]
    Unavailable {
        state: ConnectionState,
        reason: String,
    },

    /// The command or one of its arguments failed validation.
    #[error("privileged command rejected: {0}")]
    Rejected(#[from] GuardError),

    #[error("install path is outside the allowed roots: {}", .path.display())]
    PathNotAllowed { path: PathBuf },

    #[error("{verb} {target} could not run: {source}")]
    Transport {
        verb: &'static str,
        target: String,
        #[source]
        source: TransportError,
    },

    #[error("{verb} {target} exited with status {status}: {stderr}")]
    CallFailed {
        verb: &'static str,
        target: String,
        status: i32,
        stderr: String,
    },
}

impl BrokerError {
    pub(crate) fn unavailable(state: ConnectionState, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            state,
            reason: reason.into(),
        }
    }

    /// `true` when a fresh permission request is needed.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// `true` when the input was refused before any process was spawned.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::PathNotAllowed { .. })
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                source: TransportError::TimedOut(_),
                ..
            }
        )
    }
}
