//! Error types for package compilation and archive reading.

use thiserror::Error;
use tincture_guard::GuardError;

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    /// Input rejected before any archive work.
    #[error(transparent)]
    Invalid(#[from] GuardError),

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("archive I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// An archive that does not have the override-package shape.
    #[error("malformed archive: {0}")]
    Malformed(String),
}

impl CompileError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// `true` when the caller's input, not the environment, caused the failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}
