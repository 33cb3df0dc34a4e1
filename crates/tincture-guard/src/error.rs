use thiserror::Error;

pub type Result<T> = std::result::Result<T, GuardError>;

/// Rejection raised before any untrusted value reaches a shell, a file
/// system, or the privileged helper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("{field} contains dangerous characters")]
    Dangerous { field: &'static str },

    #[error("invalid package identity: {input:?}")]
    InvalidIdentity { input: String },

    #[error("invalid color literal: {input:?}")]
    InvalidColor { input: String },

    #[error("invalid display name: {reason}")]
    InvalidDisplayName { reason: &'static str },

    #[error("path is not allowed: {path}")]
    PathNotAllowed { path: String },

    #[error("command is not allow-listed: {command:?}")]
    CommandNotAllowed { command: String },

    #[error("invalid argument for {verb}: {message}")]
    InvalidArgument { verb: &'static str, message: String },

    #[error("priority {value} outside [{min}, {max}]")]
    PriorityOutOfRange { value: i64, min: i32, max: i32 },
}

impl GuardError {
    #[must_use]
    pub fn argument(verb: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            verb,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GuardError;

    #[test]
    fn argument_constructor_keeps_verb_and_message() {
        let error = GuardError::argument("set-priority", "not a number");
        assert_eq!(
            error.to_string(),
            "invalid argument for set-priority: not a number"
        );
    }

    #[test]
    fn priority_error_reports_bounds() {
        let error = GuardError::PriorityOutOfRange {
            value: 5000,
            min: -1000,
            max: 1000,
        };
        assert_eq!(error.to_string(), "priority 5000 outside [-1000, 1000]");
    }
}
