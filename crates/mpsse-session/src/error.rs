use derive_more::{Display, Error, From};

/// Operational failure reported by a session call.
///
/// The engine gives no structured causes, so neither does this layer.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The engine reported failure, or the session is already closed.
    #[display("failed")]
    Generic,
    /// The result buffer for a read could not be allocated.
    #[display("alloc_failed")]
    AllocFailed,
}

/// Errors returned by session calls.
#[derive(Debug, Display, Error, From, Clone, Copy, PartialEq, Eq)]
pub enum CallError {
    /// Argument had the wrong shape or type. A usage error, never retried.
    #[display("bad argument")]
    #[from(skip)]
    BadArgument,
    /// The call was well formed but the operation did not succeed.
    #[display("{_0}")]
    Failed(Failure),
}

impl CallError {
    /// Short reason string for runtime-facing error tuples.
    pub fn reason(&self) -> &'static str {
        match self {
            CallError::BadArgument => "badarg",
            CallError::Failed(Failure::Generic) => "failed",
            CallError::Failed(Failure::AllocFailed) => "alloc_failed",
        }
    }
}

pub type CallResult<T> = Result<T, CallError>;

/// Registry invariant violations.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// Sessions are still open when none should be.
    #[display("{_0} session(s) still live")]
    LiveSessions(#[error(not(source))] usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_match_runtime_tags() {
        assert_eq!(CallError::BadArgument.reason(), "badarg");
        assert_eq!(CallError::Failed(Failure::Generic).reason(), "failed");
        assert_eq!(
            CallError::Failed(Failure::AllocFailed).reason(),
            "alloc_failed"
        );
    }

    #[test]
    fn failures_display_as_their_reason() {
        for failure in [Failure::Generic, Failure::AllocFailed] {
            let err = CallError::from(failure);
            assert_eq!(err.to_string(), err.reason());
        }
        assert_eq!(CallError::BadArgument.to_string(), "bad argument");
    }

    #[test]
    fn live_sessions_message() {
        let err = RegistryError::LiveSessions(2);
        assert_eq!(err.to_string(), "2 session(s) still live");
    }
}
