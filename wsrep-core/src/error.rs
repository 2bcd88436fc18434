// Client-visible error kinds, plus the `Fatal` path for conditions that
// are programming errors rather than ordinary operational failures:
// illegal state transitions, double-release of a provider handle,
// streaming-applier map insertion conflicts, and provider
// `error_fatal` results. `Fatal` is never panicked out of a public
// entry point; callers are expected to turn it into a call to their
// `emergency_shutdown` hook (see `ClientService::emergency_shutdown`).

use std::fmt;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub enum ClientError {
    #[default]
    Success,
    ErrorDuringCommit,
    DeadlockError,
    InterruptedError,
    AppendFragmentError,
}

impl ClientError {
    pub fn is_success(&self) -> bool {
        matches!(self, ClientError::Success)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClientError::Success => "success",
            ClientError::ErrorDuringCommit => "error_during_commit",
            ClientError::DeadlockError => "deadlock_error",
            ClientError::InterruptedError => "interrupted_error",
            ClientError::AppendFragmentError => "append_fragment_error",
        };
        write!(f, "{s}")
    }
}

/// The sole mutator of a client's current error. Once an error is set
/// it can never be overwritten with `Success` — that would silently
/// erase a failure the DBMS has not yet observed.
pub fn override_error(current: &mut ClientError, new: ClientError) {
    if !current.is_success() && new.is_success() {
        debug_assert!(
            false,
            "attempted to overwrite {current} with success"
        );
        return;
    }
    *current = new;
}

#[derive(Debug)]
pub struct Fatal {
    message: String,
}

impl Fatal {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(target: "wsrep", "fatal: {message}");
        Fatal { message }
    }

    pub fn illegal_transition(kind: &str, from: impl fmt::Debug, to: impl fmt::Debug) -> Self {
        Fatal::new(format!("illegal {kind} transition: {from:?} -> {to:?}"))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fatal: {}", self.message)
    }
}

impl std::error::Error for Fatal {}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn override_error_latches_first_failure() {
        let mut e = ClientError::Success;
        override_error(&mut e, ClientError::DeadlockError);
        assert_eq!(e, ClientError::DeadlockError);
        override_error(&mut e, ClientError::ErrorDuringCommit);
        assert_eq!(e, ClientError::ErrorDuringCommit);
    }

    #[test]
    fn override_error_allows_repeated_success() {
        let mut e = ClientError::Success;
        override_error(&mut e, ClientError::Success);
        assert!(e.is_success());
    }
}
