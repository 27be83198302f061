//! The three error kinds every muddle operation can fail with.
//!
//! `GiveUp` is a user-level failure (bad arguments, missing repository,
//! unsatisfiable label): shown without a traceback and exits `1`.
//! `Bug` is a muddle-internal invariant violation: shown with its full
//! causal chain and exits `2`. `Unsupported` is informational (a VCS or
//! environment can't do what was asked, e.g. pull into a shallow clone)
//! and does not fail the run.

use anyhow::Error;

/// One of the three kinds a muddle operation can fail with.
#[derive(Debug, thiserror::Error)]
pub enum MuddleError {
    #[error("{message}")]
    GiveUp { message: String },

    #[error("internal error: {message}")]
    Bug { message: String },

    #[error("unsupported: {message}")]
    Unsupported { message: String },
}

impl MuddleError {
    pub fn give_up(message: impl Into<String>) -> Self {
        MuddleError::GiveUp {
            message: message.into(),
        }
    }

    pub fn bug(message: impl Into<String>) -> Self {
        MuddleError::Bug {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        MuddleError::Unsupported {
            message: message.into(),
        }
    }

    /// The process exit code this error implies when it reaches the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            MuddleError::GiveUp { .. } => 1,
            MuddleError::Unsupported { .. } => 0,
            MuddleError::Bug { .. } => 2,
        }
    }
}

/// Find the `MuddleError` at the root of an `anyhow` error chain, if any.
///
/// Errors that never passed through this crate (plain I/O errors, parse
/// failures, …) fall through as `None`, which callers should treat as a
/// `Bug`-equivalent: something went wrong that nobody tagged.
pub fn classify(err: &Error) -> Option<&MuddleError> {
    err.downcast_ref::<MuddleError>()
}

/// Convenience macro mirroring `anyhow::bail!` for `MuddleError::GiveUp`.
#[macro_export]
macro_rules! give_up {
    ($($arg:tt)*) => {
        return Err(::anyhow::Error::new($crate::MuddleError::give_up(format!($($arg)*))))
    };
}

/// Convenience macro mirroring `anyhow::bail!` for `MuddleError::Bug`.
#[macro_export]
macro_rules! muddle_bug {
    ($($arg:tt)*) => {
        return Err(::anyhow::Error::new($crate::MuddleError::bug(format!($($arg)*))))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_contract() {
        assert_eq!(MuddleError::give_up("x").exit_code(), 1);
        assert_eq!(MuddleError::unsupported("x").exit_code(), 0);
        assert_eq!(MuddleError::bug("x").exit_code(), 2);
    }

    #[test]
    fn classify_recovers_kind_through_anyhow() {
        let err: Error = MuddleError::give_up("missing repo").into();
        let err = err.context("while loading description");
        match classify(&err) {
            Some(MuddleError::GiveUp { message }) => assert_eq!(message, "missing repo"),
            other => panic!("expected GiveUp, got {other:?}"),
        }
    }

    #[test]
    fn classify_returns_none_for_foreign_errors() {
        let err = anyhow::anyhow!("plain failure");
        assert!(classify(&err).is_none());
    }
}
