//! Error types and engine error translation.
//!
//! Every failure the layer can report is an [`AioError`]. Engine setup calls
//! return raw status codes; [`translate`] is the single place where a status
//! code becomes an [`IoError`] naming the operation that failed, the raw
//! code, and the OS message for it.

use crate::engine;
use crate::kind::{Kind, RegistryError, SignatureError};
use crate::object::ObjectState;
use serde::Serialize;
use std::fmt;
use std::io;
use thiserror::Error;

/// Whether retrying a failed operation might succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recoverability {
    /// Resource exhaustion or contention; a later retry may succeed.
    Transient,
    /// Bad arguments or missing targets; retrying will fail again.
    Permanent,
}

impl Recoverability {
    /// Classifies a positive errno value.
    #[must_use]
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            libc::EAGAIN | libc::ENOMEM | libc::EMFILE | libc::ENFILE | libc::EBUSY => {
                Self::Transient
            }
            _ => Self::Permanent,
        }
    }
}

impl fmt::Display for Recoverability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => f.write_str("transient"),
            Self::Permanent => f.write_str("permanent"),
        }
    }
}

/// An engine setup call reported failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {message} (code {code}, {recoverability})")]
pub struct IoError {
    operation: &'static str,
    code: i32,
    message: String,
    recoverability: Recoverability,
}

impl IoError {
    /// Builds an error from an engine status code (`-errno`).
    #[must_use]
    pub fn from_code(operation: &'static str, code: i32) -> Self {
        let errno = code.saturating_neg();
        Self {
            operation,
            code,
            message: io::Error::from_raw_os_error(errno).to_string(),
            recoverability: Recoverability::from_errno(errno),
        }
    }

    /// Builds an error from a failed OS call made on the engine's behalf.
    #[must_use]
    pub fn from_io(operation: &'static str, err: &io::Error) -> Self {
        match err.raw_os_error() {
            Some(errno) => Self::from_code(operation, -errno),
            None => Self {
                operation,
                code: -libc::EIO,
                message: err.to_string(),
                recoverability: Recoverability::Permanent,
            },
        }
    }

    /// Name of the failed operation (`"fs_event_init"`).
    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Raw engine status code.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// OS description of the code.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Retry classification.
    #[must_use]
    pub fn recoverability(&self) -> Recoverability {
        self.recoverability
    }

    /// Returns `true` if a retry might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self.recoverability, Recoverability::Transient)
    }
}

/// Turns an engine status code into `Ok` or an [`IoError`] for `operation`.
///
/// Success is decided by [`engine::succeeded`], the one polarity predicate
/// shared by every initializer.
pub fn translate(operation: &'static str, code: i32) -> std::result::Result<(), IoError> {
    if engine::succeeded(code) {
        Ok(())
    } else {
        Err(IoError::from_code(operation, code))
    }
}

/// Any failure surfaced by construction or initialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AioError {
    /// No kind is registered under the requested name.
    #[error("kind not found: `{name}`")]
    KindNotFound {
        /// Requested name.
        name: String,
    },
    /// The kind has no initializer reachable from this entry point.
    #[error("{kind} cannot be initialized here")]
    UnsupportedKind {
        /// Object kind.
        kind: Kind,
    },
    /// Arguments do not match the kind's signature.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// The engine setup call failed.
    #[error(transparent)]
    Io(#[from] IoError),
    /// The object is not in a state that allows the operation.
    #[error("{kind} object is {state}, expected {expected}")]
    InvalidState {
        /// Object kind.
        kind: Kind,
        /// Current state.
        state: ObjectState,
        /// Required state.
        expected: ObjectState,
    },
    /// Kind registration failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl AioError {
    /// The failed operation name, for engine failures.
    #[must_use]
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Io(err) => Some(err.operation()),
            _ => None,
        }
    }

    /// Returns `true` if a retry might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(err) if err.is_transient())
    }
}

/// Result type for aio operations.
pub type Result<T> = std::result::Result<T, AioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_positive_codes_succeed() {
        assert!(translate("tcp_init", 0).is_ok());
        assert!(translate("tcp_init", 3).is_ok());
    }

    #[test]
    fn negative_code_names_operation() {
        let err = translate("fs_event_init", -libc::ENOENT).expect_err("failure");
        assert_eq!(err.operation(), "fs_event_init");
        assert_eq!(err.code(), -libc::ENOENT);
        assert!(!err.message().is_empty());
        assert_eq!(err.recoverability(), Recoverability::Permanent);
        let display = err.to_string();
        assert!(display.starts_with("fs_event_init failed"), "{display}");
        assert!(display.contains(&format!("code {}", -libc::ENOENT)), "{display}");
    }

    #[test]
    fn exhaustion_is_transient() {
        for errno in [libc::EAGAIN, libc::ENOMEM, libc::EMFILE, libc::ENFILE] {
            let err = IoError::from_code("async_init", -errno);
            assert!(err.is_transient(), "errno {errno}");
        }
        assert!(!IoError::from_code("barrier_init", -libc::EINVAL).is_transient());
    }

    #[test]
    fn extreme_codes_do_not_overflow() {
        let err = IoError::from_code("loop_init", i32::MIN);
        assert_eq!(err.code(), i32::MIN);
        assert_eq!(err.recoverability(), Recoverability::Permanent);
    }

    #[test]
    fn from_io_keeps_errno() {
        let os = io::Error::from_raw_os_error(libc::EMFILE);
        let err = IoError::from_io("loop_init", &os);
        assert_eq!(err.code(), -libc::EMFILE);
        assert!(err.is_transient());

        let custom = io::Error::other("no errno");
        let err = IoError::from_io("loop_init", &custom);
        assert_eq!(err.code(), -libc::EIO);
        assert!(err.message().contains("no errno"));
    }

    #[test]
    fn aio_error_wraps_and_reports_operation() {
        let err: AioError = IoError::from_code("sem_init", -libc::EINVAL).into();
        assert_eq!(err.operation(), Some("sem_init"));
        assert!(!err.is_transient());

        let err = AioError::KindNotFound {
            name: "nonexistent_kind".into(),
        };
        assert_eq!(err.operation(), None);
        assert_eq!(err.to_string(), "kind not found: `nonexistent_kind`");

        let err = AioError::UnsupportedKind { kind: Kind::Write };
        assert_eq!(err.to_string(), "aio_write cannot be initialized here");
    }
}
