//! Error types for sema-sessions operations

use thiserror::Error;

/// Main error type for session-consistency operations
///
/// Note that an invalid session observed under the analysis lock is *not* an
/// error: it is reported as [`crate::lock::LockOutcome::Retry`] so the retry
/// path is visible in signatures instead of hiding in unwinding.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The host signalled cancellation while this thread was waiting for the
    /// global analysis lock.
    #[error("analysis cancelled while waiting for the global lock")]
    Cancelled,

    /// `with_lock` was entered for a module that has no bound session and the
    /// calling context is not in retry mode. Callers outside a retry scope
    /// must bind a session before locking.
    #[error("no session bound for module: {module}")]
    NoSession { module: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for session-consistency operations
pub type Result<T> = std::result::Result<T, SessionError>;
