//! The global analysis lock
//!
//! All analysis actions in the process serialize on a single re-entrant
//! mutex. A per-module locking scheme was tried and produced deadlocks:
//! analysis of one module can recursively trigger analysis of another on the
//! same call stack, and the module graph's edges are not statically known, so
//! no lock ordering can be derived. One global lock makes ordering cycles
//! impossible; an individual analysis call is expected to be short, so the
//! lost inter-module parallelism is an acceptable price in an interactive
//! setting.
//!
//! # Cancellation
//!
//! Acquisition waits in bounded slices and consults the host's
//! [`CancellationProbe`] between slices, so the lock never becomes an
//! un-interruptible choke point. A thread that has already begun its action
//! is not interrupted; cancellation there is the action's own business.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::module::ModuleId;
use crate::session::SessionRegistry;

/// Polling slice used while waiting for the lock, unless configured otherwise
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Host-supplied cooperative cancellation check
///
/// Queried between lock-wait slices; an IDE or build tool wires its own
/// cancel signal in here.
pub trait CancellationProbe: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// Stock [`CancellationProbe`]: a shared flag the host flips to cancel
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl CancellationProbe for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A probe that never cancels, for detached/batch callers
pub struct NeverCancelled;

impl CancellationProbe for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Per-call-stack analysis context
///
/// Carries the cancellation probe and the retry flag. The flag is an
/// explicit value threaded through the call stack rather than thread-local
/// state: deriving a child context with [`with_retry`](Self::with_retry)
/// replaces the save/restore dance, since the parent context is untouched
/// regardless of how the child scope exits.
#[derive(Clone)]
pub struct AnalysisContext {
    probe: Arc<dyn CancellationProbe>,
    retry_on_invalid: bool,
}

impl AnalysisContext {
    pub fn new(probe: Arc<dyn CancellationProbe>) -> Self {
        Self {
            probe,
            retry_on_invalid: false,
        }
    }

    /// A context that can never be cancelled
    pub fn detached() -> Self {
        Self::new(Arc::new(NeverCancelled))
    }

    pub fn is_cancelled(&self) -> bool {
        self.probe.is_cancelled()
    }

    /// Whether an invalid session under the lock should signal a retry
    /// instead of proceeding on stale state
    pub fn retries_on_invalid_session(&self) -> bool {
        self.retry_on_invalid
    }

    pub(crate) fn with_retry(&self, retry_on_invalid: bool) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
            retry_on_invalid,
        }
    }
}

impl std::fmt::Debug for AnalysisContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisContext")
            .field("retry_on_invalid", &self.retry_on_invalid)
            .finish()
    }
}

/// Outcome of a lock-guarded analysis action
///
/// `Retry` is the "invalid session" signal: the session the caller wanted to
/// analyze against went stale before the action started, and the calling
/// context asked for a retry rather than a stale-state run.
#[derive(Debug)]
pub enum LockOutcome<R> {
    Completed(R),
    Retry,
}

impl<R> LockOutcome<R> {
    pub fn is_retry(&self) -> bool {
        matches!(self, LockOutcome::Retry)
    }

    /// The completed value, if any
    pub fn completed(self) -> Option<R> {
        match self {
            LockOutcome::Completed(value) => Some(value),
            LockOutcome::Retry => None,
        }
    }
}

/// Configuration for the analysis lock
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Length of one bounded wait slice during acquisition
    pub poll_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// The single global analysis lock
///
/// Re-entrant: a thread already holding the lock re-acquires without
/// blocking, which nested cross-module analysis on one call stack relies on.
pub struct AnalysisLock {
    mutex: ReentrantMutex<()>,
    registry: Arc<SessionRegistry>,
    config: LockConfig,
}

impl AnalysisLock {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self::with_config(registry, LockConfig::default())
    }

    pub fn with_config(registry: Arc<SessionRegistry>, config: LockConfig) -> Self {
        Self {
            mutex: ReentrantMutex::new(()),
            registry,
            config,
        }
    }

    /// Run `action` under the global lock, checking `module`'s session first.
    ///
    /// If the session is missing or invalid and `ctx` is in retry mode, the
    /// lock is released and [`LockOutcome::Retry`] returned without running
    /// the action. Outside retry mode a missing session is a hard
    /// [`SessionError::NoSession`]; a merely *stale* session is analyzed
    /// anyway, because there is no general way to cancel or redo an in-flight
    /// computation once callers hold parts of its output.
    ///
    /// The action receives a child context with the retry flag cleared, so
    /// nested `with_lock` calls under the already-held lock never signal a
    /// mid-action retry.
    pub fn with_lock<R, F>(
        &self,
        module: &ModuleId,
        ctx: &AnalysisContext,
        action: F,
    ) -> Result<LockOutcome<R>>
    where
        F: FnOnce(&AnalysisContext) -> R,
    {
        let guard = self.acquire(ctx)?;

        let session = self.registry.current_session(module);
        let valid = session.as_ref().map(|s| s.is_valid()).unwrap_or(false);
        if !valid {
            if ctx.retries_on_invalid_session() {
                debug!(module = %module, "session invalid under lock, signalling retry");
                return Ok(LockOutcome::Retry);
            }
            if session.is_none() {
                return Err(SessionError::NoSession {
                    module: module.name().to_string(),
                });
            }
            warn!(module = %module, "analyzing on an invalidated session");
        }

        let inner = ctx.with_retry(false);
        let result = action(&inner);
        drop(guard);
        Ok(LockOutcome::Completed(result))
    }

    /// Acquire the global mutex in bounded slices, checking for cancellation
    /// between slices. Re-entry succeeds on the first slice.
    fn acquire(&self, ctx: &AnalysisContext) -> Result<ReentrantMutexGuard<'_, ()>> {
        if ctx.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        loop {
            if let Some(guard) = self.mutex.try_lock_for(self.config.poll_interval) {
                return Ok(guard);
            }
            if ctx.is_cancelled() {
                debug!("cancelled while waiting for the analysis lock");
                return Err(SessionError::Cancelled);
            }
        }
    }
}
