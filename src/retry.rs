//! Retry-on-invalid-session loop
//!
//! Analysis artifacts are not safely resumable mid-computation, so when a
//! session turns out to be invalid the whole action is re-run from scratch
//! against a freshly built session, not patched up. The loop is unbounded by
//! design, on the assumption that a session eventually stabilizes; a module
//! that can never become valid again (permanently removed, say) wedges the
//! loop, which is a known, accepted risk of this protocol. A periodic warning
//! makes such a wedge visible in logs.

use tracing::warn;

use crate::error::Result;
use crate::lock::{AnalysisContext, LockOutcome};

/// Log a warning after this many consecutive retries
const RETRY_WARN_EVERY: u32 = 64;

/// Re-run `action` until it completes without observing an invalid session.
///
/// `action` is expected to (re)build or look up the session it needs and then
/// call [`AnalysisLock::with_lock`](crate::lock::AnalysisLock::with_lock)
/// with the context it is handed; the context is a retry-mode child of `ctx`,
/// which is what makes the lock report [`LockOutcome::Retry`] instead of
/// proceeding on stale state. Each retry re-executes the *entire* action.
///
/// Errors propagate immediately; only the `Retry` outcome loops. Nesting is
/// fine: the caller's own context is never mutated, so an enclosing retry
/// scope keeps its flag no matter how this one exits.
pub fn retry_on_invalid_session<R, F>(ctx: &AnalysisContext, mut action: F) -> Result<R>
where
    F: FnMut(&AnalysisContext) -> Result<LockOutcome<R>>,
{
    let retry_ctx = ctx.with_retry(true);
    let mut attempts: u32 = 0;
    loop {
        match action(&retry_ctx)? {
            LockOutcome::Completed(value) => return Ok(value),
            LockOutcome::Retry => {
                attempts = attempts.wrapping_add(1);
                if attempts % RETRY_WARN_EVERY == 0 {
                    warn!(attempts, "analysis action still retrying on invalid sessions");
                }
            }
        }
    }
}
