//! sema-sessions: session consistency core for semantic-analysis engines
//!
//! A semantic-analysis engine keeps long-lived, expensive-to-build in-memory
//! representations ("sessions") of each compilation unit ("module"). Source
//! edits and module-structure changes can invalidate them at arbitrary times,
//! including while another thread is mid-analysis. This crate provides the
//! machinery that keeps that situation consistent:
//!
//! - a closed taxonomy of [modification events](events::ModificationEvent)
//!   and the [bus](events::ModificationEventBus) that routes them on four
//!   disjoint channels,
//! - a [session registry](session::SessionRegistry) tracking each module's
//!   current session and its monotone validity flag,
//! - a single global re-entrant [analysis lock](lock::AnalysisLock) with
//!   cooperative-cancellation-aware acquisition,
//! - the [retry protocol](retry::retry_on_invalid_session) that re-runs an
//!   analysis action whenever the lock catches its session going stale.
//!
//! Parsing, representation building and cancellation signalling are the
//! embedder's business; they plug in through the
//! [`SessionBuilder`](engine::SessionBuilder),
//! [`RepresentationInvalidator`](invalidate::RepresentationInvalidator) and
//! [`CancellationProbe`](lock::CancellationProbe) traits.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sema_sessions::{AnalysisContext, AnalysisEngine, ModuleId, Session};
//!
//! let engine = AnalysisEngine::new();
//! let module = ModuleId::source("app.main");
//! let builder = |m: &ModuleId| Arc::new(Session::new(m.clone()));
//!
//! let result = engine
//!     .analyze(&module, &AnalysisContext::detached(), &builder, |_ctx| {
//!         // analysis running under the global lock, session known valid
//!         "summary"
//!     })
//!     .unwrap();
//! assert_eq!(result, "summary");
//! ```

pub mod engine;
pub mod error;
pub mod event_log;
pub mod events;
pub mod invalidate;
pub mod lock;
pub mod module;
pub mod retry;
pub mod session;

// Re-export commonly used types
pub use engine::{AnalysisEngine, SessionBuilder};
pub use error::{Result, SessionError};
pub use event_log::EventLogWriter;
pub use events::{GlobalListener, ModificationEvent, ModificationEventBus, ModuleListener};
pub use lock::{
    AnalysisContext, AnalysisLock, CancelFlag, CancellationProbe, LockConfig, LockOutcome,
    NeverCancelled, DEFAULT_POLL_INTERVAL,
};
pub use invalidate::{InvalidationService, RepresentationInvalidator};
pub use module::{ModuleId, ModuleKind};
pub use retry::retry_on_invalid_session;
pub use session::{Session, SessionRegistry};
