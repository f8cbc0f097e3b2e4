//! Engine facade
//!
//! [`AnalysisEngine`] wires the session registry, event bus, invalidation
//! service and global lock into one shareable object, the way an embedding
//! tool wants to hold them. Everything it exposes is also reachable on the
//! individual components; the facade only adds the caller-side conveniences
//! (`ensure_session`, `analyze`) that combine them.

use std::sync::Arc;

use crate::error::Result;
use crate::events::ModificationEventBus;
use crate::invalidate::{InvalidationService, RepresentationInvalidator};
use crate::lock::{AnalysisContext, AnalysisLock, LockConfig, LockOutcome};
use crate::module::ModuleId;
use crate::retry::retry_on_invalid_session;
use crate::session::{Session, SessionRegistry};

/// The resolution collaborator: builds a fresh session for a module.
///
/// Building is expected to be expensive (parse, resolve, typecheck); the core
/// never calls this itself — session construction always happens on the
/// caller's side, typically from inside a retry scope via
/// [`AnalysisEngine::ensure_session`].
pub trait SessionBuilder: Send + Sync {
    fn build_session(&self, module: &ModuleId) -> Arc<Session>;
}

impl<F> SessionBuilder for F
where
    F: Fn(&ModuleId) -> Arc<Session> + Send + Sync,
{
    fn build_session(&self, module: &ModuleId) -> Arc<Session> {
        self(module)
    }
}

/// Shared state of one analysis engine instance
pub struct AnalysisEngine {
    registry: Arc<SessionRegistry>,
    bus: Arc<ModificationEventBus>,
    lock: AnalysisLock,
    invalidation: InvalidationService,
}

impl AnalysisEngine {
    pub fn new() -> Self {
        Self::with_config(LockConfig::default())
    }

    pub fn with_config(config: LockConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let bus = Arc::new(ModificationEventBus::new());
        let lock = AnalysisLock::with_config(Arc::clone(&registry), config);
        let invalidation = InvalidationService::new(
            Arc::clone(&registry) as Arc<dyn RepresentationInvalidator>,
            Arc::clone(&bus),
        );
        Self {
            registry,
            bus,
            lock,
            invalidation,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<ModificationEventBus> {
        &self.bus
    }

    pub fn lock(&self) -> &AnalysisLock {
        &self.lock
    }

    pub fn invalidation(&self) -> &InvalidationService {
        &self.invalidation
    }

    /// Return `module`'s current session, building and binding a fresh one
    /// via `builder` when it is missing or invalid.
    pub fn ensure_session(&self, module: &ModuleId, builder: &dyn SessionBuilder) -> Arc<Session> {
        if let Some(session) = self.registry.current_session(module) {
            if session.is_valid() {
                return session;
            }
        }
        let fresh = builder.build_session(module);
        self.registry.bind(Arc::clone(&fresh));
        fresh
    }

    /// Run `action` under the global lock against `module`'s session.
    pub fn with_lock<R, F>(
        &self,
        module: &ModuleId,
        ctx: &AnalysisContext,
        action: F,
    ) -> Result<LockOutcome<R>>
    where
        F: FnOnce(&AnalysisContext) -> R,
    {
        self.lock.with_lock(module, ctx, action)
    }

    /// Run `action` under the global lock, rebuilding `module`'s session and
    /// retrying whenever the lock observes it invalid.
    ///
    /// This is the full protocol in one call: ensure a valid session, take
    /// the lock, and loop while concurrent modifications keep invalidating
    /// the session out from under the action.
    pub fn analyze<R, F>(
        &self,
        module: &ModuleId,
        ctx: &AnalysisContext,
        builder: &dyn SessionBuilder,
        mut action: F,
    ) -> Result<R>
    where
        F: FnMut(&AnalysisContext) -> R,
    {
        retry_on_invalid_session(ctx, |retry_ctx| {
            self.ensure_session(module, builder);
            self.lock.with_lock(module, retry_ctx, |inner| action(inner))
        })
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("tracked_modules", &self.registry.tracked_modules())
            .finish()
    }
}
