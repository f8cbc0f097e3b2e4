//! Sessions and the session registry
//!
//! A [`Session`] is the long-lived, expensive-to-build analysis artifact for
//! one module. The core never builds or destroys sessions (that is the
//! resolution collaborator's job, see [`crate::engine::SessionBuilder`]); it
//! only tracks the *current* session per module and flips the validity flag
//! when a modification makes the artifact stale.
//!
//! # Thread Safety
//!
//! Validity is a single `AtomicBool` that only transitions true→false, so
//! `is_valid` reads from threads that do not hold the analysis lock (an
//! editor thread invalidating while an analysis thread reads, for example)
//! are race-safe. The registry table itself is behind a `parking_lot::Mutex`;
//! guards are held for minimal duration and no listener or user code runs
//! under them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::module::ModuleId;

/// An immutable analysis artifact bound to exactly one module
///
/// The flag starts true and can only be cleared, never set again; a stale
/// session is superseded by binding a freshly built one, not revived.
#[derive(Debug)]
pub struct Session {
    module: ModuleId,
    valid: AtomicBool,
}

impl Session {
    /// Create a fresh, valid session for `module`.
    ///
    /// Called by the resolution collaborator after (re)building the
    /// representation, never by the core.
    pub fn new(module: ModuleId) -> Self {
        Self {
            module,
            valid: AtomicBool::new(true),
        }
    }

    /// The module this session was built for
    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }
}

struct Slot {
    session: Arc<Session>,
    /// Bumped on every invalidation of this module. Diagnostic only;
    /// correctness rests on the boolean flag.
    epoch: u64,
}

/// Tracks the currently-valid session and invalidation epoch per module
#[derive(Default)]
pub struct SessionRegistry {
    table: Mutex<HashMap<ModuleId, Slot>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `session` as the current session for its module, superseding
    /// any previous one. The superseded session is not touched here; whoever
    /// decided to rebuild already invalidated it.
    pub fn bind(&self, session: Arc<Session>) {
        let module = session.module().clone();
        let mut table = self.table.lock();
        let epoch = table.get(&module).map(|slot| slot.epoch).unwrap_or(0);
        debug!(module = %module, epoch, "binding session");
        table.insert(module, Slot { session, epoch });
    }

    /// The session currently bound for `module`, valid or not
    pub fn current_session(&self, module: &ModuleId) -> Option<Arc<Session>> {
        self.table.lock().get(module).map(|slot| Arc::clone(&slot.session))
    }

    /// Whether `module` currently has a *valid* bound session
    pub fn has_valid_session(&self, module: &ModuleId) -> bool {
        self.current_session(module)
            .map(|s| s.is_valid())
            .unwrap_or(false)
    }

    /// Mark the session bound for `module` invalid and bump its epoch.
    ///
    /// Idempotent with respect to validity; a module with no bound session is
    /// a no-op.
    pub fn invalidate_module(&self, module: &ModuleId) {
        let mut table = self.table.lock();
        if let Some(slot) = table.get_mut(module) {
            slot.session.invalidate();
            slot.epoch += 1;
            debug!(module = %module, epoch = slot.epoch, "session invalidated");
        }
    }

    /// Mark every tracked module's session invalid.
    ///
    /// When `include_binary_modules` is false, binary modules keep their
    /// sessions: their content cannot have changed from an edit.
    pub fn invalidate_all(&self, include_binary_modules: bool) {
        let mut table = self.table.lock();
        let mut hit = 0usize;
        for (module, slot) in table.iter_mut() {
            if module.is_binary() && !include_binary_modules {
                continue;
            }
            slot.session.invalidate();
            slot.epoch += 1;
            hit += 1;
        }
        debug!(
            modules = hit,
            include_binary_modules, "global session invalidation"
        );
    }

    /// Invalidation epoch for `module` (0 if never invalidated or unknown).
    /// Monotone; for diagnostics and tests only.
    pub fn current_epoch(&self, module: &ModuleId) -> u64 {
        self.table.lock().get(module).map(|slot| slot.epoch).unwrap_or(0)
    }

    /// Number of modules with a bound session
    pub fn tracked_modules(&self) -> usize {
        self.table.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind_fresh(registry: &SessionRegistry, module: &ModuleId) -> Arc<Session> {
        let session = Arc::new(Session::new(module.clone()));
        registry.bind(Arc::clone(&session));
        session
    }

    #[test]
    fn test_new_session_is_valid() {
        let session = Session::new(ModuleId::source("m"));
        assert!(session.is_valid());
    }

    #[test]
    fn test_invalidate_module_is_monotone_and_idempotent() {
        let registry = SessionRegistry::new();
        let m = ModuleId::source("m");
        let session = bind_fresh(&registry, &m);

        registry.invalidate_module(&m);
        assert!(!session.is_valid());
        assert_eq!(registry.current_epoch(&m), 1);

        // Second invalidation: still invalid, epoch keeps counting
        registry.invalidate_module(&m);
        assert!(!session.is_valid());
        assert_eq!(registry.current_epoch(&m), 2);
    }

    #[test]
    fn test_invalidate_unknown_module_is_noop() {
        let registry = SessionRegistry::new();
        let m = ModuleId::source("ghost");
        registry.invalidate_module(&m);
        assert_eq!(registry.current_epoch(&m), 0);
        assert!(registry.current_session(&m).is_none());
    }

    #[test]
    fn test_rebind_supersedes_but_keeps_epoch() {
        let registry = SessionRegistry::new();
        let m = ModuleId::source("m");
        let old = bind_fresh(&registry, &m);
        registry.invalidate_module(&m);
        assert_eq!(registry.current_epoch(&m), 1);

        let fresh = bind_fresh(&registry, &m);
        assert!(!old.is_valid());
        assert!(fresh.is_valid());
        assert!(Arc::ptr_eq(&registry.current_session(&m).unwrap(), &fresh));
        // Epoch survives the rebind
        assert_eq!(registry.current_epoch(&m), 1);
    }

    #[test]
    fn test_invalidate_all_respects_binary_flag() {
        let registry = SessionRegistry::new();
        let src = ModuleId::source("app");
        let bin = ModuleId::binary("stdlib");
        let src_session = bind_fresh(&registry, &src);
        let bin_session = bind_fresh(&registry, &bin);

        registry.invalidate_all(false);
        assert!(!src_session.is_valid());
        assert!(bin_session.is_valid());

        registry.invalidate_all(true);
        assert!(!bin_session.is_valid());
    }

    #[test]
    fn test_has_valid_session() {
        let registry = SessionRegistry::new();
        let m = ModuleId::source("m");
        assert!(!registry.has_valid_session(&m));

        bind_fresh(&registry, &m);
        assert!(registry.has_valid_session(&m));

        registry.invalidate_module(&m);
        assert!(!registry.has_valid_session(&m));
    }

    #[test]
    fn test_concurrent_invalidation_and_reads() {
        use std::thread;

        let registry = Arc::new(SessionRegistry::new());
        let m = ModuleId::source("contended");
        let session = bind_fresh(&registry, &m);

        let writer = {
            let registry = Arc::clone(&registry);
            let m = m.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    registry.invalidate_module(&m);
                }
            })
        };

        // Readers must never observe anything but a clean bool
        for _ in 0..1000 {
            let _ = session.is_valid();
        }

        writer.join().unwrap();
        assert!(!session.is_valid());
        assert_eq!(registry.current_epoch(&m), 1000);
    }
}
