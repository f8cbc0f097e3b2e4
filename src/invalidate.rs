//! Representation invalidation paired with event publication
//!
//! Deciding that a modification happened, marking the affected sessions
//! stale, and telling everyone else about it are three steps that belong
//! together. [`InvalidationService`] performs the last two in a fixed order:
//! invalidate first, publish second, so listeners always observe the
//! registry's post-invalidation state.

use std::sync::Arc;

use tracing::info;

use crate::events::ModificationEventBus;
use crate::module::ModuleId;
use crate::session::SessionRegistry;

/// The collaborator that owns the analysis representation and can mark it
/// stale. The core's own [`SessionRegistry`] implements this; embedders with
/// additional caches can wrap it.
pub trait RepresentationInvalidator: Send + Sync {
    /// Mark `module`'s representation stale.
    fn invalidate_module(&self, module: &ModuleId);

    /// Mark every module's representation stale, optionally including
    /// binary-only modules.
    fn invalidate_all(&self, include_binary_modules: bool);
}

impl RepresentationInvalidator for SessionRegistry {
    fn invalidate_module(&self, module: &ModuleId) {
        SessionRegistry::invalidate_module(self, module);
    }

    fn invalidate_all(&self, include_binary_modules: bool) {
        SessionRegistry::invalidate_all(self, include_binary_modules);
    }
}

/// Invalidates the representation, then publishes the matching event
pub struct InvalidationService {
    invalidator: Arc<dyn RepresentationInvalidator>,
    bus: Arc<ModificationEventBus>,
}

impl InvalidationService {
    pub fn new(
        invalidator: Arc<dyn RepresentationInvalidator>,
        bus: Arc<ModificationEventBus>,
    ) -> Self {
        Self { invalidator, bus }
    }

    /// `module`'s structure changed, or it was moved or removed.
    pub fn publish_module_state_modification(&self, module: &ModuleId) {
        self.invalidator.invalidate_module(module);
        self.bus.publish_module_state_modification(module);
    }

    /// A source edit happened in `module`. May be used for any edit, not just
    /// out-of-block ones.
    pub fn publish_module_out_of_block_modification(&self, module: &ModuleId) {
        self.invalidator.invalidate_module(module);
        self.bus.publish_module_out_of_block_modification(module);
    }

    /// Treat every module's structure as changed.
    ///
    /// Primarily for cache teardown during and between tests.
    pub fn publish_global_state_modification(&self, include_binary_modules: bool) {
        info!(include_binary_modules, "global state modification");
        self.invalidator.invalidate_all(include_binary_modules);
        self.bus
            .publish_global_state_modification(include_binary_modules);
    }

    /// Treat every module's source as changed, without forcing structural
    /// invalidation of module-structure caches.
    ///
    /// Primarily for cache teardown during and between tests.
    pub fn publish_global_out_of_block_modification(&self, include_binary_modules: bool) {
        info!(include_binary_modules, "global out-of-block modification");
        self.invalidator.invalidate_all(include_binary_modules);
        self.bus
            .publish_global_out_of_block_modification(include_binary_modules);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn service() -> (Arc<SessionRegistry>, Arc<ModificationEventBus>, InvalidationService) {
        let registry = Arc::new(SessionRegistry::new());
        let bus = Arc::new(ModificationEventBus::new());
        let service = InvalidationService::new(
            Arc::clone(&registry) as Arc<dyn RepresentationInvalidator>,
            Arc::clone(&bus),
        );
        (registry, bus, service)
    }

    #[test]
    fn test_module_publish_invalidates_then_notifies() {
        let (registry, bus, service) = service();
        let m = ModuleId::source("app");
        let session = Arc::new(Session::new(m.clone()));
        registry.bind(Arc::clone(&session));

        // The listener must already see the session invalid
        let observed_invalid = Arc::new(AtomicBool::new(false));
        {
            let observed = Arc::clone(&observed_invalid);
            let session = Arc::clone(&session);
            bus.subscribe_module_out_of_block(move |_| {
                observed.store(!session.is_valid(), Ordering::SeqCst);
            });
        }

        service.publish_module_out_of_block_modification(&m);
        assert!(observed_invalid.load(Ordering::SeqCst));
    }

    #[test]
    fn test_global_state_publish_invalidates_all_sessions() {
        let (registry, _bus, service) = service();
        let sessions: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|name| {
                let session = Arc::new(Session::new(ModuleId::source(*name)));
                registry.bind(Arc::clone(&session));
                session
            })
            .collect();

        service.publish_global_state_modification(true);
        assert!(sessions.iter().all(|s| !s.is_valid()));
    }

    #[test]
    fn test_global_publish_excluding_binary_modules() {
        let (registry, _bus, service) = service();
        let bin = Arc::new(Session::new(ModuleId::binary("stdlib")));
        registry.bind(Arc::clone(&bin));

        service.publish_global_out_of_block_modification(false);
        assert!(bin.is_valid());
    }

    #[test]
    fn test_module_publish_does_not_reach_global_listeners() {
        let (_registry, bus, service) = service();
        let global_hit = Arc::new(AtomicBool::new(false));
        {
            let hit = Arc::clone(&global_hit);
            bus.subscribe_global_state(move |_| hit.store(true, Ordering::SeqCst));
        }

        service.publish_module_state_modification(&ModuleId::source("app"));
        assert!(!global_hit.load(Ordering::SeqCst));
    }
}
