//! Modification events and the publish/subscribe bus
//!
//! Producers of source and structure changes publish [`ModificationEvent`]s;
//! cache owners subscribe and react. The four event kinds are dispatched on
//! four *disjoint* channels: publishing a global event never invokes
//! listeners registered for the corresponding module-scoped channel, and
//! state-modification never implies out-of-block modification. Listeners that
//! need both guarantees must subscribe to both channels; this is a deliberate
//! contract, not an oversight.
//!
//! Dispatch is synchronous on the publishing thread, in registration order,
//! and listener panics are not caught. The channel's listener list is locked
//! during dispatch, so a listener must not subscribe to the channel that is
//! currently notifying it.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::module::ModuleId;

/// A modification that invalidates analysis sessions
///
/// Module-scoped variants carry the affected module; global variants carry
/// only whether binary modules are to be considered modified as well.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModificationEvent {
    /// `module`'s structure changed, or it was moved or removed
    ModuleState { module: ModuleId },
    /// A source edit in `module` that is not confined to a single declaration
    /// body. Publishers may emit this for *any* edit as an over-approximation.
    ModuleOutOfBlock { module: ModuleId },
    /// Every module's structure is to be treated as changed. Chiefly for
    /// bulk/test scenarios.
    GlobalState { include_binary_modules: bool },
    /// Every module's source is to be treated as changed, without forcing
    /// structural invalidation.
    GlobalOutOfBlock { include_binary_modules: bool },
}

/// Listener for a module-scoped channel
pub type ModuleListener = Box<dyn Fn(&ModuleId) + Send + Sync>;
/// Listener for a global channel; receives `include_binary_modules`
pub type GlobalListener = Box<dyn Fn(bool) + Send + Sync>;

/// Per-channel listener registries for [`ModificationEvent`]s
///
/// One registry per channel keeps the disjointness invariant structural:
/// there is no shared observer list to mis-filter.
#[derive(Default)]
pub struct ModificationEventBus {
    module_state: Mutex<Vec<ModuleListener>>,
    module_out_of_block: Mutex<Vec<ModuleListener>>,
    global_state: Mutex<Vec<GlobalListener>>,
    global_out_of_block: Mutex<Vec<GlobalListener>>,
}

impl ModificationEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Subscription (never fails, no de-duplication)
    // ========================================================================

    pub fn subscribe_module_state<F>(&self, listener: F)
    where
        F: Fn(&ModuleId) + Send + Sync + 'static,
    {
        self.module_state.lock().push(Box::new(listener));
    }

    pub fn subscribe_module_out_of_block<F>(&self, listener: F)
    where
        F: Fn(&ModuleId) + Send + Sync + 'static,
    {
        self.module_out_of_block.lock().push(Box::new(listener));
    }

    pub fn subscribe_global_state<F>(&self, listener: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.global_state.lock().push(Box::new(listener));
    }

    pub fn subscribe_global_out_of_block<F>(&self, listener: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.global_out_of_block.lock().push(Box::new(listener));
    }

    // ========================================================================
    // Publication
    // ========================================================================

    /// Dispatch `event` to every listener on its channel, in registration
    /// order, on the calling thread.
    pub fn publish(&self, event: &ModificationEvent) {
        debug!(?event, "publishing modification event");
        match event {
            ModificationEvent::ModuleState { module } => {
                for listener in self.module_state.lock().iter() {
                    listener(module);
                }
            }
            ModificationEvent::ModuleOutOfBlock { module } => {
                for listener in self.module_out_of_block.lock().iter() {
                    listener(module);
                }
            }
            ModificationEvent::GlobalState {
                include_binary_modules,
            } => {
                for listener in self.global_state.lock().iter() {
                    listener(*include_binary_modules);
                }
            }
            ModificationEvent::GlobalOutOfBlock {
                include_binary_modules,
            } => {
                for listener in self.global_out_of_block.lock().iter() {
                    listener(*include_binary_modules);
                }
            }
        }
    }

    /// Publish a [`ModificationEvent::ModuleState`] for `module`.
    pub fn publish_module_state_modification(&self, module: &ModuleId) {
        self.publish(&ModificationEvent::ModuleState {
            module: module.clone(),
        });
    }

    /// Publish a [`ModificationEvent::ModuleOutOfBlock`] for `module`.
    pub fn publish_module_out_of_block_modification(&self, module: &ModuleId) {
        self.publish(&ModificationEvent::ModuleOutOfBlock {
            module: module.clone(),
        });
    }

    /// Publish a [`ModificationEvent::GlobalState`].
    pub fn publish_global_state_modification(&self, include_binary_modules: bool) {
        self.publish(&ModificationEvent::GlobalState {
            include_binary_modules,
        });
    }

    /// Publish a [`ModificationEvent::GlobalOutOfBlock`].
    pub fn publish_global_out_of_block_modification(&self, include_binary_modules: bool) {
        self.publish(&ModificationEvent::GlobalOutOfBlock {
            include_binary_modules,
        });
    }
}
