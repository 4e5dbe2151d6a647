//! Identity bookkeeping between implementations and their wrappers

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::handle::{Handle, HandleShared, Wrappable};
use crate::Synchronizer;

/// Wrapper-side identity of a registered implementation type
#[derive(Debug, Clone)]
pub struct TypeEntry {
    /// Full path of the implementation type
    pub impl_name: &'static str,
    /// Name the wrapper presents in Debug output and error messages
    pub wrapper_name: String,
    /// Optional module string the wrapper is placed under
    pub target_module: Option<String>,
}

impl TypeEntry {
    /// The wrapper name qualified by its target module, if any
    pub fn qualified_name(&self) -> String {
        match &self.target_module {
            Some(module) => format!("{module}::{}", self.wrapper_name),
            None => self.wrapper_name.clone(),
        }
    }
}

struct InstanceSlot {
    wrapper: Weak<dyn Any + Send + Sync>,
}

#[derive(Default)]
struct InstanceMap {
    slots: HashMap<usize, InstanceSlot>,
    next_sweep: usize,
}

/// Bidirectional map between implementation objects/types and wrappers
///
/// Instance entries are keyed by the implementation's address and hold the
/// wrapper state weakly, so a wrapper is collected as soon as its users
/// drop it; the implementation `Arc` is owned by the wrapper, never by the
/// registry. Both maps may be touched from any thread.
pub struct Registry {
    instances: Mutex<InstanceMap>,
    types: DashMap<TypeId, TypeEntry>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            instances: Mutex::new(InstanceMap::default()),
            types: DashMap::new(),
        }
    }

    /// Register `T` under its default wrapper name; idempotent
    pub fn register<T: Wrappable>(&self) -> TypeEntry {
        self.register_named::<T>(T::wrapper_name(), None)
    }

    /// Register `T` under a chosen wrapper name and module
    ///
    /// A type is registered at most once: re-registering returns the
    /// existing entry and ignores the new placement.
    pub fn register_named<T: Wrappable>(
        &self,
        wrapper_name: impl Into<String>,
        target_module: Option<String>,
    ) -> TypeEntry {
        let wrapper_name = wrapper_name.into();
        match self.types.entry(TypeId::of::<T>()) {
            Entry::Occupied(existing) => {
                tracing::debug!(
                    impl_name = existing.get().impl_name,
                    "type already wrapped; returning existing wrapper identity"
                );
                existing.get().clone()
            }
            Entry::Vacant(vacant) => vacant
                .insert(TypeEntry {
                    impl_name: std::any::type_name::<T>(),
                    wrapper_name,
                    target_module,
                })
                .clone(),
        }
    }

    /// True once `T` has been registered with this synchronizer
    pub fn is_registered<T: Wrappable>(&self) -> bool {
        self.types.contains_key(&TypeId::of::<T>())
    }

    /// The wrapper identity registered for `T`, if any
    pub fn type_entry<T: Wrappable>(&self) -> Option<TypeEntry> {
        self.types.get(&TypeId::of::<T>()).map(|e| e.clone())
    }

    /// Wrapper for `imp`, reusing the live one if it exists
    ///
    /// While any clone of the returned handle is alive, wrapping the same
    /// `Arc` again yields a handle sharing the same state; once all clones
    /// drop, a fresh wrapper may be issued.
    pub(crate) fn wrap_instance<T: Wrappable>(
        &self,
        imp: Arc<T>,
        sync: &Synchronizer,
    ) -> Handle<T> {
        self.register::<T>();
        let key = Arc::as_ptr(&imp) as usize;
        let mut map = self.instances.lock();
        if let Some(slot) = map.slots.get(&key) {
            if let Some(live) = slot.wrapper.upgrade() {
                if let Ok(shared) = live.downcast::<HandleShared<T>>() {
                    return Handle::from_shared(shared);
                }
            }
            map.slots.remove(&key);
        }
        let shared = Arc::new(HandleShared::new(imp, sync.clone()));
        let erased: Arc<dyn Any + Send + Sync> = shared.clone();
        map.slots.insert(
            key,
            InstanceSlot {
                wrapper: Arc::downgrade(&erased),
            },
        );
        if map.slots.len() >= map.next_sweep {
            map.slots.retain(|_, slot| slot.wrapper.strong_count() > 0);
            map.next_sweep = (map.slots.len() * 2).max(64);
        }
        Handle::from_shared(shared)
    }

    /// Number of instance entries whose wrapper is still alive
    pub fn live_instances(&self) -> usize {
        self.instances
            .lock()
            .slots
            .values()
            .filter(|slot| slot.wrapper.strong_count() > 0)
            .count()
    }

    /// Drop bookkeeping for wrappers that have been collected
    pub fn compact(&self) {
        let mut map = self.instances.lock();
        map.slots.retain(|_, slot| slot.wrapper.strong_count() > 0);
    }

    /// Number of registered implementation types
    pub fn registered_types(&self) -> usize {
        self.types.len()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.types.len())
            .field("live_instances", &self.live_instances())
            .finish()
    }
}

pub(crate) fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full).to_string()
}

#[cfg(test)]
#[path = "registry/registry_tests.rs"]
mod registry_tests;
