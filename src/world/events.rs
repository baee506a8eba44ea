//! Event handler index
//!
//! Components registered as event handlers for a scope object receive the
//! events sent to that object or to any object below it that has no closer
//! scope. Handlers registered without a scope catch everything that no scope
//! claims.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::{Result, WorldError};
use crate::world::object::GameObject;
use crate::world::store::ObjectStore;
use crate::world::world::World;
use crate::world::{ComponentHandle, ObjectHandle};

type HandlerList = SmallVec<[ComponentHandle; 2]>;

#[derive(Debug, Default)]
pub(crate) struct EventHandlerIndex {
    scoped: FxHashMap<ObjectHandle, HandlerList>,
    global: Vec<ComponentHandle>,
}

impl EventHandlerIndex {
    pub fn register(&mut self, scope: Option<ObjectHandle>, component: ComponentHandle) {
        let list = match scope {
            Some(scope) => self.scoped.entry(scope).or_default(),
            None => {
                if !self.global.contains(&component) {
                    self.global.push(component);
                }
                return;
            }
        };
        if !list.contains(&component) {
            list.push(component);
        }
    }

    /// Removes `component` from every scope.
    pub fn unregister(&mut self, component: ComponentHandle) {
        self.global.retain(|&handle| handle != component);
        self.scoped.retain(|_, list| {
            list.retain(|handle| *handle != component);
            !list.is_empty()
        });
    }

    pub fn remove_scope(&mut self, scope: ObjectHandle) {
        self.scoped.remove(&scope);
    }

    /// Handlers for events at `object`: the closest registered scope on the
    /// parent chain, falling back to the global handlers.
    pub fn resolve(&self, store: &ObjectStore, object: ObjectHandle) -> &[ComponentHandle] {
        let mut current = Some(object);
        while let Some(handle) = current {
            if let Some(list) = self.scoped.get(&handle) {
                return list;
            }
            current = store.resolve(handle).and_then(GameObject::parent);
        }
        &self.global
    }
}

impl World {
    /// Registers `component` as an event handler for `scope` and its subtree,
    /// or globally with `None`.
    pub fn register_event_handler(
        &mut self,
        scope: Option<ObjectHandle>,
        component: ComponentHandle,
    ) -> Result<()> {
        if !self.components.contains_key(component) {
            return Err(WorldError::InvalidComponent(component));
        }
        if let Some(scope) = scope
            && !self.store.contains(scope)
        {
            return Err(WorldError::InvalidHandle(scope));
        }
        self.event_handlers.register(scope, component);
        Ok(())
    }

    pub fn unregister_event_handler(&mut self, component: ComponentHandle) {
        self.event_handlers.unregister(component);
    }

    /// Handlers [`World::send_event`] would deliver to for `object`.
    #[must_use]
    pub fn event_handlers_for(&self, object: ObjectHandle) -> &[ComponentHandle] {
        self.event_handlers.resolve(&self.store, object)
    }
}
