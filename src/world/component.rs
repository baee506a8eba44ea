//! Component Slot
//!
//! Components are owned by the world and attached to at most one object at a
//! time. The owning object keeps a small inline list of handles plus a version
//! counter bumped on every add/remove; the component keeps a back-reference to
//! its owner.
//!
//! A component sees itself active when its own flag is set and its owner is
//! active. [`Component::update_active_state`] fires on every change of that
//! combined state.

use std::any::Any;
use std::marker::PhantomData;

use crate::errors::{Result, WorldError, contract_violation};
use crate::world::message::{ChangeKind, ComponentsChanged, Message, MessageContext};
use crate::world::object::{GameObject, ObjectFlags};
use crate::world::world::World;
use crate::world::{ComponentHandle, ObjectHandle};

/// Behaviour attached to a game object.
///
/// `is_dynamic` must not change while the component is attached.
pub trait Component: Any {
    /// Whether the owner needs its global transform recomputed every tick.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Called when the combined active state flips.
    fn update_active_state(&mut self, _active: bool) {}

    /// Returns `true` when the message was handled.
    fn handle_message(&mut self, _ctx: &MessageContext, _message: &mut dyn Message) -> bool {
        false
    }
}

impl dyn Component {
    #[inline]
    #[must_use]
    pub fn is<T: Component>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }

    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    #[inline]
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        (self as &mut dyn Any).downcast_mut::<T>()
    }
}

/// World-side storage of one component.
pub(crate) struct ComponentSlot {
    pub owner: Option<ObjectHandle>,
    /// User intent for this component alone.
    pub active_flag: bool,
    /// Last state delivered through `update_active_state`.
    pub active_state: bool,
    pub component: Box<dyn Component>,
}

impl ComponentSlot {
    /// Delivers `owner_active AND active_flag` if it differs from the last
    /// delivered state.
    fn sync_active_state(&mut self, owner_active: bool) {
        let state = self.active_flag && owner_active;
        if state != self.active_state {
            self.active_state = state;
            self.component.update_active_state(state);
        }
    }
}

// ============================================================================
// World: component ownership
// ============================================================================

impl World {
    /// Stores an unattached component.
    pub fn spawn_component(&mut self, component: impl Component) -> ComponentHandle {
        self.components.insert(ComponentSlot {
            owner: None,
            active_flag: true,
            active_state: false,
            component: Box::new(component),
        })
    }

    /// Stores `component` and attaches it to `owner`.
    pub fn create_component(
        &mut self,
        owner: ObjectHandle,
        component: impl Component,
    ) -> Result<ComponentHandle> {
        if !self.store.contains(owner) {
            return Err(WorldError::InvalidHandle(owner));
        }
        let handle = self.spawn_component(component);
        self.add_component(owner, handle)?;
        Ok(handle)
    }

    /// Attaches `component` to `object`.
    ///
    /// A dynamic component turns the object and its subtree dynamic.
    pub fn add_component(&mut self, object: ObjectHandle, component: ComponentHandle) -> Result<()> {
        let owner_active = self
            .store
            .resolve(object)
            .ok_or(WorldError::InvalidHandle(object))?
            .is_active();
        let slot = self
            .components
            .get_mut(component)
            .ok_or(WorldError::InvalidComponent(component))?;
        if let Some(owner) = slot.owner {
            return Err(WorldError::AlreadyOwned { component, owner });
        }
        slot.owner = Some(object);
        let dynamic = slot.component.is_dynamic();

        if let Some(target) = self.store.resolve_mut(object) {
            target.components.push(component);
            target.components_version.changed();
        }
        if dynamic {
            self.propagate_dynamic(object);
        }
        if let Some(slot) = self.components.get_mut(component) {
            slot.sync_active_state(owner_active);
        }

        self.notify_components_changed(object, ChangeKind::Added, component);
        Ok(())
    }

    /// Attaches `component` to an object the caller has already made dynamic
    /// if the component needs it.
    ///
    /// Attaching a dynamic component to a static object this way is a
    /// contract violation. When contracts are lenient the object is turned
    /// dynamic anyway, so the structure stays consistent.
    pub fn attach_component(&mut self, object: ObjectHandle, component: ComponentHandle) -> Result<()> {
        let owner_static = self
            .store
            .resolve(object)
            .ok_or(WorldError::InvalidHandle(object))?
            .is_static();
        let dynamic = self
            .components
            .get(component)
            .ok_or(WorldError::InvalidComponent(component))?
            .component
            .is_dynamic();

        if dynamic && owner_static {
            contract_violation(
                self.config.strict_contracts,
                &self.config.name,
                format_args!(
                    "dynamic component {component:?} attached to static object {object:?} without make_dynamic"
                ),
            );
        }
        self.add_component(object, component)
    }

    /// Detaches `component` from `object` (swap-remove, order not kept) and
    /// turns the object static again if nothing else keeps it dynamic.
    pub fn remove_component(&mut self, object: ObjectHandle, component: ComponentHandle) -> Result<()> {
        let target = self
            .store
            .resolve_mut(object)
            .ok_or(WorldError::InvalidHandle(object))?;
        let index = target
            .components
            .iter()
            .position(|&handle| handle == component)
            .ok_or(WorldError::ComponentNotFound { component, object })?;
        target.components.swap_remove(index);
        target.components_version.changed();

        if let Some(slot) = self.components.get_mut(component) {
            slot.owner = None;
            slot.sync_active_state(false);
        }
        self.conditional_make_static(object, Some(component));

        self.notify_components_changed(object, ChangeKind::Removed, component);
        Ok(())
    }

    /// Detaches (if attached) and drops the component, handing it back.
    pub fn destroy_component(&mut self, component: ComponentHandle) -> Result<Box<dyn Component>> {
        let owner = self
            .components
            .get(component)
            .ok_or(WorldError::InvalidComponent(component))?
            .owner;
        if let Some(owner) = owner {
            self.remove_component(owner, component)?;
        }
        self.event_handlers.unregister(component);
        self.components
            .remove(component)
            .map(|slot| slot.component)
            .ok_or(WorldError::InvalidComponent(component))
    }

    fn notify_components_changed(&mut self, owner: ObjectHandle, kind: ChangeKind, component: ComponentHandle) {
        let wants_notice = self
            .store
            .resolve(owner)
            .is_some_and(|object| object.flags.contains(ObjectFlags::COMPONENT_CHANGE_NOTIFY));
        if wants_notice {
            self.send_notification(
                owner,
                &mut ComponentsChanged {
                    kind,
                    owner,
                    component,
                },
            );
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    #[must_use]
    pub fn component<T: Component>(&self, handle: ComponentHandle) -> Option<&T> {
        self.components.get(handle)?.component.downcast_ref::<T>()
    }

    pub fn component_mut<T: Component>(&mut self, handle: ComponentHandle) -> Option<&mut T> {
        self.components.get_mut(handle)?.component.downcast_mut::<T>()
    }

    #[must_use]
    pub fn component_dyn(&self, handle: ComponentHandle) -> Option<&dyn Component> {
        self.components.get(handle).map(|slot| slot.component.as_ref())
    }

    #[must_use]
    pub fn component_owner(&self, handle: ComponentHandle) -> Option<ObjectHandle> {
        self.components.get(handle)?.owner
    }

    /// Combined state last delivered to the component.
    #[must_use]
    pub fn is_component_active(&self, handle: ComponentHandle) -> bool {
        self.components.get(handle).is_some_and(|slot| slot.active_state)
    }

    /// First component of type `T` on `object`, in list order.
    #[must_use]
    pub fn find_component<T: Component>(&self, object: ObjectHandle) -> Option<ComponentHandle> {
        self.store
            .resolve(object)?
            .components
            .iter()
            .copied()
            .find(|&handle| {
                self.components
                    .get(handle)
                    .is_some_and(|slot| slot.component.is::<T>())
            })
    }

    // ========================================================================
    // Active state
    // ========================================================================

    /// Sets the user active flag of `object`.
    ///
    /// The derived state of the object, its components and its descendants is
    /// recomputed depth-first; the walk stops below any object whose state did
    /// not change.
    pub fn set_active_flag(&mut self, object: ObjectHandle, enabled: bool) -> Result<()> {
        let target = self
            .store
            .resolve_mut(object)
            .ok_or(WorldError::InvalidHandle(object))?;
        if target.active_flag() == enabled {
            return Ok(());
        }
        target.set_flag(ObjectFlags::ACTIVE_FLAG, enabled);
        self.refresh_active_state(object);
        Ok(())
    }

    /// Sets the flag of a single component.
    pub fn set_component_active_flag(&mut self, component: ComponentHandle, enabled: bool) -> Result<()> {
        let owner_active = self
            .component_owner(component)
            .and_then(|owner| self.store.resolve(owner))
            .is_some_and(GameObject::is_active);
        let slot = self
            .components
            .get_mut(component)
            .ok_or(WorldError::InvalidComponent(component))?;
        slot.active_flag = enabled;
        slot.sync_active_state(owner_active);
        Ok(())
    }

    /// Recomputes `active_state = active_flag AND parent.active_state` from
    /// `root` down, short-circuiting at unchanged objects.
    pub(crate) fn refresh_active_state(&mut self, root: ObjectHandle) {
        let Some(object) = self.store.resolve(root) else {
            return;
        };
        let parent_active = object
            .parent
            .and_then(|parent| self.store.resolve(parent))
            .is_none_or(GameObject::is_active);

        let mut stack = vec![(root, parent_active)];
        while let Some((handle, parent_active)) = stack.pop() {
            let Some(object) = self.store.resolve_mut(handle) else {
                continue;
            };
            let state = object.active_flag() && parent_active;
            if state == object.is_active() {
                continue;
            }
            object.set_flag(ObjectFlags::ACTIVE_STATE, state);

            for &component in &object.components {
                if let Some(slot) = self.components.get_mut(component) {
                    slot.sync_active_state(state);
                }
            }
            let mut child = object.last_child;
            while let Some(handle) = child {
                stack.push((handle, state));
                child = self.store.resolve(handle).and_then(GameObject::prev_sibling);
            }
        }
    }
}

// ============================================================================
// Cached lookup
// ============================================================================

/// Cached [`World::find_component`] result, revalidated against the owner's
/// component-list version.
#[derive(Debug)]
pub struct ComponentLookup<T: Component> {
    object: ObjectHandle,
    version: Option<u32>,
    cached: Option<ComponentHandle>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> ComponentLookup<T> {
    #[must_use]
    pub fn new(object: ObjectHandle) -> Self {
        Self {
            object,
            version: None,
            cached: None,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn object(&self) -> ObjectHandle {
        self.object
    }

    /// Returns the cached handle, searching again only if the component list
    /// changed since the last call.
    pub fn get(&mut self, world: &World) -> Option<ComponentHandle> {
        let version = world.get(self.object)?.components_version();
        if self.version != Some(version) {
            self.cached = world.find_component::<T>(self.object);
            self.version = Some(version);
        }
        self.cached
    }
}
