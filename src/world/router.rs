//! Message Router
//!
//! Synchronous delivery of a message at an object: first the object-level
//! handler (built-in messages, then the user closure), then every attached
//! component in list order. Inactive components still receive messages.
//!
//! - [`World::send`]: one object
//! - [`World::send_recursive`]: an object and its subtree, pre-order
//! - [`World::send_notification`]: an object and its ancestors, bottom-up
//! - [`World::send_event`]: the event handlers registered for an object
//!
//! Handlers get `&mut` access to their own component and the payload only;
//! structural changes requested from a handler go through messages such as
//! [`DeleteObject`], which queue work for [`World::update`].

use slotmap::{SecondaryMap, SlotMap};

use crate::world::component::ComponentSlot;
use crate::world::message::{DeleteObject, Message, MessageContext};
use crate::world::object::GameObject;
use crate::world::store::ObjectStore;
use crate::world::world::{PendingDelete, World};
use crate::world::{ComponentHandle, ObjectHandle};

/// User handler invoked at object level before the components.
pub type ObjectHandler = Box<dyn FnMut(&MessageContext, &mut dyn Message) -> bool>;

/// The parts of a [`World`] message delivery touches.
struct Dispatch<'w> {
    world_name: &'w str,
    store: &'w ObjectStore,
    components: &'w mut SlotMap<ComponentHandle, ComponentSlot>,
    object_handlers: &'w mut SecondaryMap<ObjectHandle, ObjectHandler>,
    pending_deletes: &'w mut Vec<PendingDelete>,
}

impl Dispatch<'_> {
    /// Delivers at one object. Returns whether anything handled it.
    fn deliver(
        &mut self,
        object: ObjectHandle,
        message: &mut dyn Message,
        sender: Option<ObjectHandle>,
    ) -> bool {
        let store = self.store;
        let Some(target) = store.resolve(object) else {
            return false;
        };
        let ctx = MessageContext {
            object,
            component: None,
            sender,
        };

        let mut handled = self.handle_builtin(&ctx, message);
        if let Some(handler) = self.object_handlers.get_mut(object) {
            handled |= handler(&ctx, message);
        }

        for &component in &target.components {
            if let Some(slot) = self.components.get_mut(component) {
                let ctx = MessageContext {
                    component: Some(component),
                    ..ctx
                };
                handled |= slot.component.handle_message(&ctx, message);
            }
        }
        handled
    }

    fn handle_builtin(&mut self, ctx: &MessageContext, message: &mut dyn Message) -> bool {
        if let Some(delete) = message.downcast_ref::<DeleteObject>() {
            self.pending_deletes.push(PendingDelete {
                object: ctx.object,
                delete_empty_parents: delete.delete_empty_parents,
            });
            return true;
        }
        false
    }

    fn report_unhandled(&self, object: ObjectHandle, message: &dyn Message, handled: bool) {
        if cfg!(debug_assertions) && !handled && message.debug_routing() {
            log::warn!(
                "[{}] message {message:?} sent to {object:?} was not handled",
                self.world_name
            );
        }
    }
}

impl World {
    fn dispatch(&mut self) -> Dispatch<'_> {
        Dispatch {
            world_name: &self.config.name,
            store: &self.store,
            components: &mut self.components,
            object_handlers: &mut self.object_handlers,
            pending_deletes: &mut self.pending_deletes,
        }
    }

    /// Delivers `message` at `object`. Stale handles deliver nothing.
    pub fn send(&mut self, object: ObjectHandle, message: &mut dyn Message) -> bool {
        self.send_from(object, message, None)
    }

    /// [`World::send`] with the sender recorded in the context.
    pub fn send_from(
        &mut self,
        object: ObjectHandle,
        message: &mut dyn Message,
        sender: Option<ObjectHandle>,
    ) -> bool {
        let mut dispatch = self.dispatch();
        let handled = dispatch.deliver(object, message, sender);
        dispatch.report_unhandled(object, message, handled);
        handled
    }

    /// Delivers at `object`, then at each descendant in sibling order.
    pub fn send_recursive(&mut self, object: ObjectHandle, message: &mut dyn Message) -> bool {
        let mut dispatch = self.dispatch();
        let mut handled = false;
        let mut stack = vec![object];
        while let Some(current) = stack.pop() {
            handled |= dispatch.deliver(current, message, None);

            let mut child = dispatch.store.resolve(current).and_then(GameObject::last_child);
            while let Some(handle) = child {
                stack.push(handle);
                child = dispatch.store.resolve(handle).and_then(GameObject::prev_sibling);
            }
        }
        dispatch.report_unhandled(object, message, handled);
        handled
    }

    /// Delivers at `object`, then at its parent, and so on up to the root.
    pub fn send_notification(&mut self, object: ObjectHandle, message: &mut dyn Message) -> bool {
        let mut dispatch = self.dispatch();
        let mut handled = false;
        let mut current = Some(object);
        while let Some(handle) = current {
            handled |= dispatch.deliver(handle, message, None);
            current = dispatch.store.resolve(handle).and_then(GameObject::parent);
        }
        dispatch.report_unhandled(object, message, handled);
        handled
    }

    /// Delivers to the event handlers registered for `object` (see
    /// [`World::register_event_handler`]) instead of its own components.
    pub fn send_event(
        &mut self,
        object: ObjectHandle,
        message: &mut dyn Message,
        sender: Option<ObjectHandle>,
    ) -> bool {
        let handlers = self.event_handlers.resolve(&self.store, object);
        let mut handled = false;
        for &component in handlers {
            if let Some(slot) = self.components.get_mut(component) {
                let ctx = MessageContext {
                    object,
                    component: Some(component),
                    sender,
                };
                handled |= slot.component.handle_message(&ctx, message);
            }
        }
        if cfg!(debug_assertions) && !handled && message.debug_routing() {
            log::warn!(
                "[{}] event {message:?} for {object:?} found no handler",
                self.config.name
            );
        }
        handled
    }

    /// Installs the object-level handler of `object`, replacing any previous
    /// one. It runs after built-in handling and before the components.
    pub fn set_object_handler(
        &mut self,
        object: ObjectHandle,
        handler: impl FnMut(&MessageContext, &mut dyn Message) -> bool + 'static,
    ) -> bool {
        self.object_handlers.insert(object, Box::new(handler));
        self.object_handlers.contains_key(object)
    }

    pub fn clear_object_handler(&mut self, object: ObjectHandle) {
        self.object_handlers.remove(object);
    }
}
