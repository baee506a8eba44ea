//! Messages
//!
//! Messages are plain in-process payloads. A handler receives the message as
//! `&mut dyn Message` and downcasts to the types it understands; handlers may
//! write results back into the payload (see [`UpdateLocalBounds`]).

use std::any::Any;
use std::fmt::Debug;

use crate::world::bounds::{BoundingBox, BoundingSphere, BoundingVolume};
use crate::world::spatial::SpatialCategory;
use crate::world::transform::Transform;
use crate::world::{ComponentHandle, ObjectHandle};

/// Payload routed by the world.
pub trait Message: Any + Debug {
    /// When set, an unhandled delivery is logged in debug builds.
    fn debug_routing(&self) -> bool {
        false
    }
}

impl dyn Message {
    #[inline]
    #[must_use]
    pub fn is<T: Message>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }

    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    #[inline]
    pub fn downcast_mut<T: Message>(&mut self) -> Option<&mut T> {
        (self as &mut dyn Any).downcast_mut::<T>()
    }
}

/// Where a delivery is happening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageContext {
    /// Object the message is being delivered at.
    pub object: ObjectHandle,
    /// Receiving component, `None` for the object-level handler.
    pub component: Option<ComponentHandle>,
    /// Originator, if the sender identified itself.
    pub sender: Option<ObjectHandle>,
}

// ============================================================================
// Built-in messages
// ============================================================================

/// Queues the receiving object for deletion at the end of the next
/// [`World::update`](super::World::update).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteObject {
    /// Also delete ancestors left without children and components.
    pub delete_empty_parents: bool,
}

impl Message for DeleteObject {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
}

/// Sent up the parent chain when a component is attached or detached and the
/// owner has `COMPONENT_CHANGE_NOTIFY` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentsChanged {
    pub kind: ChangeKind,
    pub owner: ObjectHandle,
    pub component: ComponentHandle,
}

impl Message for ComponentsChanged {}

/// Sent to a parent with `CHILDREN_CHANGE_NOTIFY` set when a child is linked
/// or unlinked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildrenChanged {
    pub kind: ChangeKind,
    pub parent: ObjectHandle,
    pub child: ObjectHandle,
}

impl Message for ChildrenChanged {}

/// Sent to a static object with `STATIC_TRANSFORM_CHANGE_NOTIFY` set after an
/// explicit setter moved it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformChanged {
    pub object: ObjectHandle,
    pub old_global: Transform,
    pub new_global: Transform,
}

impl Message for TransformChanged {}

/// Collects local bounds from an object's components.
///
/// Components answer by calling [`add_bounds`](Self::add_bounds) and may
/// opt into spatial categories or always-visible registration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateLocalBounds {
    pub bounds: BoundingVolume,
    pub category: SpatialCategory,
    pub always_visible: bool,
}

impl UpdateLocalBounds {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bounds: BoundingVolume::INVALID,
            category: SpatialCategory::NONE,
            always_visible: false,
        }
    }

    pub fn add_bounds(&mut self, bounds: &BoundingVolume, category: SpatialCategory) {
        self.bounds = self.bounds.union(bounds);
        self.category |= category;
    }

    pub fn add_box(&mut self, aabb: BoundingBox, category: SpatialCategory) {
        self.add_bounds(&BoundingVolume::from_box(aabb), category);
    }

    pub fn add_sphere(&mut self, sphere: BoundingSphere, category: SpatialCategory) {
        self.add_bounds(&BoundingVolume::from_sphere(sphere), category);
    }

    pub fn set_always_visible(&mut self, category: SpatialCategory) {
        self.always_visible = true;
        self.category |= category;
    }
}

impl Default for UpdateLocalBounds {
    fn default() -> Self {
        Self::new()
    }
}

impl Message for UpdateLocalBounds {}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[derive(Debug)]
    struct Ping;
    impl Message for Ping {}

    #[test]
    fn downcast_through_dyn_message() {
        let mut ping = Ping;
        let message: &mut dyn Message = &mut ping;
        assert!(message.is::<Ping>());
        assert!(message.downcast_ref::<DeleteObject>().is_none());
        assert!(message.downcast_mut::<Ping>().is_some());
    }

    #[test]
    fn bounds_contributions_union() {
        let mut query = UpdateLocalBounds::new();
        query.add_box(
            BoundingBox::new(Vec3::ZERO, Vec3::ONE),
            SpatialCategory::from_bit(0),
        );
        query.add_box(
            BoundingBox::new(Vec3::splat(-1.0), Vec3::ZERO),
            SpatialCategory::from_bit(2),
        );

        assert!(query.bounds.is_valid());
        assert_eq!(query.bounds.aabb.min, Vec3::splat(-1.0));
        assert_eq!(query.bounds.aabb.max, Vec3::ONE);
        assert_eq!(query.category.mask(), 0b101);
        assert!(!query.always_visible);
    }
}
