//! Chainable object operation wrapper.
//!
//! [`ObjectMut`] borrows a [`World`] mutably and provides a fluent API for
//! the common per-object setters.
//!
//! All methods silently no-op when the handle is stale, so chains never panic
//! on dangling handles. Use the `World` methods directly when the outcome
//! matters.
//!
//! # Example
//!
//! ```rust,ignore
//! world.object(handle)
//!     .set_position(0.0, 3.0, 0.0)
//!     .set_scale(2.0)
//!     .look_at(Vec3::ZERO)
//!     .set_active(false);
//! ```
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::must_use_candidate)]
use glam::{Quat, Vec3};

use crate::world::ObjectHandle;
use crate::world::hierarchy::Preserve;
use crate::world::transform::Transform;
use crate::world::world::World;

/// Temporary mutable borrow of a world object for chainable operations.
pub struct ObjectMut<'a> {
    world: &'a mut World,
    handle: ObjectHandle,
}

impl<'a> ObjectMut<'a> {
    #[inline]
    pub fn new(world: &'a mut World, handle: ObjectHandle) -> Self {
        Self { world, handle }
    }

    /// Returns the underlying handle.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    fn with_local(self, edit: impl FnOnce(&mut Transform)) -> Self {
        if let Some(object) = self.world.get(self.handle) {
            let mut local = *object.local_transform();
            edit(&mut local);
            let _ = self.world.set_local_transform(self.handle, local);
        }
        self
    }

    // -- Transform setters (chainable) --

    /// Sets the object's local position.
    #[inline]
    pub fn set_position(self, x: f32, y: f32, z: f32) -> Self {
        self.set_position_vec(Vec3::new(x, y, z))
    }

    #[inline]
    pub fn set_position_vec(self, position: Vec3) -> Self {
        self.with_local(|local| local.position = position)
    }

    /// Sets uniform scale.
    #[inline]
    pub fn set_scale(self, s: f32) -> Self {
        self.with_local(|local| local.scale = Vec3::splat(s))
    }

    /// Sets non-uniform scale.
    #[inline]
    pub fn set_scale_xyz(self, x: f32, y: f32, z: f32) -> Self {
        self.with_local(|local| local.scale = Vec3::new(x, y, z))
    }

    #[inline]
    pub fn set_rotation(self, rotation: Quat) -> Self {
        self.with_local(|local| local.rotation = rotation)
    }

    /// Sets rotation from Euler angles (XYZ order, radians).
    #[inline]
    pub fn set_rotation_euler(self, x: f32, y: f32, z: f32) -> Self {
        self.with_local(|local| local.set_rotation_euler(x, y, z))
    }

    /// Rotates around the Y axis by `angle` radians (cumulative).
    #[inline]
    pub fn rotate_y(self, angle: f32) -> Self {
        self.with_local(|local| local.rotation *= Quat::from_rotation_y(angle))
    }

    /// Orients the object to face `target` (in parent space).
    #[inline]
    pub fn look_at(self, target: Vec3) -> Self {
        let up = self.world.config().coordinate_system.up;
        self.with_local(|local| local.look_at(target, up))
    }

    /// Places the object in world space.
    #[inline]
    pub fn set_global_position(self, position: Vec3) -> Self {
        let _ = self.world.set_global_position(self.handle, position);
        self
    }

    // -- State setters (chainable) --

    #[inline]
    pub fn set_active(self, active: bool) -> Self {
        let _ = self.world.set_active_flag(self.handle, active);
        self
    }

    #[inline]
    pub fn set_name(self, name: &str) -> Self {
        let _ = self.world.set_name(self.handle, Some(name));
        self
    }

    #[inline]
    pub fn set_parent(self, parent: ObjectHandle) -> Self {
        let _ = self.world.set_parent(self.handle, Some(parent), Preserve::Global);
        self
    }

    #[inline]
    pub fn make_dynamic(self) -> Self {
        let _ = self.world.make_dynamic(self.handle);
        self
    }

    #[inline]
    pub fn set_team_id(self, team_id: u16) -> Self {
        let _ = self.world.set_team_id(self.handle, team_id);
        self
    }
}
