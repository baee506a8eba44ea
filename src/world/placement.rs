//! Transform setters, direction helpers and bounds.
//!
//! Static objects are recomputed eagerly by every setter here (optionally
//! warning once the world is ticking). Dynamic objects only record the new
//! local transform and go stale until the next tick or an explicit
//! [`World::update_global_transform_recursive`].

use glam::{Quat, Vec3};

use crate::errors::{Result, WorldError};
use crate::world::ObjectHandle;
use crate::world::bounds::BoundingVolume;
use crate::world::message::{TransformChanged, UpdateLocalBounds};
use crate::world::object::ObjectFlags;
use crate::world::spatial::SpatialCategory;
use crate::world::transform::Transform;
use crate::world::transform_system;
use crate::world::world::World;

impl World {
    // ========================================================================
    // Global transform access
    // ========================================================================

    /// Current global transform, computed without touching any cache.
    #[must_use]
    pub fn resolved_global_transform(&self, object: ObjectHandle) -> Option<Transform> {
        transform_system::resolved_global(&self.store, object, self.update_counter)
    }

    /// Refreshes the cached global transform of `object` and of its stale
    /// ancestors, returning it.
    pub fn update_global_transform_recursive(&mut self, object: ObjectHandle) -> Option<Transform> {
        transform_system::update_global_transform_recursive(
            &mut self.store,
            object,
            self.update_counter,
            &mut self.spatial,
        )
    }

    // ========================================================================
    // Setters
    // ========================================================================

    pub fn set_local_transform(&mut self, object: ObjectHandle, local: Transform) -> Result<()> {
        let target = self
            .store
            .resolve_mut(object)
            .ok_or(WorldError::InvalidHandle(object))?;
        target.transform.local = local;

        if target.is_dynamic() {
            transform_system::invalidate_subtree(&mut self.store, object);
            return Ok(());
        }

        let old_global = target.transform.global;
        let notify = target
            .flags
            .contains(ObjectFlags::STATIC_TRANSFORM_CHANGE_NOTIFY);
        let parent = target.parent;
        let parent_global = parent
            .and_then(|parent| self.store.resolve(parent))
            .map(|parent| parent.transform.global);

        transform_system::update_subtree(
            &mut self.store,
            object,
            parent_global.as_ref(),
            self.update_counter,
            &mut self.spatial,
        );

        if self.config.report_static_moves && self.update_counter > 0 {
            log::warn!(
                "[{}] static object {object:?} moved after the world started ticking; \
                 call make_dynamic if it moves regularly",
                self.config.name
            );
        }
        if notify && let Some(new_global) = self.store.resolve(object).map(|o| o.transform.global) {
            self.send(
                object,
                &mut TransformChanged {
                    object,
                    old_global,
                    new_global,
                },
            );
        }
        Ok(())
    }

    pub fn set_local_position(&mut self, object: ObjectHandle, position: Vec3) -> Result<()> {
        let mut local = self.local_of(object)?;
        local.position = position;
        self.set_local_transform(object, local)
    }

    pub fn set_local_rotation(&mut self, object: ObjectHandle, rotation: Quat) -> Result<()> {
        let mut local = self.local_of(object)?;
        local.rotation = rotation;
        self.set_local_transform(object, local)
    }

    pub fn set_local_scale(&mut self, object: ObjectHandle, scale: Vec3) -> Result<()> {
        let mut local = self.local_of(object)?;
        local.scale = scale;
        self.set_local_transform(object, local)
    }

    /// Places `object` at `global` in world space by rewriting its local
    /// transform against the parent's current global transform.
    pub fn set_global_transform(&mut self, object: ObjectHandle, global: Transform) -> Result<()> {
        let parent = self
            .store
            .resolve(object)
            .ok_or(WorldError::InvalidHandle(object))?
            .parent;
        let local = match parent.and_then(|parent| self.resolved_global_transform(parent)) {
            Some(parent_global) => global.relative_to(&parent_global),
            None => global,
        };
        self.set_local_transform(object, local)
    }

    /// Moves `object` to `position` in world space, keeping global rotation
    /// and scale.
    pub fn set_global_position(&mut self, object: ObjectHandle, position: Vec3) -> Result<()> {
        let mut global = self
            .resolved_global_transform(object)
            .ok_or(WorldError::InvalidHandle(object))?;
        global.position = position;
        self.set_global_transform(object, global)
    }

    fn local_of(&self, object: ObjectHandle) -> Result<Transform> {
        self.store
            .resolve(object)
            .map(|target| target.transform.local)
            .ok_or(WorldError::InvalidHandle(object))
    }

    // ========================================================================
    // Direction helpers
    // ========================================================================

    /// World-space forward axis of `object`, from its cached global rotation.
    #[must_use]
    pub fn global_dir_forward(&self, object: ObjectHandle) -> Option<Vec3> {
        self.global_axis(object, self.config.coordinate_system.forward)
    }

    #[must_use]
    pub fn global_dir_right(&self, object: ObjectHandle) -> Option<Vec3> {
        self.global_axis(object, self.config.coordinate_system.right)
    }

    #[must_use]
    pub fn global_dir_up(&self, object: ObjectHandle) -> Option<Vec3> {
        self.global_axis(object, self.config.coordinate_system.up)
    }

    fn global_axis(&self, object: ObjectHandle, axis: Vec3) -> Option<Vec3> {
        let rotation = self.store.resolve(object)?.transform.global.rotation;
        Some(rotation * axis)
    }

    // ========================================================================
    // Bounds
    // ========================================================================

    /// Asks the components of `object` for their bounds, caches the union as
    /// local bounds and keeps the spatial index entry in sync.
    ///
    /// The entry is recreated when the category or always-visible flag
    /// changes, deleted when nothing is left to register and otherwise just
    /// updated.
    pub fn update_local_bounds(&mut self, object: ObjectHandle) -> Result<()> {
        if !self.store.contains(object) {
            return Err(WorldError::InvalidHandle(object));
        }
        let mut query = UpdateLocalBounds::new();
        self.send(object, &mut query);

        let target = self
            .store
            .resolve_mut(object)
            .ok_or(WorldError::InvalidHandle(object))?;
        let data = &mut target.transform;
        let layout_changed =
            data.spatial_category != query.category || data.always_visible != query.always_visible;

        data.local_bounds = query.bounds;
        data.spatial_category = query.category;
        data.always_visible = query.always_visible;
        data.update_global_bounds();

        let registered = data.spatial_data.is_some();
        if layout_changed || !registered {
            self.recreate_spatial_data(object);
        } else {
            transform_system::push_bounds(&mut self.spatial, data);
        }
        Ok(())
    }

    /// Drops the spatial entry of `object` (if any) and registers a new one
    /// matching its category, tags, bounds and always-visible flag.
    pub(crate) fn recreate_spatial_data(&mut self, object: ObjectHandle) {
        let Some(spatial) = self.spatial.as_deref_mut() else {
            return;
        };
        let Some(target) = self.store.resolve_mut(object) else {
            return;
        };
        let tags = target.tags;
        let data = &mut target.transform;

        if let Some(old) = data.spatial_data.take() {
            spatial.delete_spatial_data(old);
        }
        if data.spatial_category == SpatialCategory::NONE {
            return;
        }
        data.spatial_data = if data.always_visible {
            Some(spatial.create_spatial_data_always_visible(object, data.spatial_category, tags))
        } else if data.global_bounds.is_valid() {
            Some(spatial.create_spatial_data(&data.global_bounds, object, data.spatial_category, tags))
        } else {
            None
        };
    }

    /// Local bounds currently cached for `object`.
    #[must_use]
    pub fn local_bounds(&self, object: ObjectHandle) -> Option<BoundingVolume> {
        Some(self.store.resolve(object)?.transform.local_bounds)
    }

    /// Global bounds currently cached for `object`.
    #[must_use]
    pub fn global_bounds(&self, object: ObjectHandle) -> Option<BoundingVolume> {
        Some(self.store.resolve(object)?.transform.global_bounds)
    }
}
