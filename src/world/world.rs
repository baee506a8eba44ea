//! World
//!
//! [`World`] is the explicit context every operation runs against. It owns the
//! object arena, the component slots, the level-ordered track storage and the
//! event-handler index, and drives the per-tick transform walk.
//!
//! Operations are split over several modules, each adding an `impl World`
//! block: hierarchy changes live in `hierarchy.rs`, component ownership in
//! `component.rs`, message delivery in `router.rs`, transform setters and
//! bounds in `placement.rs`.

use glam::{Quat, Vec3};
use lasso::Rodeo;
use rustc_hash::FxHashMap;
use slotmap::{SecondaryMap, SlotMap};

use crate::errors::{Result, WorldError, contract_violation};
use crate::world::component::ComponentSlot;
use crate::world::config::{ChildPolicy, WorldConfig};
use crate::world::events::EventHandlerIndex;
use crate::world::hierarchy::Preserve;
use crate::world::levels::{HierarchyStorage, LevelOrderBatches, Track};
use crate::world::object::{GameObject, ObjectFlags};
use crate::world::router::ObjectHandler;
use crate::world::spatial::SpatialSystem;
use crate::world::store::ObjectStore;
use crate::world::transform::Transform;
use crate::world::transform_system;
use crate::world::wrapper::ObjectMut;
use crate::world::{ComponentHandle, ObjectHandle};

/// Deletion requested through [`DeleteObject`](super::DeleteObject).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingDelete {
    pub object: ObjectHandle,
    pub delete_empty_parents: bool,
}

/// Initial state of a new object.
///
/// ```rust,ignore
/// let wheel = world.create_object(
///     ObjectDesc::new("wheel")
///         .with_parent(car)
///         .with_position(Vec3::new(1.0, 0.0, 2.0)),
/// )?;
/// ```
#[derive(Debug, Clone)]
pub struct ObjectDesc {
    pub name: Option<String>,
    pub global_key: Option<String>,
    pub parent: Option<ObjectHandle>,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub active: bool,
    pub force_dynamic: bool,
    pub team_id: u16,
    pub tags: u64,
}

impl Default for ObjectDesc {
    fn default() -> Self {
        Self {
            name: None,
            global_key: None,
            parent: None,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            active: true,
            force_dynamic: false,
            team_id: 0,
            tags: 0,
        }
    }
}

impl ObjectDesc {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: ObjectHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_global_key(mut self, key: impl Into<String>) -> Self {
        self.global_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    #[must_use]
    pub fn with_force_dynamic(mut self, force_dynamic: bool) -> Self {
        self.force_dynamic = force_dynamic;
        self
    }

    #[must_use]
    pub fn with_team_id(mut self, team_id: u16) -> Self {
        self.team_id = team_id;
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: u64) -> Self {
        self.tags = tags;
        self
    }

    fn local_transform(&self) -> Transform {
        Transform::new(self.position, self.rotation, self.scale)
    }
}

/// Owner of a game object hierarchy.
pub struct World {
    pub(crate) config: WorldConfig,

    // === Objects ===
    pub(crate) store: ObjectStore,
    pub(crate) levels: HierarchyStorage,
    pub(crate) names: Rodeo,
    pub(crate) global_keys: FxHashMap<String, ObjectHandle>,

    // === Components ===
    pub(crate) components: SlotMap<ComponentHandle, ComponentSlot>,

    // === Routing ===
    pub(crate) object_handlers: SecondaryMap<ObjectHandle, ObjectHandler>,
    pub(crate) event_handlers: EventHandlerIndex,
    pub(crate) pending_deletes: Vec<PendingDelete>,

    // === External ===
    pub(crate) spatial: Option<Box<dyn SpatialSystem>>,

    /// One increment per [`World::update`].
    pub(crate) update_counter: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config,
            store: ObjectStore::new(),
            levels: HierarchyStorage::new(),
            names: Rodeo::default(),
            global_keys: FxHashMap::default(),
            components: SlotMap::with_key(),
            object_handlers: SecondaryMap::new(),
            event_handlers: EventHandlerIndex::default(),
            pending_deletes: Vec::new(),
            spatial: None,
            update_counter: 0,
        }
    }

    /// Installs the spatial index that receives object bounds.
    #[must_use]
    pub fn with_spatial_system(mut self, spatial: impl SpatialSystem + 'static) -> Self {
        self.spatial = Some(Box::new(spatial));
        self
    }

    pub fn set_spatial_system(&mut self, spatial: Option<Box<dyn SpatialSystem>>) {
        self.spatial = spatial;
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Number of completed [`World::update`] calls.
    #[inline]
    #[must_use]
    pub fn update_counter(&self) -> u64 {
        self.update_counter
    }

    /// Level-ordered batches of one transform track.
    #[must_use]
    pub fn level_batches(&self, track: Track) -> &LevelOrderBatches {
        self.levels.track(track)
    }

    // ========================================================================
    // Object lifecycle
    // ========================================================================

    /// Creates an empty, active, static root.
    pub fn create_empty(&mut self) -> ObjectHandle {
        let (handle, object) = self.store.create();
        object.transform.update_global_from_parent(None);
        self.relink(handle);
        log::debug!("[{}] created {handle:?}", self.config.name);
        handle
    }

    /// Creates an object from `desc`, linking it under `desc.parent` with its
    /// local transform kept.
    pub fn create_object(&mut self, desc: ObjectDesc) -> Result<ObjectHandle> {
        if let Some(parent) = desc.parent
            && !self.store.contains(parent)
        {
            return Err(WorldError::InvalidHandle(parent));
        }
        if let Some(key) = &desc.global_key
            && self.global_keys.contains_key(key)
        {
            return Err(WorldError::GlobalKeyInUse(key.clone()));
        }

        let handle = self.create_empty();
        let name = desc.name.as_deref().map(|name| self.names.get_or_intern(name));
        if let Some(object) = self.store.resolve_mut(handle) {
            object.name = name;
            object.team_id = desc.team_id;
            object.tags = desc.tags;
            object.transform.local = desc.local_transform();
            object.transform.update_global_from_parent(None);
            object.set_flag(ObjectFlags::ACTIVE_FLAG, desc.active);
            object.set_flag(ObjectFlags::ACTIVE_STATE, desc.active);
        }
        if let Some(key) = desc.global_key {
            self.set_global_key(handle, Some(key))?;
        }
        if let Some(parent) = desc.parent {
            self.set_parent(handle, Some(parent), Preserve::Local)?;
        }
        if desc.force_dynamic {
            self.make_dynamic(handle)?;
        }
        Ok(handle)
    }

    /// Chainable mutable access.
    pub fn object(&mut self, handle: ObjectHandle) -> ObjectMut<'_> {
        ObjectMut::new(self, handle)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, handle: ObjectHandle) -> Option<&GameObject> {
        self.store.resolve(handle)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.store.contains(handle)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Destroys `handle` using the configured [`ChildPolicy`].
    pub fn destroy(&mut self, handle: ObjectHandle) -> Result<()> {
        self.destroy_with(handle, self.config.child_policy)
    }

    /// Destroys `handle`, handling its children according to `policy`.
    ///
    /// Attached components are destroyed with their owner. Destroying a dead
    /// handle is a contract violation.
    pub fn destroy_with(&mut self, handle: ObjectHandle, policy: ChildPolicy) -> Result<()> {
        let Some(object) = self.store.resolve(handle) else {
            contract_violation(
                self.config.strict_contracts,
                &self.config.name,
                format_args!("destroying dead handle {handle:?}"),
            );
            return Err(WorldError::InvalidHandle(handle));
        };
        let grandparent = object.parent;

        match policy {
            ChildPolicy::DestroyRecursive => {
                let mut doomed = vec![handle];
                doomed.extend(self.descendants(handle));
                // Leaves first, so every release sees a live parent
                for &object in doomed.iter().rev() {
                    self.release_object(object);
                }
                return Ok(());
            }
            ChildPolicy::ReparentToGrandparent => {
                let children: Vec<_> = self.children(handle).collect();
                for child in children {
                    self.set_parent(child, grandparent, Preserve::Global)?;
                }
            }
            ChildPolicy::PromoteToRoot => {
                let children: Vec<_> = self.children(handle).collect();
                for child in children {
                    self.set_parent(child, None, Preserve::Global)?;
                }
            }
        }

        self.release_object(handle);
        Ok(())
    }

    /// Unlinks a childless object from everything that refers to it and frees
    /// its slot.
    fn release_object(&mut self, handle: ObjectHandle) {
        self.detach_from_parent(handle);

        let Some(object) = self.store.resolve_mut(handle) else {
            return;
        };
        let components = std::mem::take(&mut object.components);
        let spatial_data = object.transform.spatial_data.take();
        let slot = object.transform.slot.take();
        let global_key = object.global_key.take();

        for component in components {
            self.event_handlers.unregister(component);
            if let Some(mut slot) = self.components.remove(component) {
                slot.owner = None;
                if slot.active_state {
                    slot.component.update_active_state(false);
                }
            }
        }
        if let (Some(spatial), Some(data)) = (self.spatial.as_deref_mut(), spatial_data) {
            spatial.delete_spatial_data(data);
        }
        if let Some(slot) = slot {
            self.unlink_slot(slot);
        }
        if let Some(key) = global_key {
            self.global_keys.remove(&key);
        }
        self.event_handlers.remove_scope(handle);
        self.object_handlers.remove(handle);

        if self.store.release(handle).is_ok() {
            log::debug!("[{}] destroyed {handle:?}", self.config.name);
        }
    }

    // ========================================================================
    // Frame update
    // ========================================================================

    /// Advances one tick: bumps the update counter, walks the dynamic track
    /// root-to-leaf, then runs queued deletions.
    pub fn update(&mut self, dt: f32) {
        self.update_counter += 1;
        // A paused tick (dt <= 0) reports zero velocity but still advances
        // the motion history.
        let inv_dt = self
            .config
            .track_velocity
            .then(|| if dt > 0.0 { 1.0 / dt } else { 0.0 });

        let updated = transform_system::update_dynamic_levels(
            &mut self.store,
            self.levels.track(Track::Dynamic),
            self.update_counter,
            inv_dt,
            &mut self.spatial,
        );
        log::trace!(
            "[{}] tick {}: {updated} dynamic objects updated",
            self.config.name,
            self.update_counter
        );

        self.process_pending_deletes();
    }

    /// Runs deletions queued by [`DeleteObject`](super::DeleteObject).
    /// Targets that are already gone are skipped.
    pub fn process_pending_deletes(&mut self) {
        let pending = std::mem::take(&mut self.pending_deletes);
        for request in pending {
            let Some(object) = self.store.resolve(request.object) else {
                continue;
            };
            let mut parent = object.parent;

            if self.destroy(request.object).is_err() {
                continue;
            }
            if !request.delete_empty_parents {
                continue;
            }

            while let Some(current) = parent {
                let Some(object) = self.store.resolve(current) else {
                    break;
                };
                if object.child_count > 0 || !object.components.is_empty() {
                    break;
                }
                parent = object.parent;
                if self.destroy(current).is_err() {
                    break;
                }
            }
        }
    }

    /// Number of deletions waiting for the next update.
    #[must_use]
    pub fn pending_delete_count(&self) -> usize {
        self.pending_deletes.len()
    }

    // ========================================================================
    // Naming
    // ========================================================================

    #[must_use]
    pub fn name(&self, handle: ObjectHandle) -> Option<&str> {
        let spur = self.store.resolve(handle)?.name?;
        Some(self.names.resolve(&spur))
    }

    pub fn set_name(&mut self, handle: ObjectHandle, name: Option<&str>) -> Result<()> {
        let spur = name.map(|name| self.names.get_or_intern(name));
        let object = self
            .store
            .resolve_mut(handle)
            .ok_or(WorldError::InvalidHandle(handle))?;
        object.name = spur;
        Ok(())
    }

    /// Assigns a world-unique key. `None` releases the current key.
    pub fn set_global_key(&mut self, handle: ObjectHandle, key: Option<String>) -> Result<()> {
        if !self.store.contains(handle) {
            return Err(WorldError::InvalidHandle(handle));
        }
        if let Some(key) = &key
            && let Some(&owner) = self.global_keys.get(key)
            && owner != handle
        {
            return Err(WorldError::GlobalKeyInUse(key.clone()));
        }

        let object = self
            .store
            .resolve_mut(handle)
            .ok_or(WorldError::InvalidHandle(handle))?;
        if let Some(old) = object.global_key.take() {
            self.global_keys.remove(&old);
        }
        if let Some(key) = key {
            object.global_key = Some(key.clone());
            self.global_keys.insert(key, handle);
        }
        Ok(())
    }

    #[must_use]
    pub fn find_by_global_key(&self, key: &str) -> Option<ObjectHandle> {
        self.global_keys.get(key).copied()
    }

    /// Sets spatial tags. Existing spatial entries are recreated so the index
    /// sees the new tags.
    pub fn set_tags(&mut self, handle: ObjectHandle, tags: u64) -> Result<()> {
        let object = self
            .store
            .resolve_mut(handle)
            .ok_or(WorldError::InvalidHandle(handle))?;
        if object.tags == tags {
            return Ok(());
        }
        object.tags = tags;
        if object.transform.spatial_data.is_some() {
            self.recreate_spatial_data(handle);
        }
        Ok(())
    }

    /// Enables or disables notification flags. Bits outside the three
    /// `*_NOTIFY` flags are ignored.
    pub fn set_notify(&mut self, handle: ObjectHandle, flags: ObjectFlags, enabled: bool) -> Result<()> {
        let mask = ObjectFlags::STATIC_TRANSFORM_CHANGE_NOTIFY
            | ObjectFlags::COMPONENT_CHANGE_NOTIFY
            | ObjectFlags::CHILDREN_CHANGE_NOTIFY;
        let object = self
            .store
            .resolve_mut(handle)
            .ok_or(WorldError::InvalidHandle(handle))?;
        object.set_flag(flags & mask, enabled);
        Ok(())
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("name", &self.config.name)
            .field("objects", &self.store.len())
            .field("components", &self.components.len())
            .field("update_counter", &self.update_counter)
            .finish_non_exhaustive()
    }
}
