//! Transform System
//!
//! Free functions over the [`ObjectStore`], decoupled from [`World`](super::World)
//! so callers can borrow the store, the level batches and the spatial system
//! independently.
//!
//! # Update counter
//!
//! Every object records the counter of the tick that last wrote its global
//! transform. A dynamic object whose counter matches the world's is current;
//! anything that changes a dynamic local transform marks the object and its
//! subtree stale. Static objects are always current: every change to them
//! recomputes their subtree eagerly.
//!
//! # Parallelization
//!
//! The per-tick walk runs level by level over the dynamic track, so each
//! object reads a parent that was already written. Objects of one level are
//! independent and may be split across workers by an external scheduler.

use smallvec::SmallVec;

use crate::world::ObjectHandle;
use crate::world::levels::LevelOrderBatches;
use crate::world::object::GameObject;
use crate::world::spatial::SpatialSystem;
use crate::world::store::ObjectStore;
use crate::world::transform::{Transform, TransformData};

/// Pushes fresh global bounds to the spatial index, if the object has an
/// entry there.
pub(crate) fn push_bounds(spatial: &mut Option<Box<dyn SpatialSystem>>, data: &TransformData) {
    if data.always_visible || !data.global_bounds.is_valid() {
        return;
    }
    if let (Some(spatial), Some(handle)) = (spatial.as_deref_mut(), data.spatial_data) {
        spatial.update_spatial_data_bounds(handle, &data.global_bounds);
    }
}

/// Refreshes one object from its parent's global transform.
fn refresh_object(
    data: &mut TransformData,
    parent_global: Option<&Transform>,
    counter: u64,
    inv_dt: Option<f32>,
) {
    data.update_global_from_parent(parent_global);
    if let Some(inv_dt) = inv_dt {
        data.update_velocity(inv_dt);
    }
    data.update_global_bounds();
    data.update_counter = counter;
}

/// Per-tick walk over the dynamic track, root level first.
///
/// Objects already current for `counter` are skipped. Returns the number of
/// objects recomputed.
pub fn update_dynamic_levels(
    store: &mut ObjectStore,
    levels: &LevelOrderBatches,
    counter: u64,
    inv_dt: Option<f32>,
    spatial: &mut Option<Box<dyn SpatialSystem>>,
) -> usize {
    let mut updated = 0;
    for batch in levels.batches() {
        for &handle in batch {
            let Some(object) = store.resolve(handle) else {
                continue;
            };
            if object.transform.is_current(counter) {
                continue;
            }
            let parent_global = object
                .parent
                .and_then(|parent| store.resolve(parent))
                .map(|parent| parent.transform.global);

            let Some(object) = store.resolve_mut(handle) else {
                continue;
            };
            refresh_object(&mut object.transform, parent_global.as_ref(), counter, inv_dt);
            push_bounds(spatial, &object.transform);
            updated += 1;
        }
    }
    updated
}

/// Brings `handle` up to date for `counter`, first refreshing every stale
/// dynamic ancestor from the nearest current one downward. Returns the fresh
/// global transform.
pub fn update_global_transform_recursive(
    store: &mut ObjectStore,
    handle: ObjectHandle,
    counter: u64,
    spatial: &mut Option<Box<dyn SpatialSystem>>,
) -> Option<Transform> {
    let mut stale: SmallVec<[ObjectHandle; 16]> = SmallVec::new();
    let mut current = handle;
    let mut base = loop {
        let object = store.resolve(current)?;
        if object.is_static() || object.transform.is_current(counter) {
            break Some(object.transform.global);
        }
        stale.push(current);
        match object.parent {
            Some(parent) => current = parent,
            None => break None,
        }
    };

    for &handle in stale.iter().rev() {
        let object = store.resolve_mut(handle)?;
        refresh_object(&mut object.transform, base.as_ref(), counter, None);
        push_bounds(spatial, &object.transform);
        base = Some(object.transform.global);
    }
    base
}

/// Read-only variant of [`update_global_transform_recursive`]: computes what
/// the global transform of `handle` is right now without touching caches.
#[must_use]
pub fn resolved_global(store: &ObjectStore, handle: ObjectHandle, counter: u64) -> Option<Transform> {
    let mut stale: SmallVec<[ObjectHandle; 16]> = SmallVec::new();
    let mut current = handle;
    let mut global = loop {
        let object = store.resolve(current)?;
        if object.is_static() || object.transform.is_current(counter) {
            break Some(object.transform.global);
        }
        stale.push(current);
        match object.parent {
            Some(parent) => current = parent,
            None => break None,
        }
    };

    for &handle in stale.iter().rev() {
        let local = store.resolve(handle)?.transform.local;
        global = Some(match global {
            Some(parent) => parent.compose(&local),
            None => local,
        });
    }
    global
}

/// Recomputes the global transform and bounds of `root` and its whole
/// subtree from `parent_global`, stamping everything with `counter`.
///
/// This is the explicit-mutation path: setters and re-parenting call it, the
/// per-tick walk never does. Returns the number of objects written.
pub fn update_subtree(
    store: &mut ObjectStore,
    root: ObjectHandle,
    parent_global: Option<&Transform>,
    counter: u64,
    spatial: &mut Option<Box<dyn SpatialSystem>>,
) -> usize {
    let mut written = 0;
    let mut stack: Vec<(ObjectHandle, Option<Transform>)> = Vec::with_capacity(16);
    stack.push((root, parent_global.copied()));

    while let Some((handle, parent_global)) = stack.pop() {
        let Some(object) = store.resolve_mut(handle) else {
            continue;
        };
        refresh_object(&mut object.transform, parent_global.as_ref(), counter, None);
        push_bounds(spatial, &object.transform);
        written += 1;

        let global = object.transform.global;
        let mut child = object.first_child;
        while let Some(handle) = child {
            stack.push((handle, Some(global)));
            child = store.resolve(handle).and_then(GameObject::next_sibling);
        }
    }
    written
}

/// Marks `root` and its subtree stale so the next on-demand refresh or tick
/// recomputes them.
pub fn invalidate_subtree(store: &mut ObjectStore, root: ObjectHandle) {
    let mut stack: SmallVec<[ObjectHandle; 16]> = SmallVec::new();
    stack.push(root);
    while let Some(handle) = stack.pop() {
        let Some(object) = store.resolve_mut(handle) else {
            continue;
        };
        object.transform.invalidate();
        let mut child = object.first_child;
        while let Some(handle) = child {
            stack.push(handle);
            child = store.resolve(handle).and_then(GameObject::next_sibling);
        }
    }
}
