//! Hierarchy Manager
//!
//! Parent/child/sibling links and the derived static/dynamic classification.
//!
//! An object is dynamic exactly when one of these holds:
//! - it is force-dynamic
//! - its parent is dynamic
//! - one of its components reports itself dynamic
//!
//! The `DYNAMIC` flag is only ever written by [`World::recreate_hierarchy_data`],
//! which also moves the object to the matching level track, so flag and track
//! can never disagree.

use smallvec::SmallVec;

use crate::errors::{Result, WorldError, contract_violation};
use crate::world::levels::{LevelSlot, Track};
use crate::world::message::{ChangeKind, ChildrenChanged};
use crate::world::object::{GameObject, ObjectFlags};
use crate::world::store::ObjectStore;
use crate::world::transform_system;
use crate::world::world::World;
use crate::world::{ComponentHandle, ObjectHandle};

/// Which transform survives a re-parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preserve {
    /// Keep the object where it is in the world; rewrite its local transform.
    #[default]
    Global,
    /// Keep the local transform; the object moves with its new parent.
    Local,
}

// ============================================================================
// Iterators
// ============================================================================

/// Direct children in sibling order.
#[derive(Debug, Clone)]
pub struct Children<'a> {
    store: &'a ObjectStore,
    next: Option<ObjectHandle>,
}

impl<'a> Children<'a> {
    pub(crate) fn new(store: &'a ObjectStore, parent: ObjectHandle) -> Self {
        Self {
            store,
            next: store.resolve(parent).and_then(GameObject::first_child),
        }
    }
}

impl Iterator for Children<'_> {
    type Item = ObjectHandle;

    fn next(&mut self) -> Option<ObjectHandle> {
        let current = self.next?;
        self.next = self.store.resolve(current).and_then(GameObject::next_sibling);
        Some(current)
    }
}

/// All descendants, depth-first pre-order, siblings in order.
#[derive(Debug, Clone)]
pub struct Descendants<'a> {
    store: &'a ObjectStore,
    stack: Vec<ObjectHandle>,
}

impl<'a> Descendants<'a> {
    pub(crate) fn new(store: &'a ObjectStore, root: ObjectHandle) -> Self {
        let mut stack = Vec::new();
        push_children_reversed(store, root, &mut stack);
        Self { store, stack }
    }
}

impl Iterator for Descendants<'_> {
    type Item = ObjectHandle;

    fn next(&mut self) -> Option<ObjectHandle> {
        let current = self.stack.pop()?;
        push_children_reversed(self.store, current, &mut self.stack);
        Some(current)
    }
}

/// Pushes children last-to-first so that popping yields sibling order.
fn push_children_reversed(store: &ObjectStore, parent: ObjectHandle, stack: &mut Vec<ObjectHandle>) {
    let mut child = store.resolve(parent).and_then(GameObject::last_child);
    while let Some(handle) = child {
        stack.push(handle);
        child = store.resolve(handle).and_then(GameObject::prev_sibling);
    }
}

// ============================================================================
// World: hierarchy
// ============================================================================

impl World {
    #[must_use]
    pub fn children(&self, parent: ObjectHandle) -> Children<'_> {
        Children::new(&self.store, parent)
    }

    #[must_use]
    pub fn descendants(&self, root: ObjectHandle) -> Descendants<'_> {
        Descendants::new(&self.store, root)
    }

    #[must_use]
    pub fn parent(&self, object: ObjectHandle) -> Option<ObjectHandle> {
        self.store.resolve(object)?.parent
    }

    /// Whether `ancestor` appears on the parent chain of `object`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: ObjectHandle, object: ObjectHandle) -> bool {
        let Some(ancestor_level) = self.store.resolve(ancestor).map(GameObject::hierarchy_level) else {
            return false;
        };
        let mut current = self.parent(object);
        while let Some(handle) = current {
            if handle == ancestor {
                return true;
            }
            // Nothing above this point can sit below `ancestor`
            let Some(object) = self.store.resolve(handle) else {
                break;
            };
            if object.hierarchy_level <= ancestor_level {
                break;
            }
            current = object.parent;
        }
        false
    }

    /// Level the deepest object of `child`'s subtree would land on under
    /// `parent`, or `None` if it does not fit in a `u16`.
    fn deepest_level_under(&self, child: ObjectHandle, parent: ObjectHandle) -> Option<u16> {
        let parent_level = self.store.resolve(parent)?.hierarchy_level;
        let child_level = self.store.resolve(child)?.hierarchy_level;
        let height = self
            .descendants(child)
            .filter_map(|handle| self.store.resolve(handle))
            .map(|object| object.hierarchy_level - child_level)
            .max()
            .unwrap_or(0);
        parent_level.checked_add(1)?.checked_add(height)
    }

    /// First child (or descendant, with `recursive`) named `name`.
    #[must_use]
    pub fn find_child_by_name(
        &self,
        parent: ObjectHandle,
        name: &str,
        recursive: bool,
    ) -> Option<ObjectHandle> {
        let spur = self.names.get(name)?;
        let matches = |handle: &ObjectHandle| {
            self.store
                .resolve(*handle)
                .is_some_and(|object| object.name == Some(spur))
        };
        if recursive {
            self.descendants(parent).find(matches)
        } else {
            self.children(parent).find(matches)
        }
    }

    /// Sets the team id of `object` and its whole subtree.
    pub fn set_team_id(&mut self, object: ObjectHandle, team_id: u16) -> Result<()> {
        if !self.store.contains(object) {
            return Err(WorldError::InvalidHandle(object));
        }
        let mut subtree = vec![object];
        subtree.extend(self.descendants(object));
        for handle in subtree {
            if let Some(object) = self.store.resolve_mut(handle) {
                object.team_id = team_id;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Re-parenting
    // ========================================================================

    /// Moves `child` under `new_parent`, or makes it a root with `None`.
    ///
    /// The moved subtree gets its levels, global transforms, track and
    /// active state recomputed. Parenting an object under its own descendant
    /// is a contract violation and fails with [`WorldError::CyclicHierarchy`];
    /// a subtree that would not fit under the deepest level fails with
    /// [`WorldError::HierarchyTooDeep`].
    pub fn set_parent(
        &mut self,
        child: ObjectHandle,
        new_parent: Option<ObjectHandle>,
        preserve: Preserve,
    ) -> Result<()> {
        let old_parent = self
            .store
            .resolve(child)
            .ok_or(WorldError::InvalidHandle(child))?
            .parent;

        if let Some(parent) = new_parent {
            if !self.store.contains(parent) {
                return Err(WorldError::InvalidHandle(parent));
            }
            let has_children = self
                .store
                .resolve(child)
                .is_some_and(|object| object.first_child.is_some());
            if parent == child || (has_children && self.is_ancestor(child, parent)) {
                contract_violation(
                    self.config.strict_contracts,
                    &self.config.name,
                    format_args!("cannot parent {child:?} under its descendant {parent:?}"),
                );
                return Err(WorldError::CyclicHierarchy { child, parent });
            }
            if self.deepest_level_under(child, parent).is_none() {
                contract_violation(
                    self.config.strict_contracts,
                    &self.config.name,
                    format_args!("parenting {child:?} under {parent:?} overflows the hierarchy depth"),
                );
                return Err(WorldError::HierarchyTooDeep { child, parent });
            }
        }
        if old_parent == new_parent {
            return Ok(());
        }

        let counter = self.update_counter;
        let preserved = match preserve {
            Preserve::Global => transform_system::resolved_global(&self.store, child, counter),
            Preserve::Local => None,
        };

        self.unlink_from_parent(child);
        if let Some(parent) = new_parent {
            self.link_child(child, parent);
        }
        self.relevel_subtree(child);

        // Transforms
        let parent_global =
            new_parent.and_then(|parent| transform_system::resolved_global(&self.store, parent, counter));
        if let Some(global) = preserved
            && let Some(object) = self.store.resolve_mut(child)
        {
            object.transform.set_global(global);
            object.transform.update_local_from_parent(parent_global.as_ref());
        }
        transform_system::update_subtree(
            &mut self.store,
            child,
            parent_global.as_ref(),
            counter,
            &mut self.spatial,
        );

        // Classification
        let parent_dynamic = new_parent
            .and_then(|parent| self.store.resolve(parent))
            .is_some_and(GameObject::is_dynamic);
        if parent_dynamic {
            self.propagate_dynamic(child);
        } else {
            self.conditional_make_static(child, None);
        }

        self.refresh_active_state(child);

        log::debug!(
            "[{}] re-parented {child:?}: {old_parent:?} -> {new_parent:?}",
            self.config.name
        );

        if let Some(parent) = old_parent {
            self.notify_children_changed(parent, ChangeKind::Removed, child);
        }
        if let Some(parent) = new_parent {
            self.notify_children_changed(parent, ChangeKind::Added, child);
        }
        Ok(())
    }

    /// Unlinks `child` from its parent and tells the parent about it.
    pub(crate) fn detach_from_parent(&mut self, child: ObjectHandle) {
        if let Some(parent) = self.unlink_from_parent(child) {
            self.notify_children_changed(parent, ChangeKind::Removed, child);
        }
    }

    /// O(1) removal from the parent's sibling list. Returns the old parent.
    fn unlink_from_parent(&mut self, child: ObjectHandle) -> Option<ObjectHandle> {
        let object = self.store.resolve_mut(child)?;
        let parent = object.parent.take()?;
        let prev = object.prev_sibling.take();
        let next = object.next_sibling.take();

        match prev {
            Some(prev) => {
                if let Some(sibling) = self.store.resolve_mut(prev) {
                    sibling.next_sibling = next;
                }
            }
            None => {
                if let Some(parent) = self.store.resolve_mut(parent) {
                    parent.first_child = next;
                }
            }
        }
        match next {
            Some(next) => {
                if let Some(sibling) = self.store.resolve_mut(next) {
                    sibling.prev_sibling = prev;
                }
            }
            None => {
                if let Some(parent) = self.store.resolve_mut(parent) {
                    parent.last_child = prev;
                }
            }
        }
        if let Some(parent) = self.store.resolve_mut(parent) {
            parent.child_count -= 1;
        }
        Some(parent)
    }

    /// Appends `child` (currently a root) as the last child of `parent`.
    fn link_child(&mut self, child: ObjectHandle, parent: ObjectHandle) {
        let Some(last) = self.store.resolve(parent).map(GameObject::last_child) else {
            return;
        };

        if let Some(object) = self.store.resolve_mut(child) {
            object.parent = Some(parent);
            object.prev_sibling = last;
            object.next_sibling = None;
        }
        if let Some(last) = last
            && let Some(sibling) = self.store.resolve_mut(last)
        {
            sibling.next_sibling = Some(child);
        }
        if let Some(parent) = self.store.resolve_mut(parent) {
            if last.is_none() {
                parent.first_child = Some(child);
            }
            parent.last_child = Some(child);
            parent.child_count += 1;
        }
    }

    /// Recomputes `hierarchy_level` below the (new) parent of `root` and moves
    /// every object whose level changed to its new batch.
    fn relevel_subtree(&mut self, root: ObjectHandle) {
        let Some(object) = self.store.resolve(root) else {
            return;
        };
        let level = object
            .parent
            .and_then(|parent| self.store.resolve(parent))
            .map_or(0, |parent| parent.hierarchy_level + 1);

        let mut stack = vec![(root, level)];
        while let Some((handle, level)) = stack.pop() {
            let Some(object) = self.store.resolve_mut(handle) else {
                continue;
            };
            if object.hierarchy_level != level {
                object.hierarchy_level = level;
                self.relink(handle);
            }
            let mut child = self.store.resolve(handle).and_then(GameObject::first_child);
            while let Some(handle) = child {
                stack.push((handle, level + 1));
                child = self.store.resolve(handle).and_then(GameObject::next_sibling);
            }
        }
    }

    fn notify_children_changed(&mut self, parent: ObjectHandle, kind: ChangeKind, child: ObjectHandle) {
        let wants_notice = self
            .store
            .resolve(parent)
            .is_some_and(|object| object.flags.contains(ObjectFlags::CHILDREN_CHANGE_NOTIFY));
        if wants_notice {
            self.send(parent, &mut ChildrenChanged { kind, parent, child });
        }
    }

    // ========================================================================
    // Level tracks
    // ========================================================================

    /// Puts `handle` into the batch matching its current track and level.
    pub(crate) fn relink(&mut self, handle: ObjectHandle) {
        let Some(object) = self.store.resolve(handle) else {
            return;
        };
        let track = if object.is_dynamic() {
            Track::Dynamic
        } else {
            Track::Static
        };
        let level = object.hierarchy_level;
        let old = object.transform.slot;

        if old.is_some_and(|slot| slot.track == track && slot.level == level) {
            return;
        }
        if let Some(old) = old {
            self.unlink_slot(old);
        }
        let slot = self.levels.link(handle, track, level);
        if let Some(object) = self.store.resolve_mut(handle) {
            object.transform.slot = Some(slot);
        }
    }

    /// Frees `slot`, patching the object swapped into it.
    pub(crate) fn unlink_slot(&mut self, slot: LevelSlot) {
        if let Some(moved) = self.levels.unlink(slot)
            && let Some(object) = self.store.resolve_mut(moved)
        {
            object.transform.slot = Some(slot);
        }
    }

    /// Switches `handle` to the static or dynamic track and re-derives its
    /// cached transform data for the new mode.
    ///
    /// Becoming static recomputes the global transform from the parent's
    /// cached one, which is current because the parent is static as well.
    pub(crate) fn recreate_hierarchy_data(&mut self, handle: ObjectHandle, make_static: bool) {
        let Some(object) = self.store.resolve(handle) else {
            return;
        };
        let parent_global = object
            .parent
            .and_then(|parent| self.store.resolve(parent))
            .map(|parent| parent.transform.global);

        let counter = self.update_counter;
        let Some(object) = self.store.resolve_mut(handle) else {
            return;
        };
        object.set_flag(ObjectFlags::DYNAMIC, !make_static);
        if make_static {
            object.transform.update_global_from_parent(parent_global.as_ref());
            object.transform.update_global_bounds();
        }
        object.transform.update_counter = counter;
        object.transform.reset_motion();

        if make_static {
            transform_system::push_bounds(&mut self.spatial, &object.transform);
        }
        self.relink(handle);

        log::debug!(
            "[{}] {handle:?} is now {}",
            self.config.name,
            if make_static { "static" } else { "dynamic" }
        );
    }

    // ========================================================================
    // Static / dynamic classification
    // ========================================================================

    /// Whether `object` must be dynamic, not counting component `ignoring`.
    /// Pure: reads current state only.
    #[must_use]
    pub fn determine_dynamic(&self, object: ObjectHandle, ignoring: Option<ComponentHandle>) -> bool {
        let Some(object) = self.store.resolve(object) else {
            return false;
        };
        if object.is_force_dynamic() {
            return true;
        }
        if object
            .parent
            .and_then(|parent| self.store.resolve(parent))
            .is_some_and(GameObject::is_dynamic)
        {
            return true;
        }
        object.components.iter().any(|&component| {
            Some(component) != ignoring
                && self
                    .components
                    .get(component)
                    .is_some_and(|slot| slot.component.is_dynamic())
        })
    }

    /// Forces `object` dynamic until [`World::make_static`]. Idempotent.
    pub fn make_dynamic(&mut self, object: ObjectHandle) -> Result<()> {
        self.set_force_dynamic(object, true)
    }

    /// Drops the force-dynamic override and turns `object` (and whatever of
    /// its subtree is eligible) static. Objects with another reason to be
    /// dynamic stay dynamic. Idempotent.
    pub fn make_static(&mut self, object: ObjectHandle) -> Result<()> {
        self.set_force_dynamic(object, false)
    }

    pub fn set_force_dynamic(&mut self, object: ObjectHandle, force: bool) -> Result<()> {
        let target = self
            .store
            .resolve_mut(object)
            .ok_or(WorldError::InvalidHandle(object))?;
        target.set_flag(ObjectFlags::FORCE_DYNAMIC, force);

        if force {
            self.propagate_dynamic(object);
        } else {
            self.conditional_make_static(object, None);
        }
        Ok(())
    }

    /// Turns `object` and its whole subtree dynamic, leaving `FORCE_DYNAMIC`
    /// untouched.
    pub(crate) fn propagate_dynamic(&mut self, object: ObjectHandle) {
        let mut stack: SmallVec<[ObjectHandle; 16]> = SmallVec::new();
        stack.push(object);

        while let Some(handle) = stack.pop() {
            let Some(current) = self.store.resolve(handle) else {
                continue;
            };
            // Children of a dynamic object are already dynamic
            if current.is_dynamic() {
                continue;
            }
            self.recreate_hierarchy_data(handle, false);
            stack.extend(self.children(handle));
        }
    }

    /// Turns `object` static if nothing keeps it dynamic (ignoring component
    /// `ignoring`), then re-checks its children. Recursion stops at children
    /// that stay dynamic for their own reasons.
    pub fn conditional_make_static(&mut self, object: ObjectHandle, ignoring: Option<ComponentHandle>) {
        let mut stack: SmallVec<[(ObjectHandle, Option<ComponentHandle>); 16]> = SmallVec::new();
        stack.push((object, ignoring));

        while let Some((handle, ignoring)) = stack.pop() {
            let Some(current) = self.store.resolve(handle) else {
                continue;
            };
            if current.is_static() || self.determine_dynamic(handle, ignoring) {
                continue;
            }
            self.recreate_hierarchy_data(handle, true);
            stack.extend(self.children(handle).map(|child| (child, None)));
        }
    }
}
