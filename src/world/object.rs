use bitflags::bitflags;
use lasso::Spur;
use smallvec::SmallVec;

use crate::world::transform::{Transform, TransformData};
use crate::world::{ComponentHandle, ObjectHandle};

/// Components stored inline before the list spills to the heap.
pub const INLINE_COMPONENTS: usize = 4;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ObjectFlags: u16 {
        /// User intent: the object wants to be active.
        const ACTIVE_FLAG = 1 << 0;
        /// Derived: `ACTIVE_FLAG` and every ancestor active.
        const ACTIVE_STATE = 1 << 1;
        /// Derived: the object lives on the dynamic transform track.
        const DYNAMIC = 1 << 2;
        /// User override keeping the object dynamic.
        const FORCE_DYNAMIC = 1 << 3;
        const STATIC_TRANSFORM_CHANGE_NOTIFY = 1 << 4;
        const COMPONENT_CHANGE_NOTIFY = 1 << 5;
        const CHILDREN_CHANGE_NOTIFY = 1 << 6;
    }
}

/// Monotonic version counter, bumped on every component add/remove.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeTracker {
    version: u32,
}

impl ChangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self { version: 0 }
    }

    /// Marks as modified.
    pub fn changed(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }
}

/// One object of the world.
///
/// # Hierarchy
///
/// Children form a doubly linked list threaded through the children
/// themselves (`first_child`/`last_child` on the parent, `prev_sibling`/
/// `next_sibling` on each child), so detaching is O(1) and never touches
/// unrelated handles. Links are plain handles: they describe relations, not
/// ownership.
///
/// # Transform
///
/// [`TransformData`] is owned exclusively by the object. It holds the local
/// transform, the cached global transform and bounds, and the bookkeeping the
/// transform system needs to decide whether the cache is current.
///
/// All mutation goes through [`World`](super::World) so that the derived
/// state (levels, dynamic flag, active state) stays consistent.
#[derive(Debug, Clone)]
pub struct GameObject {
    // === Hierarchy ===
    pub(crate) parent: Option<ObjectHandle>,
    pub(crate) first_child: Option<ObjectHandle>,
    pub(crate) last_child: Option<ObjectHandle>,
    pub(crate) next_sibling: Option<ObjectHandle>,
    pub(crate) prev_sibling: Option<ObjectHandle>,
    pub(crate) child_count: u32,
    pub(crate) hierarchy_level: u16,

    // === Identity ===
    pub(crate) name: Option<Spur>,
    pub(crate) global_key: Option<String>,
    pub(crate) team_id: u16,
    pub(crate) tags: u64,
    pub(crate) flags: ObjectFlags,

    // === Components ===
    pub(crate) components: SmallVec<[ComponentHandle; INLINE_COMPONENTS]>,
    pub(crate) components_version: ChangeTracker,

    // === Spatial ===
    pub(crate) transform: TransformData,
}

impl GameObject {
    /// An empty, active, static root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
            child_count: 0,
            hierarchy_level: 0,
            name: None,
            global_key: None,
            team_id: 0,
            tags: 0,
            flags: ObjectFlags::ACTIVE_FLAG | ObjectFlags::ACTIVE_STATE,
            components: SmallVec::new(),
            components_version: ChangeTracker::new(),
            transform: TransformData::new(),
        }
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<ObjectHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn first_child(&self) -> Option<ObjectHandle> {
        self.first_child
    }

    #[inline]
    #[must_use]
    pub fn last_child(&self) -> Option<ObjectHandle> {
        self.last_child
    }

    #[inline]
    #[must_use]
    pub fn next_sibling(&self) -> Option<ObjectHandle> {
        self.next_sibling
    }

    #[inline]
    #[must_use]
    pub fn prev_sibling(&self) -> Option<ObjectHandle> {
        self.prev_sibling
    }

    #[inline]
    #[must_use]
    pub fn child_count(&self) -> u32 {
        self.child_count
    }

    /// Depth below the nearest ancestor without a parent.
    #[inline]
    #[must_use]
    pub fn hierarchy_level(&self) -> u16 {
        self.hierarchy_level
    }

    // ========================================================================
    // Identity & State
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn global_key(&self) -> Option<&str> {
        self.global_key.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn team_id(&self) -> u16 {
        self.team_id
    }

    #[inline]
    #[must_use]
    pub fn tags(&self) -> u64 {
        self.tags
    }

    #[inline]
    #[must_use]
    pub fn flags(&self) -> ObjectFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.flags.contains(ObjectFlags::DYNAMIC)
    }

    #[inline]
    #[must_use]
    pub fn is_static(&self) -> bool {
        !self.is_dynamic()
    }

    #[inline]
    #[must_use]
    pub fn is_force_dynamic(&self) -> bool {
        self.flags.contains(ObjectFlags::FORCE_DYNAMIC)
    }

    /// What the user asked for.
    #[inline]
    #[must_use]
    pub fn active_flag(&self) -> bool {
        self.flags.contains(ObjectFlags::ACTIVE_FLAG)
    }

    /// Whether the object and all its ancestors are active.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.flags.contains(ObjectFlags::ACTIVE_STATE)
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// Attached components, in attach order modulo swap-removals.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[ComponentHandle] {
        &self.components
    }

    /// Bumped on every add/remove; use it to invalidate cached lookups.
    #[inline]
    #[must_use]
    pub fn components_version(&self) -> u32 {
        self.components_version.version()
    }

    // ========================================================================
    // Transform
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn transform_data(&self) -> &TransformData {
        &self.transform
    }

    #[inline]
    #[must_use]
    pub fn local_transform(&self) -> &Transform {
        &self.transform.local
    }

    /// Cached global transform. For dynamic objects this is the value of the
    /// last tick (or the last explicit refresh).
    #[inline]
    #[must_use]
    pub fn global_transform(&self) -> &Transform {
        &self.transform.global
    }

    #[inline]
    pub(crate) fn set_flag(&mut self, flag: ObjectFlags, enabled: bool) {
        self.flags.set(flag, enabled);
    }
}

impl Default for GameObject {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_object_is_active_static_root() {
        let object = GameObject::new();
        assert!(object.active_flag());
        assert!(object.is_active());
        assert!(object.is_static());
        assert!(object.parent().is_none());
        assert_eq!(object.child_count(), 0);
        assert_eq!(object.hierarchy_level(), 0);
        assert!(object.components().is_empty());
    }

    #[test]
    fn change_tracker_increments() {
        let mut tracker = ChangeTracker::new();
        tracker.changed();
        tracker.changed();
        assert_eq!(tracker.version(), 2);
    }
}
