//! Object Store
//!
//! Generation-checked arena of [`GameObject`]s. Freed slots are reused with a
//! bumped generation, so a handle to a destroyed object resolves to `None`
//! for the rest of the program.
//!
//! The store only knows about slots. Unlinking from the hierarchy and
//! releasing components happens in [`World::destroy`](super::World::destroy)
//! before the slot is handed back here.

use slotmap::SlotMap;

use crate::errors::{Result, WorldError};
use crate::world::ObjectHandle;
use crate::world::object::GameObject;

#[derive(Debug, Default)]
pub struct ObjectStore {
    objects: SlotMap<ObjectHandle, GameObject>,
}

impl ObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: SlotMap::with_key(),
        }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            objects: SlotMap::with_capacity_and_key(capacity),
        }
    }

    /// Allocates an empty object (no parent, no children, static, active).
    pub fn create(&mut self) -> (ObjectHandle, &mut GameObject) {
        let handle = self.objects.insert(GameObject::new());
        // Just inserted
        let object = &mut self.objects[handle];
        (handle, object)
    }

    /// `None` for stale handles.
    #[inline]
    #[must_use]
    pub fn resolve(&self, handle: ObjectHandle) -> Option<&GameObject> {
        self.objects.get(handle)
    }

    #[inline]
    pub fn resolve_mut(&mut self, handle: ObjectHandle) -> Option<&mut GameObject> {
        self.objects.get_mut(handle)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.objects.contains_key(handle)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectHandle, &GameObject)> {
        self.objects.iter()
    }

    pub fn handles(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.objects.keys()
    }

    /// Frees the slot and bumps its generation.
    ///
    /// Callers must have unlinked the object from the hierarchy first.
    pub(crate) fn release(&mut self, handle: ObjectHandle) -> Result<GameObject> {
        self.objects
            .remove(handle)
            .ok_or(WorldError::InvalidHandle(handle))
    }
}

impl std::ops::Index<ObjectHandle> for ObjectStore {
    type Output = GameObject;

    fn index(&self, handle: ObjectHandle) -> &GameObject {
        &self.objects[handle]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_resolves_to_none() {
        let mut store = ObjectStore::new();
        let (handle, _) = store.create();
        assert!(store.contains(handle));

        store.release(handle).unwrap();
        assert!(store.resolve(handle).is_none());
        assert!(matches!(
            store.release(handle),
            Err(WorldError::InvalidHandle(h)) if h == handle
        ));
    }

    #[test]
    fn reused_slot_does_not_alias() {
        let mut store = ObjectStore::new();
        let (old, _) = store.create();
        store.release(old).unwrap();

        let (new, _) = store.create();
        assert_ne!(old, new);
        assert!(store.resolve(old).is_none());
        assert!(store.resolve(new).is_some());
    }
}
