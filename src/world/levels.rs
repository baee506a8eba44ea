//! Level-ordered hierarchy storage
//!
//! Every object sits in exactly one batch: one batch per hierarchy level, one
//! set of batches per transform track. Walking a track level by level
//! guarantees that a parent's global transform is final before any of its
//! children read it.
//!
//! # Parallelization
//!
//! Objects within one level never depend on each other, so an external
//! scheduler may split each level across workers:
//!
//! ```ignore
//! for batch in world.level_batches(Track::Dynamic).batches() {
//!     // Safe: objects of the same level are independent
//!     batch.par_iter().for_each(|handle| { /* ... */ });
//! }
//! ```

use crate::world::ObjectHandle;

/// Transform track an object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    /// Global transform cached, only recomputed by explicit setters.
    Static,
    /// Global transform recomputed every tick.
    Dynamic,
}

/// Position of one object inside [`HierarchyStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelSlot {
    pub track: Track,
    pub level: u16,
    pub index: u32,
}

/// Objects grouped by hierarchy level; `batches[0]` holds level-0 objects.
#[derive(Debug, Default)]
pub struct LevelOrderBatches {
    batches: Vec<Vec<ObjectHandle>>,
}

impl LevelOrderBatches {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All levels, root level first.
    #[must_use]
    pub fn batches(&self) -> &[Vec<ObjectHandle>] {
        &self.batches
    }

    /// Objects at `level`, empty when the level does not exist.
    #[must_use]
    pub fn level(&self, level: u16) -> &[ObjectHandle] {
        self.batches
            .get(usize::from(level))
            .map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn total_objects(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// Number of levels, trailing empty levels excluded.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.batches.len()
    }

    pub(crate) fn insert(&mut self, level: u16, handle: ObjectHandle) -> u32 {
        let level = usize::from(level);
        if self.batches.len() <= level {
            self.batches.resize_with(level + 1, Vec::new);
        }
        let batch = &mut self.batches[level];
        batch.push(handle);
        (batch.len() - 1) as u32
    }

    /// Removes the entry at `index`, returning the handle that was moved into
    /// its place (if any).
    pub(crate) fn swap_remove(&mut self, level: u16, index: u32) -> Option<ObjectHandle> {
        let batch = self.batches.get_mut(usize::from(level))?;
        let index = index as usize;
        if index >= batch.len() {
            return None;
        }

        batch.swap_remove(index);
        let moved = batch.get(index).copied();

        while self.batches.last().is_some_and(Vec::is_empty) {
            self.batches.pop();
        }
        moved
    }
}

/// Static and dynamic level batches of a world.
#[derive(Debug, Default)]
pub struct HierarchyStorage {
    static_track: LevelOrderBatches,
    dynamic_track: LevelOrderBatches,
}

impl HierarchyStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn track(&self, track: Track) -> &LevelOrderBatches {
        match track {
            Track::Static => &self.static_track,
            Track::Dynamic => &self.dynamic_track,
        }
    }

    fn track_mut(&mut self, track: Track) -> &mut LevelOrderBatches {
        match track {
            Track::Static => &mut self.static_track,
            Track::Dynamic => &mut self.dynamic_track,
        }
    }

    pub(crate) fn link(&mut self, handle: ObjectHandle, track: Track, level: u16) -> LevelSlot {
        let index = self.track_mut(track).insert(level, handle);
        LevelSlot {
            track,
            level,
            index,
        }
    }

    /// Frees `slot`. The returned handle now occupies `slot.index` and its
    /// recorded slot must be patched by the caller.
    pub(crate) fn unlink(&mut self, slot: LevelSlot) -> Option<ObjectHandle> {
        self.track_mut(slot.track).swap_remove(slot.level, slot.index)
    }
}
