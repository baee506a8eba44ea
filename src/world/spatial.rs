//! Spatial index boundary.
//!
//! The world never looks inside the spatial index. It only registers object
//! bounds, pushes bound updates after transform changes and removes entries
//! when objects go away.

use bitflags::bitflags;
use slotmap::new_key_type;

use crate::world::ObjectHandle;
use crate::world::bounds::BoundingVolume;

new_key_type! {
    /// Opaque entry in an external spatial index.
    pub struct SpatialDataHandle;
}

bitflags! {
    /// Bit mask of visibility categories an object belongs to.
    ///
    /// Category bits are assigned by the spatial system, so every bit is a
    /// valid flag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SpatialCategory: u32 {
        const _ = !0;
    }
}

impl SpatialCategory {
    pub const NONE: Self = Self::empty();

    /// Category for a single registered bit (`0..32`).
    #[must_use]
    pub const fn from_bit(bit: u8) -> Self {
        Self::from_bits_retain(1 << bit)
    }

    #[must_use]
    pub const fn from_mask(mask: u32) -> Self {
        Self::from_bits_retain(mask)
    }

    #[must_use]
    pub const fn mask(self) -> u32 {
        self.bits()
    }
}

/// Interface consumed from the spatial system (culling / visibility queries).
pub trait SpatialSystem {
    /// Registers world-space `bounds` for `object`.
    fn create_spatial_data(
        &mut self,
        bounds: &BoundingVolume,
        object: ObjectHandle,
        category: SpatialCategory,
        tags: u64,
    ) -> SpatialDataHandle;

    /// Registers `object` as visible regardless of bounds.
    fn create_spatial_data_always_visible(
        &mut self,
        object: ObjectHandle,
        category: SpatialCategory,
        tags: u64,
    ) -> SpatialDataHandle;

    fn update_spatial_data_bounds(&mut self, handle: SpatialDataHandle, bounds: &BoundingVolume);

    fn delete_spatial_data(&mut self, handle: SpatialDataHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_bits_combine() {
        let a = SpatialCategory::from_bit(0);
        let b = SpatialCategory::from_bit(3);
        let mut both = a | b;
        assert_eq!(both.mask(), 0b1001);
        assert!(both.contains(a));
        both |= SpatialCategory::from_bit(1);
        assert_eq!(both.mask(), 0b1011);
        assert!(SpatialCategory::NONE.is_empty());
        assert_eq!(SpatialCategory::from_mask(0x8000_0001).mask(), 0x8000_0001);
    }
}
