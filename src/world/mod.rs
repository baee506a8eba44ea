//! World module
//!
//! Owns the object hierarchy and everything hanging off it:
//! - GameObject / ObjectStore: generation-checked object arena
//! - Hierarchy: parent/child/sibling links and static/dynamic classification
//! - Transform / TransformSystem: local and global transforms, per-tick walk
//! - Component: per-object component slots and active-state propagation
//! - Message / Router: synchronous, recursive and upward message delivery
//! - World: the explicit context every operation runs against

pub mod bounds;
pub mod component;
pub mod config;
pub mod events;
pub mod hierarchy;
pub mod levels;
pub mod message;
pub mod object;
pub mod placement;
pub mod router;
pub mod spatial;
pub mod store;
pub mod transform;
pub mod transform_system;
#[allow(clippy::module_inception)]
pub mod world;
pub mod wrapper;

pub use bounds::{BoundingBox, BoundingSphere, BoundingVolume};
pub use component::{Component, ComponentLookup};
pub use config::{ChildPolicy, CoordinateSystem, WorldConfig};
pub use hierarchy::{Children, Descendants, Preserve};
pub use levels::{LevelOrderBatches, Track};
pub use message::{
    ChangeKind, ChildrenChanged, ComponentsChanged, DeleteObject, Message, MessageContext,
    TransformChanged, UpdateLocalBounds,
};
pub use object::{GameObject, ObjectFlags};
pub use router::ObjectHandler;
pub use spatial::{SpatialCategory, SpatialDataHandle, SpatialSystem};
pub use store::ObjectStore;
pub use transform::{Transform, TransformData, Velocity};
pub use world::{ObjectDesc, World};
pub use wrapper::ObjectMut;

use slotmap::new_key_type;

new_key_type! {
    /// Generation-checked reference to a slot in the [`ObjectStore`].
    ///
    /// Destroying an object bumps the slot's generation, so an old handle
    /// resolves to `None` instead of aliasing whatever reuses the slot.
    pub struct ObjectHandle;

    /// Generation-checked reference to a component owned by the [`World`].
    pub struct ComponentHandle;
}
