#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! Game object hierarchy core.
//!
//! A [`World`] owns a generation-checked arena of [`GameObject`]s linked into
//! parent/child hierarchies. Objects live on one of two transform tracks:
//! static objects cache their global transform until explicitly moved, dynamic
//! objects are recomputed every [`World::update`]. Components attach to objects
//! through a small inline slot list and receive messages routed by the world.

pub mod errors;
pub mod world;

pub use errors::{Result, WorldError};
pub use world::{
    BoundingBox, BoundingSphere, BoundingVolume, ChildPolicy, Component, ComponentHandle,
    ComponentLookup, CoordinateSystem, GameObject, Message, MessageContext, ObjectDesc,
    ObjectFlags, ObjectHandle, Preserve, SpatialCategory, SpatialDataHandle, SpatialSystem, Track,
    Transform, World, WorldConfig,
};
