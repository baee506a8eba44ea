//! World Configuration
//!
//! [`WorldConfig`] collects the knobs that change how a [`World`](super::World)
//! reacts to structural operations. Every field has a sensible default, so
//! typical code only overrides what it needs:
//!
//! ```rust,ignore
//! use scenegraph::{WorldConfig, ChildPolicy};
//!
//! let config = WorldConfig {
//!     child_policy: ChildPolicy::PromoteToRoot,
//!     track_velocity: true,
//!     ..Default::default()
//! };
//! let world = World::new(config);
//! ```

use glam::Vec3;

// ---------------------------------------------------------------------------
// ChildPolicy
// ---------------------------------------------------------------------------

/// What happens to the children of an object that is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildPolicy {
    /// The whole subtree is destroyed, leaves first.
    #[default]
    DestroyRecursive,
    /// Children move to the destroyed object's parent (or become roots),
    /// keeping their global transform.
    ReparentToGrandparent,
    /// Children become roots, keeping their global transform.
    PromoteToRoot,
}

// ---------------------------------------------------------------------------
// CoordinateSystem
// ---------------------------------------------------------------------------

/// Axis convention used by the direction helpers
/// ([`World::global_dir_forward`](super::World::global_dir_forward) and friends).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateSystem {
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl Default for CoordinateSystem {
    /// Right-handed, Y-up, looking down -Z.
    fn default() -> Self {
        Self {
            forward: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
        }
    }
}

// ---------------------------------------------------------------------------
// WorldConfig
// ---------------------------------------------------------------------------

/// Behavioural settings of a world.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Shown in every log line emitted by this world.
    pub name: String,

    /// Panic on contract violations (cyclic re-parenting, attaching a dynamic
    /// component to a static object, destroying a dead handle).
    ///
    /// When `false` the violation is logged and the operation becomes a no-op.
    /// Defaults to `cfg!(debug_assertions)`.
    pub strict_contracts: bool,

    /// Warn when a static object is moved after the first
    /// [`World::update`](super::World::update).
    pub report_static_moves: bool,

    /// Keep the previous tick's global transform of dynamic objects and derive
    /// linear/angular velocity from it.
    pub track_velocity: bool,

    /// Default policy used by [`World::destroy`](super::World::destroy).
    pub child_policy: ChildPolicy,

    pub coordinate_system: CoordinateSystem,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: String::from("World"),
            strict_contracts: cfg!(debug_assertions),
            report_static_moves: true,
            track_velocity: false,
            child_policy: ChildPolicy::default(),
            coordinate_system: CoordinateSystem::default(),
        }
    }
}

impl WorldConfig {
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_strict_contracts(mut self, strict: bool) -> Self {
        self.strict_contracts = strict;
        self
    }

    #[must_use]
    pub fn with_velocity_tracking(mut self, enabled: bool) -> Self {
        self.track_velocity = enabled;
        self
    }

    #[must_use]
    pub fn with_child_policy(mut self, policy: ChildPolicy) -> Self {
        self.child_policy = policy;
        self
    }

    #[must_use]
    pub fn with_static_move_reports(mut self, enabled: bool) -> Self {
        self.report_static_moves = enabled;
        self
    }

    #[must_use]
    pub fn with_coordinate_system(mut self, coordinate_system: CoordinateSystem) -> Self {
        self.coordinate_system = coordinate_system;
        self
    }
}
