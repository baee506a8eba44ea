use glam::{Affine3A, EulerRot, Mat3, Quat, Vec3};

use crate::world::bounds::BoundingVolume;
use crate::world::levels::LevelSlot;
use crate::world::spatial::{SpatialCategory, SpatialDataHandle};

/// Translation, rotation and non-uniform scale.
///
/// Composition is component-wise: rotations multiply, scales multiply per
/// axis and the child's position is scaled, rotated and offset by the parent.
/// [`Transform::relative_to`] is the exact inverse of [`Transform::compose`],
/// so a global transform survives a round trip through any parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub const fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    #[must_use]
    pub const fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    #[must_use]
    pub const fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::ONE,
        }
    }

    // ========================================================================
    // Composition
    // ========================================================================

    /// `self ∘ local`: places `local`, expressed in this transform's space,
    /// into the space this transform is expressed in.
    #[must_use]
    pub fn compose(&self, local: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * (self.scale * local.position),
            rotation: (self.rotation * local.rotation).normalize(),
            scale: self.scale * local.scale,
        }
    }

    /// `inverse(parent) ∘ self`: expresses this (global) transform relative
    /// to `parent`.
    ///
    /// Zero scale axes on the parent are undefined territory; callers keep
    /// transforms finite and non-degenerate.
    #[must_use]
    pub fn relative_to(&self, parent: &Transform) -> Transform {
        let inv_rotation = parent.rotation.inverse();
        Transform {
            position: (inv_rotation * (self.position - parent.position)) / parent.scale,
            rotation: (inv_rotation * self.rotation).normalize(),
            scale: self.scale / parent.scale,
        }
    }

    /// Maps a point from this transform's local space into its parent space.
    #[inline]
    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * (self.scale * point)
    }

    /// Rotates and scales a direction, ignoring translation.
    #[inline]
    #[must_use]
    pub fn transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation * (self.scale * direction)
    }

    /// Matrix form, used for bounds and by renderers.
    #[inline]
    #[must_use]
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Decomposes a matrix. Shear is lost.
    #[must_use]
    pub fn from_affine(matrix: &Affine3A) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Compares with tolerance `epsilon` per component. Quaternions `q` and
    /// `-q` are considered equal.
    #[must_use]
    pub fn abs_diff_eq(&self, other: &Transform, epsilon: f32) -> bool {
        self.position.abs_diff_eq(other.position, epsilon)
            && self.scale.abs_diff_eq(other.scale, epsilon)
            && (self.rotation.abs_diff_eq(other.rotation, epsilon)
                || self.rotation.abs_diff_eq(-other.rotation, epsilon))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Sets rotation from Euler angles (XYZ order, radians).
    pub fn set_rotation_euler(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Quat::from_euler(EulerRot::XYZ, x, y, z);
    }

    /// Current rotation as Euler angles (XYZ order).
    #[must_use]
    pub fn rotation_euler(&self) -> Vec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z)
    }

    /// Rotates so that -Z points at `target`. `target` and `up` are in the
    /// same space as this transform. Degenerate input (target on the
    /// position, or straight along `up`) leaves the rotation untouched.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let offset = target - self.position;
        if offset.length_squared() < 1e-8 {
            return;
        }
        let forward = offset.normalize();
        if forward.cross(up).length_squared() < 1e-4 {
            return;
        }

        let right = forward.cross(up).normalize();
        let new_up = right.cross(forward).normalize();
        let rot_mat = Mat3::from_cols(right, new_up, -forward);
        self.rotation = Quat::from_mat3(&rot_mat);
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.compose(&rhs)
    }
}

// ============================================================================
// Per-object transform block
// ============================================================================

/// Finite-difference velocity of a dynamic object.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity {
    /// Units per second.
    pub linear: Vec3,
    /// Axis scaled by radians per second.
    pub angular: Vec3,
}

/// Transform, bounds and bookkeeping owned exclusively by one object.
#[derive(Debug, Clone)]
pub struct TransformData {
    // === Local Space ===
    pub(crate) local: Transform,
    pub(crate) local_bounds: BoundingVolume,

    // === Global Space (cached) ===
    pub(crate) global: Transform,
    pub(crate) global_matrix: Affine3A,
    pub(crate) global_bounds: BoundingVolume,

    // === Velocity ===
    pub(crate) last_global: Transform,
    pub(crate) velocity: Velocity,

    // === Spatial Index ===
    pub(crate) spatial_data: Option<SpatialDataHandle>,
    pub(crate) spatial_category: SpatialCategory,
    pub(crate) always_visible: bool,

    // === Bookkeeping ===
    /// Update counter of the tick that last refreshed `global`.
    pub(crate) update_counter: u64,
    /// Position inside the world's level batches.
    pub(crate) slot: Option<LevelSlot>,
}

impl TransformData {
    /// Counter value that never matches a real tick.
    pub(crate) const STALE: u64 = u64::MAX;

    #[must_use]
    pub fn new() -> Self {
        Self {
            local: Transform::IDENTITY,
            local_bounds: BoundingVolume::INVALID,
            global: Transform::IDENTITY,
            global_matrix: Affine3A::IDENTITY,
            global_bounds: BoundingVolume::INVALID,
            last_global: Transform::IDENTITY,
            velocity: Velocity::default(),
            spatial_data: None,
            spatial_category: SpatialCategory::NONE,
            always_visible: false,
            update_counter: 0,
            slot: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn local(&self) -> &Transform {
        &self.local
    }

    #[inline]
    #[must_use]
    pub fn global(&self) -> &Transform {
        &self.global
    }

    #[inline]
    #[must_use]
    pub fn global_matrix(&self) -> &Affine3A {
        &self.global_matrix
    }

    #[inline]
    #[must_use]
    pub fn local_bounds(&self) -> &BoundingVolume {
        &self.local_bounds
    }

    #[inline]
    #[must_use]
    pub fn global_bounds(&self) -> &BoundingVolume {
        &self.global_bounds
    }

    #[inline]
    #[must_use]
    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    #[inline]
    #[must_use]
    pub fn spatial_data(&self) -> Option<SpatialDataHandle> {
        self.spatial_data
    }

    #[inline]
    #[must_use]
    pub fn update_counter(&self) -> u64 {
        self.update_counter
    }

    /// Writes the global transform and refreshes the cached matrix.
    pub(crate) fn set_global(&mut self, global: Transform) {
        self.global = global;
        self.global_matrix = global.to_affine();
    }

    /// `global = parent ∘ local`, or `global = local` for roots.
    pub(crate) fn update_global_from_parent(&mut self, parent: Option<&Transform>) {
        let global = match parent {
            Some(parent) => parent.compose(&self.local),
            None => self.local,
        };
        self.set_global(global);
    }

    /// `local = inverse(parent) ∘ global`, or `local = global` for roots.
    pub(crate) fn update_local_from_parent(&mut self, parent: Option<&Transform>) {
        self.local = match parent {
            Some(parent) => self.global.relative_to(parent),
            None => self.global,
        };
    }

    /// Recomputes `global_bounds` from `local_bounds` and the cached matrix.
    pub(crate) fn update_global_bounds(&mut self) {
        self.global_bounds = if self.local_bounds.is_valid() {
            self.local_bounds.transform(&self.global_matrix)
        } else {
            BoundingVolume::INVALID
        };
    }

    /// Derives velocity from the previous global transform.
    pub(crate) fn update_velocity(&mut self, inv_dt: f32) {
        let linear = (self.global.position - self.last_global.position) * inv_dt;

        let delta = (self.global.rotation * self.last_global.rotation.inverse()).normalize();
        // Shortest arc
        let delta = if delta.w < 0.0 { -delta } else { delta };
        let (axis, angle) = delta.to_axis_angle();
        let angular = if angle.abs() > f32::EPSILON {
            axis * angle * inv_dt
        } else {
            Vec3::ZERO
        };

        self.velocity = Velocity { linear, angular };
        self.last_global = self.global;
    }

    /// Forgets motion history, used when an object switches tracks.
    pub(crate) fn reset_motion(&mut self) {
        self.last_global = self.global;
        self.velocity = Velocity::default();
    }

    /// Forces the next on-demand refresh to recompute `global`.
    #[inline]
    pub(crate) fn invalidate(&mut self) {
        self.update_counter = Self::STALE;
    }

    #[inline]
    pub(crate) fn is_current(&self, counter: u64) -> bool {
        self.update_counter == counter
    }
}

impl Default for TransformData {
    fn default() -> Self {
        Self::new()
    }
}
