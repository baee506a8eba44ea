//! Bounding volumes
//!
//! Objects carry a local bounding volume (union of what their components
//! report) and a global one derived from the cached global matrix.

use glam::{Affine3A, Vec3};

/// Axis-aligned bounding box. An inverted box (`min > max`) is empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[must_use]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Transforms all eight corners and re-fits an axis-aligned box.
    #[must_use]
    pub fn transform(&self, matrix: &Affine3A) -> Self {
        if self.is_empty() {
            return *self;
        }

        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];

        let mut new_min = Vec3::splat(f32::INFINITY);
        let mut new_max = Vec3::splat(f32::NEG_INFINITY);
        for point in corners {
            let transformed = matrix.transform_point3(point);
            new_min = new_min.min(transformed);
            new_max = new_max.max(transformed);
        }

        Self {
            min: new_min,
            max: new_max,
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Bounding sphere. A negative radius marks it empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub const EMPTY: Self = Self {
        center: Vec3::ZERO,
        radius: -1.0,
    };

    #[must_use]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.radius < 0.0
    }

    /// Smallest sphere enclosing both.
    #[must_use]
    pub fn union(&self, other: &BoundingSphere) -> BoundingSphere {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }

        let offset = other.center - self.center;
        let distance = offset.length();
        if distance + other.radius <= self.radius {
            return *self;
        }
        if distance + self.radius <= other.radius {
            return *other;
        }

        let radius = (distance + self.radius + other.radius) * 0.5;
        let center = self.center + offset * ((radius - self.radius) / distance);
        BoundingSphere { center, radius }
    }

    /// Moves the center and scales the radius by the largest axis scale.
    #[must_use]
    pub fn transform(&self, matrix: &Affine3A) -> Self {
        if self.is_empty() {
            return *self;
        }

        let max_scale = matrix
            .matrix3
            .x_axis
            .length()
            .max(matrix.matrix3.y_axis.length())
            .max(matrix.matrix3.z_axis.length());

        Self {
            center: matrix.transform_point3(self.center),
            radius: self.radius * max_scale,
        }
    }
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Box and sphere kept together, as culling wants both.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingVolume {
    pub aabb: BoundingBox,
    pub sphere: BoundingSphere,
}

impl BoundingVolume {
    pub const INVALID: Self = Self {
        aabb: BoundingBox::EMPTY,
        sphere: BoundingSphere::EMPTY,
    };

    /// Box plus the sphere circumscribing it.
    #[must_use]
    pub fn from_box(aabb: BoundingBox) -> Self {
        if aabb.is_empty() {
            return Self::INVALID;
        }
        Self {
            aabb,
            sphere: BoundingSphere::new(aabb.center(), aabb.size().length() * 0.5),
        }
    }

    /// Sphere plus the box circumscribing it.
    #[must_use]
    pub fn from_sphere(sphere: BoundingSphere) -> Self {
        if sphere.is_empty() {
            return Self::INVALID;
        }
        Self {
            aabb: BoundingBox::from_center_half_extents(sphere.center, Vec3::splat(sphere.radius)),
            sphere,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.aabb.is_empty() && !self.sphere.is_empty()
    }

    #[must_use]
    pub fn union(&self, other: &BoundingVolume) -> BoundingVolume {
        if !self.is_valid() {
            return *other;
        }
        if !other.is_valid() {
            return *self;
        }
        BoundingVolume {
            aabb: self.aabb.union(&other.aabb),
            sphere: self.sphere.union(&other.sphere),
        }
    }

    #[must_use]
    pub fn transform(&self, matrix: &Affine3A) -> Self {
        if !self.is_valid() {
            return Self::INVALID;
        }
        Self {
            aabb: self.aabb.transform(matrix),
            sphere: self.sphere.transform(matrix),
        }
    }
}
