//! Axis-aligned bounding boxes.

use glam::{Mat4, Vec3};

/// Axis-aligned bounding box in the space of whoever owns it.
///
/// Draw groups carry a local-space box that is transformed to world space
/// before culling; instanced groups carry a caller-supplied combined box
/// that is already in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BoundingBox {
    /// The inverted box: `merge`-identity, contains nothing.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// The unit cube centered on the origin (decal proxy geometry).
    pub const UNIT_CUBE: Self = Self {
        min: Vec3::splat(-0.5),
        max: Vec3::splat(0.5),
    };

    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Returns `true` when the box contains no volume (never initialized
    /// or degenerate).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Smallest box containing both `self` and `other`.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Smallest box containing `point` in addition to `self`.
    #[must_use]
    pub fn expand(&self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// Axis-aligned box enclosing this box after an affine transform.
    ///
    /// Uses the Arvo method: accumulate per-axis extents through the
    /// absolute rotation/scale part of the matrix.
    #[must_use]
    pub fn transform(&self, matrix: &Mat4) -> Self {
        let translation = matrix.w_axis.truncate();
        let mut min = translation;
        let mut max = translation;

        let basis = [
            matrix.x_axis.truncate(),
            matrix.y_axis.truncate(),
            matrix.z_axis.truncate(),
        ];

        for (axis, column) in basis.iter().enumerate() {
            let a = *column * self.min[axis];
            let b = *column * self.max[axis];
            min += a.min(b);
            max += a.max(b);
        }

        Self { min, max }
    }

    /// Overlap test against another box (used for the coarse light-volume
    /// check in the forward pass; touching counts as overlapping).
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_merges_as_identity() {
        let b = BoundingBox::new(Vec3::NEG_ONE, Vec3::ONE);
        assert_eq!(BoundingBox::EMPTY.merge(&b), b);
    }

    #[test]
    fn transform_translates_extents() {
        let b = BoundingBox::new(Vec3::NEG_ONE, Vec3::ONE);
        let moved = b.transform(&Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        assert_eq!(moved.min, Vec3::new(9.0, -1.0, -1.0));
        assert_eq!(moved.max, Vec3::new(11.0, 1.0, 1.0));
    }

    #[test]
    fn transform_handles_rotation_conservatively() {
        let b = BoundingBox::new(Vec3::NEG_ONE, Vec3::ONE);
        let rotated = b.transform(&Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4));
        // A rotated unit box must still be fully contained.
        assert!(rotated.min.x <= -1.0 && rotated.max.x >= 1.0);
    }

    #[test]
    fn overlap_is_inclusive_of_touching_faces() {
        let a = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        let b = BoundingBox::new(Vec3::ONE, Vec3::splat(2.0));
        assert!(a.overlaps(&b));
    }
}
