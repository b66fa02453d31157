//! Frustum plane extraction and intersection tests.
//!
//! Planes are extracted from a view-projection matrix with the
//! Gribb–Hartmann method and stored as `(normal, d)` in [`glam::Vec4`] form,
//! normalized so plane distances are in world units. A point is inside a
//! plane when `dot(normal, p) + d >= 0`.

use glam::{Mat4, Vec3, Vec4};

use crate::math::BoundingBox;

/// Six view-frustum planes: Left, Right, Bottom, Top, Near, Far.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extracts planes from a reverse-Z view-projection matrix
    /// (wgpu NDC, depth 1 at the near plane).
    ///
    /// Works for the infinite-far projection used by the main camera: the
    /// far constraint degenerates to "in front of infinity" and passes for
    /// every finite point ahead of the camera.
    #[must_use]
    pub fn from_matrix(view_projection: Mat4) -> Self {
        Self::extract(view_projection)
    }

    /// Extracts planes from a standard-Z matrix (depth 0 at near), as used
    /// by the shadow projections.
    #[must_use]
    pub fn from_matrix_standard_z(view_projection: Mat4) -> Self {
        // The clip-space constraints 0 <= z <= w are identical in both depth
        // conventions; only the near/far naming swaps. Extraction is shared.
        Self::extract(view_projection)
    }

    /// Shadow-caster variant for the (standard-Z) light projections: the
    /// near plane is disabled so geometry between the light and its near
    /// plane still casts into the map.
    #[must_use]
    pub fn from_matrix_shadow_caster(view_projection: Mat4) -> Self {
        let mut frustum = Self::extract(view_projection);
        // The `z >= 0` constraint is the near plane under standard-Z.
        // Replace it with an always-pass plane (distance +1 everywhere).
        frustum.planes[5] = Vec4::new(0.0, 0.0, 0.0, 1.0);
        frustum
    }

    fn extract(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] + rows[0], // Left
            rows[3] - rows[0], // Right
            rows[3] + rows[1], // Bottom
            rows[3] - rows[1], // Top
            rows[3] - rows[2], // z <= w (near under reverse-Z, far under standard-Z)
            rows[2],           // z >= 0 (far under reverse-Z, near under standard-Z)
        ];

        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > f32::EPSILON {
                *plane /= length;
            }
        }

        Self { planes }
    }

    /// Sphere-vs-frustum test. Conservative: returns `true` for spheres
    /// that straddle a plane boundary.
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        for plane in &self.planes {
            let dist = plane.truncate().dot(center) + plane.w;
            if dist < -radius {
                return false;
            }
        }
        true
    }

    /// Box-vs-frustum test using the positive-vertex trick: for each plane,
    /// only the corner farthest along the plane normal needs testing.
    #[must_use]
    pub fn intersects_box(&self, min: Vec3, max: Vec3) -> bool {
        for plane in &self.planes {
            let normal = plane.truncate();
            let p_vertex = Vec3::new(
                if normal.x >= 0.0 { max.x } else { min.x },
                if normal.y >= 0.0 { max.y } else { min.y },
                if normal.z >= 0.0 { max.z } else { min.z },
            );
            if normal.dot(p_vertex) + plane.w < 0.0 {
                return false;
            }
        }
        true
    }

    /// [`intersects_box`](Self::intersects_box) over a [`BoundingBox`].
    #[must_use]
    #[inline]
    pub fn intersects_aabb(&self, aabb: &BoundingBox) -> bool {
        self.intersects_box(aabb.min, aabb.max)
    }
}
