//! Camera and per-frame view state.
//!
//! [`Camera`] is the caller-facing projection/transform pair. At
//! `begin_frame` it is snapshotted into a [`ViewState`]: an immutable bundle
//! of matrices, frustum planes and culling distances shared read-only by
//! every pass of the frame. The snapshot is rebuilt at the next frame start;
//! nothing in the pipeline reads the live camera after that point.

use glam::{Affine3A, Mat4, Vec3};

use crate::math::Frustum;

/// Perspective camera with a reverse-Z infinite projection.
///
/// Reverse-Z (depth 1 at the near plane, approaching 0 toward infinity)
/// gives near-uniform depth precision and is assumed by the depth compare
/// functions of every pass in this crate.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Vertical field of view in radians.
    pub fov: f32,
    /// Viewport aspect ratio (width / height).
    pub aspect: f32,
    /// Near clip distance in world units.
    pub near: f32,
    /// Far *culling* distance in world units. The projection itself is
    /// infinite; this only bounds frustum culling and fog.
    pub far: f32,

    world_matrix: Affine3A,
}

impl Camera {
    #[must_use]
    pub fn new_perspective(fov_degrees: f32, aspect: f32, near: f32) -> Self {
        Self {
            fov: fov_degrees.to_radians(),
            aspect,
            near,
            far: 1000.0,
            world_matrix: Affine3A::IDENTITY,
        }
    }

    /// Sets the camera's world transform (the inverse becomes the view
    /// matrix).
    pub fn set_world_transform(&mut self, world: Affine3A) {
        self.world_matrix = world;
    }

    /// Positions the camera at `eye` looking toward `target`.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.world_matrix = Affine3A::look_at_rh(eye, target, up).inverse();
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.world_matrix.translation.into()
    }

    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_infinite_reverse_rh(self.fov, self.aspect, self.near)
    }

    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from(self.world_matrix).inverse()
    }

    /// Builds the per-frame snapshot consumed by the pass sequence.
    #[must_use]
    pub fn extract_view_state(&self) -> ViewState {
        let view = self.view_matrix();
        let projection = self.projection_matrix();
        let view_projection = projection * view;

        ViewState {
            position: self.position(),
            view,
            projection,
            view_projection,
            inverse_view: Mat4::from(self.world_matrix),
            frustum: Frustum::from_matrix(view_projection),
            near: self.near,
            far: self.far,
        }
    }
}

/// Immutable per-frame view snapshot.
///
/// Built once at `begin_frame` and shared read-only by all passes. Rebuilt
/// at the next frame start.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    /// Camera world matrix (inverse of `view`), used by billboarding.
    pub inverse_view: Mat4,
    pub frustum: Frustum,
    pub near: f32,
    pub far: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Camera::new_perspective(60.0, 1.0, 0.1).extract_view_state()
    }
}
