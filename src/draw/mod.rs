//! Draw submission data model.
//!
//! A frame's drawable geometry arrives as [`DrawGroup`]s (one world
//! transform, optionally skinned, optionally instanced) owning one or more
//! [`DrawCall`]s (one mesh + material pairing each). Groups and calls live
//! for exactly one frame; the registry recycles their storage at
//! `begin_frame`.

pub mod registry;
pub mod visibility;

use std::sync::Arc;

use bitflags::bitflags;
use glam::{Mat4, Vec4};

use crate::material::Material;
use crate::math::BoundingBox;

bitflags! {
    /// Submission layer mask. Draw calls whose mesh layers do not intersect
    /// the registry's active layers are silently skipped.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RenderLayers: u32 {
        const LAYER_0 = 1 << 0;
        const LAYER_1 = 1 << 1;
        const LAYER_2 = 1 << 2;
        const LAYER_3 = 1 << 3;
    }
}

impl Default for RenderLayers {
    fn default() -> Self {
        Self::LAYER_0
    }
}

/// Per-mesh shadow contribution policy, independent of main-view
/// visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowCastMode {
    /// Cast shadows and render normally.
    #[default]
    Enabled,
    /// Never rasterized into shadow maps.
    Disabled,
    /// Rasterized *only* into shadow maps; skipped by all color passes.
    ShadowOnly,
}

/// Index buffer binding of a mesh.
#[derive(Clone)]
pub struct IndexBinding {
    pub buffer: Arc<wgpu::Buffer>,
    pub format: wgpu::IndexFormat,
    pub count: u32,
}

/// GPU mesh handle bundle. Vertex data layout is the pipeline's fixed
/// interleaved layout; the asset layer is responsible for producing it.
#[derive(Clone)]
pub struct MeshRef {
    pub vertex_buffer: Arc<wgpu::Buffer>,
    pub vertex_count: u32,
    pub index: Option<IndexBinding>,
    pub topology: wgpu::PrimitiveTopology,
    /// Local-space bounds, transformed by the owning group for culling.
    pub aabb: BoundingBox,
    pub shadow_cast: ShadowCastMode,
    pub layers: RenderLayers,
}

impl MeshRef {
    /// `true` when the mesh has no drawable primitives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.index {
            Some(index) => index.count == 0,
            None => self.vertex_count == 0,
        }
    }
}

/// Animated-pose reference: bone matrices packed into a texture sampled by
/// the vertex stage (texture unit 0 in every geometry program).
#[derive(Clone)]
pub struct SkeletonPose {
    pub bone_texture: Arc<wgpu::TextureView>,
}

/// Per-instance data for instanced groups.
///
/// The combined bounding box covers all instances in world space; when the
/// caller omits it, the group is never culled and per-instance culling
/// responsibility shifts to the caller.
#[derive(Clone, Default)]
pub struct InstanceData {
    pub transforms: Vec<Mat4>,
    /// Optional per-instance color multipliers, parallel to `transforms`.
    pub colors: Option<Vec<Vec4>>,
    pub combined_aabb: Option<BoundingBox>,
}

impl InstanceData {
    #[must_use]
    pub fn count(&self) -> u32 {
        self.transforms.len() as u32
    }

    /// A descriptor with no instances or mismatched color array is
    /// malformed; the registry drops such submissions silently.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        self.transforms.is_empty()
            || self
                .colors
                .as_ref()
                .is_some_and(|c| c.len() != self.transforms.len())
    }
}

/// One submission of geometry sharing a world transform.
#[derive(Clone, Default)]
pub struct DrawGroup {
    pub transform: Mat4,
    /// Local-space bounds of the whole group (multi-mesh models).
    pub aabb: BoundingBox,
    pub skeleton: Option<SkeletonPose>,
    pub instances: Option<InstanceData>,
}

impl DrawGroup {
    /// World-space bounds used for culling: the caller-supplied combined box
    /// for instanced groups, the transformed local box otherwise. `None`
    /// means "no culling information — treat as visible".
    #[must_use]
    pub fn world_bounds(&self) -> Option<BoundingBox> {
        if let Some(instances) = &self.instances {
            return instances.combined_aabb;
        }
        if self.aabb.is_empty() {
            return None;
        }
        Some(self.aabb.transform(&self.transform))
    }
}

/// Handle to a [`DrawGroup`] within the current frame. Invalidated at
/// `begin_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupHandle(pub(crate) u32);

/// One mesh + material pairing inside a group.
#[derive(Clone)]
pub struct DrawCall {
    pub mesh: MeshRef,
    pub material: Material,
    pub group: GroupHandle,
}

/// Rendering technique a draw call is bucketed under.
///
/// Classification happens exactly once at submission; visibility and
/// sorting never move a call between buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Technique {
    /// Opaque G-buffer rasterization, lit by the deferred passes.
    Deferred,
    /// Forward-lit rasterization (transparency / custom blending).
    Forward,
    /// Depth-only prepass for alpha-tested transparency with shadows.
    Prepass,
    /// Depth-tested G-buffer blend of decal volumes.
    Decal,
}

impl Technique {
    pub const ALL: [Self; 4] = [Self::Deferred, Self::Forward, Self::Prepass, Self::Decal];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Deferred => 0,
            Self::Forward => 1,
            Self::Prepass => 2,
            Self::Decal => 3,
        }
    }
}

/// A technique's call list, split by instancing.
#[derive(Debug, Clone, Default)]
pub struct Bucket {
    /// Indices into the registry's call list (non-instanced groups).
    pub plain: Vec<u32>,
    /// Indices into the registry's call list (instanced groups).
    pub instanced: Vec<u32>,
}

impl Bucket {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.instanced.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.plain.clear();
        self.instanced.clear();
    }
}
