//! GPU uniform structures shared by the draw pipelines.
//!
//! All structs are `#[repr(C)]` + `bytemuck::Pod` and padded to WGSL
//! uniform-buffer rules. Layout changes here must be mirrored in the WGSL
//! sources under `shaders/`.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Maximum lights packed into one forward draw call. Excess nearby lights
/// are silently skipped.
pub const MAX_FORWARD_LIGHTS: usize = 4;

/// Per-pass camera/view data, bound at group 0 binding 0.
///
/// The shadow pass substitutes its own instances of this block with the
/// light's per-face view-projection; everything else in the frame shares
/// the camera snapshot.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_projection: Mat4,
    pub view: Mat4,
    /// Camera world matrix, used by billboarding.
    pub inverse_view: Mat4,
    /// xyz = camera position, w = time in seconds.
    pub camera_position: Vec4,
    /// x = width, y = height, z = 1/width, w = 1/height.
    pub viewport: Vec4,
    /// x = near, y = far culling distance.
    pub near_far: Vec4,
    /// rgb = flat ambient color, w = ambient energy (forward fallback
    /// term; the deferred path reads the full environment instead).
    pub ambient: Vec4,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            view_projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            inverse_view: Mat4::IDENTITY,
            camera_position: Vec4::ZERO,
            viewport: Vec4::ONE,
            near_far: Vec4::new(0.1, 1000.0, 0.0, 0.0),
            ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
        }
    }
}

/// Per-draw data, bound at group 1 binding 0 with a dynamic offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawUniforms {
    pub model: Mat4,
    /// Inverse-transpose of `model`, rows padded to vec4.
    pub normal_matrix: [Vec4; 3],
    pub albedo_color: Vec4,
    /// rgb = emission color, w = emission energy.
    pub emission: Vec4,
    /// x = occlusion, y = roughness, z = metalness, w = normal scale.
    pub orm_factors: Vec4,
    /// xy = uv offset, zw = uv scale.
    pub uv_transform: Vec4,
    /// x = alpha cutoff, y = alpha (albedo color alpha pre-extracted).
    pub alpha: Vec4,
    /// x = skinned, y = instanced, z = billboard mode, w = instance base.
    pub flags: [u32; 4],
}

impl Default for DrawUniforms {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            normal_matrix: [Vec4::X, Vec4::Y, Vec4::Z],
            albedo_color: Vec4::ONE,
            emission: Vec4::ZERO,
            orm_factors: Vec4::new(1.0, 1.0, 0.0, 1.0),
            uv_transform: Vec4::new(0.0, 0.0, 1.0, 1.0),
            alpha: Vec4::new(0.01, 1.0, 0.0, 0.0),
            flags: [0; 4],
        }
    }
}

/// One instance record in the frame's shared instance storage buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, Default)]
pub struct InstanceRecord {
    pub row0: Vec4,
    pub row1: Vec4,
    pub row2: Vec4,
    pub row3: Vec4,
    pub color: Vec4,
}

impl InstanceRecord {
    #[must_use]
    pub fn from_transform(transform: &Mat4, color: Vec4) -> Self {
        Self {
            row0: transform.col(0),
            row1: transform.col(1),
            row2: transform.col(2),
            row3: transform.col(3),
            color,
        }
    }
}

/// One light of a forward draw call's packed light array.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, Default)]
pub struct ForwardLightGpu {
    /// xyz = position, w = range.
    pub position_range: Vec4,
    /// xyz = direction, w = type (0 dir, 1 spot, 2 omni).
    pub direction_type: Vec4,
    /// rgb = color, w = energy.
    pub color_energy: Vec4,
    /// x = attenuation, y = cos(inner), z = cos(outer), w = specular.
    pub params: Vec4,
}

/// Forward per-call light block, bound at group 1 binding 3 with a dynamic
/// offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, Default)]
pub struct ForwardLightBlock {
    /// x = active light count.
    pub count: [u32; 4],
    pub lights: [ForwardLightGpu; MAX_FORWARD_LIGHTS],
}

/// Per-light data of the deferred light pass, bound with a dynamic offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DeferredLightUniforms {
    pub position_range: Vec4,
    pub direction_type: Vec4,
    pub color_energy: Vec4,
    /// x = attenuation, y = cos(inner), z = cos(outer), w = specular.
    pub params: Vec4,
    /// x = texel size, y = softness, z = depth bias, w = slope bias.
    pub shadow_params: Vec4,
    /// x = near, y = far, z = has shadow, w = SSAO light affect.
    pub shadow_extra: Vec4,
    pub shadow_matrix: Mat4,
}

impl Default for DeferredLightUniforms {
    fn default() -> Self {
        Self {
            position_range: Vec4::ZERO,
            direction_type: Vec4::ZERO,
            color_energy: Vec4::ZERO,
            params: Vec4::ZERO,
            shadow_params: Vec4::ZERO,
            shadow_extra: Vec4::ZERO,
            shadow_matrix: Mat4::IDENTITY,
        }
    }
}

/// Rounds `size` up to the device's dynamic-offset alignment.
#[must_use]
pub fn aligned_stride(size: u32, device: &wgpu::Device) -> u32 {
    let alignment = device
        .limits()
        .min_uniform_buffer_offset_alignment
        .max(1);
    size.div_ceil(alignment) * alignment
}
