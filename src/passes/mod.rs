//! The fixed per-frame pass sequence.
//!
//! Pass order and data dependencies (executed by the renderer's
//! `end_frame`):
//!
//! ```text
//! shadow ─▶ geometry ─▶ decal ─▶ ssao/ssil/ssr ─▶ deferred ambient
//!   ─▶ deferred lights ─▶ compose ─▶ background ─▶ prepass + forward
//!   ─▶ post chain (fog → dof → bloom → output → fxaa) ─▶ blit
//! ```
//!
//! Every pass is a struct with a `prepare` phase (mutable context: allocate,
//! cull, build bind groups, stage uniforms) and a `run` phase (encode GPU
//! commands from the state captured during prepare). A pass with nothing to
//! do skips itself entirely — emptiness is never an error.

pub mod background;
pub mod deferred;
pub mod forward;
pub mod geometry;
pub mod post;
pub mod screen_space;
pub mod shadow;

use std::sync::Arc;

use smallvec::SmallVec;

use crate::binder::PreparedDraw;
use crate::draw::{DrawCall, IndexBinding};
use crate::light::manager::LightManager;
use crate::material::Material;
use crate::math::BoundingBox;
use crate::pipeline::uniforms::{ForwardLightBlock, ForwardLightGpu, MAX_FORWARD_LIGHTS};

/// A fully resolved draw, self-contained for command encoding.
pub struct GpuDraw {
    pub pipeline: Arc<wgpu::RenderPipeline>,
    pub vertex_buffer: Arc<wgpu::Buffer>,
    pub vertex_count: u32,
    pub index: Option<IndexBinding>,
    pub draw_bind_group: Arc<wgpu::BindGroup>,
    pub material_bind_group: Arc<wgpu::BindGroup>,
    pub custom_bind_group: Option<Arc<wgpu::BindGroup>>,
    pub draw_offset: u32,
    pub light_offset: u32,
    pub instance_count: u32,
}

impl GpuDraw {
    /// Assembles an encodable draw from a call and its prepared bind state.
    #[must_use]
    pub fn assemble(
        pipeline: Arc<wgpu::RenderPipeline>,
        call: &DrawCall,
        prepared: &PreparedDraw,
    ) -> Self {
        Self {
            pipeline,
            vertex_buffer: call.mesh.vertex_buffer.clone(),
            vertex_count: call.mesh.vertex_count,
            index: call.mesh.index.clone(),
            draw_bind_group: prepared.draw_bind_group.clone(),
            material_bind_group: prepared.material_bind_group.clone(),
            custom_bind_group: prepared.custom_bind_group.clone(),
            draw_offset: prepared.draw_offset,
            light_offset: prepared.light_offset,
            instance_count: prepared.instance_count,
        }
    }

    /// Records the draw into an open render pass. Group 0 (frame uniforms)
    /// is bound at pass level by the caller.
    pub fn record(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(
            1,
            self.draw_bind_group.as_ref(),
            &[self.draw_offset, self.light_offset],
        );
        pass.set_bind_group(2, self.material_bind_group.as_ref(), &[]);
        if let Some(custom) = &self.custom_bind_group {
            pass.set_bind_group(3, custom.as_ref(), &[]);
        }

        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        if let Some(index) = &self.index {
            pass.set_index_buffer(index.buffer.slice(..), index.format);
            pass.draw_indexed(0..index.count, 0, 0..self.instance_count);
        } else {
            pass.draw(0..self.vertex_count, 0..self.instance_count);
        }
    }
}

/// Packs the lights relevant to one forward draw call.
///
/// Selection is a coarse bounding-box overlap test, not a precise one;
/// directional lights always qualify. At most
/// [`MAX_FORWARD_LIGHTS`] lights are packed — excess lights are silently
/// skipped, never an error.
#[must_use]
pub fn pack_forward_lights(
    lights: &LightManager,
    call_bounds: Option<&BoundingBox>,
) -> ForwardLightBlock {
    let mut selected: SmallVec<[ForwardLightGpu; MAX_FORWARD_LIGHTS]> = SmallVec::new();

    for (_, light, runtime) in lights.visible_lights() {
        if selected.len() == MAX_FORWARD_LIGHTS {
            break;
        }
        if runtime.bounded
            && let Some(bounds) = call_bounds
            && !runtime.volume.overlaps(bounds)
        {
            continue;
        }

        let (kind, inner, outer) = match light.kind {
            crate::light::LightKind::Directional => (0.0, 0.0, 0.0),
            crate::light::LightKind::Spot {
                inner_cone,
                outer_cone,
            } => (1.0, inner_cone.cos(), outer_cone.cos()),
            crate::light::LightKind::Omni => (2.0, 0.0, 0.0),
        };

        selected.push(ForwardLightGpu {
            position_range: light.position.extend(light.range),
            direction_type: light.direction.extend(kind),
            color_energy: light.color.extend(light.energy),
            params: glam::Vec4::new(light.attenuation, inner, outer, light.specular),
        });
    }

    let mut block = ForwardLightBlock {
        count: [selected.len() as u32, 0, 0, 0],
        ..Default::default()
    };
    block.lights[..selected.len()].copy_from_slice(&selected);
    block
}

/// Whether a color pass should skip this material entirely (shadow-only
/// meshes are rasterized exclusively into shadow maps).
#[must_use]
pub fn skipped_by_color_passes(call: &DrawCall, _material: &Material) -> bool {
    call.mesh.shadow_cast == crate::draw::ShadowCastMode::ShadowOnly
}

/// Grow-only dynamic-offset uniform arena for per-item pass data (deferred
/// light entries, shadow face matrices).
pub(crate) struct UniformArena {
    pub buffer: wgpu::Buffer,
    capacity: u64,
    stride: u32,
    staging: Vec<u8>,
    label: &'static str,
}

impl UniformArena {
    pub fn new(device: &wgpu::Device, item_size: u32, label: &'static str) -> Self {
        let stride = crate::pipeline::uniforms::aligned_stride(item_size, device);
        let capacity = u64::from(stride) * 16;
        Self {
            buffer: Self::create(device, capacity, label),
            capacity,
            stride,
            staging: Vec::new(),
            label,
        }
    }

    fn create(device: &wgpu::Device, capacity: u64, label: &'static str) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn clear(&mut self) {
        self.staging.clear();
    }

    /// Grows the GPU buffer for `items` entries. Returns `true` when the
    /// buffer was recreated (dependent bind groups must be rebuilt).
    pub fn reserve(&mut self, device: &wgpu::Device, items: u32) -> bool {
        let needed = u64::from(self.stride) * u64::from(items);
        if needed <= self.capacity {
            return false;
        }
        let mut capacity = self.capacity.max(1);
        while capacity < needed {
            capacity *= 2;
        }
        self.buffer = Self::create(device, capacity, self.label);
        self.capacity = capacity;
        true
    }

    /// Appends one entry, returning its dynamic offset.
    pub fn push(&mut self, bytes: &[u8]) -> u32 {
        debug_assert!(bytes.len() <= self.stride as usize);
        let offset = self.staging.len() as u32;
        self.staging.extend_from_slice(bytes);
        self.staging
            .resize(offset as usize + self.stride as usize, 0);
        offset
    }

    pub fn upload(&self, queue: &wgpu::Queue) {
        if !self.staging.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.staging);
        }
    }
}
