//! Shadow pass.
//!
//! For every visible shadow-casting light whose map the
//! [`LightManager`](crate::light::manager::LightManager) reports stale,
//! rasterize depth-only geometry into the light's shadow map: six cube
//! faces for omni lights (one view-projection each), a single face
//! otherwise. Visibility is recomputed per face against that face's
//! frustum, so the main-view culling results are rebuilt by the renderer
//! afterwards.
//!
//! Draw calls whose mesh has a `Disabled` shadow-cast policy never reach a
//! shadow map; `Prepass`-transparency materials rasterize with the relaxed
//! shadow alpha cutoff (0.1).

use glam::Vec4;

use crate::context::RenderContext;
use crate::draw::{ShadowCastMode, Technique};
use crate::light::LightId;
use crate::pipeline::PipelineKey;
use crate::pipeline::uniforms::{FrameUniforms, aligned_stride};

use super::GpuDraw;

struct ShadowJob {
    target_view: wgpu::TextureView,
    frame_bind_group: wgpu::BindGroup,
    draws: Vec<GpuDraw>,
}

pub struct ShadowPass {
    face_uniforms: wgpu::Buffer,
    face_capacity: u32,
    stride: u32,
    jobs: Vec<ShadowJob>,
}

impl ShadowPass {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let stride = aligned_stride(std::mem::size_of::<FrameUniforms>() as u32, device);
        let face_capacity = 16;
        Self {
            face_uniforms: Self::create_buffer(device, stride, face_capacity),
            face_capacity,
            stride,
            jobs: Vec::new(),
        }
    }

    fn create_buffer(device: &wgpu::Device, stride: u32, faces: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Face Uniforms"),
            size: u64::from(stride) * u64::from(faces),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn prepare(&mut self, ctx: &mut RenderContext) {
        self.jobs.clear();

        // Lights needing a refresh this frame.
        let stale: Vec<LightId> = ctx
            .lights
            .visible_lights()
            .map(|(id, _, _)| id)
            .filter(|&id| ctx.lights.shadow_should_update(id))
            .collect();
        if stale.is_empty() {
            return;
        }

        // Nothing casts shadows when both shadow-source buckets are empty.
        let has_casters = ctx.registry.has_calls(Technique::Deferred)
            || ctx.registry.has_calls(Technique::Prepass);
        if !has_casters {
            return;
        }

        // Size the per-face uniform buffer up front so the bind groups
        // below reference the final allocation.
        let total_faces: u32 = stale
            .iter()
            .filter_map(|&id| ctx.lights.get(id))
            .map(crate::light::Light::shadow_face_count)
            .sum();
        if total_faces > self.face_capacity {
            self.face_capacity = total_faces.next_power_of_two();
            self.face_uniforms = Self::create_buffer(ctx.device, self.stride, self.face_capacity);
        }

        let mut staging = vec![0u8; (self.stride * total_faces) as usize];
        let mut face_slot = 0u32;

        for id in stale {
            if !ctx.lights.ensure_shadow_map(ctx.device, id) {
                continue;
            }
            let Some(light) = ctx.lights.get(id) else {
                continue;
            };
            let faces = light.shadow_face_count();
            let resolution = light.shadow.resolution as f32;

            let Some(runtime) = ctx.lights.runtime(id) else {
                continue;
            };
            let Some(map) = &runtime.shadow_map else {
                continue;
            };

            for face in 0..faces as usize {
                let frame = FrameUniforms {
                    view_projection: runtime.view_projections[face],
                    camera_position: light.position.extend(0.0),
                    viewport: Vec4::new(resolution, resolution, 1.0 / resolution, 1.0 / resolution),
                    near_far: Vec4::new(light.near, light.range, 0.0, 0.0),
                    ..Default::default()
                };
                let offset = (face_slot * self.stride) as usize;
                staging[offset..offset + std::mem::size_of::<FrameUniforms>()]
                    .copy_from_slice(bytemuck::bytes_of(&frame));

                let frame_bind_group =
                    ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("Shadow Frame BindGroup"),
                        layout: &ctx.binder.frame_layout,
                        entries: &[wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                buffer: &self.face_uniforms,
                                offset: u64::from(face_slot * self.stride),
                                size: wgpu::BufferSize::new(
                                    std::mem::size_of::<FrameUniforms>() as u64
                                ),
                            }),
                        }],
                    });

                // Per-face caster culling, replayable within the frame.
                if ctx.culling_enabled() {
                    ctx.visibility.compute(ctx.registry, &runtime.frustums[face]);
                } else {
                    ctx.visibility.mark_all_visible(ctx.registry);
                }

                let mut draws = Vec::new();
                for technique in [Technique::Deferred, Technique::Prepass] {
                    for (index, call) in ctx.registry.iter_bucket(technique) {
                        if call.mesh.shadow_cast == ShadowCastMode::Disabled {
                            continue;
                        }
                        if !ctx.visibility.is_visible(call.group) {
                            continue;
                        }
                        let key = PipelineKey::shadow(
                            call.material.cull.to_wgpu(),
                            call.mesh.topology,
                        );
                        let pipeline = ctx
                            .pipelines
                            .get_or_create(ctx.device, key, ctx.binder, None, None);
                        draws.push(GpuDraw::assemble(
                            pipeline,
                            call,
                            &ctx.prepared[index as usize],
                        ));
                    }
                }

                self.jobs.push(ShadowJob {
                    target_view: map.face_views[face].clone(),
                    frame_bind_group,
                    draws,
                });
                face_slot += 1;
            }

            ctx.lights.mark_shadow_rendered(id);
        }

        if !staging.is_empty() {
            ctx.queue.write_buffer(&self.face_uniforms, 0, &staging);
        }
    }

    pub fn run(&self, encoder: &mut wgpu::CommandEncoder) {
        for job in &self.jobs {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Depth Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &job.target_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_bind_group(0, &job.frame_bind_group, &[]);
            for draw in &job.draws {
                draw.record(&mut pass);
            }
        }
    }
}
