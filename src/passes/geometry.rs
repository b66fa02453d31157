//! Geometry (G-buffer) and decal passes.
//!
//! The geometry pass rasterizes every visible deferred draw call into the
//! albedo / normal / emission / ORM channels plus the scene depth buffer.
//! Calls carrying a compiled custom shading program rasterize through that
//! program instead of the default geometry program — both expose the same
//! bind layout, so the switch is purely a pipeline change scoped to the
//! call.
//!
//! The decal pass then blends decal volumes into the same G-buffer,
//! depth-write disabled, sampling scene depth in the fragment stage to
//! project each decal box onto the geometry beneath it.

use crate::context::RenderContext;
use crate::draw::Technique;
use crate::pipeline::PipelineKey;
use crate::target::TargetId;

use super::GpuDraw;

pub struct GeometryPass {
    draws: Vec<GpuDraw>,
}

impl GeometryPass {
    #[must_use]
    pub fn new() -> Self {
        Self { draws: Vec::new() }
    }

    pub fn prepare(&mut self, ctx: &mut RenderContext) {
        self.draws.clear();

        for (index, call) in ctx.registry.iter_bucket(Technique::Deferred) {
            if super::skipped_by_color_passes(call, &call.material) {
                continue;
            }
            if !ctx.visibility.is_visible(call.group) {
                continue;
            }

            let key = PipelineKey::gbuffer(&call.material);
            let pipeline = ctx.pipelines.get_or_create(
                ctx.device,
                key,
                ctx.binder,
                call.material.shader.as_ref(),
                None,
            );
            self.draws
                .push(GpuDraw::assemble(pipeline, call, &ctx.prepared[index as usize]));
        }

        ctx.outputs.geometry_ran = !self.draws.is_empty();
    }

    pub fn run(&self, ctx: &mut RenderContext, encoder: &mut wgpu::CommandEncoder) {
        if self.draws.is_empty() {
            // No deferred content: clear depth only, so the background and
            // forward passes still see a defined depth buffer.
            let _ = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Depth Clear Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: ctx.targets.get(TargetId::Depth),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            return;
        }

        let color_attachment = |id| {
            Some(wgpu::RenderPassColorAttachment {
                view: ctx.targets.get(id),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Geometry Pass"),
            color_attachments: &[
                color_attachment(TargetId::Albedo),
                color_attachment(TargetId::Normal),
                color_attachment(TargetId::Emission),
                color_attachment(TargetId::Orm),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: ctx.targets.get(TargetId::Depth),
                depth_ops: Some(wgpu::Operations {
                    // Reverse-Z: 0 is the far/background value.
                    load: wgpu::LoadOp::Clear(0.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_bind_group(0, &ctx.binder.frame_bind_group, &[]);
        for draw in &self.draws {
            draw.record(&mut pass);
        }
    }
}

impl Default for GeometryPass {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decals
// ---------------------------------------------------------------------------

pub struct DecalPass {
    screen_layout: wgpu::BindGroupLayout,
    screen_sampler: wgpu::Sampler,
    screen_bind_group: Option<wgpu::BindGroup>,
    draws: Vec<GpuDraw>,
}

impl DecalPass {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let screen_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Decal Screen Layout"),
            entries: &[
                // Binding 0: scene depth
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Binding 1: point sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let screen_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Decal Depth Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            screen_layout,
            screen_sampler,
            screen_bind_group: None,
            draws: Vec::new(),
        }
    }

    pub fn prepare(&mut self, ctx: &mut RenderContext) {
        self.draws.clear();
        self.screen_bind_group = None;

        if !ctx.outputs.geometry_ran || !ctx.registry.has_calls(Technique::Decal) {
            return;
        }

        for (index, call) in ctx.registry.iter_bucket(Technique::Decal) {
            if !ctx.visibility.is_visible(call.group) {
                continue;
            }
            let key = PipelineKey::decal(&call.material);
            let pipeline = ctx.pipelines.get_or_create(
                ctx.device,
                key,
                ctx.binder,
                None,
                Some(&self.screen_layout),
            );
            self.draws
                .push(GpuDraw::assemble(pipeline, call, &ctx.prepared[index as usize]));
        }

        if self.draws.is_empty() {
            return;
        }

        self.screen_bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Decal Screen BindGroup"),
            layout: &self.screen_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(
                        ctx.targets.get(TargetId::Depth),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.screen_sampler),
                },
            ],
        }));
    }

    pub fn run(&self, ctx: &mut RenderContext, encoder: &mut wgpu::CommandEncoder) {
        let Some(screen_bind_group) = &self.screen_bind_group else {
            return;
        };

        let color_attachment = |id| {
            Some(wgpu::RenderPassColorAttachment {
                view: ctx.targets.get(id),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Decal Pass"),
            color_attachments: &[
                color_attachment(TargetId::Albedo),
                color_attachment(TargetId::Normal),
                color_attachment(TargetId::Emission),
                color_attachment(TargetId::Orm),
            ],
            // Depth is sampled (and tested) in the fragment stage; binding
            // it as an attachment here would alias the sampled view.
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_bind_group(0, &ctx.binder.frame_bind_group, &[]);
        pass.set_bind_group(3, screen_bind_group, &[]);
        for draw in &self.draws {
            draw.record(&mut pass);
        }
    }
}
