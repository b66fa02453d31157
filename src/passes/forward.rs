//! Transparency prepass and forward pass.
//!
//! Materials with `Prepass` transparency first rasterize depth-only into the
//! scene depth buffer (alpha-tested with the strict 0.99 cutoff), giving
//! them correct occlusion and shadow reception. The forward pass then
//! rasterizes every forward-bucket call back-to-front into the scene color
//! buffer, each call shaded with its packed nearby-light array.

use crate::context::RenderContext;
use crate::draw::Technique;
use crate::pipeline::PipelineKey;
use crate::target::TargetId;

use super::GpuDraw;

pub struct PrepassPass {
    draws: Vec<GpuDraw>,
}

impl PrepassPass {
    #[must_use]
    pub fn new() -> Self {
        Self { draws: Vec::new() }
    }

    pub fn prepare(&mut self, ctx: &mut RenderContext) {
        self.draws.clear();

        for (index, call) in ctx.registry.iter_bucket(Technique::Prepass) {
            if super::skipped_by_color_passes(call, &call.material) {
                continue;
            }
            if !ctx.visibility.is_visible(call.group) {
                continue;
            }
            let key = PipelineKey::prepass(&call.material, call.mesh.topology);
            let pipeline = ctx
                .pipelines
                .get_or_create(ctx.device, key, ctx.binder, None, None);
            self.draws
                .push(GpuDraw::assemble(pipeline, call, &ctx.prepared[index as usize]));
        }
    }

    pub fn run(&self, ctx: &mut RenderContext, encoder: &mut wgpu::CommandEncoder) {
        if self.draws.is_empty() {
            return;
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Transparency Prepass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: ctx.targets.get(TargetId::Depth),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
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

impl Default for PrepassPass {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ForwardPass {
    draws: Vec<GpuDraw>,
}

impl ForwardPass {
    #[must_use]
    pub fn new() -> Self {
        Self { draws: Vec::new() }
    }

    pub fn prepare(&mut self, ctx: &mut RenderContext) {
        self.draws.clear();

        for (index, call) in ctx.registry.iter_bucket(Technique::Forward) {
            if super::skipped_by_color_passes(call, &call.material) {
                continue;
            }
            if !ctx.visibility.is_visible(call.group) {
                continue;
            }
            let key = PipelineKey::forward(&call.material, call.mesh.topology);
            let pipeline = ctx
                .pipelines
                .get_or_create(ctx.device, key, ctx.binder, None, None);
            self.draws
                .push(GpuDraw::assemble(pipeline, call, &ctx.prepared[index as usize]));
        }
    }

    pub fn run(&self, ctx: &mut RenderContext, encoder: &mut wgpu::CommandEncoder) {
        if self.draws.is_empty() {
            return;
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Forward Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.targets.get(TargetId::Scene),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: ctx.targets.get(TargetId::Depth),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
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

impl Default for ForwardPass {
    fn default() -> Self {
        Self::new()
    }
}
