//! Background pass.
//!
//! Fills every pixel the geometry pass never touched with either the sky
//! cubemap (sampled along the per-pixel view ray) or the flat background
//! color. The depth test is the inverse of the compose pass: only pixels
//! still at the reverse-Z clear value are written, so geometry is never
//! overdrawn.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::context::RenderContext;
use crate::pipeline::fullscreen::{
    FullscreenDesc, FullscreenPass, cube_entry, depth_untouched_only, sampler_entry,
    uniform_entry,
};
use crate::target::TargetId;

const SKY_SHADER: &str = include_str!("../../shaders/background_sky.wgsl");
const COLOR_SHADER: &str = include_str!("../../shaders/background_color.wgsl");

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct BackgroundUniforms {
    /// rgb = color × energy (flat) / w = sky energy (sky).
    color_energy: Vec4,
    /// Sky orientation quaternion.
    rotation: Vec4,
}

pub struct BackgroundPass {
    sky_pass: FullscreenPass,
    color_pass: FullscreenPass,
    sky_layout: wgpu::BindGroupLayout,
    color_layout: wgpu::BindGroupLayout,
    uniforms: wgpu::Buffer,
    /// (bind group, uses sky pipeline)
    draw: Option<(wgpu::BindGroup, bool)>,
}

impl BackgroundPass {
    #[must_use]
    pub fn new(device: &wgpu::Device, frame_layout: &wgpu::BindGroupLayout) -> Self {
        let sky_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Background Sky Layout"),
            entries: &[cube_entry(0), sampler_entry(1), uniform_entry(2)],
        });
        let color_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Background Color Layout"),
            entries: &[uniform_entry(0)],
        });

        let sky_pass = FullscreenPass::new(
            device,
            &FullscreenDesc {
                label: "Background Sky Pass",
                shader_source: SKY_SHADER,
                depth: Some(depth_untouched_only()),
                bind_group_layouts: &[frame_layout, &sky_layout],
                ..Default::default()
            },
        );
        let color_pass = FullscreenPass::new(
            device,
            &FullscreenDesc {
                label: "Background Color Pass",
                shader_source: COLOR_SHADER,
                depth: Some(depth_untouched_only()),
                bind_group_layouts: &[frame_layout, &color_layout],
                ..Default::default()
            },
        );

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Background Uniforms"),
            size: std::mem::size_of::<BackgroundUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            sky_pass,
            color_pass,
            sky_layout,
            color_layout,
            uniforms,
            draw: None,
        }
    }

    pub fn prepare(&mut self, ctx: &mut RenderContext) {
        let background = &ctx.env.background;

        let uniforms = match &background.sky {
            Some(sky) => BackgroundUniforms {
                color_energy: Vec4::new(0.0, 0.0, 0.0, background.energy),
                rotation: Vec4::from(sky.rotation.to_array()),
            },
            None => BackgroundUniforms {
                color_energy: (background.color * background.energy).extend(1.0),
                rotation: Vec4::new(0.0, 0.0, 0.0, 1.0),
            },
        };
        ctx.queue
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = match &background.sky {
            Some(sky) => ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Background Sky BindGroup"),
                layout: &self.sky_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&sky.cubemap),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sky_pass.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.uniforms.as_entire_binding(),
                    },
                ],
            }),
            None => ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Background Color BindGroup"),
                layout: &self.color_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniforms.as_entire_binding(),
                }],
            }),
        };

        self.draw = Some((bind_group, background.sky.is_some()));
    }

    pub fn run(&self, ctx: &mut RenderContext, encoder: &mut wgpu::CommandEncoder) {
        let Some((bind_group, use_sky)) = &self.draw else {
            return;
        };

        // Compose clears the scene buffer when the deferred path ran;
        // otherwise the background is its first user.
        let load = if ctx.outputs.geometry_ran {
            wgpu::LoadOp::Load
        } else {
            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Background Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.targets.get(TargetId::Scene),
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
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

        pass.set_pipeline(if *use_sky {
            &self.sky_pass.pipeline
        } else {
            &self.color_pass.pipeline
        });
        pass.set_bind_group(0, &ctx.binder.frame_bind_group, &[]);
        pass.set_bind_group(1, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
