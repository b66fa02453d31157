//! Screen-space effect passes: ambient occlusion, indirect illumination and
//! reflections.
//!
//! Each pass is independently optional and publishes its result target (or
//! the `None` "unavailable" marker) into
//! [`FrameOutputs`](crate::context::FrameOutputs) for the deferred
//! ambient/light passes to consume. All three run at half resolution.
//!
//! - **SSAO**: hemisphere occlusion from depth + normal, then a two-pass
//!   separable blur through the SSAO ping-pong pair.
//! - **SSIL**: one-bounce indirect light sampled from the diffuse lighting
//!   accumulation buffer (hence it runs *after* the deferred light pass),
//!   then the same separable blur through its own pair.
//! - **SSR**: a depth/normal ray march over the lit scene, mipmapped
//!   afterwards so the ambient pass can sample by roughness.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::context::RenderContext;
use crate::pipeline::fullscreen::{
    FullscreenDesc, FullscreenPass, depth_entry, point_sampler_entry, sampler_entry,
    texture_entry, uniform_entry,
};
use crate::target::{TargetId, mipmap::MipmapGenerator};

const SSAO_SHADER: &str = include_str!("../../shaders/ssao.wgsl");
const SSIL_SHADER: &str = include_str!("../../shaders/ssil.wgsl");
const SSR_SHADER: &str = include_str!("../../shaders/ssr.wgsl");
const BLUR_SHADER: &str = include_str!("../../shaders/depth_aware_blur.wgsl");

/// One encoded fullscreen subpass: pipeline choice, bind group, target.
struct FullscreenJob {
    pipeline: usize,
    bind_group: wgpu::BindGroup,
    target: wgpu::TextureView,
}

fn run_jobs(
    jobs: &[FullscreenJob],
    pipelines: &[&FullscreenPass],
    frame_bind_group: &wgpu::BindGroup,
    encoder: &mut wgpu::CommandEncoder,
    label: &'static str,
) {
    for job in jobs {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &job.target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&pipelines[job.pipeline].pipeline);
        pass.set_bind_group(0, frame_bind_group, &[]);
        pass.set_bind_group(1, &job.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

// ---------------------------------------------------------------------------
// SSAO
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SsaoUniforms {
    /// x = radius, y = bias, z = intensity, w = power.
    params: Vec4,
    /// x = sample count.
    counts: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct BlurUniforms {
    /// xy = blur direction in texels.
    direction: Vec4,
}

pub struct SsaoPass {
    sample_pass: FullscreenPass,
    blur_pass: FullscreenPass,
    layout: wgpu::BindGroupLayout,
    uniforms: wgpu::Buffer,
    blur_h: wgpu::Buffer,
    blur_v: wgpu::Buffer,
    point_sampler: wgpu::Sampler,
    jobs: Vec<FullscreenJob>,
}

fn nearest_sampler(device: &wgpu::Device, label: &'static str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

impl SsaoPass {
    #[must_use]
    pub fn new(device: &wgpu::Device, frame_layout: &wgpu::BindGroupLayout) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SSAO Layout"),
            entries: &[
                depth_entry(0),
                texture_entry(1), // normal (or blur source)
                texture_entry(2), // blur source (unused by sample stage)
                point_sampler_entry(3),
                sampler_entry(4),
                uniform_entry(5),
            ],
        });

        let make_pass = |label, shader, format| {
            FullscreenPass::new(
                device,
                &FullscreenDesc {
                    label,
                    shader_source: shader,
                    target_format: format,
                    bind_group_layouts: &[frame_layout, &layout],
                    ..Default::default()
                },
            )
        };

        let sample_pass = make_pass("SSAO Sample", SSAO_SHADER, wgpu::TextureFormat::R8Unorm);
        let blur_pass = make_pass("SSAO Blur", BLUR_SHADER, wgpu::TextureFormat::R8Unorm);

        let uniform = |label, size| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        Self {
            sample_pass,
            blur_pass,
            layout,
            uniforms: uniform("SSAO Uniforms", std::mem::size_of::<SsaoUniforms>() as u64),
            blur_h: uniform("SSAO Blur H", std::mem::size_of::<BlurUniforms>() as u64),
            blur_v: uniform("SSAO Blur V", std::mem::size_of::<BlurUniforms>() as u64),
            point_sampler: nearest_sampler(device, "SSAO Depth Sampler"),
            jobs: Vec::new(),
        }
    }

    fn bind(
        &self,
        ctx: &RenderContext,
        source: &wgpu::TextureView,
        uniforms: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSAO BindGroup"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.get(TargetId::Depth)),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(
                        ctx.targets.get(TargetId::Normal),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.point_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.sample_pass.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        })
    }

    pub fn prepare(&mut self, ctx: &mut RenderContext) {
        self.jobs.clear();
        ctx.outputs.ssao = None;

        let settings = &ctx.env.ssao;
        if !settings.enabled || !ctx.outputs.geometry_ran {
            return;
        }

        ctx.queue.write_buffer(
            &self.uniforms,
            0,
            bytemuck::bytes_of(&SsaoUniforms {
                params: Vec4::new(
                    settings.radius,
                    settings.bias,
                    settings.intensity,
                    settings.power,
                ),
                counts: Vec4::new(settings.sample_count as f32, 0.0, 0.0, 0.0),
            }),
        );
        let (half_w, half_h) = ctx.targets.half_size();
        let texel = Vec4::new(1.0 / half_w as f32, 1.0 / half_h as f32, 0.0, 0.0);
        ctx.queue.write_buffer(
            &self.blur_h,
            0,
            bytemuck::bytes_of(&BlurUniforms {
                direction: Vec4::new(texel.x, 0.0, 0.0, 0.0),
            }),
        );
        ctx.queue.write_buffer(
            &self.blur_v,
            0,
            bytemuck::bytes_of(&BlurUniforms {
                direction: Vec4::new(0.0, texel.y, 0.0, 0.0),
            }),
        );

        // Sample, then a two-pass separable blur through the ping-pong pair.
        let (write, stale) = ctx.targets.swap_ssao();
        let (write, stale) = (write.clone(), stale.clone());
        let bind = self.bind(ctx, &stale, &self.uniforms);
        self.jobs.push(FullscreenJob {
            pipeline: 0,
            bind_group: bind,
            target: write,
        });

        let (write, read) = ctx.targets.swap_ssao();
        let (write, read) = (write.clone(), read.clone());
        let bind = self.bind(ctx, &read, &self.blur_h);
        self.jobs.push(FullscreenJob {
            pipeline: 1,
            bind_group: bind,
            target: write,
        });

        let (write, read) = ctx.targets.swap_ssao();
        let (write, read) = (write.clone(), read.clone());
        let bind = self.bind(ctx, &read, &self.blur_v);
        self.jobs.push(FullscreenJob {
            pipeline: 1,
            bind_group: bind,
            target: write,
        });

        ctx.outputs.ssao = Some(TargetId::Ssao);
    }

    pub fn run(&self, ctx: &RenderContext, encoder: &mut wgpu::CommandEncoder) {
        run_jobs(
            &self.jobs,
            &[&self.sample_pass, &self.blur_pass],
            &ctx.binder.frame_bind_group,
            encoder,
            "SSAO Pass",
        );
    }
}

// ---------------------------------------------------------------------------
// SSIL
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SsilUniforms {
    /// x = sample count, y = sample radius, z = slice count, w = thickness.
    params: Vec4,
    /// x = AO power, y = energy.
    shaping: Vec4,
}

pub struct SsilPass {
    sample_pass: FullscreenPass,
    blur_pass: FullscreenPass,
    layout: wgpu::BindGroupLayout,
    uniforms: wgpu::Buffer,
    blur_h: wgpu::Buffer,
    blur_v: wgpu::Buffer,
    point_sampler: wgpu::Sampler,
    jobs: Vec<FullscreenJob>,
}

impl SsilPass {
    #[must_use]
    pub fn new(device: &wgpu::Device, frame_layout: &wgpu::BindGroupLayout) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SSIL Layout"),
            entries: &[
                depth_entry(0),
                texture_entry(1), // normal
                texture_entry(2), // lit diffuse / blur source
                point_sampler_entry(3),
                sampler_entry(4),
                uniform_entry(5),
            ],
        });

        let make_pass = |label, shader| {
            FullscreenPass::new(
                device,
                &FullscreenDesc {
                    label,
                    shader_source: shader,
                    bind_group_layouts: &[frame_layout, &layout],
                    ..Default::default()
                },
            )
        };

        let uniform = |label, size| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        Self {
            sample_pass: make_pass("SSIL Sample", SSIL_SHADER),
            blur_pass: make_pass("SSIL Blur", BLUR_SHADER),
            layout,
            uniforms: uniform("SSIL Uniforms", std::mem::size_of::<SsilUniforms>() as u64),
            blur_h: uniform("SSIL Blur H", std::mem::size_of::<BlurUniforms>() as u64),
            blur_v: uniform("SSIL Blur V", std::mem::size_of::<BlurUniforms>() as u64),
            point_sampler: nearest_sampler(device, "SSIL Depth Sampler"),
            jobs: Vec::new(),
        }
    }

    fn bind(
        &self,
        ctx: &RenderContext,
        source: &wgpu::TextureView,
        uniforms: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSIL BindGroup"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.get(TargetId::Depth)),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(
                        ctx.targets.get(TargetId::Normal),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.point_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.sample_pass.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        })
    }

    pub fn prepare(&mut self, ctx: &mut RenderContext) {
        self.jobs.clear();
        ctx.outputs.ssil = None;

        let settings = &ctx.env.ssil;
        if !settings.enabled || !ctx.outputs.geometry_ran {
            return;
        }

        ctx.queue.write_buffer(
            &self.uniforms,
            0,
            bytemuck::bytes_of(&SsilUniforms {
                params: Vec4::new(
                    settings.sample_count as f32,
                    settings.sample_radius,
                    settings.slice_count as f32,
                    settings.hit_thickness,
                ),
                shaping: Vec4::new(settings.ao_power, settings.energy, 0.0, 0.0),
            }),
        );
        let (half_w, half_h) = ctx.targets.half_size();
        ctx.queue.write_buffer(
            &self.blur_h,
            0,
            bytemuck::bytes_of(&BlurUniforms {
                direction: Vec4::new(1.0 / half_w as f32, 0.0, 0.0, 0.0),
            }),
        );
        ctx.queue.write_buffer(
            &self.blur_v,
            0,
            bytemuck::bytes_of(&BlurUniforms {
                direction: Vec4::new(0.0, 1.0 / half_h as f32, 0.0, 0.0),
            }),
        );

        // The sample stage reads the lit diffuse accumulation.
        let diffuse = ctx.targets.get(TargetId::Diffuse).clone();
        let (write, _) = ctx.targets.swap_ssil();
        let write = write.clone();
        let bind = self.bind(ctx, &diffuse, &self.uniforms);
        self.jobs.push(FullscreenJob {
            pipeline: 0,
            bind_group: bind,
            target: write,
        });

        let (write, read) = ctx.targets.swap_ssil();
        let (write, read) = (write.clone(), read.clone());
        let bind = self.bind(ctx, &read, &self.blur_h);
        self.jobs.push(FullscreenJob {
            pipeline: 1,
            bind_group: bind,
            target: write,
        });

        let (write, read) = ctx.targets.swap_ssil();
        let (write, read) = (write.clone(), read.clone());
        let bind = self.bind(ctx, &read, &self.blur_v);
        self.jobs.push(FullscreenJob {
            pipeline: 1,
            bind_group: bind,
            target: write,
        });

        ctx.outputs.ssil = Some(TargetId::Ssil);
    }

    pub fn run(&self, ctx: &RenderContext, encoder: &mut wgpu::CommandEncoder) {
        run_jobs(
            &self.jobs,
            &[&self.sample_pass, &self.blur_pass],
            &ctx.binder.frame_bind_group,
            encoder,
            "SSIL Pass",
        );
    }
}

// ---------------------------------------------------------------------------
// SSR
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SsrUniforms {
    /// x = max ray steps, y = binary search steps, z = march length,
    /// w = depth thickness.
    march: Vec4,
    /// x = depth tolerance, y = edge fade start, z = edge fade end.
    fade: Vec4,
    /// rgb = ambient color, w = ambient energy (miss fallback).
    ambient: Vec4,
}

pub struct SsrPass {
    pass: FullscreenPass,
    layout: wgpu::BindGroupLayout,
    uniforms: wgpu::Buffer,
    point_sampler: wgpu::Sampler,
    mipgen: MipmapGenerator,
    job: Option<FullscreenJob>,
}

impl SsrPass {
    #[must_use]
    pub fn new(device: &wgpu::Device, frame_layout: &wgpu::BindGroupLayout) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SSR Layout"),
            entries: &[
                depth_entry(0),
                texture_entry(1), // normal
                texture_entry(2), // lit diffuse
                texture_entry(3), // albedo
                texture_entry(4), // orm
                point_sampler_entry(5),
                sampler_entry(6),
                uniform_entry(7),
            ],
        });

        let pass = FullscreenPass::new(
            device,
            &FullscreenDesc {
                label: "SSR Ray March",
                shader_source: SSR_SHADER,
                bind_group_layouts: &[frame_layout, &layout],
                ..Default::default()
            },
        );

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SSR Uniforms"),
            size: std::mem::size_of::<SsrUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let point_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("SSR Depth Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            pass,
            layout,
            uniforms,
            point_sampler,
            mipgen: MipmapGenerator::new(device),
            job: None,
        }
    }

    pub fn prepare(&mut self, ctx: &mut RenderContext) {
        self.job = None;
        ctx.outputs.ssr = None;

        let settings = &ctx.env.ssr;
        if !settings.enabled || !ctx.outputs.geometry_ran {
            return;
        }

        ctx.queue.write_buffer(
            &self.uniforms,
            0,
            bytemuck::bytes_of(&SsrUniforms {
                march: Vec4::new(
                    settings.max_ray_steps as f32,
                    settings.binary_search_steps as f32,
                    settings.ray_march_length,
                    settings.depth_thickness,
                ),
                fade: Vec4::new(
                    settings.depth_tolerance,
                    settings.edge_fade_start,
                    settings.edge_fade_end,
                    0.0,
                ),
                ambient: ctx.env.ambient.color.extend(ctx.env.ambient.energy),
            }),
        );

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSR BindGroup"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.get(TargetId::Depth)),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(
                        ctx.targets.get(TargetId::Normal),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(
                        ctx.targets.get(TargetId::Diffuse),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(
                        ctx.targets.get(TargetId::Albedo),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.get(TargetId::Orm)),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&self.point_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(&self.pass.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: self.uniforms.as_entire_binding(),
                },
            ],
        });

        self.job = Some(FullscreenJob {
            pipeline: 0,
            bind_group,
            target: ctx.targets.ssr().mip_views[0].clone(),
        });
        ctx.outputs.ssr = Some(TargetId::Ssr);
    }

    pub fn run(&self, ctx: &mut RenderContext, encoder: &mut wgpu::CommandEncoder) {
        let Some(job) = &self.job else {
            return;
        };
        run_jobs(
            std::slice::from_ref(job),
            &[&self.pass],
            &ctx.binder.frame_bind_group,
            encoder,
            "SSR Pass",
        );
        // Roughness-aware sampling reads blurred mips of the result.
        self.mipgen.generate(ctx.device, encoder, ctx.targets.ssr());
    }
}
