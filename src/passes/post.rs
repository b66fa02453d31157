//! Post-processing chain and final blit.
//!
//! Stage order is fixed; every stage is independently optional:
//!
//! ```text
//! fog → depth of field → bloom → output (tone map + grade) → fxaa → blit
//! ```
//!
//! Each enabled stage flips the scene ping-pong pair, sampling the previous
//! stage's result while writing its own. The bloom stage additionally walks
//! the bloom mip chain: a Karis-averaged 13-tap downsample from the scene
//! into successively smaller mips, then an additive 3×3 tent upsample back
//! to level 0, composited over the scene.
//!
//! The final blit copies the last result to the caller's output surface,
//! honoring the aspect-preserving and filtering flags.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::context::RenderContext;
use crate::environment::{BloomMode, FogMode, TonemapMode};
use crate::pipeline::fullscreen::{
    FullscreenDesc, FullscreenPass, additive_blend, depth_entry, point_sampler_entry,
    sampler_entry, texture_entry, uniform_entry,
};
use crate::settings::RenderFlags;
use crate::target::TargetId;

const FOG_SHADER: &str = include_str!("../../shaders/fog.wgsl");
const DOF_SHADER: &str = include_str!("../../shaders/dof.wgsl");
const BLOOM_DOWN_SHADER: &str = include_str!("../../shaders/bloom_downsample.wgsl");
const BLOOM_UP_SHADER: &str = include_str!("../../shaders/bloom_upsample.wgsl");
const BLOOM_MIX_SHADER: &str = include_str!("../../shaders/bloom_mix.wgsl");
const OUTPUT_SHADER: &str = include_str!("../../shaders/output.wgsl");
const FXAA_SHADER: &str = include_str!("../../shaders/fxaa.wgsl");
const BLIT_SHADER: &str = include_str!("../../shaders/blit.wgsl");

// ---------------------------------------------------------------------------
// Bloom chain plan (pure)
// ---------------------------------------------------------------------------

/// Iteration plan over the bloom mip chain for one frame.
///
/// `max_level` is the effective chain length: the allocated mip count scaled
/// by the environment's `levels` fraction, never below 1 and never above the
/// allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomPlan {
    pub max_level: u32,
}

impl BloomPlan {
    #[must_use]
    pub fn new(mip_count: u32, levels: f32) -> Self {
        let scaled = (mip_count as f32 * levels + 0.5) as u32;
        Self {
            max_level: scaled.clamp(1, mip_count.max(1)),
        }
    }

    /// Destination levels of the downsample chain, in execution order.
    /// Always exactly `max_level - 1` iterations.
    #[must_use]
    pub fn downsample_targets(&self) -> Vec<u32> {
        (1..self.max_level).collect()
    }

    /// Destination levels of the upsample chain: strictly descending,
    /// ending at level 0. Empty when the chain has a single level.
    #[must_use]
    pub fn upsample_targets(&self) -> Vec<u32> {
        if self.max_level < 2 {
            return Vec::new();
        }
        (0..=self.max_level - 2).rev().collect()
    }
}

/// Letterbox rectangle for an aspect-preserving blit, in destination
/// pixels. Degenerate inputs fall back to the full destination.
#[must_use]
pub fn letterbox_rect(src: (u32, u32), dst: (u32, u32)) -> (f32, f32, f32, f32) {
    let (sw, sh) = (src.0 as f32, src.1 as f32);
    let (dw, dh) = (dst.0 as f32, dst.1 as f32);
    if sw <= 0.0 || sh <= 0.0 || dw <= 0.0 || dh <= 0.0 {
        return (0.0, 0.0, dw.max(1.0), dh.max(1.0));
    }

    let scale = (dw / sw).min(dh / sh);
    let w = sw * scale;
    let h = sh * scale;
    ((dw - w) * 0.5, (dh - h) * 0.5, w, h)
}

// ---------------------------------------------------------------------------
// Stage uniforms
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct FogUniforms {
    /// rgb = fog color, w = mode (0 off, 1 linear, 2 exp, 3 exp2).
    color_mode: Vec4,
    /// x = start, y = end, z = density, w = sky affect.
    params: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct DofUniforms {
    /// x = focus point, y = focus scale, z = max blur size, w = debug.
    params: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct BloomLevelUniforms {
    /// xy = source texel size, z = karis average flag, w = filter radius.
    params: Vec4,
    /// Prefilter curve: x = threshold, y = threshold - knee, z = 2·knee,
    /// w = 0.25 / (knee + ε). Only read by the first downsample.
    prefilter: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct BloomMixUniforms {
    /// x = mode (1 mix, 2 additive, 3 screen), y = intensity.
    params: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct OutputUniforms {
    /// x = tonemap mode, y = exposure, z = white point, w = brightness.
    params: Vec4,
    /// x = contrast, y = saturation.
    grade: Vec4,
}

// ---------------------------------------------------------------------------
// Post chain
// ---------------------------------------------------------------------------

/// One encoded post subpass.
struct PostJob {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    target: wgpu::TextureView,
    /// Additive jobs (bloom upsample) must load their target.
    load: bool,
    /// Letterbox viewport + clear, set only for the final blit.
    viewport: Option<(f32, f32, f32, f32)>,
}

pub struct PostChain {
    fog: FullscreenPass,
    fog_layout: wgpu::BindGroupLayout,
    fog_uniforms: wgpu::Buffer,

    dof: FullscreenPass,
    dof_layout: wgpu::BindGroupLayout,
    dof_uniforms: wgpu::Buffer,

    bloom_down: FullscreenPass,
    bloom_up: FullscreenPass,
    bloom_mix: FullscreenPass,
    bloom_layout: wgpu::BindGroupLayout,
    bloom_mix_layout: wgpu::BindGroupLayout,
    /// One uniform buffer per downsample destination level, written each
    /// frame. The upsample chain keeps its own set — all writes happen
    /// before submission, so the two chains must not share buffers.
    bloom_level_uniforms: Vec<wgpu::Buffer>,
    bloom_up_uniforms: Vec<wgpu::Buffer>,
    bloom_mix_uniforms: wgpu::Buffer,

    output: FullscreenPass,
    output_layout: wgpu::BindGroupLayout,
    output_uniforms: wgpu::Buffer,

    fxaa: FullscreenPass,
    fxaa_layout: wgpu::BindGroupLayout,

    blit: FullscreenPass,
    blit_layout: wgpu::BindGroupLayout,
    nearest_sampler: wgpu::Sampler,

    point_sampler: wgpu::Sampler,
    jobs: Vec<PostJob>,
}

impl PostChain {
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        frame_layout: &wgpu::BindGroupLayout,
        output_format: wgpu::TextureFormat,
        mip_chain_levels: u32,
    ) -> Self {
        // Color + depth stages (fog, dof) share one layout shape.
        let depth_stage_layout = |label| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[
                    texture_entry(0),
                    depth_entry(1),
                    sampler_entry(2),
                    point_sampler_entry(3),
                    uniform_entry(4),
                ],
            })
        };
        let fog_layout = depth_stage_layout("Fog Layout");
        let dof_layout = depth_stage_layout("DoF Layout");

        // Bloom down/up: source texture + sampler + level uniforms.
        let bloom_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Layout"),
            entries: &[texture_entry(0), sampler_entry(1), uniform_entry(2)],
        });
        // Bloom mix: scene + bloom + sampler + uniforms.
        let bloom_mix_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Mix Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                sampler_entry(2),
                uniform_entry(3),
            ],
        });

        let simple_layout = |label| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[texture_entry(0), sampler_entry(1), uniform_entry(2)],
            })
        };
        let output_layout = simple_layout("Output Layout");

        let fxaa_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("FXAA Layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });
        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blit Layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });

        let hdr_pass = |label, shader, layout: &wgpu::BindGroupLayout| {
            FullscreenPass::new(
                device,
                &FullscreenDesc {
                    label,
                    shader_source: shader,
                    bind_group_layouts: &[frame_layout, layout],
                    ..Default::default()
                },
            )
        };

        let bloom_up = FullscreenPass::new(
            device,
            &FullscreenDesc {
                label: "Bloom Upsample",
                shader_source: BLOOM_UP_SHADER,
                blend: Some(additive_blend()),
                bind_group_layouts: &[frame_layout, &bloom_layout],
                ..Default::default()
            },
        );

        let blit = FullscreenPass::new(
            device,
            &FullscreenDesc {
                label: "Final Blit",
                shader_source: BLIT_SHADER,
                target_format: output_format,
                bind_group_layouts: &[frame_layout, &blit_layout],
                ..Default::default()
            },
        );

        let uniform = |label, size: usize| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: size as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        let bloom_level_uniforms = (0..mip_chain_levels.max(1))
            .map(|_| uniform("Bloom Level Uniforms", std::mem::size_of::<BloomLevelUniforms>()))
            .collect();
        let bloom_up_uniforms = (0..mip_chain_levels.max(1))
            .map(|_| uniform("Bloom Upsample Uniforms", std::mem::size_of::<BloomLevelUniforms>()))
            .collect();

        let nearest_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Blit Nearest Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let point_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post Depth Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            fog: hdr_pass("Fog Pass", FOG_SHADER, &fog_layout),
            fog_layout,
            fog_uniforms: uniform("Fog Uniforms", std::mem::size_of::<FogUniforms>()),
            dof: hdr_pass("DoF Pass", DOF_SHADER, &dof_layout),
            dof_layout,
            dof_uniforms: uniform("DoF Uniforms", std::mem::size_of::<DofUniforms>()),
            bloom_down: hdr_pass("Bloom Downsample", BLOOM_DOWN_SHADER, &bloom_layout),
            bloom_up,
            bloom_mix: hdr_pass("Bloom Mix", BLOOM_MIX_SHADER, &bloom_mix_layout),
            bloom_layout,
            bloom_mix_layout,
            bloom_level_uniforms,
            bloom_up_uniforms,
            bloom_mix_uniforms: uniform(
                "Bloom Mix Uniforms",
                std::mem::size_of::<BloomMixUniforms>(),
            ),
            output: hdr_pass("Output Pass", OUTPUT_SHADER, &output_layout),
            output_layout,
            output_uniforms: uniform("Output Uniforms", std::mem::size_of::<OutputUniforms>()),
            fxaa: hdr_pass("FXAA Pass", FXAA_SHADER, &fxaa_layout),
            fxaa_layout,
            blit,
            blit_layout,
            nearest_sampler,
            point_sampler,
            jobs: Vec::new(),
        }
    }

    fn simple_bind(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        source: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        uniforms: Option<&wgpu::Buffer>,
    ) -> wgpu::BindGroup {
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(source),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ];
        if let Some(uniforms) = uniforms {
            entries.push(wgpu::BindGroupEntry {
                binding: 2,
                resource: uniforms.as_entire_binding(),
            });
        }
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Post BindGroup"),
            layout,
            entries: &entries,
        })
    }

    fn depth_stage_bind(
        &self,
        ctx: &RenderContext,
        layout: &wgpu::BindGroupLayout,
        source: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        uniforms: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Post Depth BindGroup"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.get(TargetId::Depth)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.point_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        })
    }

    pub fn prepare(&mut self, ctx: &mut RenderContext, output_view: &wgpu::TextureView, output_size: (u32, u32)) {
        self.jobs.clear();
        let env = ctx.env;

        // ── Fog ────────────────────────────────────────────────────────────
        if env.fog.mode != FogMode::Disabled {
            let mode = match env.fog.mode {
                FogMode::Disabled => 0.0,
                FogMode::Linear => 1.0,
                FogMode::Exp => 2.0,
                FogMode::Exp2 => 3.0,
            };
            ctx.queue.write_buffer(
                &self.fog_uniforms,
                0,
                bytemuck::bytes_of(&FogUniforms {
                    color_mode: env.fog.color.extend(mode),
                    params: Vec4::new(
                        env.fog.start,
                        env.fog.end,
                        env.fog.density,
                        env.fog.sky_affect,
                    ),
                }),
            );
            let (write, read) = ctx.targets.swap_scene();
            let (write, read) = (write.clone(), read.clone());
            let bind_group =
                self.depth_stage_bind(ctx, &self.fog_layout, &read, &self.fog.sampler, &self.fog_uniforms);
            self.jobs.push(PostJob {
                pipeline: self.fog.pipeline.clone(),
                bind_group,
                target: write,
                load: false,
                viewport: None,
            });
        }

        // ── Depth of field ─────────────────────────────────────────────────
        if env.dof.enabled {
            ctx.queue.write_buffer(
                &self.dof_uniforms,
                0,
                bytemuck::bytes_of(&DofUniforms {
                    params: Vec4::new(
                        env.dof.focus_point,
                        env.dof.focus_scale,
                        env.dof.max_blur_size,
                        f32::from(u8::from(env.dof.debug_mode)),
                    ),
                }),
            );
            let (write, read) = ctx.targets.swap_scene();
            let (write, read) = (write.clone(), read.clone());
            let bind_group =
                self.depth_stage_bind(ctx, &self.dof_layout, &read, &self.dof.sampler, &self.dof_uniforms);
            self.jobs.push(PostJob {
                pipeline: self.dof.pipeline.clone(),
                bind_group,
                target: write,
                load: false,
                viewport: None,
            });
        }

        // ── Bloom ──────────────────────────────────────────────────────────
        if env.bloom.mode != BloomMode::Disabled {
            self.prepare_bloom(ctx);
        }

        // ── Output: tone mapping + color grade ─────────────────────────────
        {
            let mode = match env.tonemap.mode {
                TonemapMode::Linear => 0.0,
                TonemapMode::Reinhard => 1.0,
                TonemapMode::Filmic => 2.0,
                TonemapMode::Aces => 3.0,
            };
            ctx.queue.write_buffer(
                &self.output_uniforms,
                0,
                bytemuck::bytes_of(&OutputUniforms {
                    params: Vec4::new(
                        mode,
                        env.tonemap.exposure,
                        env.tonemap.white,
                        env.tonemap.brightness,
                    ),
                    grade: Vec4::new(env.tonemap.contrast, env.tonemap.saturation, 0.0, 0.0),
                }),
            );
            let (write, read) = ctx.targets.swap_scene();
            let (write, read) = (write.clone(), read.clone());
            let bind_group = self.simple_bind(
                ctx.device,
                &self.output_layout,
                &read,
                &self.output.sampler,
                Some(&self.output_uniforms),
            );
            self.jobs.push(PostJob {
                pipeline: self.output.pipeline.clone(),
                bind_group,
                target: write,
                load: false,
                viewport: None,
            });
        }

        // ── FXAA ───────────────────────────────────────────────────────────
        if ctx.flags.contains(RenderFlags::FXAA) {
            let (write, read) = ctx.targets.swap_scene();
            let (write, read) = (write.clone(), read.clone());
            let bind_group = self.simple_bind(
                ctx.device,
                &self.fxaa_layout,
                &read,
                &self.fxaa.sampler,
                None,
            );
            self.jobs.push(PostJob {
                pipeline: self.fxaa.pipeline.clone(),
                bind_group,
                target: write,
                load: false,
                viewport: None,
            });
        }

        // ── Final blit ─────────────────────────────────────────────────────
        {
            let source = ctx.targets.get(TargetId::Scene).clone();
            let sampler = if ctx.flags.contains(RenderFlags::BLIT_LINEAR) {
                &self.blit.sampler
            } else {
                &self.nearest_sampler
            };
            let bind_group =
                self.simple_bind(ctx.device, &self.blit_layout, &source, sampler, None);

            let viewport = if ctx.flags.contains(RenderFlags::ASPECT_KEEP) {
                letterbox_rect(ctx.targets.size(), output_size)
            } else {
                (0.0, 0.0, output_size.0 as f32, output_size.1 as f32)
            };

            self.jobs.push(PostJob {
                pipeline: self.blit.pipeline.clone(),
                bind_group,
                target: output_view.clone(),
                load: false,
                viewport: Some(viewport),
            });
        }
    }

    fn prepare_bloom(&mut self, ctx: &mut RenderContext) {
        let env = ctx.env;
        let plan = BloomPlan::new(ctx.targets.bloom().mip_count(), env.bloom.levels);

        let threshold = env.bloom.threshold;
        let knee = threshold * env.bloom.soft_threshold;
        let prefilter = Vec4::new(
            threshold,
            threshold - knee,
            2.0 * knee,
            0.25 / (knee + 1e-5),
        );

        // Scene source feeding the chain (and later the composite).
        let (_, scene_source) = ctx.targets.swap_scene();
        let scene_source = scene_source.clone();

        // Level 0: prefilter + Karis-averaged downsample from the scene.
        let (full_w, full_h) = ctx.targets.size();
        ctx.queue.write_buffer(
            &self.bloom_level_uniforms[0],
            0,
            bytemuck::bytes_of(&BloomLevelUniforms {
                params: Vec4::new(1.0 / full_w as f32, 1.0 / full_h as f32, 1.0, 0.0),
                prefilter,
            }),
        );
        let bind_group = self.simple_bind(
            ctx.device,
            &self.bloom_layout,
            &scene_source,
            &self.bloom_down.sampler,
            Some(&self.bloom_level_uniforms[0]),
        );
        self.jobs.push(PostJob {
            pipeline: self.bloom_down.pipeline.clone(),
            bind_group,
            target: ctx.targets.bloom().mip_views[0].clone(),
            load: false,
            viewport: None,
        });

        // Downsample chain: exactly `max_level - 1` iterations.
        for dst_level in plan.downsample_targets() {
            let (src_w, src_h) = ctx.targets.bloom().mip_size(dst_level - 1);
            ctx.queue.write_buffer(
                &self.bloom_level_uniforms[dst_level as usize],
                0,
                bytemuck::bytes_of(&BloomLevelUniforms {
                    params: Vec4::new(1.0 / src_w as f32, 1.0 / src_h as f32, 0.0, 0.0),
                    prefilter,
                }),
            );
            let bind_group = self.simple_bind(
                ctx.device,
                &self.bloom_layout,
                &ctx.targets.bloom().mip_views[(dst_level - 1) as usize],
                &self.bloom_down.sampler,
                Some(&self.bloom_level_uniforms[dst_level as usize]),
            );
            self.jobs.push(PostJob {
                pipeline: self.bloom_down.pipeline.clone(),
                bind_group,
                target: ctx.targets.bloom().mip_views[dst_level as usize].clone(),
                load: false,
                viewport: None,
            });
        }

        // Upsample chain: strictly descending destination levels, ending at
        // level 0, additively blended.
        for dst_level in plan.upsample_targets() {
            let (src_w, src_h) = ctx.targets.bloom().mip_size(dst_level + 1);
            ctx.queue.write_buffer(
                &self.bloom_up_uniforms[dst_level as usize],
                0,
                bytemuck::bytes_of(&BloomLevelUniforms {
                    params: Vec4::new(
                        1.0 / src_w as f32,
                        1.0 / src_h as f32,
                        0.0,
                        env.bloom.filter_radius,
                    ),
                    prefilter,
                }),
            );
            let bind_group = self.simple_bind(
                ctx.device,
                &self.bloom_layout,
                &ctx.targets.bloom().mip_views[(dst_level + 1) as usize],
                &self.bloom_up.sampler,
                Some(&self.bloom_up_uniforms[dst_level as usize]),
            );
            self.jobs.push(PostJob {
                pipeline: self.bloom_up.pipeline.clone(),
                bind_group,
                target: ctx.targets.bloom().mip_views[dst_level as usize].clone(),
                load: true,
                viewport: None,
            });
        }

        // Composite bloom over the scene into the current write buffer.
        let mode = match env.bloom.mode {
            BloomMode::Disabled => 0.0,
            BloomMode::Mix => 1.0,
            BloomMode::Additive => 2.0,
            BloomMode::Screen => 3.0,
        };
        ctx.queue.write_buffer(
            &self.bloom_mix_uniforms,
            0,
            bytemuck::bytes_of(&BloomMixUniforms {
                params: Vec4::new(mode, env.bloom.intensity, 0.0, 0.0),
            }),
        );

        let write = ctx.targets.get(TargetId::Scene).clone();
        let bloom_view = ctx.targets.bloom().mip_views[0].clone();
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Mix BindGroup"),
            layout: &self.bloom_mix_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&scene_source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&bloom_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.bloom_mix.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.bloom_mix_uniforms.as_entire_binding(),
                },
            ],
        });
        self.jobs.push(PostJob {
            pipeline: self.bloom_mix.pipeline.clone(),
            bind_group,
            target: write,
            load: false,
            viewport: None,
        });
    }

    pub fn run(&self, ctx: &RenderContext, encoder: &mut wgpu::CommandEncoder) {
        for job in &self.jobs {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Post Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &job.target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if job.load {
                            wgpu::LoadOp::Load
                        } else {
                            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
                        },
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some((x, y, w, h)) = job.viewport {
                pass.set_viewport(x, y, w, h, 0.0, 1.0);
            }

            pass.set_pipeline(&job.pipeline);
            pass.set_bind_group(0, &ctx.binder.frame_bind_group, &[]);
            pass.set_bind_group(1, &job.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bloom_plan_downsample_count_matches_levels() {
        for mips in 1..=8u32 {
            let plan = BloomPlan::new(mips, 1.0);
            assert_eq!(plan.downsample_targets().len() as u32, plan.max_level - 1);
        }
    }

    #[test]
    fn bloom_plan_upsample_descends_to_zero() {
        let plan = BloomPlan::new(6, 1.0);
        let ups = plan.upsample_targets();
        assert_eq!(*ups.last().unwrap(), 0);
        for pair in ups.windows(2) {
            assert!(pair[0] > pair[1], "upsample levels must strictly descend");
        }
    }

    #[test]
    fn bloom_plan_levels_fraction_clamps() {
        assert_eq!(BloomPlan::new(6, 0.0).max_level, 1);
        assert_eq!(BloomPlan::new(6, 2.0).max_level, 6);
        assert_eq!(BloomPlan::new(6, 0.5).max_level, 3);
    }

    #[test]
    fn letterbox_preserves_aspect() {
        // 2:1 source into a square destination → pillarless letterbox.
        let (x, y, w, h) = letterbox_rect((200, 100), (100, 100));
        assert_eq!((x, y, w, h), (0.0, 25.0, 100.0, 50.0));
    }
}
