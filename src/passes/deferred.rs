//! Deferred shading passes: per-light accumulation, ambient/IBL, compose.
//!
//! The light pass additively accumulates every visible light's contribution
//! into the diffuse + specular buffers, one fullscreen draw per light,
//! scissored to the light's screen-space rectangle (directional lights
//! cover the full screen). Shadowed lights bind their shadow map — a cube
//! map for omni lights, a 2D map otherwise — plus bias/softness parameters.
//!
//! The ambient pass then adds either the sky-derived irradiance/prefilter
//! contribution or a flat ambient term, modulated by the SSAO/SSIL/SSR
//! results when available.
//!
//! Compose combines both accumulation channels into the scene color buffer
//! through a depth test that only writes pixels the geometry pass touched.

use glam::Vec4;

use crate::context::RenderContext;
use crate::light::LightKind;
use crate::light::manager::{ScreenRect, light_screen_rect};
use crate::pipeline::fullscreen::{
    FullscreenDesc, FullscreenPass, additive_blend, cube_entry, depth_entry, depth_touched_only,
    point_sampler_entry, sampler_entry, texture_entry, uniform_entry,
};
use crate::pipeline::uniforms::DeferredLightUniforms;
use crate::settings::{DEPTH_TEXTURE_FORMAT, HDR_TEXTURE_FORMAT};
use crate::target::TargetId;

use super::UniformArena;

const LIGHTING_SHADER: &str = include_str!("../../shaders/deferred_light.wgsl");
const AMBIENT_SHADER: &str = include_str!("../../shaders/ambient.wgsl");
const AMBIENT_IBL_SHADER: &str = include_str!("../../shaders/ambient_ibl.wgsl");
const COMPOSE_SHADER: &str = include_str!("../../shaders/compose.wgsl");

/// 1×1 fallback views for optional screen-space inputs and shadow maps.
struct FallbackViews {
    white: wgpu::TextureView,
    black: wgpu::TextureView,
    depth_2d: wgpu::TextureView,
    depth_cube: wgpu::TextureView,
}

impl FallbackViews {
    fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Fallback Shadow 2D"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_cube_tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Fallback Shadow Cube"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        Self {
            white: crate::binder::solid_texture(device, queue, [255; 4], "Fallback White"),
            black: crate::binder::solid_texture(device, queue, [0, 0, 0, 255], "Fallback Black"),
            depth_2d: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_cube: depth_cube_tex.create_view(&wgpu::TextureViewDescriptor {
                dimension: Some(wgpu::TextureViewDimension::Cube),
                ..Default::default()
            }),
        }
    }
}

/// Builds a fullscreen pipeline targeting the diffuse + specular MRT pair
/// with additive accumulation.
fn lighting_pipeline(
    device: &wgpu::Device,
    label: &'static str,
    shader_source: &str,
    layouts: &[&wgpu::BindGroupLayout],
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shader_source.into()),
    });

    let layouts: Vec<Option<&wgpu::BindGroupLayout>> = layouts.iter().map(|l| Some(*l)).collect();
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &layouts,
        immediate_size: 0,
    });

    let target = Some(wgpu::ColorTargetState {
        format: HDR_TEXTURE_FORMAT,
        blend: Some(additive_blend()),
        write_mask: wgpu::ColorWrites::ALL,
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[target.clone(), target],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

// ---------------------------------------------------------------------------
// Deferred light accumulation
// ---------------------------------------------------------------------------

struct LightDraw {
    bind_group: wgpu::BindGroup,
    dynamic_offset: u32,
    scissor: ScreenRect,
}

pub struct DeferredLightPass {
    pipeline: wgpu::RenderPipeline,
    gbuffer_layout: wgpu::BindGroupLayout,
    shadow_layout: wgpu::BindGroupLayout,
    comparison_sampler: wgpu::Sampler,
    point_sampler: wgpu::Sampler,
    linear_sampler: wgpu::Sampler,
    fallbacks: FallbackViews,
    lights: UniformArena,
    gbuffer_bind_group: Option<wgpu::BindGroup>,
    draws: Vec<LightDraw>,
}

impl DeferredLightPass {
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let gbuffer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Deferred Light GBuffer Layout"),
            entries: &[
                texture_entry(0), // albedo
                texture_entry(1), // normal
                depth_entry(2),   // depth
                texture_entry(3), // orm
                texture_entry(4), // ssao
                point_sampler_entry(5),
                sampler_entry(6),
                // Binding 7: per-light uniforms (dynamic offset)
                wgpu::BindGroupLayoutEntry {
                    binding: 7,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<DeferredLightUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Deferred Light Shadow Layout"),
            entries: &[
                // Binding 0: 2D shadow map (directional / spot)
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
                // Binding 1: cube shadow map (omni)
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                // Binding 2: comparison sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let pipeline = lighting_pipeline(
            device,
            "Deferred Light Pass",
            LIGHTING_SHADER,
            &[frame_layout, &gbuffer_layout, &shadow_layout],
        );

        let comparison_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Comparison Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        let point_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Deferred Point Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Deferred Linear Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            pipeline,
            gbuffer_layout,
            shadow_layout,
            comparison_sampler,
            point_sampler,
            linear_sampler,
            fallbacks: FallbackViews::new(device, queue),
            lights: UniformArena::new(
                device,
                std::mem::size_of::<DeferredLightUniforms>() as u32,
                "Deferred Light Uniforms",
            ),
            gbuffer_bind_group: None,
            draws: Vec::new(),
        }
    }

    pub fn prepare(&mut self, ctx: &mut RenderContext) {
        self.draws.clear();
        self.gbuffer_bind_group = None;
        self.lights.clear();

        if !ctx.outputs.geometry_ran || !ctx.lights.has_visible() {
            return;
        }

        self.lights
            .reserve(ctx.device, ctx.lights.len() as u32);

        let (width, height) = ctx.targets.size();

        let ssao_view = match ctx.outputs.ssao {
            Some(id) => ctx.targets.get(id).clone(),
            None => self.fallbacks.white.clone(),
        };

        self.gbuffer_bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Deferred Light GBuffer BindGroup"),
            layout: &self.gbuffer_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(
                        ctx.targets.get(TargetId::Albedo),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(
                        ctx.targets.get(TargetId::Normal),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.get(TargetId::Depth)),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.get(TargetId::Orm)),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&ssao_view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&self.point_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(&self.linear_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.lights.buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(
                            std::mem::size_of::<DeferredLightUniforms>() as u64
                        ),
                    }),
                },
            ],
        }));

        let ssao_affect = if ctx.outputs.ssao.is_some() {
            ctx.env.ssao.light_affect
        } else {
            0.0
        };

        let visible: Vec<_> = ctx
            .lights
            .visible_lights()
            .map(|(id, light, runtime)| (id, light.clone(), runtime.bounded, runtime.volume))
            .collect();

        for (id, light, bounded, volume) in visible {
            let scissor =
                light_screen_rect(&volume, bounded, &ctx.view.view_projection, width, height);
            if scissor.is_empty() {
                continue;
            }

            let runtime = ctx.lights.runtime(id);
            let shadow_map = runtime.and_then(|rt| rt.shadow_map.as_ref());
            let has_shadow = light.cast_shadows && shadow_map.is_some();

            let (kind, inner, outer) = match light.kind {
                LightKind::Directional => (0.0, 0.0, 0.0),
                LightKind::Spot {
                    inner_cone,
                    outer_cone,
                } => (1.0, inner_cone.cos(), outer_cone.cos()),
                LightKind::Omni => (2.0, 0.0, 0.0),
            };

            let uniforms = DeferredLightUniforms {
                position_range: light.position.extend(light.range),
                direction_type: light.direction.extend(kind),
                color_energy: light.color.extend(light.energy),
                params: Vec4::new(light.attenuation, inner, outer, light.specular),
                shadow_params: Vec4::new(
                    shadow_map.map_or(0.0, crate::light::manager::ShadowMap::texel_size),
                    light.shadow.softness,
                    light.shadow.depth_bias,
                    light.shadow.slope_bias,
                ),
                shadow_extra: Vec4::new(
                    light.near,
                    light.range,
                    f32::from(u8::from(has_shadow)),
                    ssao_affect,
                ),
                shadow_matrix: runtime.map_or(glam::Mat4::IDENTITY, |rt| rt.view_projections[0]),
            };
            let dynamic_offset = self.lights.push(bytemuck::bytes_of(&uniforms));

            let (shadow_2d, shadow_cube) = match (&light.kind, shadow_map) {
                (LightKind::Omni, Some(map)) => (&self.fallbacks.depth_2d, &map.sample_view),
                (_, Some(map)) => (&map.sample_view, &self.fallbacks.depth_cube),
                (_, None) => (&self.fallbacks.depth_2d, &self.fallbacks.depth_cube),
            };

            let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Deferred Light Shadow BindGroup"),
                layout: &self.shadow_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(shadow_2d),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(shadow_cube),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.comparison_sampler),
                    },
                ],
            });

            self.draws.push(LightDraw {
                bind_group,
                dynamic_offset,
                scissor,
            });
        }

        self.lights.upload(ctx.queue);
    }

    pub fn run(&self, ctx: &mut RenderContext, encoder: &mut wgpu::CommandEncoder) {
        let Some(gbuffer_bind_group) = &self.gbuffer_bind_group else {
            return;
        };
        if self.draws.is_empty() {
            return;
        }

        // First accumulator into the lighting pair clears it.
        let load = if ctx.outputs.lighting_cleared {
            wgpu::LoadOp::Load
        } else {
            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
        };
        ctx.outputs.lighting_cleared = true;

        let attachment = |id| {
            Some(wgpu::RenderPassColorAttachment {
                view: ctx.targets.get(id),
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Deferred Light Pass"),
            color_attachments: &[
                attachment(TargetId::Diffuse),
                attachment(TargetId::Specular),
            ],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &ctx.binder.frame_bind_group, &[]);

        for draw in &self.draws {
            pass.set_scissor_rect(
                draw.scissor.x,
                draw.scissor.y,
                draw.scissor.width,
                draw.scissor.height,
            );
            pass.set_bind_group(1, gbuffer_bind_group, &[draw.dynamic_offset]);
            pass.set_bind_group(2, &draw.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}

// ---------------------------------------------------------------------------
// Deferred ambient / IBL
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct AmbientUniforms {
    /// rgb = ambient color, w = ambient energy.
    ambient: Vec4,
    /// x = reflect energy, y = SSR max mip, z = ssil energy scale.
    shaping: Vec4,
    /// Sky orientation quaternion (IBL variant).
    sky_rotation: Vec4,
}

pub struct DeferredAmbientPass {
    flat_pipeline: wgpu::RenderPipeline,
    ibl_pipeline: wgpu::RenderPipeline,
    flat_layout: wgpu::BindGroupLayout,
    ibl_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    point_sampler: wgpu::Sampler,
    uniforms: wgpu::Buffer,
    fallbacks: FallbackViews,
    /// (bind group, uses IBL pipeline)
    draw: Option<(wgpu::BindGroup, bool)>,
}

impl DeferredAmbientPass {
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let flat_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Deferred Ambient Layout"),
            entries: &[
                texture_entry(0), // albedo
                texture_entry(1), // orm
                texture_entry(2), // ssao
                texture_entry(3), // ssil
                texture_entry(4), // ssr (mipped)
                sampler_entry(5),
                uniform_entry(6),
            ],
        });

        let ibl_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Deferred Ambient IBL Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                texture_entry(4),
                sampler_entry(5),
                uniform_entry(6),
                texture_entry(7), // normal
                depth_entry(8),
                point_sampler_entry(9),
                cube_entry(10), // irradiance
                cube_entry(11), // prefilter
            ],
        });

        let flat_pipeline = lighting_pipeline(
            device,
            "Deferred Ambient Pass",
            AMBIENT_SHADER,
            &[frame_layout, &flat_layout],
        );
        let ibl_pipeline = lighting_pipeline(
            device,
            "Deferred Ambient IBL Pass",
            AMBIENT_IBL_SHADER,
            &[frame_layout, &ibl_layout],
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Ambient Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });
        let point_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Ambient Point Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Ambient Uniforms"),
            size: std::mem::size_of::<AmbientUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            flat_pipeline,
            ibl_pipeline,
            flat_layout,
            ibl_layout,
            sampler,
            point_sampler,
            uniforms,
            fallbacks: FallbackViews::new(device, queue),
            draw: None,
        }
    }

    pub fn prepare(&mut self, ctx: &mut RenderContext) {
        self.draw = None;
        if !ctx.outputs.geometry_ran {
            return;
        }

        let env = ctx.env;
        let sky = env.background.sky.as_ref();

        ctx.queue.write_buffer(
            &self.uniforms,
            0,
            bytemuck::bytes_of(&AmbientUniforms {
                ambient: env.ambient.color.extend(env.ambient.energy),
                shaping: Vec4::new(
                    env.ambient.reflect,
                    (ctx.targets.ssr().mip_count() - 1) as f32,
                    env.ssil.energy,
                    0.0,
                ),
                sky_rotation: sky.map_or(Vec4::new(0.0, 0.0, 0.0, 1.0), |s| {
                    Vec4::from(s.rotation.to_array())
                }),
            }),
        );

        let ssao = match ctx.outputs.ssao {
            Some(id) => ctx.targets.get(id).clone(),
            None => self.fallbacks.white.clone(),
        };
        let ssil = match ctx.outputs.ssil {
            Some(id) => ctx.targets.get(id).clone(),
            None => self.fallbacks.black.clone(),
        };
        let ssr = match ctx.outputs.ssr {
            Some(id) => ctx.targets.get(id).clone(),
            None => self.fallbacks.black.clone(),
        };

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(ctx.targets.get(TargetId::Albedo)),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(ctx.targets.get(TargetId::Orm)),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&ssao),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(&ssil),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::TextureView(&ssr),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
            wgpu::BindGroupEntry {
                binding: 6,
                resource: self.uniforms.as_entire_binding(),
            },
        ];

        let (layout, use_ibl) = if let Some(sky) = sky {
            entries.extend([
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::TextureView(
                        ctx.targets.get(TargetId::Normal),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 8,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.get(TargetId::Depth)),
                },
                wgpu::BindGroupEntry {
                    binding: 9,
                    resource: wgpu::BindingResource::Sampler(&self.point_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 10,
                    resource: wgpu::BindingResource::TextureView(&sky.irradiance),
                },
                wgpu::BindGroupEntry {
                    binding: 11,
                    resource: wgpu::BindingResource::TextureView(&sky.prefilter),
                },
            ]);
            (&self.ibl_layout, true)
        } else {
            (&self.flat_layout, false)
        };

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Deferred Ambient BindGroup"),
            layout,
            entries: &entries,
        });

        self.draw = Some((bind_group, use_ibl));
    }

    pub fn run(&self, ctx: &mut RenderContext, encoder: &mut wgpu::CommandEncoder) {
        let Some((bind_group, use_ibl)) = &self.draw else {
            return;
        };

        // The light pass usually clears the pair first; with zero visible
        // lights the clear falls to this pass.
        let load = if ctx.outputs.lighting_cleared {
            wgpu::LoadOp::Load
        } else {
            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
        };
        ctx.outputs.lighting_cleared = true;

        let attachment = |id| {
            Some(wgpu::RenderPassColorAttachment {
                view: ctx.targets.get(id),
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Deferred Ambient Pass"),
            color_attachments: &[
                attachment(TargetId::Diffuse),
                attachment(TargetId::Specular),
            ],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(if *use_ibl {
            &self.ibl_pipeline
        } else {
            &self.flat_pipeline
        });
        pass.set_bind_group(0, &ctx.binder.frame_bind_group, &[]);
        pass.set_bind_group(1, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

// ---------------------------------------------------------------------------
// Compose
// ---------------------------------------------------------------------------

pub struct ComposePass {
    pass: FullscreenPass,
    layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
}

impl ComposePass {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Compose Layout"),
            entries: &[texture_entry(0), texture_entry(1), sampler_entry(2)],
        });

        let pass = FullscreenPass::new(
            device,
            &FullscreenDesc {
                label: "Compose Pass",
                shader_source: COMPOSE_SHADER,
                depth: Some(depth_touched_only()),
                bind_group_layouts: &[&layout],
                ..Default::default()
            },
        );

        Self {
            pass,
            layout,
            bind_group: None,
        }
    }

    pub fn prepare(&mut self, ctx: &mut RenderContext) {
        self.bind_group = None;
        if !ctx.outputs.geometry_ran {
            return;
        }

        self.bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Compose BindGroup"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(
                        ctx.targets.get(TargetId::Diffuse),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(
                        ctx.targets.get(TargetId::Specular),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.pass.sampler),
                },
            ],
        }));
    }

    pub fn run(&self, ctx: &mut RenderContext, encoder: &mut wgpu::CommandEncoder) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Compose Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.targets.get(TargetId::Scene),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
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

        pass.set_pipeline(&self.pass.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
