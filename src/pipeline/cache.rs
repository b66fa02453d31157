//! Pipeline cache for the draw techniques.
//!
//! Draw pipelines are keyed by technique × raster state. The fixed vertex
//! layout and the small closed set of techniques keep the key space tiny; a
//! steady-state frame compiles nothing.
//!
//! Fullscreen passes build their pipelines through
//! [`FullscreenPass`](crate::pipeline::FullscreenPass) and do not go through
//! this cache.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::binder::MaterialBinder;
use crate::material::{BlendMode, Material, TransparencyMode};
use crate::pipeline::vertex;
use crate::settings::{DEPTH_TEXTURE_FORMAT, HDR_TEXTURE_FORMAT};
use crate::shader::CustomShader;

/// The draw techniques that rasterize scene geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Opaque G-buffer fill (4 attachments, depth write).
    GBuffer,
    /// Decal blend into the G-buffer (no depth attachment; depth is
    /// sampled and tested in the fragment stage).
    Decal,
    /// Depth-only rasterization (shadow maps and the transparency
    /// prepass; the depth compare in the key distinguishes them).
    Depth,
    /// Forward-lit color into the scene buffer.
    Forward,
}

/// Cache key: one compiled pipeline per distinct state combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub kind: PipelineKind,
    pub cull: Option<wgpu::Face>,
    pub blend: Option<wgpu::BlendState>,
    pub depth_compare: wgpu::CompareFunction,
    pub depth_write: bool,
    pub topology: wgpu::PrimitiveTopology,
    /// Custom shader identity (0 = default program).
    pub custom_shader: u64,
}

impl PipelineKey {
    /// Key for the opaque geometry pass.
    #[must_use]
    pub fn gbuffer(material: &Material) -> Self {
        Self {
            kind: PipelineKind::GBuffer,
            cull: material.cull.to_wgpu(),
            blend: None,
            depth_compare: wgpu::CompareFunction::Greater,
            depth_write: true,
            topology: wgpu::PrimitiveTopology::TriangleList,
            custom_shader: material.shader.as_ref().map_or(0, |s| s.id()),
        }
    }

    /// Key for shadow-map rasterization (standard-Z light projections).
    #[must_use]
    pub fn shadow(cull: Option<wgpu::Face>, topology: wgpu::PrimitiveTopology) -> Self {
        Self {
            kind: PipelineKind::Depth,
            cull,
            blend: None,
            depth_compare: wgpu::CompareFunction::LessEqual,
            depth_write: true,
            topology,
            custom_shader: 0,
        }
    }

    /// Key for the transparency depth prepass (reverse-Z scene depth).
    #[must_use]
    pub fn prepass(material: &Material, topology: wgpu::PrimitiveTopology) -> Self {
        Self {
            kind: PipelineKind::Depth,
            cull: material.cull.to_wgpu(),
            blend: None,
            depth_compare: wgpu::CompareFunction::Greater,
            depth_write: true,
            topology,
            custom_shader: 0,
        }
    }

    /// Key for the decal pass.
    #[must_use]
    pub fn decal(material: &Material) -> Self {
        Self {
            kind: PipelineKind::Decal,
            // Culling disabled so the camera can sit inside the decal box.
            cull: None,
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            depth_compare: wgpu::CompareFunction::Always,
            depth_write: false,
            topology: wgpu::PrimitiveTopology::TriangleList,
            custom_shader: material.shader.as_ref().map_or(0, |s| s.id()),
        }
    }

    /// Key for forward rasterization.
    #[must_use]
    pub fn forward(material: &Material, topology: wgpu::PrimitiveTopology) -> Self {
        Self {
            kind: PipelineKind::Forward,
            cull: material.cull.to_wgpu(),
            blend: Some(forward_blend(material)),
            depth_compare: wgpu::CompareFunction::Greater,
            depth_write: false,
            topology,
            custom_shader: 0,
        }
    }
}

/// Blend state of a forward-rendered material.
#[must_use]
pub fn forward_blend(material: &Material) -> wgpu::BlendState {
    match material.blend {
        BlendMode::Mix => {
            if material.transparency == TransparencyMode::Disabled {
                wgpu::BlendState::REPLACE
            } else {
                wgpu::BlendState::ALPHA_BLENDING
            }
        }
        BlendMode::Additive => wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent::OVER,
        },
        BlendMode::Multiply => wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Dst,
                dst_factor: wgpu::BlendFactor::Zero,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent::OVER,
        },
        BlendMode::PremultipliedAlpha => wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
    }
}

const GEOMETRY_SHADER: &str = include_str!("../../shaders/geometry.wgsl");
const DEPTH_SHADER: &str = include_str!("../../shaders/depth.wgsl");
const DECAL_SHADER: &str = include_str!("../../shaders/decal.wgsl");
const FORWARD_SHADER: &str = include_str!("../../shaders/forward.wgsl");

pub struct PipelineCache {
    pipelines: FxHashMap<PipelineKey, Arc<wgpu::RenderPipeline>>,

    geometry_module: wgpu::ShaderModule,
    depth_module: wgpu::ShaderModule,
    decal_module: wgpu::ShaderModule,
    forward_module: wgpu::ShaderModule,
}

impl PipelineCache {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let compile = |label, source: &str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };

        Self {
            pipelines: FxHashMap::default(),
            geometry_module: compile("Geometry Shader", GEOMETRY_SHADER),
            depth_module: compile("Depth Shader", DEPTH_SHADER),
            decal_module: compile("Decal Shader", DECAL_SHADER),
            forward_module: compile("Forward Shader", FORWARD_SHADER),
        }
    }

    /// Base WGSL template custom shaders are composed against.
    #[must_use]
    pub fn geometry_template() -> &'static str {
        GEOMETRY_SHADER
    }

    /// Number of compiled pipelines currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Looks up or compiles the pipeline for `key`.
    ///
    /// `custom` must be the material's compiled custom shader whenever
    /// `key.custom_shader` is non-zero. `extra_layout` is the pass-owned
    /// group-3 layout of techniques that bind screen resources (decals).
    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        key: PipelineKey,
        binder: &mut MaterialBinder,
        custom: Option<&Arc<CustomShader>>,
        extra_layout: Option<&wgpu::BindGroupLayout>,
    ) -> Arc<wgpu::RenderPipeline> {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return pipeline.clone();
        }

        let custom_layout = custom.map(|shader| binder.custom_layout_for(device, shader));

        let mut group_layouts: Vec<Option<&wgpu::BindGroupLayout>> = vec![
            Some(&binder.frame_layout),
            Some(&binder.draw_layout),
            Some(&binder.material_layout),
        ];
        if let Some(layout) = &custom_layout {
            group_layouts.push(Some(layout));
        } else if let Some(layout) = extra_layout {
            group_layouts.push(Some(layout));
        }

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Draw Pipeline Layout"),
            bind_group_layouts: &group_layouts,
            immediate_size: 0,
        });

        let module = match (key.kind, custom) {
            (PipelineKind::GBuffer | PipelineKind::Decal, Some(shader)) => shader.module(),
            (PipelineKind::GBuffer, None) => &self.geometry_module,
            (PipelineKind::Decal, None) => &self.decal_module,
            (PipelineKind::Depth, _) => &self.depth_module,
            (PipelineKind::Forward, _) => &self.forward_module,
        };

        let color_targets: Vec<Option<wgpu::ColorTargetState>> = match key.kind {
            PipelineKind::GBuffer | PipelineKind::Decal => GBUFFER_FORMATS
                .iter()
                .map(|&format| {
                    Some(wgpu::ColorTargetState {
                        format,
                        blend: key.blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })
                })
                .collect(),
            PipelineKind::Depth => Vec::new(),
            PipelineKind::Forward => vec![Some(wgpu::ColorTargetState {
                format: HDR_TEXTURE_FORMAT,
                blend: key.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        };

        let depth_stencil = match key.kind {
            PipelineKind::Decal => None,
            _ => Some(wgpu::DepthStencilState {
                format: DEPTH_TEXTURE_FORMAT,
                depth_write_enabled: Some(key.depth_write),
                depth_compare: Some(key.depth_compare),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
        };

        let pipeline = Arc::new(device.create_render_pipeline(
            &wgpu::RenderPipelineDescriptor {
                label: Some("Draw Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs_main"),
                    buffers: &[vertex::layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some("fs_main"),
                    targets: &color_targets,
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: key.topology,
                    cull_mode: key.cull,
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            },
        ));

        self.pipelines.insert(key, pipeline.clone());
        pipeline
    }
}

/// G-buffer attachment formats: albedo, normal, emission, ORM.
pub const GBUFFER_FORMATS: [wgpu::TextureFormat; 4] = [
    wgpu::TextureFormat::Rgba8Unorm,
    HDR_TEXTURE_FORMAT,
    HDR_TEXTURE_FORMAT,
    wgpu::TextureFormat::Rgba8Unorm,
];
