//! Fullscreen-triangle pass helper.
//!
//! Every screen-space stage (SSAO, blurs, deferred ambient/lighting,
//! compose, background, the whole post chain, the final blit) rasterizes a
//! single clip-space triangle (`draw(0..3)`) whose vertex positions are
//! derived from `vertex_index` in the shader. This helper owns the
//! pipeline-building boilerplate those passes share.

use crate::settings::HDR_TEXTURE_FORMAT;

/// Descriptor for building a fullscreen pipeline.
pub struct FullscreenDesc<'a> {
    pub label: &'static str,
    pub shader_source: &'a str,
    pub target_format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
    /// Depth test configuration; `None` disables the depth attachment.
    pub depth: Option<wgpu::DepthStencilState>,
    pub bind_group_layouts: &'a [&'a wgpu::BindGroupLayout],
}

impl Default for FullscreenDesc<'_> {
    fn default() -> Self {
        Self {
            label: "Fullscreen Pass",
            shader_source: "",
            target_format: HDR_TEXTURE_FORMAT,
            blend: Some(wgpu::BlendState::REPLACE),
            depth: None,
            bind_group_layouts: &[],
        }
    }
}

/// Additive accumulation blend (`src + dst`), used by the deferred light
/// and ambient passes and the bloom upsample chain.
#[must_use]
pub fn additive_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

/// Depth state that only passes pixels the geometry pass actually wrote.
///
/// Fullscreen triangles rasterize at the reverse-Z clear value 0; written
/// geometry holds strictly greater depth, so `Less` selects exactly the
/// touched pixels. The background never gets overwritten by compose.
#[must_use]
pub fn depth_touched_only() -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: crate::settings::DEPTH_TEXTURE_FORMAT,
        depth_write_enabled: Some(false),
        depth_compare: Some(wgpu::CompareFunction::Less),
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

/// Depth state for the background pass: only pixels the geometry never
/// touched (still exactly at the reverse-Z clear value 0) pass the
/// `GreaterEqual` test against a fullscreen triangle at 0.
#[must_use]
pub fn depth_untouched_only() -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: crate::settings::DEPTH_TEXTURE_FORMAT,
        depth_write_enabled: Some(false),
        depth_compare: Some(wgpu::CompareFunction::GreaterEqual),
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

/// Bind group layout entry for a filterable 2D texture.
#[must_use]
pub const fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Bind group layout entry for a cube texture.
#[must_use]
pub const fn cube_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::Cube,
            multisampled: false,
        },
        count: None,
    }
}

/// Bind group layout entry for the (non-filterable) scene depth texture.
#[must_use]
pub const fn depth_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Depth,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Bind group layout entry for a filtering sampler.
#[must_use]
pub const fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Bind group layout entry for a non-filtering sampler (depth reads).
#[must_use]
pub const fn point_sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
        count: None,
    }
}

/// Bind group layout entry for a uniform buffer.
#[must_use]
pub const fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// A compiled fullscreen pipeline with its shared linear-clamp sampler.
pub struct FullscreenPass {
    pub pipeline: wgpu::RenderPipeline,
    pub sampler: wgpu::Sampler,
}

impl FullscreenPass {
    #[must_use]
    pub fn new(device: &wgpu::Device, desc: &FullscreenDesc) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.shader_source.into()),
        });

        let bind_group_layouts: Vec<Option<&wgpu::BindGroupLayout>> =
            desc.bind_group_layouts.iter().map(|l| Some(*l)).collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &bind_group_layouts,
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
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
                targets: &[Some(wgpu::ColorTargetState {
                    format: desc.target_format,
                    blend: desc.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: desc.depth.clone(),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(desc.label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self { pipeline, sampler }
    }
}
