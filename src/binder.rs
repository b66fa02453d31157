//! Material / Shader Binder
//!
//! Maps a draw call's material (textures, scalar factors, modes, optional
//! custom shading logic) onto the bind state of the currently selected GPU
//! program. Owns the shared bind group layouts, the built-in fallback
//! textures, the per-frame dynamic uniform allocators and the instance
//! storage buffer.
//!
//! # Texture-unit contract
//!
//! Every geometry program — default or custom — sees the same conceptual
//! texture-unit layout. Units map onto (group, binding) pairs:
//!
//! | Unit | Resource | Group/Binding |
//! |------|----------|---------------|
//! | 0 | bone matrices | 1 / 2 |
//! | 1 | albedo | 2 / 0 |
//! | 2 | normal | 2 / 1 |
//! | 3 | emission | 2 / 2 |
//! | 4 | ORM | 2 / 3 |
//! | 5+ | material custom samplers | 3 / 1+ |
//!
//! Missing maps resolve to built-in 1×1 defaults (white albedo, flat
//! normal, black emission/ORM) so the programs never branch on texture
//! presence.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::draw::{DrawCall, DrawGroup};
use crate::material::{BillboardMode, Material};
use crate::pipeline::uniforms::{
    DrawUniforms, ForwardLightBlock, FrameUniforms, InstanceRecord, aligned_stride,
};
use crate::shader::CustomShader;

/// Creates a 1×1 RGBA8 texture initialized to a single texel value.
pub(crate) fn solid_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    rgba: [u8; 4],
    label: &'static str,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: None,
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Grow-only upload buffer for dynamic-offset uniforms.
struct DynamicUniformBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
    staging: Vec<u8>,
    stride: u32,
    label: &'static str,
}

impl DynamicUniformBuffer {
    fn new(device: &wgpu::Device, stride: u32, label: &'static str) -> Self {
        let capacity = u64::from(stride) * 64;
        Self {
            buffer: Self::create(device, capacity, label),
            capacity,
            staging: Vec::new(),
            stride,
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

    fn clear(&mut self) {
        self.staging.clear();
    }

    /// Appends one entry and returns its dynamic offset.
    fn push(&mut self, bytes: &[u8]) -> u32 {
        debug_assert!(bytes.len() <= self.stride as usize);
        let offset = self.staging.len() as u32;
        self.staging.extend_from_slice(bytes);
        self.staging.resize(offset as usize + self.stride as usize, 0);
        offset
    }
}

/// Fully resolved bind state for one draw call.
pub struct PreparedDraw {
    pub draw_offset: u32,
    pub light_offset: u32,
    /// Key into the binder's per-bone-texture draw bind group cache.
    pub draw_bind_group: Arc<wgpu::BindGroup>,
    pub material_bind_group: Arc<wgpu::BindGroup>,
    /// Present only for calls with a custom shader.
    pub custom_bind_group: Option<Arc<wgpu::BindGroup>>,
    pub instance_count: u32,
}

pub struct MaterialBinder {
    // === Shared layouts ===
    pub frame_layout: wgpu::BindGroupLayout,
    pub draw_layout: wgpu::BindGroupLayout,
    pub material_layout: wgpu::BindGroupLayout,

    // === Built-in fallback textures ===
    white_view: wgpu::TextureView,
    flat_normal_view: wgpu::TextureView,
    black_view: wgpu::TextureView,
    material_sampler: wgpu::Sampler,

    // === Frame uniforms ===
    frame_buffer: wgpu::Buffer,
    pub frame_bind_group: wgpu::BindGroup,

    // === Per-draw dynamic buffers ===
    draw_uniforms: DynamicUniformBuffer,
    light_uniforms: DynamicUniformBuffer,

    // === Instance storage ===
    instance_records: Vec<InstanceRecord>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: u64,

    // === Caches (cleared when a backing buffer is recreated) ===
    draw_bind_groups: FxHashMap<usize, Arc<wgpu::BindGroup>>,
    material_bind_groups: FxHashMap<u64, Arc<wgpu::BindGroup>>,
    custom_layouts: FxHashMap<u64, Arc<wgpu::BindGroupLayout>>,
}

impl MaterialBinder {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame BindGroup Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<FrameUniforms>() as u64
                    ),
                },
                count: None,
            }],
        });

        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw BindGroup Layout"),
            entries: &[
                // Binding 0: per-draw uniforms (dynamic offset)
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<DrawUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                // Binding 1: shared instance records
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Binding 2: bone matrices (texture unit 0)
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Binding 3: forward per-call light block (dynamic offset)
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<ForwardLightBlock>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material BindGroup Layout"),
            entries: &[
                // Bindings 0-3: albedo, normal, emission, ORM (units 1-4)
                Self::texture_entry(0),
                Self::texture_entry(1),
                Self::texture_entry(2),
                Self::texture_entry(3),
                // Binding 4: material sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let white_view = solid_texture(device, queue, [255, 255, 255, 255], "Builtin White");
        let flat_normal_view = solid_texture(device, queue, [128, 128, 255, 255], "Builtin Normal");
        let black_view = solid_texture(device, queue, [0, 0, 0, 255], "Builtin Black");

        let material_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame BindGroup"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let draw_stride = aligned_stride(std::mem::size_of::<DrawUniforms>() as u32, device);
        let light_stride =
            aligned_stride(std::mem::size_of::<ForwardLightBlock>() as u32, device);

        let instance_capacity = 1024 * std::mem::size_of::<InstanceRecord>() as u64;
        let instance_buffer = Self::create_instance_buffer(device, instance_capacity);

        Self {
            frame_layout,
            draw_layout,
            material_layout,
            white_view,
            flat_normal_view,
            black_view,
            material_sampler,
            frame_buffer,
            frame_bind_group,
            draw_uniforms: DynamicUniformBuffer::new(device, draw_stride, "Draw Uniforms"),
            light_uniforms: DynamicUniformBuffer::new(device, light_stride, "Forward Lights"),
            instance_records: Vec::new(),
            instance_buffer,
            instance_capacity,
            draw_bind_groups: FxHashMap::default(),
            material_bind_groups: FxHashMap::default(),
            custom_layouts: FxHashMap::default(),
        }
    }

    const fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
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

    fn create_instance_buffer(device: &wgpu::Device, capacity: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Records"),
            size: capacity,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    // ── Frame lifecycle ────────────────────────────────────────────────────

    /// Resets per-frame allocators and uploads the camera frame uniforms.
    pub fn begin_frame(&mut self, queue: &wgpu::Queue, frame: &FrameUniforms) {
        self.draw_uniforms.clear();
        self.light_uniforms.clear();
        self.instance_records.clear();
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(frame));
    }

    /// Grows the per-draw buffers to hold a frame's worst case *before*
    /// any `prepare_call` runs, so bind groups created during preparation
    /// never reference a buffer that is later recreated mid-frame.
    pub fn reserve(&mut self, device: &wgpu::Device, draw_count: usize, instance_count: usize) {
        let draw_needed = (draw_count as u64) * u64::from(self.draw_uniforms.stride);
        let light_needed = (draw_count as u64) * u64::from(self.light_uniforms.stride);
        let instance_needed =
            (instance_count.max(1) as u64) * std::mem::size_of::<InstanceRecord>() as u64;

        let mut recreated = false;
        for (dynamic, needed) in [
            (&mut self.draw_uniforms, draw_needed),
            (&mut self.light_uniforms, light_needed),
        ] {
            if needed > dynamic.capacity {
                let mut capacity = dynamic.capacity.max(1);
                while capacity < needed {
                    capacity *= 2;
                }
                dynamic.buffer = DynamicUniformBuffer::create(device, capacity, dynamic.label);
                dynamic.capacity = capacity;
                recreated = true;
            }
        }
        if instance_needed > self.instance_capacity {
            let mut capacity = self.instance_capacity.max(1);
            while capacity < instance_needed {
                capacity *= 2;
            }
            self.instance_buffer = Self::create_instance_buffer(device, capacity);
            self.instance_capacity = capacity;
            recreated = true;
        }

        if recreated {
            // Cached draw bind groups reference the old buffers.
            self.draw_bind_groups.clear();
        }
    }

    /// Uploads all staged per-draw data. Must run after every
    /// `prepare_call` of the frame and before command encoding.
    pub fn upload(&mut self, queue: &wgpu::Queue) {
        debug_assert!(self.draw_uniforms.staging.len() as u64 <= self.draw_uniforms.capacity);
        if !self.draw_uniforms.staging.is_empty() {
            queue.write_buffer(&self.draw_uniforms.buffer, 0, &self.draw_uniforms.staging);
        }
        if !self.light_uniforms.staging.is_empty() {
            queue.write_buffer(&self.light_uniforms.buffer, 0, &self.light_uniforms.staging);
        }
        let instance_bytes: &[u8] = bytemuck::cast_slice(&self.instance_records);
        if !instance_bytes.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, instance_bytes);
        }
    }

    // ── Per-call preparation ───────────────────────────────────────────────

    /// Stages uniforms, instances and bind groups for one draw call.
    pub fn prepare_call(
        &mut self,
        device: &wgpu::Device,
        call: &DrawCall,
        group: &DrawGroup,
        lights: &ForwardLightBlock,
    ) -> PreparedDraw {
        // Instance records first so the base index lands in DrawUniforms.
        let (instance_base, instance_count) = match &group.instances {
            Some(instances) => {
                let base = self.instance_records.len() as u32;
                let colors = instances.colors.as_deref();
                for (index, transform) in instances.transforms.iter().enumerate() {
                    let color = colors.map_or(glam::Vec4::ONE, |c| c[index]);
                    self.instance_records
                        .push(InstanceRecord::from_transform(transform, color));
                }
                (base, instances.count())
            }
            None => (0, 1),
        };

        let uniforms = Self::build_draw_uniforms(call, group, instance_base);
        let draw_offset = self.draw_uniforms.push(bytemuck::bytes_of(&uniforms));
        let light_offset = self.light_uniforms.push(bytemuck::bytes_of(lights));

        let draw_bind_group = self.draw_bind_group_for(device, group);
        let material_bind_group = self.material_bind_group_for(device, &call.material);
        let custom_bind_group = call
            .material
            .shader
            .as_ref()
            .map(|shader| self.custom_bind_group_for(device, shader, &call.material));

        PreparedDraw {
            draw_offset,
            light_offset,
            draw_bind_group,
            material_bind_group,
            custom_bind_group,
            instance_count,
        }
    }

    fn build_draw_uniforms(call: &DrawCall, group: &DrawGroup, instance_base: u32) -> DrawUniforms {
        let material = &call.material;
        let normal = group.transform.inverse().transpose();
        let billboard = match material.billboard {
            BillboardMode::Disabled => 0,
            BillboardMode::Front => 1,
            BillboardMode::YAxis => 2,
        };

        DrawUniforms {
            model: group.transform,
            normal_matrix: [normal.col(0), normal.col(1), normal.col(2)],
            albedo_color: material.albedo.color,
            emission: material
                .emission
                .color
                .extend(material.emission.energy),
            orm_factors: glam::Vec4::new(
                material.orm.occlusion,
                material.orm.roughness,
                material.orm.metalness,
                material.normal.scale,
            ),
            uv_transform: glam::Vec4::new(
                material.uv_offset.x,
                material.uv_offset.y,
                material.uv_scale.x,
                material.uv_scale.y,
            ),
            alpha: glam::Vec4::new(
                material.alpha_cutoff,
                material.albedo.color.w,
                0.0,
                0.0,
            ),
            flags: [
                u32::from(group.skeleton.is_some()),
                u32::from(group.instances.is_some()),
                billboard,
                instance_base,
            ],
        }
    }

    fn draw_bind_group_for(
        &mut self,
        device: &wgpu::Device,
        group: &DrawGroup,
    ) -> Arc<wgpu::BindGroup> {
        // One bind group per distinct bone texture; the unskinned path
        // shares a single entry keyed on the builtin white texture.
        let key = group
            .skeleton
            .as_ref()
            .map_or(0usize, |s| Arc::as_ptr(&s.bone_texture) as usize);

        if let Some(cached) = self.draw_bind_groups.get(&key) {
            return cached.clone();
        }

        let bone_view = group
            .skeleton
            .as_ref()
            .map_or(&self.white_view, |s| s.bone_texture.as_ref());

        let bind_group = Arc::new(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw BindGroup"),
            layout: &self.draw_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.draw_uniforms.buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniforms>() as u64),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.instance_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(bone_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.light_uniforms.buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(
                            std::mem::size_of::<ForwardLightBlock>() as u64
                        ),
                    }),
                },
            ],
        }));

        self.draw_bind_groups.insert(key, bind_group.clone());
        bind_group
    }

    fn material_bind_group_for(
        &mut self,
        device: &wgpu::Device,
        material: &Material,
    ) -> Arc<wgpu::BindGroup> {
        let view_key = |t: &Option<crate::material::TextureRef>| {
            t.as_ref().map_or(0usize, |v| Arc::as_ptr(v) as usize) as u64
        };
        let key = view_key(&material.albedo.texture)
            .wrapping_mul(6_364_136_223_846_793_005)
            ^ view_key(&material.normal.texture).wrapping_mul(1_442_695_040_888_963_407)
            ^ view_key(&material.emission.texture).rotate_left(17)
            ^ view_key(&material.orm.texture).rotate_left(37);

        if let Some(cached) = self.material_bind_groups.get(&key) {
            return cached.clone();
        }

        let albedo = material
            .albedo
            .texture
            .as_deref()
            .unwrap_or(&self.white_view);
        let normal = material
            .normal
            .texture
            .as_deref()
            .unwrap_or(&self.flat_normal_view);
        let emission = material
            .emission
            .texture
            .as_deref()
            .unwrap_or(&self.black_view);
        let orm = material.orm.texture.as_deref().unwrap_or(&self.black_view);

        let bind_group = Arc::new(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material BindGroup"),
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(albedo),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(normal),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(emission),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(orm),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.material_sampler),
                },
            ],
        }));

        self.material_bind_groups.insert(key, bind_group.clone());
        bind_group
    }

    /// Bind group layout for a custom shader's parameter group, derived
    /// from its discovered parameter list and cached by shader identity.
    pub fn custom_layout_for(
        &mut self,
        device: &wgpu::Device,
        shader: &CustomShader,
    ) -> Arc<wgpu::BindGroupLayout> {
        if let Some(cached) = self.custom_layouts.get(&shader.id()) {
            return cached.clone();
        }

        let mut entries = Vec::new();
        if shader.uniform_block_size() > 0 {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(u64::from(
                        shader.uniform_block_size(),
                    )),
                },
                count: None,
            });
        }
        for (index, _) in shader
            .params()
            .iter()
            .filter(|p| p.texture_unit.is_some())
            .enumerate()
        {
            entries.push(Self::texture_entry(index as u32 + 1));
        }

        let layout = Arc::new(device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some("Custom Params Layout"),
                entries: &entries,
            },
        ));
        self.custom_layouts.insert(shader.id(), layout.clone());
        layout
    }

    fn custom_bind_group_for(
        &mut self,
        device: &wgpu::Device,
        shader: &Arc<CustomShader>,
        material: &Material,
    ) -> Arc<wgpu::BindGroup> {
        // Parameter values may differ per material, so these bind groups
        // are rebuilt per call rather than cached. Custom-shaded calls are
        // rare enough that this stays off the hot path.
        let layout = self.custom_layout_for(device, shader);

        let mut entries = Vec::new();
        let block_buffer;
        if shader.uniform_block_size() > 0 {
            let block = shader.pack_block(material);
            block_buffer = wgpu::util::DeviceExt::create_buffer_init(
                device,
                &wgpu::util::BufferInitDescriptor {
                    label: Some("Custom Params"),
                    contents: &block,
                    usage: wgpu::BufferUsages::UNIFORM,
                },
            );
            entries.push(wgpu::BindGroupEntry {
                binding: 0,
                resource: block_buffer.as_entire_binding(),
            });
        }

        let textures = shader.resolve_textures(material);
        for (index, (_, view)) in textures.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: index as u32 + 1,
                resource: wgpu::BindingResource::TextureView(view.unwrap_or(&self.white_view)),
            });
        }

        Arc::new(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Custom Params BindGroup"),
            layout: &layout,
            entries: &entries,
        }))
    }
}
