//! The renderer: frame lifecycle, submission API and pass orchestration.
//!
//! A frame is bracketed by [`Renderer::begin_frame`] and
//! [`Renderer::end_frame`]. Between the two, the caller fully re-submits the
//! frame's drawable content through the `submit_*` family; `end_frame`
//! executes the fixed pass sequence and blits the result to the caller's
//! output surface. All per-frame state (draw buckets, visibility masks,
//! prepared bind state) is owned by the current frame and reset at
//! `begin_frame`; nothing here may be touched from another thread.

use std::sync::Arc;

use glam::Mat4;

use crate::binder::{MaterialBinder, PreparedDraw};
use crate::context::{FrameOutputs, RenderContext};
use crate::draw::registry::DrawRegistry;
use crate::draw::visibility::{SortOrder, VisibilityMask, sort_bucket};
use crate::draw::{
    DrawCall, DrawGroup, InstanceData, MeshRef, RenderLayers, ShadowCastMode, SkeletonPose,
    Technique,
};
use crate::environment::Environment;
use crate::errors::{EmberError, Result};
use crate::light::manager::LightManager;
use crate::material::Material;
use crate::math::BoundingBox;
use crate::passes::background::BackgroundPass;
use crate::passes::deferred::{ComposePass, DeferredAmbientPass, DeferredLightPass};
use crate::passes::forward::{ForwardPass, PrepassPass};
use crate::passes::geometry::{DecalPass, GeometryPass};
use crate::passes::post::PostChain;
use crate::passes::screen_space::{SsaoPass, SsilPass, SsrPass};
use crate::passes::shadow::ShadowPass;
use crate::passes::{pack_forward_lights, skipped_by_color_passes};
use crate::pipeline::PipelineCache;
use crate::pipeline::uniforms::{ForwardLightBlock, FrameUniforms};
use crate::settings::{RenderFlags, RendererSettings};
use crate::shader::CustomShader;
use crate::target::{PingPong, TargetPool};
use crate::view::{Camera, ViewState};

// ---------------------------------------------------------------------------
// Caller-facing submission types
// ---------------------------------------------------------------------------

/// Destination surface of a frame, provided by the windowing layer.
#[derive(Clone)]
pub struct OutputTarget {
    pub view: Arc<wgpu::TextureView>,
    pub width: u32,
    pub height: u32,
}

/// A multi-mesh drawable sharing one transform and optional pose.
#[derive(Clone)]
pub struct Model {
    pub meshes: Vec<(MeshRef, Material)>,
    /// Combined local-space bounds of all meshes.
    pub aabb: BoundingBox,
    pub skeleton: Option<SkeletonPose>,
}

/// A projected decal volume (unit cube in local space).
#[derive(Clone)]
pub struct Decal {
    pub material: Material,
}

/// CPU-simulated particle set rendered as an instanced mesh.
#[derive(Clone, Default)]
pub struct ParticleSystem {
    pub transforms: Vec<Mat4>,
    pub colors: Option<Vec<glam::Vec4>>,
    /// World-space bounds of all live particles; `None` disables culling.
    pub aabb: Option<BoundingBox>,
}

struct FramePasses {
    shadow: ShadowPass,
    geometry: GeometryPass,
    decal: DecalPass,
    ssao: SsaoPass,
    lights: DeferredLightPass,
    ssil: SsilPass,
    ssr: SsrPass,
    ambient: DeferredAmbientPass,
    compose: ComposePass,
    background: BackgroundPass,
    prepass: PrepassPass,
    forward: ForwardPass,
    post: PostChain,
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

pub struct Renderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    settings: RendererSettings,

    /// Runtime feature flags, mutable between frames.
    pub flags: RenderFlags,
    /// Environment configuration, read at point of use each `end_frame`.
    pub environment: Environment,
    /// Scene lights. Add/remove/mutate between frames; remember
    /// [`LightManager::mark_shadow_dirty`] when shadow casters move.
    pub lights: LightManager,

    targets: TargetPool,
    binder: MaterialBinder,
    pipelines: PipelineCache,
    registry: DrawRegistry,
    visibility: VisibilityMask,
    passes: FramePasses,

    unit_cube: MeshRef,

    view: ViewState,
    output: Option<OutputTarget>,
    prepared: Vec<PreparedDraw>,
    time: f32,
    dt: f32,
}

impl Renderer {
    /// Creates a renderer and allocates its render target pool.
    ///
    /// Allocation failure (or a zero-sized resolution) is fatal and must be
    /// resolved before any frame runs.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        settings: RendererSettings,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let targets = TargetPool::new(&device, width, height, settings.mip_chain_levels)?;
        let binder = MaterialBinder::new(&device, &queue);
        let pipelines = PipelineCache::new(&device);

        let passes = FramePasses {
            shadow: ShadowPass::new(&device),
            geometry: GeometryPass::new(),
            decal: DecalPass::new(&device),
            ssao: SsaoPass::new(&device, &binder.frame_layout),
            lights: DeferredLightPass::new(&device, &queue, &binder.frame_layout),
            ssil: SsilPass::new(&device, &binder.frame_layout),
            ssr: SsrPass::new(&device, &binder.frame_layout),
            ambient: DeferredAmbientPass::new(&device, &queue, &binder.frame_layout),
            compose: ComposePass::new(&device),
            background: BackgroundPass::new(&device, &binder.frame_layout),
            prepass: PrepassPass::new(),
            forward: ForwardPass::new(),
            post: PostChain::new(
                &device,
                &binder.frame_layout,
                settings.output_format,
                settings.mip_chain_levels,
            ),
        };

        let unit_cube = build_unit_cube(&device);
        let flags = settings.flags;

        Ok(Self {
            device,
            queue,
            settings,
            flags,
            environment: Environment::default(),
            lights: LightManager::new(),
            targets,
            binder,
            pipelines,
            registry: DrawRegistry::new(),
            visibility: VisibilityMask::new(),
            passes,
            unit_cube,
            view: ViewState::default(),
            output: None,
            prepared: Vec::new(),
            time: 0.0,
            dt: 0.0,
        })
    }

    /// Reallocates the render target pool for a new output resolution.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.targets
            .resize(&self.device, width, height, self.settings.mip_chain_levels)
    }

    /// Compiles a custom shading-logic fragment against the default geometry
    /// template. See [`crate::shader::custom`] for the contract.
    pub fn compile_shader(&self, user_source: &str) -> Result<Arc<CustomShader>> {
        CustomShader::compile(&self.device, PipelineCache::geometry_template(), user_source)
            .map(Arc::new)
    }

    // ── Frame lifecycle ────────────────────────────────────────────────────

    /// Establishes the frame's view state and clears per-frame registries.
    ///
    /// `dt` is the elapsed time since the previous frame in seconds (drives
    /// interval-based shadow refresh and time-dependent shading).
    pub fn begin_frame(&mut self, camera: &Camera, output: OutputTarget, dt: f32) {
        self.view = camera.extract_view_state();
        self.output = Some(output);
        self.dt = dt;
        self.time += dt;

        self.registry.begin_frame();

        // Ping-pong chains restart from buffer 0 each frame.
        self.targets.scene_chain = PingPong::default();
        self.targets.ssao_chain = PingPong::default();
        self.targets.ssil_chain = PingPong::default();
    }

    // ── Submission API ─────────────────────────────────────────────────────

    /// Submits a single mesh with a world transform.
    pub fn submit_mesh(&mut self, mesh: &MeshRef, material: &Material, transform: Mat4) {
        let group = self.registry.push_group(DrawGroup {
            transform,
            aabb: mesh.aabb,
            ..Default::default()
        });
        self.registry.push_call(
            DrawCall {
                mesh: mesh.clone(),
                material: material.clone(),
                group,
            },
            group,
            false,
        );
    }

    /// Submits a mesh instanced over a transform array.
    ///
    /// A zero-length array is a silent no-op. Without `aabb`, per-instance
    /// culling responsibility shifts to the caller.
    pub fn submit_mesh_instanced(
        &mut self,
        mesh: &MeshRef,
        material: &Material,
        transform: Mat4,
        instances: InstanceData,
    ) {
        let group = self.registry.push_group(DrawGroup {
            transform,
            aabb: mesh.aabb,
            instances: Some(instances),
            ..Default::default()
        });
        self.registry.push_call(
            DrawCall {
                mesh: mesh.clone(),
                material: material.clone(),
                group,
            },
            group,
            false,
        );
    }

    /// Submits every mesh of a model under one shared group.
    pub fn submit_model(&mut self, model: &Model, transform: Mat4) {
        let group = self.registry.push_group(DrawGroup {
            transform,
            aabb: model.aabb,
            skeleton: model.skeleton.clone(),
            ..Default::default()
        });
        for (mesh, material) in &model.meshes {
            self.registry.push_call(
                DrawCall {
                    mesh: mesh.clone(),
                    material: material.clone(),
                    group,
                },
                group,
                false,
            );
        }
    }

    /// Submits a model instanced over a transform array.
    pub fn submit_model_instanced(
        &mut self,
        model: &Model,
        transform: Mat4,
        instances: InstanceData,
    ) {
        let group = self.registry.push_group(DrawGroup {
            transform,
            aabb: model.aabb,
            skeleton: model.skeleton.clone(),
            instances: Some(instances),
        });
        for (mesh, material) in &model.meshes {
            self.registry.push_call(
                DrawCall {
                    mesh: mesh.clone(),
                    material: material.clone(),
                    group,
                },
                group,
                false,
            );
        }
    }

    /// Submits a decal volume. The transform maps the unit cube onto the
    /// decal's world-space box.
    pub fn submit_decal(&mut self, decal: &Decal, transform: Mat4) {
        let group = self.registry.push_group(DrawGroup {
            transform,
            aabb: BoundingBox::UNIT_CUBE,
            ..Default::default()
        });
        let mut mesh = self.unit_cube.clone();
        mesh.shadow_cast = ShadowCastMode::Disabled;
        self.registry.push_call(
            DrawCall {
                mesh,
                material: decal.material.clone(),
                group,
            },
            group,
            true,
        );
    }

    /// Submits a particle system as an instanced mesh with per-instance
    /// colors. Empty systems are a silent no-op.
    pub fn submit_particles(
        &mut self,
        system: &ParticleSystem,
        mesh: &MeshRef,
        material: &Material,
        transform: Mat4,
    ) {
        if system.transforms.is_empty() {
            return;
        }
        self.submit_mesh_instanced(
            mesh,
            material,
            transform,
            InstanceData {
                transforms: system.transforms.clone(),
                colors: system.colors.clone(),
                combined_aabb: system.aabb,
            },
        );
    }

    // ── End of frame ───────────────────────────────────────────────────────

    /// Executes the full pass sequence and blits to the frame's output
    /// surface. Presenting the surface remains the caller's job.
    pub fn end_frame(&mut self) -> Result<()> {
        let Some(output) = self.output.take() else {
            log::warn!("end_frame called without begin_frame; skipping");
            return Ok(());
        };
        if output.width == 0 || output.height == 0 {
            return Err(EmberError::ZeroSizedTarget {
                width: output.width,
                height: output.height,
            });
        }

        // Light bookkeeping first: shadow staleness and the visible set.
        self.lights
            .update_and_cull(&self.view.frustum, self.view.position, self.dt);

        // Sorting (independently toggleable; passes tolerate any order).
        if self.flags.contains(RenderFlags::OPAQUE_SORTING) {
            sort_bucket(
                &mut self.registry,
                Technique::Deferred,
                self.view.position,
                SortOrder::FrontToBack,
            );
        }
        if self.flags.contains(RenderFlags::TRANSPARENT_SORTING) {
            for technique in [Technique::Prepass, Technique::Forward] {
                sort_bucket(
                    &mut self.registry,
                    technique,
                    self.view.position,
                    SortOrder::BackToFront,
                );
            }
        }

        // Frame uniforms + per-draw bind state.
        let (width, height) = self.targets.size();
        let frame = FrameUniforms {
            view_projection: self.view.view_projection,
            view: self.view.view,
            inverse_view: self.view.inverse_view,
            camera_position: self.view.position.extend(self.time),
            viewport: glam::Vec4::new(
                width as f32,
                height as f32,
                1.0 / width as f32,
                1.0 / height as f32,
            ),
            near_far: glam::Vec4::new(self.view.near, self.view.far, 0.0, 0.0),
            ambient: self
                .environment
                .ambient
                .color
                .extend(self.environment.ambient.energy),
        };
        self.binder.begin_frame(&self.queue, &frame);

        let total_instances: usize = self
            .registry
            .calls()
            .iter()
            .filter_map(|call| self.registry.group(call.group))
            .map(|group| group.instances.as_ref().map_or(1, |i| i.count() as usize))
            .sum();
        self.binder
            .reserve(&self.device, self.registry.calls().len(), total_instances);

        self.prepared.clear();
        for call in self.registry.calls() {
            let Some(group) = self.registry.group(call.group) else {
                // Calls are only recorded against accepted groups; keep the
                // index space dense regardless.
                self.prepared.push(self.binder.prepare_call(
                    &self.device,
                    call,
                    &DrawGroup::default(),
                    &ForwardLightBlock::default(),
                ));
                continue;
            };

            let lights = if skipped_by_color_passes(call, &call.material) {
                ForwardLightBlock::default()
            } else {
                let bounds = group.world_bounds();
                pack_forward_lights(&self.lights, bounds.as_ref())
            };

            self.prepared
                .push(self.binder.prepare_call(&self.device, call, group, &lights));
        }

        // The pass sequence, prepare then run, in identical order.
        let mut outputs = FrameOutputs::default();
        let mut ctx = RenderContext {
            device: &self.device,
            queue: &self.queue,
            targets: &mut self.targets,
            binder: &mut self.binder,
            pipelines: &mut self.pipelines,
            registry: &self.registry,
            visibility: &mut self.visibility,
            lights: &mut self.lights,
            view: &self.view,
            env: &self.environment,
            flags: self.flags,
            dt: self.dt,
            prepared: &self.prepared,
            outputs: &mut outputs,
        };

        let passes = &mut self.passes;

        // Shadow pass culls per light face, so it prepares first; main-view
        // visibility is (re)computed afterwards — culling stays replayable.
        passes.shadow.prepare(&mut ctx);
        if ctx.culling_enabled() {
            let frustum = ctx.view.frustum;
            ctx.visibility.compute(ctx.registry, &frustum);
        } else {
            ctx.visibility.mark_all_visible(ctx.registry);
        }

        passes.geometry.prepare(&mut ctx);
        passes.decal.prepare(&mut ctx);
        passes.ssao.prepare(&mut ctx);
        passes.lights.prepare(&mut ctx);
        passes.ssil.prepare(&mut ctx);
        passes.ssr.prepare(&mut ctx);
        passes.ambient.prepare(&mut ctx);
        passes.compose.prepare(&mut ctx);
        passes.background.prepare(&mut ctx);
        passes.prepass.prepare(&mut ctx);
        passes.forward.prepare(&mut ctx);
        passes
            .post
            .prepare(&mut ctx, &output.view, (output.width, output.height));

        ctx.binder.upload(ctx.queue);

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        passes.shadow.run(&mut encoder);
        passes.geometry.run(&mut ctx, &mut encoder);
        passes.decal.run(&mut ctx, &mut encoder);
        passes.ssao.run(&ctx, &mut encoder);
        passes.lights.run(&mut ctx, &mut encoder);
        passes.ssil.run(&ctx, &mut encoder);
        passes.ssr.run(&mut ctx, &mut encoder);
        passes.ambient.run(&mut ctx, &mut encoder);
        passes.compose.run(&mut ctx, &mut encoder);
        passes.background.run(&mut ctx, &mut encoder);
        passes.prepass.run(&mut ctx, &mut encoder);
        passes.forward.run(&mut ctx, &mut encoder);
        passes.post.run(&ctx, &mut encoder);

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// The layer mask applied to subsequent submissions.
    pub fn set_active_layers(&mut self, layers: RenderLayers) {
        self.registry.active_layers = layers;
    }
}

/// Builds the built-in unit cube used as decal proxy geometry, in the
/// pipeline's fixed vertex layout.
fn build_unit_cube(device: &wgpu::Device) -> MeshRef {
    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Vertex {
        position: [f32; 3],
        normal: [f32; 3],
        tangent: [f32; 4],
        uv: [f32; 2],
        color: [f32; 4],
        joints: [u16; 4],
        weights: [f32; 4],
    }

    // (normal, tangent) per face; corners wound counter-clockwise.
    const FACES: [([f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(36);
    for (normal, tangent) in FACES {
        let n = glam::Vec3::from(normal);
        let t = glam::Vec3::from(tangent);
        let b = n.cross(t);

        let corners = [
            (-t - b) * 0.5 + n * 0.5,
            (t - b) * 0.5 + n * 0.5,
            (t + b) * 0.5 + n * 0.5,
            (-t + b) * 0.5 + n * 0.5,
        ];
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

        for &i in &[0usize, 1, 2, 0, 2, 3] {
            vertices.push(Vertex {
                position: corners[i].to_array(),
                normal,
                tangent: [tangent[0], tangent[1], tangent[2], 1.0],
                uv: uvs[i],
                color: [1.0; 4],
                joints: [0; 4],
                weights: [0.0; 4],
            });
        }
    }

    let buffer = wgpu::util::DeviceExt::create_buffer_init(
        device,
        &wgpu::util::BufferInitDescriptor {
            label: Some("Unit Cube"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        },
    );

    MeshRef {
        vertex_buffer: Arc::new(buffer),
        vertex_count: vertices.len() as u32,
        index: None,
        topology: wgpu::PrimitiveTopology::TriangleList,
        aabb: BoundingBox::UNIT_CUBE,
        shadow_cast: ShadowCastMode::Disabled,
        layers: RenderLayers::default(),
    }
}
