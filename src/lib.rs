//! Ember — a deferred + forward per-frame rendering pipeline for wgpu.
//!
//! Ember collects submitted drawable geometry, determines visibility, sorts
//! and batches it, and executes a fixed sequence of GPU passes — shadow
//! maps, G-buffer geometry, decals, screen-space effects, deferred
//! lighting, forward transparency and a post-processing chain — producing a
//! final composited image on a caller-provided surface.
//!
//! Asset loading, windowing and input stay outside: meshes, textures and
//! skeleton poses arrive as GPU handles, and the output surface arrives as
//! a texture view per frame.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod binder;
pub mod context;
pub mod draw;
pub mod environment;
pub mod errors;
pub mod light;
pub mod material;
pub mod math;
pub mod passes;
pub mod pipeline;
pub mod renderer;
pub mod settings;
pub mod shader;
pub mod target;
pub mod view;

pub use draw::{
    DrawCall, DrawGroup, GroupHandle, InstanceData, MeshRef, RenderLayers, ShadowCastMode,
    SkeletonPose, Technique,
};
pub use environment::Environment;
pub use errors::{EmberError, Result};
pub use light::{Light, LightId, LightKind, ShadowUpdateMode};
pub use material::{BillboardMode, BlendMode, CullMode, Material, ParamValue, TransparencyMode};
pub use math::{BoundingBox, Frustum};
pub use renderer::{Decal, Model, OutputTarget, ParticleSystem, Renderer};
pub use settings::{RenderFlags, RendererSettings};
pub use shader::{CustomShader, ParamType, ShaderParam};
pub use view::{Camera, ViewState};
