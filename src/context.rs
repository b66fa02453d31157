//! Frame context threaded through the pass sequence.
//!
//! The "currently bound program / currently bound target" notions that a
//! raw GPU API keeps as ambient state are modeled here as an explicit
//! context object: every pass receives the same [`RenderContext`] during
//! its prepare phase (mutable) and execute phase (shared), so passes stay
//! independently testable and never reach for globals.

use crate::binder::{MaterialBinder, PreparedDraw};
use crate::draw::registry::DrawRegistry;
use crate::draw::visibility::VisibilityMask;
use crate::environment::Environment;
use crate::light::manager::LightManager;
use crate::pipeline::PipelineCache;
use crate::settings::RenderFlags;
use crate::target::{TargetId, TargetPool};
use crate::view::ViewState;

/// What the earlier passes of the frame produced for the later ones.
///
/// Screen-space passes record their result target here (or leave `None`
/// as the "unavailable" marker); consumers substitute neutral defaults.
#[derive(Debug, Default, Clone)]
pub struct FrameOutputs {
    /// The geometry pass ran and filled the G-buffer this frame.
    pub geometry_ran: bool,
    /// Some accumulation pass already cleared the diffuse/specular pair;
    /// later accumulators must load instead of clearing.
    pub lighting_cleared: bool,
    pub ssao: Option<TargetId>,
    pub ssil: Option<TargetId>,
    pub ssr: Option<TargetId>,
}

/// Everything a pass may touch, borrowed from the renderer for the
/// duration of one `end_frame`.
pub struct RenderContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,

    pub targets: &'a mut TargetPool,
    pub binder: &'a mut MaterialBinder,
    pub pipelines: &'a mut PipelineCache,

    pub registry: &'a DrawRegistry,
    pub visibility: &'a mut VisibilityMask,
    pub lights: &'a mut LightManager,

    pub view: &'a ViewState,
    pub env: &'a Environment,
    pub flags: RenderFlags,
    /// Elapsed seconds since the previous frame.
    pub dt: f32,

    /// Per-call bind state prepared by the renderer, indexed by the
    /// registry's call indices.
    pub prepared: &'a [PreparedDraw],

    pub outputs: &'a mut FrameOutputs,
}

impl RenderContext<'_> {
    /// Whether frustum culling is active this frame.
    #[must_use]
    pub fn culling_enabled(&self) -> bool {
        self.flags.contains(RenderFlags::FRUSTUM_CULLING)
    }
}
