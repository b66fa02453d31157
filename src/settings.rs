//! Renderer Settings & Feature Flags
//!
//! [`RendererSettings`] is consumed once when the renderer is created to
//! size the render target pool and pick formats. [`RenderFlags`] is the
//! runtime feature-flag set: every flag may be toggled independently between
//! frames and takes effect at the next `end_frame`.
//!
//! # Flag Overview
//!
//! | Flag | Effect when set |
//! |------|-----------------|
//! | `FRUSTUM_CULLING` | Cull draw groups against view/light frustums |
//! | `OPAQUE_SORTING` | Sort the deferred bucket front-to-back |
//! | `TRANSPARENT_SORTING` | Sort prepass/forward buckets back-to-front |
//! | `FXAA` | Run the anti-aliasing stage of the post chain |
//! | `ASPECT_KEEP` | Letterbox the final blit instead of stretching |
//! | `BLIT_LINEAR` | Bilinear filtering for the final blit |
//!
//! The pass sequence tolerates any combination: with culling disabled every
//! group is treated as visible, and with sorting disabled buckets stay in
//! submission order.

use bitflags::bitflags;

bitflags! {
    /// Runtime feature flags, checked at the point of use each frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RenderFlags: u32 {
        /// Frustum-cull draw groups (view frustum and per-light frustums).
        const FRUSTUM_CULLING     = 1 << 0;
        /// Sort the deferred bucket front-to-back for early depth rejection.
        const OPAQUE_SORTING      = 1 << 1;
        /// Sort prepass/forward buckets back-to-front for blending
        /// correctness.
        const TRANSPARENT_SORTING = 1 << 2;
        /// Post-process anti-aliasing (FXAA).
        const FXAA                = 1 << 3;
        /// Preserve the render aspect ratio in the final blit (letterbox).
        const ASPECT_KEEP         = 1 << 4;
        /// Bilinear filtering in the final blit (nearest otherwise).
        const BLIT_LINEAR         = 1 << 5;
    }
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self::FRUSTUM_CULLING
            | Self::OPAQUE_SORTING
            | Self::TRANSPARENT_SORTING
            | Self::BLIT_LINEAR
    }
}

/// HDR format used by every intermediate color target.
pub const HDR_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Depth format used by the scene and shadow depth buffers (reverse-Z).
pub const DEPTH_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Configuration consumed at renderer creation.
#[derive(Debug, Clone)]
pub struct RendererSettings {
    /// Initial runtime flag set (mutable afterwards through the renderer).
    pub flags: RenderFlags,

    /// Format of the output surface the final blit writes to.
    pub output_format: wgpu::TextureFormat,

    /// Mip levels allocated for the bloom / SSR chains. The effective level
    /// count per frame is further scaled by
    /// [`BloomSettings::levels`](crate::environment::BloomSettings::levels).
    pub mip_chain_levels: u32,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            flags: RenderFlags::default(),
            output_format: wgpu::TextureFormat::Bgra8UnormSrgb,
            mip_chain_levels: 6,
        }
    }
}
