//! GPU pipeline plumbing: the fixed vertex layout, per-draw uniform
//! structures, the technique pipeline cache and the fullscreen-pass helper.

pub mod cache;
pub mod fullscreen;
pub mod uniforms;
pub mod vertex;

pub use cache::{PipelineCache, PipelineKey, PipelineKind};
pub use fullscreen::FullscreenPass;
