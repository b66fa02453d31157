//! Environment Configuration
//!
//! A structured set of per-renderer toggles and parameters read by name at
//! the point of use each frame: ambient light, fog, the screen-space effects
//! (SSAO / SSIL / SSR), bloom, depth of field, tone mapping / color grading,
//! and the sky. Changes take effect on the next `end_frame`; there is no
//! staging or hot-reload machinery.
//!
//! This is deliberately an explicit per-renderer object (not process-wide
//! state) so multiple renderer instances stay independent and frames are
//! deterministic under test.

use std::sync::Arc;

use glam::{Quat, Vec3};

// ---------------------------------------------------------------------------
// Ambient
// ---------------------------------------------------------------------------

/// Flat ambient lighting term, used when no sky is set and as a scale for
/// sky-derived irradiance when one is.
#[derive(Debug, Clone)]
pub struct AmbientSettings {
    pub color: Vec3,
    pub energy: f32,
    /// Scale applied to specular reflections (IBL prefilter / SSR).
    pub reflect: f32,
}

impl Default for AmbientSettings {
    fn default() -> Self {
        Self {
            color: Vec3::splat(0.2),
            energy: 1.0,
            reflect: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Fog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FogMode {
    #[default]
    Disabled,
    /// Linear blend between `start` and `end` distances.
    Linear,
    /// Exponential falloff from `density`.
    Exp,
    /// Squared-exponential falloff from `density`.
    Exp2,
}

/// Depth-based fog blended over the scene in the post chain.
#[derive(Debug, Clone)]
pub struct FogSettings {
    pub mode: FogMode,
    pub color: Vec3,
    pub start: f32,
    pub end: f32,
    pub density: f32,
    /// How strongly fog covers background/sky pixels (0 = not at all).
    pub sky_affect: f32,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            mode: FogMode::Disabled,
            color: Vec3::splat(0.5),
            start: 10.0,
            end: 100.0,
            density: 0.05,
            sky_affect: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Screen-space effects
// ---------------------------------------------------------------------------

/// Screen-space ambient occlusion (half resolution, separable blur).
#[derive(Debug, Clone)]
pub struct SsaoSettings {
    pub enabled: bool,
    pub sample_count: u32,
    pub radius: f32,
    pub bias: f32,
    pub intensity: f32,
    pub power: f32,
    /// How much SSAO darkens direct light in the deferred light pass
    /// (0 = ambient only, 1 = full effect on direct light too).
    pub light_affect: f32,
}

impl Default for SsaoSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            sample_count: 12,
            radius: 0.5,
            bias: 0.025,
            intensity: 1.0,
            power: 1.0,
            light_affect: 0.0,
        }
    }
}

/// Screen-space indirect lighting sampled from the diffuse accumulation
/// buffer (half resolution, separable blur).
#[derive(Debug, Clone)]
pub struct SsilSettings {
    pub enabled: bool,
    pub sample_count: u32,
    pub sample_radius: f32,
    pub slice_count: u32,
    pub hit_thickness: f32,
    pub ao_power: f32,
    pub energy: f32,
}

impl Default for SsilSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            sample_count: 8,
            sample_radius: 2.0,
            slice_count: 4,
            hit_thickness: 0.5,
            ao_power: 1.0,
            energy: 1.0,
        }
    }
}

/// Screen-space reflections: depth/normal ray march, then a mip chain over
/// the result for roughness-aware sampling.
#[derive(Debug, Clone)]
pub struct SsrSettings {
    pub enabled: bool,
    pub max_ray_steps: u32,
    pub binary_search_steps: u32,
    pub ray_march_length: f32,
    pub depth_thickness: f32,
    pub depth_tolerance: f32,
    pub edge_fade_start: f32,
    pub edge_fade_end: f32,
}

impl Default for SsrSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_ray_steps: 64,
            binary_search_steps: 6,
            ray_march_length: 8.0,
            depth_thickness: 0.3,
            depth_tolerance: 0.01,
            edge_fade_start: 0.8,
            edge_fade_end: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Post-processing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BloomMode {
    #[default]
    Disabled,
    /// Blend scene and bloom by intensity.
    Mix,
    /// Add bloom on top of the scene.
    Additive,
    /// Screen-blend bloom over the scene.
    Screen,
}

/// Bloom configuration (Karis-averaged downsample chain + tent upsample).
#[derive(Debug, Clone)]
pub struct BloomSettings {
    pub mode: BloomMode,
    pub intensity: f32,
    pub threshold: f32,
    pub soft_threshold: f32,
    /// Upsample tent filter radius in source texels.
    pub filter_radius: f32,
    /// Fraction (0..=1) of the allocated mip chain actually used.
    pub levels: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            mode: BloomMode::Disabled,
            intensity: 0.1,
            threshold: 1.0,
            soft_threshold: 0.5,
            filter_radius: 1.0,
            levels: 1.0,
        }
    }
}

/// Depth of field: blur sized by distance from the focus plane.
#[derive(Debug, Clone)]
pub struct DofSettings {
    pub enabled: bool,
    pub focus_point: f32,
    pub focus_scale: f32,
    pub max_blur_size: f32,
    /// Visualize the circle of confusion instead of blurring.
    pub debug_mode: bool,
}

impl Default for DofSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            focus_point: 10.0,
            focus_scale: 1.0,
            max_blur_size: 8.0,
            debug_mode: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TonemapMode {
    Linear,
    Reinhard,
    Filmic,
    #[default]
    Aces,
}

/// Tone mapping and color grading, applied in the output stage.
#[derive(Debug, Clone)]
pub struct TonemapSettings {
    pub mode: TonemapMode,
    pub exposure: f32,
    pub white: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
}

impl Default for TonemapSettings {
    fn default() -> Self {
        Self {
            mode: TonemapMode::Aces,
            exposure: 1.0,
            white: 1.0,
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Background / sky
// ---------------------------------------------------------------------------

/// Sky cubemap set: the raw environment plus its precomputed IBL products.
/// All views must be cube views. Produced by the asset layer; this crate
/// only samples them.
#[derive(Clone)]
pub struct Sky {
    pub cubemap: Arc<wgpu::TextureView>,
    pub irradiance: Arc<wgpu::TextureView>,
    pub prefilter: Arc<wgpu::TextureView>,
    /// Orientation applied when sampling the sky.
    pub rotation: Quat,
}

impl std::fmt::Debug for Sky {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sky")
            .field("rotation", &self.rotation)
            .finish_non_exhaustive()
    }
}

/// What fills pixels untouched by geometry.
#[derive(Debug, Clone)]
pub struct BackgroundSettings {
    /// Sky cubemap; `None` falls back to the flat `color`.
    pub sky: Option<Sky>,
    pub color: Vec3,
    pub energy: f32,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            sky: None,
            color: Vec3::splat(0.05),
            energy: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// The full per-renderer environment configuration.
///
/// Owned by the renderer, mutated freely by the caller between frames, and
/// read by the passes at point of use during `end_frame`.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub ambient: AmbientSettings,
    pub fog: FogSettings,
    pub ssao: SsaoSettings,
    pub ssil: SsilSettings,
    pub ssr: SsrSettings,
    pub bloom: BloomSettings,
    pub dof: DofSettings,
    pub tonemap: TonemapSettings,
    pub background: BackgroundSettings,
}
