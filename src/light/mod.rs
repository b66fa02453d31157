//! Lights and shadow configuration.
//!
//! Lights are scene-level objects that persist across frames (unlike draw
//! groups). The [`LightManager`](manager::LightManager) owns them, culls
//! them per frame, and tracks the staleness of their shadow maps.

pub mod manager;

use glam::Vec3;
use slotmap::new_key_type;

new_key_type! {
    /// Stable handle to a light owned by the [`manager::LightManager`].
    pub struct LightId;
}

/// Light emitter shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Infinitely distant light; covers the whole view.
    Directional,
    /// Cone light with inner/outer angular falloff (radians).
    Spot { inner_cone: f32, outer_cone: f32 },
    /// Point light radiating in all directions; shadows use a cube map.
    Omni,
}

/// When a light's shadow map is refreshed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShadowUpdateMode {
    /// Refresh only when the map has never been rendered, the light moved,
    /// or the caller marked it dirty. The cheap default for mostly-static
    /// scenes; the caller must call
    /// [`manager::LightManager::mark_shadow_dirty`] when shadow-casting
    /// geometry moves.
    WhenDirty,
    /// Refresh every frame the light is visible.
    Continuous,
    /// Refresh at most once per interval (seconds), and when dirty.
    Interval(f32),
}

/// Per-light shadow parameters.
#[derive(Debug, Clone)]
pub struct ShadowSettings {
    /// Square shadow map resolution in texels.
    pub resolution: u32,
    /// Constant depth bias applied when sampling.
    pub depth_bias: f32,
    /// Slope-scaled depth bias.
    pub slope_bias: f32,
    /// Penumbra softness factor.
    pub softness: f32,
    /// Orthographic half-extent for directional shadow projections.
    pub ortho_extent: f32,
    pub update_mode: ShadowUpdateMode,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            resolution: 2048,
            depth_bias: 0.005,
            slope_bias: 0.02,
            softness: 1.0,
            ortho_extent: 30.0,
            update_mode: ShadowUpdateMode::WhenDirty,
        }
    }
}

/// A scene light.
///
/// Mutate freely between frames through
/// [`manager::LightManager::get_mut`]; the manager detects transform and
/// range changes and invalidates the shadow map accordingly.
#[derive(Debug, Clone)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    /// Emission direction (directional and spot lights).
    pub direction: Vec3,
    pub color: Vec3,
    pub energy: f32,
    /// Specular contribution weight.
    pub specular: f32,
    /// Influence radius (spot and omni lights).
    pub range: f32,
    /// Distance attenuation exponent.
    pub attenuation: f32,
    /// Shadow near plane.
    pub near: f32,
    pub cast_shadows: bool,
    pub shadow: ShadowSettings,
    /// Inactive lights are skipped entirely (culling, shadows, shading).
    pub active: bool,
}

impl Light {
    #[must_use]
    pub fn directional(direction: Vec3, color: Vec3, energy: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            direction: direction.normalize_or(-Vec3::Z),
            ..Self::base(color, energy)
        }
    }

    #[must_use]
    pub fn spot(
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        energy: f32,
        range: f32,
        inner_cone: f32,
        outer_cone: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot {
                inner_cone,
                outer_cone,
            },
            position,
            direction: direction.normalize_or(-Vec3::Z),
            range,
            ..Self::base(color, energy)
        }
    }

    #[must_use]
    pub fn omni(position: Vec3, color: Vec3, energy: f32, range: f32) -> Self {
        Self {
            kind: LightKind::Omni,
            position,
            range,
            ..Self::base(color, energy)
        }
    }

    fn base(color: Vec3, energy: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            direction: -Vec3::Z,
            color,
            energy,
            specular: 1.0,
            range: 10.0,
            attenuation: 1.0,
            near: 0.1,
            cast_shadows: false,
            shadow: ShadowSettings::default(),
            active: true,
        }
    }

    /// Number of shadow faces this light renders: 6 cube faces for omni,
    /// one otherwise.
    #[must_use]
    pub fn shadow_face_count(&self) -> u32 {
        match self.kind {
            LightKind::Omni => 6,
            _ => 1,
        }
    }
}
