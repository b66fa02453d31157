//! Materials
//!
//! A material pairs texture maps with factor values (albedo, emission,
//! normal, occlusion-roughness-metalness), carries the transparency / blend
//! / cull / billboard configuration that decides which bucket a draw call
//! lands in, and optionally references a compiled custom shading-logic
//! program plus the typed parameter values bound to it at draw time.
//!
//! Textures arrive as GPU view handles from the asset layer; a `None` map
//! falls back to the pipeline's built-in 1×1 defaults (white albedo, flat
//! normal, black emission/ORM).

use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};

use crate::shader::CustomShader;

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

/// How a material handles transparency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransparencyMode {
    /// Opaque rendering with optional alpha cutoff.
    #[default]
    Disabled,
    /// Transparency with shadow support: a depth prepass writes occlusion
    /// for alpha > 0.99 (and shadows for alpha > 0.1), then the forward
    /// pass writes color.
    Prepass,
    /// Standard alpha blending, no shadows, no depth writes.
    Alpha,
}

/// Source/destination blend configuration for forward-rendered calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Opaque or alpha-blended depending on [`TransparencyMode`].
    #[default]
    Mix,
    Additive,
    Multiply,
    PremultipliedAlpha,
}

/// Which faces are discarded during rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    None,
    #[default]
    Back,
    Front,
}

impl CullMode {
    #[must_use]
    pub fn to_wgpu(self) -> Option<wgpu::Face> {
        match self {
            Self::None => None,
            Self::Back => Some(wgpu::Face::Back),
            Self::Front => Some(wgpu::Face::Front),
        }
    }
}

/// Camera-facing behavior evaluated in the vertex stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BillboardMode {
    #[default]
    Disabled,
    /// Fully face the camera on all axes.
    Front,
    /// Rotate only around the Y axis, keeping "up" fixed.
    YAxis,
}

// ---------------------------------------------------------------------------
// Texture + factor map pairs
// ---------------------------------------------------------------------------

/// Shared handle to an externally-owned texture view.
pub type TextureRef = Arc<wgpu::TextureView>;

#[derive(Clone, Default)]
pub struct AlbedoMap {
    pub texture: Option<TextureRef>,
    pub color: Vec4,
}

#[derive(Clone, Default)]
pub struct EmissionMap {
    pub texture: Option<TextureRef>,
    pub color: Vec3,
    pub energy: f32,
}

#[derive(Clone)]
pub struct NormalMap {
    pub texture: Option<TextureRef>,
    pub scale: f32,
}

impl Default for NormalMap {
    fn default() -> Self {
        Self {
            texture: None,
            scale: 1.0,
        }
    }
}

/// Combined occlusion-roughness-metalness map and its factor multipliers.
#[derive(Clone)]
pub struct OrmMap {
    pub texture: Option<TextureRef>,
    pub occlusion: f32,
    pub roughness: f32,
    pub metalness: f32,
}

impl Default for OrmMap {
    fn default() -> Self {
        Self {
            texture: None,
            occlusion: 1.0,
            roughness: 1.0,
            metalness: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Custom shader parameters
// ---------------------------------------------------------------------------

/// Typed value stored against a custom shader parameter name.
#[derive(Clone)]
pub enum ParamValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Texture(TextureRef),
}

impl std::fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "Float({v})"),
            Self::Vec2(v) => write!(f, "Vec2({v})"),
            Self::Vec3(v) => write!(f, "Vec3({v})"),
            Self::Vec4(v) => write!(f, "Vec4({v})"),
            Self::Texture(_) => write!(f, "Texture(..)"),
        }
    }
}

/// A named parameter value on a material.
#[derive(Debug, Clone)]
pub struct MaterialParam {
    pub name: String,
    pub value: ParamValue,
}

// ---------------------------------------------------------------------------
// Material
// ---------------------------------------------------------------------------

/// Surface description for a single draw call.
#[derive(Clone, Default)]
pub struct Material {
    pub albedo: AlbedoMap,
    pub emission: EmissionMap,
    pub normal: NormalMap,
    pub orm: OrmMap,

    pub transparency: TransparencyMode,
    pub blend: BlendMode,
    pub cull: CullMode,
    pub billboard: BillboardMode,

    /// UV offset applied to texture coordinates.
    pub uv_offset: Vec2,
    /// UV scale applied to texture coordinates.
    pub uv_scale: Vec2,

    /// Alpha threshold below which fragments are discarded during opaque
    /// rendering.
    pub alpha_cutoff: f32,

    /// Custom shading logic; `None` uses the default geometry program.
    pub shader: Option<Arc<CustomShader>>,
    params: Vec<MaterialParam>,
}

impl Material {
    /// Standard opaque PBR material with default maps.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            albedo: AlbedoMap {
                texture: None,
                color: Vec4::ONE,
            },
            uv_scale: Vec2::ONE,
            alpha_cutoff: 0.01,
            ..Self::default()
        }
    }

    /// Stores a typed parameter value under `name`, overwriting any previous
    /// value of the same name.
    ///
    /// Names are not validated against any shader here: values whose name is
    /// never discovered by the material's compiled program are simply kept
    /// and never bound.
    pub fn set_param(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        if let Some(existing) = self.params.iter_mut().find(|p| p.name == name) {
            existing.value = value;
        } else {
            self.params.push(MaterialParam { name, value });
        }
    }

    /// Looks up a stored parameter value by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// All stored parameters, in insertion order.
    #[must_use]
    pub fn params(&self) -> &[MaterialParam] {
        &self.params
    }

    /// Whether this material routes to the forward bucket by virtue of its
    /// blend configuration alone (independent of the decal flag).
    #[must_use]
    pub fn requires_forward(&self) -> bool {
        self.transparency == TransparencyMode::Alpha || self.blend != BlendMode::Mix
    }
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("transparency", &self.transparency)
            .field("blend", &self.blend)
            .field("cull", &self.cull)
            .field("billboard", &self.billboard)
            .field("alpha_cutoff", &self.alpha_cutoff)
            .field("custom_shader", &self.shader.is_some())
            .field("params", &self.params.len())
            .finish_non_exhaustive()
    }
}
