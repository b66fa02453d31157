//! Custom shading-logic contract.
//!
//! Callers may replace the fragment shading of the default geometry program
//! with their own WGSL logic. The submitted text declares zero or more
//! `uniform` parameters and a body that reads the default-sampled material
//! values and may overwrite the four G-buffer outputs. Compilation yields an
//! opaque [`CustomShader`] handle plus the discovered, typed parameter list.

pub mod custom;

pub use custom::{CustomShader, ParamType, ShaderParam};

/// Texture unit of the bone-matrix texture (identical in the default and
/// every custom program).
pub const UNIT_BONE_MATRICES: u32 = 0;
/// Texture unit of the albedo map.
pub const UNIT_ALBEDO: u32 = 1;
/// Texture unit of the normal map.
pub const UNIT_NORMAL: u32 = 2;
/// Texture unit of the emission map.
pub const UNIT_EMISSION: u32 = 3;
/// Texture unit of the ORM map.
pub const UNIT_ORM: u32 = 4;
/// First texture unit available to a material's own custom samplers.
pub const FIRST_CUSTOM_UNIT: u32 = 5;
