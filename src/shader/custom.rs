//! Custom shader composition, compilation and parameter discovery.
//!
//! # Contract
//!
//! The user submits a WGSL fragment-logic snippet of the form:
//!
//! ```wgsl
//! uniform uBlend: f32;
//! uniform uTint: vec3f;
//! uniform uMask: texture_2d;
//!
//! let mask = textureSample(uMask, material_sampler, in.uv).r;
//! albedo = mix(albedo, vec4f(uTint, albedo.a), uBlend * mask);
//! ```
//!
//! Lines starting with `uniform` are parameter declarations; everything else
//! is the body, spliced into the default geometry fragment at its user
//! marker. Inside the body the default-sampled values `albedo`, `normal`,
//! `orm` and `emission` are in scope and writable, together with the
//! interpolated inputs (`in.uv`, `in.color`, tangent basis).
//!
//! # Discovery
//!
//! wgpu exposes no program reflection, so the declaration grammar *is* the
//! reflection source: parameters are parsed into a typed table at
//! composition time. Scalar and vector parameters are packed into one
//! generated uniform block; `texture_2d` parameters receive texture units
//! counting up from [`FIRST_CUSTOM_UNIT`](super::FIRST_CUSTOM_UNIT),
//! immediately after the default material's reserved units.
//!
//! # Failure
//!
//! A malformed declaration, a base template without the required markers, or
//! a wgpu validation failure is reported through `log::error!` and a
//! [`EmberError`] — the caller must check and must not reference a failed
//! handle in submissions.

use log::{error, info};

use crate::errors::{EmberError, Result};
use crate::material::{Material, ParamValue};

use super::FIRST_CUSTOM_UNIT;

/// Required header marker of the base template; composition refuses base
/// sources without it (wrong or stale template).
const TEMPLATE_VERSION_MARKER: &str = "//! ember:geometry-template v1";
/// Splice point for generated parameter bindings.
const PARAMS_MARKER: &str = "// <ember:user-params>";
/// Splice point for the user fragment body.
const FRAGMENT_MARKER: &str = "// <ember:user-fragment>";

/// Bind group index hosting custom parameters on geometry pipelines.
pub const CUSTOM_PARAMS_GROUP: u32 = 3;

// ---------------------------------------------------------------------------
// Parameter model
// ---------------------------------------------------------------------------

/// Type of a discovered custom parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Texture2d,
}

impl ParamType {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "f32" => Some(Self::Float),
            "vec2f" | "vec2<f32>" => Some(Self::Vec2),
            "vec3f" | "vec3<f32>" => Some(Self::Vec3),
            "vec4f" | "vec4<f32>" => Some(Self::Vec4),
            "texture_2d" | "texture_2d<f32>" => Some(Self::Texture2d),
            _ => None,
        }
    }

    /// WGSL uniform-buffer size/alignment pair of the type.
    const fn layout(self) -> (u32, u32) {
        match self {
            Self::Float => (4, 4),
            Self::Vec2 => (8, 8),
            Self::Vec3 => (12, 16),
            Self::Vec4 => (16, 16),
            Self::Texture2d => (0, 0),
        }
    }

    const fn wgsl(self) -> &'static str {
        match self {
            Self::Float => "f32",
            Self::Vec2 => "vec2f",
            Self::Vec3 => "vec3f",
            Self::Vec4 => "vec4f",
            Self::Texture2d => "texture_2d<f32>",
        }
    }
}

/// One discovered parameter of a compiled custom shader.
#[derive(Debug, Clone)]
pub struct ShaderParam {
    pub name: String,
    pub ty: ParamType,
    /// Byte offset inside the generated uniform block (block types only).
    pub offset: u32,
    /// Assigned texture unit (`texture_2d` parameters only), starting at
    /// [`FIRST_CUSTOM_UNIT`](super::FIRST_CUSTOM_UNIT).
    pub texture_unit: Option<u32>,
}

/// Result of splitting and laying out a user snippet, before any GPU work.
#[derive(Debug, Clone)]
pub struct ComposedSource {
    /// Full WGSL source of the composed program.
    pub source: String,
    /// Discovered parameters in declaration order.
    pub params: Vec<ShaderParam>,
    /// Size of the generated uniform block in bytes (0 when no block
    /// parameters were declared).
    pub uniform_block_size: u32,
}

// ---------------------------------------------------------------------------
// Pure composition (no device required)
// ---------------------------------------------------------------------------

/// Splits user text into `uniform` declarations and body lines.
fn split_user_source(user: &str) -> Result<(Vec<(String, ParamType)>, String)> {
    let mut declarations = Vec::new();
    let mut body = String::new();

    for line in user.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("uniform ") {
            // Grammar: `uniform <name>: <type>;`
            let rest = rest.trim_end().trim_end_matches(';');
            let Some((name, ty_token)) = rest.split_once(':') else {
                return Err(EmberError::ShaderCompositionFailed(format!(
                    "malformed parameter declaration: `{trimmed}`"
                )));
            };
            let name = name.trim();
            let ty_token = ty_token.trim();

            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(EmberError::ShaderCompositionFailed(format!(
                    "invalid parameter name: `{name}`"
                )));
            }
            let Some(ty) = ParamType::parse(ty_token) else {
                return Err(EmberError::ShaderCompositionFailed(format!(
                    "unsupported parameter type `{ty_token}` for `{name}` \
                     (expected f32, vec2f, vec3f, vec4f or texture_2d)"
                )));
            };

            declarations.push((name.to_string(), ty));
        } else if !trimmed.is_empty() {
            body.push_str(line);
            body.push('\n');
        }
    }

    Ok((declarations, body))
}

/// Assigns uniform-block offsets and texture units in declaration order.
fn layout_params(declarations: &[(String, ParamType)]) -> (Vec<ShaderParam>, u32) {
    let mut params = Vec::with_capacity(declarations.len());
    let mut offset = 0u32;
    let mut next_unit = FIRST_CUSTOM_UNIT;

    for (name, ty) in declarations {
        if *ty == ParamType::Texture2d {
            params.push(ShaderParam {
                name: name.clone(),
                ty: *ty,
                offset: 0,
                texture_unit: Some(next_unit),
            });
            next_unit += 1;
        } else {
            let (size, align) = ty.layout();
            offset = offset.div_ceil(align) * align;
            params.push(ShaderParam {
                name: name.clone(),
                ty: *ty,
                offset,
                texture_unit: None,
            });
            offset += size;
        }
    }

    // Uniform buffer bindings round up to 16 bytes.
    let block_size = offset.div_ceil(16) * 16;
    (params, block_size)
}

/// Generates the `@group(3)` WGSL declarations for the discovered params.
fn generate_param_bindings(params: &[ShaderParam], block_size: u32) -> String {
    let mut out = String::new();

    if block_size > 0 {
        out.push_str("struct CustomParams {\n");
        for p in params.iter().filter(|p| p.texture_unit.is_none()) {
            out.push_str(&format!("    {}: {},\n", p.name, p.ty.wgsl()));
        }
        out.push_str("};\n");
        out.push_str(&format!(
            "@group({CUSTOM_PARAMS_GROUP}) @binding(0) var<uniform> custom: CustomParams;\n"
        ));
    }

    for p in params.iter().filter(|p| p.texture_unit.is_some()) {
        // Binding 0 is the block; sampler bindings follow the unit order.
        let binding = p.texture_unit.unwrap() - FIRST_CUSTOM_UNIT + 1;
        out.push_str(&format!(
            "@group({CUSTOM_PARAMS_GROUP}) @binding({binding}) var {}: {};\n",
            p.name,
            p.ty.wgsl()
        ));
    }

    out
}

/// Rewrites body references so block members resolve (`uBlend` →
/// `custom.uBlend`). Texture parameters keep their bare names.
fn qualify_body(body: &str, params: &[ShaderParam]) -> String {
    let mut out = body.to_string();
    for p in params.iter().filter(|p| p.texture_unit.is_none()) {
        // Whole-word replacement; parameter names are identifiers.
        let mut rewritten = String::with_capacity(out.len());
        let mut rest = out.as_str();
        while let Some(pos) = rest.find(p.name.as_str()) {
            let before_ok = pos == 0
                || !rest[..pos]
                    .chars()
                    .next_back()
                    .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.');
            let after = &rest[pos + p.name.len()..];
            let after_ok = !after
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');

            rewritten.push_str(&rest[..pos]);
            if before_ok && after_ok {
                rewritten.push_str("custom.");
            }
            rewritten.push_str(&p.name);
            rest = after;
        }
        rewritten.push_str(rest);
        out = rewritten;
    }
    out
}

/// Composes the full program source from the base template and user snippet.
///
/// Pure: no device access. The GPU compile step lives in
/// [`CustomShader::compile`].
pub fn compose(base_template: &str, user_source: &str) -> Result<ComposedSource> {
    if !base_template.contains(TEMPLATE_VERSION_MARKER) {
        return Err(EmberError::ShaderCompositionFailed(
            "base template is missing its version marker".into(),
        ));
    }
    if !base_template.contains(PARAMS_MARKER) || !base_template.contains(FRAGMENT_MARKER) {
        return Err(EmberError::ShaderCompositionFailed(
            "base template is missing a splice marker".into(),
        ));
    }

    let (declarations, body) = split_user_source(user_source)?;
    let (params, block_size) = layout_params(&declarations);

    let bindings = generate_param_bindings(&params, block_size);
    let body = qualify_body(&body, &params);

    let source = base_template
        .replacen(PARAMS_MARKER, &bindings, 1)
        .replacen(FRAGMENT_MARKER, &body, 1);

    Ok(ComposedSource {
        source,
        params,
        uniform_block_size: block_size,
    })
}

/// Packs a material's stored parameter values against a discovered
/// parameter table.
///
/// Values are matched by name; stored values the shader never declared are
/// ignored, and declared parameters with no stored value stay zero. Type
/// mismatches are treated as unset (never bound).
#[must_use]
pub fn pack_block(params: &[ShaderParam], block_size: u32, material: &Material) -> Vec<u8> {
    let mut block = vec![0u8; block_size as usize];

    for param in params.iter().filter(|p| p.texture_unit.is_none()) {
        let Some(value) = material.param(&param.name) else {
            continue;
        };
        let offset = param.offset as usize;
        match (param.ty, value) {
            (ParamType::Float, ParamValue::Float(v)) => {
                block[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
            }
            (ParamType::Vec2, ParamValue::Vec2(v)) => {
                block[offset..offset + 8].copy_from_slice(bytemuck::bytes_of(v));
            }
            (ParamType::Vec3, ParamValue::Vec3(v)) => {
                block[offset..offset + 12].copy_from_slice(bytemuck::bytes_of(v));
            }
            (ParamType::Vec4, ParamValue::Vec4(v)) => {
                block[offset..offset + 16].copy_from_slice(bytemuck::bytes_of(v));
            }
            _ => {}
        }
    }

    block
}

// ---------------------------------------------------------------------------
// Compiled shader handle
// ---------------------------------------------------------------------------

/// An opaque handle to a compiled custom shading program.
///
/// Created once, shared by any number of materials via `Arc`. The handle
/// carries the discovered parameter table; per-material values live on the
/// [`Material`](crate::material::Material) and are packed against this table
/// at draw time.
pub struct CustomShader {
    module: wgpu::ShaderModule,
    params: Vec<ShaderParam>,
    uniform_block_size: u32,
    /// Stable identity for pipeline-cache keying.
    id: u64,
}

impl CustomShader {
    /// Composes and compiles a custom shading program.
    ///
    /// On failure the diagnostic is logged and an `Err` is returned; the
    /// caller must not submit draws referencing a failed handle.
    pub fn compile(
        device: &wgpu::Device,
        base_template: &str,
        user_source: &str,
    ) -> Result<Self> {
        let composed = compose(base_template, user_source).inspect_err(|e| {
            error!("Custom shader rejected: {e}");
        })?;

        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Custom Geometry Shader"),
            source: wgpu::ShaderSource::Wgsl(composed.source.as_str().into()),
        });
        if let Some(err) = pollster::block_on(error_scope.pop()) {
            error!("Custom shader failed validation: {err}");
            return Err(EmberError::ShaderCompilationFailed(err.to_string()));
        }

        info!(
            "Compiled custom shader: {} parameter(s), {}B uniform block",
            composed.params.len(),
            composed.uniform_block_size
        );

        // Module identity from a content hash keeps pipeline-cache keys
        // stable across handle clones.
        let id = {
            use std::hash::{Hash, Hasher};
            let mut hasher = rustc_hash::FxHasher::default();
            composed.source.hash(&mut hasher);
            hasher.finish()
        };

        Ok(Self {
            module,
            params: composed.params,
            uniform_block_size: composed.uniform_block_size,
            id,
        })
    }

    #[must_use]
    pub fn module(&self) -> &wgpu::ShaderModule {
        &self.module
    }

    /// Discovered parameters in declaration order.
    #[must_use]
    pub fn params(&self) -> &[ShaderParam] {
        &self.params
    }

    #[must_use]
    pub fn uniform_block_size(&self) -> u32 {
        self.uniform_block_size
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Packs a material's stored parameter values into the shader's uniform
    /// block layout. See [`pack_block`].
    #[must_use]
    pub fn pack_block(&self, material: &Material) -> Vec<u8> {
        pack_block(&self.params, self.uniform_block_size, material)
    }

    /// Resolves the texture view bound to each custom sampler unit, in unit
    /// order. Unset or mistyped entries resolve to `None` (the binder
    /// substitutes the built-in white texture).
    #[must_use]
    pub fn resolve_textures<'a>(
        &'a self,
        material: &'a Material,
    ) -> Vec<(&'a ShaderParam, Option<&'a wgpu::TextureView>)> {
        self.params
            .iter()
            .filter(|p| p.texture_unit.is_some())
            .map(|p| {
                let view = match material.param(&p.name) {
                    Some(ParamValue::Texture(t)) => Some(t.as_ref()),
                    _ => None,
                };
                (p, view)
            })
            .collect()
    }
}

impl std::fmt::Debug for CustomShader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomShader")
            .field("params", &self.params)
            .field("uniform_block_size", &self.uniform_block_size)
            .finish_non_exhaustive()
    }
}
