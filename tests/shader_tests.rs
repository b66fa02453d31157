//! Custom Shading-Logic Contract Tests
//!
//! Tests for:
//! - Parameter declaration parsing and type discovery
//! - Texture-unit assignment (starting after the reserved material units)
//! - Uniform-block offset layout
//! - Composition failure modes (bad declarations, missing markers)
//! - Typed parameter storage on materials

use ember::material::{Material, ParamValue};
use ember::shader::custom::{CUSTOM_PARAMS_GROUP, compose, pack_block};
use ember::shader::{FIRST_CUSTOM_UNIT, ParamType};
use glam::{Vec2, Vec3, Vec4};

/// Minimal stand-in for the real geometry template, carrying the same
/// markers.
const TEMPLATE: &str = "\
//! ember:geometry-template v1
// <ember:user-params>
@fragment
fn fs_main() {
    var albedo = vec4f(1.0);
    // <ember:user-fragment>
}
";

// ============================================================================
// Parameter discovery
// ============================================================================

#[test]
fn declared_uniforms_are_discovered_with_types() {
    let composed = compose(
        TEMPLATE,
        "uniform uBlend: f32;\n\
         uniform uTint: vec3f;\n\
         uniform uMask: texture_2d;\n\
         albedo *= uBlend;",
    )
    .unwrap();

    assert_eq!(composed.params.len(), 3);
    assert_eq!(composed.params[0].name, "uBlend");
    assert_eq!(composed.params[0].ty, ParamType::Float);
    assert_eq!(composed.params[1].name, "uTint");
    assert_eq!(composed.params[1].ty, ParamType::Vec3);
    assert_eq!(composed.params[2].name, "uMask");
    assert_eq!(composed.params[2].ty, ParamType::Texture2d);
}

#[test]
fn texture_units_start_after_the_reserved_material_units() {
    let composed = compose(
        TEMPLATE,
        "uniform uMaskA: texture_2d;\n\
         uniform uScale: f32;\n\
         uniform uMaskB: texture_2d;\n",
    )
    .unwrap();

    // Units 0-4 are reserved (bones, albedo, normal, emission, ORM);
    // custom samplers count up from there in declaration order.
    assert_eq!(composed.params[0].texture_unit, Some(FIRST_CUSTOM_UNIT));
    assert_eq!(composed.params[1].texture_unit, None);
    assert_eq!(composed.params[2].texture_unit, Some(FIRST_CUSTOM_UNIT + 1));
}

#[test]
fn block_offsets_follow_wgsl_alignment() {
    let composed = compose(
        TEMPLATE,
        "uniform uBlend: f32;\n\
         uniform uTint: vec3f;\n\
         uniform uOffset: vec2f;\n",
    )
    .unwrap();

    // f32 at 0; vec3f aligns to 16; vec2f aligns to 8 after the 12-byte
    // vec3f ends at 28 → 32.
    assert_eq!(composed.params[0].offset, 0);
    assert_eq!(composed.params[1].offset, 16);
    assert_eq!(composed.params[2].offset, 32);
    // Block size rounds up to 16.
    assert_eq!(composed.uniform_block_size, 48);
}

#[test]
fn composed_source_contains_generated_bindings_and_body() {
    let composed = compose(
        TEMPLATE,
        "uniform uBlend: f32;\nalbedo *= uBlend;",
    )
    .unwrap();

    let expected_binding = format!("@group({CUSTOM_PARAMS_GROUP}) @binding(0)");
    assert!(composed.source.contains(&expected_binding));
    // Block members are qualified so they resolve through the struct.
    assert!(composed.source.contains("albedo *= custom.uBlend;"));
    // The markers themselves are consumed.
    assert!(!composed.source.contains("<ember:user-params>"));
    assert!(!composed.source.contains("<ember:user-fragment>"));
}

#[test]
fn shader_without_parameters_generates_no_block() {
    let composed = compose(TEMPLATE, "albedo = vec4f(1.0, 0.0, 0.0, 1.0);").unwrap();
    assert!(composed.params.is_empty());
    assert_eq!(composed.uniform_block_size, 0);
    assert!(!composed.source.contains("CustomParams"));
}

// ============================================================================
// Failure modes
// ============================================================================

#[test]
fn malformed_declaration_is_rejected() {
    assert!(compose(TEMPLATE, "uniform uBroken f32;").is_err());
    assert!(compose(TEMPLATE, "uniform : f32;").is_err());
    assert!(compose(TEMPLATE, "uniform uBad: mat4x4<f32>;").is_err());
}

#[test]
fn template_without_markers_is_rejected() {
    assert!(compose("fn fs_main() {}", "albedo = vec4f(1.0);").is_err());

    let unversioned = "// <ember:user-params>\n// <ember:user-fragment>\n";
    assert!(compose(unversioned, "albedo = vec4f(1.0);").is_err());
}

// ============================================================================
// Material parameter storage
// ============================================================================

#[test]
fn set_param_stores_and_overwrites_typed_values() {
    let mut material = Material::standard();
    material.set_param("uBlend", ParamValue::Float(0.25));
    material.set_param("uTint", ParamValue::Vec3(Vec3::new(1.0, 0.5, 0.0)));

    assert!(matches!(
        material.param("uBlend"),
        Some(ParamValue::Float(v)) if (*v - 0.25).abs() < 1e-6,
    ));

    material.set_param("uBlend", ParamValue::Float(0.75));
    assert!(matches!(
        material.param("uBlend"),
        Some(ParamValue::Float(v)) if (*v - 0.75).abs() < 1e-6,
    ));
    assert_eq!(material.params().len(), 2);
}

#[test]
fn unknown_parameter_names_are_stored_without_error() {
    let mut material = Material::standard();
    // No shader attached, and no validation: stored, never bound.
    material.set_param("uNobodyReadsThis", ParamValue::Vec4(Vec4::ONE));
    material.set_param("uNeither", ParamValue::Vec2(Vec2::ONE));
    assert_eq!(material.params().len(), 2);
}

#[test]
fn stored_value_lands_at_the_discovered_offset() {
    let composed = compose(
        TEMPLATE,
        "uniform uBlend: f32;\nuniform uTint: vec3f;\nalbedo *= uBlend;",
    )
    .unwrap();

    let mut material = Material::standard();
    material.set_param("uBlend", ParamValue::Float(0.42));
    material.set_param("uStray", ParamValue::Float(9.0)); // never declared

    let block = pack_block(&composed.params, composed.uniform_block_size, &material);

    // The exact float value sits at the discovered offset.
    let stored = f32::from_le_bytes(block[0..4].try_into().unwrap());
    assert!((stored - 0.42).abs() < 1e-6);

    // Undeclared values are never bound; unset declared values stay zero.
    assert!(block[16..28].iter().all(|&b| b == 0));
}

#[test]
fn param_values_do_not_leak_between_materials() {
    let mut a = Material::standard();
    let mut b = Material::standard();

    a.set_param("uBlend", ParamValue::Float(1.0));
    b.set_param("uBlend", ParamValue::Float(0.0));

    assert!(matches!(a.param("uBlend"), Some(ParamValue::Float(v)) if *v == 1.0));
    assert!(matches!(b.param("uBlend"), Some(ParamValue::Float(v)) if *v == 0.0));
}
