//! Draw Registry Tests
//!
//! Tests for:
//! - Technique bucket classification (decal / forward / prepass / deferred)
//! - Instanced sub-list placement
//! - Silent dropping of malformed submissions
//! - Layer-mask filtering
//! - Per-frame reset semantics

mod common;

use ember::draw::registry::DrawRegistry;
use ember::{
    BlendMode, BoundingBox, DrawCall, DrawGroup, InstanceData, RenderLayers, Technique,
    TransparencyMode,
};
use glam::{Mat4, Vec3};

fn push_simple_call(
    registry: &mut DrawRegistry,
    mesh: &ember::MeshRef,
    material: ember::Material,
    is_decal: bool,
) {
    let group = registry.push_group(DrawGroup {
        transform: Mat4::IDENTITY,
        aabb: mesh.aabb,
        ..Default::default()
    });
    registry.push_call(
        DrawCall {
            mesh: mesh.clone(),
            material,
            group,
        },
        group,
        is_decal,
    );
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn opaque_material_goes_to_deferred() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    push_simple_call(&mut registry, &mesh, common::opaque_material(), false);

    assert_eq!(registry.bucket(Technique::Deferred).plain.len(), 1);
    assert!(registry.bucket(Technique::Forward).is_empty());
    assert!(registry.bucket(Technique::Prepass).is_empty());
    assert!(registry.bucket(Technique::Decal).is_empty());
}

#[test]
fn alpha_transparency_goes_to_forward_only() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    let mut material = common::opaque_material();
    material.transparency = TransparencyMode::Alpha;
    push_simple_call(&mut registry, &mesh, material, false);

    assert!(registry.bucket(Technique::Deferred).is_empty());
    assert_eq!(registry.bucket(Technique::Forward).plain.len(), 1);
    assert!(registry.bucket(Technique::Prepass).is_empty());
}

#[test]
fn non_mix_blend_goes_to_forward() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    let mut material = common::opaque_material();
    material.blend = BlendMode::Additive;
    push_simple_call(&mut registry, &mesh, material, false);

    assert!(registry.bucket(Technique::Deferred).is_empty());
    assert_eq!(registry.bucket(Technique::Forward).plain.len(), 1);
}

#[test]
fn prepass_transparency_lands_in_prepass_and_forward() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    let mut material = common::opaque_material();
    material.transparency = TransparencyMode::Prepass;
    push_simple_call(&mut registry, &mesh, material, false);

    // Depth goes through the prepass bucket, color through forward; the
    // deferred bucket must never see it.
    assert_eq!(registry.bucket(Technique::Prepass).plain.len(), 1);
    assert_eq!(registry.bucket(Technique::Forward).plain.len(), 1);
    assert!(registry.bucket(Technique::Deferred).is_empty());

    // Both bucket entries reference the same call.
    assert_eq!(
        registry.bucket(Technique::Prepass).plain[0],
        registry.bucket(Technique::Forward).plain[0],
    );
}

#[test]
fn decal_flag_wins_over_material_configuration() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    // Even a transparent material goes to the decal bucket when flagged.
    let mut material = common::opaque_material();
    material.transparency = TransparencyMode::Alpha;
    push_simple_call(&mut registry, &mesh, material, true);

    assert_eq!(registry.bucket(Technique::Decal).plain.len(), 1);
    assert!(registry.bucket(Technique::Forward).is_empty());
}

#[test]
fn instanced_groups_use_the_instanced_sublist() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    let group = registry.push_group(DrawGroup {
        transform: Mat4::IDENTITY,
        aabb: mesh.aabb,
        instances: Some(InstanceData {
            transforms: vec![Mat4::IDENTITY; 4],
            colors: None,
            combined_aabb: Some(BoundingBox::new(Vec3::splat(-2.0), Vec3::splat(2.0))),
        }),
        ..Default::default()
    });
    registry.push_call(
        DrawCall {
            mesh: mesh.clone(),
            material: common::opaque_material(),
            group,
        },
        group,
        false,
    );

    let bucket = registry.bucket(Technique::Deferred);
    assert!(bucket.plain.is_empty());
    assert_eq!(bucket.instanced.len(), 1);
}

// ============================================================================
// Malformed submissions are silent no-ops
// ============================================================================

#[test]
fn zero_instance_count_drops_the_submission() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    let group = registry.push_group(DrawGroup {
        transform: Mat4::IDENTITY,
        aabb: mesh.aabb,
        instances: Some(InstanceData {
            transforms: Vec::new(),
            colors: None,
            combined_aabb: None,
        }),
        ..Default::default()
    });
    registry.push_call(
        DrawCall {
            mesh: mesh.clone(),
            material: common::opaque_material(),
            group,
        },
        group,
        false,
    );

    // The frame must look exactly as if the submission never happened.
    for technique in Technique::ALL {
        assert!(registry.bucket(technique).is_empty());
    }
    assert!(registry.calls().is_empty());
}

#[test]
fn mismatched_instance_colors_drop_the_submission() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    let group = registry.push_group(DrawGroup {
        transform: Mat4::IDENTITY,
        aabb: mesh.aabb,
        instances: Some(InstanceData {
            transforms: vec![Mat4::IDENTITY; 3],
            colors: Some(vec![glam::Vec4::ONE; 2]),
            combined_aabb: None,
        }),
        ..Default::default()
    });
    registry.push_call(
        DrawCall {
            mesh: mesh.clone(),
            material: common::opaque_material(),
            group,
        },
        group,
        false,
    );

    assert!(registry.calls().is_empty());
}

#[test]
fn empty_mesh_drops_the_submission() {
    let (device, _) = common::noop_device();
    let mesh = common::empty_mesh(&device);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    push_simple_call(&mut registry, &mesh, common::opaque_material(), false);

    assert!(registry.calls().is_empty());
}

#[test]
fn inactive_layers_drop_the_submission() {
    let (device, _) = common::noop_device();
    let mut mesh = common::test_mesh(&device, Vec3::ZERO);
    mesh.layers = RenderLayers::LAYER_1;

    let mut registry = DrawRegistry::new();
    registry.active_layers = RenderLayers::LAYER_0;
    registry.begin_frame();

    push_simple_call(&mut registry, &mesh, common::opaque_material(), false);
    assert!(registry.calls().is_empty());

    // Enabling the layer accepts the same submission.
    registry.active_layers = RenderLayers::LAYER_0 | RenderLayers::LAYER_1;
    push_simple_call(&mut registry, &mesh, common::opaque_material(), false);
    assert_eq!(registry.calls().len(), 1);
}

// ============================================================================
// Frame reset
// ============================================================================

#[test]
fn begin_frame_clears_all_buckets() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();

    registry.begin_frame();
    push_simple_call(&mut registry, &mesh, common::opaque_material(), false);
    assert_eq!(registry.calls().len(), 1);

    registry.begin_frame();
    assert!(registry.calls().is_empty());
    assert_eq!(registry.group_count(), 0);
    for technique in Technique::ALL {
        assert!(registry.bucket(technique).is_empty());
    }
}
