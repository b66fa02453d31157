//! Visibility & Sort Engine Tests
//!
//! Tests for:
//! - Frustum culling of draw groups (the camera-at-origin scenario)
//! - Replayable, non-destructive culling across different frustums
//! - Stable distance sorting with tie preservation
//! - Culling-disabled fallback

mod common;

use ember::draw::registry::DrawRegistry;
use ember::draw::visibility::{SortOrder, VisibilityMask, sort_bucket};
use ember::{BoundingBox, DrawCall, DrawGroup, Frustum, InstanceData, Technique};
use glam::{Mat4, Vec3};

/// Camera at the origin looking down -Z (reverse-Z infinite perspective).
fn view_frustum() -> Frustum {
    let projection = Mat4::perspective_infinite_reverse_rh(60.0_f32.to_radians(), 1.0, 0.1);
    Frustum::from_matrix(projection)
}

fn submit_cube_at(
    registry: &mut DrawRegistry,
    mesh: &ember::MeshRef,
    position: Vec3,
) -> ember::GroupHandle {
    let group = registry.push_group(DrawGroup {
        transform: Mat4::from_translation(position),
        aabb: BoundingBox::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
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
    group
}

// ============================================================================
// Culling
// ============================================================================

#[test]
fn cube_in_front_is_visible_cube_behind_is_not() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    let front = submit_cube_at(&mut registry, &mesh, Vec3::new(0.0, 0.0, -5.0));
    let behind = submit_cube_at(&mut registry, &mesh, Vec3::new(0.0, 0.0, 5.0));

    let mut visibility = VisibilityMask::new();
    visibility.compute(&registry, &view_frustum());

    assert!(visibility.is_visible(front));
    assert!(!visibility.is_visible(behind));

    // Culling never mutates bucket membership: both calls stay bucketed.
    assert_eq!(registry.bucket(Technique::Deferred).plain.len(), 2);
}

#[test]
fn culling_is_replayable_across_frustums() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    let handles: Vec<_> = [
        Vec3::new(0.0, 0.0, -5.0),
        Vec3::new(0.0, 0.0, 5.0),
        Vec3::new(30.0, 0.0, -30.0),
        Vec3::new(0.0, -2.0, -10.0),
    ]
    .into_iter()
    .map(|p| submit_cube_at(&mut registry, &mesh, p))
    .collect();

    let frustum_a = view_frustum();
    // Second frustum: looking down +Z instead.
    let projection = Mat4::perspective_infinite_reverse_rh(60.0_f32.to_radians(), 1.0, 0.1);
    let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::Z, Vec3::Y);
    let frustum_b = Frustum::from_matrix(projection * view);

    let mut visibility = VisibilityMask::new();

    visibility.compute(&registry, &frustum_a);
    let first: Vec<bool> = handles.iter().map(|&h| visibility.is_visible(h)).collect();

    visibility.compute(&registry, &frustum_b);
    let second: Vec<bool> = handles.iter().map(|&h| visibility.is_visible(h)).collect();
    // The two views face opposite directions; results must differ for the
    // front/behind pair.
    assert_ne!(first, second);

    // Re-running frustum A reproduces the original results exactly.
    visibility.compute(&registry, &frustum_a);
    let replayed: Vec<bool> = handles.iter().map(|&h| visibility.is_visible(h)).collect();
    assert_eq!(first, replayed);
}

#[test]
fn instanced_group_without_combined_aabb_is_never_culled() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    // Far outside the frustum, but no combined bounds were supplied.
    let group = registry.push_group(DrawGroup {
        transform: Mat4::from_translation(Vec3::new(0.0, 0.0, 500.0)),
        aabb: BoundingBox::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
        instances: Some(InstanceData {
            transforms: vec![Mat4::IDENTITY],
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

    let mut visibility = VisibilityMask::new();
    visibility.compute(&registry, &view_frustum());
    assert!(visibility.is_visible(group));
}

#[test]
fn mark_all_visible_ignores_the_frustum() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    let behind = submit_cube_at(&mut registry, &mesh, Vec3::new(0.0, 0.0, 100.0));

    let mut visibility = VisibilityMask::new();
    visibility.mark_all_visible(&registry);
    assert!(visibility.is_visible(behind));
}

// ============================================================================
// Sorting
// ============================================================================

#[test]
fn front_to_back_orders_by_ascending_distance() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    submit_cube_at(&mut registry, &mesh, Vec3::new(0.0, 0.0, -20.0));
    submit_cube_at(&mut registry, &mesh, Vec3::new(0.0, 0.0, -5.0));
    submit_cube_at(&mut registry, &mesh, Vec3::new(0.0, 0.0, -10.0));

    sort_bucket(
        &mut registry,
        Technique::Deferred,
        Vec3::ZERO,
        SortOrder::FrontToBack,
    );

    // Call indices were assigned in submission order (0, 1, 2); sorted by
    // distance the nearest (index 1) comes first.
    assert_eq!(registry.bucket(Technique::Deferred).plain, vec![1, 2, 0]);
}

#[test]
fn back_to_front_orders_by_descending_distance() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    let mut material = common::opaque_material();
    material.transparency = ember::TransparencyMode::Alpha;

    for z in [-5.0, -20.0, -10.0] {
        let group = registry.push_group(DrawGroup {
            transform: Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
            aabb: BoundingBox::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
            ..Default::default()
        });
        registry.push_call(
            DrawCall {
                mesh: mesh.clone(),
                material: material.clone(),
                group,
            },
            group,
            false,
        );
    }

    sort_bucket(
        &mut registry,
        Technique::Forward,
        Vec3::ZERO,
        SortOrder::BackToFront,
    );

    assert_eq!(registry.bucket(Technique::Forward).plain, vec![1, 2, 0]);
}

#[test]
fn sorting_is_idempotent_and_ties_keep_submission_order() {
    let (device, _) = common::noop_device();
    let mesh = common::test_mesh(&device, Vec3::ZERO);
    let mut registry = DrawRegistry::new();
    registry.begin_frame();

    // Two groups at identical distance plus one nearer.
    submit_cube_at(&mut registry, &mesh, Vec3::new(0.0, 0.0, -10.0));
    submit_cube_at(&mut registry, &mesh, Vec3::new(0.0, 0.0, -10.0));
    submit_cube_at(&mut registry, &mesh, Vec3::new(0.0, 0.0, -5.0));

    sort_bucket(
        &mut registry,
        Technique::Deferred,
        Vec3::ZERO,
        SortOrder::FrontToBack,
    );
    let first = registry.bucket(Technique::Deferred).plain.clone();

    sort_bucket(
        &mut registry,
        Technique::Deferred,
        Vec3::ZERO,
        SortOrder::FrontToBack,
    );
    let second = registry.bucket(Technique::Deferred).plain.clone();

    assert_eq!(first, second, "sorting twice must be a no-op");
    // Ties (indices 0 and 1) preserve submission order behind the nearer
    // cube (index 2).
    assert_eq!(first, vec![2, 0, 1]);
}
