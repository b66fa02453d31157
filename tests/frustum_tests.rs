//! Frustum and Bounding-Volume Tests
//!
//! Tests for:
//! - Plane extraction from reverse-Z and standard-Z matrices
//! - Frustum-sphere and frustum-AABB intersection
//! - Shadow-caster frustums (near plane disabled)
//! - AABB transform and merge behavior

use ember::math::{BoundingBox, Frustum};
use glam::{Mat4, Vec3};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn make_test_frustum() -> Frustum {
    // Standard perspective camera at origin looking down -Z.
    let proj = Mat4::perspective_infinite_reverse_rh(60.0_f32.to_radians(), 1.0, 0.1);
    Frustum::from_matrix(proj)
}

// ============================================================================
// Sphere intersection
// ============================================================================

#[test]
fn frustum_sphere_inside() {
    let frustum = make_test_frustum();
    assert!(
        frustum.intersects_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0),
        "Sphere in front of camera should be inside",
    );
}

#[test]
fn frustum_sphere_outside_left() {
    let frustum = make_test_frustum();
    assert!(!frustum.intersects_sphere(Vec3::new(-1000.0, 0.0, -5.0), 1.0));
}

#[test]
fn frustum_sphere_outside_behind() {
    let frustum = make_test_frustum();
    assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, 10.0), 1.0));
}

#[test]
fn frustum_sphere_straddling_boundary() {
    let frustum = make_test_frustum();
    assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, -5.0), 100.0));
}

// ============================================================================
// AABB intersection
// ============================================================================

#[test]
fn frustum_aabb_inside() {
    let frustum = make_test_frustum();
    assert!(frustum.intersects_box(
        Vec3::new(-0.5, -0.5, -6.0),
        Vec3::new(0.5, 0.5, -4.0),
    ));
}

#[test]
fn frustum_aabb_outside() {
    let frustum = make_test_frustum();
    assert!(!frustum.intersects_box(
        Vec3::new(-1000.0, -1000.0, -1002.0),
        Vec3::new(-999.0, -999.0, -1001.0),
    ));
}

#[test]
fn frustum_aabb_behind_camera() {
    let frustum = make_test_frustum();
    assert!(!frustum.intersects_box(Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 10.0)));
}

#[test]
fn frustum_intersects_aabb_struct() {
    let frustum = make_test_frustum();
    let aabb = BoundingBox::new(Vec3::new(-0.5, -0.5, -6.0), Vec3::new(0.5, 0.5, -4.0));
    assert!(frustum.intersects_aabb(&aabb));
}

// ============================================================================
// Standard-Z and shadow-caster frustums
// ============================================================================

#[test]
fn standard_z_frustum_inside_and_outside() {
    let proj = Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, 0.1, 100.0);
    let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
    let frustum = Frustum::from_matrix_standard_z(proj * view);

    assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, -50.0), 1.0));
    assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, -200.0), 1.0));
    assert!(!frustum.intersects_sphere(Vec3::new(50.0, 0.0, -50.0), 1.0));
}

#[test]
fn shadow_caster_frustum_keeps_geometry_toward_the_light() {
    let proj = Mat4::perspective_rh(
        90.0_f32.to_radians(),
        1.0,
        1.0,
        100.0,
    );
    let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);

    let regular = Frustum::from_matrix_standard_z(proj * view);
    let caster = Frustum::from_matrix_shadow_caster(proj * view);

    // A sphere between the light and its near plane: rejected by the
    // regular frustum, kept by the caster frustum.
    let center = Vec3::new(0.0, 0.0, -0.5);
    assert!(!regular.intersects_sphere(center, 0.1));
    assert!(caster.intersects_sphere(center, 0.1));
}

// ============================================================================
// AABB helpers
// ============================================================================

#[test]
fn aabb_merge_contains_both() {
    let a = BoundingBox::new(Vec3::splat(-1.0), Vec3::ZERO);
    let b = BoundingBox::new(Vec3::ZERO, Vec3::splat(2.0));
    let merged = a.merge(&b);
    assert_eq!(merged.min, Vec3::splat(-1.0));
    assert_eq!(merged.max, Vec3::splat(2.0));
}

#[test]
fn aabb_transform_matches_translated_extents() {
    let b = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0));
    let moved = b.transform(&Mat4::from_translation(Vec3::new(3.0, 0.0, -7.0)));
    assert!(approx(moved.center().x, 3.0));
    assert!(approx(moved.center().z, -7.0));
}

#[test]
fn aabb_empty_is_empty() {
    assert!(BoundingBox::EMPTY.is_empty());
    assert!(!BoundingBox::UNIT_CUBE.is_empty());
}
