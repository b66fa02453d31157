//! Light Manager Tests
//!
//! Tests for:
//! - Visible-set culling per light kind
//! - The shadow staleness state machine (never-rendered / fresh / dirty)
//! - Shadow update modes (when-dirty, continuous, interval)
//! - Screen-rect computation for the deferred light scissor
//! - Forward per-call light packing (overlap test + cap)

use ember::light::manager::{LightManager, ScreenRect, light_screen_rect};
use ember::math::{BoundingBox, Frustum};
use ember::passes::pack_forward_lights;
use ember::{Light, ShadowUpdateMode};
use glam::{Mat4, Vec3};

fn view_frustum() -> Frustum {
    let projection = Mat4::perspective_infinite_reverse_rh(60.0_f32.to_radians(), 1.0, 0.1);
    Frustum::from_matrix(projection)
}

fn shadowed_directional() -> Light {
    let mut light = Light::directional(Vec3::new(0.0, -1.0, 0.0), Vec3::ONE, 2.0);
    light.cast_shadows = true;
    light
}

// ============================================================================
// Culling
// ============================================================================

#[test]
fn directional_lights_are_always_visible() {
    let mut lights = LightManager::new();
    lights.add(Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0));

    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);
    assert_eq!(lights.visible_lights().count(), 1);
}

#[test]
fn omni_light_outside_the_frustum_is_culled() {
    let mut lights = LightManager::new();
    let inside = lights.add(Light::omni(Vec3::new(0.0, 0.0, -10.0), Vec3::ONE, 1.0, 2.0));
    let behind = lights.add(Light::omni(Vec3::new(0.0, 0.0, 50.0), Vec3::ONE, 1.0, 2.0));

    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);

    let visible: Vec<_> = lights.visible_lights().map(|(id, _, _)| id).collect();
    assert!(visible.contains(&inside));
    assert!(!visible.contains(&behind));
}

#[test]
fn inactive_lights_are_skipped() {
    let mut lights = LightManager::new();
    let id = lights.add(Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0));
    lights.get_mut(id).unwrap().active = false;

    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);
    assert!(!lights.has_visible());
}

#[test]
fn omni_lights_get_six_shadow_frustums() {
    let light = Light::omni(Vec3::ZERO, Vec3::ONE, 1.0, 5.0);
    assert_eq!(light.shadow_face_count(), 6);
    assert_eq!(Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0).shadow_face_count(), 1);
}

// ============================================================================
// Shadow staleness
// ============================================================================

#[test]
fn never_rendered_shadow_map_must_update() {
    let mut lights = LightManager::new();
    let id = lights.add(shadowed_directional());

    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);
    assert!(lights.shadow_should_update(id));
}

#[test]
fn static_light_skips_the_second_frame() {
    let mut lights = LightManager::new();
    let id = lights.add(shadowed_directional());

    // Frame 1: first render.
    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);
    assert!(lights.shadow_should_update(id));
    lights.mark_shadow_rendered(id);

    // Frame 2: nothing moved — the shadow pass must be skipped.
    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);
    assert!(!lights.shadow_should_update(id));
}

#[test]
fn moving_the_light_invalidates_its_shadow_map() {
    let mut lights = LightManager::new();
    let id = lights.add(shadowed_directional());

    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);
    lights.mark_shadow_rendered(id);

    lights.get_mut(id).unwrap().position = Vec3::new(5.0, 10.0, 0.0);
    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);
    assert!(lights.shadow_should_update(id));
}

#[test]
fn caller_dirty_flag_invalidates_a_fresh_map() {
    let mut lights = LightManager::new();
    let id = lights.add(shadowed_directional());

    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);
    lights.mark_shadow_rendered(id);

    // Shadow-casting geometry moved; the manager cannot see that itself.
    lights.mark_shadow_dirty(id);
    assert!(lights.shadow_should_update(id));

    lights.mark_shadow_rendered(id);
    assert!(!lights.shadow_should_update(id));
}

#[test]
fn continuous_mode_updates_every_frame() {
    let mut lights = LightManager::new();
    let mut light = shadowed_directional();
    light.shadow.update_mode = ShadowUpdateMode::Continuous;
    let id = lights.add(light);

    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);
    lights.mark_shadow_rendered(id);
    assert!(lights.shadow_should_update(id));
}

#[test]
fn interval_mode_waits_out_the_interval() {
    let mut lights = LightManager::new();
    let mut light = shadowed_directional();
    light.shadow.update_mode = ShadowUpdateMode::Interval(1.0);
    let id = lights.add(light);

    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);
    lights.mark_shadow_rendered(id);

    // Half the interval: still fresh.
    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.5);
    assert!(!lights.shadow_should_update(id));

    // Past the interval: refresh.
    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.6);
    assert!(lights.shadow_should_update(id));
}

#[test]
fn lights_without_shadows_never_request_updates() {
    let mut lights = LightManager::new();
    let id = lights.add(Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0));

    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);
    assert!(!lights.shadow_should_update(id));
}

// ============================================================================
// Screen rect
// ============================================================================

#[test]
fn unbounded_volume_covers_the_full_screen() {
    let rect = light_screen_rect(
        &BoundingBox::EMPTY,
        false,
        &Mat4::IDENTITY,
        1920,
        1080,
    );
    assert_eq!(rect, ScreenRect::full(1920, 1080));
}

#[test]
fn centered_volume_produces_a_sub_rect() {
    let projection = Mat4::perspective_rh(60.0_f32.to_radians(), 1.0, 0.1, 100.0);
    let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
    let volume = BoundingBox::new(
        Vec3::new(-1.0, -1.0, -11.0),
        Vec3::new(1.0, 1.0, -9.0),
    );

    let rect = light_screen_rect(&volume, true, &(projection * view), 1000, 1000);
    assert!(!rect.is_empty());
    assert!(rect.width < 1000 && rect.height < 1000);
    // Roughly centered.
    assert!(rect.x > 250 && rect.x + rect.width < 750);
}

#[test]
fn volume_crossing_the_near_plane_falls_back_to_full_screen() {
    let projection = Mat4::perspective_rh(60.0_f32.to_radians(), 1.0, 0.1, 100.0);
    let volume = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0));

    let rect = light_screen_rect(&volume, true, &projection, 800, 600);
    assert_eq!(rect, ScreenRect::full(800, 600));
}

// ============================================================================
// Forward light packing
// ============================================================================

#[test]
fn forward_packing_selects_overlapping_lights_only() {
    let mut lights = LightManager::new();
    lights.add(Light::omni(Vec3::new(0.0, 0.0, -5.0), Vec3::ONE, 1.0, 2.0));
    lights.add(Light::omni(Vec3::new(40.0, 0.0, -5.0), Vec3::ONE, 1.0, 2.0));
    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);

    let bounds = BoundingBox::new(Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -4.0));
    let block = pack_forward_lights(&lights, Some(&bounds));
    assert_eq!(block.count[0], 1);
}

#[test]
fn forward_packing_silently_caps_excess_lights() {
    let mut lights = LightManager::new();
    for i in 0..8 {
        lights.add(Light::omni(
            Vec3::new(i as f32 * 0.1, 0.0, -5.0),
            Vec3::ONE,
            1.0,
            4.0,
        ));
    }
    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);

    let bounds = BoundingBox::new(Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -4.0));
    let block = pack_forward_lights(&lights, Some(&bounds));
    assert_eq!(
        block.count[0] as usize,
        ember::pipeline::uniforms::MAX_FORWARD_LIGHTS,
    );
}

#[test]
fn directional_lights_always_qualify_for_forward_packing() {
    let mut lights = LightManager::new();
    lights.add(Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0));
    lights.update_and_cull(&view_frustum(), Vec3::ZERO, 0.016);

    // Even a call with no bounds information receives the light.
    let block = pack_forward_lights(&lights, None);
    assert_eq!(block.count[0], 1);
}
