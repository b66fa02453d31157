//! Light Manager
//!
//! Tracks the active light set across frames, recomputes per-light shadow
//! matrices and culling frustums, culls lights against the view frustum,
//! and decides per frame whether each light's shadow map is stale.
//!
//! # Shadow staleness
//!
//! Each shadow-casting light moves through a small state machine:
//!
//! ```text
//! NeverRendered ──(shadow pass renders)──▶ Fresh
//!      ▲                                    │
//!      │                 (light moved / caller marked dirty / interval)
//!      └───────── (map released) ◀──────────▼
//!                                         Dirty ──(render)──▶ Fresh
//! ```
//!
//! The manager detects light transform/range changes itself; movement of
//! shadow-*casting geometry* is invisible to it, so callers must invoke
//! [`LightManager::mark_shadow_dirty`] when casters move. Stale shadows are
//! acceptable for purely static scenes.

use glam::{Mat4, Vec3, Vec4Swizzles};
use slotmap::{SecondaryMap, SlotMap};

use crate::light::{Light, LightId, LightKind, ShadowUpdateMode};
use crate::math::{BoundingBox, Frustum};
use crate::settings::DEPTH_TEXTURE_FORMAT;

/// Shadow map refresh state (see module docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowStaleness {
    #[default]
    NeverRendered,
    Fresh,
    Dirty,
}

/// GPU shadow map owned by a light: a depth texture (2D or cube) plus one
/// render view per face.
pub struct ShadowMap {
    pub texture: wgpu::Texture,
    /// One depth-only render view per face (1 or 6).
    pub face_views: Vec<wgpu::TextureView>,
    /// Sample view: 2D for directional/spot, cube for omni.
    pub sample_view: wgpu::TextureView,
    pub resolution: u32,
}

impl ShadowMap {
    fn new(device: &wgpu::Device, resolution: u32, faces: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Light Shadow Map"),
            size: wgpu::Extent3d {
                width: resolution,
                height: resolution,
                depth_or_array_layers: faces,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let face_views = (0..faces)
            .map(|face| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Shadow Face View"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: face,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let sample_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Shadow Sample View"),
            dimension: Some(if faces == 6 {
                wgpu::TextureViewDimension::Cube
            } else {
                wgpu::TextureViewDimension::D2
            }),
            ..Default::default()
        });

        Self {
            texture,
            face_views,
            sample_view,
            resolution,
        }
    }

    #[must_use]
    pub fn texel_size(&self) -> f32 {
        1.0 / self.resolution as f32
    }
}

/// Per-frame derived state of a light.
#[derive(Default)]
pub struct LightRuntime {
    /// View-projection per shadow face (index 0 for non-omni lights).
    pub view_projections: [Mat4; 6],
    /// Shadow-caster culling frustum per face.
    pub frustums: [Frustum; 6],
    /// World-space light volume; `None` for directional (unbounded).
    pub volume: BoundingBox,
    pub bounded: bool,
    pub visible: bool,
    pub staleness: ShadowStaleness,
    pub shadow_map: Option<ShadowMap>,
    /// Interval-mode accumulator (seconds since last refresh).
    interval_elapsed: f32,
    /// Snapshot used for movement detection.
    last_signature: Option<(Vec3, Vec3, f32)>,
}

/// Screen-space pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    #[must_use]
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Owner of the scene's lights and their derived per-frame state.
#[derive(Default)]
pub struct LightManager {
    lights: SlotMap<LightId, Light>,
    runtime: SecondaryMap<LightId, LightRuntime>,
    visible: Vec<LightId>,
}

impl LightManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Light lifecycle ────────────────────────────────────────────────────

    pub fn add(&mut self, light: Light) -> LightId {
        let id = self.lights.insert(light);
        self.runtime.insert(id, LightRuntime::default());
        id
    }

    /// Removes a light, releasing its shadow framebuffer.
    pub fn remove(&mut self, id: LightId) {
        self.lights.remove(id);
        self.runtime.remove(id);
    }

    #[must_use]
    pub fn get(&self, id: LightId) -> Option<&Light> {
        self.lights.get(id)
    }

    pub fn get_mut(&mut self, id: LightId) -> Option<&mut Light> {
        self.lights.get_mut(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Flags a light's shadow map for re-render. Call when shadow-casting
    /// geometry within the light's volume has moved.
    pub fn mark_shadow_dirty(&mut self, id: LightId) {
        if let Some(rt) = self.runtime.get_mut(id)
            && rt.staleness == ShadowStaleness::Fresh
        {
            rt.staleness = ShadowStaleness::Dirty;
        }
    }

    // ── Per-frame update ───────────────────────────────────────────────────

    /// Recomputes every active light's shadow matrices, culling frustums and
    /// world volume, then culls lights against the view frustum and rebuilds
    /// the visible set for this frame.
    pub fn update_and_cull(&mut self, view_frustum: &Frustum, _view_position: Vec3, dt: f32) {
        self.visible.clear();

        for (id, light) in &self.lights {
            let Some(rt) = self.runtime.get_mut(id) else {
                continue;
            };

            if !light.active {
                rt.visible = false;
                continue;
            }

            // Movement detection: any change to the pose/range signature
            // invalidates a fresh shadow map.
            let signature = (light.position, light.direction, light.range);
            if rt.last_signature.is_some_and(|s| s != signature)
                && rt.staleness == ShadowStaleness::Fresh
            {
                rt.staleness = ShadowStaleness::Dirty;
            }
            rt.last_signature = Some(signature);
            rt.interval_elapsed += dt;

            Self::update_matrices(light, rt);

            rt.visible = if rt.bounded {
                view_frustum.intersects_aabb(&rt.volume)
            } else {
                true
            };

            if rt.visible {
                self.visible.push(id);
            }
        }
    }

    fn update_matrices(light: &Light, rt: &mut LightRuntime) {
        let direction = light.direction.normalize_or(-Vec3::Z);
        let up = if direction.y.abs() > 0.99 {
            Vec3::X
        } else {
            Vec3::Y
        };

        match light.kind {
            LightKind::Directional => {
                let view = Mat4::look_at_rh(light.position, light.position + direction, up);
                let e = light.shadow.ortho_extent;
                let proj = Mat4::orthographic_rh(-e, e, -e, e, light.near, light.range.max(1.0));
                rt.view_projections[0] = proj * view;
                rt.frustums[0] = Frustum::from_matrix_shadow_caster(rt.view_projections[0]);
                rt.bounded = false;
                rt.volume = BoundingBox::EMPTY;
            }
            LightKind::Spot { outer_cone, .. } => {
                let view = Mat4::look_at_rh(light.position, light.position + direction, up);
                let fov = (outer_cone * 2.0).clamp(0.1, std::f32::consts::PI - 0.01);
                let proj =
                    Mat4::perspective_rh(fov, 1.0, light.near, light.range.max(light.near + 0.01));
                rt.view_projections[0] = proj * view;
                rt.frustums[0] = Frustum::from_matrix_shadow_caster(rt.view_projections[0]);
                rt.bounded = true;
                // Conservative cone bounds: full range sphere around the apex.
                rt.volume = BoundingBox::new(
                    light.position - Vec3::splat(light.range),
                    light.position + Vec3::splat(light.range),
                );
            }
            LightKind::Omni => {
                let proj = Mat4::perspective_rh(
                    std::f32::consts::FRAC_PI_2,
                    1.0,
                    light.near,
                    light.range.max(light.near + 0.01),
                );
                for (face, (forward, up)) in CUBE_FACE_ORIENTATIONS.iter().enumerate() {
                    let view = Mat4::look_at_rh(light.position, light.position + *forward, *up);
                    rt.view_projections[face] = proj * view;
                    rt.frustums[face] =
                        Frustum::from_matrix_shadow_caster(rt.view_projections[face]);
                }
                rt.bounded = true;
                rt.volume = BoundingBox::new(
                    light.position - Vec3::splat(light.range),
                    light.position + Vec3::splat(light.range),
                );
            }
        }
    }

    // ── Queries ────────────────────────────────────────────────────────────

    /// Lights visible this frame, in insertion order.
    pub fn visible_lights(&self) -> impl Iterator<Item = (LightId, &Light, &LightRuntime)> {
        self.visible
            .iter()
            .filter_map(|&id| Some((id, self.lights.get(id)?, self.runtime.get(id)?)))
    }

    #[must_use]
    pub fn has_visible(&self) -> bool {
        !self.visible.is_empty()
    }

    #[must_use]
    pub fn runtime(&self, id: LightId) -> Option<&LightRuntime> {
        self.runtime.get(id)
    }

    /// Whether the light's shadow map must be re-rendered this frame.
    ///
    /// Always `true` for maps never rendered; otherwise per the light's
    /// [`ShadowUpdateMode`] and staleness state.
    #[must_use]
    pub fn shadow_should_update(&self, id: LightId) -> bool {
        let Some(light) = self.lights.get(id) else {
            return false;
        };
        let Some(rt) = self.runtime.get(id) else {
            return false;
        };
        if !light.cast_shadows || !light.active {
            return false;
        }

        match rt.staleness {
            ShadowStaleness::NeverRendered | ShadowStaleness::Dirty => true,
            ShadowStaleness::Fresh => match light.shadow.update_mode {
                ShadowUpdateMode::WhenDirty => false,
                ShadowUpdateMode::Continuous => true,
                ShadowUpdateMode::Interval(seconds) => rt.interval_elapsed >= seconds,
            },
        }
    }

    /// Ensures the light owns a shadow map of the configured resolution,
    /// (re)allocating on first use or resolution change. Returns `false`
    /// when the light cannot cast shadows.
    pub fn ensure_shadow_map(&mut self, device: &wgpu::Device, id: LightId) -> bool {
        let Some(light) = self.lights.get(id) else {
            return false;
        };
        if !light.cast_shadows {
            return false;
        }
        let faces = light.shadow_face_count();
        let resolution = light.shadow.resolution.max(1);

        let Some(rt) = self.runtime.get_mut(id) else {
            return false;
        };
        let needs_realloc = rt
            .shadow_map
            .as_ref()
            .is_none_or(|map| map.resolution != resolution || map.face_views.len() != faces as usize);
        if needs_realloc {
            rt.shadow_map = Some(ShadowMap::new(device, resolution, faces));
            rt.staleness = ShadowStaleness::NeverRendered;
        }
        true
    }

    /// Marks the light's shadow map as freshly rendered.
    pub fn mark_shadow_rendered(&mut self, id: LightId) {
        if let Some(rt) = self.runtime.get_mut(id) {
            rt.staleness = ShadowStaleness::Fresh;
            rt.interval_elapsed = 0.0;
        }
    }
}

/// Cube shadow face orientations in +X, -X, +Y, -Y, +Z, -Z order.
const CUBE_FACE_ORIENTATIONS: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::Y),
    (Vec3::NEG_X, Vec3::Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::Y),
    (Vec3::NEG_Z, Vec3::Y),
];

/// Screen-space bounding rectangle of a bounded light volume, used to
/// scissor the deferred light pass. Unbounded (directional) volumes and
/// volumes crossing the near plane fall back to the full screen.
#[must_use]
pub fn light_screen_rect(
    volume: &BoundingBox,
    bounded: bool,
    view_projection: &Mat4,
    width: u32,
    height: u32,
) -> ScreenRect {
    if !bounded || volume.is_empty() {
        return ScreenRect::full(width, height);
    }

    let corners = [
        Vec3::new(volume.min.x, volume.min.y, volume.min.z),
        Vec3::new(volume.max.x, volume.min.y, volume.min.z),
        Vec3::new(volume.min.x, volume.max.y, volume.min.z),
        Vec3::new(volume.max.x, volume.max.y, volume.min.z),
        Vec3::new(volume.min.x, volume.min.y, volume.max.z),
        Vec3::new(volume.max.x, volume.min.y, volume.max.z),
        Vec3::new(volume.min.x, volume.max.y, volume.max.z),
        Vec3::new(volume.max.x, volume.max.y, volume.max.z),
    ];

    let mut min = glam::Vec2::splat(f32::INFINITY);
    let mut max = glam::Vec2::splat(f32::NEG_INFINITY);

    for corner in corners {
        let clip = *view_projection * corner.extend(1.0);
        if clip.w <= 0.0 {
            // Volume crosses the near plane; clipping a box against it is
            // not worth the cost here.
            return ScreenRect::full(width, height);
        }
        let ndc = clip.xy() / clip.w;
        min = min.min(ndc);
        max = max.max(ndc);
    }

    // NDC → pixels (Y flips).
    let to_px = |ndc: glam::Vec2| {
        glam::Vec2::new(
            (ndc.x * 0.5 + 0.5) * width as f32,
            (1.0 - (ndc.y * 0.5 + 0.5)) * height as f32,
        )
    };
    let a = to_px(min);
    let b = to_px(max);

    let x0 = a.x.min(b.x).clamp(0.0, width as f32);
    let x1 = a.x.max(b.x).clamp(0.0, width as f32);
    let y0 = a.y.min(b.y).clamp(0.0, height as f32);
    let y1 = a.y.max(b.y).clamp(0.0, height as f32);

    ScreenRect {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0).ceil() as u32,
        height: (y1 - y0).ceil() as u32,
    }
}
