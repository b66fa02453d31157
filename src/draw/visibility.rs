//! Visibility & Sort Engine
//!
//! Visibility is an *overlay* over the registry: a per-group flag array
//! recomputed every time a new culling frustum is supplied (the view
//! frustum, then once per shadow-casting light face). Recomputation never
//! mutates bucket membership, and running the same frustum twice reproduces
//! identical results — culling is replayable within a frame.
//!
//! Sorting reorders a bucket's call lists by distance from a viewpoint:
//! ascending (front-to-back) for opaque buckets to maximize early depth
//! rejection, descending (back-to-front) for transparency buckets for
//! blending correctness. The sort is stable, so equal distances keep
//! submission order and frames do not flicker.

use glam::Vec3;

use crate::draw::{GroupHandle, Technique, registry::DrawRegistry};
use crate::math::Frustum;

/// Per-group visibility flags for the most recent frustum.
#[derive(Debug, Default)]
pub struct VisibilityMask {
    visible: Vec<bool>,
}

impl VisibilityMask {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes visibility of every group against `frustum`.
    ///
    /// Groups without culling information (rejected groups keep their slot
    /// but are never visible; instanced groups without a combined bounding
    /// box are always visible) are handled per [`DrawGroup::world_bounds`]
    /// semantics.
    ///
    /// [`DrawGroup::world_bounds`]: crate::draw::DrawGroup::world_bounds
    pub fn compute(&mut self, registry: &DrawRegistry, frustum: &Frustum) {
        self.visible.clear();
        self.visible.reserve(registry.group_count());

        for index in 0..registry.group_count() {
            let handle = GroupHandle(index as u32);
            let visible = match registry.group(handle) {
                Some(group) => match group.world_bounds() {
                    Some(bounds) => frustum.intersects_aabb(&bounds),
                    None => true,
                },
                None => false,
            };
            self.visible.push(visible);
        }
    }

    /// Marks every registered group visible (culling disabled).
    pub fn mark_all_visible(&mut self, registry: &DrawRegistry) {
        self.visible.clear();
        self.visible.reserve(registry.group_count());
        for index in 0..registry.group_count() {
            let handle = GroupHandle(index as u32);
            self.visible.push(registry.group(handle).is_some());
        }
    }

    #[must_use]
    pub fn is_visible(&self, handle: GroupHandle) -> bool {
        self.visible.get(handle.0 as usize).copied().unwrap_or(false)
    }
}

/// Direction of a bucket sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending distance (opaque / deferred buckets).
    FrontToBack,
    /// Descending distance (transparency buckets).
    BackToFront,
}

/// Distance reference point of a call's group: the instanced combined-box
/// centroid when available, the transform origin otherwise.
fn group_origin(registry: &DrawRegistry, handle: GroupHandle) -> Vec3 {
    let Some(group) = registry.group(handle) else {
        return Vec3::ZERO;
    };
    if let Some(instances) = &group.instances
        && let Some(aabb) = instances.combined_aabb
    {
        return aabb.center();
    }
    group.transform.w_axis.truncate()
}

/// Sorts both sub-lists of a technique bucket by viewpoint distance.
///
/// Stable and idempotent: sorting twice with the same viewpoint and order
/// produces the same sequence, and ties preserve submission order.
pub fn sort_bucket(
    registry: &mut DrawRegistry,
    technique: Technique,
    viewpoint: Vec3,
    order: SortOrder,
) {
    let mut keyed: Vec<(u32, f32)> = Vec::new();

    for list_selector in [false, true] {
        let bucket = registry.bucket(technique);
        let list = if list_selector {
            &bucket.instanced
        } else {
            &bucket.plain
        };

        keyed.clear();
        keyed.extend(list.iter().map(|&index| {
            let origin = group_origin(registry, registry.call(index).group);
            (index, viewpoint.distance_squared(origin))
        }));

        keyed.sort_by(|a, b| {
            let ordering = a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal);
            match order {
                SortOrder::FrontToBack => ordering,
                SortOrder::BackToFront => ordering.reverse(),
            }
        });

        let bucket = registry.bucket_mut(technique);
        let list = if list_selector {
            &mut bucket.instanced
        } else {
            &mut bucket.plain
        };
        list.clear();
        list.extend(keyed.iter().map(|(index, _)| *index));
    }
}
