//! Draw Registry
//!
//! Per-frame append-only collections of draw groups and calls, bucketed by
//! rendering technique and instancing. Storage is recycled across frames:
//! `begin_frame` clears contents but keeps capacity, so steady-state frames
//! allocate nothing.
//!
//! # Classification
//!
//! `push_call` places a call in exactly one technique bucket (with one
//! exception) using this decision order:
//!
//! 1. decal flag → [`Technique::Decal`]
//! 2. transparency `Alpha` **or** blend ≠ `Mix` → [`Technique::Forward`]
//! 3. transparency `Prepass` → [`Technique::Prepass`] **and**
//!    [`Technique::Forward`] (the prepass writes depth/alpha-tested
//!    occlusion, the forward pass writes color)
//! 4. otherwise → [`Technique::Deferred`]
//!
//! Calls on instanced groups land in the bucket's instanced sub-list.
//!
//! # Malformed input
//!
//! Zero-instance descriptors, empty meshes, inactive layers and dangling
//! group handles are silently dropped — the frame renders exactly as if the
//! submission never happened. Callers must not treat this as fatal.

use crate::draw::{
    Bucket, DrawCall, DrawGroup, GroupHandle, RenderLayers, Technique,
};

/// Per-frame draw call storage and technique buckets.
pub struct DrawRegistry {
    /// Rejected (malformed) groups stay as `None` so handles remain dense.
    groups: Vec<Option<DrawGroup>>,
    calls: Vec<DrawCall>,
    buckets: [Bucket; 4],
    /// Layers accepted by the current frame's submissions.
    pub active_layers: RenderLayers,
}

impl Default for DrawRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: Vec::with_capacity(256),
            calls: Vec::with_capacity(512),
            buckets: std::array::from_fn(|_| Bucket::default()),
            active_layers: RenderLayers::all(),
        }
    }

    /// Clears all groups, calls and buckets. Previously returned handles
    /// become dangling (pushing calls against them is a silent no-op).
    pub fn begin_frame(&mut self) {
        self.groups.clear();
        self.calls.clear();
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    /// Registers a draw group for this frame.
    ///
    /// A group with a malformed instancing descriptor is recorded as
    /// rejected: the handle stays valid, but every call pushed against it is
    /// dropped.
    pub fn push_group(&mut self, group: DrawGroup) -> GroupHandle {
        let handle = GroupHandle(self.groups.len() as u32);
        let rejected = group
            .instances
            .as_ref()
            .is_some_and(super::InstanceData::is_malformed);
        if rejected {
            log::debug!("Dropping draw group {}: malformed instance data", handle.0);
            self.groups.push(None);
        } else {
            self.groups.push(Some(group));
        }
        handle
    }

    /// Classifies and records a draw call under `group`.
    ///
    /// See the module docs for the decision order and silent-drop rules.
    pub fn push_call(&mut self, call: DrawCall, group: GroupHandle, is_decal: bool) {
        let Some(Some(group_data)) = self.groups.get(group.0 as usize) else {
            return;
        };
        if call.mesh.is_empty() && !is_decal {
            return;
        }
        if !self.active_layers.intersects(call.mesh.layers) {
            return;
        }

        let instanced = group_data.instances.is_some();
        let index = self.calls.len() as u32;

        let material = &call.material;
        if is_decal {
            self.bucket_list(Technique::Decal, instanced).push(index);
        } else if material.requires_forward() {
            self.bucket_list(Technique::Forward, instanced).push(index);
        } else if material.transparency == crate::material::TransparencyMode::Prepass {
            self.bucket_list(Technique::Prepass, instanced).push(index);
            self.bucket_list(Technique::Forward, instanced).push(index);
        } else {
            self.bucket_list(Technique::Deferred, instanced).push(index);
        }

        let mut call = call;
        call.group = group;
        self.calls.push(call);
    }

    fn bucket_list(&mut self, technique: Technique, instanced: bool) -> &mut Vec<u32> {
        let bucket = &mut self.buckets[technique.index()];
        if instanced {
            &mut bucket.instanced
        } else {
            &mut bucket.plain
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn group(&self, handle: GroupHandle) -> Option<&DrawGroup> {
        self.groups.get(handle.0 as usize)?.as_ref()
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn call(&self, index: u32) -> &DrawCall {
        &self.calls[index as usize]
    }

    #[must_use]
    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    #[must_use]
    pub fn bucket(&self, technique: Technique) -> &Bucket {
        &self.buckets[technique.index()]
    }

    pub(crate) fn bucket_mut(&mut self, technique: Technique) -> &mut Bucket {
        &mut self.buckets[technique.index()]
    }

    #[must_use]
    pub fn has_calls(&self, technique: Technique) -> bool {
        !self.bucket(technique).is_empty()
    }

    /// Iterates a technique's calls, instanced sub-list first, in current
    /// bucket order.
    pub fn iter_bucket(&self, technique: Technique) -> impl Iterator<Item = (u32, &DrawCall)> {
        let bucket = self.bucket(technique);
        bucket
            .instanced
            .iter()
            .chain(bucket.plain.iter())
            .map(|&i| (i, self.call(i)))
    }
}
