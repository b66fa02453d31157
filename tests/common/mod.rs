//! Shared test fixtures.
//!
//! Registry-level tests need real `wgpu::Buffer` handles inside `MeshRef`;
//! the noop backend provides a device without touching any GPU. Nothing
//! here compiles shaders or records passes.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use std::sync::Arc;

use ember::{BoundingBox, Material, MeshRef, RenderLayers, ShadowCastMode};
use glam::Vec3;

pub fn noop_device() -> (wgpu::Device, wgpu::Queue) {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::NOOP,
        backend_options: wgpu::BackendOptions {
            noop: wgpu::NoopBackendOptions { enable: true },
            ..Default::default()
        },
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        display: None,
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .expect("noop adapter");

    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default()))
        .expect("noop device")
}

/// A unit-cube mesh handle around `center` with placeholder GPU buffers.
pub fn test_mesh(device: &wgpu::Device, center: Vec3) -> MeshRef {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Test Vertex Buffer"),
        size: 1024,
        usage: wgpu::BufferUsages::VERTEX,
        mapped_at_creation: false,
    });

    MeshRef {
        vertex_buffer: Arc::new(buffer),
        vertex_count: 36,
        index: None,
        topology: wgpu::PrimitiveTopology::TriangleList,
        aabb: BoundingBox::new(center - Vec3::splat(0.5), center + Vec3::splat(0.5)),
        shadow_cast: ShadowCastMode::Enabled,
        layers: RenderLayers::default(),
    }
}

/// An empty mesh (no drawable primitives) — must be silently dropped.
pub fn empty_mesh(device: &wgpu::Device) -> MeshRef {
    let mut mesh = test_mesh(device, Vec3::ZERO);
    mesh.vertex_count = 0;
    mesh
}

pub fn opaque_material() -> Material {
    Material::standard()
}
