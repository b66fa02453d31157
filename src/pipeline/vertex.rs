//! Fixed mesh vertex layout.
//!
//! Every mesh submitted to the pipeline uses one interleaved layout; the
//! asset layer is responsible for producing it. Keeping a single layout
//! avoids a vertex-layout axis in the pipeline cache key.
//!
//! | Location | Attribute | Format |
//! |----------|-----------|--------|
//! | 0 | position | `Float32x3` |
//! | 1 | normal | `Float32x3` |
//! | 2 | tangent | `Float32x4` |
//! | 3 | uv | `Float32x2` |
//! | 4 | color | `Float32x4` |
//! | 5 | joints | `Uint16x4` |
//! | 6 | weights | `Float32x4` |

/// Byte stride of one vertex.
pub const VERTEX_STRIDE: u64 = 12 + 12 + 16 + 8 + 16 + 8 + 16;

const ATTRIBUTES: [wgpu::VertexAttribute; 7] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x4,
    3 => Float32x2,
    4 => Float32x4,
    5 => Uint16x4,
    6 => Float32x4,
];

/// The pipeline-wide vertex buffer layout.
#[must_use]
pub fn layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: VERTEX_STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}
