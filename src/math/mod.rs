//! Pure geometry math: bounding volumes and frustum tests.
//!
//! Everything in this module is stateless and GPU-free, so the culling logic
//! of the pipeline can be exercised without a device.

pub mod aabb;
pub mod frustum;

pub use aabb::BoundingBox;
pub use frustum::Frustum;
