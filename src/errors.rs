//! Error Types
//!
//! This module defines the error types used throughout the pipeline.
//!
//! # Overview
//!
//! The main error type [`EmberError`] covers the *fatal* failure modes:
//! - Render target / framebuffer allocation failures at init or resize
//! - Missing or zero-sized render targets at frame execution
//! - Custom shader composition and compilation failures
//!
//! Everything else is deliberately not an error: malformed draw submissions
//! are silently ignored, and passes with nothing to do degrade to no-ops.
//! No operation in this crate retries; recovery is the caller's
//! responsibility.
//!
//! # Usage
//!
//! Fallible public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, EmberError>`.

use thiserror::Error;

/// The main error type for the Ember render pipeline.
#[derive(Error, Debug)]
pub enum EmberError {
    // ========================================================================
    // Resource Errors (fatal, reported before any frame executes)
    // ========================================================================
    /// A render target could not be allocated at initialization or resize.
    #[error("Failed to allocate render target '{label}': {reason}")]
    TargetAllocationFailed {
        /// Debug label of the target that failed.
        label: &'static str,
        /// Backend-reported reason.
        reason: String,
    },

    /// The requested output resolution is zero in at least one dimension.
    ///
    /// The caller must recreate the renderer (or call `resize`) with a valid
    /// resolution before the next frame begins.
    #[error("Render target size is zero ({width}x{height})")]
    ZeroSizedTarget {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },

    /// A render target required by an enabled pass is missing from the pool.
    #[error("Render target '{0}' is missing; recreate the renderer before the next frame")]
    MissingTarget(&'static str),

    // ========================================================================
    // Configuration Errors (custom shading logic)
    // ========================================================================
    /// The user fragment could not be spliced into the base shader
    /// (missing required marker or malformed parameter declaration).
    #[error("Custom shader composition failed: {0}")]
    ShaderCompositionFailed(String),

    /// The composed shader module failed wgpu validation.
    #[error("Custom shader compilation failed: {0}")]
    ShaderCompilationFailed(String),
}

/// Alias for `Result<T, EmberError>`.
pub type Result<T> = std::result::Result<T, EmberError>;
