//! Affine triangle renderer.

/// Affine solving from point correspondences.
pub mod affine;
/// Rendered frame buffers.
pub mod frame;
/// Triangle coverage and sampling.
pub mod raster;
/// Mesh-to-frame rendering.
pub mod renderer;
