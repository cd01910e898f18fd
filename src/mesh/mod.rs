//! Uniform deformation lattice and its per-layer weight maps.

/// Lattice geometry, painting and per-tick update.
pub mod grid;
/// Dense per-layer weight storage.
pub mod weights;
