//! Frame driver: the single owner of image, mesh, layers and clock.

/// Driver modes, animation ticks and export.
pub mod driver;
/// Pointer-driven weight painting.
pub mod pointer;
