//! Procedural displacement sources.

/// Physics kinds and per-layer parameters.
pub mod config;
/// Pure displacement functions.
pub mod displacement;
