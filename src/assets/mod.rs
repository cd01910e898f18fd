//! Decoded source images and external alpha masks.

/// Single-channel alpha masks and the segmentation collaborator contract.
pub mod mask;
/// Premultiplied rest-pose source images.
pub mod source;
