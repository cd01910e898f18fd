//! Encoding sinks.
//!
//! Sinks consume rendered frames in export order and return the encoded bytes.

/// `ffmpeg`-based sink (MP4 output via system `ffmpeg`).
pub mod ffmpeg;
/// Animated GIF sink.
pub mod gif;
/// Alpha flattening and chroma-key matte helpers.
pub mod matte;
/// Generic frame sink trait and built-in sinks.
pub mod sink;
