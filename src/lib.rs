//! meshwarp animates still images by deforming a uniform mesh laid over them.
//!
//! Each layer pairs a procedural displacement ("physics") with a per-vertex weight map painted by
//! the user. Every tick the mesh recomputes vertex positions from the weighted, visible layers and
//! the renderer re-textures each lattice triangle from the rest-pose image through the affine map
//! between its rest and displaced corners.
//!
//! - Build a [`Session`] directly or from a [`ProjectConfig`]
//! - Paint weights with [`PointerEvent`]s or [`Session::paint`]
//! - Drive it with [`Session::tick`] or stream a finite run into a [`FrameSink`] with
//!   [`Session::export`]
#![forbid(unsafe_code)]

pub mod assets;
pub mod encode;
pub mod foundation;
pub mod layers;
pub mod mesh;
pub mod physics;
pub mod project;
pub mod render;
pub mod session;

pub use crate::foundation::core::{
    Affine, Extent, Fps, FrameIndex, Point, Rgba8Premul, Tick, Vec2,
};
pub use crate::foundation::error::{MeshWarpError, MeshWarpResult};

pub use crate::assets::mask::{AlphaMask, PrecomputedMask, Segmenter, apply_alpha_mask, load_mask};
pub use crate::assets::source::{SourceImage, decode_image, load_image};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::gif::{GifSink, GifSinkOpts};
pub use crate::encode::matte::{DEFAULT_MATTE_RGB, flatten_over_matte};
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::layers::stack::{Layer, LayerId, LayerStack};
pub use crate::mesh::grid::{BrushDab, GridMesh, MeshPoint};
pub use crate::physics::config::{LayerConfig, PhysicsKind};
pub use crate::physics::displacement::{DisplacementCtx, displacement};
pub use crate::project::config::ProjectConfig;
pub use crate::render::affine::solve_affine;
pub use crate::render::frame::FrameRGBA;
pub use crate::render::raster::Sampling;
pub use crate::render::renderer::{MeshRenderer, RenderSettings, RenderStats};
pub use crate::session::driver::{
    DriverMode, ExportOpts, ExportProgress, ExportReport, Session, SessionOpts,
};
pub use crate::session::pointer::{BrushSettings, PaintOutcome, PointerEvent};
