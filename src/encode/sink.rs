use crate::encode::matte::DEFAULT_MATTE_RGB;
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::MeshWarpResult;
use crate::render::frame::FrameRGBA;

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Number of frames that will be pushed.
    pub total_frames: u64,
    /// Whether the caller asked for a transparent background.
    pub transparent_background: bool,
}

/// Sink contract for consuming rendered frames in export order.
///
/// Ordering contract: `push_frame` is called in strictly increasing [`FrameIndex`] order, exactly
/// `total_frames` times between `begin` and `end`.
pub trait FrameSink: Send {
    /// Whether frames may carry partial alpha. Sinks returning `false` receive frames already
    /// composited onto [`FrameSink::matte_rgb`] (transparent export) or the export background.
    fn supports_alpha(&self) -> bool {
        false
    }

    /// Chroma-key color agreed with the encoder for transparent exports.
    fn matte_rgb(&self) -> [u8; 3] {
        DEFAULT_MATTE_RGB
    }

    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> MeshWarpResult<()>;
    /// Push one frame together with its display delay.
    fn push_frame(
        &mut self,
        idx: FrameIndex,
        frame: &FrameRGBA,
        delay_ms: u32,
    ) -> MeshWarpResult<()>;
    /// Called once after the last frame; returns the encoded output.
    fn end(&mut self) -> MeshWarpResult<Vec<u8>>;
    /// Called instead of `end` when an export fails after a successful `begin`. Releases any
    /// external resources and discards partial output.
    fn abort(&mut self) {}
}

/// One frame captured by [`InMemorySink`].
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pub idx: FrameIndex,
    pub frame: FrameRGBA,
    pub delay_ms: u32,
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<CapturedFrame>,
    ended: bool,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the sink configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg.clone()
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[CapturedFrame] {
        &self.frames
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn supports_alpha(&self) -> bool {
        true
    }

    fn begin(&mut self, cfg: SinkConfig) -> MeshWarpResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frame(
        &mut self,
        idx: FrameIndex,
        frame: &FrameRGBA,
        delay_ms: u32,
    ) -> MeshWarpResult<()> {
        self.frames.push(CapturedFrame {
            idx,
            frame: frame.clone(),
            delay_ms,
        });
        Ok(())
    }

    fn end(&mut self) -> MeshWarpResult<Vec<u8>> {
        self.ended = true;
        Ok(Vec::new())
    }
}
