use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};

use crate::encode::matte::key_matte_to_transparent;
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{MeshWarpError, MeshWarpResult};
use crate::render::frame::FrameRGBA;

/// Options for [`GifSink`].
#[derive(Clone, Debug)]
pub struct GifSinkOpts {
    /// Loop forever instead of playing once.
    pub repeat_infinite: bool,
    /// Quantizer speed, 1 (best) to 30 (fastest).
    pub speed: i32,
}

impl Default for GifSinkOpts {
    fn default() -> Self {
        Self {
            repeat_infinite: true,
            speed: 10,
        }
    }
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn take(&self) -> MeshWarpResult<Vec<u8>> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| MeshWarpError::encode("gif output buffer lock poisoned"))?;
        Ok(std::mem::take(&mut *guard))
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::other("gif output buffer lock poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Animated GIF sink backed by the `image` crate encoder.
///
/// GIF carries only binary transparency, so frames arrive composited onto the matte color and
/// matte-colored pixels are keyed back to transparent when the export asked for it.
pub struct GifSink {
    opts: GifSinkOpts,
    cfg: Option<SinkConfig>,
    out: SharedBuf,
    encoder: Option<GifEncoder<SharedBuf>>,
    frames_written: u64,
}

impl GifSink {
    pub fn new(opts: GifSinkOpts) -> Self {
        Self {
            opts,
            cfg: None,
            out: SharedBuf::default(),
            encoder: None,
            frames_written: 0,
        }
    }
}

impl Default for GifSink {
    fn default() -> Self {
        Self::new(GifSinkOpts::default())
    }
}

impl FrameSink for GifSink {
    fn begin(&mut self, cfg: SinkConfig) -> MeshWarpResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(MeshWarpError::validation("gif width/height must be non-zero"));
        }
        let out = SharedBuf::default();
        let mut encoder = GifEncoder::new_with_speed(out.clone(), self.opts.speed.clamp(1, 30));
        if self.opts.repeat_infinite {
            encoder
                .set_repeat(Repeat::Infinite)
                .map_err(|e| MeshWarpError::encode(format!("gif set repeat: {e}")))?;
        }
        self.out = out;
        self.encoder = Some(encoder);
        self.cfg = Some(cfg);
        self.frames_written = 0;
        Ok(())
    }

    fn push_frame(
        &mut self,
        idx: FrameIndex,
        frame: &FrameRGBA,
        delay_ms: u32,
    ) -> MeshWarpResult<()> {
        let matte = self.matte_rgb();
        let (Some(cfg), Some(encoder)) = (self.cfg.as_ref(), self.encoder.as_mut()) else {
            return Err(MeshWarpError::encode("gif sink used before begin"));
        };
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(MeshWarpError::validation(format!(
                "frame {} size mismatch: got {}x{}, expected {}x{}",
                idx.0, frame.width, frame.height, cfg.width, cfg.height
            )));
        }

        let mut rgba = frame.to_straight_rgba8();
        if cfg.transparent_background {
            key_matte_to_transparent(&mut rgba, matte);
        }
        let img = RgbaImage::from_raw(frame.width, frame.height, rgba)
            .ok_or_else(|| MeshWarpError::validation("frame buffer does not match its size"))?;
        let delay = Delay::from_numer_denom_ms(delay_ms.max(1), 1);
        encoder
            .encode_frame(Frame::from_parts(img, 0, 0, delay))
            .map_err(|e| MeshWarpError::encode(format!("gif frame {}: {e}", idx.0)))?;
        self.frames_written += 1;
        Ok(())
    }

    fn end(&mut self) -> MeshWarpResult<Vec<u8>> {
        // Dropping the encoder writes the GIF trailer.
        drop(self.encoder.take());
        self.cfg = None;
        if self.frames_written == 0 {
            return Err(MeshWarpError::encode("gif sink finished without any frames"));
        }
        self.out.take()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/gif.rs"]
mod tests;
