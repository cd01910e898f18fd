use crate::foundation::core::Extent;
use crate::foundation::error::{MeshWarpError, MeshWarpResult};

/// A rendered frame as RGBA8 pixels.
///
/// Frames are **premultiplied alpha** unless `premultiplied` says otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Frame filled with one premultiplied color.
    pub fn filled(extent: Extent, rgba: [u8; 4]) -> Self {
        Self {
            width: extent.width,
            height: extent.height,
            data: rgba.repeat(extent.pixel_count()),
            premultiplied: true,
        }
    }

    pub fn transparent(extent: Extent) -> Self {
        Self::filled(extent, [0, 0, 0, 0])
    }

    pub fn extent(&self) -> Extent {
        Extent {
            width: self.width,
            height: self.height,
        }
    }

    pub fn clear(&mut self, rgba: [u8; 4]) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 4;
        let px = &self.data[idx..idx + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    pub(crate) fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 4;
        &mut self.data[idx..idx + 4]
    }

    /// Straight-alpha copy of the pixel data.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        if self.premultiplied {
            crate::assets::source::unpremultiply_rgba8_in_place(&mut out);
        }
        out
    }

    pub fn validate(&self) -> MeshWarpResult<()> {
        let expected = (self.width as usize) * (self.height as usize) * 4;
        if self.width == 0 || self.height == 0 || self.data.len() != expected {
            return Err(MeshWarpError::validation(format!(
                "frame buffer has {} bytes for {}x{}",
                self.data.len(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    /// Write the frame as a PNG file (straight alpha).
    pub fn save_png(&self, path: &std::path::Path) -> MeshWarpResult<()> {
        use anyhow::Context as _;
        image::save_buffer_with_format(
            path,
            &self.to_straight_rgba8(),
            self.width,
            self.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}
