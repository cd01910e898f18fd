use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::foundation::core::Extent;
use crate::foundation::error::{MeshWarpError, MeshWarpResult};

/// Default upper bound on the longest side of a working image.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Rest-pose raster, premultiplied RGBA8, row-major and tightly packed.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceImage {
    extent: Extent,
    rgba8_premul: Arc<Vec<u8>>,
}

impl SourceImage {
    /// Wrap already-premultiplied RGBA8 bytes.
    pub fn from_premul_rgba8(width: u32, height: u32, data: Vec<u8>) -> MeshWarpResult<Self> {
        let extent = Extent::new(width, height)?;
        if data.len() != extent.rgba_len() {
            return Err(MeshWarpError::validation(format!(
                "image buffer has {} bytes, expected {} for {width}x{height}",
                data.len(),
                extent.rgba_len()
            )));
        }
        Ok(Self {
            extent,
            rgba8_premul: Arc::new(data),
        })
    }

    /// Premultiply straight-alpha RGBA8 bytes.
    pub fn from_straight_rgba8(width: u32, height: u32, mut data: Vec<u8>) -> MeshWarpResult<Self> {
        premultiply_rgba8_in_place(&mut data);
        Self::from_premul_rgba8(width, height, data)
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn width(&self) -> u32 {
        self.extent.width
    }

    pub fn height(&self) -> u32 {
        self.extent.height
    }

    pub fn data(&self) -> &[u8] {
        &self.rgba8_premul
    }

    /// Premultiplied pixel, or `None` outside the image.
    pub fn pixel(&self, x: i64, y: i64) -> Option<[u8; 4]> {
        if x < 0 || y < 0 || x >= i64::from(self.extent.width) || y >= i64::from(self.extent.height)
        {
            return None;
        }
        let idx = ((y as usize) * (self.extent.width as usize) + x as usize) * 4;
        let px = &self.rgba8_premul[idx..idx + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Downscale so the longest side is at most `max_dimension`, preserving aspect ratio.
    #[tracing::instrument(skip(self), fields(width = self.extent.width, height = self.extent.height))]
    pub fn fit_within(&self, max_dimension: u32) -> MeshWarpResult<Self> {
        if max_dimension == 0 {
            return Err(MeshWarpError::validation("max_dimension must be non-zero"));
        }
        let Extent { width, height } = self.extent;
        let longest = width.max(height);
        if longest <= max_dimension {
            return Ok(self.clone());
        }
        let scale = f64::from(max_dimension) / f64::from(longest);
        let new_w = ((f64::from(width) * scale).round() as u32).max(1);
        let new_h = ((f64::from(height) * scale).round() as u32).max(1);

        let buf = image::RgbaImage::from_raw(width, height, self.rgba8_premul.to_vec())
            .ok_or_else(|| MeshWarpError::validation("image buffer does not match its extent"))?;
        // Premultiplied data resamples without dark fringes.
        let resized =
            image::imageops::resize(&buf, new_w, new_h, image::imageops::FilterType::Triangle);
        tracing::debug!(new_w, new_h, "downscaled source image");
        Self::from_premul_rgba8(new_w, new_h, resized.into_raw())
    }

    /// Straight-alpha copy of the pixels, for encoders and PNG output.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = self.rgba8_premul.to_vec();
        unpremultiply_rgba8_in_place(&mut out);
        out
    }

    pub(crate) fn with_data(&self, data: Vec<u8>) -> MeshWarpResult<Self> {
        Self::from_premul_rgba8(self.extent.width, self.extent.height, data)
    }
}

/// Decode encoded image bytes into a premultiplied [`SourceImage`].
pub fn decode_image(bytes: &[u8]) -> MeshWarpResult<SourceImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    SourceImage::from_straight_rgba8(width, height, rgba.into_raw())
}

/// Read and decode an image file.
#[tracing::instrument]
pub fn load_image(path: &Path) -> MeshWarpResult<SourceImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
    decode_image(&bytes)
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

pub(crate) fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u16 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/source.rs"]
mod tests;
