use std::path::Path;

use anyhow::Context;

use crate::assets::source::SourceImage;
use crate::foundation::core::Extent;
use crate::foundation::error::{MeshWarpError, MeshWarpResult};
use crate::foundation::math::mul_div255_u8;

/// Single-channel alpha mask, same size as the image it applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlphaMask {
    extent: Extent,
    alpha: Vec<u8>,
}

impl AlphaMask {
    pub fn from_luma_bytes(width: u32, height: u32, alpha: Vec<u8>) -> MeshWarpResult<Self> {
        let extent = Extent::new(width, height)?;
        if alpha.len() != extent.pixel_count() {
            return Err(MeshWarpError::validation(format!(
                "mask buffer has {} bytes, expected {}",
                alpha.len(),
                extent.pixel_count()
            )));
        }
        Ok(Self { extent, alpha })
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn data(&self) -> &[u8] {
        &self.alpha
    }

    /// Resize to `extent` when the mask was produced at a different resolution.
    pub fn resized_to(&self, extent: Extent) -> MeshWarpResult<Self> {
        if extent == self.extent {
            return Ok(self.clone());
        }
        let buf =
            image::GrayImage::from_raw(self.extent.width, self.extent.height, self.alpha.clone())
                .ok_or_else(|| MeshWarpError::validation("mask buffer does not match its extent"))?;
        let resized = image::imageops::resize(
            &buf,
            extent.width,
            extent.height,
            image::imageops::FilterType::Triangle,
        );
        Self::from_luma_bytes(extent.width, extent.height, resized.into_raw())
    }
}

/// Read a grayscale (or color, converted to luma) mask image from disk.
#[tracing::instrument]
pub fn load_mask(path: &Path) -> MeshWarpResult<AlphaMask> {
    let bytes = std::fs::read(path).with_context(|| format!("read mask '{}'", path.display()))?;
    let luma = image::load_from_memory(&bytes)
        .context("decode mask from memory")?
        .to_luma8();
    let (w, h) = luma.dimensions();
    AlphaMask::from_luma_bytes(w, h, luma.into_raw())
}

/// Background-removal collaborator: produces a same-size alpha mask for an image.
pub trait Segmenter {
    fn segment(&self, image: &SourceImage) -> MeshWarpResult<AlphaMask>;
}

/// Segmenter replaying a mask computed ahead of time, resized to the target image.
#[derive(Clone, Debug)]
pub struct PrecomputedMask(pub AlphaMask);

impl Segmenter for PrecomputedMask {
    fn segment(&self, image: &SourceImage) -> MeshWarpResult<AlphaMask> {
        self.0.resized_to(image.extent())
    }
}

/// Multiply every premultiplied channel by the mask alpha.
pub fn apply_alpha_mask(image: &SourceImage, mask: &AlphaMask) -> MeshWarpResult<SourceImage> {
    if image.extent() != mask.extent() {
        return Err(MeshWarpError::validation(format!(
            "mask is {}x{}, image is {}x{}",
            mask.extent().width,
            mask.extent().height,
            image.width(),
            image.height()
        )));
    }
    let mut out = image.data().to_vec();
    for (px, &m) in out.chunks_exact_mut(4).zip(mask.data()) {
        let m = u16::from(m);
        for c in px.iter_mut() {
            *c = mul_div255_u8(u16::from(*c), m);
        }
    }
    image.with_data(out)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/mask.rs"]
mod tests;
