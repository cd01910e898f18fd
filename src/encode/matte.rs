use rayon::prelude::*;

use crate::foundation::error::{MeshWarpError, MeshWarpResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::frame::FrameRGBA;

/// Chroma-key green shared by the renderer and sinks that cannot carry alpha.
pub const DEFAULT_MATTE_RGB: [u8; 3] = [0, 255, 0];

const PAR_CHUNK_PIXELS: usize = 4096;

/// Composite a premultiplied frame over an opaque color, producing an opaque frame.
pub fn flatten_over_matte(frame: &FrameRGBA, matte_rgb: [u8; 3]) -> MeshWarpResult<FrameRGBA> {
    frame.validate()?;
    let mut data = vec![0u8; frame.data.len()];
    let bg = [matte_rgb[0], matte_rgb[1], matte_rgb[2], 255];
    if frame.premultiplied {
        data.par_chunks_mut(PAR_CHUNK_PIXELS * 4)
            .zip(frame.data.par_chunks(PAR_CHUNK_PIXELS * 4))
            .try_for_each(|(d, s)| flatten_premul_over_bg_to_opaque_rgba8(d, s, bg))?;
    } else {
        let mut premul = frame.data.clone();
        crate::assets::source::premultiply_rgba8_in_place(&mut premul);
        flatten_premul_over_bg_to_opaque_rgba8(&mut data, &premul, bg)?;
    }
    Ok(FrameRGBA {
        width: frame.width,
        height: frame.height,
        data,
        premultiplied: true,
    })
}

pub(crate) fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> MeshWarpResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(MeshWarpError::validation(
            "flatten_premul_over_bg_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        d[0] = (s[0] as u16 + mul_div255_u16(bg_r, inv)).min(255) as u8;
        d[1] = (s[1] as u16 + mul_div255_u16(bg_g, inv)).min(255) as u8;
        d[2] = (s[2] as u16 + mul_div255_u16(bg_b, inv)).min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

/// Turn pixels exactly matching the matte color into fully transparent pixels (straight RGBA8).
pub fn key_matte_to_transparent(straight_rgba: &mut [u8], matte_rgb: [u8; 3]) -> usize {
    let mut keyed = 0usize;
    for px in straight_rgba.chunks_exact_mut(4) {
        if px[..3] == matte_rgb {
            px.copy_from_slice(&[0, 0, 0, 0]);
            keyed += 1;
        }
    }
    keyed
}

#[cfg(test)]
#[path = "../../tests/unit/encode/matte.rs"]
mod tests;
