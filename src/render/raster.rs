//! Fixed-point triangle coverage and source sampling.
//!
//! Vertices snap to a 1/256 pixel grid and coverage uses exact integer edge functions with a
//! consistent tie-break, so triangles sharing an edge never both claim (or both miss) a pixel.

use crate::assets::source::SourceImage;
use crate::foundation::core::{Affine, Point};
use crate::foundation::math::blend_over_premul;
use crate::render::frame::FrameRGBA;

const SUBPIXEL_BITS: u32 = 8;
const SUBPIXEL: i64 = 1 << SUBPIXEL_BITS;
const HALF_PIXEL: i64 = SUBPIXEL / 2;
const COORD_LIMIT: f64 = 1.0e6;

/// Source texture filtering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sampling {
    #[default]
    Nearest,
    Bilinear,
}

type Fixed = (i64, i64);

fn to_fixed(p: Point) -> Option<Fixed> {
    if !p.x.is_finite() || !p.y.is_finite() {
        return None;
    }
    let s = SUBPIXEL as f64;
    let x = p.x.clamp(-COORD_LIMIT, COORD_LIMIT) * s;
    let y = p.y.clamp(-COORD_LIMIT, COORD_LIMIT) * s;
    Some((x.round() as i64, y.round() as i64))
}

fn edge(a: Fixed, b: Fixed, p: Fixed) -> i64 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

/// Exactly one of `a->b` and `b->a` owns pixels lying on the edge.
fn owns_edge(a: Fixed, b: Fixed) -> bool {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    dy > 0 || (dy == 0 && dx < 0)
}

fn covered(w: i64, a: Fixed, b: Fixed) -> bool {
    w > 0 || (w == 0 && owns_edge(a, b))
}

/// Paint every pixel of `dst` whose center lies in `tri`, sampling `src` through `to_source`.
///
/// Returns the number of pixels written.
pub(crate) fn fill_triangle(
    dst: &mut FrameRGBA,
    tri: [Point; 3],
    to_source: Affine,
    src: &SourceImage,
    sampling: Sampling,
) -> usize {
    let (Some(v0), Some(mut v1), Some(mut v2)) =
        (to_fixed(tri[0]), to_fixed(tri[1]), to_fixed(tri[2]))
    else {
        return 0;
    };
    let area = edge(v0, v1, v2);
    if area == 0 {
        return 0;
    }
    if area < 0 {
        std::mem::swap(&mut v1, &mut v2);
    }

    let min_x = v0.0.min(v1.0).min(v2.0).div_euclid(SUBPIXEL);
    let max_x = v0.0.max(v1.0).max(v2.0).div_euclid(SUBPIXEL);
    let min_y = v0.1.min(v1.1).min(v2.1).div_euclid(SUBPIXEL);
    let max_y = v0.1.max(v1.1).max(v2.1).div_euclid(SUBPIXEL);
    let w = i64::from(dst.width);
    let h = i64::from(dst.height);
    if max_x < 0 || max_y < 0 || min_x >= w || min_y >= h {
        return 0;
    }
    let (x0, x1) = (min_x.max(0), max_x.min(w - 1));
    let (y0, y1) = (min_y.max(0), max_y.min(h - 1));

    let mut written = 0usize;
    for py in y0..=y1 {
        let cy = py * SUBPIXEL + HALF_PIXEL;
        for px in x0..=x1 {
            let p = (px * SUBPIXEL + HALF_PIXEL, cy);
            if !covered(edge(v1, v2, p), v1, v2)
                || !covered(edge(v2, v0, p), v2, v0)
                || !covered(edge(v0, v1, p), v0, v1)
            {
                continue;
            }
            let s = to_source * Point::new(px as f64 + 0.5, py as f64 + 0.5);
            let Some(rgba) = sample(src, s, sampling) else {
                continue;
            };
            blend_over_premul(dst.pixel_mut(px as u32, py as u32), rgba);
            written += 1;
        }
    }
    written
}

/// Premultiplied sample at source-space point `s`; `None` when it falls off the image.
pub(crate) fn sample(src: &SourceImage, s: Point, sampling: Sampling) -> Option<[u8; 4]> {
    match sampling {
        Sampling::Nearest => src.pixel(s.x.floor() as i64, s.y.floor() as i64),
        Sampling::Bilinear => {
            let fx = s.x - 0.5;
            let fy = s.y - 0.5;
            let x0 = fx.floor();
            let y0 = fy.floor();
            let tx = fx - x0;
            let ty = fy - y0;
            let (xi, yi) = (x0 as i64, y0 as i64);
            let taps = [
                (src.pixel(xi, yi), (1.0 - tx) * (1.0 - ty)),
                (src.pixel(xi + 1, yi), tx * (1.0 - ty)),
                (src.pixel(xi, yi + 1), (1.0 - tx) * ty),
                (src.pixel(xi + 1, yi + 1), tx * ty),
            ];
            if taps.iter().all(|(p, _)| p.is_none()) {
                return None;
            }
            let mut acc = [0.0f64; 4];
            for (p, wt) in taps {
                let Some(p) = p else { continue };
                for c in 0..4 {
                    acc[c] += f64::from(p[c]) * wt;
                }
            }
            Some(acc.map(|v| v.round().clamp(0.0, 255.0) as u8))
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/raster.rs"]
mod tests;
