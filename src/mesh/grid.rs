use rayon::prelude::*;

use crate::foundation::core::{Extent, Point, Vec2};
use crate::foundation::error::{MeshWarpError, MeshWarpResult};
use crate::layers::stack::{LayerId, LayerStack};
use crate::mesh::weights::WeightMaps;
use crate::physics::config::LayerConfig;
use crate::physics::displacement::{DisplacementCtx, displacement};

/// Weights at or below this value do not contribute to displacement.
pub const WEIGHT_EPSILON: f32 = 0.01;

/// Upper bound on lattice rows, keeping per-tick cost bounded.
pub const MAX_ROWS: u32 = 512;
/// Upper bound on derived column count.
pub const MAX_COLS: u32 = MAX_ROWS * 8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshPoint {
    /// Rest-pose position, fixed at construction.
    pub origin: Point,
    /// Displaced position, recomputed every update.
    pub position: Point,
}

impl MeshPoint {
    pub fn offset(&self) -> Vec2 {
        self.position - self.origin
    }
}

/// Point indices of one lattice triangle, in row-major point order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriangleIdx(pub [usize; 3]);

/// One brush dab on a layer's weight map.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BrushDab {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    #[serde(default = "default_strength")]
    pub strength: f64,
    #[serde(default)]
    pub erase: bool,
}

fn default_strength() -> f64 {
    1.0
}

/// Uniform lattice spanning `[0, width] x [0, height]` with `(rows+1)*(cols+1)` points.
#[derive(Clone, Debug)]
pub struct GridMesh {
    extent: Extent,
    rows: u32,
    cols: u32,
    points: Vec<MeshPoint>,
    weights: WeightMaps,
    ctx: DisplacementCtx,
}

impl GridMesh {
    /// Build the rest-pose lattice. `cols = floor(rows * width / height)`, at least 1.
    #[tracing::instrument]
    pub fn new(extent: Extent, rows: u32) -> MeshWarpResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(MeshWarpError::validation("mesh extent must be non-zero"));
        }
        if rows == 0 || rows > MAX_ROWS {
            return Err(MeshWarpError::validation(format!(
                "mesh rows must be in 1..={MAX_ROWS}, got {rows}"
            )));
        }
        let cols = (f64::from(rows) * f64::from(extent.width) / f64::from(extent.height)).floor();
        if cols > f64::from(MAX_COLS) {
            return Err(MeshWarpError::validation(format!(
                "{}x{} image with {rows} rows needs {cols} columns, more than {MAX_COLS}",
                extent.width, extent.height
            )));
        }
        let cols = (cols as u32).max(1);

        let w = f64::from(extent.width);
        let h = f64::from(extent.height);
        let mut points = Vec::with_capacity(((rows + 1) * (cols + 1)) as usize);
        for r in 0..=rows {
            let y = h * f64::from(r) / f64::from(rows);
            for c in 0..=cols {
                let x = w * f64::from(c) / f64::from(cols);
                let p = Point::new(x, y);
                points.push(MeshPoint {
                    origin: p,
                    position: p,
                });
            }
        }

        tracing::debug!(rows, cols, points = points.len(), "built mesh");
        let weights = WeightMaps::new(points.len());
        Ok(Self {
            extent,
            rows,
            cols,
            points,
            weights,
            ctx: DisplacementCtx::for_extent(extent),
        })
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Lattice spacing along x and y.
    pub fn spacing(&self) -> Vec2 {
        Vec2::new(
            f64::from(self.extent.width) / f64::from(self.cols),
            f64::from(self.extent.height) / f64::from(self.rows),
        )
    }

    pub fn points(&self) -> &[MeshPoint] {
        &self.points
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn index(&self, row: u32, col: u32) -> usize {
        (row as usize) * (self.cols as usize + 1) + col as usize
    }

    pub fn point(&self, row: u32, col: u32) -> Option<&MeshPoint> {
        if row > self.rows || col > self.cols {
            return None;
        }
        self.points.get(self.index(row, col))
    }

    pub fn weights(&self) -> &WeightMaps {
        &self.weights
    }

    pub fn weight(&self, layer: LayerId, point: usize) -> f32 {
        self.weights.get(layer, point)
    }

    pub fn displacement_ctx(&self) -> DisplacementCtx {
        self.ctx
    }

    /// Add (or subtract when `erase`) linearly falling-off weight within `radius` of `(cx, cy)`.
    ///
    /// Distances are measured from rest-pose origins. Returns the number of points touched.
    pub fn paint(
        &mut self,
        cx: f64,
        cy: f64,
        radius: f64,
        strength: f64,
        erase: bool,
        layer: LayerId,
    ) -> usize {
        if radius.is_nan()
            || radius <= 0.0
            || !strength.is_finite()
            || !cx.is_finite()
            || !cy.is_finite()
        {
            return 0;
        }
        let center = Point::new(cx, cy);
        let origins = &self.points;
        let map = self.weights.layer_mut(layer);
        let mut touched = 0usize;
        for (w, p) in map.iter_mut().zip(origins) {
            let distance = p.origin.distance(center);
            if distance >= radius {
                continue;
            }
            let delta = ((1.0 - distance / radius) * strength) as f32;
            let next = if erase { *w - delta } else { *w + delta };
            *w = next.clamp(0.0, 1.0);
            touched += 1;
        }
        touched
    }

    pub fn paint_dab(&mut self, dab: &BrushDab, layer: LayerId) -> usize {
        self.paint(dab.x, dab.y, dab.radius, dab.strength, dab.erase, layer)
    }

    /// Set every weight of `layer` to 1.
    pub fn fill(&mut self, layer: LayerId) {
        self.weights.set_all(layer, 1.0);
    }

    /// Set every weight of `layer` to 0.
    pub fn clear(&mut self, layer: LayerId) {
        self.weights.set_all(layer, 0.0);
    }

    /// Forget all weights of a removed layer.
    pub fn drop_layer(&mut self, layer: LayerId) {
        self.weights.remove(layer);
    }

    /// Recompute every position from the visible, weighted layers at `global_time`.
    pub fn update(&mut self, global_time: f64, layers: &LayerStack) {
        let active: Vec<(&[f32], LayerConfig)> = layers
            .visible()
            .filter_map(|l| self.weights.layer(l.id).map(|m| (m, l.config)))
            .collect();
        let ctx = self.ctx;

        if active.is_empty() {
            self.points.iter_mut().for_each(|p| p.position = p.origin);
            return;
        }

        self.points
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, p)| {
                let mut acc = Vec2::ZERO;
                let mut contributed = false;
                for (map, cfg) in &active {
                    let w = map[i];
                    debug_assert!((0.0..=1.0).contains(&w));
                    if w <= WEIGHT_EPSILON {
                        continue;
                    }
                    let t = cfg.layer_time(global_time);
                    acc += displacement(p.origin, t, cfg, &ctx) * f64::from(w);
                    contributed = true;
                }
                p.position = if contributed { p.origin + acc } else { p.origin };
            });
    }

    /// Snap every point back to its rest pose.
    pub fn reset(&mut self) {
        for p in &mut self.points {
            p.position = p.origin;
        }
    }

    #[cfg(test)]
    pub(crate) fn points_mut(&mut self) -> &mut [MeshPoint] {
        &mut self.points
    }

    pub fn is_at_rest(&self) -> bool {
        self.points.iter().all(|p| p.position == p.origin)
    }

    pub fn triangle_count(&self) -> usize {
        (self.rows as usize) * (self.cols as usize) * 2
    }

    /// Two triangles per cell, sharing the cell's top-right to bottom-left diagonal.
    pub fn triangles(&self) -> impl Iterator<Item = TriangleIdx> + '_ {
        (0..self.rows).flat_map(move |r| {
            (0..self.cols).flat_map(move |c| {
                let tl = self.index(r, c);
                let tr = self.index(r, c + 1);
                let bl = self.index(r + 1, c);
                let br = self.index(r + 1, c + 1);
                [TriangleIdx([tl, tr, bl]), TriangleIdx([tr, br, bl])]
            })
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mesh/grid.rs"]
mod tests;
