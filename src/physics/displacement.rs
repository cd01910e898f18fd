//! Closed-form displacement functions, one per [`PhysicsKind`].
//!
//! Every function reads the point's rest-pose origin only, never its current position, so a
//! given `(origin, layer_time, config)` always yields the same offset.

use crate::foundation::core::{Extent, Point, Vec2};
use crate::physics::config::{LayerConfig, PhysicsKind};

/// Pixel-space scale applied to coordinates inside the sinusoids.
const SPATIAL: f64 = 0.02;
/// Share of the idle breath pushed upward regardless of radius direction.
const IDLE_LIFT: f64 = 0.5;
/// Twist in radians per pixel of distance per pixel of amplitude.
const SPIRAL_TWIST: f64 = 1e-4;
const DIST_EPS: f64 = 1e-9;

/// Mesh-wide geometry shared by all displacement kinds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplacementCtx {
    pub center: Point,
    /// Distance from the center to a corner, used to normalize radii.
    pub max_distance: f64,
}

impl DisplacementCtx {
    pub fn for_extent(extent: Extent) -> Self {
        Self {
            center: extent.center(),
            max_distance: extent.half_diagonal(),
        }
    }

    fn normalized_distance(&self, dist: f64) -> f64 {
        if self.max_distance > DIST_EPS {
            dist / self.max_distance
        } else {
            0.0
        }
    }
}

/// Offset of `origin` for one layer at `layer_time` (already scaled by the layer speed).
pub fn displacement(
    origin: Point,
    layer_time: f64,
    cfg: &LayerConfig,
    ctx: &DisplacementCtx,
) -> Vec2 {
    match cfg.kind {
        PhysicsKind::Idle => idle(origin, layer_time, cfg, ctx),
        PhysicsKind::Wind => wind(origin, layer_time, cfg),
        PhysicsKind::Water => water(origin, layer_time, cfg),
        PhysicsKind::Fire => fire(origin, layer_time, cfg),
        PhysicsKind::Pulse => pulse(origin, layer_time, cfg, ctx),
        PhysicsKind::Wobble => wobble(origin, layer_time, cfg),
        PhysicsKind::Spiral => spiral(origin, layer_time, cfg, ctx),
    }
}

fn idle(origin: Point, t: f64, cfg: &LayerConfig, ctx: &DisplacementCtx) -> Vec2 {
    let rel = origin - ctx.center;
    let dist = rel.hypot();
    let falloff = (1.0 - ctx.normalized_distance(dist)).max(0.0);
    let breath = cfg.amplitude * (t * cfg.frequency).sin() * falloff;
    let dir = if dist > DIST_EPS {
        rel / dist
    } else {
        Vec2::ZERO
    };
    Vec2::new(dir.x * breath, dir.y * breath - breath * IDLE_LIFT)
}

fn wind(origin: Point, t: f64, cfg: &LayerConfig) -> Vec2 {
    let phase = t * cfg.frequency + origin.x * SPATIAL;
    let sway = phase.sin() + 0.5 * (phase * 0.5 + origin.y * SPATIAL + 1.3).sin();
    let cross = cfg.turbulence
        * (t * cfg.frequency * 2.3 + (origin.x + origin.y) * SPATIAL * 1.7).sin()
        * (t * 0.7 + origin.y * SPATIAL).cos();
    let s = (sway + cross) * cfg.amplitude;
    Vec2::new(s * cfg.direction_x, s * cfg.direction_y)
}

fn water(origin: Point, t: f64, cfg: &LayerConfig) -> Vec2 {
    let k = SPATIAL * 3.0 * cfg.frequency;
    Vec2::new(
        cfg.amplitude * (origin.x * k + t).sin(),
        cfg.amplitude * (origin.y * k + t).cos(),
    )
}

fn fire(origin: Point, t: f64, cfg: &LayerConfig) -> Vec2 {
    let k = SPATIAL * 4.0 * cfg.frequency;
    let shimmer_x = (origin.y * k + t * 3.0).sin() * (origin.x * k * 0.5 + t * 2.0).cos();
    let shimmer_y = 0.5 * (origin.x * k + t * 4.0).sin()
        + cfg.turbulence * ((origin.x + origin.y) * k * 0.5 + t * 5.0).sin();
    let drift = cfg.amplitude * 0.5 * t.sin().abs();
    Vec2::new(
        cfg.amplitude * 0.4 * shimmer_x * (1.0 + cfg.turbulence),
        cfg.amplitude * 0.3 * shimmer_y - drift,
    )
}

fn pulse(origin: Point, t: f64, cfg: &LayerConfig, ctx: &DisplacementCtx) -> Vec2 {
    let beat = (t * cfg.frequency).sin().powi(6);
    let toward_center = ctx.center - origin;
    let scale = if ctx.max_distance > DIST_EPS {
        cfg.amplitude * beat / ctx.max_distance
    } else {
        0.0
    };
    toward_center * scale
}

fn wobble(origin: Point, t: f64, cfg: &LayerConfig) -> Vec2 {
    let phase = t * cfg.frequency;
    Vec2::new(
        cfg.amplitude * (phase + origin.y * SPATIAL).sin(),
        cfg.amplitude * (phase + origin.x * SPATIAL).cos(),
    )
}

fn spiral(origin: Point, t: f64, cfg: &LayerConfig, ctx: &DisplacementCtx) -> Vec2 {
    let rel = origin - ctx.center;
    let dist = rel.hypot();
    if dist <= DIST_EPS {
        return Vec2::ZERO;
    }
    let twist = (t * cfg.frequency).sin() * dist * cfg.amplitude * SPIRAL_TWIST;
    let (s, c) = twist.sin_cos();
    let rotated = Vec2::new(rel.x * c - rel.y * s, rel.x * s + rel.y * c);
    rotated - rel
}

#[cfg(test)]
#[path = "../../tests/unit/physics/displacement.rs"]
mod tests;
