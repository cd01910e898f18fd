use crate::foundation::error::{MeshWarpError, MeshWarpResult};

/// Closed set of procedural displacement kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhysicsKind {
    /// Radial breathing around the image center.
    Idle,
    /// Directional sway with turbulent cross terms.
    Wind,
    /// Orthogonal ripple waves.
    Water,
    /// High-frequency shimmer with upward drift.
    Fire,
    /// Sharp periodic squeeze toward the center.
    Pulse,
    /// Cross-coupled sinusoidal wobble.
    Wobble,
    /// Angular twist around the center.
    Spiral,
}

impl PhysicsKind {
    pub const ALL: [PhysicsKind; 7] = [
        PhysicsKind::Idle,
        PhysicsKind::Wind,
        PhysicsKind::Water,
        PhysicsKind::Fire,
        PhysicsKind::Pulse,
        PhysicsKind::Wobble,
        PhysicsKind::Spiral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PhysicsKind::Idle => "idle",
            PhysicsKind::Wind => "wind",
            PhysicsKind::Water => "water",
            PhysicsKind::Fire => "fire",
            PhysicsKind::Pulse => "pulse",
            PhysicsKind::Wobble => "wobble",
            PhysicsKind::Spiral => "spiral",
        }
    }
}

impl std::fmt::Display for PhysicsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhysicsKind {
    type Err = MeshWarpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhysicsKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MeshWarpError::validation(format!("unknown physics kind '{s}'")))
    }
}

/// Parameters of one displacement layer.
///
/// Missing fields in serialized form fall back to [`LayerConfig::preset`] for the given kind.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "LayerConfigDef")]
pub struct LayerConfig {
    #[serde(rename = "type")]
    pub kind: PhysicsKind,
    /// Peak offset in pixels.
    pub amplitude: f64,
    pub frequency: f64,
    /// Multiplier from global ticks to layer time.
    pub speed: f64,
    pub direction_x: f64,
    pub direction_y: f64,
    /// Mixing factor in `[0, 1]` for noise-like kinds.
    pub turbulence: f64,
}

impl LayerConfig {
    /// Default tuning for `kind`.
    pub fn preset(kind: PhysicsKind) -> Self {
        let (amplitude, frequency, speed, direction_x, direction_y, turbulence) = match kind {
            PhysicsKind::Idle => (6.0, 1.0, 0.05, 0.0, -1.0, 0.0),
            PhysicsKind::Wind => (8.0, 1.0, 0.08, 1.0, 0.3, 0.4),
            PhysicsKind::Water => (5.0, 1.0, 0.1, 1.0, 0.0, 0.2),
            PhysicsKind::Fire => (6.0, 1.5, 0.15, 0.0, -1.0, 0.6),
            PhysicsKind::Pulse => (8.0, 1.0, 0.06, 0.0, 0.0, 0.0),
            PhysicsKind::Wobble => (6.0, 1.0, 0.08, 0.0, 0.0, 0.0),
            PhysicsKind::Spiral => (10.0, 1.0, 0.04, 0.0, 0.0, 0.0),
        };
        Self {
            kind,
            amplitude,
            frequency,
            speed,
            direction_x,
            direction_y,
            turbulence,
        }
    }

    pub fn validate(&self) -> MeshWarpResult<()> {
        let fields = [
            ("amplitude", self.amplitude),
            ("frequency", self.frequency),
            ("speed", self.speed),
            ("direction_x", self.direction_x),
            ("direction_y", self.direction_y),
            ("turbulence", self.turbulence),
        ];
        for (name, v) in fields {
            if !v.is_finite() {
                return Err(MeshWarpError::validation(format!(
                    "layer {name} must be finite"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.turbulence) {
            return Err(MeshWarpError::validation("layer turbulence must be in [0, 1]"));
        }
        Ok(())
    }

    /// Layer-local time for a global clock value.
    pub fn layer_time(&self, global_time: f64) -> f64 {
        global_time * self.speed
    }
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self::preset(PhysicsKind::Idle)
    }
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct LayerConfigDef {
    #[serde(rename = "type")]
    kind: PhysicsKind,
    amplitude: Option<f64>,
    frequency: Option<f64>,
    speed: Option<f64>,
    direction_x: Option<f64>,
    direction_y: Option<f64>,
    turbulence: Option<f64>,
}

impl From<LayerConfigDef> for LayerConfig {
    fn from(d: LayerConfigDef) -> Self {
        let p = LayerConfig::preset(d.kind);
        Self {
            kind: d.kind,
            amplitude: d.amplitude.unwrap_or(p.amplitude),
            frequency: d.frequency.unwrap_or(p.frequency),
            speed: d.speed.unwrap_or(p.speed),
            direction_x: d.direction_x.unwrap_or(p.direction_x),
            direction_y: d.direction_y.unwrap_or(p.direction_y),
            turbulence: d.turbulence.unwrap_or(p.turbulence),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/physics/config.rs"]
mod tests;
