use crate::foundation::error::{MeshWarpError, MeshWarpResult};
use crate::mesh::grid::BrushDab;

/// Pointer input in mesh-local pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up,
    Leave,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BrushSettings {
    pub radius: f64,
    /// Weight added at the brush center per dab.
    pub strength: f64,
    pub erase: bool,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            radius: 50.0,
            strength: 0.5,
            erase: false,
        }
    }
}

impl BrushSettings {
    pub fn validate(&self) -> MeshWarpResult<()> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(MeshWarpError::validation(format!(
                "brush radius must be finite and > 0, got {}",
                self.radius
            )));
        }
        if !self.strength.is_finite() || !(0.0..=1.0).contains(&self.strength) {
            return Err(MeshWarpError::validation(format!(
                "brush strength must be in [0, 1], got {}",
                self.strength
            )));
        }
        Ok(())
    }

    pub fn dab_at(&self, x: f64, y: f64) -> BrushDab {
        BrushDab {
            x,
            y,
            radius: self.radius,
            strength: self.strength,
            erase: self.erase,
        }
    }
}

/// What a pointer event did to the weight maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaintOutcome {
    /// Painting is disabled in the current mode, or no stroke is in progress.
    Ignored,
    /// A dab was applied and touched this many points.
    Painted { touched: usize },
    StrokeEnded,
}

/// Tracks whether the pointer is held down over the mesh.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Stroke {
    active: bool,
}

impl Stroke {
    /// Returns the dab position for events that should paint.
    pub(crate) fn feed(&mut self, event: PointerEvent) -> Option<(f64, f64)> {
        match event {
            PointerEvent::Down { x, y } => {
                self.active = true;
                Some((x, y))
            }
            PointerEvent::Move { x, y } if self.active => Some((x, y)),
            PointerEvent::Move { .. } => None,
            PointerEvent::Up | PointerEvent::Leave => {
                self.active = false;
                None
            }
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn cancel(&mut self) {
        self.active = false;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/pointer.rs"]
mod tests;
