use std::collections::BTreeMap;

use crate::layers::stack::LayerId;

/// Per-layer weight maps stored densely, one `f32` per mesh point.
///
/// A layer without a map reads as weight 0 everywhere.
#[derive(Clone, Debug)]
pub struct WeightMaps {
    point_count: usize,
    maps: BTreeMap<LayerId, Vec<f32>>,
}

impl WeightMaps {
    pub fn new(point_count: usize) -> Self {
        Self {
            point_count,
            maps: BTreeMap::new(),
        }
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    pub fn get(&self, layer: LayerId, point: usize) -> f32 {
        self.maps
            .get(&layer)
            .and_then(|m| m.get(point))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn layer(&self, layer: LayerId) -> Option<&[f32]> {
        self.maps.get(&layer).map(Vec::as_slice)
    }

    /// Mutable map for `layer`, allocated zeroed on first access.
    pub fn layer_mut(&mut self, layer: LayerId) -> &mut [f32] {
        let n = self.point_count;
        self.maps.entry(layer).or_insert_with(|| vec![0.0; n])
    }

    pub fn set_all(&mut self, layer: LayerId, value: f32) {
        debug_assert!((0.0..=1.0).contains(&value));
        if value == 0.0 {
            // Absent reads as zero; keep the map sparse.
            self.maps.remove(&layer);
            return;
        }
        self.layer_mut(layer).fill(value);
    }

    pub fn remove(&mut self, layer: LayerId) -> bool {
        self.maps.remove(&layer).is_some()
    }

    pub fn layers(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.maps.keys().copied()
    }

    /// Number of points with weight above `threshold` for `layer`.
    pub fn coverage(&self, layer: LayerId, threshold: f32) -> usize {
        self.layer(layer)
            .map(|m| m.iter().filter(|&&w| w > threshold).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mesh/weights.rs"]
mod tests;
