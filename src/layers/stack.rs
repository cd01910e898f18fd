use crate::foundation::error::{MeshWarpError, MeshWarpResult};
use crate::physics::config::{LayerConfig, PhysicsKind};

/// Stable layer identity. Ids are never reused within one [`LayerStack`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct LayerId(pub u64);

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub visible: bool,
    pub config: LayerConfig,
}

/// Ordered layer collection; never empty.
#[derive(Clone, Debug)]
pub struct LayerStack {
    layers: Vec<Layer>,
    next_id: u64,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new("Layer 1", LayerConfig::preset(PhysicsKind::Idle))
    }
}

impl LayerStack {
    /// Create a stack holding a single visible layer.
    pub fn new(name: impl Into<String>, config: LayerConfig) -> Self {
        Self {
            layers: vec![Layer {
                id: LayerId(1),
                name: name.into(),
                visible: true,
                config,
            }],
            next_id: 2,
        }
    }

    /// Append a visible layer on top and return its id.
    pub fn add(&mut self, name: impl Into<String>, config: LayerConfig) -> MeshWarpResult<LayerId> {
        config.validate()?;
        let id = LayerId(self.next_id);
        self.next_id += 1;
        self.layers.push(Layer {
            id,
            name: name.into(),
            visible: true,
            config,
        });
        Ok(id)
    }

    /// Remove a layer. Removing the last remaining layer is rejected without mutation.
    pub fn remove(&mut self, id: LayerId) -> MeshWarpResult<Layer> {
        let idx = self.index_of(id)?;
        if self.layers.len() == 1 {
            return Err(MeshWarpError::validation(
                "cannot remove the last remaining layer",
            ));
        }
        Ok(self.layers.remove(idx))
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.get(id).is_some()
    }

    pub fn index_of(&self, id: LayerId) -> MeshWarpResult<usize> {
        self.layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| MeshWarpError::validation(format!("unknown {id}")))
    }

    pub fn rename(&mut self, id: LayerId, name: impl Into<String>) -> MeshWarpResult<()> {
        self.require_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> MeshWarpResult<()> {
        self.require_mut(id)?.visible = visible;
        Ok(())
    }

    /// Flip visibility and return the new value.
    pub fn toggle_visible(&mut self, id: LayerId) -> MeshWarpResult<bool> {
        let layer = self.require_mut(id)?;
        layer.visible = !layer.visible;
        Ok(layer.visible)
    }

    /// Replace a layer's configuration; takes effect on the next update.
    pub fn set_config(&mut self, id: LayerId, config: LayerConfig) -> MeshWarpResult<()> {
        config.validate()?;
        self.require_mut(id)?.config = config;
        Ok(())
    }

    /// Move a layer to `index` (clamped to the valid range).
    pub fn move_to(&mut self, id: LayerId, index: usize) -> MeshWarpResult<()> {
        let from = self.index_of(id)?;
        let layer = self.layers.remove(from);
        let to = index.min(self.layers.len());
        self.layers.insert(to, layer);
        Ok(())
    }

    pub fn move_up(&mut self, id: LayerId) -> MeshWarpResult<()> {
        let idx = self.index_of(id)?;
        self.move_to(id, idx + 1)
    }

    pub fn move_down(&mut self, id: LayerId) -> MeshWarpResult<()> {
        let idx = self.index_of(id)?;
        self.move_to(id, idx.saturating_sub(1))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn visible(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|l| l.visible)
    }

    pub fn ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(|l| l.id).collect()
    }

    pub fn first_id(&self) -> LayerId {
        self.layers[0].id
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn require_mut(&mut self, id: LayerId) -> MeshWarpResult<&mut Layer> {
        self.get_mut(id)
            .ok_or_else(|| MeshWarpError::validation(format!("unknown {id}")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layers/stack.rs"]
mod tests;
