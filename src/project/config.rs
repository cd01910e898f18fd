use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::assets::mask::{PrecomputedMask, load_mask};
use crate::assets::source::{DEFAULT_MAX_DIMENSION, SourceImage, load_image};
use crate::foundation::core::{Fps, Rgba8Premul};
use crate::foundation::error::{MeshWarpError, MeshWarpResult};
use crate::layers::stack::LayerStack;
use crate::mesh::grid::{BrushDab, MAX_ROWS};
use crate::physics::config::LayerConfig;
use crate::render::raster::Sampling;
use crate::render::renderer::RenderSettings;
use crate::session::driver::{DEFAULT_ROWS, ExportOpts, Session, SessionOpts};

/// A project file: source image, mesh density, layers with their painted weights, and render and
/// export settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Source image, relative to the project file.
    pub image: PathBuf,
    /// Grayscale alpha mask from an external segmentation step.
    #[serde(default)]
    pub mask: Option<PathBuf>,
    #[serde(default)]
    pub mesh: MeshSection,
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub export: ExportSection,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeshSection {
    pub rows: u32,
    pub max_dimension: u32,
}

impl Default for MeshSection {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerSpec {
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    pub physics: LayerConfig,
    #[serde(default)]
    pub weights: WeightSpec,
}

fn default_true() -> bool {
    true
}

/// How a layer's weight map is initialised. Stroke coordinates are in working-image pixels.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum WeightSpec {
    #[default]
    Fill,
    Clear,
    Strokes { strokes: Vec<BrushDab> },
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSection {
    pub sampling: Sampling,
    /// Straight RGBA drawn under the mesh; transparent when unset.
    pub background: Option<[u8; 4]>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportSection {
    pub duration_secs: f64,
    pub fps: u32,
    pub transparent: bool,
    /// Opaque color frames are flattened onto when transparency is off.
    pub matte: [u8; 3],
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            duration_secs: 3.0,
            fps: 20,
            transparent: false,
            matte: [255, 255, 255],
        }
    }
}

impl ProjectConfig {
    pub fn from_json_str(json: &str) -> MeshWarpResult<Self> {
        serde_json::from_str(json).map_err(|e| MeshWarpError::serde(format!("project JSON: {e}")))
    }

    /// Parse a project file; relative asset paths resolve against its directory.
    pub fn from_path(path: &Path) -> MeshWarpResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read project '{}'", path.display()))?;
        let mut cfg = Self::from_json_str(&text)?;
        cfg.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(cfg)
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn validate(&self) -> MeshWarpResult<()> {
        if self.mesh.rows == 0 || self.mesh.rows > MAX_ROWS {
            return Err(MeshWarpError::validation(format!(
                "mesh.rows must be in 1..={MAX_ROWS}, got {}",
                self.mesh.rows
            )));
        }
        if self.mesh.max_dimension == 0 {
            return Err(MeshWarpError::validation("mesh.max_dimension must be > 0"));
        }
        if self.layers.is_empty() {
            return Err(MeshWarpError::validation("project needs at least one layer"));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            layer.physics.validate().map_err(|e| {
                MeshWarpError::validation(format!("layers[{i}] '{}': {e}", layer.name))
            })?;
            if let WeightSpec::Strokes { strokes } = &layer.weights {
                for (j, s) in strokes.iter().enumerate() {
                    let finite = [s.x, s.y, s.radius, s.strength]
                        .iter()
                        .all(|v| v.is_finite());
                    if !finite || s.radius <= 0.0 || !(0.0..=1.0).contains(&s.strength) {
                        return Err(MeshWarpError::validation(format!(
                            "layers[{i}].weights.strokes[{j}] needs finite coordinates, radius > 0 and strength in [0, 1]"
                        )));
                    }
                }
            }
        }
        self.export_opts()?.validate()
    }

    pub fn session_opts(&self) -> SessionOpts {
        SessionOpts {
            rows: self.mesh.rows,
            max_dimension: self.mesh.max_dimension,
            render: RenderSettings {
                sampling: self.render.sampling,
                clear_rgba: self
                    .render
                    .background
                    .map(|[r, g, b, a]| Rgba8Premul::from_straight_rgba(r, g, b, a).to_array()),
            },
        }
    }

    pub fn export_opts(&self) -> MeshWarpResult<ExportOpts> {
        let mut opts = ExportOpts::new(self.export.duration_secs, Fps::whole(self.export.fps)?);
        opts.transparent = self.export.transparent;
        opts.background_rgb = self.export.matte;
        Ok(opts)
    }

    /// Load the image (and mask) from disk and build a ready-to-animate session.
    #[tracing::instrument(skip(self), fields(image = %self.image.display()))]
    pub fn build_session(&self) -> MeshWarpResult<Session> {
        self.validate()?;
        let image = load_image(&self.resolve(&self.image))?;
        let mut session = self.assemble(image)?;
        if let Some(mask) = &self.mask {
            let mask = load_mask(&self.resolve(mask))?;
            session.apply_segmentation(&PrecomputedMask(mask))?;
        }
        Ok(session)
    }

    /// Build the session around an already decoded image, replaying layer weights.
    pub fn build_session_with_image(&self, image: SourceImage) -> MeshWarpResult<Session> {
        self.validate()?;
        self.assemble(image)
    }

    fn assemble(&self, image: SourceImage) -> MeshWarpResult<Session> {
        let Some((first, rest)) = self.layers.split_first() else {
            return Err(MeshWarpError::validation("project needs at least one layer"));
        };
        let mut stack = LayerStack::new(first.name.clone(), first.physics);
        for spec in rest {
            stack.add(spec.name.clone(), spec.physics)?;
        }
        let ids = stack.ids();
        for (id, spec) in ids.iter().zip(&self.layers) {
            stack.set_visible(*id, spec.visible)?;
        }

        let mut session = Session::with_layers(self.session_opts(), stack);
        session.load_image(image)?;
        for (id, spec) in ids.iter().zip(&self.layers) {
            match &spec.weights {
                WeightSpec::Fill => session.fill_layer(*id)?,
                WeightSpec::Clear => session.clear_layer(*id)?,
                WeightSpec::Strokes { strokes } => {
                    for dab in strokes {
                        session.paint(dab, *id)?;
                    }
                }
            }
        }
        tracing::debug!(layers = ids.len(), "project session ready");
        Ok(session)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/project/config.rs"]
mod tests;
