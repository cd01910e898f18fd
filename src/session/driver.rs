use std::time::{Duration, Instant};

use crate::assets::mask::{Segmenter, apply_alpha_mask};
use crate::assets::source::{DEFAULT_MAX_DIMENSION, SourceImage};
use crate::encode::matte::flatten_over_matte;
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{Fps, FrameIndex, Tick};
use crate::foundation::error::{MeshWarpError, MeshWarpResult};
use crate::layers::stack::{Layer, LayerId, LayerStack};
use crate::mesh::grid::{BrushDab, GridMesh};
use crate::physics::config::LayerConfig;
use crate::render::frame::FrameRGBA;
use crate::render::renderer::{MeshRenderer, RenderSettings, RenderStats};
use crate::session::pointer::{BrushSettings, PaintOutcome, PointerEvent, Stroke};

/// Mesh density used when a project does not name one.
pub const DEFAULT_ROWS: u32 = 20;

/// Where the session sits in its `Idle -> Loaded -> Animating <-> Exporting -> Loaded` lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverMode {
    /// No image, no mesh.
    Idle,
    /// Mesh exists and weight painting is enabled.
    Loaded,
    Animating,
    Exporting,
}

impl std::fmt::Display for DriverMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DriverMode::Idle => "idle",
            DriverMode::Loaded => "loaded",
            DriverMode::Animating => "animating",
            DriverMode::Exporting => "exporting",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug)]
pub struct SessionOpts {
    pub rows: u32,
    /// Images larger than this on either side are downscaled on load.
    pub max_dimension: u32,
    pub render: RenderSettings,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            max_dimension: DEFAULT_MAX_DIMENSION,
            render: RenderSettings::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExportOpts {
    pub duration_secs: f64,
    pub fps: Fps,
    /// Keep uncovered pixels transparent instead of flattening onto `background_rgb`.
    pub transparent: bool,
    pub background_rgb: [u8; 3],
    /// Abort the export once this much wall-clock time has elapsed.
    pub timeout: Option<Duration>,
}

impl ExportOpts {
    pub fn new(duration_secs: f64, fps: Fps) -> Self {
        Self {
            duration_secs,
            fps,
            transparent: false,
            background_rgb: [255, 255, 255],
            timeout: None,
        }
    }

    /// Number of ticks the export runs.
    pub fn total_frames(&self) -> u64 {
        self.fps.frames_for_secs(self.duration_secs)
    }

    pub fn validate(&self) -> MeshWarpResult<()> {
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(MeshWarpError::validation(format!(
                "export duration must be finite and > 0, got {}",
                self.duration_secs
            )));
        }
        if self.total_frames() == 0 {
            return Err(MeshWarpError::validation(format!(
                "export of {}s at {} fps produces no frames",
                self.duration_secs,
                self.fps.as_f64()
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportProgress {
    /// 1-based number of the frame just handed to the sink.
    pub frame: u64,
    pub total: u64,
    pub fraction: f64,
}

#[derive(Clone, Debug)]
pub struct ExportReport {
    /// Encoded output returned by the sink.
    pub bytes: Vec<u8>,
    pub frames: u64,
    /// Triangle accounting summed over every exported frame.
    pub stats: RenderStats,
}

#[derive(Clone, Debug)]
struct Scene {
    source: SourceImage,
    mesh: GridMesh,
}

/// Single owner of the image, mesh, layers and tick clock.
///
/// Every mutation goes through `&mut self` and checks [`DriverMode`], so painting can never race
/// the animation or export loop.
#[derive(Debug)]
pub struct Session {
    opts: SessionOpts,
    mode: DriverMode,
    layers: LayerStack,
    scene: Option<Scene>,
    renderer: MeshRenderer,
    frame: Option<FrameRGBA>,
    brush: BrushSettings,
    stroke: Stroke,
    active_layer: LayerId,
    tick: Tick,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionOpts::default())
    }
}

impl Session {
    pub fn new(opts: SessionOpts) -> Self {
        Self::with_layers(opts, LayerStack::default())
    }

    pub fn with_layers(opts: SessionOpts, layers: LayerStack) -> Self {
        let renderer = MeshRenderer::new(opts.render.clone());
        Self {
            active_layer: layers.first_id(),
            opts,
            mode: DriverMode::Idle,
            layers,
            scene: None,
            renderer,
            frame: None,
            brush: BrushSettings::default(),
            stroke: Stroke::default(),
            tick: Tick(0),
        }
    }

    pub fn mode(&self) -> DriverMode {
        self.mode
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn mesh(&self) -> Option<&GridMesh> {
        self.scene.as_ref().map(|s| &s.mesh)
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.scene.as_ref().map(|s| &s.source)
    }

    pub fn render_settings(&self) -> &RenderSettings {
        self.renderer.settings()
    }

    pub fn set_render_settings(&mut self, settings: RenderSettings) {
        self.renderer.set_settings(settings);
    }

    /// Most recently rendered frame, if any.
    pub fn last_frame(&self) -> Option<&FrameRGBA> {
        self.frame.as_ref()
    }

    fn set_mode(&mut self, next: DriverMode) {
        if self.mode != next {
            tracing::debug!(from = %self.mode, to = %next, "driver mode");
            self.mode = next;
        }
    }

    fn require_loaded(&self, what: &str) -> MeshWarpResult<()> {
        if self.mode != DriverMode::Loaded {
            return Err(MeshWarpError::state(format!(
                "{what} requires a loaded, paused session (mode is {})",
                self.mode
            )));
        }
        Ok(())
    }

    fn require_layer(&self, id: LayerId) -> MeshWarpResult<()> {
        if !self.layers.contains(id) {
            return Err(MeshWarpError::validation(format!("unknown layer {id}")));
        }
        Ok(())
    }

    /// Replace the image and rebuild the mesh. On error the previous image and mesh are kept.
    #[tracing::instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn load_image(&mut self, image: SourceImage) -> MeshWarpResult<()> {
        if matches!(self.mode, DriverMode::Animating | DriverMode::Exporting) {
            return Err(MeshWarpError::state(format!(
                "cannot replace the image while {}",
                self.mode
            )));
        }
        let source = image.fit_within(self.opts.max_dimension)?;
        let mesh = GridMesh::new(source.extent(), self.opts.rows)?;
        tracing::info!(
            width = source.width(),
            height = source.height(),
            rows = mesh.rows(),
            cols = mesh.cols(),
            "image loaded"
        );
        self.scene = Some(Scene { source, mesh });
        self.frame = None;
        self.stroke.cancel();
        self.tick = Tick(0);
        self.set_mode(DriverMode::Loaded);
        Ok(())
    }

    /// Run a segmentation collaborator and multiply its mask into the source pixels.
    ///
    /// The image keeps its size, so the mesh and painted weights survive.
    pub fn apply_segmentation(&mut self, segmenter: &dyn Segmenter) -> MeshWarpResult<()> {
        self.require_loaded("segmentation")?;
        let Some(scene) = self.scene.as_mut() else {
            return Err(MeshWarpError::state("no image loaded"));
        };
        let mask = segmenter.segment(&scene.source)?;
        scene.source = apply_alpha_mask(&scene.source, &mask)?;
        self.frame = None;
        Ok(())
    }

    pub fn add_layer(
        &mut self,
        name: impl Into<String>,
        config: LayerConfig,
    ) -> MeshWarpResult<LayerId> {
        self.reject_while_running("adding a layer")?;
        self.layers.add(name, config)
    }

    /// Remove a layer together with its painted weights.
    pub fn remove_layer(&mut self, id: LayerId) -> MeshWarpResult<Layer> {
        self.reject_while_running("removing a layer")?;
        let removed = self.layers.remove(id)?;
        if let Some(scene) = self.scene.as_mut() {
            scene.mesh.drop_layer(id);
        }
        if self.active_layer == id {
            self.active_layer = self.layers.first_id();
        }
        Ok(removed)
    }

    pub fn rename_layer(&mut self, id: LayerId, name: impl Into<String>) -> MeshWarpResult<()> {
        self.layers.rename(id, name)
    }

    pub fn set_layer_visible(&mut self, id: LayerId, visible: bool) -> MeshWarpResult<()> {
        self.layers.set_visible(id, visible)
    }

    pub fn toggle_layer_visible(&mut self, id: LayerId) -> MeshWarpResult<bool> {
        self.layers.toggle_visible(id)
    }

    /// Allowed while animating; takes effect on the next tick.
    pub fn set_layer_config(&mut self, id: LayerId, config: LayerConfig) -> MeshWarpResult<()> {
        self.layers.set_config(id, config)
    }

    pub fn move_layer_to(&mut self, id: LayerId, index: usize) -> MeshWarpResult<()> {
        self.layers.move_to(id, index)
    }

    pub fn move_layer_up(&mut self, id: LayerId) -> MeshWarpResult<()> {
        self.layers.move_up(id)
    }

    pub fn move_layer_down(&mut self, id: LayerId) -> MeshWarpResult<()> {
        self.layers.move_down(id)
    }

    fn reject_while_running(&self, what: &str) -> MeshWarpResult<()> {
        if matches!(self.mode, DriverMode::Animating | DriverMode::Exporting) {
            return Err(MeshWarpError::state(format!("{what} while {}", self.mode)));
        }
        Ok(())
    }

    pub fn active_layer(&self) -> LayerId {
        self.active_layer
    }

    pub fn set_active_layer(&mut self, id: LayerId) -> MeshWarpResult<()> {
        self.require_layer(id)?;
        self.active_layer = id;
        Ok(())
    }

    pub fn brush(&self) -> BrushSettings {
        self.brush
    }

    pub fn set_brush(&mut self, brush: BrushSettings) -> MeshWarpResult<()> {
        brush.validate()?;
        self.brush = brush;
        Ok(())
    }

    /// Feed one pointer event. Painting only happens in [`DriverMode::Loaded`].
    pub fn pointer(&mut self, event: PointerEvent) -> PaintOutcome {
        if self.mode != DriverMode::Loaded {
            self.stroke.cancel();
            return PaintOutcome::Ignored;
        }
        let was_active = self.stroke.is_active();
        let Some((x, y)) = self.stroke.feed(event) else {
            return if was_active && !self.stroke.is_active() {
                PaintOutcome::StrokeEnded
            } else {
                PaintOutcome::Ignored
            };
        };
        let dab = self.brush.dab_at(x, y);
        let layer = self.active_layer;
        match self.scene.as_mut() {
            Some(scene) => PaintOutcome::Painted {
                touched: scene.mesh.paint_dab(&dab, layer),
            },
            None => PaintOutcome::Ignored,
        }
    }

    /// Apply one dab to a specific layer.
    pub fn paint(&mut self, dab: &BrushDab, layer: LayerId) -> MeshWarpResult<usize> {
        let mesh = self.paintable_mesh(layer, "painting")?;
        Ok(mesh.paint_dab(dab, layer))
    }

    pub fn fill_layer(&mut self, layer: LayerId) -> MeshWarpResult<()> {
        self.paintable_mesh(layer, "filling weights")?.fill(layer);
        Ok(())
    }

    pub fn clear_layer(&mut self, layer: LayerId) -> MeshWarpResult<()> {
        self.paintable_mesh(layer, "clearing weights")?.clear(layer);
        Ok(())
    }

    fn paintable_mesh(&mut self, layer: LayerId, what: &str) -> MeshWarpResult<&mut GridMesh> {
        self.require_loaded(what)?;
        self.require_layer(layer)?;
        self.scene
            .as_mut()
            .map(|s| &mut s.mesh)
            .ok_or_else(|| MeshWarpError::state("no image loaded"))
    }

    /// Render the current pose without advancing time.
    pub fn render_current(&mut self) -> MeshWarpResult<&FrameRGBA> {
        let Some(scene) = self.scene.as_ref() else {
            return Err(MeshWarpError::state("no image loaded"));
        };
        let frame = self
            .frame
            .get_or_insert_with(|| FrameRGBA::transparent(scene.mesh.extent()));
        self.renderer.render_into(&scene.mesh, &scene.source, frame)?;
        Ok(frame)
    }

    /// Render the pose at `tick` from a paused session, then return the mesh to rest.
    pub fn render_at(&mut self, tick: Tick) -> MeshWarpResult<FrameRGBA> {
        self.require_loaded("rendering a single tick")?;
        let Some(scene) = self.scene.as_mut() else {
            return Err(MeshWarpError::state("no image loaded"));
        };
        scene.mesh.update(tick.as_f64(), &self.layers);
        let rendered = self.renderer.render(&scene.mesh, &scene.source);
        scene.mesh.reset();
        rendered
    }

    pub fn start_animation(&mut self) -> MeshWarpResult<()> {
        match self.mode {
            DriverMode::Animating => Ok(()),
            DriverMode::Loaded => {
                self.stroke.cancel();
                self.set_mode(DriverMode::Animating);
                Ok(())
            }
            other => Err(MeshWarpError::state(format!(
                "cannot start animation while {other}"
            ))),
        }
    }

    /// Advance the clock by one tick, update the mesh and render it.
    pub fn tick(&mut self) -> MeshWarpResult<&FrameRGBA> {
        if self.mode != DriverMode::Animating {
            return Err(MeshWarpError::state(format!(
                "tick requires an animating session (mode is {})",
                self.mode
            )));
        }
        let Some(scene) = self.scene.as_mut() else {
            return Err(MeshWarpError::state("no image loaded"));
        };
        self.tick = self.tick.next();
        scene.mesh.update(self.tick.as_f64(), &self.layers);
        let frame = self
            .frame
            .get_or_insert_with(|| FrameRGBA::transparent(scene.mesh.extent()));
        self.renderer.render_into(&scene.mesh, &scene.source, frame)?;
        Ok(frame)
    }

    /// Stop the loop and snap every point back to rest. The tick counter keeps its value.
    pub fn stop_animation(&mut self) {
        if self.mode != DriverMode::Animating {
            return;
        }
        if let Some(scene) = self.scene.as_mut() {
            scene.mesh.reset();
        }
        self.frame = None;
        self.set_mode(DriverMode::Loaded);
    }

    /// Run `duration * fps` ticks into `sink`.
    ///
    /// Whatever the outcome, the session ends [`DriverMode::Loaded`] with tick 0 and the mesh at
    /// rest. Validation happens before anything is mutated.
    #[tracing::instrument(skip_all, fields(duration = opts.duration_secs, fps = opts.fps.as_f64()))]
    pub fn export(
        &mut self,
        opts: &ExportOpts,
        sink: &mut dyn FrameSink,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> MeshWarpResult<ExportReport> {
        if self.scene.is_none() {
            return Err(MeshWarpError::state("export requires a loaded image"));
        }
        if !matches!(self.mode, DriverMode::Loaded | DriverMode::Animating) {
            return Err(MeshWarpError::state(format!(
                "cannot export while {}",
                self.mode
            )));
        }
        opts.validate()?;

        self.stop_animation();
        self.stroke.cancel();
        self.set_mode(DriverMode::Exporting);
        self.tick = Tick(0);

        let result = self.run_export(opts, sink, progress);

        if let Some(scene) = self.scene.as_mut() {
            scene.mesh.reset();
        }
        self.tick = Tick(0);
        self.frame = None;
        self.set_mode(DriverMode::Loaded);

        match &result {
            Ok(report) => tracing::info!(
                frames = report.frames,
                bytes = report.bytes.len(),
                skipped = report.stats.triangles_skipped,
                "export finished"
            ),
            Err(e) => tracing::warn!(error = %e, "export failed; session rolled back"),
        }
        result
    }

    fn run_export(
        &mut self,
        opts: &ExportOpts,
        sink: &mut dyn FrameSink,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> MeshWarpResult<ExportReport> {
        let Some(scene) = self.scene.as_ref() else {
            return Err(MeshWarpError::state("export requires a loaded image"));
        };
        let total = opts.total_frames();
        let extent = scene.mesh.extent();

        sink.begin(SinkConfig {
            width: extent.width,
            height: extent.height,
            fps: opts.fps,
            total_frames: total,
            transparent_background: opts.transparent,
        })?;

        let stats = match self.encode_frames(opts, sink, progress) {
            Ok(stats) => stats,
            Err(e) => {
                sink.abort();
                return Err(e);
            }
        };

        let bytes = sink.end()?;
        Ok(ExportReport {
            bytes,
            frames: total,
            stats,
        })
    }

    fn encode_frames(
        &mut self,
        opts: &ExportOpts,
        sink: &mut dyn FrameSink,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> MeshWarpResult<RenderStats> {
        let Some(scene) = self.scene.as_mut() else {
            return Err(MeshWarpError::state("export requires a loaded image"));
        };
        let total = opts.total_frames();
        let delay_ms = opts.fps.frame_delay_ms();
        let flatten_to = if !opts.transparent {
            Some(opts.background_rgb)
        } else if !sink.supports_alpha() {
            Some(sink.matte_rgb())
        } else {
            None
        };

        let started = Instant::now();
        let mut frame = FrameRGBA::transparent(scene.mesh.extent());
        let mut stats = RenderStats::default();
        let milestone = (total / 4).max(1);
        for i in 0..total {
            if let Some(limit) = opts.timeout
                && started.elapsed() >= limit
            {
                return Err(MeshWarpError::state(format!(
                    "export timed out after {:?} at frame {i} of {total}",
                    started.elapsed()
                )));
            }

            self.tick = self.tick.next();
            scene.mesh.update(self.tick.as_f64(), &self.layers);
            let s = self
                .renderer
                .render_into(&scene.mesh, &scene.source, &mut frame)?;
            stats.triangles_drawn += s.triangles_drawn;
            stats.triangles_skipped += s.triangles_skipped;
            stats.pixels_written += s.pixels_written;

            match flatten_to {
                Some(rgb) => {
                    let flat = flatten_over_matte(&frame, rgb)?;
                    sink.push_frame(FrameIndex(i), &flat, delay_ms)?;
                }
                None => sink.push_frame(FrameIndex(i), &frame, delay_ms)?,
            }

            let done = i + 1;
            progress(ExportProgress {
                frame: done,
                total,
                fraction: done as f64 / total as f64,
            });
            if done % milestone == 0 || done == total {
                tracing::debug!(frame = done, total, "export progress");
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/driver.rs"]
mod tests;
