use crate::assets::source::SourceImage;
use crate::foundation::core::Point;
use crate::foundation::error::{MeshWarpError, MeshWarpResult};
use crate::mesh::grid::GridMesh;
use crate::render::affine::{invert_affine, solve_affine};
use crate::render::frame::FrameRGBA;
use crate::render::raster::{Sampling, fill_triangle};

/// Renderer settings, also readable from a project file.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub sampling: Sampling,
    /// Premultiplied color the frame is cleared to before drawing; transparent when unset.
    pub clear_rgba: Option<[u8; 4]>,
}

/// Per-frame triangle accounting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub triangles_drawn: u64,
    /// Triangles left unfilled because their affine map was degenerate.
    pub triangles_skipped: u64,
    pub pixels_written: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriangleOutcome {
    Drawn { pixels: usize },
    Degenerate,
}

/// Texture-map one triangle: pixels inside `current` sample `src` at the matching rest-pose spot.
pub fn draw_triangle(
    dst: &mut FrameRGBA,
    src: &SourceImage,
    rest: [Point; 3],
    current: [Point; 3],
    sampling: Sampling,
) -> TriangleOutcome {
    let Some(forward) = solve_affine(rest, current) else {
        return TriangleOutcome::Degenerate;
    };
    let Some(to_source) = invert_affine(forward) else {
        return TriangleOutcome::Degenerate;
    };
    TriangleOutcome::Drawn {
        pixels: fill_triangle(dst, current, to_source, src, sampling),
    }
}

/// Rebuilds frames from a deformed [`GridMesh`] and its rest-pose image.
#[derive(Clone, Debug, Default)]
pub struct MeshRenderer {
    settings: RenderSettings,
    last_stats: RenderStats,
}

impl MeshRenderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            last_stats: RenderStats::default(),
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: RenderSettings) {
        self.settings = settings;
    }

    /// Statistics of the most recent render.
    pub fn last_stats(&self) -> RenderStats {
        self.last_stats
    }

    /// Render the mesh's current pose into a fresh frame.
    pub fn render(&mut self, mesh: &GridMesh, source: &SourceImage) -> MeshWarpResult<FrameRGBA> {
        let mut frame = FrameRGBA::transparent(mesh.extent());
        self.render_into(mesh, source, &mut frame)?;
        Ok(frame)
    }

    /// Render into `frame`, reallocating it when its size differs from the mesh.
    #[tracing::instrument(skip_all, fields(triangles = mesh.triangle_count()))]
    pub fn render_into(
        &mut self,
        mesh: &GridMesh,
        source: &SourceImage,
        frame: &mut FrameRGBA,
    ) -> MeshWarpResult<RenderStats> {
        if source.extent() != mesh.extent() {
            return Err(MeshWarpError::validation(format!(
                "source image is {}x{} but mesh rest pose is {}x{}",
                source.width(),
                source.height(),
                mesh.extent().width,
                mesh.extent().height
            )));
        }
        let clear = self.settings.clear_rgba.unwrap_or([0, 0, 0, 0]);
        if frame.extent() != mesh.extent() || frame.data.len() != mesh.extent().rgba_len() {
            *frame = FrameRGBA::filled(mesh.extent(), clear);
        } else {
            frame.clear(clear);
        }
        frame.premultiplied = true;

        let points = mesh.points();
        let mut stats = RenderStats::default();
        for tri in mesh.triangles() {
            let [i0, i1, i2] = tri.0;
            let rest = [points[i0].origin, points[i1].origin, points[i2].origin];
            let current = [points[i0].position, points[i1].position, points[i2].position];
            match draw_triangle(frame, source, rest, current, self.settings.sampling) {
                TriangleOutcome::Drawn { pixels } => {
                    stats.triangles_drawn += 1;
                    stats.pixels_written += pixels as u64;
                }
                TriangleOutcome::Degenerate => {
                    tracing::trace!(?tri, "skipping degenerate triangle");
                    stats.triangles_skipped += 1;
                }
            }
        }
        if stats.triangles_skipped > 0 {
            tracing::debug!(skipped = stats.triangles_skipped, "degenerate triangles skipped");
        }
        self.last_stats = stats;
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/renderer.rs"]
mod tests;
