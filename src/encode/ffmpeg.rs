use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use anyhow::Context as _;

use crate::encode::matte::flatten_premul_over_bg_to_opaque_rgba8;
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{MeshWarpError, MeshWarpResult};
use crate::render::frame::FrameRGBA;

/// Options for [`FfmpegSink`].
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Destination `.mp4` path.
    pub out_path: PathBuf,
    pub overwrite: bool,
    /// Color used for any pixel that still carries partial alpha.
    pub bg_rgb: [u8; 3],
}

impl FfmpegSinkOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            bg_rgb: [0, 0, 0],
        }
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> MeshWarpResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

struct Running {
    cfg: SinkConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    scratch: Vec<u8>,
}

/// MP4 sink that pipes raw RGBA frames into the system `ffmpeg` binary.
///
/// Odd frame sizes are padded to even dimensions for `yuv420p`. `end` returns the bytes of the
/// written file.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,
    running: Option<Running>,
}

impl FfmpegSink {
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            running: None,
        }
    }

    pub fn out_path(&self) -> &Path {
        &self.opts.out_path
    }

    fn spawn(&self, cfg: &SinkConfig) -> MeshWarpResult<Child> {
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if self.opts.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
            "-an",
            "-vf",
            "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&self.opts.out_path);

        cmd.spawn().map_err(|e| {
            MeshWarpError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> MeshWarpResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(MeshWarpError::validation("encode width/height must be non-zero"));
        }
        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(MeshWarpError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(MeshWarpError::encode(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut child = self.spawn(&cfg)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MeshWarpError::encode("failed to open ffmpeg stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MeshWarpError::encode("failed to open ffmpeg stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });
        tracing::debug!(
            out = %self.opts.out_path.display(),
            width = cfg.width,
            height = cfg.height,
            "ffmpeg started"
        );
        self.running = Some(Running {
            scratch: vec![0u8; (cfg.width as usize) * (cfg.height as usize) * 4],
            cfg,
            child,
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
        });
        Ok(())
    }

    fn push_frame(
        &mut self,
        idx: FrameIndex,
        frame: &FrameRGBA,
        _delay_ms: u32,
    ) -> MeshWarpResult<()> {
        let bg = self.opts.bg_rgb;
        let Some(run) = self.running.as_mut() else {
            return Err(MeshWarpError::encode("ffmpeg sink used before begin"));
        };
        if frame.width != run.cfg.width || frame.height != run.cfg.height {
            return Err(MeshWarpError::validation(format!(
                "frame {} size mismatch: got {}x{}, expected {}x{}",
                idx.0, frame.width, frame.height, run.cfg.width, run.cfg.height
            )));
        }

        if frame.premultiplied {
            flatten_premul_over_bg_to_opaque_rgba8(
                &mut run.scratch,
                &frame.data,
                [bg[0], bg[1], bg[2], 255],
            )?;
        } else {
            let flat = crate::encode::matte::flatten_over_matte(frame, bg)?;
            run.scratch.copy_from_slice(&flat.data);
        }

        let Some(stdin) = run.stdin.as_mut() else {
            return Err(MeshWarpError::encode("ffmpeg encoder is already finalized"));
        };
        stdin.write_all(&run.scratch).map_err(|e| {
            MeshWarpError::encode(format!("failed to write frame {} to ffmpeg: {e}", idx.0))
        })?;
        Ok(())
    }

    fn end(&mut self) -> MeshWarpResult<Vec<u8>> {
        let Some(mut run) = self.running.take() else {
            return Err(MeshWarpError::encode("ffmpeg sink finished before begin"));
        };
        drop(run.stdin.take());

        let status = run
            .child
            .wait()
            .map_err(|e| MeshWarpError::encode(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr_bytes = match run.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| MeshWarpError::encode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| MeshWarpError::encode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(MeshWarpError::encode(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        let bytes = std::fs::read(&self.opts.out_path)
            .with_context(|| format!("read encoded '{}'", self.opts.out_path.display()))?;
        Ok(bytes)
    }

    fn abort(&mut self) {
        let Some(mut run) = self.running.take() else {
            return;
        };
        drop(run.stdin.take());
        if let Err(e) = run.child.kill() {
            tracing::debug!(error = %e, "ffmpeg already exited");
        }
        if let Err(e) = run.child.wait() {
            tracing::warn!(error = %e, "failed to reap ffmpeg");
        }
        if let Some(handle) = run.stderr_drain.take() {
            let _ = handle.join();
        }
        match std::fs::remove_file(&self.opts.out_path) {
            Ok(()) => tracing::debug!(
                out = %self.opts.out_path.display(),
                "removed partial output"
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                out = %self.opts.out_path.display(),
                error = %e,
                "failed to remove partial output"
            ),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
