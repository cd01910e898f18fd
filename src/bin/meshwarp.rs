use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use meshwarp::mesh::grid::WEIGHT_EPSILON;
use meshwarp::{
    FfmpegSink, FfmpegSinkOpts, Fps, FrameSink, GifSink, GifSinkOpts, ProjectConfig, Tick,
};

#[derive(Parser, Debug)]
#[command(name = "meshwarp", version)]
struct Cli {
    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the pose at one tick as a PNG.
    Frame(FrameArgs),
    /// Export an animation as GIF, or MP4 (requires `ffmpeg` on PATH).
    Export(ExportArgs),
    /// Print the mesh and layer summary of a project.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Tick to render (0 is the rest pose).
    #[arg(long, default_value_t = 0)]
    tick: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output path; `.gif` or `.mp4`.
    #[arg(long)]
    out: PathBuf,

    /// Override the project's frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Override the project's duration in seconds.
    #[arg(long)]
    duration: Option<f64>,

    /// Keep the background transparent (GIF keys the matte color).
    #[arg(long, default_value_t = false)]
    transparent: bool,

    /// Fail instead of replacing an existing output file.
    #[arg(long, default_value_t = false)]
    no_overwrite: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn create_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let project = ProjectConfig::from_path(&args.in_path)?;
    let mut session = project.build_session()?;
    let frame = session.render_at(Tick(args.tick))?;

    create_parent(&args.out)?;
    frame.save_png(&args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let project = ProjectConfig::from_path(&args.in_path)?;
    let mut session = project.build_session()?;

    let mut opts = project.export_opts()?;
    if let Some(fps) = args.fps {
        opts.fps = Fps::whole(fps)?;
    }
    if let Some(duration) = args.duration {
        opts.duration_secs = duration;
    }
    opts.transparent |= args.transparent;

    let ext = args
        .out
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let (mut sink, writes_file): (Box<dyn FrameSink>, bool) = match ext.as_deref() {
        Some("gif") => (Box::new(GifSink::new(GifSinkOpts::default())), false),
        Some("mp4") => {
            let mut sink_opts = FfmpegSinkOpts::new(&args.out);
            sink_opts.overwrite = !args.no_overwrite;
            sink_opts.bg_rgb = opts.background_rgb;
            (Box::new(FfmpegSink::new(sink_opts)), true)
        }
        _ => anyhow::bail!(
            "unsupported output format '{}' (expected .gif or .mp4)",
            args.out.display()
        ),
    };

    if !writes_file && args.no_overwrite && args.out.exists() {
        anyhow::bail!("output file '{}' already exists", args.out.display());
    }

    let report = session.export(&opts, sink.as_mut(), &mut |p| {
        if p.frame == p.total || p.frame % 10 == 0 {
            tracing::info!(frame = p.frame, total = p.total, "exporting");
        }
    })?;

    if !writes_file {
        create_parent(&args.out)?;
        std::fs::write(&args.out, &report.bytes)
            .with_context(|| format!("write '{}'", args.out.display()))?;
    }
    eprintln!(
        "wrote {} ({} frames, {} bytes)",
        args.out.display(),
        report.frames,
        report.bytes.len()
    );
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let project = ProjectConfig::from_path(&args.in_path)?;
    let session = project.build_session()?;
    let opts = project.export_opts()?;

    if let (Some(source), Some(mesh)) = (session.source(), session.mesh()) {
        println!("image: {}x{}", source.width(), source.height());
        println!(
            "mesh: {} rows x {} cols, {} points, {} triangles",
            mesh.rows(),
            mesh.cols(),
            mesh.point_count(),
            mesh.triangle_count()
        );
        for layer in session.layers().iter() {
            let covered = mesh.weights().coverage(layer.id, WEIGHT_EPSILON);
            println!(
                "layer {} '{}': {} amp={} freq={} speed={} visible={} weighted_points={}",
                layer.id,
                layer.name,
                layer.config.kind,
                layer.config.amplitude,
                layer.config.frequency,
                layer.config.speed,
                layer.visible,
                covered
            );
        }
    }
    println!(
        "export: {}s at {} fps = {} frames",
        opts.duration_secs,
        opts.fps.as_f64(),
        opts.total_frames()
    );
    Ok(())
}
