use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pulseclip::{
    Canvas, Fps, FrameCompositor, JobManager, JobStatus, OverlayAssets, PipelineConfig,
    REST_PHASE, RenderRequest, RenderWindow, TelemetrySource, TelemetryTrack,
    TrackRef, annotate, resample,
};

#[derive(Parser, Debug)]
#[command(name = "pulseclip", version, about = "Cycling telemetry overlay renderer")]
struct Cli {
    /// JSON pipeline config; flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a summary of a telemetry log.
    Inspect(InspectArgs),
    /// Export the samples of a time range as JSON.
    Slice(SliceArgs),
    /// Render the overlay at one instant as a PNG.
    Frame(FrameArgs),
    /// Render an MP4 overlay clip (requires `ffmpeg` on PATH).
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// TCX or JSON telemetry log.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Include the absolute-time power series.
    #[arg(long, default_value_t = false)]
    series: bool,
}

#[derive(Args, Debug)]
struct SliceArgs {
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Seconds from track start, or an RFC 3339 timestamp.
    #[arg(long)]
    start: String,

    /// Seconds from track start, or an RFC 3339 timestamp.
    #[arg(long)]
    end: String,

    /// Output JSON path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct OverlayArgs {
    /// Output width in pixels.
    #[arg(long, default_value_t = RenderRequest::DEFAULT_WIDTH)]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value_t = RenderRequest::DEFAULT_HEIGHT)]
    height: u32,

    /// Rider weight for W/kg.
    #[arg(long, default_value_t = RenderRequest::DEFAULT_RIDER_WEIGHT_KG)]
    weight: f64,

    /// TTF/OTF display font. Defaults to a system sans-serif face, then built-in block digits.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Heart icon (PNG, JPEG or SVG).
    #[arg(long)]
    heart_icon: Option<PathBuf>,

    /// Lightning icon (PNG, JPEG or SVG).
    #[arg(long)]
    lightning_icon: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FrameArgs {
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Seconds from track start, or an RFC 3339 timestamp.
    #[arg(long)]
    at: String,

    /// Heartbeat phase in [0, 1) to draw the heart at.
    #[arg(long, default_value_t = REST_PHASE)]
    phase: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    overlay: OverlayArgs,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Seconds from track start, or an RFC 3339 timestamp.
    #[arg(long)]
    start: String,

    /// Seconds from track start, or an RFC 3339 timestamp.
    #[arg(long)]
    end: String,

    /// Output MP4 path. Defaults to `<output_dir>/<job id>.mp4`.
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long, default_value_t = RenderRequest::DEFAULT_FPS)]
    fps: u32,

    #[command(flatten)]
    overlay: OverlayArgs,

    /// Composite frames in parallel.
    #[arg(long)]
    parallel: bool,

    /// Override rayon worker threads (parallel mode only).
    #[arg(long)]
    threads: Option<usize>,

    /// libx264 constant rate factor.
    #[arg(long)]
    crf: Option<u8>,

    /// Fail instead of replacing an existing output file.
    #[arg(long)]
    no_overwrite: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config = match &cli.config {
        Some(p) => PipelineConfig::from_path(p)?,
        None => PipelineConfig::default(),
    };

    match cli.cmd {
        Command::Inspect(args) => cmd_inspect(&config, args),
        Command::Slice(args) => cmd_slice(&config, args),
        Command::Frame(args) => cmd_frame(&config, args),
        Command::Render(args) => cmd_render(config, args),
    }
}

fn load_track(config: &PipelineConfig, path: &Path) -> anyhow::Result<TelemetryTrack> {
    let source = TelemetrySource::new(config.sanitize)?;
    Ok(source.parse_path(path)?)
}

/// Seconds from track start, accepting plain seconds or an RFC 3339 timestamp.
fn track_secs(track: &TelemetryTrack, arg: &str) -> anyhow::Result<f64> {
    if let Ok(secs) = arg.parse::<f64>() {
        return Ok(secs);
    }
    let t = chrono::DateTime::parse_from_rfc3339(arg)
        .with_context(|| format!("'{arg}' is neither seconds nor an RFC 3339 timestamp"))?;
    Ok(track.relative_secs(t.with_timezone(&chrono::Utc)))
}

fn load_assets(args: &OverlayArgs) -> anyhow::Result<OverlayAssets> {
    Ok(OverlayAssets::load(
        args.font.as_deref(),
        args.heart_icon.as_deref(),
        args.lightning_icon.as_deref(),
    )?)
}

fn cmd_inspect(config: &PipelineConfig, args: InspectArgs) -> anyhow::Result<()> {
    let source = TelemetrySource::new(config.sanitize)?;
    let raw = std::fs::read(&args.in_path)
        .with_context(|| format!("read telemetry log '{}'", args.in_path.display()))?;
    let (track, report) = source.parse_with_report(&raw)?;

    let mut out = serde_json::json!({
        "summary": track.summary(),
        "report": report,
    });
    if args.series {
        out["power_series"] = serde_json::to_value(track.power_series())?;
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_slice(config: &PipelineConfig, args: SliceArgs) -> anyhow::Result<()> {
    let track = load_track(config, &args.in_path)?;
    let start = track_secs(&track, &args.start)?;
    let end = track_secs(&track, &args.end)?;
    if end < start {
        bail!("slice end ({end}s) is before start ({start}s)");
    }
    let n = track.write_slice_json(start, end, &args.out)?;
    eprintln!("wrote {n} samples to {}", args.out.display());
    Ok(())
}

fn cmd_frame(config: &PipelineConfig, args: FrameArgs) -> anyhow::Result<()> {
    if !(0.0..1.0).contains(&args.phase) {
        bail!("--phase must be in [0, 1)");
    }
    let track = load_track(config, &args.in_path)?;
    let at = track_secs(&track, &args.at)?;
    if !(0.0..=track.duration_secs()).contains(&at) {
        bail!(
            "--at {at}s is outside the track [0s, {}s]",
            track.duration_secs()
        );
    }
    let fps = Fps::integer(RenderRequest::DEFAULT_FPS)?;
    let canvas = Canvas {
        width: args.overlay.width,
        height: args.overlay.height,
    };
    // A one-frame window; at the very end of the track it ends on the last sample instead.
    let dt = fps.frame_duration_secs();
    let start = if at + dt > track.duration_secs() {
        (track.duration_secs() - dt).max(0.0)
    } else {
        at
    };
    let window = RenderWindow::new(
        start,
        start + dt,
        fps,
        canvas,
        args.overlay.weight,
    )?;

    let mut frames = resample(&track, &window)?;
    annotate(&mut frames, fps, args.phase);
    let values = frames
        .first()
        .ok_or_else(|| anyhow!("no frame at {at}s"))?;

    let assets = load_assets(&args.overlay)?;
    let frame =
        FrameCompositor::from_assets(canvas, config.style.clone(), &assets)?.render(values)?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.to_straight_rgba8(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(mut config: PipelineConfig, args: RenderArgs) -> anyhow::Result<()> {
    if args.parallel {
        config.render.parallel = true;
    }
    if args.threads.is_some() {
        config.render.threads = args.threads;
    }
    if let Some(crf) = args.crf {
        config.encode.crf = crf;
    }
    if args.no_overwrite {
        config.encode.overwrite = false;
    }

    let track = load_track(&config, &args.in_path)?;
    let start = track_secs(&track, &args.start)?;
    let end = track_secs(&track, &args.end)?;
    let assets = load_assets(&args.overlay)?;

    let manager = JobManager::new(config, assets)?;
    let track_id = manager.register_track(track);
    let request = RenderRequest {
        fps: args.fps,
        width: args.overlay.width,
        height: args.overlay.height,
        rider_weight_kg: args.overlay.weight,
        output_path: args.out,
        ..RenderRequest::new(TrackRef::Id(track_id), start, end)
    };
    let id = manager.submit(request)?;

    let mut last_report = -1.0;
    let snap = loop {
        let snap = manager
            .wait_timeout(id, Duration::from_millis(500))
            .ok_or_else(|| anyhow!("job {id} disappeared"))?;
        if snap.status.is_terminal() {
            break snap;
        }
        if snap.progress - last_report >= 0.05 {
            last_report = snap.progress;
            tracing::info!(
                status = %snap.status,
                percent = (snap.progress * 100.0).round(),
                "{}",
                snap.message
            );
        }
    };

    match snap.status {
        JobStatus::Succeeded => {
            let out = snap
                .output_path
                .ok_or_else(|| anyhow!("job {id} succeeded without an output path"))?;
            eprintln!("wrote {}", out.display());
            Ok(())
        }
        JobStatus::Cancelled => bail!("render cancelled"),
        _ => bail!(
            "render failed: {}",
            snap.error.unwrap_or_else(|| snap.message.clone())
        ),
    }
}
