use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use alertlens::{
    AnnotationManifest, ConvertOpts, CpuCanvas, ManagerOpts, OverlayController, OverlayStyle,
    Rect, RegistryHandle, StaticVideo, VideoElement, builtin_registry, convert_to_manifest,
};

#[derive(Parser, Debug)]
#[command(name = "alertlens", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert alert metadata JSON into a manifest.
    Convert(ConvertArgs),
    /// Summarize a manifest and list what is visible at given times.
    Inspect(InspectArgs),
    /// Render one overlay frame of a manifest as a PNG.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Input alert metadata JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Categories to extract (comma separated). Defaults to every built-in category.
    #[arg(long, value_delimiter = ',')]
    categories: Vec<String>,

    /// Conversion options JSON (`pointDurationMs`, `timeOffsetMs`, `minConfidence`).
    #[arg(long)]
    opts: Option<PathBuf>,

    /// Override the time offset in ms.
    #[arg(long, allow_hyphen_values = true)]
    time_offset_ms: Option<f64>,

    /// Override the detection confidence floor.
    #[arg(long)]
    min_confidence: Option<f64>,

    /// Output manifest path (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Input manifest JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Playback times (ms) to list visible annotations at.
    #[arg(long = "at")]
    at_ms: Vec<f64>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input manifest JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Playback time in ms.
    #[arg(long = "at")]
    at_ms: f64,

    /// Frame width in pixels.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Frame height in pixels.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// TTF/OTF font used for labels. Text is skipped without one.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Overlay style JSON. Defaults to the built-in style with environment overrides.
    #[arg(long)]
    style: Option<PathBuf>,

    /// Categories not to draw (comma separated).
    #[arg(long, value_delimiter = ',')]
    disable: Vec<String>,

    /// Outline the canvas.
    #[arg(long, default_value_t = false)]
    debug_border: bool,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Convert(args) => cmd_convert(args),
        Command::Inspect(args) => cmd_inspect(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let f = std::fs::File::open(path).with_context(|| format!("open '{}'", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(f))
        .with_context(|| format!("parse json '{}'", path.display()))
}

fn read_manifest(path: &Path) -> anyhow::Result<AnnotationManifest> {
    let raw: serde_json::Value = read_json(path)?;
    AnnotationManifest::from_raw(&raw)
        .with_context(|| format!("'{}' holds no usable annotations", path.display()))
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

fn cmd_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let raw: serde_json::Value = read_json(&args.in_path)?;
    let mut opts = match &args.opts {
        Some(p) => read_json::<ConvertOpts>(p)?,
        None => ConvertOpts::default(),
    };
    if let Some(ms) = args.time_offset_ms {
        opts.time_offset_ms = ms;
    }
    if let Some(c) = args.min_confidence {
        opts.min_confidence = c;
    }
    let categories = if args.categories.is_empty() {
        ManagerOpts::default().default_categories
    } else {
        args.categories
    };

    let manifest = convert_to_manifest(&raw, &categories, &opts).with_context(|| {
        format!(
            "no annotations extracted from '{}' for {categories:?}",
            args.in_path.display()
        )
    })?;
    let json = manifest.to_json()?;

    match &args.out {
        Some(out) => {
            ensure_parent(out)?;
            std::fs::write(out, json).with_context(|| format!("write '{}'", out.display()))?;
            eprintln!("wrote {} ({} annotations)", out.display(), manifest.count());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}").context("write stdout")?;
        }
    }
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let manifest = read_manifest(&args.in_path)?;
    let mut stdout = std::io::stdout().lock();

    writeln!(
        stdout,
        "annotations: {} (dropped {})",
        manifest.count(),
        manifest.dropped()
    )?;
    if let Some(span) = manifest.time_span() {
        writeln!(stdout, "span: {}..{} ms", span.start_ms, span.end_ms)?;
    }
    for (category, n) in manifest.counts_by_category() {
        writeln!(stdout, "  {category}: {n}")?;
    }
    for t in &args.at_ms {
        let visible = manifest.visible_at(*t);
        let listed: Vec<String> = visible
            .iter()
            .map(|a| format!("{} [{}]", a.id, a.category))
            .collect();
        writeln!(stdout, "at {t} ms: {}", listed.join(", "))?;
    }
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let manifest = read_manifest(&args.in_path)?;
    let style = match &args.style {
        Some(p) => read_json::<OverlayStyle>(p)?,
        None => OverlayStyle::from_env(),
    };

    let mut canvas =
        CpuCanvas::new(args.width, args.height)?.with_border_color(style.debug_border_color);
    if let Some(font) = &args.font {
        let bytes =
            std::fs::read(font).with_context(|| format!("read font '{}'", font.display()))?;
        canvas = canvas.with_font(bytes)?;
    }

    let video = StaticVideo::new(
        0,
        Rect::new(0.0, 0.0, f64::from(args.width), f64::from(args.height)),
    );
    video.seek(args.at_ms);
    let video: Arc<dyn VideoElement> = video;

    let registry = RegistryHandle::new(builtin_registry(&style));
    let mut ctl = OverlayController::new(&video, Box::new(canvas), registry);
    ctl.set_debug_border(args.debug_border);
    for category in &args.disable {
        ctl.toggle_renderer(category, false);
    }
    ctl.show();
    ctl.load_manifest(manifest);
    let report = ctl.last_report();

    let frame = ctl
        .read_pixels()
        .context("canvas kept no pixels")?
        .into_straight();

    ensure_parent(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} (visible {}, drawn {}, skipped {}, failed {})",
        args.out.display(),
        report.visible,
        report.drawn,
        report.skipped,
        report.failed
    );
    Ok(())
}
