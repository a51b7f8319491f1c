//! tilezoom - headless driver for the tiled zoom stack
//!
//! Inspects images, prints tile plans and renders viewports without a display.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tilezoom_core::Size;
use tilezoom_view::ScaleMode;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "tilezoom")]
#[command(author, version, about = "Tiled large-image zoom, headless")]
#[command(long_about = "
Drives the tilezoom transform engine, tile planner and region decoder
without a display.

Examples:
  tilezoom info photo.jpg                         # Sizes, orientation, format
  tilezoom info photo.jpg --viewport 1280x720     # Plus scale bounds
  tilezoom plan photo.jpg --viewport 1280x720 --origin
  tilezoom plan photo.jpg --viewport 1280x720 --scale 0.5 --focus 2000,1500 --json
  tilezoom render photo.jpg -o view.png --viewport 1280x720 --rotate 90
  RUST_LOG=tilezoom_view=trace tilezoom render photo.jpg -o view.png
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,

    /// Zoom config file (RON); defaults to the user config dir
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Display image information
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// Print the tile plan for a viewport
    #[command(visible_alias = "p")]
    Plan(PlanArgs),

    /// Decode the visible tiles and write the viewport as an image
    #[command(visible_alias = "r")]
    Render(RenderArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Input image(s)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Viewport for scale bounds (WxH)
    #[arg(long, value_parser = commands::parse_size)]
    viewport: Option<Size>,

    /// Machine-readable output (JSON)
    #[arg(long)]
    json: bool,
}

/// Viewport placement shared by `plan` and `render`.
#[derive(Args, Clone)]
struct ViewArgs {
    /// Input image
    input: PathBuf,

    /// Viewport size (WxH)
    #[arg(long, default_value = "1280x720", value_parser = commands::parse_size)]
    viewport: Size,

    /// Draw scale (view pixels per image pixel)
    #[arg(short, long, conflicts_with = "origin")]
    scale: Option<f32>,

    /// Zoom to 1:1
    #[arg(long)]
    origin: bool,

    /// Clockwise rotation in degrees (multiple of 90)
    #[arg(long, default_value = "0", allow_negative_numbers = true, value_parser = commands::parse_rotation)]
    rotate: i32,

    /// Image point to center on (X,Y)
    #[arg(long, value_parser = commands::parse_point)]
    focus: Option<(f32, f32)>,

    /// Scale mode: center, center-crop, center-inside, fit-start, fit-end, fit-center, fit-xy
    #[arg(short, long)]
    mode: Option<ScaleMode>,

    /// Ignore EXIF orientation
    #[arg(long)]
    raw: bool,
}

#[derive(Args)]
struct PlanArgs {
    #[command(flatten)]
    view: ViewArgs,

    /// Machine-readable output (JSON)
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RenderArgs {
    #[command(flatten)]
    view: ViewArgs,

    /// Output image
    #[arg(short, long)]
    output: PathBuf,

    /// Background color as hex RRGGBB or RRGGBBAA
    #[arg(long, default_value = "000000ff", value_parser = commands::parse_color)]
    background: [u8; 4],

    /// Give up on decodes after this many seconds
    #[arg(long, default_value = "60")]
    timeout: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let config = commands::load_config(cli.config.as_deref(), cli.threads)?;

    match cli.command {
        Commands::Info(args) => commands::info::run(args, config, cli.verbose),
        Commands::Plan(args) => commands::plan::run(args, config, cli.verbose),
        Commands::Render(args) => commands::render::run(args, config, cli.verbose),
    }
}
