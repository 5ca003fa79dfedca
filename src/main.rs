use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use simplelog::{Config, LevelFilter, WriteLogger};

use livepreview::panic_handler::initialize_panic_handler;
use livepreview::preview::{Bitmap, RenderMode, Topology};
use livepreview::replay::{Trace, run_trace};
use livepreview::settings;

/// Replay a recorded preview trace headlessly
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Trace file (YAML)
    trace: PathBuf,

    /// Settings file; defaults to the user config directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the render mode (vector | raster)
    #[arg(long)]
    mode: Option<String>,

    /// Fit to both sides instead of width only
    #[arg(long)]
    paginated: bool,

    /// Write the final raster buffer to a PNG
    #[arg(long)]
    png: Option<PathBuf>,

    /// Write the final vector markup to a file
    #[arg(long)]
    markup: Option<PathBuf>,

    #[arg(long, default_value = "livepreview.log")]
    log_file: PathBuf,

    #[arg(long, default_value = "debug")]
    log_level: LevelFilter,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    WriteLogger::init(
        cli.log_level,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("creating log file {}", cli.log_file.display()))?,
    )?;
    initialize_panic_handler();

    info!("Starting preview replay of {}", cli.trace.display());

    let mut settings = match &cli.config {
        Some(path) => settings::load_or_create(path),
        None => settings::load_settings(),
    };
    if let Some(mode) = &cli.mode {
        settings.render_mode = mode.clone();
    }
    if cli.paginated {
        settings.topology = Topology::Paginated;
    }
    let options = settings.preview_options()?;

    let content = fs::read_to_string(&cli.trace)
        .with_context(|| format!("reading trace {}", cli.trace.display()))?;
    let trace = Trace::from_yaml(&content)?;

    let report = run_trace(&trace, options)?;

    println!("mode:            {}", report.mode);
    println!("patches applied: {}", report.stats.patches_applied);
    println!("redraws:         {}", report.stats.redraws);
    println!("skipped:         {}", report.stats.skipped_redraws);
    println!("failed cycles:   {}", report.stats.failed_cycles);
    if let Some(last) = report.stats.last_redraw {
        println!("last redraw:     {last:?}");
    }
    println!("zoom ratio:      {}", report.zoom_ratio);
    println!("effective scale: {:.4}", report.effective_scale);
    if !report.idle {
        println!("warning: preview did not settle");
    }
    if let Some(err) = &report.last_error {
        println!("last error:      {err}");
    }

    if let Some(path) = &cli.markup {
        match (&report.markup, report.mode) {
            (Some(markup), _) => fs::write(path, markup)
                .with_context(|| format!("writing markup to {}", path.display()))?,
            (None, RenderMode::Raster) => println!("no markup: trace was replayed in raster mode"),
            (None, RenderMode::Vector) => println!("no markup was produced"),
        }
    }

    if let Some(path) = &cli.png {
        match &report.bitmap {
            Some(bitmap) => write_png(bitmap, path)?,
            None => println!("no raster output to write"),
        }
    }

    info!("Replay finished");
    Ok(())
}

fn write_png(bitmap: &Bitmap, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), bitmap.width, bitmap.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&bitmap.pixels)?;
    writer.finish()?;
    println!("wrote {}x{} bitmap to {}", bitmap.width, bitmap.height, path.display());
    Ok(())
}
