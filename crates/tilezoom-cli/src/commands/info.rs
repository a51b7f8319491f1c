//! Image info command.
//!
//! Shows header facts and, given a viewport, the scale bounds the engine
//! would use for it.

use crate::InfoArgs;
use anyhow::{Context, Result};
use serde_json::json;
use std::fs;
use std::path::Path;
use tilezoom_core::{Rotation, Size};
use tilezoom_decode::ImageInfo;
use tilezoom_view::{ScaleBounds, ZoomConfig};

/// Runs the info command for every input.
pub fn run(args: InfoArgs, config: ZoomConfig, verbose: bool) -> Result<()> {
    let mut reports = Vec::with_capacity(args.input.len());
    for path in &args.input {
        let file_size = fs::metadata(path)
            .with_context(|| format!("Failed to stat: {}", path.display()))?
            .len();
        let (_, info) = super::open_source(path)?;
        let content = content_size(&info, &config);
        let bounds = args
            .viewport
            .map(|viewport| ScaleBounds::compute(content, content, viewport, Rotation::R0, &config));

        if args.json {
            reports.push(json_report(path, file_size, &info, content, args.viewport, bounds, &config));
        } else {
            print_text(path, file_size, &info, content, args.viewport, bounds, &config, verbose);
        }
    }

    if args.json {
        let out = if reports.len() == 1 {
            reports.remove(0)
        } else {
            serde_json::Value::Array(reports)
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    Ok(())
}

/// Size the viewer lays out: display size unless orientation is ignored.
fn content_size(info: &ImageInfo, config: &ZoomConfig) -> Size {
    if config.apply_exif_orientation {
        info.display_size()
    } else {
        info.raw_size
    }
}

#[allow(clippy::too_many_arguments)]
fn print_text(
    path: &Path,
    file_size: u64,
    info: &ImageInfo,
    content: Size,
    viewport: Option<Size>,
    bounds: Option<ScaleBounds>,
    config: &ZoomConfig,
    verbose: bool,
) {
    println!("{}", path.display());
    println!("  File size:   {}", super::format_bytes(file_size));
    println!("  Format:      {}", info.mime_type());
    println!("  Stored:      {}", info.raw_size);
    println!(
        "  Orientation: {:?} (exif {})",
        info.orientation,
        info.orientation.exif_value()
    );
    println!("  Display:     {}", content);
    println!(
        "  Megapixels:  {:.1}",
        content.width as f64 * content.height as f64 / 1.0e6
    );

    let (Some(viewport), Some(bounds)) = (viewport, bounds) else {
        return;
    };
    println!("  Viewport:    {}", viewport);
    println!("  Scale min:   {:.4}", bounds.min);
    println!("  Scale max:   {:.4}", bounds.max);
    println!("  Scale init:  {:.4}", bounds.init);
    println!(
        "  Steps:       {:.4} / {:.4} / {:.4}",
        bounds.steps[0], bounds.steps[1], bounds.steps[2]
    );
    let long = config
        .long_image
        .is_long_image(content.width, content.height, viewport.width, viewport.height);
    println!("  Long image:  {}", if long { "yes" } else { "no" });

    if verbose {
        println!("  Full:        {:.4}", bounds.full);
        println!("  Fill:        {:.4}", bounds.fill);
        println!("  Origin:      {:.4}", bounds.origin);
        println!("  Scale mode:  {}", config.scale_mode.name());
    }
}

fn json_report(
    path: &Path,
    file_size: u64,
    info: &ImageInfo,
    content: Size,
    viewport: Option<Size>,
    bounds: Option<ScaleBounds>,
    config: &ZoomConfig,
) -> serde_json::Value {
    let mut report = json!({
        "path": path.display().to_string(),
        "file_size": file_size,
        "mime_type": info.mime_type(),
        "raw_size": info.raw_size,
        "orientation": info.orientation.exif_value(),
        "display_size": content,
    });
    if let (Some(viewport), Some(bounds)) = (viewport, bounds) {
        report["viewport"] = json!(viewport);
        report["scale_bounds"] = json!(bounds);
        report["long_image"] = json!(config.long_image.is_long_image(
            content.width,
            content.height,
            viewport.width,
            viewport.height
        ));
    }
    report
}
