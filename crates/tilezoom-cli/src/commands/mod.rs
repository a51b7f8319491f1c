//! CLI command implementations

pub mod info;
pub mod plan;
pub mod render;

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;
use tilezoom_core::Size;
use tilezoom_decode::{FileImageSource, ImageInfo, ImageSource, read_image_info};
use tilezoom_view::{TransformEngine, ZoomConfig};
use tracing::debug;

use crate::ViewArgs;

/// Loads the zoom config from `path`, or the user config dir.
///
/// A non-zero `threads` overrides the configured decode worker count.
pub fn load_config(path: Option<&Path>, threads: usize) -> Result<ZoomConfig> {
    let mut config = match path {
        Some(path) => ZoomConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => ZoomConfig::load_default().context("Failed to load default config")?,
    };
    if threads > 0 {
        config.decode_threads = threads;
    }
    Ok(config)
}

/// Opens an image file and reads its header.
pub fn open_source(path: &Path) -> Result<(Arc<dyn ImageSource>, ImageInfo)> {
    if !path.is_file() {
        bail!("Not a file: {}", path.display());
    }
    let source: Arc<dyn ImageSource> = Arc::new(FileImageSource::new(path));
    let info = read_image_info(source.as_ref())
        .with_context(|| format!("Failed to read: {}", path.display()))?;
    Ok((source, info))
}

/// Applies the per-invocation overrides from `args` to `config`.
pub fn view_config(mut config: ZoomConfig, args: &ViewArgs) -> ZoomConfig {
    if let Some(mode) = args.mode {
        config.scale_mode = mode;
    }
    if args.raw {
        config.apply_exif_orientation = false;
    }
    config
}

/// Moves `engine` to the placement described by `args`.
///
/// Rotation goes first so scale bounds and focus use the rotated layout.
/// Nothing animates.
pub fn place(engine: &mut TransformEngine, args: &ViewArgs) {
    if args.rotate != 0 {
        engine.rotate_to(args.rotate);
    }
    let scale = if args.origin {
        Some(engine.scale_bounds().origin)
    } else {
        args.scale
    };
    if let Some(scale) = scale {
        engine.zoom_to_center(scale, false);
    }
    if let Some((x, y)) = args.focus {
        engine.location_to(x, y, false);
    }
    debug!(
        scale = engine.scale(),
        rotation = engine.rotation().degrees(),
        visible = %engine.visible_rect(),
        "placed viewport"
    );
}

/// Parses `WxH` (also accepts `x` as `X` or `*`).
pub fn parse_size(s: &str) -> std::result::Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X', '*'])
        .ok_or_else(|| format!("expected WxH, got '{s}'"))?;
    let width: u32 = w.trim().parse().map_err(|_| format!("bad width '{w}'"))?;
    let height: u32 = h.trim().parse().map_err(|_| format!("bad height '{h}'"))?;
    if width == 0 || height == 0 {
        return Err(format!("viewport must not be empty, got '{s}'"));
    }
    Ok(Size::new(width, height))
}

/// Parses `X,Y`.
pub fn parse_point(s: &str) -> std::result::Result<(f32, f32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let x: f32 = x.trim().parse().map_err(|_| format!("bad x '{x}'"))?;
    let y: f32 = y.trim().parse().map_err(|_| format!("bad y '{y}'"))?;
    Ok((x, y))
}

/// Parses a rotation in degrees, which must be a multiple of 90.
pub fn parse_rotation(s: &str) -> std::result::Result<i32, String> {
    let degrees: i32 = s.trim().parse().map_err(|_| format!("bad rotation '{s}'"))?;
    if degrees % 90 != 0 {
        return Err(format!("rotation must be a multiple of 90, got {degrees}"));
    }
    Ok(degrees)
}

/// Parses hex `RRGGBB` or `RRGGBBAA`, with or without a leading `#`.
pub fn parse_color(s: &str) -> std::result::Result<[u8; 4], String> {
    let hex = s.trim_start_matches('#');
    if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
        return Err(format!("expected RRGGBB or RRGGBBAA, got '{s}'"));
    }
    let mut rgba = [0, 0, 0, 255];
    for (i, channel) in rgba.iter_mut().enumerate().take(hex.len() / 2) {
        let pair = &hex[i * 2..i * 2 + 2];
        *channel = u8::from_str_radix(pair, 16).map_err(|_| format!("bad hex '{pair}'"))?;
    }
    Ok(rgba)
}

/// Format a byte count for display
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(parse_size("1280x720"), Ok(Size::new(1280, 720)));
        assert_eq!(parse_size("64X32"), Ok(Size::new(64, 32)));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
        assert!(parse_size("ax720").is_err());
    }

    #[test]
    fn points() {
        assert_eq!(parse_point("10,20.5"), Ok((10.0, 20.5)));
        assert_eq!(parse_point(" 1 , 2 "), Ok((1.0, 2.0)));
        assert!(parse_point("10").is_err());
    }

    #[test]
    fn rotations() {
        assert_eq!(parse_rotation("-90"), Ok(-90));
        assert_eq!(parse_rotation("450"), Ok(450));
        assert!(parse_rotation("45").is_err());
    }

    #[test]
    fn colors() {
        assert_eq!(parse_color("#ff8000"), Ok([255, 128, 0, 255]));
        assert_eq!(parse_color("10203040"), Ok([16, 32, 48, 64]));
        assert!(parse_color("fff").is_err());
        assert!(parse_color("gg0000").is_err());
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
    }
}
