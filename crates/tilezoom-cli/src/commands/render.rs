//! Headless render command.
//!
//! Runs the full viewer (engine, tile manager, decode workers) against a
//! file, waits for the visible tiles and composites them into an image the
//! size of the viewport.

use crate::{RenderArgs, ViewArgs};
use anyhow::{Context, Result};
use glam::{Affine2, Vec2};
use image::{Rgba, RgbaImage};
use std::time::{Duration, Instant};
use tilezoom_core::{PixelBuffer, PixelFormat, RectF};
use tilezoom_decode::RefCountedBuffer;
use tilezoom_view::{TileRenderer, TileSpec, TileState, TiledViewer, ViewportState, ZoomConfig};
use tracing::{debug, info, warn};

/// Runs the render command.
pub fn run(args: RenderArgs, config: ZoomConfig, verbose: bool) -> Result<()> {
    let start = Instant::now();
    let config = super::view_config(config, &args.view);
    let timeout = Duration::from_secs(args.timeout);

    let (canvas, summary) = render_view(&args.view, config, args.background, timeout)?;
    canvas
        .save(&args.output)
        .with_context(|| format!("Failed to save: {}", args.output.display()))?;

    info!(output = %args.output.display(), drawn = summary.drawn, "rendered viewport");
    if verbose {
        println!(
            "{} -> {} ({}x{}, {} tiles at 1/{}, {:.0} ms)",
            args.view.input.display(),
            args.output.display(),
            canvas.width(),
            canvas.height(),
            summary.drawn,
            summary.sample_size,
            start.elapsed().as_secs_f64() * 1000.0
        );
    } else {
        println!("{}", args.output.display());
    }
    Ok(())
}

struct RenderSummary {
    drawn: usize,
    sample_size: u32,
}

/// Opens `view.input`, settles the viewer and composites its tiles.
fn render_view(
    view: &ViewArgs,
    config: ZoomConfig,
    background: [u8; 4],
    timeout: Duration,
) -> Result<(RgbaImage, RenderSummary)> {
    let (source, _) = super::open_source(&view.input)?;
    let mut viewer = TiledViewer::open(source, config)
        .with_context(|| format!("Failed to open: {}", view.input.display()))?;
    viewer.set_viewport_size(view.viewport);
    viewer.with_engine(|engine| super::place(engine, view));

    viewer.settle(timeout).with_context(|| {
        format!(
            "Gave up after {}s with {} decodes in flight",
            timeout.as_secs(),
            viewer.manager().in_flight()
        )
    })?;

    let stats = viewer.manager().stats();
    debug!(?stats, "tiles settled");
    let failed = viewer
        .manager()
        .tiles()
        .iter()
        .filter(|t| t.state() == TileState::Failed)
        .count();
    if failed > 0 {
        warn!(failed, "some tiles failed to decode and are left blank");
    }

    let state = viewer.engine().viewport();
    let mut renderer = CanvasRenderer::new(&state, background);
    let drawn = viewer.render(&mut renderer);
    let sample_size = viewer.manager().plan().map_or(1, |p| p.sample_size);
    viewer.destroy();

    Ok((renderer.canvas, RenderSummary { drawn, sample_size }))
}

/// Composites tiles into an RGBA canvas by nearest sampling.
///
/// Each canvas pixel center is mapped back into image space, so rotated
/// views come out right even though `dest` is only a bounding box.
struct CanvasRenderer {
    canvas: RgbaImage,
    view_to_image: Affine2,
}

impl CanvasRenderer {
    fn new(state: &ViewportState, background: [u8; 4]) -> Self {
        let canvas = RgbaImage::from_pixel(
            state.viewport_size.width,
            state.viewport_size.height,
            Rgba(background),
        );
        let content = state.unrotated_content_size();
        let (cw, ch) = content.to_f32();
        let (iw, ih) = state.image_size.to_f32();
        let content_to_image = if content.is_empty() {
            Affine2::IDENTITY
        } else {
            Affine2::from_scale(Vec2::new(iw / cw, ih / ch))
        };
        Self {
            canvas,
            view_to_image: content_to_image * state.draw_matrix.inverse(),
        }
    }
}

impl TileRenderer for CanvasRenderer {
    fn draw_tile(&mut self, spec: &TileSpec, dest: RectF, buffer: &RefCountedBuffer) {
        let Some(dest) = dest.intersect(&RectF::new(
            0.0,
            0.0,
            self.canvas.width() as f32,
            self.canvas.height() as f32,
        )) else {
            return;
        };
        let x0 = dest.left.floor() as u32;
        let y0 = dest.top.floor() as u32;
        let x1 = (dest.right.ceil() as u32).min(self.canvas.width());
        let y1 = (dest.bottom.ceil() as u32).min(self.canvas.height());
        let sample = spec.sample_size as f32;
        let (ox, oy) = (spec.rect.x as f32, spec.rect.y as f32);

        buffer.with_buffer(|pixels| {
            for y in y0..y1 {
                for x in x0..x1 {
                    let q = self
                        .view_to_image
                        .transform_point2(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
                    let lx = ((q.x - ox) / sample).floor();
                    let ly = ((q.y - oy) / sample).floor();
                    if lx < 0.0 || ly < 0.0 {
                        continue;
                    }
                    let (lx, ly) = (lx as u32, ly as u32);
                    if lx >= pixels.width() || ly >= pixels.height() {
                        continue;
                    }
                    self.canvas.put_pixel(x, y, Rgba(to_rgba(pixels, lx, ly)));
                }
            }
        });
    }
}

fn to_rgba(pixels: &PixelBuffer, x: u32, y: u32) -> [u8; 4] {
    let p = pixels.pixel(x, y);
    match pixels.format() {
        PixelFormat::Rgba8 => [p[0], p[1], p[2], p[3]],
        PixelFormat::Rgb8 => [p[0], p[1], p[2], 255],
        PixelFormat::Gray8 => [p[0], p[0], p[0], 255],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tilezoom_core::Size;

    const WAIT: Duration = Duration::from_secs(10);

    fn gradient(x: u32, y: u32) -> Rgba<u8> {
        Rgba([(x * 4) as u8, (y * 5) as u8, 7, 255])
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbaImage::from_fn(width, height, gradient).save(path).unwrap();
    }

    fn view(input: &Path, viewport: Size) -> ViewArgs {
        ViewArgs {
            input: input.to_path_buf(),
            viewport,
            scale: None,
            origin: false,
            rotate: 0,
            focus: None,
            mode: None,
            raw: false,
        }
    }

    #[test]
    fn exact_fit_copies_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.png");
        write_png(&path, 64, 48);

        let (canvas, summary) = render_view(
            &view(&path, Size::new(64, 48)),
            ZoomConfig::default(),
            [0, 0, 0, 0],
            WAIT,
        )
        .unwrap();

        assert_eq!(summary.drawn, 1);
        assert_eq!(summary.sample_size, 1);
        assert_eq!(canvas.dimensions(), (64, 48));
        assert_eq!(*canvas.get_pixel(10, 20), gradient(10, 20));
        assert_eq!(*canvas.get_pixel(63, 47), gradient(63, 47));
    }

    #[test]
    fn half_turn_flips_both_axes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.png");
        write_png(&path, 64, 48);

        let mut args = view(&path, Size::new(64, 48));
        args.rotate = 180;
        let (canvas, _) = render_view(&args, ZoomConfig::default(), [0, 0, 0, 0], WAIT).unwrap();

        assert_eq!(*canvas.get_pixel(0, 0), gradient(63, 47));
        assert_eq!(*canvas.get_pixel(10, 20), gradient(53, 27));
    }

    #[test]
    fn letterbox_keeps_background() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.png");
        write_png(&path, 64, 32);

        let (canvas, _) = render_view(
            &view(&path, Size::new(64, 64)),
            ZoomConfig::default(),
            [1, 2, 3, 255],
            WAIT,
        )
        .unwrap();

        // 64x32 centered vertically in 64x64
        assert_eq!(*canvas.get_pixel(5, 5), Rgba([1, 2, 3, 255]));
        assert_eq!(*canvas.get_pixel(5, 16), gradient(5, 0));
        assert_eq!(*canvas.get_pixel(5, 60), Rgba([1, 2, 3, 255]));
    }
}
