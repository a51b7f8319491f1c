//! Tile plan command.
//!
//! Places the transform engine exactly as `render` would and prints the
//! tiles the manager would request, without decoding anything.

use crate::PlanArgs;
use anyhow::Result;
use serde::Serialize;
use tilezoom_core::{Rect, RectF, Size};
use tilezoom_view::{TileSpec, TransformEngine, ViewportState, ZoomConfig, plan};

#[derive(Serialize)]
struct PlanReport {
    image: Size,
    viewport: Size,
    rotation: i32,
    scale: f32,
    visible: Rect,
    sample_size: u32,
    decoded_bytes: u64,
    tiles: Vec<TileReport>,
}

#[derive(Serialize)]
struct TileReport {
    #[serde(flatten)]
    spec: TileSpec,
    decoded: Size,
    view: RectF,
}

/// Runs the plan command.
pub fn run(args: PlanArgs, config: ZoomConfig, verbose: bool) -> Result<()> {
    let config = super::view_config(config, &args.view);
    let (_, info) = super::open_source(&args.view.input)?;
    let content = if config.apply_exif_orientation {
        info.display_size()
    } else {
        info.raw_size
    };

    let mut engine = TransformEngine::new(config.clone());
    engine.set_viewport_size(args.view.viewport);
    engine.set_content_size(content);
    super::place(&mut engine, &args.view);

    let state = engine.viewport();
    let report = build_report(&state, &config);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", args.view.input.display());
    println!("  Image:     {}", report.image);
    println!("  Viewport:  {}", report.viewport);
    println!("  Rotation:  {}", report.rotation);
    println!("  Scale:     {:.4}", report.scale);
    println!("  Visible:   {}", report.visible);
    println!("  Sample:    1/{}", report.sample_size);
    println!(
        "  Tiles:     {} ({} decoded)",
        report.tiles.len(),
        super::format_bytes(report.decoded_bytes)
    );
    for tile in &report.tiles {
        if verbose {
            println!(
                "    {}  ->  {}x{}  at {}",
                tile.spec.rect, tile.decoded.width, tile.decoded.height, tile.view
            );
        } else {
            println!("    {}", tile.spec.rect);
        }
    }
    Ok(())
}

fn build_report(state: &ViewportState, config: &ZoomConfig) -> PlanReport {
    let plan = plan(state, &config.tiles);
    let tiles: Vec<TileReport> = plan
        .tiles
        .iter()
        .map(|spec| TileReport {
            spec: *spec,
            decoded: spec.sampled_size(),
            view: state.image_rect_to_view(spec.rect),
        })
        .collect();
    // Decoders produce RGBA
    let decoded_bytes = tiles
        .iter()
        .map(|t| u64::from(t.decoded.width) * u64::from(t.decoded.height) * 4)
        .sum();

    PlanReport {
        image: state.image_size,
        viewport: state.viewport_size,
        rotation: state.rotation.degrees(),
        scale: state.scale,
        visible: plan.visible,
        sample_size: plan.sample_size,
        decoded_bytes,
        tiles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_plan_is_single_downsampled_tile() {
        let config = ZoomConfig::default();
        let mut engine = TransformEngine::new(config.clone());
        engine.set_viewport_size(Size::new(1000, 800));
        engine.set_content_size(Size::new(4000, 3000));

        let report = build_report(&engine.viewport(), &config);
        assert_eq!(report.visible, Rect::new(0, 0, 4000, 3000));
        assert_eq!(report.sample_size, 4);
        assert_eq!(report.tiles.len(), 1);
        assert_eq!(report.tiles[0].decoded, Size::new(1000, 750));
        assert_eq!(report.decoded_bytes, 1000 * 750 * 4);
    }

    #[test]
    fn report_serializes_flat_tiles() {
        let config = ZoomConfig::default();
        let mut engine = TransformEngine::new(config.clone());
        engine.set_viewport_size(Size::new(100, 100));
        engine.set_content_size(Size::new(100, 100));

        let report = build_report(&engine.viewport(), &config);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["sample_size"], 1);
        assert_eq!(value["tiles"][0]["sample_size"], 1);
        assert_eq!(value["tiles"][0]["rect"]["width"], 100);
    }
}
