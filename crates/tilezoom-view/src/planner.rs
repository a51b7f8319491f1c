//! Tile grid planning.
//!
//! A pure mapping from the current viewport to the set of tiles that must
//! be decoded:
//!
//! 1. Inverse-map the viewport through the draw matrix to get the visible
//!    rectangle in content space, then scale it into image space.
//! 2. Pick the smallest power-of-two sample size whose sampled visible
//!    area fits the pixel budget, then keep doubling until both sampled
//!    sides fit under the bitmap edge ceiling.
//! 3. Cut the visible rectangle along a grid anchored at the image origin
//!    with cells of `tile_edge * sample_size` image pixels.
//!
//! ```text
//!   0        cell      2*cell     3*cell
//!   +---------+---------+---------+
//!   |    +====|=========|===+     |
//!   |    # t0 |   t1    |t2 #     |   visible rect (#) cut into
//!   +----#----+---------+---#-----+   tiles clipped at its edges,
//!   |    # t3 |   t4    |t5 #     |   never padded
//!   |    +====|=========|===+     |
//!   +---------+---------+---------+
//! ```
//!
//! Tiles are expressed in display space (orientation-corrected, unrotated).

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};
use tilezoom_core::{Rect, RectF, Size};

use crate::engine::ViewportState;
use crate::matrix::map_rect;

/// Default tile edge in sampled pixels.
pub const DEFAULT_TILE_EDGE: u32 = 1024;

/// Default sampled-bitmap edge ceiling.
pub const DEFAULT_MAX_BITMAP_EDGE: u32 = 4096;

/// How big tiles are and how many pixels a view may hold at once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileSizePolicy {
    /// Tile edge length in sampled pixels.
    pub tile_edge: u32,
    /// Pixel budget as a multiple of the viewport area.
    pub budget_factor: f32,
    /// Largest sampled width or height the visible rect may decode to.
    pub max_bitmap_edge: u32,
}

impl Default for TileSizePolicy {
    fn default() -> Self {
        Self {
            tile_edge: DEFAULT_TILE_EDGE,
            budget_factor: 1.0,
            max_bitmap_edge: DEFAULT_MAX_BITMAP_EDGE,
        }
    }
}

impl TileSizePolicy {
    /// Sampled pixel budget for a viewport (at least one pixel).
    pub fn target_budget(&self, viewport: Size) -> u64 {
        let budget = viewport.area() as f64 * f64::from(self.budget_factor);
        if budget.is_finite() { budget.max(1.0) as u64 } else { 1 }
    }
}

/// One tile to decode: an image-space rectangle at a sample size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileSpec {
    /// Display-space rectangle.
    pub rect: Rect,
    /// Power-of-two downsample factor.
    pub sample_size: u32,
}

impl TileSpec {
    /// Size of the decoded bitmap.
    pub fn sampled_size(&self) -> Size {
        sampled_size(self.rect.size(), self.sample_size)
    }
}

impl std::fmt::Display for TileSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{} {}x{} @{}",
            self.rect.x, self.rect.y, self.rect.width, self.rect.height, self.sample_size
        )
    }
}

/// Result of planning.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TilePlan {
    /// Visible rectangle in display space.
    pub visible: Rect,
    /// Sample size shared by every tile.
    pub sample_size: u32,
    /// Tiles in row-major order.
    pub tiles: Vec<TileSpec>,
}

impl TilePlan {
    /// Returns `true` if nothing needs decoding.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Union of all tile rectangles.
    pub fn coverage(&self) -> Rect {
        self.tiles
            .iter()
            .fold(Rect::default(), |acc, t| acc.union(&t.rect))
    }
}

/// Size after downsampling, rounding up.
#[inline]
pub fn sampled_size(size: Size, sample_size: u32) -> Size {
    size.sampled(sample_size)
}

/// Smallest power of two that fits `visible` in `budget` sampled pixels,
/// doubled further until both sampled sides are at most `max_edge`.
///
/// A `max_edge` of zero disables the ceiling.
pub fn sample_size_for(visible: Size, budget: u64, max_edge: u32) -> u32 {
    let budget = budget.max(1);
    let mut sample = 1u32;
    while sampled_size(visible, sample).area() > budget && sample < 1 << 30 {
        sample <<= 1;
    }
    if max_edge > 0 {
        loop {
            let s = sampled_size(visible, sample);
            if (s.width <= max_edge && s.height <= max_edge) || sample >= 1 << 30 {
                break;
            }
            sample <<= 1;
        }
    }
    sample
}

/// Visible part of the content in unrotated content coordinates.
///
/// `draw_matrix` maps unrotated content space to view space. Edges are
/// rounded to the nearest pixel and clipped to the content.
pub fn visible_content_rect(draw_matrix: &Affine2, content: Size, viewport: Size) -> Rect {
    if content.is_empty() || viewport.is_empty() {
        return Rect::default();
    }
    let det = draw_matrix.matrix2.determinant();
    if !det.is_finite() || det.abs() <= f32::EPSILON {
        return Rect::default();
    }
    let inverse = draw_matrix.inverse();
    let seen = map_rect(&inverse, RectF::from_size(viewport));
    let Some(seen) = seen.intersect(&RectF::from_size(content)) else {
        return Rect::default();
    };
    let round = |v: f32, max: u32| (v.round().max(0.0) as u32).min(max);
    Rect::from_corners(
        round(seen.left, content.width),
        round(seen.top, content.height),
        round(seen.right, content.width),
        round(seen.bottom, content.height),
    )
}

/// Scales a content-space rectangle into image space, rounding outward.
pub fn content_rect_to_image(rect: Rect, content: Size, image: Size) -> Rect {
    if rect.is_empty() || content.is_empty() || image.is_empty() {
        return Rect::default();
    }
    if content == image {
        return rect;
    }
    let sx = f64::from(image.width) / f64::from(content.width);
    let sy = f64::from(image.height) / f64::from(content.height);
    let left = (f64::from(rect.x) * sx).floor() as u32;
    let top = (f64::from(rect.y) * sy).floor() as u32;
    let right = ((f64::from(rect.right()) * sx).ceil() as u32).min(image.width);
    let bottom = ((f64::from(rect.bottom()) * sy).ceil() as u32).min(image.height);
    Rect::from_corners(left, top, right, bottom)
}

/// Maps an image-space rectangle to view space through `draw_matrix`.
pub fn image_rect_to_view(rect: Rect, content: Size, image: Size, draw_matrix: &Affine2) -> RectF {
    if image.is_empty() {
        return RectF::default();
    }
    let to_content = Affine2::from_scale(Vec2::new(
        content.width as f32 / image.width as f32,
        content.height as f32 / image.height as f32,
    ));
    map_rect(&(*draw_matrix * to_content), RectF::from_rect(rect))
}

/// Plans tiles for an image-space visible rectangle.
pub fn plan_visible(visible: Rect, viewport: Size, policy: &TileSizePolicy) -> TilePlan {
    if visible.is_empty() || viewport.is_empty() {
        return TilePlan {
            visible: Rect::default(),
            sample_size: 1,
            tiles: Vec::new(),
        };
    }

    let sample_size = sample_size_for(
        visible.size(),
        policy.target_budget(viewport),
        policy.max_bitmap_edge,
    );
    let cell = policy.tile_edge.max(1).saturating_mul(sample_size);

    let mut tiles = Vec::new();
    let mut y = visible.y / cell * cell;
    while y < visible.bottom() {
        let top = y.max(visible.y);
        let bottom = y.saturating_add(cell).min(visible.bottom());
        let mut x = visible.x / cell * cell;
        while x < visible.right() {
            let left = x.max(visible.x);
            let right = x.saturating_add(cell).min(visible.right());
            tiles.push(TileSpec {
                rect: Rect::from_corners(left, top, right, bottom),
                sample_size,
            });
            x = x.saturating_add(cell);
        }
        y = y.saturating_add(cell);
    }

    TilePlan {
        visible,
        sample_size,
        tiles,
    }
}

/// Plans tiles for the current viewport.
pub fn plan(state: &ViewportState, policy: &TileSizePolicy) -> TilePlan {
    plan_visible(state.image_visible_rect(), state.viewport_size, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sample_size_fits_budget() {
        let visible = Size::new(4000, 3000);
        assert_eq!(sample_size_for(visible, 800_000, 4096), 4);
        assert_eq!(sample_size_for(Size::new(1000, 800), 800_000, 4096), 1);
        assert_eq!(sample_size_for(Size::new(1001, 800), 800_000, 4096), 2);
    }

    #[test]
    fn sample_size_respects_edge_ceiling() {
        // A thin strip fits the budget but not the edge ceiling.
        let visible = Size::new(20_000, 10);
        assert_eq!(sample_size_for(visible, 1_000_000, 4096), 8);
        assert_eq!(sample_size_for(visible, 1_000_000, 0), 1);
    }

    #[test]
    fn fit_plans_single_tile() {
        let plan = plan_visible(
            Rect::new(0, 0, 4000, 3000),
            Size::new(1000, 800),
            &TileSizePolicy::default(),
        );
        assert_eq!(plan.sample_size, 4);
        assert_eq!(plan.tiles.len(), 1);
        assert_eq!(plan.tiles[0].rect, Rect::new(0, 0, 4000, 3000));
        assert_eq!(plan.tiles[0].sampled_size(), Size::new(1000, 750));
    }

    #[test]
    fn grid_is_anchored_at_origin() {
        let plan = plan_visible(
            Rect::new(1500, 1100, 1000, 800),
            Size::new(1000, 800),
            &TileSizePolicy::default(),
        );
        assert_eq!(plan.sample_size, 1);
        let rects: Vec<_> = plan.tiles.iter().map(|t| t.rect).collect();
        assert_eq!(
            rects,
            vec![Rect::new(1500, 1100, 548, 800), Rect::new(2048, 1100, 452, 800)]
        );
        assert_eq!(plan.coverage(), plan.visible);
    }

    #[test]
    fn empty_inputs_plan_nothing() {
        let policy = TileSizePolicy::default();
        assert!(plan_visible(Rect::default(), Size::new(10, 10), &policy).is_empty());
        assert!(plan_visible(Rect::new(0, 0, 5, 5), Size::default(), &policy).is_empty());
    }

    #[test]
    fn visible_rect_from_identity() {
        let r = visible_content_rect(&Affine2::IDENTITY, Size::new(500, 300), Size::new(200, 400));
        assert_eq!(r, Rect::new(0, 0, 200, 300));
    }

    #[test]
    fn visible_rect_zoomed_in() {
        // 4x zoom, content shifted left/up by (1500, 1100) view pixels.
        let m = Affine2::from_scale_angle_translation(Vec2::splat(4.0), 0.0, Vec2::new(-1500.0, -1100.0));
        let r = visible_content_rect(&m, Size::new(1000, 750), Size::new(1000, 800));
        assert_eq!(r, Rect::new(375, 275, 250, 200));
    }

    #[test]
    fn content_to_image_scales() {
        let r = content_rect_to_image(Rect::new(10, 10, 20, 20), Size::new(100, 100), Size::new(400, 300));
        assert_eq!(r, Rect::new(40, 30, 80, 60));
    }

    fn visible() -> impl Strategy<Value = (Rect, Size)> {
        (0u32..20_000, 0u32..20_000, 1u32..20_000, 1u32..20_000, 1u32..3000, 1u32..3000)
            .prop_map(|(x, y, w, h, vw, vh)| (Rect::new(x, y, w, h), Size::new(vw, vh)))
    }

    proptest! {
        #[test]
        fn tiles_partition_visible_rect(
            (rect, viewport) in visible(),
            tile_edge in 16u32..2048,
            budget_factor in 0.25f32..4.0,
        ) {
            let policy = TileSizePolicy { tile_edge, budget_factor, max_bitmap_edge: 4096 };
            let plan = plan_visible(rect, viewport, &policy);
            prop_assert!(plan.sample_size.is_power_of_two());

            let area: u64 = plan.tiles.iter().map(|t| t.rect.area()).sum();
            prop_assert_eq!(area, rect.area());
            prop_assert_eq!(plan.coverage(), rect);
            for (i, a) in plan.tiles.iter().enumerate() {
                prop_assert!(rect.contains_rect(&a.rect));
                prop_assert!(!a.rect.is_empty());
                prop_assert!(a.sampled_size().width <= tile_edge);
                prop_assert!(a.sampled_size().height <= tile_edge);
                for b in &plan.tiles[i + 1..] {
                    prop_assert!(!a.rect.overlaps(&b.rect));
                }
            }
        }
    }
}
