//! Natural scales and zoom limits.
//!
//! All scales are overall draw scales (view pixels per content pixel),
//! computed in rotated space:
//!
//! | scale    | meaning                                          |
//! |----------|--------------------------------------------------|
//! | `full`   | whole content visible: `min(vw/cw, vh/ch)`       |
//! | `fill`   | content covers the viewport: `max(vw/cw, vh/ch)` |
//! | `origin` | one image pixel per view pixel: `max(iw/cw, ih/ch)` |
//! | `init`   | what the scale mode (or read mode) opens at      |
//!
//! `c` is the content drawn under the tiles and `i` the full-resolution
//! image; they differ when a smaller preview stands in for the image.

use serde::{Deserialize, Serialize};
use tilezoom_core::{Rotation, Size};

use crate::config::{ScaleMode, ZoomConfig};

/// Scale limits and reference scales for one layout.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScaleBounds {
    /// Smallest reachable scale.
    pub min: f32,
    /// Largest reachable scale.
    pub max: f32,
    /// Scale that shows the whole content.
    pub full: f32,
    /// Scale that covers the viewport.
    pub fill: f32,
    /// Scale at one image pixel per view pixel.
    pub origin: f32,
    /// Scale the layout opens at.
    pub init: f32,
    /// Double-tap stops, ascending.
    pub steps: [f32; 3],
}

impl ScaleBounds {
    /// Computes scales for `content` (unrotated) showing `image` (unrotated)
    /// in `viewport` under `rotation`.
    ///
    /// Returns the default (all zero) bounds if any size is empty.
    pub fn compute(
        content: Size,
        image: Size,
        viewport: Size,
        rotation: Rotation,
        config: &ZoomConfig,
    ) -> Self {
        if content.is_empty() || image.is_empty() || viewport.is_empty() {
            return Self::default();
        }
        let content = rotation.rotate_size(content);
        let image = rotation.rotate_size(image);
        let (cw, ch) = content.to_f32();
        let (iw, ih) = image.to_f32();
        let (vw, vh) = viewport.to_f32();

        let width_scale = vw / cw;
        let height_scale = vh / ch;
        let full = width_scale.min(height_scale);
        let fill = width_scale.max(height_scale);
        let origin = (iw / cw).max(ih / ch);

        let read_mode = config.read_mode
            && config
                .long_image
                .is_long_image(content.width, content.height, viewport.width, viewport.height);
        let fits = content.width <= viewport.width && content.height <= viewport.height;
        let init = if read_mode {
            fill
        } else {
            match config.scale_mode {
                ScaleMode::Center => 1.0,
                ScaleMode::CenterInside if fits => 1.0,
                ScaleMode::CenterCrop => fill,
                _ => full,
            }
        };

        let min = full.min(init);
        let max = origin.max(fill).max(init) * config.max_scale_multiplier;
        let middle = origin.max(fill).clamp(min, max);
        Self {
            min,
            max,
            full,
            fill,
            origin,
            init,
            steps: [min, middle, max],
        }
    }

    /// Returns `true` if no layout is possible yet.
    pub fn is_empty(&self) -> bool {
        self.max <= 0.0
    }

    /// Clamps `scale` into `[min, max]`.
    pub fn clamp(&self, scale: f32) -> f32 {
        if self.is_empty() {
            scale
        } else {
            scale.clamp(self.min, self.max)
        }
    }

    /// Next double-tap stop after `current`, wrapping to the first.
    pub fn next_step(&self, current: f32) -> f32 {
        self.steps
            .iter()
            .copied()
            .find(|s| *s > round2(current) + 0.005)
            .unwrap_or(self.steps[0])
    }
}

/// Rounds to two decimals, the precision scale comparisons use.
#[inline]
pub fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bounds(content: Size, viewport: Size, rotation: Rotation, config: &ZoomConfig) -> ScaleBounds {
        ScaleBounds::compute(content, content, viewport, rotation, config)
    }

    #[test]
    fn fit_center_scales() {
        let b = bounds(Size::new(4000, 3000), Size::new(1000, 800), Rotation::R0, &ZoomConfig::default());
        assert_relative_eq!(b.full, 0.25);
        assert_relative_eq!(b.fill, 800.0 / 3000.0);
        assert_relative_eq!(b.origin, 1.0);
        assert_relative_eq!(b.init, 0.25);
        assert_relative_eq!(b.min, 0.25);
        assert_relative_eq!(b.max, 2.0);
        assert_eq!(b.steps, [0.25, 1.0, 2.0]);
    }

    #[test]
    fn rotation_swaps_content() {
        let b = bounds(Size::new(4000, 3000), Size::new(1000, 800), Rotation::R90, &ZoomConfig::default());
        // Rotated content is 3000x4000.
        assert_relative_eq!(b.full, 0.2);
        assert_relative_eq!(b.fill, 1000.0 / 3000.0);
    }

    #[test]
    fn preview_content_origin() {
        let b = ScaleBounds::compute(
            Size::new(1000, 750),
            Size::new(4000, 3000),
            Size::new(1000, 800),
            Rotation::R0,
            &ZoomConfig::default(),
        );
        assert_relative_eq!(b.full, 1.0);
        assert_relative_eq!(b.origin, 4.0);
        assert_relative_eq!(b.max, 8.0);
    }

    #[test]
    fn center_modes() {
        let small = Size::new(200, 100);
        let view = Size::new(1000, 800);
        let inside = ZoomConfig {
            scale_mode: ScaleMode::CenterInside,
            ..ZoomConfig::default()
        };
        assert_relative_eq!(bounds(small, view, Rotation::R0, &inside).init, 1.0);
        let crop = ZoomConfig {
            scale_mode: ScaleMode::CenterCrop,
            ..ZoomConfig::default()
        };
        assert_relative_eq!(bounds(small, view, Rotation::R0, &crop).init, 8.0);
    }

    #[test]
    fn read_mode_fills_long_images() {
        let config = ZoomConfig {
            read_mode: true,
            ..ZoomConfig::default()
        };
        let b = bounds(Size::new(1000, 20_000), Size::new(500, 1000), Rotation::R0, &config);
        assert_relative_eq!(b.init, 0.5);
        assert_relative_eq!(b.min, b.full);
    }

    #[test]
    fn next_step_cycles() {
        let b = bounds(Size::new(4000, 3000), Size::new(1000, 800), Rotation::R0, &ZoomConfig::default());
        assert_relative_eq!(b.next_step(0.25), 1.0);
        assert_relative_eq!(b.next_step(1.0), 2.0);
        assert_relative_eq!(b.next_step(2.0), 0.25);
        assert_relative_eq!(b.clamp(10.0), 2.0);
    }

    #[test]
    fn empty_sizes() {
        let b = bounds(Size::default(), Size::new(10, 10), Rotation::R0, &ZoomConfig::default());
        assert!(b.is_empty());
        assert_eq!(b.clamp(3.0), 3.0);
    }
}
