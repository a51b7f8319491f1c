//! Zoom viewer configuration.
//!
//! Stored as RON. Every field has a default, so a config file only needs the
//! values it changes:
//!
//! ```ron
//! (
//!     scale_mode: FitStart,
//!     read_mode: true,
//!     tiles: (tile_edge: 512),
//! )
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, ViewError};
use crate::planner::TileSizePolicy;

/// Upper bound on decode worker threads when sized automatically.
pub const AUTO_DECODE_THREADS_MAX: usize = 4;

/// How content is laid out in the viewport before any user zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScaleMode {
    /// Unscaled, centered.
    Center,
    /// Scaled to fill the viewport, centered, overflow cropped.
    CenterCrop,
    /// Unscaled if it fits, otherwise like `FitCenter`.
    CenterInside,
    /// Scaled to fit, anchored at the top-left.
    FitStart,
    /// Scaled to fit, anchored at the bottom-right.
    FitEnd,
    /// Scaled to fit, centered.
    #[default]
    FitCenter,
    /// Stretched to the viewport on both axes.
    FitXY,
}

impl ScaleMode {
    /// All modes.
    pub const fn all() -> &'static [Self] {
        &[
            Self::Center,
            Self::CenterCrop,
            Self::CenterInside,
            Self::FitStart,
            Self::FitEnd,
            Self::FitCenter,
            Self::FitXY,
        ]
    }

    /// Lowercase name, as accepted on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::CenterCrop => "center-crop",
            Self::CenterInside => "center-inside",
            Self::FitStart => "fit-start",
            Self::FitEnd => "fit-end",
            Self::FitCenter => "fit-center",
            Self::FitXY => "fit-xy",
        }
    }
}

impl std::str::FromStr for ScaleMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| format!("unknown scale mode '{s}'"))
    }
}

/// Decides whether content is a "long image" that should open in read mode.
///
/// Content counts as long when its aspect ratio differs from the viewport's
/// by at least a factor. Content and viewport pointing the same way (both
/// portrait or both landscape) use `same_direction`, otherwise
/// `opposite_direction`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LongImageDecider {
    /// Ratio threshold when content and viewport share orientation.
    pub same_direction: f32,
    /// Ratio threshold when they do not.
    pub opposite_direction: f32,
}

impl Default for LongImageDecider {
    fn default() -> Self {
        Self {
            same_direction: 2.5,
            opposite_direction: 5.0,
        }
    }
}

impl LongImageDecider {
    /// Returns `true` if content of `content_w x content_h` is long for
    /// a `view_w x view_h` viewport.
    pub fn is_long_image(&self, content_w: u32, content_h: u32, view_w: u32, view_h: u32) -> bool {
        if content_w == 0 || content_h == 0 || view_w == 0 || view_h == 0 {
            return false;
        }
        let content_ratio = content_w as f32 / content_h as f32;
        let view_ratio = view_w as f32 / view_h as f32;
        let same = (content_ratio >= 1.0) == (view_ratio >= 1.0);
        let threshold = if same {
            self.same_direction
        } else {
            self.opposite_direction
        };
        content_ratio.max(view_ratio) / content_ratio.min(view_ratio) >= threshold
    }
}

/// Viewer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    /// Initial layout.
    pub scale_mode: ScaleMode,
    /// Open long images filling their short axis, scrolled to the start.
    pub read_mode: bool,
    /// Long image thresholds for read mode.
    pub long_image: LongImageDecider,
    /// Max scale as a multiple of the largest natural scale.
    pub max_scale_multiplier: f32,
    /// Fraction of a pinch applied once past a scale limit.
    pub rubber_band_factor: f32,
    /// Animated zoom duration.
    pub zoom_duration_ms: u64,
    /// Animated locate duration.
    pub locate_duration_ms: u64,
    /// Fling velocity decay per second.
    pub fling_damping: f32,
    /// Velocity (px/s) below which a fling stops or never starts.
    pub fling_min_velocity: f32,
    /// Let a host scroll container take over drags at content edges.
    pub allow_parent_intercept_on_edge: bool,
    /// Drag distance that counts as movement for parent hand-off.
    pub drag_slop: f32,
    /// Tile sizing.
    pub tiles: TileSizePolicy,
    /// Decode workers (0 = one per core, at most 4).
    pub decode_threads: usize,
    /// Tile memory cache limit in bytes (0 disables the cache).
    pub tile_cache_bytes: usize,
    /// Freed-buffer pool limit in bytes (0 disables reuse).
    pub buffer_pool_bytes: usize,
    /// Skip tile refreshes while a zoom is in progress.
    pub pause_when_zooming: bool,
    /// Drop all tiles when fully zoomed out.
    pub clean_at_min_scale: bool,
    /// Correct decoded pixels by the EXIF orientation tag.
    pub apply_exif_orientation: bool,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            scale_mode: ScaleMode::FitCenter,
            read_mode: false,
            long_image: LongImageDecider::default(),
            max_scale_multiplier: 2.0,
            rubber_band_factor: 0.4,
            zoom_duration_ms: 200,
            locate_duration_ms: 300,
            fling_damping: 6.0,
            fling_min_velocity: 50.0,
            allow_parent_intercept_on_edge: true,
            drag_slop: 1.0,
            tiles: TileSizePolicy::default(),
            decode_threads: 0,
            tile_cache_bytes: 64 * 1024 * 1024,
            buffer_pool_bytes: 32 * 1024 * 1024,
            pause_when_zooming: true,
            clean_at_min_scale: false,
            apply_exif_orientation: true,
        }
    }
}

impl ZoomConfig {
    /// Platform config path: `<config_dir>/tilezoom/zoom.ron`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tilezoom").join("zoom.ron"))
    }

    /// Parses RON text and validates the result.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let mut config: Self = ron::from_str(text)?;
        config.validate();
        Ok(config)
    }

    /// Loads and validates a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config: Self = ron::from_str(&text).map_err(|e| ViewError::config(path, e))?;
        config.validate();
        debug!(path = %path.display(), "loaded zoom config");
        Ok(config)
    }

    /// Loads the platform config file, or defaults if there is none.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Serializes to pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ViewError::config("<memory>", e))
    }

    /// Replaces out-of-range values with usable ones.
    ///
    /// Returns `true` if anything changed.
    pub fn validate(&mut self) -> bool {
        let defaults = Self::default();
        let mut changed = false;
        let mut fix = |name: &str, bad: bool| {
            if bad {
                warn!(field = name, "invalid zoom config value, using default");
                changed = true;
            }
            bad
        };

        if fix("max_scale_multiplier", !(self.max_scale_multiplier >= 1.0)) {
            self.max_scale_multiplier = defaults.max_scale_multiplier;
        }
        if fix("rubber_band_factor", !(0.0..=1.0).contains(&self.rubber_band_factor)) {
            self.rubber_band_factor = defaults.rubber_band_factor;
        }
        if fix("fling_damping", !(self.fling_damping > 0.0 && self.fling_damping.is_finite())) {
            self.fling_damping = defaults.fling_damping;
        }
        if fix("fling_min_velocity", !(self.fling_min_velocity > 0.0)) {
            self.fling_min_velocity = defaults.fling_min_velocity;
        }
        if fix("drag_slop", !(self.drag_slop >= 0.0)) {
            self.drag_slop = defaults.drag_slop;
        }
        if fix("long_image", !(self.long_image.same_direction > 1.0 && self.long_image.opposite_direction > 1.0)) {
            self.long_image = defaults.long_image;
        }
        if fix("tiles.tile_edge", self.tiles.tile_edge < 16) {
            self.tiles.tile_edge = defaults.tiles.tile_edge;
        }
        if fix("tiles.budget_factor", !(self.tiles.budget_factor > 0.0 && self.tiles.budget_factor.is_finite())) {
            self.tiles.budget_factor = defaults.tiles.budget_factor;
        }
        if fix("tiles.max_bitmap_edge", self.tiles.max_bitmap_edge != 0 && self.tiles.max_bitmap_edge < self.tiles.tile_edge) {
            self.tiles.max_bitmap_edge = self.tiles.tile_edge;
        }
        changed
    }

    /// Worker count after resolving `decode_threads = 0`.
    pub fn decode_thread_count(&self) -> usize {
        if self.decode_threads > 0 {
            return self.decode_threads;
        }
        std::thread::available_parallelism()
            .map_or(1, |n| n.get())
            .min(AUTO_DECODE_THREADS_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ZoomConfig::default();
        assert_eq!(config.scale_mode, ScaleMode::FitCenter);
        assert_eq!(config.tiles.tile_edge, 1024);
        assert_eq!(config.zoom_duration_ms, 200);
        assert!((1..=AUTO_DECODE_THREADS_MAX).contains(&config.decode_thread_count()));
    }

    #[test]
    fn partial_ron() {
        let config = ZoomConfig::from_ron_str("(scale_mode: FitStart, tiles: (tile_edge: 512))").unwrap();
        assert_eq!(config.scale_mode, ScaleMode::FitStart);
        assert_eq!(config.tiles.tile_edge, 512);
        assert_eq!(config.tiles.max_bitmap_edge, 4096);
        assert_eq!(config.fling_damping, 6.0);
    }

    #[test]
    fn validate_fixes_bad_values() {
        let mut config = ZoomConfig {
            max_scale_multiplier: 0.5,
            rubber_band_factor: 3.0,
            ..ZoomConfig::default()
        };
        config.tiles.tile_edge = 0;
        assert!(config.validate());
        assert_eq!(config.max_scale_multiplier, 2.0);
        assert_eq!(config.rubber_band_factor, 0.4);
        assert_eq!(config.tiles.tile_edge, 1024);
        assert!(!config.validate());
    }

    #[test]
    fn ron_round_trip() {
        let config = ZoomConfig {
            read_mode: true,
            ..ZoomConfig::default()
        };
        let text = config.to_ron_string().unwrap();
        assert_eq!(ZoomConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn scale_mode_names() {
        for mode in ScaleMode::all() {
            assert_eq!(mode.name().parse::<ScaleMode>().unwrap(), *mode);
        }
        assert!("matrix".parse::<ScaleMode>().is_err());
    }

    #[test]
    fn long_image_decider() {
        let decider = LongImageDecider::default();
        // Tall strip in a portrait view.
        assert!(decider.is_long_image(1000, 10_000, 1000, 2000));
        // Photo in a portrait view.
        assert!(!decider.is_long_image(4000, 3000, 1000, 2000));
        // Very wide panorama in a portrait view.
        assert!(decider.is_long_image(12_000, 1000, 1000, 2000));
    }
}
