//! Mapping between raw, display and rotated image space.
//!
//! [`Orientation`] is the EXIF orientation of the stored pixels. It maps
//! rectangles from display space (what the viewer plans tiles in) back to
//! raw space (what the region decoder reads), and corrects decoded raw
//! pixels so they come out display-normal.
//!
//! [`Rotation`] is the user-applied quarter-turn rotation. It maps between
//! unrotated content space and the rotated space the transform engine lays
//! out on screen. A clockwise quarter turn is the same affine map as EXIF
//! `Rotate90`, so rotation reuses the orientation math.
//!
//! All rectangle mapping works on pixel *edges*: a rectangle `[x, right)`
//! maps to another half-open rectangle, so mapped tiles still partition.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pixel::{BufferSpec, PixelBuffer};
use crate::rect::{Rect, Size};

/// EXIF orientation tag values.
///
/// Describes how the stored pixels must be transformed for display.
/// Values match the EXIF Orientation tag (TIFF tag 274).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Orientation {
    /// No rotation or flip needed.
    #[default]
    Normal = 1,
    /// Flip horizontally (mirror left-right).
    FlipHorizontal = 2,
    /// Rotate 180 degrees.
    Rotate180 = 3,
    /// Flip vertically (mirror top-bottom).
    FlipVertical = 4,
    /// Transpose (mirror across the main diagonal).
    Transpose = 5,
    /// Rotate 90 degrees clockwise.
    Rotate90 = 6,
    /// Transverse (mirror across the anti-diagonal).
    Transverse = 7,
    /// Rotate 270 degrees clockwise (= 90 CCW).
    Rotate270 = 8,
}

impl Orientation {
    /// Create from EXIF orientation value (1-8).
    ///
    /// Returns [`Normal`](Orientation::Normal) for out-of-range values.
    pub fn from_exif(value: u16) -> Self {
        Self::try_from_exif(value).unwrap_or_default()
    }

    /// Strict variant of [`from_exif`](Self::from_exif).
    pub fn try_from_exif(value: u16) -> Result<Self> {
        Ok(match value {
            1 => Self::Normal,
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90,
            7 => Self::Transverse,
            8 => Self::Rotate270,
            _ => return Err(Error::InvalidOrientation(value)),
        })
    }

    /// EXIF tag value (1-8).
    pub fn exif_value(self) -> u16 {
        self as u16
    }

    /// Whether this orientation swaps width and height (values 5-8).
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90 | Self::Transverse | Self::Rotate270
        )
    }

    /// Whether any transformation is needed.
    pub fn is_identity(self) -> bool {
        matches!(self, Self::Normal)
    }

    /// Display size for stored pixels of `raw` size.
    pub fn display_size(self, raw: Size) -> Size {
        if self.swaps_dimensions() { raw.swapped() } else { raw }
    }

    /// Stored size for a display size. Every orientation is its own
    /// dimension inverse, so this equals [`display_size`](Self::display_size).
    pub fn raw_size(self, display: Size) -> Size {
        self.display_size(display)
    }

    /// Maps an edge point from raw space to display space.
    ///
    /// `raw` is the full stored size.
    pub fn raw_point_to_display(self, x: f64, y: f64, raw: Size) -> (f64, f64) {
        let w = f64::from(raw.width);
        let h = f64::from(raw.height);
        match self {
            Self::Normal => (x, y),
            Self::FlipHorizontal => (w - x, y),
            Self::Rotate180 => (w - x, h - y),
            Self::FlipVertical => (x, h - y),
            Self::Transpose => (y, x),
            Self::Rotate90 => (h - y, x),
            Self::Transverse => (h - y, w - x),
            Self::Rotate270 => (y, w - x),
        }
    }

    /// Maps an edge point from display space back to raw space.
    ///
    /// `raw` is the full stored size.
    pub fn display_point_to_raw(self, u: f64, v: f64, raw: Size) -> (f64, f64) {
        let w = f64::from(raw.width);
        let h = f64::from(raw.height);
        match self {
            Self::Normal => (u, v),
            Self::FlipHorizontal => (w - u, v),
            Self::Rotate180 => (w - u, h - v),
            Self::FlipVertical => (u, h - v),
            Self::Transpose => (v, u),
            Self::Rotate90 => (v, h - u),
            Self::Transverse => (w - v, h - u),
            Self::Rotate270 => (w - v, u),
        }
    }

    /// Maps a display-space rectangle to the raw rectangle holding its pixels.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tilezoom_core::{Orientation, Rect, Size};
    ///
    /// // Raw 400x300 stored sideways: display is 300x400.
    /// let raw = Size::new(400, 300);
    /// let display_top = Rect::new(0, 0, 300, 100);
    /// // The top display band lives in the left raw column band.
    /// assert_eq!(
    ///     Orientation::Rotate90.display_rect_to_raw(display_top, raw),
    ///     Rect::new(0, 0, 100, 300)
    /// );
    /// ```
    pub fn display_rect_to_raw(self, rect: Rect, raw: Size) -> Rect {
        map_rect(rect, |x, y| self.display_point_to_raw(x, y, raw))
    }

    /// Maps a raw-space rectangle to display space.
    pub fn raw_rect_to_display(self, rect: Rect, raw: Size) -> Rect {
        map_rect(rect, |x, y| self.raw_point_to_display(x, y, raw))
    }

    /// Display-space pixel `(u, v)` to the raw pixel index it samples,
    /// inside a buffer of `raw` size.
    #[inline]
    fn source_pixel(self, u: u32, v: u32, raw: Size) -> (u32, u32) {
        let w1 = raw.width - 1;
        let h1 = raw.height - 1;
        match self {
            Self::Normal => (u, v),
            Self::FlipHorizontal => (w1 - u, v),
            Self::Rotate180 => (w1 - u, h1 - v),
            Self::FlipVertical => (u, h1 - v),
            Self::Transpose => (v, u),
            Self::Rotate90 => (v, h1 - u),
            Self::Transverse => (w1 - v, h1 - u),
            Self::Rotate270 => (w1 - v, u),
        }
    }

    /// Writes the display-normal version of `raw` into `dst`.
    ///
    /// `dst` must have the display size of `raw` and the same format.
    pub fn apply_into(self, raw: &PixelBuffer, dst: &mut PixelBuffer) -> Result<()> {
        let display = self.display_size(raw.size());
        if dst.size() != display || dst.format() != raw.format() {
            return Err(Error::invalid_dimensions(
                dst.width(),
                dst.height(),
                format!("expected {display} {}", raw.format()),
            ));
        }
        let bpp = raw.format().bytes_per_pixel();
        let src_stride = raw.stride();
        let dst_stride = dst.stride();
        let src = raw.data();
        let out = dst.data_mut();
        for v in 0..display.height {
            let row = &mut out[v as usize * dst_stride..(v as usize + 1) * dst_stride];
            for u in 0..display.width {
                let (x, y) = self.source_pixel(u, v, raw.size());
                let s = y as usize * src_stride + x as usize * bpp;
                let d = u as usize * bpp;
                row[d..d + bpp].copy_from_slice(&src[s..s + bpp]);
            }
        }
        Ok(())
    }

    /// Returns the display-normal version of `raw`.
    ///
    /// Identity orientation returns the input untouched.
    pub fn apply_to_pixels(self, raw: PixelBuffer) -> PixelBuffer {
        if self.is_identity() {
            return raw;
        }
        let display = self.display_size(raw.size());
        let spec = BufferSpec::new(display.width, display.height, raw.format());
        let mut dst = PixelBuffer::new(spec);
        // Shapes were derived from `raw`, so this cannot mismatch.
        let _ = self.apply_into(&raw, &mut dst);
        dst
    }
}

fn map_rect(rect: Rect, f: impl Fn(f64, f64) -> (f64, f64)) -> Rect {
    let (ax, ay) = f(f64::from(rect.x), f64::from(rect.y));
    let (bx, by) = f(f64::from(rect.right()), f64::from(rect.bottom()));
    Rect::from_corners(
        ax.round() as u32,
        ay.round() as u32,
        bx.round() as u32,
        by.round() as u32,
    )
}

/// User rotation in clockwise quarter turns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    /// Upright.
    #[default]
    R0,
    /// 90 degrees clockwise.
    R90,
    /// 180 degrees.
    R180,
    /// 270 degrees clockwise.
    R270,
}

impl Rotation {
    /// Converts degrees to a rotation, normalizing into `0..360`.
    ///
    /// # Panics
    ///
    /// Panics if `degrees` is not a multiple of 90.
    pub fn from_degrees(degrees: i32) -> Self {
        assert!(
            degrees % 90 == 0,
            "rotation must be a multiple of 90 degrees, got {degrees}"
        );
        match degrees.rem_euclid(360) {
            0 => Self::R0,
            90 => Self::R90,
            180 => Self::R180,
            _ => Self::R270,
        }
    }

    /// Rotation in degrees (0, 90, 180 or 270).
    pub const fn degrees(self) -> i32 {
        match self {
            Self::R0 => 0,
            Self::R90 => 90,
            Self::R180 => 180,
            Self::R270 => 270,
        }
    }

    /// Whether width and height trade places.
    pub const fn swaps_dimensions(self) -> bool {
        matches!(self, Self::R90 | Self::R270)
    }

    /// Equivalent orientation map.
    pub const fn as_orientation(self) -> Orientation {
        match self {
            Self::R0 => Orientation::Normal,
            Self::R90 => Orientation::Rotate90,
            Self::R180 => Orientation::Rotate180,
            Self::R270 => Orientation::Rotate270,
        }
    }

    /// Size after rotation.
    pub fn rotate_size(self, size: Size) -> Size {
        if self.swaps_dimensions() { size.swapped() } else { size }
    }

    /// Rotates a point of content with unrotated `size`.
    pub fn rotate_point(self, x: f64, y: f64, size: Size) -> (f64, f64) {
        self.as_orientation().raw_point_to_display(x, y, size)
    }

    /// Inverse of [`rotate_point`](Self::rotate_point).
    pub fn reverse_rotate_point(self, x: f64, y: f64, size: Size) -> (f64, f64) {
        self.as_orientation().display_point_to_raw(x, y, size)
    }

    /// Rotates a rectangle of content with unrotated `size`.
    pub fn rotate_rect(self, rect: Rect, size: Size) -> Rect {
        self.as_orientation().raw_rect_to_display(rect, size)
    }

    /// Maps a rectangle in rotated space back to unrotated content space.
    ///
    /// `size` is the unrotated content size.
    pub fn reverse_rotate_rect(self, rect: Rect, size: Size) -> Rect {
        self.as_orientation().display_rect_to_raw(rect, size)
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}
