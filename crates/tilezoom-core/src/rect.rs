//! Rectangle and size types for image-space geometry.
//!
//! # Overview
//!
//! - [`Size`] - Width and height of an image, viewport or buffer
//! - [`Rect`] - Integer rectangle with origin and dimensions
//! - [`RectF`] - Float rectangle in view space
//!
//! # Coordinate System
//!
//! All coordinates use the standard image convention:
//! - Origin (0, 0) is at the **top-left** corner
//! - X increases to the right
//! - Y increases downward
//!
//! ```text
//! (0,0) ────────► X
//!   │
//!   │   ┌──────────┐
//!   │   │  Tile    │
//!   │   │  Region  │
//!   │   └──────────┘
//!   ▼
//!   Y
//! ```
//!
//! Right and bottom edges are exclusive, so two rectangles that share an
//! edge never overlap. Tile partitioning relies on this.
//!
//! # Usage
//!
//! ```rust
//! use tilezoom_core::Rect;
//!
//! let rect = Rect::new(10, 20, 100, 50);
//! assert!(rect.contains(15, 25));
//!
//! let other = Rect::new(50, 40, 100, 50);
//! let overlap = rect.intersect(&other).unwrap();
//! assert_eq!(overlap, Rect::new(50, 40, 60, 30));
//! ```

use serde::{Deserialize, Serialize};

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Size {
    /// Creates a new size.
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either dimension is zero.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels.
    #[inline]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns the size with width and height exchanged.
    ///
    /// ```rust
    /// use tilezoom_core::Size;
    ///
    /// assert_eq!(Size::new(4000, 3000).swapped(), Size::new(3000, 4000));
    /// ```
    #[inline]
    pub const fn swapped(&self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Size after downsampling by `sample`, rounding up so partial
    /// blocks at the right and bottom edges keep a pixel.
    ///
    /// ```rust
    /// use tilezoom_core::Size;
    ///
    /// assert_eq!(Size::new(4000, 3000).sampled(4), Size::new(1000, 750));
    /// assert_eq!(Size::new(1001, 3).sampled(2), Size::new(501, 2));
    /// ```
    #[inline]
    pub const fn sampled(&self, sample: u32) -> Self {
        let s = if sample == 0 { 1 } else { sample };
        Self::new(self.width.div_ceil(s), self.height.div_ceil(s))
    }

    /// Returns the size as `(width, height)` floats.
    #[inline]
    pub fn to_f32(&self) -> (f32, f32) {
        (self.width as f32, self.height as f32)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A rectangle defined by origin (x, y) and dimensions (width, height).
///
/// # Invariants
///
/// - A rectangle with zero width or height is considered empty
/// - `right()` and `bottom()` are exclusive
///
/// # Example
///
/// ```rust
/// use tilezoom_core::Rect;
///
/// let rect = Rect::new(10, 20, 100, 50);
/// assert_eq!(rect.right(), 110);
/// assert_eq!(rect.bottom(), 70);
/// assert_eq!(rect.area(), 5000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// X coordinate of the left edge (inclusive)
    pub x: u32,
    /// Y coordinate of the top edge (inclusive)
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Rect {
    /// Creates a new rectangle with the given origin and dimensions.
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle from origin (0, 0) covering `size`.
    #[inline]
    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// Creates a rectangle from two corner points.
    ///
    /// If coordinates are swapped, they will be normalized.
    ///
    /// ```rust
    /// use tilezoom_core::Rect;
    ///
    /// let rect = Rect::from_corners(110, 70, 10, 20);
    /// assert_eq!(rect, Rect::new(10, 20, 100, 50));
    /// ```
    #[inline]
    pub fn from_corners(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        let (min_x, max_x) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (min_y, max_y) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Returns the X coordinate of the right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Returns the Y coordinate of the bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Dimensions of the rectangle.
    #[inline]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Returns the area of the rectangle in pixels.
    #[inline]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if the rectangle has zero area.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns `true` if the point (px, py) is inside this rectangle.
    #[inline]
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Returns `true` if this rectangle fully contains another.
    #[inline]
    pub const fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Returns `true` if this rectangle shares at least one pixel with another.
    ///
    /// Empty rectangles never overlap.
    #[inline]
    pub const fn overlaps(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Returns the intersection of this rectangle with another.
    ///
    /// Returns `None` if the rectangles don't overlap.
    #[inline]
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if x < right && y < bottom {
            Some(Rect::new(x, y, right - x, bottom - y))
        } else {
            None
        }
    }

    /// Returns the bounding box that contains both rectangles.
    #[inline]
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Clamps this rectangle to an image of `size`.
    ///
    /// Returns `None` if there's no overlap.
    ///
    /// ```rust
    /// use tilezoom_core::{Rect, Size};
    ///
    /// let rect = Rect::new(900, 500, 200, 200);
    /// let clamped = rect.clamp_to(Size::new(1000, 600)).unwrap();
    /// assert_eq!(clamped, Rect::new(900, 500, 100, 100));
    /// ```
    #[inline]
    pub fn clamp_to(&self, size: Size) -> Option<Rect> {
        self.intersect(&Rect::from_size(size))
    }

    /// Returns `(left, top, right, bottom)` as floats.
    #[inline]
    pub fn to_ltrb_f32(&self) -> (f32, f32, f32, f32) {
        (
            self.x as f32,
            self.y as f32,
            self.right() as f32,
            self.bottom() as f32,
        )
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rect({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Floating-point rectangle in view (screen) space, edges as `left/top/right/bottom`.
///
/// Unlike [`Rect`] it may lie partly or fully at negative coordinates, which
/// is the normal case for zoomed-in content.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RectF {
    /// Left edge
    pub left: f32,
    /// Top edge
    pub top: f32,
    /// Right edge
    pub right: f32,
    /// Bottom edge
    pub bottom: f32,
}

impl RectF {
    /// Creates a rectangle from its edges.
    #[inline]
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Rectangle at the origin covering `size`.
    #[inline]
    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width as f32, size.height as f32)
    }

    /// Float copy of an integer rectangle.
    #[inline]
    pub fn from_rect(rect: Rect) -> Self {
        let (l, t, r, b) = rect.to_ltrb_f32();
        Self::new(l, t, r, b)
    }

    /// Smallest rectangle containing all `points`.
    pub fn bounding(points: impl IntoIterator<Item = (f32, f32)>) -> Self {
        let mut out = Self::new(f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        let mut any = false;
        for (x, y) in points {
            any = true;
            out.left = out.left.min(x);
            out.top = out.top.min(y);
            out.right = out.right.max(x);
            out.bottom = out.bottom.max(y);
        }
        if any { out } else { Self::default() }
    }

    /// Horizontal extent.
    #[inline]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Vertical extent.
    #[inline]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Returns `true` if the rectangle has no positive area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !(self.left < self.right && self.top < self.bottom)
    }

    /// Center point.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        ((self.left + self.right) * 0.5, (self.top + self.bottom) * 0.5)
    }

    /// Half-open containment test.
    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Returns a copy shifted by `(dx, dy)`.
    #[inline]
    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }

    /// Overlap of two rectangles, or `None`.
    pub fn intersect(&self, other: &RectF) -> Option<RectF> {
        let out = Self::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!out.is_empty()).then_some(out)
    }
}

impl std::fmt::Display for RectF {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RectF({:.1}, {:.1} - {:.1}, {:.1})",
            self.left, self.top, self.right, self.bottom
        )
    }
}
