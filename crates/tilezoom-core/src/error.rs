//! Error types for tilezoom-core operations.
//!
//! The [`Error`] enum covers failures that can occur while building pixel
//! buffers and mapping rectangles between coordinate spaces:
//! - Bounds checking of regions against an image
//! - Buffer construction from raw bytes
//! - Parsing of orientation metadata
//!
//! # Usage
//!
//! ```rust
//! use tilezoom_core::{Error, Rect, Result, Size};
//!
//! fn check_region(rect: Rect, image: Size) -> Result<()> {
//!     if rect.right() > image.width || rect.bottom() > image.height {
//!         return Err(Error::invalid_region(rect, image));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Used By
//!
//! - [`crate::pixel::PixelBuffer`] - Buffer construction
//! - [`crate::orientation::Orientation`] - EXIF value parsing
//! - `tilezoom-decode` - Wrapped inside `DecodeError`

use thiserror::Error;

use crate::rect::{Rect, Size};

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by core geometry and buffer operations.
///
/// # Categories
///
/// - **Bounds errors**: [`InvalidRegion`](Error::InvalidRegion)
/// - **Buffer errors**: [`InvalidDimensions`](Error::InvalidDimensions), [`BufferSize`](Error::BufferSize)
/// - **Metadata errors**: [`InvalidOrientation`](Error::InvalidOrientation)
/// - **I/O errors**: [`Io`](Error::Io)
#[derive(Debug, Error)]
pub enum Error {
    /// Region extends beyond image bounds or is empty.
    #[error("region ({rx}, {ry}, {rw}x{rh}) is not inside image {width}x{height}")]
    InvalidRegion {
        /// Region X origin
        rx: u32,
        /// Region Y origin
        ry: u32,
        /// Region width
        rw: u32,
        /// Region height
        rh: u32,
        /// Image width
        width: u32,
        /// Image height
        height: u32,
    },

    /// Width or height is zero, or the byte size would overflow.
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Reason why dimensions are invalid
        reason: String,
    },

    /// Raw byte slice does not match the declared buffer layout.
    #[error("buffer size mismatch: expected {expected} bytes, got {got}")]
    BufferSize {
        /// Bytes required by width * height * bytes_per_pixel
        expected: usize,
        /// Bytes provided
        got: usize,
    },

    /// EXIF orientation tag outside 1..=8.
    #[error("invalid EXIF orientation value: {0}")]
    InvalidOrientation(u16),

    /// I/O error while reading image bytes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates an [`Error::InvalidRegion`] error for `rect` against `image`.
    #[inline]
    pub fn invalid_region(rect: Rect, image: Size) -> Self {
        Self::InvalidRegion {
            rx: rect.x,
            ry: rect.y,
            rw: rect.width,
            rh: rect.height,
            width: image.width,
            height: image.height,
        }
    }

    /// Creates an [`Error::InvalidDimensions`] error.
    #[inline]
    pub fn invalid_dimensions(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a bounds-related error.
    #[inline]
    pub fn is_bounds_error(&self) -> bool {
        matches!(self, Self::InvalidRegion { .. })
    }

    /// Returns `true` if this is an I/O error.
    #[inline]
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_region() {
        let err = Error::invalid_region(Rect::new(10, 20, 300, 40), Size::new(100, 100));
        let msg = err.to_string();
        assert!(msg.contains("300x40"));
        assert!(msg.contains("100x100"));
        assert!(err.is_bounds_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.is_io_error());
        assert!(!err.is_bounds_error());
    }

    #[test]
    fn test_buffer_size() {
        let err = Error::BufferSize {
            expected: 16,
            got: 12,
        };
        assert!(err.to_string().contains("expected 16"));
        assert!(!err.is_bounds_error());
    }

    #[test]
    fn test_invalid_dimensions() {
        let err = Error::invalid_dimensions(0, 10, "zero width");
        assert!(err.to_string().contains("0x10 (zero width)"));
        assert!(!err.is_bounds_error());
        assert!(!err.is_io_error());
    }
}
