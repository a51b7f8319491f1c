//! Error types for region decoding.
//!
//! Only setup failures (an [`ImageSource`](crate::ImageSource) that cannot be
//! opened at all) leave this crate as `Err`. Per-tile failures are resolved
//! inside [`RegionDecodePool`](crate::RegionDecodePool) and surface as a
//! missing buffer plus a log line.

use thiserror::Error;
use tilezoom_core::{BufferSpec, Rect, Size};

/// Result type alias for decode operations.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Errors from opening sources and decoding regions.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The source could not be turned into a region decoder.
    #[error("failed to open {key}: {reason}")]
    Open {
        /// Source key
        key: String,
        /// Failure reason
        reason: String,
    },

    /// Image format not handled by the decoder.
    #[error("unsupported image: {0}")]
    Unsupported(String),

    /// Requested region is empty or outside the raw image.
    #[error("region {rect} outside image {image}")]
    RegionOutOfBounds {
        /// Requested raw-space region
        rect: Rect,
        /// Raw image size
        image: Size,
    },

    /// The reuse buffer offered to the decoder was not acceptable.
    #[error("reuse buffer rejected for {spec}: {reason}")]
    ReuseRejected {
        /// Shape the decoder needed
        spec: BufferSpec,
        /// Why the offered buffer did not fit
        reason: String,
    },

    /// The pool was destroyed while the decode was pending.
    #[error("decode pool destroyed")]
    Destroyed,

    /// Image codec error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Core type error.
    #[error(transparent)]
    Core(#[from] tilezoom_core::Error),

    /// I/O error while reading the source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Creates a [`DecodeError::Open`] error.
    pub fn open(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Open {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a [`DecodeError::ReuseRejected`] error.
    pub fn reuse_rejected(spec: BufferSpec, reason: impl Into<String>) -> Self {
        Self::ReuseRejected {
            spec,
            reason: reason.into(),
        }
    }

    /// Returns `true` if the failure came from the offered reuse buffer.
    #[inline]
    pub fn is_reuse_error(&self) -> bool {
        matches!(self, Self::ReuseRejected { .. })
    }

    /// Returns `true` if the requested region was invalid.
    #[inline]
    pub fn is_bounds_error(&self) -> bool {
        matches!(self, Self::RegionOutOfBounds { .. })
            || matches!(self, Self::Core(e) if e.is_bounds_error())
    }
}
