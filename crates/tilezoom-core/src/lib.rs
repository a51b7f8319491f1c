//! # tilezoom-core
//!
//! Core types for viewing images far larger than memory.
//!
//! This crate provides the foundational types shared by the decode and view
//! layers of tilezoom:
//!
//! - [`Rect`], [`Size`] - Integer pixel geometry in image space
//! - [`RectF`] - Float geometry in view space
//! - [`Orientation`] - EXIF orientation, mapping between raw and display space
//! - [`Rotation`] - User-applied quarter-turn rotation
//! - [`PixelBuffer`], [`PixelFormat`], [`BufferSpec`] - Decoded pixel storage
//!
//! ## Coordinate Spaces
//!
//! Three spaces show up throughout the workspace:
//!
//! ```text
//! raw space      pixels as stored in the file (before EXIF correction)
//!    |  Orientation::raw_rect_to_display
//!    v
//! display space  orientation-corrected image ("display-normal")
//!    |  Rotation::rotate_rect
//!    v
//! rotated space  what the user sees after rotating by 0/90/180/270
//! ```
//!
//! Tiles are planned in display space. The region decoder works in raw
//! space. The transform engine lays content out in rotated space.
//!
//! ## Crate Structure
//!
//! ```text
//! tilezoom-core (this crate)
//!    ^
//!    |
//!    +-- tilezoom-decode (sources, region decoding, buffer lifetime)
//!    +-- tilezoom-view (transform engine, tile planning and management)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod orientation;
pub mod pixel;
pub mod rect;

// Re-exports for convenience
pub use error::*;
pub use orientation::{Orientation, Rotation};
pub use pixel::{BufferSpec, PixelBuffer, PixelFormat};
pub use rect::*;

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use tilezoom_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::orientation::{Orientation, Rotation};
    pub use crate::pixel::{BufferSpec, PixelBuffer, PixelFormat};
    pub use crate::rect::{Rect, RectF, Size};
}
