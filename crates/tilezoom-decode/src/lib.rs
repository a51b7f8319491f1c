//! # tilezoom-decode
//!
//! Region decoding for tiled zoom.
//!
//! This crate turns an encoded image into display-normal pixel buffers for
//! arbitrary rectangles at power-of-two sample sizes, and tracks how long
//! those buffers stay alive:
//!
//! - [`ImageSource`] - Re-openable byte stream ([`FileImageSource`], [`MemoryImageSource`])
//! - [`read_image_info`] - Dimensions, container format and EXIF orientation
//! - [`RegionDecoder`] / [`RegionDecoderFactory`] - Codec capability
//! - [`RegionDecodePool`] - Pooled handles, reuse fallback, orientation correction
//! - [`BufferAllocator`] / [`BufferPool`] - Buffer reuse
//! - [`RefCountedBuffer`] - Buffers shared by cache, display and pending owners
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tilezoom_core::Rect;
//! use tilezoom_decode::*;
//!
//! let source: Arc<dyn ImageSource> = Arc::new(FileImageSource::new("huge.jpg"));
//! let info = read_image_info(source.as_ref())?;
//! let pool = RegionDecodePool::open(
//!     source,
//!     Arc::new(ImageRegionDecoderFactory),
//!     Arc::new(BufferPool::default()),
//!     info.orientation,
//! )?;
//!
//! // Top-left 1024x1024 of the display image at quarter resolution.
//! let tile = pool.decode(Rect::new(0, 0, 1024, 1024), 4);
//! ```
//!
//! # Threading
//!
//! Sources, factories, allocators and the pool are `Send + Sync` and meant
//! to be shared behind `Arc` by decode workers. A single decoder handle is
//! only ever used by one decode at a time.

#![warn(missing_docs)]

pub mod allocator;
pub mod error;
pub mod pool;
pub mod refcount;
pub mod region;
pub mod source;

pub use allocator::{BufferAllocator, BufferPool, DEFAULT_POOL_SIZE, FreshAllocator, PoolStats};
pub use error::{DecodeError, DecodeResult};
pub use pool::{DecodePoolStats, RegionDecodePool};
pub use refcount::{RefClass, RefCountedBuffer, RefCounts};
pub use region::{
    ImageRegionDecoder, ImageRegionDecoderFactory, RegionDecoder, RegionDecoderFactory,
    check_region, output_spec,
};
pub use source::{
    FileImageSource, ImageInfo, ImageSource, MemoryImageSource, exif_orientation, read_all,
    read_image_info,
};
