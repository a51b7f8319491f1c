//! # tilezoom-view
//!
//! Interaction side of tilezoom: turns gestures into a transform and the
//! transform into decoded tiles.
//!
//! Features:
//! - Pan, pinch zoom, double tap, fling and quarter-turn rotation
//! - Seven scale modes plus read mode for long images
//! - Rubber band past the scale limits, animated roll back
//! - Power-of-two tile planning over the visible rectangle
//! - Background decoding with generation-stamped results
//! - LRU tile cache on top of reference-counted buffers
//! - RON configuration
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Instant;
//! use tilezoom_core::Size;
//! use tilezoom_decode::FileImageSource;
//! use tilezoom_view::{TiledViewer, ZoomConfig};
//!
//! let source = Arc::new(FileImageSource::new("huge.jpg"));
//! let mut viewer = TiledViewer::open(source, ZoomConfig::load_default()?)?;
//! viewer.set_viewport_size(Size::new(1280, 720));
//!
//! // input
//! viewer.with_engine(|e| e.double_tap(glam::Vec2::new(640.0, 360.0)));
//!
//! // every frame
//! viewer.update(Instant::now());
//! viewer.render(&mut my_renderer);
//! ```
//!
//! # Threading
//!
//! [`TransformEngine`], [`TileManager`] and [`TiledViewer`] are `!Send`:
//! every mutation and every listener call happens on the context that
//! created them. Only region decodes run on worker threads, and their
//! results come back through [`TileManager::poll`].
//!
//! # Configuration
//!
//! [`ZoomConfig`] is read from `<config_dir>/tilezoom/zoom.ron`:
//!
//! ```ron
//! (
//!     scale_mode: FitCenter,
//!     max_scale_multiplier: 2.0,
//!     tiles: (tile_edge: 1024),
//!     decode_threads: 2,
//! )
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod animation;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod listener;
pub mod manager;
pub mod matrix;
pub mod planner;
pub mod scales;
pub mod tile;
pub mod viewer;

pub use animation::accelerate_decelerate;
pub use cache::{CacheStats, TileCache};
pub use config::{LongImageDecider, ScaleMode, ZoomConfig};
pub use engine::{DragEvent, Edge, GestureState, TransformEngine, ViewportState};
pub use error::{Result, ViewError};
pub use executor::{DecodeExecutor, DecodeJob, DecodeOutcome};
pub use listener::{ListenerId, Listeners};
pub use manager::{TileManager, TileRenderer, TileStats};
pub use planner::{TilePlan, TileSizePolicy, TileSpec, plan, plan_visible};
pub use scales::ScaleBounds;
pub use tile::{Tile, TileState};
pub use viewer::TiledViewer;
