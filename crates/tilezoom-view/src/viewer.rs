//! Engine and tile manager wired together.
//!
//! [`TiledViewer`] is what a host embeds: it forwards gestures to the
//! [`TransformEngine`], re-plans tiles whenever the viewport changes and
//! installs finished decodes once per frame.
//!
//! ```text
//! host input --> with_engine(|e| e.pointer_move(..))
//!                    |  viewport listener marks dirty
//!                    v
//!                 refresh rules --> TileManager::refresh
//!
//! host frame --> update(now): tick animations, refresh if dirty, poll decodes
//!            --> render(&mut renderer)
//! ```

use std::cell::Cell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tilezoom_core::{Orientation, Size};
use tilezoom_decode::{
    BufferAllocator, BufferPool, FreshAllocator, ImageRegionDecoderFactory, ImageSource,
    RegionDecodePool, RegionDecoderFactory, read_image_info,
};
use tracing::{debug, trace};

use crate::config::ZoomConfig;
use crate::engine::TransformEngine;
use crate::error::{Result, ViewError};
use crate::manager::{TileManager, TileRenderer};
use crate::scales::round2;

const FRAME: Duration = Duration::from_millis(16);

/// A zoomable, tiled view of one image.
pub struct TiledViewer {
    engine: TransformEngine,
    manager: TileManager,
    decoder: Arc<RegionDecodePool>,
    dirty: Rc<Cell<bool>>,
    paused: bool,
    destroyed: bool,
    _single_writer: PhantomData<Rc<()>>,
}

impl TiledViewer {
    /// Opens `source` with the default `image`-crate decoder.
    pub fn open(source: Arc<dyn ImageSource>, config: ZoomConfig) -> Result<Self> {
        Self::open_with(source, Arc::new(ImageRegionDecoderFactory), config)
    }

    /// Opens `source` with a custom decoder factory.
    ///
    /// Reads the header for EXIF orientation and picks the buffer allocator
    /// from `buffer_pool_bytes`.
    pub fn open_with(
        source: Arc<dyn ImageSource>,
        factory: Arc<dyn RegionDecoderFactory>,
        config: ZoomConfig,
    ) -> Result<Self> {
        let info = read_image_info(source.as_ref())?;
        let orientation = if config.apply_exif_orientation {
            info.orientation
        } else {
            Orientation::Normal
        };
        let allocator: Arc<dyn BufferAllocator> = if config.buffer_pool_bytes > 0 {
            Arc::new(BufferPool::new(config.buffer_pool_bytes))
        } else {
            Arc::new(FreshAllocator)
        };
        let decoder = RegionDecodePool::open(source, factory, allocator, orientation)?;
        Self::with_decoder(Arc::new(decoder), config)
    }

    /// Builds a viewer over an already opened decode pool.
    pub fn with_decoder(decoder: Arc<RegionDecodePool>, config: ZoomConfig) -> Result<Self> {
        let manager = TileManager::new(Arc::clone(&decoder), &config)?;
        let mut engine = TransformEngine::new(config);
        engine.set_content_size(decoder.display_size());

        let dirty = Rc::new(Cell::new(false));
        {
            let dirty = Rc::clone(&dirty);
            engine.add_viewport_listener(move |_| dirty.set(true));
        }
        debug!(
            key = decoder.key(),
            image = %decoder.display_size(),
            orientation = decoder.orientation().exif_value(),
            "opened tiled viewer"
        );
        Ok(Self {
            engine,
            manager,
            decoder,
            dirty,
            paused: false,
            destroyed: false,
            _single_writer: PhantomData,
        })
    }

    /// The transform engine, read-only.
    pub fn engine(&self) -> &TransformEngine {
        &self.engine
    }

    /// The tile manager, read-only.
    pub fn manager(&self) -> &TileManager {
        &self.manager
    }

    /// The decode pool.
    pub fn decoder(&self) -> &Arc<RegionDecodePool> {
        &self.decoder
    }

    /// Orientation-corrected image size.
    pub fn image_size(&self) -> Size {
        self.decoder.display_size()
    }

    /// Returns `true` while tile updates are suspended.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns `true` after [`destroy`](Self::destroy).
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Runs `f` against the engine, then applies any viewport change.
    pub fn with_engine<R>(&mut self, f: impl FnOnce(&mut TransformEngine) -> R) -> R {
        let result = f(&mut self.engine);
        self.sync();
        result
    }

    /// Resizes the viewport.
    pub fn set_viewport_size(&mut self, size: Size) {
        self.with_engine(|engine| engine.set_viewport_size(size));
    }

    /// Per-frame update: advances animations, re-plans if the viewport
    /// moved and installs finished decodes.
    ///
    /// Returns `true` if another frame is needed.
    pub fn update(&mut self, now: Instant) -> bool {
        let animating = self.engine.tick(now);
        self.sync();
        self.manager.poll();
        animating || self.manager.in_flight() > 0
    }

    /// Blocks until in-flight decodes finish (or `timeout`), then installs them.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        self.manager.wait_idle(timeout)
    }

    /// Runs frames in real time until no animation is running and no
    /// decode is in flight.
    ///
    /// Fails with [`ViewError::NotReady`] if `timeout` passes first.
    pub fn settle(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while self.update(Instant::now()) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(in_flight = self.manager.in_flight(), "settle timed out");
                return Err(ViewError::NotReady("tiles still pending at timeout"));
            }
            let frame = FRAME.min(remaining);
            if self.manager.in_flight() > 0 {
                self.manager.wait_idle(frame);
            } else {
                std::thread::sleep(frame);
            }
        }
        Ok(())
    }

    /// Suspends tile updates and drops all tiles, or resumes and re-plans.
    pub fn set_paused(&mut self, paused: bool) {
        if paused == self.paused {
            return;
        }
        self.paused = paused;
        debug!(paused, "tile updates");
        if paused {
            self.manager.clean();
        } else {
            self.refresh();
        }
    }

    /// Stops decoding for good and releases every tile.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.manager.destroy();
    }

    /// Draws ready tiles. Returns the number of tiles drawn.
    pub fn render(&self, renderer: &mut impl TileRenderer) -> usize {
        self.manager.render(&self.engine.viewport(), renderer)
    }

    fn sync(&mut self) {
        if self.dirty.replace(false) {
            self.refresh();
        }
    }

    fn refresh(&mut self) {
        if self.destroyed || self.paused {
            trace!(destroyed = self.destroyed, paused = self.paused, "refresh skipped");
            return;
        }
        let state = self.engine.viewport();
        if state.visible_rect.is_empty() {
            self.clean_if_needed();
            return;
        }
        let config = self.engine.config();
        if config.pause_when_zooming && self.engine.is_zooming() {
            trace!("refresh skipped while zooming");
            return;
        }
        if config.clean_at_min_scale && round2(state.scale) <= round2(self.engine.scale_bounds().min) {
            self.clean_if_needed();
            return;
        }
        self.manager.refresh(&state);
    }

    fn clean_if_needed(&mut self) {
        if self.manager.plan().is_some() || !self.manager.tiles().is_empty() {
            self.manager.clean();
        }
    }
}

impl std::fmt::Debug for TiledViewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiledViewer")
            .field("engine", &self.engine)
            .field("manager", &self.manager)
            .field("paused", &self.paused)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
