//! Tile lifecycle over viewport changes.
//!
//! The manager turns viewport snapshots into tile plans, submits decodes,
//! installs results and hands ready tiles to a renderer. Every re-plan
//! bumps a generation counter and re-stamps the tiles it keeps. A decode
//! result is only installed if its ticket belongs to a `Decoding` tile of
//! the current generation. Everything else is released on arrival; the
//! decode itself is never interrupted.
//!
//! Buffer ownership:
//!
//! ```text
//! worker  ---- Pending ----> outcome ---> installed tile (keeps Pending)
//!                               |            |
//!                               |            +--> TileCache (adds Cache)
//!                               +--> stale: Pending dropped
//!
//! render()  Display held for the duration of one draw call
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use tilezoom_core::RectF;
use tilezoom_decode::{DecodePoolStats, RefCountedBuffer, RegionDecodePool};
use tracing::{debug, trace, warn};

use crate::cache::{CacheStats, TileCache};
use crate::config::ZoomConfig;
use crate::engine::ViewportState;
use crate::error::Result;
use crate::executor::{DecodeExecutor, DecodeJob, DecodeOutcome};
use crate::listener::{ListenerId, Listeners};
use crate::planner::{TilePlan, TileSizePolicy, TileSpec, plan};
use crate::tile::{Tile, TileState};

const OWNER: &str = "tile-manager";

/// Draws decoded tiles.
pub trait TileRenderer {
    /// Draws the pixels of `spec` into the view-space rectangle `dest`.
    ///
    /// `buffer` holds a display reference for the duration of the call.
    fn draw_tile(&mut self, spec: &TileSpec, dest: RectF, buffer: &RefCountedBuffer);
}

/// Counters across the manager's life.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TileStats {
    /// Current generation.
    pub generation: u64,
    /// Tiles in the current plan.
    pub live: usize,
    /// Tiles with pixels.
    pub ready: usize,
    /// Tiles waiting for a worker.
    pub decoding: usize,
    /// Tiles whose decode failed.
    pub failed: usize,
    /// Decodes submitted.
    pub submitted: u64,
    /// Results installed.
    pub installed: u64,
    /// Results released because they were stale.
    pub discarded: u64,
    /// Tile cache counters.
    pub cache: CacheStats,
    /// Decoder counters.
    pub decode: DecodePoolStats,
}

/// Plans, decodes and tracks tiles for one image.
pub struct TileManager {
    executor: DecodeExecutor,
    policy: TileSizePolicy,
    cache: TileCache,
    tiles: Vec<Tile>,
    plan: Option<TilePlan>,
    generation: u64,
    next_ticket: u64,
    submitted: u64,
    installed: u64,
    discarded: u64,
    destroyed: bool,
    listeners: Listeners<dyn FnMut(&[Tile])>,
    _single_writer: PhantomData<Rc<()>>,
}

impl TileManager {
    /// Creates a manager decoding from `decoder`.
    pub fn new(decoder: Arc<RegionDecodePool>, config: &ZoomConfig) -> Result<Self> {
        let executor = DecodeExecutor::new(decoder, config.decode_thread_count())?;
        Ok(Self {
            executor,
            policy: config.tiles,
            cache: TileCache::new(config.tile_cache_bytes),
            tiles: Vec::new(),
            plan: None,
            generation: 0,
            next_ticket: 0,
            submitted: 0,
            installed: 0,
            discarded: 0,
            destroyed: false,
            listeners: Listeners::new(),
            _single_writer: PhantomData,
        })
    }

    /// Current tiles in plan order.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Current plan, if any.
    pub fn plan(&self) -> Option<&TilePlan> {
        self.plan.as_ref()
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Tile sizing policy.
    pub fn policy(&self) -> &TileSizePolicy {
        &self.policy
    }

    /// Returns `true` after [`destroy`](Self::destroy).
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Decodes submitted but not yet reported.
    pub fn in_flight(&self) -> usize {
        self.executor.in_flight()
    }

    /// Snapshot of all counters.
    pub fn stats(&self) -> TileStats {
        let count = |state: TileState| self.tiles.iter().filter(|t| t.state() == state).count();
        TileStats {
            generation: self.generation,
            live: self.tiles.len(),
            ready: count(TileState::Ready),
            decoding: count(TileState::Decoding),
            failed: count(TileState::Failed),
            submitted: self.submitted,
            installed: self.installed,
            discarded: self.discarded,
            cache: self.cache.stats(),
            decode: self.executor.decoder().stats(),
        }
    }

    /// Called whenever the tile set or a tile's state changes.
    pub fn add_tiles_listener(&mut self, f: impl FnMut(&[Tile]) + 'static) -> ListenerId {
        self.listeners.add(Box::new(f))
    }

    /// Removes a tile-set listener.
    pub fn remove_tiles_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Re-plans for `state`. Returns `true` if the tile set changed.
    ///
    /// Tiles present in both plans keep their pixels. New tiles come from
    /// the cache or are submitted for decoding. Tiles that left the plan
    /// expire.
    pub fn refresh(&mut self, state: &ViewportState) -> bool {
        if self.destroyed {
            return false;
        }
        let visible = state.image_visible_rect();
        if visible.is_empty() {
            if !self.tiles.is_empty() {
                self.clean();
                return true;
            }
            return false;
        }

        let next_plan = plan(state, &self.policy);
        if let Some(current) = &self.plan {
            if current.sample_size == next_plan.sample_size && current.coverage().contains_rect(&visible) {
                trace!(visible = %visible, "plan still covers viewport");
                return false;
            }
        }

        self.generation += 1;
        let generation = self.generation;
        let mut previous: HashMap<TileSpec, Tile> =
            self.tiles.drain(..).map(|t| (*t.spec(), t)).collect();
        let mut tiles = Vec::with_capacity(next_plan.tiles.len());
        let (mut kept, mut from_cache, mut submitted) = (0usize, 0usize, 0usize);

        for spec in &next_plan.tiles {
            let tile = match previous.remove(spec) {
                Some(mut tile) => {
                    kept += 1;
                    if tile.state() == TileState::Init {
                        self.submit(&mut tile);
                        submitted += 1;
                    } else {
                        // In-flight decodes carry over with their ticket.
                        tile.set_generation(generation);
                    }
                    tile
                }
                None => {
                    let mut tile = Tile::new(*spec, generation);
                    if let Some(buffer) = self.cache.get(spec) {
                        buffer.set_pending(OWNER, true);
                        tile.install(buffer);
                        from_cache += 1;
                    } else {
                        self.submit(&mut tile);
                        submitted += 1;
                    }
                    tile
                }
            };
            tiles.push(tile);
        }

        let expired = previous.len();
        for (_, mut tile) in previous {
            tile.expire(OWNER);
        }

        debug!(
            generation,
            visible = %visible,
            sample = next_plan.sample_size,
            tiles = tiles.len(),
            kept,
            from_cache,
            submitted,
            expired,
            "re-planned tiles"
        );
        self.tiles = tiles;
        self.plan = Some(next_plan);
        self.notify();
        true
    }

    fn submit(&mut self, tile: &mut Tile) {
        self.next_ticket += 1;
        self.submitted += 1;
        tile.start_decoding(self.generation, self.next_ticket);
        self.executor.submit(DecodeJob {
            spec: *tile.spec(),
            generation: self.generation,
            ticket: self.next_ticket,
        });
    }

    /// Installs finished decodes. Returns the number of tiles that changed.
    pub fn poll(&mut self) -> usize {
        let mut changed = 0;
        for outcome in self.executor.poll() {
            if self.accept(outcome) {
                changed += 1;
            }
        }
        if changed > 0 {
            self.notify();
        }
        changed
    }

    /// Installs `outcome` if its tile is still waiting for it.
    ///
    /// The ticket is what cancels a decode, not the generation. Tiles kept
    /// across a re-plan are re-stamped with the new generation but keep
    /// their ticket, so a job from an older generation still installs into
    /// them. Jobs from a newer generation than the manager's never install.
    fn accept(&mut self, outcome: DecodeOutcome) -> bool {
        let DecodeOutcome { job, buffer } = outcome;
        let generation = self.generation;
        let tile = if self.destroyed || job.generation > generation {
            None
        } else {
            self.tiles.iter_mut().find(|t| {
                t.generation() == generation
                    && t.spec() == &job.spec
                    && t.state() == TileState::Decoding
                    && t.ticket() == job.ticket
            })
        };

        let Some(tile) = tile else {
            if let Some(buffer) = buffer {
                buffer.set_pending(OWNER, false);
            }
            self.discarded += 1;
            trace!(
                tile = %job.spec,
                job_generation = job.generation,
                generation,
                "discarded stale decode"
            );
            return false;
        };

        match buffer {
            Some(buffer) => {
                self.cache.put(job.spec, &buffer);
                tile.install(buffer);
                self.installed += 1;
                trace!(tile = %job.spec, "installed tile");
            }
            None => {
                tile.fail();
                warn!(tile = %job.spec, "tile decode failed");
            }
        }
        true
    }

    /// Waits for in-flight decodes, then installs them.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let idle = self.executor.wait_idle(timeout);
        self.poll();
        idle
    }

    /// Drops every tile, cached tiles included, and invalidates in-flight
    /// decodes.
    pub fn clean(&mut self) {
        self.generation += 1;
        let count = self.tiles.len();
        for tile in &mut self.tiles {
            tile.expire(OWNER);
        }
        self.tiles.clear();
        self.plan = None;
        self.cache.clear();
        debug!(generation = self.generation, tiles = count, "cleaned tiles");
        self.notify();
    }

    /// Cleans and shuts the decoder down. Later results are discarded.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.clean();
        self.executor.decoder().destroy();
        self.destroyed = true;
        debug!("tile manager destroyed");
    }

    /// Draws every ready tile that intersects the viewport.
    /// Returns the number of tiles drawn.
    pub fn render(&self, state: &ViewportState, renderer: &mut impl TileRenderer) -> usize {
        let view = RectF::from_size(state.viewport_size);
        let mut drawn = 0;
        for tile in &self.tiles {
            let Some(buffer) = tile.buffer() else {
                continue;
            };
            let dest = state.image_rect_to_view(tile.spec().rect);
            if view.intersect(&dest).is_none() {
                continue;
            }
            if buffer.is_released() {
                continue;
            }
            buffer.set_displayed(OWNER, true);
            renderer.draw_tile(tile.spec(), dest, buffer);
            buffer.set_displayed(OWNER, false);
            drawn += 1;
        }
        drawn
    }

    fn notify(&mut self) {
        let tiles = &self.tiles;
        self.listeners.emit(|l| l(tiles));
    }
}

impl Drop for TileManager {
    fn drop(&mut self) {
        for tile in &mut self.tiles {
            tile.expire(OWNER);
        }
        for outcome in self.executor.poll() {
            if let Some(buffer) = outcome.buffer {
                buffer.set_pending(OWNER, false);
            }
        }
    }
}

impl std::fmt::Debug for TileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileManager")
            .field("generation", &self.generation)
            .field("tiles", &self.tiles.len())
            .field("destroyed", &self.destroyed)
            .field("executor", &self.executor)
            .finish()
    }
}
