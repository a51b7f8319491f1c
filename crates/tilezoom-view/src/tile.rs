//! Tile records tracked by the manager.

use std::fmt;
use std::sync::Arc;

use tilezoom_decode::RefCountedBuffer;

use crate::planner::TileSpec;

/// Lifecycle of one planned tile.
///
/// ```text
/// Init -> Decoding -> Ready
///            |
///            +-----> Failed
///
/// any state -> Expired (removed from the plan, cleaned or destroyed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileState {
    /// Planned, not yet submitted.
    Init,
    /// Submitted to a decode worker.
    Decoding,
    /// Pixels installed.
    Ready,
    /// The decoder produced nothing for this tile.
    Failed,
    /// No longer part of any plan.
    Expired,
}

impl TileState {
    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Decoding => "decoding",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A planned tile and whatever the decoder has produced for it so far.
#[derive(Clone)]
pub struct Tile {
    spec: TileSpec,
    state: TileState,
    generation: u64,
    ticket: u64,
    buffer: Option<Arc<RefCountedBuffer>>,
}

impl Tile {
    pub(crate) fn new(spec: TileSpec, generation: u64) -> Self {
        Self {
            spec,
            state: TileState::Init,
            generation,
            ticket: 0,
            buffer: None,
        }
    }

    /// Region and sample size.
    pub fn spec(&self) -> &TileSpec {
        &self.spec
    }

    /// Current state.
    pub fn state(&self) -> TileState {
        self.state
    }

    /// Generation the tile was last planned under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Installed pixels, present only while `Ready`.
    pub fn buffer(&self) -> Option<&Arc<RefCountedBuffer>> {
        self.buffer.as_ref()
    }

    pub(crate) fn ticket(&self) -> u64 {
        self.ticket
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub(crate) fn start_decoding(&mut self, generation: u64, ticket: u64) {
        self.state = TileState::Decoding;
        self.generation = generation;
        self.ticket = ticket;
    }

    /// Installs pixels. The tile takes over a pending reference.
    pub(crate) fn install(&mut self, buffer: Arc<RefCountedBuffer>) {
        self.state = TileState::Ready;
        self.buffer = Some(buffer);
    }

    pub(crate) fn fail(&mut self) {
        self.state = TileState::Failed;
    }

    /// Expires the tile and drops its pending reference, if any.
    pub(crate) fn expire(&mut self, owner: &str) {
        self.state = TileState::Expired;
        if let Some(buffer) = self.buffer.take() {
            buffer.set_pending(owner, false);
        }
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tile")
            .field("spec", &self.spec)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("has_buffer", &self.buffer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilezoom_core::{BufferSpec, PixelBuffer, PixelFormat, Rect};
    use tilezoom_decode::{FreshAllocator, RefClass};

    fn spec() -> TileSpec {
        TileSpec {
            rect: Rect::new(0, 0, 8, 8),
            sample_size: 1,
        }
    }

    #[test]
    fn lifecycle() {
        let mut tile = Tile::new(spec(), 1);
        assert_eq!(tile.state(), TileState::Init);
        tile.start_decoding(2, 7);
        assert_eq!((tile.state(), tile.generation(), tile.ticket()), (TileState::Decoding, 2, 7));

        let buffer = Arc::new(RefCountedBuffer::new(
            "t",
            PixelBuffer::new(BufferSpec::new(8, 8, PixelFormat::Rgba8)),
            Arc::new(FreshAllocator),
            RefClass::Pending,
        ));
        tile.install(Arc::clone(&buffer));
        assert_eq!(tile.state(), TileState::Ready);

        tile.expire("test");
        assert_eq!(tile.state(), TileState::Expired);
        assert!(tile.buffer().is_none());
        assert!(buffer.is_released());
    }

    #[test]
    fn state_names() {
        assert_eq!(TileState::Decoding.to_string(), "decoding");
    }
}
