//! Background tile decoding.
//!
//! Jobs run on a dedicated rayon pool; results come back over a channel and
//! are picked up by [`DecodeExecutor::poll`] on the owning context. Workers
//! never touch tile state.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use tilezoom_decode::{RefClass, RefCountedBuffer, RegionDecodePool};
use tracing::{debug, trace};

use crate::error::Result;
use crate::planner::TileSpec;

const OWNER: &str = "decode-executor";

/// One tile decode request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeJob {
    /// Region and sample size.
    pub spec: TileSpec,
    /// Manager generation at submission.
    pub generation: u64,
    /// Per-submission identity.
    pub ticket: u64,
}

/// Result of a [`DecodeJob`].
///
/// A present buffer carries one pending reference that the receiver must
/// either keep (install) or drop.
#[derive(Debug)]
pub struct DecodeOutcome {
    /// The job this answers.
    pub job: DecodeJob,
    /// Decoded pixels, or `None` on failure.
    pub buffer: Option<Arc<RefCountedBuffer>>,
}

/// Count of jobs whose outcome has not been sent, with a wakeup for waiters.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) {
        *self.lock() += 1;
    }

    fn finish(&self) {
        let mut count = self.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }
}

/// Runs region decodes on worker threads.
pub struct DecodeExecutor {
    pool: rayon::ThreadPool,
    decoder: Arc<RegionDecodePool>,
    sender: Sender<DecodeOutcome>,
    receiver: Receiver<DecodeOutcome>,
    in_flight: Arc<InFlight>,
    threads: usize,
}

impl DecodeExecutor {
    /// Starts `threads` workers decoding from `decoder`.
    pub fn new(decoder: Arc<RegionDecodePool>, threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("tilezoom-decode-{index}"))
            .build()?;
        let (sender, receiver) = crossbeam_channel::unbounded();
        debug!(threads, key = decoder.key(), "decode executor started");
        Ok(Self {
            pool,
            decoder,
            sender,
            receiver,
            in_flight: Arc::new(InFlight::default()),
            threads,
        })
    }

    /// Worker count.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// The shared decoder.
    pub fn decoder(&self) -> &Arc<RegionDecodePool> {
        &self.decoder
    }

    /// Jobs submitted whose outcome has not been sent yet.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.lock()
    }

    /// Queues a decode.
    pub fn submit(&self, job: DecodeJob) {
        let decoder = Arc::clone(&self.decoder);
        let sender = self.sender.clone();
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.begin();
        trace!(tile = %job.spec, generation = job.generation, ticket = job.ticket, "submit decode");

        self.pool.spawn(move || {
            let buffer = decoder
                .decode(job.spec.rect, job.spec.sample_size)
                .map(|pixels| {
                    Arc::new(RefCountedBuffer::new(
                        format!("{}#{}", decoder.key(), job.spec),
                        pixels,
                        Arc::clone(decoder.allocator()),
                        RefClass::Pending,
                    ))
                });
            if let Err(unsent) = sender.send(DecodeOutcome { job, buffer }) {
                // Receiver is gone; nobody will install these pixels.
                if let Some(buffer) = unsent.0.buffer {
                    buffer.set_pending(OWNER, false);
                }
            }
            in_flight.finish();
        });
    }

    /// Drains finished outcomes without blocking.
    pub fn poll(&self) -> Vec<DecodeOutcome> {
        self.receiver.try_iter().collect()
    }

    /// Blocks until every submitted job has reported or `timeout` elapses.
    /// Returns `true` if the executor went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let count = self.in_flight.lock();
        let (count, _) = self
            .in_flight
            .idle
            .wait_timeout_while(count, timeout, |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *count == 0
    }
}

impl std::fmt::Debug for DecodeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeExecutor")
            .field("threads", &self.threads)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
