//! Sample aggregation and the publish loop.
//!
//! The aggregator owns the read end of every worker's channel. It waits for
//! samples, merges each device's latest values into a fixed-layout frame, and
//! publishes the frame whenever a wake delivered fresh data and every device
//! has reported at least once. A closed channel means its worker has exited;
//! the worker is joined, its result logged, and the loop ends when no workers
//! remain.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Select, TryRecvError};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::context::RuntimeContext;
use crate::payload::{ReadingPayload, FRAME_LEN};
use crate::publish::{PublishError, Publisher};
use crate::worker::{Sample, WorkerError};

/// How long to wait on the channels before re-checking liveness.
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// The read side of one worker: its channel, thread handle, and the frame
/// slots its samples land in.
pub struct DeviceChannel {
    /// Device family name, for log lines.
    pub name: &'static str,
    /// First slot of this device's samples in the aggregated frame.
    pub offset: usize,
    /// Number of values in each of this device's samples.
    pub word_count: usize,
    /// Receiving end of the worker's sample channel.
    pub rx: Receiver<Sample>,
    /// The worker thread, joined when the channel closes.
    pub handle: JoinHandle<Result<(), WorkerError>>,
}

/// Fatal session conditions, reflected in the process exit status.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A worker exited with an error.
    #[error("worker {device} failed: {source}")]
    Worker {
        /// Device family name.
        device: &'static str,
        /// The worker's join result.
        #[source]
        source: WorkerError,
    },

    /// A publish failed; the whole session shuts down.
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

impl SessionError {
    /// Process exit code for this condition.
    pub fn exit_code(&self) -> u8 {
        match self {
            SessionError::Worker { source, .. } => source.code() as u8,
            SessionError::Publish(_) => 8,
        }
    }
}

struct Slot {
    name: &'static str,
    offset: usize,
    word_count: usize,
    rx: Receiver<Sample>,
    handle: Option<JoinHandle<Result<(), WorkerError>>>,
    seen: bool,
    closed: bool,
}

/// Merges worker samples and drives the publish cycle.
pub struct Aggregator {
    slots: Vec<Slot>,
    frame: [f64; FRAME_LEN],
    publisher: Box<dyn Publisher>,
    publishing: bool,
    ctx: Arc<RuntimeContext>,
}

impl Aggregator {
    /// Build an aggregator over the given workers.
    pub fn new(
        channels: Vec<DeviceChannel>,
        publisher: Box<dyn Publisher>,
        ctx: Arc<RuntimeContext>,
    ) -> Self {
        let slots = channels
            .into_iter()
            .map(|c| Slot {
                name: c.name,
                offset: c.offset,
                word_count: c.word_count,
                rx: c.rx,
                handle: Some(c.handle),
                seen: false,
                closed: false,
            })
            .collect();
        Aggregator { slots, frame: [0.0; FRAME_LEN], publisher, publishing: true, ctx }
    }

    /// Run until every worker has exited.
    ///
    /// Returns the first fatal condition encountered, if any; worker errors
    /// after the first and publish errors after shutdown has begun are logged
    /// but do not overwrite it.
    pub fn run(mut self) -> Result<(), SessionError> {
        let mut first_fatal: Option<SessionError> = None;

        while self.active() > 0 {
            if !self.wait_ready() {
                continue;
            }

            let fresh = self.drain(&mut first_fatal);

            // Publish only complete frames: every device must have reported
            // at least once, and this wake must have brought fresh data.
            if fresh && self.publishing && self.slots.iter().all(|s| s.seen) {
                if let Err(e) = self.publish_frame() {
                    error!("publish failed, shutting down session: {e}");
                    self.publisher.disconnect();
                    self.publishing = false;
                    self.ctx.request_shutdown();
                    if first_fatal.is_none() {
                        first_fatal = Some(SessionError::Publish(e));
                    }
                }
            }
        }

        info!("all workers exited");
        match first_fatal {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    fn active(&self) -> usize {
        self.slots.iter().filter(|s| !s.closed).count()
    }

    /// Block until at least one open channel is ready (or the timeout
    /// elapses). Returns whether anything is ready.
    fn wait_ready(&self) -> bool {
        let mut select = Select::new();
        for slot in self.slots.iter().filter(|s| !s.closed) {
            select.recv(&slot.rx);
        }
        select.ready_timeout(WAIT_TIMEOUT).is_ok()
    }

    /// Read one pending sample from every ready channel. Closed channels are
    /// deregistered and their workers joined. Returns whether any fresh
    /// sample arrived.
    fn drain(&mut self, first_fatal: &mut Option<SessionError>) -> bool {
        let mut fresh = false;

        for slot in self.slots.iter_mut().filter(|s| !s.closed) {
            match slot.rx.try_recv() {
                Ok(sample) => {
                    if copy_sample(&mut self.frame, slot, &sample) {
                        fresh = true;
                    }
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    slot.closed = true;
                    let Some(handle) = slot.handle.take() else { continue };
                    match handle.join() {
                        Ok(Ok(())) => info!(device = slot.name, "worker exited cleanly"),
                        Ok(Err(e)) => {
                            error!(device = slot.name, code = e.code(), "worker failed: {e}");
                            if first_fatal.is_none() {
                                *first_fatal =
                                    Some(SessionError::Worker { device: slot.name, source: e });
                            }
                        }
                        Err(_) => error!(device = slot.name, "worker panicked"),
                    }
                }
            }
        }

        fresh
    }

    fn publish_frame(&mut self) -> Result<(), PublishError> {
        let payload = ReadingPayload::from_frame(&self.frame)
            .to_json()
            .expect("frame payload serializes");
        debug!(bytes = payload.len(), "publishing aggregated frame");
        self.publisher.publish(&payload)
    }
}

/// Copy a sample into its device's frame slots. Rejects (and logs) a sample
/// whose length does not match the device layout; decoding upstream
/// guarantees this never fires with a healthy worker.
fn copy_sample(frame: &mut [f64; FRAME_LEN], slot: &mut Slot, sample: &Sample) -> bool {
    if sample.values.len() != slot.word_count {
        error!(
            device = slot.name,
            expected = slot.word_count,
            actual = sample.values.len(),
            "dropping sample with wrong length"
        );
        return false;
    }
    frame[slot.offset..slot.offset + slot.word_count].copy_from_slice(&sample.values);
    slot.seen = true;
    true
}
