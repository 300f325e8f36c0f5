//! Per-device sampling workers.
//!
//! Each configured device gets one OS thread. The thread paces itself with a
//! periodic timer, takes the shared bus lock for each protocol operation
//! batch, and pushes decoded samples through its dedicated channel. On a fatal
//! error or a shutdown request it stops the device best-effort, closes its
//! channel (signaling end-of-stream to the aggregator), and carries its error
//! out through the thread's join result.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use airmon_protocol::ProtocolError;
use crossbeam_channel::{select, tick, Sender};
use thiserror::Error;
use tracing::{info, warn};

use crate::context::RuntimeContext;
use crate::device::{Mode, SensorDevice};

/// One decoded measurement frame, ready for aggregation.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Decoded field values, one per profile word; NaN marks an invalid
    /// reading.
    pub values: Vec<f64>,
}

/// Fatal worker conditions, carried out through the thread's join result.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Device setup (reset or start of measurement mode) failed.
    #[error("failed to start measurement: {0}")]
    Start(ProtocolError),

    /// Polling or reading a sample failed past the retry budget.
    #[error("sampling failed: {0}")]
    Sample(ProtocolError),
}

impl WorkerError {
    /// Numeric code of the underlying protocol error.
    pub fn code(&self) -> i32 {
        match self {
            WorkerError::Start(e) | WorkerError::Sample(e) => e.code(),
        }
    }
}

/// Worker pacing and startup configuration.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Sampling period; the first sample is read one full period after start.
    pub interval: Duration,
    /// Software-reset devices that support it before starting measurements.
    pub reset_on_start: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig { interval: Duration::from_secs(5), reset_on_start: false }
    }
}

/// Spawn the sampling thread for one device.
///
/// The device handle moves into the thread and is released when it exits. The
/// channel's send side closes with the thread, which is how the aggregator
/// learns the worker is gone.
pub fn spawn(
    mut device: SensorDevice,
    ctx: Arc<RuntimeContext>,
    config: WorkerConfig,
    tx: Sender<Sample>,
) -> JoinHandle<Result<(), WorkerError>> {
    thread::spawn(move || {
        let result = run(&mut device, &ctx, config, &tx);

        // Best-effort stop; errors are logged, not propagated, so the
        // thread's result reflects the condition that ended the loop.
        if device.mode() == Mode::Measuring {
            let _bus = ctx.lock_bus();
            if let Err(e) = device.stop_measurement() {
                warn!(
                    device = device.profile().name,
                    code = e.code(),
                    "failed to stop measurement: {e}"
                );
            }
        }

        if let Err(e) = &result {
            warn!(device = device.profile().name, code = e.code(), "worker exiting: {e}");
        }
        result
    })
}

fn run(
    device: &mut SensorDevice,
    ctx: &RuntimeContext,
    config: WorkerConfig,
    tx: &Sender<Sample>,
) -> Result<(), WorkerError> {
    let name = device.profile().name;
    let ticker = tick(config.interval);
    let wake = ctx.wake_receiver();

    {
        let _bus = ctx.lock_bus();

        if config.reset_on_start && device.reset().map_err(WorkerError::Start)? {
            info!(device = name, "device reset");
        }

        match device.describe() {
            Ok(Some(identity)) => info!(
                device = name,
                product = %identity.product_name,
                serial = %identity.serial_number,
                firmware = identity.firmware_version,
                "device identified"
            ),
            Ok(None) => {}
            // Identity is informational; a failed read is not fatal.
            Err(e) => warn!(device = name, code = e.code(), "failed to read identity: {e}"),
        }

        device.start_measurement().map_err(WorkerError::Start)?;
    }
    info!(device = name, "measurement started");

    while !ctx.is_shutdown() {
        select! {
            recv(ticker) -> _ => {}
            // The wake channel only ever closes; re-check the flag above.
            recv(wake) -> _ => continue,
        }
        if ctx.is_shutdown() {
            break;
        }

        let values = {
            let _bus = ctx.lock_bus();
            while !device.poll_ready().map_err(WorkerError::Sample)? {}
            device.read_sample().map_err(WorkerError::Sample)?
        };

        if tx.send(Sample { values }).is_err() {
            // Aggregator went away; nothing left to sample for.
            break;
        }
    }

    Ok(())
}
