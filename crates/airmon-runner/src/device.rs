//! Per-device protocol driver.
//!
//! A [`SensorDevice`] binds a [`DeviceProfile`](airmon_protocol::DeviceProfile)
//! to an open bus handle and implements the command/response state machine on
//! top of it: mode transitions, data-ready polling, measurement reads with
//! bounded retry, and the identity operations of families that have them.
//!
//! Every operation follows the same shape: write the opcode, sleep the
//! command's settle delay, then (for commands with a response) read the
//! checksummed wire buffer and strip its checksums. Callers serialize bus
//! access around whole operations; this type assumes it has the bus to itself
//! while a call is in flight.

use std::thread;

use airmon_protocol::{wire, Command, DeviceProfile, ProtocolError};
use tracing::debug;

use crate::transport::SensorBus;

/// Measurement mode, driven by the start/stop commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Powered but not sampling.
    Idle,
    /// Periodically producing measurement frames.
    Measuring,
}

/// Identity block read from a device that supports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Product name string.
    pub product_name: String,
    /// Serial number string.
    pub serial_number: String,
    /// Firmware version byte.
    pub firmware_version: u8,
}

/// One sensor on the bus, driven through its family profile.
pub struct SensorDevice {
    profile: &'static DeviceProfile,
    bus: Box<dyn SensorBus>,
    mode: Mode,
}

impl SensorDevice {
    /// Bind a profile to an open bus handle. The device starts out idle.
    pub fn new(profile: &'static DeviceProfile, bus: Box<dyn SensorBus>) -> Self {
        SensorDevice { profile, bus, mode: Mode::Idle }
    }

    /// The family profile this device is driven through.
    pub fn profile(&self) -> &'static DeviceProfile {
        self.profile
    }

    /// Current measurement mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Write a command and sleep its settle delay. No response is read.
    fn issue(&mut self, command: Command) -> Result<(), ProtocolError> {
        self.bus.write(&command.encode())?;
        thread::sleep(command.settle);
        Ok(())
    }

    /// Issue a command and read back `plain_len` plain bytes, validating and
    /// stripping the interleaved checksums.
    fn transact(&mut self, command: Command, plain_len: u16) -> Result<Vec<u8>, ProtocolError> {
        // Reject a bad length before any bus traffic.
        let wire_len = wire::wire_len(plain_len)?;
        self.issue(command)?;
        let raw = self.bus.read(wire_len)?;
        wire::decode_checked(&raw, plain_len)
    }

    /// Enter measurement mode. The command has no validated response.
    pub fn start_measurement(&mut self) -> Result<(), ProtocolError> {
        self.issue(self.profile.start)?;
        self.mode = Mode::Measuring;
        Ok(())
    }

    /// Return to idle mode.
    pub fn stop_measurement(&mut self) -> Result<(), ProtocolError> {
        self.issue(self.profile.stop)?;
        self.mode = Mode::Idle;
        Ok(())
    }

    /// Ask the device whether a measurement frame is ready to read.
    ///
    /// The answer is one checksummed word; the low byte is nonzero when data
    /// is available.
    pub fn poll_ready(&mut self) -> Result<bool, ProtocolError> {
        let plain = self.transact(self.profile.data_ready, 2)?;
        Ok(plain[1] != 0)
    }

    /// Read and decode one measurement frame.
    ///
    /// A checksum mismatch retries the whole write + settle + read sequence,
    /// up to the family's retry budget; any other error propagates
    /// immediately. Fields whose raw value matches their invalid sentinel
    /// decode to NaN.
    pub fn read_sample(&mut self) -> Result<Vec<f64>, ProtocolError> {
        let plain_len = self.profile.plain_len();
        let mut retries_left = self.profile.retry_budget;
        loop {
            match self.transact(self.profile.read_values, plain_len) {
                Ok(plain) => return self.profile.decode_sample(&plain),
                Err(e) if e.is_retryable() && retries_left > 0 => {
                    retries_left -= 1;
                    debug!(
                        device = self.profile.name,
                        retries_left, "checksum failure reading sample, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read the identity block, for families that expose one.
    pub fn describe(&mut self) -> Result<Option<DeviceIdentity>, ProtocolError> {
        let Some(identity) = self.profile.identity else {
            return Ok(None);
        };
        let name = self.read_string(identity.read_name, identity.string_len)?;
        let serial = self.read_string(identity.read_serial, identity.string_len)?;
        let firmware = self.transact(identity.read_firmware, 2)?;
        Ok(Some(DeviceIdentity {
            product_name: name,
            serial_number: serial,
            firmware_version: firmware[0],
        }))
    }

    /// Software-reset the device, when the family supports it.
    ///
    /// Returns whether a reset was actually issued. Resets leave the device
    /// idle, as after a power cycle.
    pub fn reset(&mut self) -> Result<bool, ProtocolError> {
        let Some(identity) = self.profile.identity else {
            return Ok(false);
        };
        self.issue(identity.reset)?;
        self.mode = Mode::Idle;
        Ok(true)
    }

    fn read_string(&mut self, command: Command, plain_len: u16) -> Result<String, ProtocolError> {
        let wire_len = wire::wire_len(plain_len)?;
        self.issue(command)?;
        let raw = self.bus.read(wire_len)?;
        wire::decode_string(&raw, plain_len)
    }
}
