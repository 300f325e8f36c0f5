//! Command opcodes and settle delays for the supported sensor families.
//!
//! Every transaction starts with a bare opcode write. The device needs a
//! family- and command-specific settle delay before its response is valid to
//! read; the delay is part of the command definition because issuing the read
//! early returns garbage rather than an error.

use std::time::Duration;

use crate::wire::encode_command;

/// A command opcode paired with its post-write settle delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// 16-bit opcode, written big-endian.
    pub opcode: u16,
    /// How long the device needs before its response is valid.
    pub settle: Duration,
}

impl Command {
    /// Encode for transmission. Commands are unprotected (no checksum).
    pub fn encode(&self) -> [u8; 2] {
        encode_command(self.opcode)
    }
}

/// SEN55 particulate/VOC/NOx sensor command set.
pub mod sen55 {
    use super::Command;
    use std::time::Duration;

    /// Bus address.
    pub const ADDRESS: u8 = 0x69;

    /// Enter measurement mode.
    pub const START_MEASUREMENT: Command =
        Command { opcode: 0x0021, settle: Duration::from_millis(100) };

    /// Return to idle mode.
    pub const STOP_MEASUREMENT: Command =
        Command { opcode: 0x0104, settle: Duration::from_millis(1000) };

    /// Query the data-ready flag.
    pub const DATA_READY: Command =
        Command { opcode: 0x0202, settle: Duration::from_millis(100) };

    /// Read one full measurement frame (8 words).
    pub const READ_VALUES: Command =
        Command { opcode: 0x03C4, settle: Duration::from_millis(20) };

    /// Read the product name string.
    pub const READ_NAME: Command =
        Command { opcode: 0xD014, settle: Duration::from_millis(20) };

    /// Read the serial number string.
    pub const READ_SERIAL: Command =
        Command { opcode: 0xD033, settle: Duration::from_millis(20) };

    /// Read the firmware version.
    pub const READ_FIRMWARE: Command =
        Command { opcode: 0xD100, settle: Duration::from_millis(20) };

    /// Software reset; leaves the device as after a power cycle.
    pub const RESET: Command =
        Command { opcode: 0xD304, settle: Duration::from_millis(200) };
}

/// SCD40 CO2 sensor command set.
pub mod scd40 {
    use super::Command;
    use std::time::Duration;

    /// Bus address.
    pub const ADDRESS: u8 = 0x62;

    /// Enter periodic measurement mode.
    pub const START_MEASUREMENT: Command =
        Command { opcode: 0x21B1, settle: Duration::from_micros(2) };

    /// Return to idle mode.
    pub const STOP_MEASUREMENT: Command =
        Command { opcode: 0x3F86, settle: Duration::from_micros(1000) };

    /// Query the data-ready flag.
    pub const DATA_READY: Command =
        Command { opcode: 0xE4B8, settle: Duration::from_micros(2) };

    /// Read one full measurement frame (3 words).
    pub const READ_VALUES: Command =
        Command { opcode: 0xEC05, settle: Duration::from_micros(2) };
}
