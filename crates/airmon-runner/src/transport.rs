//! Byte-pipe access to the I2C character devices.
//!
//! No protocol knowledge lives here: a [`SensorBus`] moves raw bytes to and
//! from one bus address and reports transfer failures. The Linux
//! implementation sits on `/dev/i2c-N` via the `i2cdev` crate, which performs
//! the open and the slave-address ioctl.

use airmon_protocol::ProtocolError;
use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;

/// Raw byte transfer to a single device address.
///
/// Implementations fail whenever the transferred byte count does not equal the
/// requested count; callers never see a partial transfer.
pub trait SensorBus: Send {
    /// Write all of `bytes` to the device.
    fn write(&mut self, bytes: &[u8]) -> Result<(), ProtocolError>;

    /// Read exactly `count` bytes from the device.
    fn read(&mut self, count: usize) -> Result<Vec<u8>, ProtocolError>;
}

/// An I2C character device bound to one bus address.
///
/// Closing is implicit: dropping the bus closes the file descriptor.
pub struct I2cBus {
    dev: LinuxI2CDevice,
}

impl I2cBus {
    /// Open `/dev/i2c-<adapter>` and bind it to `address`.
    pub fn open(adapter: u32, address: u8) -> Result<Self, ProtocolError> {
        let path = format!("/dev/i2c-{adapter}");
        let dev = LinuxI2CDevice::new(&path, u16::from(address)).map_err(|e| {
            ProtocolError::Init { adapter, address, reason: e.to_string() }
        })?;
        Ok(I2cBus { dev })
    }
}

impl SensorBus for I2cBus {
    fn write(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.dev
            .write(bytes)
            .map_err(|_| ProtocolError::Write { expected: bytes.len(), actual: 0 })
    }

    fn read(&mut self, count: usize) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = vec![0u8; count];
        self.dev
            .read(&mut buf)
            .map_err(|_| ProtocolError::Read { expected: count, actual: 0 })?;
        Ok(buf)
    }
}
