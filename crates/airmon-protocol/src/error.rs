//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while talking to a sensor over the bus.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A wire word's checksum did not match the received checksum byte.
    /// Recoverable by retrying the transaction, up to the device's budget.
    #[error("checksum mismatch: computed 0x{computed:02X}, received 0x{received:02X}")]
    Checksum {
        /// Checksum computed over the received word.
        computed: u8,
        /// Checksum byte the device sent.
        received: u8,
    },

    /// The caller asked for an odd number of plain bytes. Plain data is always
    /// a whole number of 2-byte words.
    #[error("framing error: expected plain length {0} is not a multiple of the word size")]
    Framing(u16),

    /// The bus transferred fewer bytes than requested on a read.
    #[error("read error: requested {expected} bytes, transferred {actual}")]
    Read {
        /// Bytes requested.
        expected: usize,
        /// Bytes actually transferred.
        actual: usize,
    },

    /// The bus accepted fewer bytes than requested on a write.
    #[error("write error: submitted {expected} bytes, transferred {actual}")]
    Write {
        /// Bytes submitted.
        expected: usize,
        /// Bytes actually transferred.
        actual: usize,
    },

    /// The device could not be opened or bound to its bus address.
    #[error("failed to bind address 0x{address:02X} on adapter {adapter}: {reason}")]
    Init {
        /// I2C adapter number (`/dev/i2c-N`).
        adapter: u32,
        /// Device address on the bus.
        address: u8,
        /// Underlying OS error description.
        reason: String,
    },

    /// A caller-supplied buffer length does not match the device's data layout.
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    Size {
        /// Length the layout requires.
        expected: usize,
        /// Length the caller supplied.
        actual: usize,
    },

    /// No device family is registered at this bus address.
    #[error("unknown device address 0x{0:02X}")]
    Address(u8),
}

impl ProtocolError {
    /// Stable numeric code for log lines and the process exit status.
    pub fn code(&self) -> i32 {
        match self {
            ProtocolError::Checksum { .. } => 1,
            ProtocolError::Framing(_) => 2,
            ProtocolError::Read { .. } => 3,
            ProtocolError::Write { .. } => 4,
            ProtocolError::Init { .. } => 5,
            ProtocolError::Size { .. } => 6,
            ProtocolError::Address(_) => 7,
        }
    }

    /// Whether a failed transaction may be reissued. Only checksum mismatches
    /// are transient; everything else indicates a broken device or config.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProtocolError::Checksum { .. })
    }
}
