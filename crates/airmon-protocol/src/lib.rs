//! Sensirion I2C Sensor Protocol
//!
//! This crate provides types and utilities for the byte-oriented command/response
//! protocol spoken by Sensirion environmental sensors (the SEN55 particulate/VOC
//! sensor and the SCD40 CO2 sensor). The protocol interleaves CRC-8 checksums
//! into the wire format:
//!
//! - **Commands** (host → sensor): a bare 2-byte big-endian opcode, no checksum
//! - **Data** (sensor → host): a sequence of 2-byte big-endian words, each
//!   followed by a 1-byte CRC-8 checksum
//!
//! # Example
//!
//! ```rust,ignore
//! use airmon_protocol::{commands, wire};
//!
//! // Encode a command for transmission
//! let frame = commands::scd40::READ_VALUES.encode();
//!
//! // Validate and strip the checksums from a read buffer
//! let plain = wire::decode_checked(&received, 6)?;
//! ```
//!
//! This crate owns no I/O. The runner crate layers transport access, settle
//! delays, and retry policy on top of it.

pub mod checksum;
pub mod commands;
mod error;
pub mod profile;
pub mod wire;

pub use checksum::{crc8, verify};
pub use commands::Command;
pub use error::ProtocolError;
pub use profile::{DeviceProfile, FieldKind, FieldSpec};
