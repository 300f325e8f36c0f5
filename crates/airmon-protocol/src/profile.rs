//! Per-family device descriptors.
//!
//! A [`DeviceProfile`] is the immutable description of one sensor family: its
//! bus address, command set, retry budget, and the layout of its measurement
//! frame. Profiles are selected once at configuration time; everything above
//! this crate drives a device purely through its profile instead of
//! re-dispatching on the raw bus address per call.

use crate::commands::{self, Command};
use crate::error::ProtocolError;
use crate::wire::{decode_i16, decode_u16, WORD_SIZE};

/// Raw value marking "no valid reading" in an unsigned field.
pub const INVALID_UNSIGNED: u16 = 0xFFFF;

/// Raw bit pattern marking "no valid reading" in a signed field.
pub const INVALID_SIGNED: u16 = 0x7FFF;

/// Words in a SEN55 measurement frame.
pub const SEN55_WORD_COUNT: usize = 8;

/// Words in an SCD40 measurement frame.
pub const SCD40_WORD_COUNT: usize = 3;

/// Decode convention for one measurement word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Big-endian unsigned 16-bit.
    Unsigned,
    /// Big-endian signed 16-bit (same bits, reinterpreted).
    Signed,
}

/// Layout and conversion of one word in a measurement frame.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Signed/unsigned decode convention.
    pub kind: FieldKind,
    /// Raw bit pattern meaning "no valid reading", if the field has one.
    pub sentinel: Option<u16>,
    /// Conversion from the raw integer value to physical units.
    pub convert: fn(f64) -> f64,
}

impl FieldSpec {
    /// Decode one plain word into its physical value.
    ///
    /// A raw value matching the field's sentinel decodes to NaN; everything
    /// else goes through the conversion formula.
    pub fn decode(&self, word: [u8; 2]) -> f64 {
        let bits = decode_u16(word);
        if self.sentinel == Some(bits) {
            return f64::NAN;
        }
        let raw = match self.kind {
            FieldKind::Unsigned => f64::from(bits),
            FieldKind::Signed => f64::from(decode_i16(word)),
        };
        (self.convert)(raw)
    }
}

/// Identity and administrative commands, for families that expose them.
#[derive(Debug, Clone, Copy)]
pub struct IdentityCommands {
    /// Read the product name string.
    pub read_name: Command,
    /// Read the serial number string.
    pub read_serial: Command,
    /// Read the firmware version.
    pub read_firmware: Command,
    /// Software reset.
    pub reset: Command,
    /// Plain length of the name/serial strings, in bytes.
    pub string_len: u16,
}

/// Immutable descriptor for one sensor family.
#[derive(Debug, Clone, Copy)]
pub struct DeviceProfile {
    /// Family name, for log lines.
    pub name: &'static str,
    /// Address on the I2C bus.
    pub address: u8,
    /// Enter measurement mode.
    pub start: Command,
    /// Return to idle mode.
    pub stop: Command,
    /// Query the data-ready flag.
    pub data_ready: Command,
    /// Read one measurement frame.
    pub read_values: Command,
    /// Identity block, if the family has one.
    pub identity: Option<IdentityCommands>,
    /// Checksum-failure retries allowed after the first read attempt.
    pub retry_budget: u8,
    /// Measurement frame layout, one entry per word.
    pub fields: &'static [FieldSpec],
}

impl DeviceProfile {
    /// Words in one measurement frame.
    pub fn word_count(&self) -> usize {
        self.fields.len()
    }

    /// Plain byte length of one measurement frame.
    pub fn plain_len(&self) -> u16 {
        (self.fields.len() * WORD_SIZE) as u16
    }

    /// Decode a validated plain buffer into physical values, one per field.
    pub fn decode_sample(&self, plain: &[u8]) -> Result<Vec<f64>, ProtocolError> {
        if plain.len() != self.plain_len() as usize {
            return Err(ProtocolError::Size {
                expected: self.plain_len() as usize,
                actual: plain.len(),
            });
        }
        Ok(self
            .fields
            .iter()
            .zip(plain.chunks_exact(WORD_SIZE))
            .map(|(field, word)| field.decode([word[0], word[1]]))
            .collect())
    }

    /// Look up the profile registered at a bus address.
    pub fn for_address(address: u8) -> Result<&'static DeviceProfile, ProtocolError> {
        match address {
            commands::sen55::ADDRESS => Ok(&SEN55),
            commands::scd40::ADDRESS => Ok(&SCD40),
            other => Err(ProtocolError::Address(other)),
        }
    }
}

fn raw(value: f64) -> f64 {
    value
}

fn tenths(raw: f64) -> f64 {
    raw / 10.0
}

fn hundredths(raw: f64) -> f64 {
    raw / 100.0
}

/// Celsius in tenths-of-degree scaling to Fahrenheit.
fn sen55_temperature_f(raw: f64) -> f64 {
    (raw / 200.0) * 1.8 + 32.0
}

fn scd40_temperature_f(raw: f64) -> f64 {
    let celsius = -14.0 + 175.0 * raw / (65536.0 - 1.0);
    celsius * 1.8 + 32.0
}

// Matches the device as observed. Structurally this is not the usual relative
// humidity formula and goes negative for raw readings below 2^16; verify
// against the datasheet before changing it.
fn scd40_humidity(raw: f64) -> f64 {
    100.0 * (raw / 65536.0 - 1.0)
}

static SEN55_FIELDS: [FieldSpec; SEN55_WORD_COUNT] = [
    // Mass concentration PM1.0 / PM2.5 / PM4.0 / PM10, ug/m3
    FieldSpec { kind: FieldKind::Unsigned, sentinel: Some(INVALID_UNSIGNED), convert: tenths },
    FieldSpec { kind: FieldKind::Unsigned, sentinel: Some(INVALID_UNSIGNED), convert: tenths },
    FieldSpec { kind: FieldKind::Unsigned, sentinel: Some(INVALID_UNSIGNED), convert: tenths },
    FieldSpec { kind: FieldKind::Unsigned, sentinel: Some(INVALID_UNSIGNED), convert: tenths },
    // Ambient humidity, %RH
    FieldSpec { kind: FieldKind::Signed, sentinel: Some(INVALID_SIGNED), convert: hundredths },
    // Ambient temperature, degrees Fahrenheit
    FieldSpec {
        kind: FieldKind::Signed,
        sentinel: Some(INVALID_SIGNED),
        convert: sen55_temperature_f,
    },
    // VOC index
    FieldSpec { kind: FieldKind::Signed, sentinel: Some(INVALID_SIGNED), convert: tenths },
    // NOx index
    FieldSpec { kind: FieldKind::Signed, sentinel: Some(INVALID_SIGNED), convert: tenths },
];

static SCD40_FIELDS: [FieldSpec; SCD40_WORD_COUNT] = [
    // CO2 concentration, ppm, unconverted
    FieldSpec { kind: FieldKind::Unsigned, sentinel: None, convert: raw },
    // Temperature, degrees Fahrenheit
    FieldSpec { kind: FieldKind::Signed, sentinel: None, convert: scd40_temperature_f },
    // Humidity
    FieldSpec { kind: FieldKind::Unsigned, sentinel: None, convert: scd40_humidity },
];

/// SEN55 particulate/VOC/NOx sensor.
pub static SEN55: DeviceProfile = DeviceProfile {
    name: "SEN55",
    address: commands::sen55::ADDRESS,
    start: commands::sen55::START_MEASUREMENT,
    stop: commands::sen55::STOP_MEASUREMENT,
    data_ready: commands::sen55::DATA_READY,
    read_values: commands::sen55::READ_VALUES,
    identity: Some(IdentityCommands {
        read_name: commands::sen55::READ_NAME,
        read_serial: commands::sen55::READ_SERIAL,
        read_firmware: commands::sen55::READ_FIRMWARE,
        reset: commands::sen55::RESET,
        string_len: 32,
    }),
    retry_budget: 3,
    fields: &SEN55_FIELDS,
};

/// SCD40 CO2 sensor.
pub static SCD40: DeviceProfile = DeviceProfile {
    name: "SCD40",
    address: commands::scd40::ADDRESS,
    start: commands::scd40::START_MEASUREMENT,
    stop: commands::scd40::STOP_MEASUREMENT,
    data_ready: commands::scd40::DATA_READY,
    read_values: commands::scd40::READ_VALUES,
    identity: None,
    retry_budget: 4,
    fields: &SCD40_FIELDS,
};
