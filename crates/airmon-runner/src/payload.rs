//! JSON payload for the publish cycle.
//!
//! The aggregated frame has a fixed layout: the SEN55's eight fields first,
//! then the SCD40's three. The payload mirrors that layout with the field
//! names subscribers key on. JSON has no NaN, so fields without a valid
//! reading serialize as `null`.

use airmon_protocol::profile::{SCD40_WORD_COUNT, SEN55_WORD_COUNT};
use serde::Serialize;

/// Frame slot where the SEN55's fields start.
pub const SEN55_OFFSET: usize = 0;

/// Frame slot where the SCD40's fields start.
pub const SCD40_OFFSET: usize = SEN55_WORD_COUNT;

/// Total slots in the aggregated frame.
pub const FRAME_LEN: usize = SEN55_WORD_COUNT + SCD40_WORD_COUNT;

/// One publish cycle's readings, serialized in a fixed field order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingPayload {
    #[serde(rename = "Mass Concentration PM1.0")]
    pm1_0: Option<f64>,
    #[serde(rename = "Mass Concentration PM2.5")]
    pm2_5: Option<f64>,
    #[serde(rename = "Mass Concentration PM4.0")]
    pm4_0: Option<f64>,
    #[serde(rename = "Mass Concentration PM10")]
    pm10: Option<f64>,
    #[serde(rename = "Ambient Humidity")]
    humidity: Option<f64>,
    #[serde(rename = "Ambient Temperature")]
    temperature: Option<f64>,
    #[serde(rename = "VOC Index")]
    voc_index: Option<f64>,
    #[serde(rename = "NOx Index")]
    nox_index: Option<f64>,
    #[serde(rename = "CO2")]
    co2: Option<f64>,
    #[serde(rename = "CO2 Temperature")]
    co2_temperature: Option<f64>,
    #[serde(rename = "CO2 Humidity")]
    co2_humidity: Option<f64>,
}

impl ReadingPayload {
    /// Build a payload from the aggregated frame.
    pub fn from_frame(frame: &[f64; FRAME_LEN]) -> Self {
        ReadingPayload {
            pm1_0: reading(frame[SEN55_OFFSET]),
            pm2_5: reading(frame[SEN55_OFFSET + 1]),
            pm4_0: reading(frame[SEN55_OFFSET + 2]),
            pm10: reading(frame[SEN55_OFFSET + 3]),
            humidity: reading(frame[SEN55_OFFSET + 4]),
            temperature: reading(frame[SEN55_OFFSET + 5]),
            voc_index: reading(frame[SEN55_OFFSET + 6]),
            nox_index: reading(frame[SEN55_OFFSET + 7]),
            co2: reading(frame[SCD40_OFFSET]),
            co2_temperature: reading(frame[SCD40_OFFSET + 1]),
            co2_humidity: reading(frame[SCD40_OFFSET + 2]),
        }
    }

    /// Serialize to the JSON object subscribers receive.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// NaN marks "no valid reading" and has no JSON representation; map it to
/// None so it serializes as `null`.
fn reading(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}
