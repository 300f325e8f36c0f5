//! Acquisition daemon for I2C environmental sensors.
//!
//! One worker thread per device polls its sensor on a fixed period and pushes
//! decoded samples through a dedicated channel; the aggregator merges the
//! latest sample from every device into a fixed-layout frame and publishes it
//! over MQTT, blocking until the broker acknowledges delivery.
//!
//! ## Architecture
//!
//! - [`transport`]: byte-pipe access to the I2C character devices
//! - [`device`]: per-device protocol driver (mode transitions, polling, retry)
//! - [`worker`]: one sampling thread per device, paced by a periodic timer
//! - [`aggregator`]: merges samples and drives the publish cycle
//! - [`publish`]: MQTT collaborator with blocking delivery acknowledgment
//! - [`context`]: shared bus lock and cooperative shutdown flag

pub mod aggregator;
pub mod context;
pub mod device;
pub mod payload;
pub mod publish;
pub mod transport;
pub mod worker;

pub use aggregator::{Aggregator, DeviceChannel, SessionError};
pub use context::RuntimeContext;
pub use device::{DeviceIdentity, Mode, SensorDevice};
pub use publish::{MqttConfig, MqttPublisher, PublishError, Publisher};
pub use transport::{I2cBus, SensorBus};
pub use worker::{Sample, WorkerConfig, WorkerError};
