//! MQTT publish collaborator.
//!
//! The daemon publishes at QoS 1 and treats a publish as complete only when
//! the broker's acknowledgment comes back. rumqttc surfaces acknowledgments on
//! its connection event stream, so a small event thread pumps the connection
//! and forwards the interesting events over a channel; [`Publisher::publish`]
//! blocks on that channel until the matching ack arrives or a bounded timeout
//! expires.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use rumqttc::{Client, Event, MqttOptions, Outgoing, Packet, QoS};
use thiserror::Error;
use tracing::{debug, warn};

/// How long to wait for a delivery acknowledgment before giving up.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for the initial broker handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Broker keep-alive interval.
const KEEP_ALIVE: Duration = Duration::from_secs(20);

/// Publish-path failures. All of these are fatal to the session.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The client rejected the publish request outright.
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// The broker connection failed or was lost.
    #[error("mqtt connection error: {0}")]
    Connection(String),

    /// The broker never confirmed the connection.
    #[error("broker handshake timed out")]
    ConnectTimeout,

    /// No acknowledgment arrived within [`ACK_TIMEOUT`].
    #[error("timed out waiting for delivery acknowledgment")]
    AckTimeout,

    /// The connection event stream ended before the ack arrived.
    #[error("connection closed before delivery was acknowledged")]
    ConnectionClosed,
}

/// Blocking publish boundary, mockable for tests.
pub trait Publisher: Send {
    /// Publish one payload and block until delivery is acknowledged.
    fn publish(&mut self, payload: &[u8]) -> Result<(), PublishError>;

    /// Best-effort disconnect. Further publishes are undefined.
    fn disconnect(&mut self);
}

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker hostname.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Client identifier.
    pub client_id: String,
    /// Topic the readings are published to.
    pub topic: String,
}

/// Events the connection pump forwards to the publishing thread.
enum AckEvent {
    Connected,
    Sent(u16),
    Acked(u16),
    ConnectionLost(String),
}

/// MQTT publisher with blocking delivery acknowledgment.
pub struct MqttPublisher {
    client: Client,
    topic: String,
    events: Receiver<AckEvent>,
}

impl MqttPublisher {
    /// Connect to the broker, blocking until the handshake completes.
    pub fn connect(config: &MqttConfig) -> Result<Self, PublishError> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);

        let (client, mut connection) = Client::new(options, 10);
        let (tx, events) = unbounded();

        thread::spawn(move || {
            for event in connection.iter() {
                let forward = match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        debug!("broker connection established");
                        Some(AckEvent::Connected)
                    }
                    Ok(Event::Outgoing(Outgoing::Publish(pkid))) => Some(AckEvent::Sent(pkid)),
                    Ok(Event::Incoming(Packet::PubAck(ack))) => Some(AckEvent::Acked(ack.pkid)),
                    Ok(_) => None,
                    Err(e) => {
                        warn!("broker connection lost: {e}");
                        Some(AckEvent::ConnectionLost(e.to_string()))
                    }
                };
                let lost = matches!(forward, Some(AckEvent::ConnectionLost(_)));
                if let Some(ev) = forward {
                    if tx.send(ev).is_err() {
                        break;
                    }
                }
                if lost {
                    // Back off before rumqttc's automatic reconnect attempt.
                    thread::sleep(Duration::from_secs(1));
                }
            }
        });

        let publisher = MqttPublisher { client, topic: config.topic.clone(), events };
        publisher.await_connected()?;
        Ok(publisher)
    }

    fn await_connected(&self) -> Result<(), PublishError> {
        let deadline = Instant::now() + CONNECT_TIMEOUT;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or(PublishError::ConnectTimeout)?;
            match self.events.recv_timeout(remaining) {
                Ok(AckEvent::Connected) => return Ok(()),
                Ok(AckEvent::ConnectionLost(reason)) => {
                    return Err(PublishError::Connection(reason))
                }
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => return Err(PublishError::ConnectTimeout),
                Err(RecvTimeoutError::Disconnected) => return Err(PublishError::ConnectionClosed),
            }
        }
    }
}

impl Publisher for MqttPublisher {
    fn publish(&mut self, payload: &[u8]) -> Result<(), PublishError> {
        self.client
            .publish(self.topic.as_str(), QoS::AtLeastOnce, false, payload.to_vec())?;

        // Wait for the pkid assignment, then its acknowledgment.
        let deadline = Instant::now() + ACK_TIMEOUT;
        let mut pkid = None;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or(PublishError::AckTimeout)?;
            match self.events.recv_timeout(remaining) {
                Ok(AckEvent::Sent(id)) if pkid.is_none() => pkid = Some(id),
                Ok(AckEvent::Acked(id)) if pkid == Some(id) => return Ok(()),
                Ok(AckEvent::Connected) | Ok(AckEvent::Sent(_)) | Ok(AckEvent::Acked(_)) => {
                    continue
                }
                Ok(AckEvent::ConnectionLost(reason)) => {
                    return Err(PublishError::Connection(reason))
                }
                Err(RecvTimeoutError::Timeout) => return Err(PublishError::AckTimeout),
                Err(RecvTimeoutError::Disconnected) => return Err(PublishError::ConnectionClosed),
            }
        }
    }

    fn disconnect(&mut self) {
        if let Err(e) = self.client.disconnect() {
            warn!("failed to disconnect from broker: {e}");
        }
    }
}
