//! Shared test doubles: a scripted sensor bus, a bus-contention probe, and a
//! capturing publisher.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use airmon_protocol::{crc8, DeviceProfile, ProtocolError};
use airmon_runner::publish::{PublishError, Publisher};
use airmon_runner::transport::SensorBus;

/// Detects overlapping bus transactions. A worker's transaction spans from
/// the command write to the end of the response read; with the shared bus
/// lock in place `max_holders` can never exceed one.
#[derive(Default)]
pub struct BusProbe {
    holders: AtomicUsize,
    max: AtomicUsize,
}

impl BusProbe {
    pub fn enter(&self) {
        let now = self.holders.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.holders.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_holders(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// Wire-encode plain words, appending a valid checksum to each.
pub fn encode_words(words: &[u16]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(words.len() * 3);
    for word in words {
        let bytes = word.to_be_bytes();
        raw.extend_from_slice(&bytes);
        raw.push(crc8(bytes));
    }
    raw
}

fn string_words(text: &str, plain_len: usize) -> Vec<u16> {
    let mut padded = text.as_bytes().to_vec();
    padded.resize(plain_len, 0);
    padded.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect()
}

/// A healthy device simulator: always reports data ready and answers every
/// command in its profile's catalogue. An optional read delay widens each
/// transaction's window so interleaving would be caught by the probe.
pub struct ScriptedBus {
    profile: &'static DeviceProfile,
    sample_words: Vec<u16>,
    last_opcode: u16,
    probe: Option<Arc<BusProbe>>,
    read_delay: Duration,
}

impl ScriptedBus {
    pub fn new(profile: &'static DeviceProfile, sample_words: Vec<u16>) -> Self {
        assert_eq!(sample_words.len(), profile.word_count());
        ScriptedBus {
            profile,
            sample_words,
            last_opcode: 0,
            probe: None,
            read_delay: Duration::ZERO,
        }
    }

    pub fn with_probe(mut self, probe: Arc<BusProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    fn is_write_only(&self, opcode: u16) -> bool {
        let mut write_only = vec![self.profile.start.opcode, self.profile.stop.opcode];
        if let Some(identity) = self.profile.identity {
            write_only.push(identity.reset.opcode);
        }
        write_only.contains(&opcode)
    }

    fn response_words(&self, opcode: u16) -> Option<Vec<u16>> {
        if opcode == self.profile.data_ready.opcode {
            return Some(vec![0x0001]);
        }
        if opcode == self.profile.read_values.opcode {
            return Some(self.sample_words.clone());
        }
        if let Some(identity) = self.profile.identity {
            let len = identity.string_len as usize;
            if opcode == identity.read_name.opcode {
                return Some(string_words("SEN55-sim", len));
            }
            if opcode == identity.read_serial.opcode {
                return Some(string_words("00F00BA5", len));
            }
            if opcode == identity.read_firmware.opcode {
                return Some(vec![0x0200]);
            }
        }
        None
    }
}

impl SensorBus for ScriptedBus {
    fn write(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        assert_eq!(bytes.len(), 2, "commands are two bytes");
        self.last_opcode = u16::from_be_bytes([bytes[0], bytes[1]]);
        if let Some(probe) = &self.probe {
            probe.enter();
            if self.is_write_only(self.last_opcode) {
                probe.exit();
            }
        }
        Ok(())
    }

    fn read(&mut self, count: usize) -> Result<Vec<u8>, ProtocolError> {
        if !self.read_delay.is_zero() {
            thread::sleep(self.read_delay);
        }
        let result = match self.response_words(self.last_opcode) {
            Some(words) => {
                let raw = encode_words(&words);
                assert_eq!(raw.len(), count, "unexpected read size for 0x{:04X}", self.last_opcode);
                Ok(raw)
            }
            None => Err(ProtocolError::Read { expected: count, actual: 0 }),
        };
        if let Some(probe) = &self.probe {
            probe.exit();
        }
        result
    }
}

/// Captures published payloads; can be told to fail a given publish.
pub struct MockPublisher {
    payloads: Arc<Mutex<Vec<Vec<u8>>>>,
    disconnected: Arc<AtomicBool>,
    fail_at: Option<usize>,
}

impl MockPublisher {
    pub fn new() -> (Self, Arc<Mutex<Vec<Vec<u8>>>>, Arc<AtomicBool>) {
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let disconnected = Arc::new(AtomicBool::new(false));
        let publisher = MockPublisher {
            payloads: Arc::clone(&payloads),
            disconnected: Arc::clone(&disconnected),
            fail_at: None,
        };
        (publisher, payloads, disconnected)
    }

    pub fn fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }
}

impl Publisher for MockPublisher {
    fn publish(&mut self, payload: &[u8]) -> Result<(), PublishError> {
        let mut payloads = self.payloads.lock().unwrap();
        if self.fail_at == Some(payloads.len()) {
            return Err(PublishError::AckTimeout);
        }
        payloads.push(payload.to_vec());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}
