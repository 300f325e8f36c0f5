//! End-to-end scheduler tests: two workers over scripted devices, a shared
//! bus probe watching for interleaved transactions, and a capturing publisher
//! behind the aggregator.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use airmon_protocol::profile;
use airmon_runner::aggregator::{Aggregator, DeviceChannel};
use airmon_runner::context::RuntimeContext;
use airmon_runner::device::SensorDevice;
use airmon_runner::payload::{SCD40_OFFSET, SEN55_OFFSET};
use airmon_runner::worker::{self, WorkerConfig};
use crossbeam_channel::unbounded;

use common::{BusProbe, MockPublisher, ScriptedBus};

const SEN55_WORDS: [u16; 8] = [123, 456, 789, 1000, 5000, 0x0384, 17, 3];
const SCD40_WORDS: [u16; 3] = [0x0190, 0x6667, 0x8000];

fn spawn_device(
    profile: &'static airmon_protocol::DeviceProfile,
    bus: ScriptedBus,
    ctx: &Arc<RuntimeContext>,
    config: WorkerConfig,
    offset: usize,
) -> DeviceChannel {
    let device = SensorDevice::new(profile, Box::new(bus));
    let (tx, rx) = unbounded();
    let handle = worker::spawn(device, Arc::clone(ctx), config, tx);
    DeviceChannel { name: profile.name, offset, word_count: profile.word_count(), rx, handle }
}

#[test]
fn test_workers_sample_and_aggregator_publishes() {
    let ctx = RuntimeContext::new();
    let probe = Arc::new(BusProbe::default());
    let config = WorkerConfig { interval: Duration::from_millis(50), reset_on_start: false };

    // Delay one device's reads so its transactions span a wide window; if the
    // bus lock ever admitted two holders the probe would see it.
    let sen55_bus = ScriptedBus::new(&profile::SEN55, SEN55_WORDS.to_vec())
        .with_probe(Arc::clone(&probe))
        .with_read_delay(Duration::from_millis(15));
    let scd40_bus =
        ScriptedBus::new(&profile::SCD40, SCD40_WORDS.to_vec()).with_probe(Arc::clone(&probe));

    let channels = vec![
        spawn_device(&profile::SEN55, sen55_bus, &ctx, config, SEN55_OFFSET),
        spawn_device(&profile::SCD40, scd40_bus, &ctx, config, SCD40_OFFSET),
    ];

    let (publisher, payloads, _) = MockPublisher::new();

    {
        let ctx = Arc::clone(&ctx);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(800));
            ctx.request_shutdown();
        });
    }

    let result = Aggregator::new(channels, Box::new(publisher), Arc::clone(&ctx)).run();
    assert!(result.is_ok(), "session failed: {:?}", result.err());

    // The injected delay never produced overlapping transactions.
    assert_eq!(probe.max_holders(), 1);

    let payloads = payloads.lock().unwrap();
    assert!(!payloads.is_empty(), "no frames were published");

    // Every payload is a complete frame: both devices' values are present
    // from the very first publish.
    let first: serde_json::Value = serde_json::from_slice(&payloads[0]).unwrap();
    assert!((first["Ambient Temperature"].as_f64().unwrap() - 40.1).abs() < 1e-9);
    assert!((first["Mass Concentration PM1.0"].as_f64().unwrap() - 12.3).abs() < 1e-9);
    assert_eq!(first["CO2"].as_f64().unwrap(), 400.0);
    assert!((first["CO2 Humidity"].as_f64().unwrap() - (-50.0)).abs() < 1e-9);
}

#[test]
fn test_first_publish_waits_for_both_devices() {
    let ctx = RuntimeContext::new();

    // SCD40 samples fast; SEN55's settle delays make its first sample late.
    // The gate must hold publishing until the slow device reports too.
    let fast = WorkerConfig { interval: Duration::from_millis(10), reset_on_start: false };
    let slow = WorkerConfig { interval: Duration::from_millis(150), reset_on_start: false };

    let channels = vec![
        spawn_device(
            &profile::SEN55,
            ScriptedBus::new(&profile::SEN55, SEN55_WORDS.to_vec()),
            &ctx,
            slow,
            SEN55_OFFSET,
        ),
        spawn_device(
            &profile::SCD40,
            ScriptedBus::new(&profile::SCD40, SCD40_WORDS.to_vec()),
            &ctx,
            fast,
            SCD40_OFFSET,
        ),
    ];

    let (publisher, payloads, _) = MockPublisher::new();

    {
        let ctx = Arc::clone(&ctx);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(900));
            ctx.request_shutdown();
        });
    }

    Aggregator::new(channels, Box::new(publisher), Arc::clone(&ctx)).run().unwrap();

    let payloads = payloads.lock().unwrap();
    assert!(!payloads.is_empty());
    for payload in payloads.iter() {
        let json: serde_json::Value = serde_json::from_slice(payload).unwrap();
        // SEN55 slots are never the zero placeholder in a published frame.
        assert!((json["Ambient Temperature"].as_f64().unwrap() - 40.1).abs() < 1e-9);
    }
}
