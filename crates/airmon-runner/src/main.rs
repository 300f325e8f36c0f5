//! `airmon`: samples I2C environmental sensors and publishes readings over
//! MQTT.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use airmon_protocol::{commands, DeviceProfile};
use clap::Parser;
use crossbeam_channel::unbounded;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use airmon_runner::aggregator::{Aggregator, DeviceChannel};
use airmon_runner::context::RuntimeContext;
use airmon_runner::device::SensorDevice;
use airmon_runner::payload::{SCD40_OFFSET, SEN55_OFFSET};
use airmon_runner::publish::{MqttConfig, MqttPublisher};
use airmon_runner::transport::I2cBus;
use airmon_runner::worker::{self, WorkerConfig};

/// Bus addresses sampled by the daemon, in frame-layout order.
const DEVICE_ADDRESSES: [u8; 2] = [commands::sen55::ADDRESS, commands::scd40::ADDRESS];

/// Exit code for failures before the session loop starts.
const EXIT_SETUP: u8 = 9;

#[derive(Parser, Debug)]
#[command(name = "airmon", version, about = "Environmental sensor publisher")]
struct Cli {
    /// I2C adapter number (the N in /dev/i2c-N).
    #[arg(long, default_value_t = 1)]
    adapter: u32,

    /// MQTT broker hostname.
    #[arg(long, default_value = "localhost")]
    broker_host: String,

    /// MQTT broker port.
    #[arg(long, default_value_t = 1883)]
    broker_port: u16,

    /// Topic the readings are published to.
    #[arg(long, default_value = "sensors/data")]
    topic: String,

    /// MQTT client identifier.
    #[arg(long, default_value = "sensor_pub")]
    client_id: String,

    /// Seconds between samples on each device.
    #[arg(long, default_value_t = 5)]
    interval_secs: u64,

    /// Append-only diagnostic log file.
    #[arg(long, default_value = "log.txt")]
    log_file: PathBuf,

    /// Software-reset devices that support it before starting measurements.
    #[arg(long)]
    reset_on_start: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_file = match OpenOptions::new().create(true).append(true).open(&cli.log_file) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("could not open log file {}: {e}", cli.log_file.display());
            return ExitCode::from(EXIT_SETUP);
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();

    let publisher = match MqttPublisher::connect(&MqttConfig {
        host: cli.broker_host.clone(),
        port: cli.broker_port,
        client_id: cli.client_id.clone(),
        topic: cli.topic.clone(),
    }) {
        Ok(publisher) => publisher,
        Err(e) => {
            error!("failed to connect to broker: {e}");
            return ExitCode::from(EXIT_SETUP);
        }
    };
    info!(host = %cli.broker_host, port = cli.broker_port, topic = %cli.topic, "broker connected");

    let ctx = RuntimeContext::new();
    {
        let ctx = Arc::clone(&ctx);
        if let Err(e) = ctrlc::set_handler(move || ctx.request_shutdown()) {
            error!("failed to install signal handler: {e}");
            return ExitCode::from(EXIT_SETUP);
        }
    }

    let config = WorkerConfig {
        interval: Duration::from_secs(cli.interval_secs),
        reset_on_start: cli.reset_on_start,
    };

    let mut channels: Vec<DeviceChannel> = Vec::new();
    for address in DEVICE_ADDRESSES {
        let setup = DeviceProfile::for_address(address).and_then(|profile| {
            let bus = I2cBus::open(cli.adapter, profile.address)?;
            Ok((profile, bus))
        });
        let (profile, bus) = match setup {
            Ok(ok) => ok,
            Err(e) => {
                // Device open/config failures are fatal at startup; wind down
                // any worker already running before exiting.
                error!(code = e.code(), "device setup failed for 0x{address:02X}: {e}");
                ctx.request_shutdown();
                for channel in channels {
                    let _ = channel.handle.join();
                }
                return ExitCode::from(e.code() as u8);
            }
        };
        let device = SensorDevice::new(profile, Box::new(bus));
        let (tx, rx) = unbounded();
        let handle = worker::spawn(device, Arc::clone(&ctx), config, tx);
        channels.push(DeviceChannel {
            name: profile.name,
            offset: if address == commands::sen55::ADDRESS { SEN55_OFFSET } else { SCD40_OFFSET },
            word_count: profile.word_count(),
            rx,
            handle,
        });
        info!(device = profile.name, "worker started for address 0x{address:02X}");
    }

    match Aggregator::new(channels, Box::new(publisher), ctx).run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.exit_code(), "session ended with failure: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
