//! DIH device host binary.
//!
//! Connects to a hub over TCP, registers, and publishes a temperature reading
//! at a fixed rate while registered.
//!
//! # Usage
//!
//! ```bash
//! dih-device --hub 127.0.0.1:7878 --device-id sensor-01
//!
//! # Faster heartbeats, only accept hub data while registered
//! dih-device --hub 127.0.0.1:7878 --heartbeat-interval-ms 2000 --gate-inbound
//! ```

use std::time::Duration;

use clap::Parser;
use dih_core::{Device, Environment, SessionConfig};
use dih_device::{DeviceError, SampleSchedule, SystemEnv, Thermometer, connect};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Records buffered per direction between the session and the socket tasks.
const CHANNEL_CAPACITY: usize = 64;

/// DIH device host
#[derive(Parser, Debug)]
#[command(name = "dih-device")]
#[command(about = "Device Interaction Hub device host")]
#[command(version)]
struct Args {
    /// Hub address
    #[arg(long, default_value = "127.0.0.1:7878")]
    hub: String,

    /// Device identity sent with every message
    #[arg(long, default_value = "dih-device")]
    device_id: String,

    /// Minimum time between registration attempts
    #[arg(long, default_value_t = 5000)]
    retry_interval_ms: u64,

    /// Time between heartbeats while registered
    #[arg(long, default_value_t = 10_000)]
    heartbeat_interval_ms: u64,

    /// How long to wait for a heartbeat ack
    #[arg(long, default_value_t = 5000)]
    heartbeat_timeout_ms: u64,

    /// Longest inbound record accepted, in bytes
    #[arg(long, default_value_t = dih_proto::DEFAULT_MAX_RECORD_LEN)]
    max_record_len: usize,

    /// Session poll period
    #[arg(long, default_value_t = 50)]
    poll_interval_ms: u64,

    /// Time between temperature readings while registered
    #[arg(long, default_value_t = 1000)]
    sample_interval_ms: u64,

    /// Drop hub data and commands unless registered
    #[arg(long)]
    gate_inbound: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            heartbeat_ack_timeout: Duration::from_millis(self.heartbeat_timeout_ms),
            max_record_len: self.max_record_len,
            gate_inbound_on_registration: self.gate_inbound,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    run(args).await?;

    Ok(())
}

async fn run(args: Args) -> Result<(), DeviceError> {
    let config = args.session_config();
    config.validate()?;

    tracing::info!(hub = %args.hub, device_id = %args.device_id, "DIH device starting");

    let (transport, link) =
        connect(&args.hub, config.max_record_len, CHANNEL_CAPACITY).await?;

    let env = SystemEnv::new();
    let mut device = Device::new(&env, transport, config)?;
    device.configure(args.device_id.as_str());
    device.on_data(|payload| tracing::info!(?payload, "data from hub"));
    device.on_command(|payload| tracing::info!(?payload, "command from hub"));

    let mut sensor = Thermometer::default();
    let mut schedule = SampleSchedule::new(Duration::from_millis(args.sample_interval_ms));
    let mut ticker = tokio::time::interval(Duration::from_millis(args.poll_interval_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = env.now();
                device.poll(now);

                if device.is_registered() {
                    if schedule.due(now) {
                        device.send_data("temperature", sensor.sample(&env));
                    }
                } else {
                    schedule.reset();
                }

                if device.transport().is_closed() {
                    tracing::warn!("hub closed the connection");
                    break;
                }
            },
            result = &mut shutdown => {
                if let Err(err) = result {
                    tracing::warn!(%err, "signal handler failed");
                }
                tracing::info!("shutting down");
                device.request_deregister();
                break;
            },
        }
    }

    // The writer flushes once the transport (owned by the device) is gone
    drop(device);
    link.shutdown().await
}
