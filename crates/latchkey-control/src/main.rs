//! Latchkey control node binary.
//!
//! # Usage
//!
//! ```bash
//! # Real UART (build with --features serial)
//! latchkey-control --port /dev/ttyUSB0 --eeprom eeprom.bin --sensor /sys/class/gpio/gpio17/value
//!
//! # Link bridged over TCP (e.g. socat pty <-> tcp)
//! latchkey-control --port tcp://127.0.0.1:7000 --eeprom eeprom.bin --sensor sensor.txt
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use latchkey_control::{
    ControlConfig, ControlHardware, ControlNode, ControlRuntime, DriverConfig, FileStorage,
    SysfsSensor, TracingAlarm, TracingMotor,
};
use latchkey_core::{
    CredentialStore, IntervalTimer, MOTOR_SPEED, MemoryStorage, SerialLink, StoreConfig, StreamLink,
    SystemEnv, TimerChannel, TimingConfig, TokioTickSource, WaitConfig,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Latchkey control node
#[derive(Parser, Debug)]
#[command(name = "latchkey-control")]
#[command(about = "Door lock control node: credential store, motor, sensor and alarm")]
#[command(version)]
struct Args {
    /// Serial device, or tcp://host:port for a bridged link
    #[arg(short, long)]
    port: String,

    /// Baud rate (8N1)
    #[arg(long, default_value = "9600")]
    baud: u32,

    /// EEPROM image file; kept in memory if omitted
    #[arg(long)]
    eeprom: Option<PathBuf>,

    /// Intrusion sensor file holding 0 (clear) or 1 (occupied)
    #[arg(long)]
    sensor: PathBuf,

    /// Tick period in microseconds
    #[arg(long, default_value_t = TimingConfig::TICK_PERIOD.as_micros() as u64)]
    tick_us: u64,

    /// Motor run time each way, in ticks
    #[arg(long, default_value_t = TimingConfig::DOOR_TICKS)]
    door_ticks: u32,

    /// Alarm duration, in ticks
    #[arg(long, default_value_t = TimingConfig::ALARM_TICKS)]
    alarm_ticks: u32,

    /// Give up waiting for the sensor after this many polls
    #[arg(long)]
    sensor_max_polls: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

async fn open_link(args: &Args) -> Result<Box<dyn SerialLink>, Box<dyn std::error::Error>> {
    if let Some(address) = args.port.strip_prefix("tcp://") {
        let stream = tokio::net::TcpStream::connect(address).await?;
        tracing::info!(address, "link connected over TCP");
        return Ok(Box::new(StreamLink::new(stream)));
    }
    open_serial(&args.port, args.baud)
}

#[cfg(feature = "serial")]
fn open_serial(path: &str, baud: u32) -> Result<Box<dyn SerialLink>, Box<dyn std::error::Error>> {
    Ok(Box::new(latchkey_core::SerialPortLink::open(path, baud)?))
}

#[cfg(not(feature = "serial"))]
fn open_serial(path: &str, _baud: u32) -> Result<Box<dyn SerialLink>, Box<dyn std::error::Error>> {
    Err(format!("{path}: serial support not compiled in; rebuild with --features serial").into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Latchkey control node starting");

    let env = SystemEnv::new();
    let link = open_link(&args).await?;
    let timer = IntervalTimer::new(
        TokioTickSource::new(Duration::from_micros(args.tick_us)),
        TimerChannel::Timer2,
    );
    let node = ControlNode::new(ControlConfig {
        door_ticks: args.door_ticks,
        alarm_ticks: args.alarm_ticks,
        motor_speed: MOTOR_SPEED,
    });
    let hardware = ControlHardware {
        motor: Box::new(TracingMotor::default()),
        sensor: Box::new(SysfsSensor::new(&args.sensor)),
        alarm: Box::new(TracingAlarm),
    };
    let config = DriverConfig {
        timer_wait: WaitConfig::default(),
        sensor_wait: WaitConfig { max_polls: args.sensor_max_polls, ..WaitConfig::default() },
    };

    match &args.eeprom {
        Some(path) => {
            let storage = FileStorage::open(path, MemoryStorage::DEFAULT_SIZE)?;
            let store = CredentialStore::new(storage, env, StoreConfig::default());
            ControlRuntime::new(node, env, link, store, timer, hardware, config).run().await?;
        },
        None => {
            tracing::warn!("no EEPROM image given, credential will not survive a restart");
            let store = CredentialStore::new(MemoryStorage::default(), env, StoreConfig::default());
            ControlRuntime::new(node, env, link, store, timer, hardware, config).run().await?;
        },
    }

    Ok(())
}
