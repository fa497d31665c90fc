//! Latchkey panel node binary.
//!
//! Reads keys from stdin (each line is an entry followed by the confirm key)
//! and draws the display on stdout.
//!
//! # Usage
//!
//! ```bash
//! # Real UART (build with --features serial)
//! latchkey-panel --port /dev/ttyUSB1
//!
//! # Link bridged over TCP; the panel listens, the control node connects
//! latchkey-panel --port tcp://0.0.0.0:7000
//! ```

use std::time::Duration;

use clap::Parser;
use latchkey_core::{
    IntervalTimer, PacingConfig, SerialLink, StreamLink, SystemEnv, TimerChannel, TimingConfig,
    TokioTickSource, WaitConfig,
};
use latchkey_panel::{
    PanelConfig, PanelHardware, PanelNode, PanelRuntime, TerminalDisplay, TerminalKeypad,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Latchkey panel node
#[derive(Parser, Debug)]
#[command(name = "latchkey-panel")]
#[command(about = "Door lock panel node: keypad and display")]
#[command(version)]
struct Args {
    /// Serial device, or tcp://addr:port to accept a bridged link
    #[arg(short, long)]
    port: String,

    /// Baud rate (8N1)
    #[arg(long, default_value = "9600")]
    baud: u32,

    /// Tick period in microseconds
    #[arg(long, default_value_t = TimingConfig::TICK_PERIOD.as_micros() as u64)]
    tick_us: u64,

    /// Door duration mirrored on the display, in ticks
    #[arg(long, default_value_t = TimingConfig::DOOR_TICKS)]
    door_ticks: u32,

    /// Delay after each transmitted digit, in milliseconds
    #[arg(long, default_value = "50")]
    digit_gap_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

async fn open_link(args: &Args) -> Result<Box<dyn SerialLink>, Box<dyn std::error::Error>> {
    if let Some(address) = args.port.strip_prefix("tcp://") {
        let listener = tokio::net::TcpListener::bind(address).await?;
        tracing::info!(address, "waiting for control node");
        let (stream, peer) = listener.accept().await?;
        tracing::info!(%peer, "control node connected");
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

    // Logs go to stderr; stdout is the display.
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    tracing::info!("Latchkey panel starting");

    let link = open_link(&args).await?;
    let timer = IntervalTimer::new(
        TokioTickSource::new(Duration::from_micros(args.tick_us)),
        TimerChannel::Timer2,
    );
    let node = PanelNode::new(PanelConfig { door_ticks: args.door_ticks, ..PanelConfig::default() });
    let hardware = PanelHardware {
        keypad: Box::new(TerminalKeypad::new(tokio::io::stdin())),
        display: Box::new(TerminalDisplay::new(std::io::stdout())),
    };
    let pacing = PacingConfig { digit_gap: Duration::from_millis(args.digit_gap_ms) };

    PanelRuntime::new(node, SystemEnv::new(), link, timer, hardware, pacing, WaitConfig::default())
        .run()
        .await?;

    Ok(())
}
