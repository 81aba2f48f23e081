//! Reference sweep client.
//!
//! Connects to a running controller, steps through a fixed set of
//! positions, then traces two circles and returns to center. Every
//! status line the server sends back is logged.

use std::f64::consts::PI;
use std::process;
use std::time::Duration;

use clap::Parser;
use pantilt_common::command::Response;
use pantilt_common::position::TargetUpdate;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::time::sleep;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Circle radius [deg].
const CIRCLE_RADIUS: f64 = 30.0;
/// Angular step between circle points [deg].
const CIRCLE_STEP_DEG: u32 = 5;
/// Two full turns.
const CIRCLE_SWEEP_DEG: u32 = 720;

/// Pan/tilt sweep client
#[derive(Parser, Debug)]
#[command(name = "pantilt_sweep")]
#[command(version)]
#[command(about = "Drive a pan/tilt controller through a test pattern")]
struct Args {
    /// Controller command address.
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Pause between fixed positions [ms].
    #[arg(long, default_value_t = 3000)]
    step_delay_ms: u64,

    /// Pause between circle points [ms].
    #[arg(long, default_value_t = 100)]
    circle_delay_ms: u64,

    /// Skip the circular pattern.
    #[arg(long)]
    no_circle: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,
}

/// Fixed positions visited before the circle.
const WAYPOINTS: [(&str, f64, f64); 10] = [
    ("Center position", 0.0, 0.0),
    ("Pan right", 45.0, 0.0),
    ("Pan left", -45.0, 0.0),
    ("Tilt up", 0.0, 30.0),
    ("Tilt down", 0.0, -30.0),
    ("Upper right", 45.0, 30.0),
    ("Upper left", -45.0, 30.0),
    ("Lower left", -45.0, -30.0),
    ("Lower right", 45.0, -30.0),
    ("Return to center", 0.0, 0.0),
];

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Circle points, rounded to 0.1°.
fn circle_points() -> impl Iterator<Item = TargetUpdate> {
    (0..CIRCLE_SWEEP_DEG)
        .step_by(CIRCLE_STEP_DEG as usize)
        .map(|deg| {
            let rad = f64::from(deg) * PI / 180.0;
            TargetUpdate::both(
                round_tenth(rad.cos() * CIRCLE_RADIUS),
                round_tenth(rad.sin() * CIRCLE_RADIUS),
            )
        })
}

async fn send(writer: &mut OwnedWriteHalf, update: TargetUpdate) -> std::io::Result<()> {
    let mut line = serde_json::to_string(&update)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .compact()
        .init();

    if let Err(e) = run(&args).await {
        error!("FATAL: {e}");
        process::exit(1);
    }
}

async fn run(args: &Args) -> std::io::Result<()> {
    let stream = TcpStream::connect(&args.server).await?;
    info!("Connected to {}", args.server);
    let (reader, mut writer) = stream.into_split();

    let printer = tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match serde_json::from_str::<Response>(&line) {
                Ok(Response::Ok { position }) => {
                    info!("Position: pan={:.1}° tilt={:.1}°", position.pan, position.tilt)
                }
                Ok(Response::Error { message }) => warn!("Error: {message}"),
                Err(e) => warn!("Unreadable response {line:?}: {e}"),
            }
        }
        info!("Disconnected from server");
    });

    let total = WAYPOINTS.len();
    for (i, (desc, pan, tilt)) in WAYPOINTS.into_iter().enumerate() {
        let delay = if i == 0 { 1000 } else { args.step_delay_ms };
        sleep(Duration::from_millis(delay)).await;
        info!("[{}/{total}] {desc}", i + 1);
        send(&mut writer, TargetUpdate::both(pan, tilt)).await?;
    }
    info!("Test sequence complete");

    if !args.no_circle {
        info!("Starting circular pattern");
        for point in circle_points() {
            send(&mut writer, point).await?;
            sleep(Duration::from_millis(args.circle_delay_ms)).await;
        }
        info!("Circular pattern complete, returning to center");
        sleep(Duration::from_secs(1)).await;
        send(&mut writer, TargetUpdate::both(0.0, 0.0)).await?;
    }

    sleep(Duration::from_secs(2)).await;
    writer.shutdown().await?;
    let _ = printer.await;
    Ok(())
}
