//! # Pan/Tilt Controller
//!
//! Loads the configuration, creates and initializes the servo driver, starts
//! the control loop on its own thread and serves the TCP command channel
//! until Ctrl-C. Any startup failure is fatal (exit code 1).

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use clap::Parser;
use pantilt_common::config::{ConfigError, ConfigLoader, LogLevel};
use pantilt_common::consts::DEFAULT_CONFIG_PATH;
use pantilt_common::servo::driver::ServoDriver;
use pantilt_control::config::ControllerConfig;
use pantilt_control::cycle::{ControlLoop, CycleStats, RtOptions};
use pantilt_control::error::StartupError;
use pantilt_control::server::CommandServer;
use pantilt_control::state::SharedPosition;
use pantilt_hal::DriverRegistry;
use tokio::signal;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Pan/tilt servo controller
#[derive(Parser, Debug)]
#[command(name = "pantilt_control")]
#[command(version)]
#[command(about = "Closed-loop pan/tilt servo controller with a TCP command channel")]
struct Args {
    /// Configuration file. A missing file at the default location falls
    /// back to built-in defaults.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Servo driver to use (overrides `[driver].name`).
    #[arg(short, long, value_name = "NAME")]
    driver: Option<String>,

    /// Use the simulation driver regardless of configuration.
    #[arg(short, long, conflicts_with = "driver")]
    simulate: bool,

    /// Command server address (overrides `[server].bind`).
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// CPU core to pin the control loop to (`rt` builds).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority of the control loop (`rt` builds).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Read before tracing is up so `[shared].log_level` can pick the level.
    let (path, loaded) = read_config(&args);
    let loaded = loaded.map(|mut config| {
        apply_overrides(&mut config, &args);
        config
    });

    let log_level = match &loaded {
        Ok(config) => config.shared.log_level,
        Err(_) if args.verbose => LogLevel::Debug,
        Err(_) => LogLevel::Info,
    };
    setup_tracing(log_level, args.json);

    info!("Pan/tilt controller v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => config,
        Err(ConfigError::FileNotFound) if args.config.is_none() => {
            warn!("No configuration at {}, using defaults", path.display());
            let mut config = ControllerConfig::default();
            apply_overrides(&mut config, &args);
            config
        }
        Err(e) => {
            error!("FATAL: {}: {e}", path.display());
            process::exit(1);
        }
    };

    let rt = RtOptions {
        cpu_core: args.cpu_core,
        priority: args.rt_priority,
    };

    if let Err(e) = run(config, rt).await {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Pan/tilt controller shutdown complete");
}

fn read_config(args: &Args) -> (PathBuf, Result<ControllerConfig, ConfigError>) {
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let loaded = ControllerConfig::load(&path);
    (path, loaded)
}

fn apply_overrides(config: &mut ControllerConfig, args: &Args) {
    if args.simulate {
        config.driver.name = "simulation".to_string();
    } else if let Some(ref name) = args.driver {
        config.driver.name = name.clone();
    }
    if let Some(ref bind) = args.bind {
        config.server.bind = bind.clone();
    }
    if args.verbose {
        config.shared.log_level = LogLevel::Debug;
    }
}

async fn run(config: ControllerConfig, rt: RtOptions) -> Result<(), StartupError> {
    config.validate()?;
    info!(
        "Config OK: cycle_time={}ms, max_speed={}°/tick, driver={}, bind={}",
        config.control.cycle_time_ms,
        config.control.max_speed,
        config.driver.name,
        config.server.bind
    );

    let registry = DriverRegistry::with_builtin();
    let mut driver = registry.create_driver(&config.driver.name).inspect_err(|_| {
        warn!("Available drivers: {}", registry.list_drivers().join(", "));
    })?;
    driver.init(&config.driver)?;

    let shared = Arc::new(SharedPosition::new(config.axes.home()));
    let control = ControlLoop::new(&config, Arc::clone(&shared), driver)?;

    let running = Arc::new(AtomicBool::new(true));
    let loop_handle = control.spawn(Arc::clone(&running), rt)?;

    let server = match CommandServer::bind(&config.server.bind, Arc::clone(&shared)).await {
        Ok(server) => server,
        Err(e) => {
            stop_loop(&running, loop_handle).await;
            return Err(e.into());
        }
    };

    server.serve(shutdown_signal()).await;
    stop_loop(&running, loop_handle).await;
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal (Ctrl+C)"),
        Err(err) => error!("Unable to listen for shutdown signal: {err}"),
    }
}

/// Clear the running flag and wait for the loop thread off the runtime.
async fn stop_loop(running: &AtomicBool, handle: JoinHandle<CycleStats>) {
    running.store(false, Ordering::SeqCst);
    match tokio::task::spawn_blocking(move || handle.join()).await {
        Ok(Ok(stats)) => info!(
            "Loop stats: ticks={}, avg={}ns, max={}ns, overruns={}, skipped={}, hw_errors={}",
            stats.cycle_count,
            stats.avg_cycle_ns(),
            stats.max_cycle_ns,
            stats.overruns,
            stats.skipped_ticks,
            stats.hardware_errors
        ),
        Ok(Err(_)) => error!("Control loop thread panicked"),
        Err(e) => error!("Failed to join control loop thread: {e}"),
    }
}

/// Setup tracing subscriber; `RUST_LOG` directives are added on top.
fn setup_tracing(level: LogLevel, json: bool) {
    let level: Level = level.as_directive().parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
