//! Fixed-period control loop: read → filter → limit → publish → actuate.
//!
//! ## Tick
//! 1. Snapshot target and current position from [`SharedPosition`].
//! 2. Per axis, run the feedback filter and limit the step to `max_speed`.
//! 3. Clamp to the axis travel range and publish the new current position.
//! 4. Map each axis to a pulse width and write it to the driver. This runs
//!    after the position is published; a failed write is counted, logged
//!    and otherwise ignored.
//!
//! ## Pacing
//! The loop sleeps until absolute tick boundaries (`start + n * period`).
//! With the `rt` feature the boundaries are `CLOCK_MONOTONIC` timestamps
//! waited on with `clock_nanosleep(TIMER_ABSTIME)`; otherwise they are
//! offsets from an `Instant` and the loop uses `thread::sleep`.
//! When a tick overruns, the boundaries it missed are dropped and the loop
//! realigns to the next future boundary; ticks never run back to back to
//! catch up.
//!
//! ## RT Setup
//! With the `rt` feature the loop thread locks its memory, pins itself to a
//! CPU core and switches to `SCHED_FIFO` before the first tick. Without the
//! feature every step is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pantilt_common::config::ConfigError;
use pantilt_common::position::{Axis, PanTilt};
use pantilt_common::servo::driver::ServoDriver;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::config::ControllerConfig;
use crate::control::filter::FeedbackFilter;
use crate::control::pulse::angle_to_pulse;
use crate::control::slew::advance;
use crate::state::SharedPosition;

/// Ticks between periodic `debug!` summaries.
const SUMMARY_INTERVAL: u64 = 1000;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-tick timing and fault counters.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total ticks executed.
    pub cycle_count: u64,
    /// Last tick duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum tick duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum tick duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Ticks that ran past their next boundary.
    pub overruns: u64,
    /// Tick boundaries dropped because of overruns.
    pub skipped_ticks: u64,
    /// Failed driver writes.
    pub hardware_errors: u64,
    /// Maximum wake-up latency [ns] (time between boundary and actual wake).
    pub max_latency_ns: i64,
}

impl CycleStats {
    /// Create a new zeroed stats instance.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            skipped_ticks: 0,
            hardware_errors: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a tick duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average tick duration [ns] (0 if no ticks).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Rate limit for repeated warnings: the first 10, then every 1000th.
#[inline]
fn should_log(count: u64) -> bool {
    count <= 10 || count % 1000 == 0
}

fn nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Errors while arming the control loop.
#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    /// The loop thread could not be created.
    #[error("failed to spawn control loop thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The loop thread ended before reporting that it was armed.
    #[error("control loop thread exited during startup")]
    Exited,

    /// The monotonic clock could not be read.
    #[error("clock error: {0}")]
    Clock(String),
}

/// Scheduling options for the loop thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtOptions {
    /// CPU core to pin the loop thread to.
    pub cpu_core: usize,
    /// `SCHED_FIFO` priority.
    pub priority: i32,
}

impl Default for RtOptions {
    fn default() -> Self {
        Self {
            cpu_core: 1,
            priority: 80,
        }
    }
}

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: pid 0 is the calling thread; `param` outlives the call.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Lock memory, pin and prioritize the calling thread.
///
/// All steps are no-ops without the `rt` feature.
pub fn rt_setup(options: RtOptions) -> Result<(), CycleError> {
    rt_mlockall()?;
    rt_set_affinity(options.cpu_core)?;
    rt_set_scheduler(options.priority)?;
    Ok(())
}

// ─── Pacing ─────────────────────────────────────────────────────────

/// Monotonic timestamps and absolute sleeps for tick boundaries.
#[cfg(feature = "rt")]
struct Pacer;

#[cfg(feature = "rt")]
impl Pacer {
    fn new() -> Self {
        Self
    }

    /// Current `CLOCK_MONOTONIC` time.
    fn now(&self) -> Result<Duration, CycleError> {
        use nix::time::{ClockId, clock_gettime};

        clock_gettime(ClockId::CLOCK_MONOTONIC)
            .map(Duration::from)
            .map_err(|e| CycleError::Clock(format!("clock_gettime: {e}")))
    }

    /// Sleep until `deadline` on `CLOCK_MONOTONIC`.
    fn sleep_until(&self, deadline: Duration) {
        use nix::sys::time::TimeSpec;
        use nix::time::{ClockId, ClockNanosleepFlags, clock_nanosleep};

        let wake = TimeSpec::from_duration(deadline);
        // EINTR only shortens the sleep; the next tick re-checks the deadline.
        let _ = clock_nanosleep(
            ClockId::CLOCK_MONOTONIC,
            ClockNanosleepFlags::TIMER_ABSTIME,
            &wake,
        );
    }
}

/// Timestamps relative to the loop start.
#[cfg(not(feature = "rt"))]
struct Pacer {
    origin: std::time::Instant,
}

#[cfg(not(feature = "rt"))]
impl Pacer {
    fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }

    fn now(&self) -> Result<Duration, CycleError> {
        Ok(self.origin.elapsed())
    }

    fn sleep_until(&self, deadline: Duration) {
        if let Some(remaining) = deadline.checked_sub(self.origin.elapsed()) {
            thread::sleep(remaining);
        }
    }
}

// ─── Control Loop ───────────────────────────────────────────────────

/// One controlled axis: filter plus its output channel and travel range.
#[derive(Debug)]
struct AxisLoop {
    axis: Axis,
    channel: u8,
    min_angle: f64,
    max_angle: f64,
    filter: FeedbackFilter,
}

/// The fixed-period controller. Owns the filters and the servo driver.
pub struct ControlLoop {
    shared: Arc<SharedPosition>,
    axes: [AxisLoop; 2],
    max_speed: f64,
    cycle_time: Duration,
    driver: Box<dyn ServoDriver>,
    stats: CycleStats,
}

impl ControlLoop {
    /// Build the loop from a configuration and an initialized driver.
    ///
    /// # Errors
    /// `ConfigError::ValidationError` if the configuration does not validate
    /// or a filter cannot be constructed.
    pub fn new(
        config: &ControllerConfig,
        shared: Arc<SharedPosition>,
        driver: Box<dyn ServoDriver>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let build = |axis: Axis| -> Result<AxisLoop, ConfigError> {
            let a = config.axes.get(axis);
            Ok(AxisLoop {
                axis,
                channel: a.channel_for(axis),
                min_angle: a.min_angle,
                max_angle: a.max_angle,
                filter: FeedbackFilter::new(config.filter_params(axis))?,
            })
        };
        let axes = [build(Axis::Pan)?, build(Axis::Tilt)?];

        debug!(
            "Control loop built: period={}ms, max_speed={}, pan->ch{}, tilt->ch{}, driver={} v{}",
            config.control.cycle_time_ms,
            config.control.max_speed,
            axes[0].channel,
            axes[1].channel,
            driver.name(),
            driver.version()
        );

        Ok(Self {
            shared,
            axes,
            max_speed: config.control.max_speed,
            cycle_time: config.control.cycle_time(),
            driver,
            stats: CycleStats::new(),
        })
    }

    /// Tick period.
    pub fn cycle_time(&self) -> Duration {
        self.cycle_time
    }

    /// Timing and fault counters so far.
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Shared position handle this loop publishes to.
    pub fn shared(&self) -> &Arc<SharedPosition> {
        &self.shared
    }

    /// Execute one tick and return the published current position.
    pub fn tick(&mut self) -> PanTilt {
        let target = self.shared.read_target();
        let current = self.shared.get_position();

        let mut next = current;
        for ax in &mut self.axes {
            let now = current.get(ax.axis);
            let delta = ax.filter.update(target.get(ax.axis), now);
            next.set(
                ax.axis,
                advance(now, delta, self.max_speed, ax.min_angle, ax.max_angle),
            );
        }
        self.shared.write_current(next);

        for ax in &self.axes {
            let pulse_us = angle_to_pulse(next.get(ax.axis));
            if let Err(e) = self.driver.set_pulse(ax.channel, pulse_us) {
                self.stats.hardware_errors += 1;
                if should_log(self.stats.hardware_errors) {
                    warn!(
                        "{} write failed (channel {}, {} µs, {} total): {e}",
                        ax.axis, ax.channel, pulse_us, self.stats.hardware_errors
                    );
                }
            }
        }

        trace!(
            "tick: target=({:.2}, {:.2}) current=({:.2}, {:.2})",
            target.pan, target.tilt, next.pan, next.tilt
        );
        next
    }

    /// Run ticks on absolute boundaries until `running` is cleared.
    ///
    /// # Errors
    /// `CycleError::Clock` if the monotonic clock cannot be read.
    pub fn run(&mut self, running: &AtomicBool) -> Result<(), CycleError> {
        let period = self.cycle_time;
        let pacer = Pacer::new();
        let mut next_wake = pacer.now()?;

        info!("Control loop running every {:?}", period);

        while running.load(Ordering::SeqCst) {
            let cycle_start = pacer.now()?;
            let latency = cycle_start.saturating_sub(next_wake);

            self.tick();

            let now = pacer.now()?;
            let elapsed = now.saturating_sub(cycle_start);
            self.stats.record(nanos(elapsed), nanos(latency));

            next_wake += period;
            if now >= next_wake {
                let behind = now - next_wake;
                let missed = u32::try_from(behind.as_nanos() / period.as_nanos().max(1))
                    .unwrap_or(u32::MAX)
                    .saturating_add(1);
                next_wake += period.saturating_mul(missed);
                self.stats.overruns += 1;
                self.stats.skipped_ticks += u64::from(missed);
                if should_log(self.stats.overruns) {
                    warn!(
                        "Tick overrun: {:?} > {:?} period, skipped {} boundaries ({} overruns total)",
                        elapsed, period, missed, self.stats.overruns
                    );
                }
            }

            if self.stats.cycle_count % SUMMARY_INTERVAL == 0 {
                let pos = self.shared.get_position();
                debug!(
                    "ticks={} avg={}ns max={}ns overruns={} hw_errors={} position=({:.2}, {:.2})",
                    self.stats.cycle_count,
                    self.stats.avg_cycle_ns(),
                    self.stats.max_cycle_ns,
                    self.stats.overruns,
                    self.stats.hardware_errors,
                    pos.pan,
                    pos.tilt
                );
            }

            pacer.sleep_until(next_wake);
        }

        info!(
            "Control loop stopped after {} ticks ({} overruns, {} hardware errors)",
            self.stats.cycle_count, self.stats.overruns, self.stats.hardware_errors
        );
        Ok(())
    }

    /// Shut the driver down, logging instead of failing.
    pub fn shutdown_driver(&mut self) {
        match self.driver.shutdown() {
            Ok(()) => info!("Servo driver '{}' shut down", self.driver.name()),
            Err(e) => warn!("Servo driver '{}' shutdown failed: {e}", self.driver.name()),
        }
    }

    /// Move the loop onto its own thread and start ticking.
    ///
    /// Returns once the thread has completed RT setup. The thread runs until
    /// `running` is cleared, shuts the driver down and yields the final stats.
    ///
    /// # Errors
    /// `CycleError` if the thread cannot be created or RT setup fails; the
    /// driver is shut down in both cases where it was reachable.
    pub fn spawn(
        self,
        running: Arc<AtomicBool>,
        rt: RtOptions,
    ) -> Result<JoinHandle<CycleStats>, CycleError> {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), CycleError>>(1);

        let handle = thread::Builder::new()
            .name("control-loop".to_string())
            .spawn(move || {
                let mut control = self;
                match rt_setup(rt) {
                    Ok(()) => {
                        let _ = ready_tx.send(Ok(()));
                        if let Err(e) = control.run(&running) {
                            error!("Control loop aborted: {e}");
                        }
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
                control.shutdown_driver();
                control.stats
            })
            .map_err(CycleError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(
                    "Control loop armed (cpu_core={}, priority={})",
                    rt.cpu_core, rt.priority
                );
                Ok(handle)
            }
            Ok(Err(e)) => {
                error!("Control loop setup failed: {e}");
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CycleError::Exited)
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pantilt_common::position::TargetUpdate;
    use pantilt_hal::{SimulationDriver, SimulationHandle};

    fn sim_loop(config: &ControllerConfig) -> (ControlLoop, SimulationHandle) {
        let mut driver = SimulationDriver::new();
        let handle = driver.handle();
        driver.init(&config.driver).unwrap();
        let shared = Arc::new(SharedPosition::new(config.axes.home()));
        let control = ControlLoop::new(config, shared, Box::new(driver)).unwrap();
        (control, handle)
    }

    #[test]
    fn cycle_stats_basic() {
        let mut stats = CycleStats::new();
        assert_eq!(stats.avg_cycle_ns(), 0);

        stats.record(500_000, 1_000);
        stats.record(600_000, 500);
        assert_eq!(stats.cycle_count, 2);
        assert_eq!(stats.last_cycle_ns, 600_000);
        assert_eq!(stats.min_cycle_ns, 500_000);
        assert_eq!(stats.max_cycle_ns, 600_000);
        assert_eq!(stats.max_latency_ns, 1_000);
        assert_eq!(stats.avg_cycle_ns(), 550_000);
    }

    #[test]
    fn warning_rate_limit() {
        assert!((1..=10).all(should_log));
        assert!(!should_log(11));
        assert!(!should_log(999));
        assert!(should_log(1000));
        assert!(should_log(2000));
    }

    #[test]
    fn rt_setup_no_rt_feature_is_noop() {
        #[cfg(not(feature = "rt"))]
        {
            assert!(rt_setup(RtOptions::default()).is_ok());
        }
    }

    #[test]
    fn idle_tick_holds_home_pulse() {
        let (mut control, sim) = sim_loop(&ControllerConfig::default());
        assert_eq!(control.tick(), PanTilt::default());
        assert_eq!(sim.last_pulse(0), Some(1500));
        assert_eq!(sim.last_pulse(1), Some(1500));
    }

    #[test]
    fn first_tick_moves_one_step() {
        let (mut control, sim) = sim_loop(&ControllerConfig::default());
        control.shared().set_target(TargetUpdate::both(45.0, -45.0));
        let pos = control.tick();
        assert_eq!(pos, PanTilt::new(3.0, -3.0));
        assert_eq!(control.shared().get_position(), pos);
        // 500 + 93 / 180 * 2000 = 1533.3
        assert_eq!(sim.last_pulse(0), Some(1533));
        assert_eq!(sim.last_pulse(1), Some(1466));
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = ControllerConfig::default();
        config.control.max_speed = 0.0;
        let shared = Arc::new(SharedPosition::default());
        let result = ControlLoop::new(&config, shared, Box::new(SimulationDriver::new()));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn run_stops_when_flag_clears() {
        let mut config = ControllerConfig::default();
        config.control.cycle_time_ms = 2;
        let (control, sim) = sim_loop(&config);

        let running = Arc::new(AtomicBool::new(true));
        let handle = control
            .spawn(Arc::clone(&running), RtOptions::default())
            .unwrap();
        thread::sleep(Duration::from_millis(50));
        running.store(false, Ordering::SeqCst);

        let stats = handle.join().unwrap();
        assert!(stats.cycle_count > 0);
        assert!(!sim.is_initialized());
    }

    #[test]
    fn pacer_sleeps_to_absolute_deadline() {
        let pacer = Pacer::new();
        let start = pacer.now().unwrap();
        let deadline = start + Duration::from_millis(5);

        pacer.sleep_until(deadline);
        assert!(pacer.now().unwrap() >= deadline);

        // A deadline already in the past returns at once.
        let before = pacer.now().unwrap();
        pacer.sleep_until(start);
        assert!(pacer.now().unwrap() - before < Duration::from_millis(50));
    }

    #[test]
    fn run_returns_once_flag_is_clear() {
        let (mut control, _sim) = sim_loop(&ControllerConfig::default());
        let running = AtomicBool::new(false);
        assert!(control.run(&running).is_ok());
        assert_eq!(control.stats().cycle_count, 0);
    }
}
