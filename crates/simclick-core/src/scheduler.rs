//! Action scheduler: cancellable execution loop + state machine.

use crate::cancel::{CancelToken, WAIT_SLICE};
use crate::pattern::{jitter_offset, RecoilPattern};
use crate::position::PositionProvider;
use crate::report;
use crate::trigger::{TriggerSensors, TriggerSet};
use crate::{ActionExecutor, ClickMode, CursorTracker, MouseButton, PointerAction, SessionConfig};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Poll interval while a trigger is denying the action. Deliberately short
/// and fixed; trigger gating never consumes the click-count budget.
pub const TRIGGER_POLL: Duration = Duration::from_millis(100);

/// Dwell between pressing and releasing a combo button set.
const COMBO_DWELL: Duration = Duration::from_millis(50);

/// How long `stop` waits for the loop to observe cancellation.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Scheduler state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    /// Idle, waiting for a start.
    Idle,
    /// Executing the action loop.
    Running,
    /// Graceful stop observed, loop winding down.
    Stopping,
    /// Forced stop observed, loop winding down.
    EmergencyStopped,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::Idle
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// `start` while a run is active is rejected, not retried.
    #[error("a run is already active")]
    AlreadyRunning,
    #[error("injection failed: {0}")]
    Injection(String),
}

/// Owns the run loop. One run may be active at a time; `start` snapshots the
/// configuration so later edits never affect an in-flight run.
///
/// The remote server and any local caller go through the same
/// `start`/`stop`/`click_once` entry points; the loop is the only writer of
/// its internal counters.
pub struct Scheduler {
    executor: Arc<dyn ActionExecutor>,
    cursor: Arc<dyn CursorTracker>,
    sensors: Arc<dyn TriggerSensors>,
    token: Arc<CancelToken>,
    state: Arc<Mutex<SchedulerState>>,
    clicks: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
    report_dir: Option<PathBuf>,
}

impl Scheduler {
    pub fn new(
        executor: Arc<dyn ActionExecutor>,
        cursor: Arc<dyn CursorTracker>,
        sensors: Arc<dyn TriggerSensors>,
    ) -> Self {
        Self {
            executor,
            cursor,
            sensors,
            token: Arc::new(CancelToken::new()),
            state: Arc::new(Mutex::new(SchedulerState::Idle)),
            clicks: Arc::new(AtomicU64::new(0)),
            worker: Mutex::new(None),
            report_dir: None,
        }
    }

    /// Directory completion reports are written to.
    pub fn with_report_dir(mut self, dir: PathBuf) -> Self {
        self.report_dir = Some(dir);
        self
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap()
    }

    /// Actions performed by the current (or last) run. Safe to read from any
    /// thread; only the loop writes it.
    pub fn click_count(&self) -> u64 {
        self.clicks.load(Ordering::SeqCst)
    }

    /// Whether the last run ended through the emergency stop.
    pub fn emergency_stopped(&self) -> bool {
        self.token.is_emergency()
    }

    /// Start the loop with an immutable config snapshot. Fails when a run is
    /// already active.
    pub fn start(
        &self,
        config: SessionConfig,
        triggers: TriggerSet,
    ) -> Result<(), SchedulerError> {
        // Arming the token and publishing the worker handle stay inside the
        // same critical section as the Idle -> Running transition: a
        // concurrent stop either observes Idle (no-op) or a fully started
        // run whose cancel it can set and whose handle it can join.
        let mut state = self.state.lock().unwrap();
        if *state != SchedulerState::Idle {
            warn!(state = ?*state, "start rejected, not idle");
            return Err(SchedulerError::AlreadyRunning);
        }
        *state = SchedulerState::Running;
        debug!(old = ?SchedulerState::Idle, new = ?SchedulerState::Running, "state transition");

        self.token.arm();
        self.clicks.store(0, Ordering::SeqCst);

        let worker = Worker {
            executor: self.executor.clone(),
            cursor: self.cursor.clone(),
            sensors: self.sensors.clone(),
            token: self.token.clone(),
            state: self.state.clone(),
            clicks: self.clicks.clone(),
            report_dir: self.report_dir.clone(),
            config,
            triggers,
        };

        let handle = thread::spawn(move || worker.run());
        *self.worker.lock().unwrap() = Some(handle);
        info!("scheduler started");
        Ok(())
    }

    /// Request a graceful stop and wait (bounded) for the loop to exit.
    /// Idempotent; a stop with no active run is a no-op.
    pub fn stop(&self) {
        // Serialized with start through the state lock so a stop can never
        // slip between the Running transition and the token arm.
        let handle = {
            let mut state = self.state.lock().unwrap();
            self.token.cancel();
            if *state == SchedulerState::Running {
                *state = SchedulerState::Stopping;
            }
            self.worker.lock().unwrap().take()
        };
        if let Some(handle) = handle {
            let deadline = Instant::now() + STOP_JOIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(WAIT_SLICE);
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                // The loop re-checks the flags every slice; detach and let it
                // finish on its own.
                warn!("scheduler loop did not exit within the join timeout");
            }
        }
    }

    /// Forced stop: sets the higher-priority flag checked first on every
    /// iteration and within every wait slice.
    pub fn emergency_stop(&self) {
        info!("emergency stop requested");
        self.token.trip_emergency();
    }

    /// One immediate action at the given coordinates, outside any run.
    pub fn click_once(
        &self,
        button: MouseButton,
        x: i32,
        y: i32,
    ) -> Result<(), SchedulerError> {
        self.executor
            .execute(&PointerAction::MoveTo { x, y })
            .map_err(SchedulerError::Injection)?;
        self.executor
            .execute(&PointerAction::Click { button })
            .map_err(SchedulerError::Injection)?;
        Ok(())
    }
}

/// Everything the loop thread owns for one run.
struct Worker {
    executor: Arc<dyn ActionExecutor>,
    cursor: Arc<dyn CursorTracker>,
    sensors: Arc<dyn TriggerSensors>,
    token: Arc<CancelToken>,
    state: Arc<Mutex<SchedulerState>>,
    clicks: Arc<AtomicU64>,
    report_dir: Option<PathBuf>,
    config: SessionConfig,
    triggers: TriggerSet,
}

impl Worker {
    fn run(self) {
        debug!(config = ?self.config, "scheduler loop started");

        let start_pos = self.cursor.position();
        let mut positions = PositionProvider::new(&self.config, start_pos);
        let mut recoil = self
            .config
            .recoil
            .clone()
            .and_then(RecoilPattern::new);
        let mut rng = rand::thread_rng();
        let mut iteration = 0u32;

        loop {
            if self.token.is_cancelled() {
                break;
            }

            // Trigger gate: denied iterations sleep a short fixed poll, not
            // the click interval, and never advance the counter.
            if !self.triggers.is_empty() && !self.triggers.evaluate(self.sensors.as_ref()) {
                self.token.sleep(TRIGGER_POLL);
                continue;
            }

            if let Some(limit) = self.config.click_limit {
                if self.clicks.load(Ordering::SeqCst) >= limit {
                    info!(limit, "click limit reached");
                    break;
                }
            }

            let mut target = positions.next(self.cursor.as_ref());
            if let Some(radius) = self.config.jitter_radius {
                let jitter = jitter_offset(&mut rng, radius);
                target.x += jitter.dx;
                target.y += jitter.dy;
            }

            self.exec(&PointerAction::MoveTo {
                x: target.x,
                y: target.y,
            });
            self.perform_click();

            if let Some(pattern) = recoil.as_mut() {
                let offset = pattern.next();
                self.exec(&PointerAction::MoveRel {
                    dx: offset.dx,
                    dy: offset.dy,
                });
            }

            self.clicks.fetch_add(1, Ordering::SeqCst);

            let delay = match self.config.random_interval {
                Some(range) if range.min_ms <= range.max_ms => {
                    Duration::from_millis(rng.gen_range(range.min_ms..=range.max_ms))
                }
                _ => Duration::from_millis(self.config.interval_ms),
            };
            if !self.token.sleep(delay) {
                break;
            }

            iteration += 1;
            if let Some(total) = self.config.test_loop {
                if iteration >= total {
                    info!(total, "test loop completed");
                    break;
                }
            }
        }

        self.finish();
    }

    /// Execute the configured click mode at the current pointer position.
    fn perform_click(&self) {
        let button = self.config.button;
        match self.config.click_mode {
            ClickMode::Single => match self.config.combo {
                Some(kind) => {
                    let buttons = kind.buttons();
                    for b in buttons {
                        self.exec(&PointerAction::Press { button: b });
                    }
                    thread::sleep(COMBO_DWELL);
                    for b in buttons.iter().rev() {
                        self.exec(&PointerAction::Release { button: *b });
                    }
                }
                None => self.exec(&PointerAction::Click { button }),
            },
            ClickMode::Double => {
                self.exec(&PointerAction::Click { button });
                self.exec(&PointerAction::Click { button });
            }
            ClickMode::Triple => {
                for _ in 0..3 {
                    self.exec(&PointerAction::Click { button });
                }
            }
            ClickMode::Hold => {
                self.exec(&PointerAction::Press { button });
                // Stay cancellable during the hold, but always release.
                self.token.sleep(Duration::from_millis(self.config.hold_ms));
                self.exec(&PointerAction::Release { button });
            }
        }
    }

    /// Injection failures degrade the run (the action is lost) but never
    /// kill the loop.
    fn exec(&self, action: &PointerAction) {
        if let Err(e) = self.executor.execute(action) {
            error!(?action, error = %e, "action execution failed");
        }
    }

    fn finish(self) {
        let emergency = self.token.is_emergency();
        let exit_state = if emergency {
            SchedulerState::EmergencyStopped
        } else {
            SchedulerState::Stopping
        };
        {
            let mut state = self.state.lock().unwrap();
            debug!(old = ?*state, new = ?exit_state, "state transition");
            *state = exit_state;
        }

        let clicks = self.clicks.load(Ordering::SeqCst);
        if self.config.generate_report {
            if let Some(total) = self.config.test_loop.filter(|&n| n > 1) {
                match &self.report_dir {
                    Some(dir) => match report::write_report(dir, &self.config, clicks, total) {
                        Ok(path) => info!(path = %path.display(), "completion report written"),
                        Err(e) => error!(error = %e, "failed to write completion report"),
                    },
                    None => debug!("no report directory configured, skipping report"),
                }
            }
        }

        self.token.cancel();
        {
            let mut state = self.state.lock().unwrap();
            debug!(old = ?*state, new = ?SchedulerState::Idle, "state transition");
            *state = SchedulerState::Idle;
        }
        info!(clicks, emergency, "scheduler loop exited");
    }
}
