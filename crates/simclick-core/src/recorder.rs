//! Macro recording: captures a timestamped move/click sequence.

use crate::{CursorTracker, MouseButton, Point};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Cursor sampling tick while recording.
pub const SAMPLE_TICK: Duration = Duration::from_millis(10);

/// Bounded wait for the sampling thread to hand back its capture.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// One recorded step. `dt` is the delay in seconds relative to the previous
/// record; the first record's `dt` is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MacroAction {
    Move {
        x: i32,
        y: i32,
        #[serde(default)]
        dt: f64,
    },
    Click {
        button: MouseButton,
        #[serde(default)]
        dt: f64,
    },
}

impl MacroAction {
    pub fn dt(&self) -> f64 {
        match self {
            MacroAction::Move { dt, .. } | MacroAction::Click { dt, .. } => *dt,
        }
    }
}

/// Records the pointer on a fixed short tick: whenever the sampled position
/// differs from the last recorded one, a `move` is appended with `dt` set to
/// the elapsed time since the previous record. Clicks observed by an input
/// hook are fed in through [`MacroRecorder::push_click`].
pub struct MacroRecorder {
    recording: Arc<AtomicBool>,
    click_tx: Sender<MouseButton>,
    done_rx: Receiver<Vec<MacroAction>>,
    worker: Option<JoinHandle<()>>,
}

impl MacroRecorder {
    /// Start sampling immediately.
    pub fn start(cursor: Arc<dyn CursorTracker>) -> Self {
        let recording = Arc::new(AtomicBool::new(true));
        let (click_tx, click_rx) = bounded::<MouseButton>(64);
        let (done_tx, done_rx) = bounded(1);

        let flag = recording.clone();
        let worker = thread::spawn(move || {
            sample_loop(cursor.as_ref(), &flag, &click_rx, &done_tx);
        });

        info!("macro recording started");
        Self {
            recording,
            click_tx,
            done_rx,
            worker: Some(worker),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Append a click observed by an external input hook.
    pub fn push_click(&self, button: MouseButton) {
        if self.is_recording() {
            let _ = self.click_tx.try_send(button);
        }
    }

    /// Stop recording and take the captured sequence. Idempotent: a second
    /// call returns an empty sequence.
    pub fn stop(&mut self) -> Vec<MacroAction> {
        self.recording.store(false, Ordering::SeqCst);
        let Some(handle) = self.worker.take() else {
            return Vec::new();
        };
        let actions = match self.done_rx.recv_timeout(STOP_JOIN_TIMEOUT) {
            Ok(actions) => actions,
            Err(_) => {
                warn!("sampling thread did not hand back its capture in time");
                return Vec::new();
            }
        };
        let _ = handle.join();
        info!(count = actions.len(), "macro recording stopped");
        actions
    }
}

impl Drop for MacroRecorder {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.stop();
        }
    }
}

fn sample_loop(
    cursor: &dyn CursorTracker,
    recording: &AtomicBool,
    click_rx: &Receiver<MouseButton>,
    done_tx: &Sender<Vec<MacroAction>>,
) {
    let mut actions = Vec::new();
    let mut last_pos: Option<Point> = None;
    let mut last_event = Instant::now();

    while recording.load(Ordering::SeqCst) {
        while let Ok(button) = click_rx.try_recv() {
            let dt = elapsed_or_zero(&actions, last_event);
            actions.push(MacroAction::Click { button, dt });
            last_event = Instant::now();
        }

        let pos = cursor.position();
        if last_pos != Some(pos) {
            let dt = elapsed_or_zero(&actions, last_event);
            actions.push(MacroAction::Move {
                x: pos.x,
                y: pos.y,
                dt,
            });
            last_pos = Some(pos);
            last_event = Instant::now();
        }

        thread::sleep(SAMPLE_TICK);
    }

    let _ = done_tx.send(actions);
}

fn elapsed_or_zero(actions: &[MacroAction], last_event: Instant) -> f64 {
    if actions.is_empty() {
        0.0
    } else {
        last_event.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedCursor(Mutex<Point>);

    impl CursorTracker for ScriptedCursor {
        fn position(&self) -> Point {
            *self.0.lock().unwrap()
        }
    }

    #[test]
    fn records_only_position_changes() {
        let cursor = Arc::new(ScriptedCursor(Mutex::new(Point::new(10, 10))));
        let mut recorder = MacroRecorder::start(cursor.clone());
        thread::sleep(Duration::from_millis(60));
        *cursor.0.lock().unwrap() = Point::new(20, 20);
        thread::sleep(Duration::from_millis(60));
        let actions = recorder.stop();

        // One record per distinct position, however long it was held.
        let moves: Vec<_> = actions
            .iter()
            .filter_map(|a| match a {
                MacroAction::Move { x, y, .. } => Some(Point::new(*x, *y)),
                _ => None,
            })
            .collect();
        assert_eq!(moves, vec![Point::new(10, 10), Point::new(20, 20)]);
        assert_eq!(actions[0].dt(), 0.0);
        assert!(actions[1].dt() > 0.0);
    }

    #[test]
    fn clicks_are_interleaved() {
        let cursor = Arc::new(ScriptedCursor(Mutex::new(Point::new(5, 5))));
        let mut recorder = MacroRecorder::start(cursor);
        thread::sleep(Duration::from_millis(30));
        recorder.push_click(MouseButton::Left);
        thread::sleep(Duration::from_millis(30));
        let actions = recorder.stop();
        assert!(actions
            .iter()
            .any(|a| matches!(a, MacroAction::Click { button: MouseButton::Left, .. })));
    }

    #[test]
    fn stop_is_idempotent() {
        let cursor = Arc::new(ScriptedCursor(Mutex::new(Point::new(0, 0))));
        let mut recorder = MacroRecorder::start(cursor);
        thread::sleep(Duration::from_millis(30));
        let first = recorder.stop();
        assert!(!first.is_empty());
        assert!(recorder.stop().is_empty());
        assert!(!recorder.is_recording());
    }
}
