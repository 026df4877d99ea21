//! Global input hooks: emergency-stop key and click observation.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use rdev::{listen, Event, EventType, Key};
use simclick_core::MouseButton;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Poll interval for the hold-duration watcher.
const WATCH_TICK: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
enum KeyEdge {
    Pressed,
    Released,
}

/// Handle to the emergency-stop watcher.
///
/// Dropping or stopping the handle ends the watcher thread. The rdev
/// listener thread cannot be joined because `listen` blocks; it is
/// detached and its sends go nowhere once the watcher is gone.
pub struct EmergencyWatcher {
    stopped: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl EmergencyWatcher {
    pub fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.watcher.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EmergencyWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Watch for the Escape key being held for `hold` and invoke
/// `on_trigger` once per continuous hold.
pub fn watch_emergency_key<F>(hold: Duration, on_trigger: F) -> EmergencyWatcher
where
    F: Fn() + Send + 'static,
{
    let (edge_tx, edge_rx): (Sender<KeyEdge>, Receiver<KeyEdge>) = bounded(64);
    let stopped = Arc::new(AtomicBool::new(false));

    // rdev::listen never returns on success, so the hook thread is
    // detached rather than joined.
    thread::spawn(move || {
        info!("emergency key hook thread started");
        let callback = move |event: Event| {
            let edge = match event.event_type {
                EventType::KeyPress(Key::Escape) => Some(KeyEdge::Pressed),
                EventType::KeyRelease(Key::Escape) => Some(KeyEdge::Released),
                _ => None,
            };
            if let Some(edge) = edge {
                let _ = edge_tx.try_send(edge);
            }
        };
        if let Err(e) = listen(callback) {
            error!(?e, "emergency key hook failed");
        }
    });

    let watcher_stopped = stopped.clone();
    let watcher = thread::spawn(move || {
        let mut pressed_since: Option<Instant> = None;
        let mut fired = false;
        while !watcher_stopped.load(Ordering::SeqCst) {
            match edge_rx.recv_timeout(WATCH_TICK) {
                Ok(KeyEdge::Pressed) => {
                    if pressed_since.is_none() {
                        pressed_since = Some(Instant::now());
                        fired = false;
                    }
                }
                Ok(KeyEdge::Released) => {
                    pressed_since = None;
                    fired = false;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("emergency key hook channel disconnected");
                    break;
                }
            }
            if let Some(since) = pressed_since {
                if !fired && since.elapsed() >= hold {
                    warn!(held_ms = hold.as_millis() as u64, "emergency stop key held");
                    on_trigger();
                    fired = true;
                }
            }
        }
    });

    EmergencyWatcher {
        stopped,
        watcher: Some(watcher),
    }
}

/// Handle to the click watcher used during macro recording.
pub struct ClickWatcher {
    enabled: Arc<AtomicBool>,
}

impl ClickWatcher {
    pub fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }
}

impl Drop for ClickWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Observe physical mouse button presses and report them through
/// `on_click` until the returned watcher is stopped.
pub fn watch_clicks<F>(on_click: F) -> ClickWatcher
where
    F: Fn(MouseButton) + Send + 'static,
{
    let enabled = Arc::new(AtomicBool::new(true));
    let hook_enabled = enabled.clone();

    thread::spawn(move || {
        info!("click hook thread started");
        let callback = move |event: Event| {
            if !hook_enabled.load(Ordering::SeqCst) {
                return;
            }
            if let EventType::ButtonPress(button) = event.event_type {
                if let Some(button) = from_rdev(button) {
                    on_click(button);
                }
            }
        };
        if let Err(e) = listen(callback) {
            error!(?e, "click hook failed");
        }
    });

    ClickWatcher { enabled }
}

fn from_rdev(button: rdev::Button) -> Option<MouseButton> {
    match button {
        rdev::Button::Left => Some(MouseButton::Left),
        rdev::Button::Right => Some(MouseButton::Right),
        rdev::Button::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rdev_button_mapping() {
        assert_eq!(from_rdev(rdev::Button::Left), Some(MouseButton::Left));
        assert_eq!(from_rdev(rdev::Button::Right), Some(MouseButton::Right));
        assert_eq!(from_rdev(rdev::Button::Middle), Some(MouseButton::Middle));
        assert_eq!(from_rdev(rdev::Button::Unknown(8)), None);
    }
}
