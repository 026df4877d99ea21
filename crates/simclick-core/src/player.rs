//! Macro playback through the same action primitive the scheduler uses.

use crate::cancel::CancelToken;
use crate::recorder::MacroAction;
use crate::{ActionExecutor, PointerAction};
use std::time::Duration;
use tracing::{error, info};

/// Replay `actions` strictly in order, waiting each record's `dt` before
/// executing it. The wait is sliced and re-checks `token`, so playback stops
/// early when cancelled. Returns how many actions were performed.
pub fn play_macro(
    actions: &[MacroAction],
    executor: &dyn ActionExecutor,
    token: &CancelToken,
) -> usize {
    let mut played = 0;
    for action in actions {
        let dt = action.dt();
        if dt.is_finite() && dt > 0.0 && !token.sleep(Duration::from_secs_f64(dt)) {
            break;
        }
        if token.is_cancelled() {
            break;
        }

        let primitive = match action {
            MacroAction::Move { x, y, .. } => PointerAction::MoveTo { x: *x, y: *y },
            MacroAction::Click { button, .. } => PointerAction::Click { button: *button },
        };
        if let Err(e) = executor.execute(&primitive) {
            error!(?primitive, error = %e, "macro action failed");
        }
        played += 1;
    }
    info!(played, total = actions.len(), "macro playback finished");
    played
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MouseButton;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Instant;

    #[derive(Default)]
    struct RecordingExecutor(Mutex<Vec<PointerAction>>);

    impl ActionExecutor for RecordingExecutor {
        fn execute(&self, action: &PointerAction) -> Result<(), String> {
            self.0.lock().unwrap().push(*action);
            Ok(())
        }
    }

    fn sample_macro() -> Vec<MacroAction> {
        vec![
            MacroAction::Move { x: 1, y: 2, dt: 0.0 },
            MacroAction::Click {
                button: MouseButton::Left,
                dt: 0.02,
            },
            MacroAction::Move { x: 3, y: 4, dt: 0.02 },
        ]
    }

    #[test]
    fn replays_in_order() {
        let executor = RecordingExecutor::default();
        let token = CancelToken::new();
        token.arm();
        let played = play_macro(&sample_macro(), &executor, &token);
        assert_eq!(played, 3);
        assert_eq!(
            *executor.0.lock().unwrap(),
            vec![
                PointerAction::MoveTo { x: 1, y: 2 },
                PointerAction::Click {
                    button: MouseButton::Left
                },
                PointerAction::MoveTo { x: 3, y: 4 },
            ]
        );
    }

    #[test]
    fn waits_each_dt_before_acting() {
        let executor = RecordingExecutor::default();
        let token = CancelToken::new();
        token.arm();
        let actions = vec![
            MacroAction::Move { x: 0, y: 0, dt: 0.0 },
            MacroAction::Move { x: 1, y: 1, dt: 0.05 },
        ];
        let start = Instant::now();
        play_macro(&actions, &executor, &token);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn cancellation_stops_playback_early() {
        let executor = RecordingExecutor::default();
        let token = Arc::new(CancelToken::new());
        token.arm();
        let actions = vec![
            MacroAction::Move { x: 0, y: 0, dt: 0.0 },
            MacroAction::Move { x: 1, y: 1, dt: 5.0 },
            MacroAction::Move { x: 2, y: 2, dt: 0.0 },
        ];
        let canceller = {
            let token = token.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                token.cancel();
            })
        };
        let start = Instant::now();
        let played = play_macro(&actions, &executor, &token);
        canceller.join().unwrap();
        assert_eq!(played, 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
