//! Pointer action injection implementations.

use crate::{PlatformError, PlatformResult};
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};
use simclick_core::{ActionExecutor, MouseButton, PointerAction};
use std::sync::Mutex;
use tracing::debug;

/// Minimal no-op injector for headless development and testing.
pub struct NoopInjector;

impl ActionExecutor for NoopInjector {
    fn execute(&self, action: &PointerAction) -> Result<(), String> {
        debug!(?action, "NoopInjector: would inject action");
        Ok(())
    }
}

/// Real injector using the `enigo` crate.
pub struct EnigoInjector {
    enigo: Mutex<Enigo>,
}

impl EnigoInjector {
    pub fn new() -> PlatformResult<Self> {
        let settings = Settings::default();
        let enigo = Enigo::new(&settings)
            .map_err(|e| PlatformError::InjectionFailed(format!("failed to create Enigo: {e}")))?;
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }

    fn inject(&self, action: &PointerAction) -> PlatformResult<()> {
        let mut enigo = self.enigo.lock().unwrap();
        match action {
            PointerAction::MoveTo { x, y } => {
                debug!(x, y, "injecting absolute move");
                enigo
                    .move_mouse(*x, *y, Coordinate::Abs)
                    .map_err(|e| PlatformError::InjectionFailed(e.to_string()))?;
            }
            PointerAction::MoveRel { dx, dy } => {
                debug!(dx, dy, "injecting relative move");
                enigo
                    .move_mouse(*dx, *dy, Coordinate::Rel)
                    .map_err(|e| PlatformError::InjectionFailed(e.to_string()))?;
            }
            PointerAction::Press { button } => {
                debug!(?button, "injecting button press");
                enigo
                    .button(to_enigo(*button), Direction::Press)
                    .map_err(|e| PlatformError::InjectionFailed(e.to_string()))?;
            }
            PointerAction::Release { button } => {
                debug!(?button, "injecting button release");
                enigo
                    .button(to_enigo(*button), Direction::Release)
                    .map_err(|e| PlatformError::InjectionFailed(e.to_string()))?;
            }
            PointerAction::Click { button } => {
                debug!(?button, "injecting click");
                enigo
                    .button(to_enigo(*button), Direction::Click)
                    .map_err(|e| PlatformError::InjectionFailed(e.to_string()))?;
            }
        }
        Ok(())
    }
}

impl ActionExecutor for EnigoInjector {
    fn execute(&self, action: &PointerAction) -> Result<(), String> {
        self.inject(action).map_err(|e| e.to_string())
    }
}

fn to_enigo(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Middle => Button::Middle,
        MouseButton::Right => Button::Right,
    }
}
