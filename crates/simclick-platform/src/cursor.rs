//! Physical cursor position snapshots.

use crate::{PlatformError, PlatformResult};
use enigo::{Enigo, Mouse, Settings};
use simclick_core::{CursorTracker, Point};
use std::sync::Mutex;
use tracing::warn;

/// Reads the current pointer position through `enigo`.
///
/// Queries can fail transiently on some display servers, so the last
/// successful reading is kept and returned as a fallback.
pub struct EnigoCursor {
    enigo: Mutex<Enigo>,
    last_known: Mutex<Point>,
}

impl EnigoCursor {
    pub fn new() -> PlatformResult<Self> {
        let settings = Settings::default();
        let enigo = Enigo::new(&settings)
            .map_err(|e| PlatformError::CursorFailed(format!("failed to create Enigo: {e}")))?;
        Ok(Self {
            enigo: Mutex::new(enigo),
            last_known: Mutex::new(Point { x: 0, y: 0 }),
        })
    }
}

impl CursorTracker for EnigoCursor {
    fn position(&self) -> Point {
        let mut enigo = self.enigo.lock().unwrap();
        match enigo.location() {
            Ok((x, y)) => {
                let point = Point { x, y };
                *self.last_known.lock().unwrap() = point;
                point
            }
            Err(e) => {
                warn!(error = %e, "cursor position query failed, using last known");
                *self.last_known.lock().unwrap()
            }
        }
    }
}
