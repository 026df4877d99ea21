//! Target coordinate resolution for the scheduler.

use crate::{CursorTracker, Point, PositionMode, SessionConfig};

/// Resolves the next target coordinate per the configured position mode.
///
/// `cycle` keeps a wrapping index into the coordinate list; the other modes
/// are stateless.
#[derive(Debug, Clone)]
pub struct PositionProvider {
    mode: PositionMode,
    fixed: Point,
    cycle: Vec<Point>,
    index: usize,
}

impl PositionProvider {
    /// Build a provider from the run config. `start` is the cursor position
    /// sampled at start time; an empty cycle list falls back to a
    /// single-element list containing it.
    pub fn new(config: &SessionConfig, start: Point) -> Self {
        let cycle = if config.positions.is_empty() {
            vec![start]
        } else {
            config.positions.clone()
        };
        Self {
            mode: config.position_mode,
            fixed: config.fixed,
            cycle,
            index: 0,
        }
    }

    /// Resolve the next target, advancing the cycle index when applicable.
    pub fn next(&mut self, cursor: &dyn CursorTracker) -> Point {
        match self.mode {
            PositionMode::Current => cursor.position(),
            PositionMode::Fixed => self.fixed,
            PositionMode::Cycle => {
                let point = self.cycle[self.index];
                self.index = (self.index + 1) % self.cycle.len();
                point
            }
        }
    }
}
