//! simclick-core: domain model + scheduling primitives.
//!
//! Design goal: keep this crate UI-agnostic and platform-agnostic.
//! Platform specific I/O (injection, cursor, screen sensing) lives in
//! `simclick-platform` behind the traits defined here.

mod cancel;
mod pattern;
mod player;
mod position;
mod recorder;
mod remote;
mod report;
mod scheduler;
mod storage;
mod trigger;

pub use cancel::{CancelToken, WAIT_SLICE};
pub use pattern::{jitter_offset, parse_offsets, parse_points, Offset, RecoilPattern};
pub use player::play_macro;
pub use position::PositionProvider;
pub use recorder::{MacroAction, MacroRecorder, SAMPLE_TICK};
pub use remote::{RemoteConfig, RemoteController, RemoteHandle, RemoteServer};
pub use report::{render_report, write_report};
pub use scheduler::{Scheduler, SchedulerError, SchedulerState, TRIGGER_POLL};
pub use storage::{
    app_data_dir, ensure_dir, load_config, load_config_from, load_macro, macros_dir, reports_dir,
    save_config, save_macro, StorageError, StorageResult,
};
pub use trigger::{ColorTrigger, ImageTrigger, Rgb, TimeTrigger, TriggerSensors, TriggerSet};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A screen coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl Default for MouseButton {
    fn default() -> Self {
        Self::Left
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MouseButton::Left => "left",
            MouseButton::Middle => "middle",
            MouseButton::Right => "right",
        };
        write!(f, "{name}")
    }
}

impl FromStr for MouseButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "middle" => Ok(MouseButton::Middle),
            "right" => Ok(MouseButton::Right),
            other => Err(format!("unknown mouse button: {other}")),
        }
    }
}

/// How a single scheduled action is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickMode {
    Single,
    Double,
    Triple,
    /// Press, hold for `SessionConfig::hold_ms`, release.
    Hold,
}

impl Default for ClickMode {
    fn default() -> Self {
        Self::Single
    }
}

/// Where the next action is targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// Live cursor position, wherever it happens to be.
    Current,
    /// The configured fixed point.
    Fixed,
    /// Cycle through the configured coordinate list.
    Cycle,
}

impl Default for PositionMode {
    fn default() -> Self {
        Self::Current
    }
}

/// Multi-button combo presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComboKind {
    LeftRight,
    LeftMiddle,
    RightMiddle,
}

impl ComboKind {
    /// Buttons in press order. Release order is the reverse.
    pub fn buttons(self) -> [MouseButton; 2] {
        match self {
            ComboKind::LeftRight => [MouseButton::Left, MouseButton::Right],
            ComboKind::LeftMiddle => [MouseButton::Left, MouseButton::Middle],
            ComboKind::RightMiddle => [MouseButton::Right, MouseButton::Middle],
        }
    }
}

/// Inclusive random inter-action delay range, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

/// Immutable snapshot of everything one run needs.
///
/// Captured once at start so concurrent edits to persisted settings never
/// affect an in-flight run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub button: MouseButton,
    pub click_mode: ClickMode,
    /// Press duration for [`ClickMode::Hold`], in milliseconds.
    pub hold_ms: u64,
    /// Base inter-action interval, in milliseconds.
    pub interval_ms: u64,
    /// When set, the delay is drawn uniformly from this range instead.
    pub random_interval: Option<IntervalRange>,
    /// Stop after exactly this many actions.
    pub click_limit: Option<u64>,
    pub position_mode: PositionMode,
    /// Target for [`PositionMode::Fixed`].
    pub fixed: Point,
    /// Targets for [`PositionMode::Cycle`]; an empty list falls back to the
    /// cursor position sampled at start.
    pub positions: Vec<Point>,
    /// Multi-button combo applied to single clicks.
    pub combo: Option<ComboKind>,
    /// Cyclic post-action relative offsets ("recoil pattern").
    pub recoil: Option<Vec<Offset>>,
    /// Anti-detect jitter radius; each axis gets an independent draw from
    /// `[-radius, radius]` per action.
    pub jitter_radius: Option<i32>,
    /// Finite test-loop count. `None` runs until stopped or the click limit
    /// is reached.
    pub test_loop: Option<u32>,
    /// Verification area `(x, y, w, h)`; recognized and echoed in reports.
    pub verify_area: Option<[i32; 4]>,
    /// Write a completion report when a multi-iteration test loop finishes.
    pub generate_report: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            button: MouseButton::Left,
            click_mode: ClickMode::Single,
            hold_ms: 100,
            interval_ms: 100,
            random_interval: None,
            click_limit: None,
            position_mode: PositionMode::Current,
            fixed: Point::new(0, 0),
            positions: Vec::new(),
            combo: None,
            recoil: None,
            jitter_radius: None,
            test_loop: None,
            verify_area: None,
            generate_report: false,
        }
    }
}

/// Everything the settings layer persists for the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub triggers: TriggerSet,
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Pointer primitives the scheduler composes actions from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointerAction {
    MoveTo { x: i32, y: i32 },
    MoveRel { dx: i32, dy: i32 },
    Press { button: MouseButton },
    Release { button: MouseButton },
    Click { button: MouseButton },
}

/// Trait for injecting pointer actions (implemented by simclick-platform).
pub trait ActionExecutor: Send + Sync {
    fn execute(&self, action: &PointerAction) -> Result<(), String>;
}

/// Live cursor position source (implemented by simclick-platform).
pub trait CursorTracker: Send + Sync {
    fn position(&self) -> Point;
}
