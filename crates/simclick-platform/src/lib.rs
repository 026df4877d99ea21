//! simclick-platform: OS boundary for simclick.
//!
//! This crate provides:
//! - Pointer action injection via `enigo`
//! - Live cursor position tracking via `enigo`
//! - Screen pixel sampling and template matching via `xcap` + `image`
//! - Global key/button monitoring via `rdev` (emergency stop, click capture)
//!
//! Everything here implements a trait from `simclick-core`; the core never
//! links against an OS API directly.

mod cursor;
mod error;
mod injector;
mod monitor;
mod screen;

pub use cursor::EnigoCursor;
pub use error::{PlatformError, PlatformResult};
pub use injector::{EnigoInjector, NoopInjector};
pub use monitor::{watch_clicks, watch_emergency_key, ClickWatcher, EmergencyWatcher};
pub use screen::ScreenSensors;
