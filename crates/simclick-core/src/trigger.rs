//! Gating conditions evaluated before every scheduled action.
//!
//! Triggers are independent; the set is a logical AND across all enabled
//! triggers. Sensor failures count as a failed trigger (fail-closed), never
//! as a pass.

use crate::Point;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::{OffsetDateTime, Time};
use tracing::warn;

/// RGB color for the color trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse "#RRGGBB" (leading '#' optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Sum of absolute per-channel differences.
    pub fn difference(self, other: Rgb) -> u32 {
        let dr = (self.r as i32 - other.r as i32).unsigned_abs();
        let dg = (self.g as i32 - other.g as i32).unsigned_abs();
        let db = (self.b as i32 - other.b as i32).unsigned_abs();
        dr + dg + db
    }

    /// True when the summed difference is at or below `tolerance`.
    pub fn matches(self, other: Rgb, tolerance: u8) -> bool {
        self.difference(other) <= tolerance as u32
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self { r: 0, g: 0, b: 0 }
    }
}

/// Pass while the screen pixel at `point` matches `color` within `tolerance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorTrigger {
    pub point: Point,
    pub color: Rgb,
    pub tolerance: u8,
}

/// Pass while a template match of `path` against the screen reaches
/// `confidence`. A missing file or matcher error blocks the action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageTrigger {
    pub path: PathBuf,
    pub confidence: f32,
}

/// Pass while the local time-of-day falls within `[start, end]` inclusive.
///
/// `start > end` is interpreted literally (the window never matches); no
/// overnight wraparound is inferred.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeTrigger {
    pub start: Time,
    pub end: Time,
}

/// External sensors the evaluator reads (implemented by simclick-platform).
pub trait TriggerSensors: Send + Sync {
    /// Sample the screen pixel at the given coordinates. `None` means the
    /// sample could not be taken.
    fn pixel_color(&self, x: i32, y: i32) -> Option<Rgb>;

    /// Whether the template image is currently visible on screen at or above
    /// the given confidence. `None` means the matcher failed.
    fn image_visible(&self, path: &Path, confidence: f32) -> Option<bool>;
}

/// Zero or more independent gating conditions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerSet {
    #[serde(default)]
    pub color: Option<ColorTrigger>,
    #[serde(default)]
    pub image: Option<ImageTrigger>,
    #[serde(default)]
    pub time: Option<TimeTrigger>,
}

impl TriggerSet {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.image.is_none() && self.time.is_none()
    }

    /// Evaluate against the current wall clock.
    pub fn evaluate(&self, sensors: &dyn TriggerSensors) -> bool {
        self.evaluate_at(sensors, local_time_of_day())
    }

    /// Evaluate with an explicit time-of-day. Allow when no trigger is
    /// enabled; otherwise every enabled trigger must pass.
    pub fn evaluate_at(&self, sensors: &dyn TriggerSensors, now: Time) -> bool {
        if let Some(window) = &self.time {
            if !(window.start <= now && now <= window.end) {
                return false;
            }
        }

        if let Some(color) = &self.color {
            match sensors.pixel_color(color.point.x, color.point.y) {
                Some(sampled) => {
                    if !sampled.matches(color.color, color.tolerance) {
                        return false;
                    }
                }
                None => {
                    warn!(x = color.point.x, y = color.point.y, "pixel sample failed, blocking");
                    return false;
                }
            }
        }

        if let Some(image) = &self.image {
            match sensors.image_visible(&image.path, image.confidence) {
                Some(true) => {}
                Some(false) => return false,
                None => {
                    warn!(path = %image.path.display(), "image match failed, blocking");
                    return false;
                }
            }
        }

        true
    }
}

fn local_time_of_day() -> Time {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .time()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::time;

    struct FakeSensors {
        pixel: Option<Rgb>,
        image: Option<bool>,
    }

    impl TriggerSensors for FakeSensors {
        fn pixel_color(&self, _x: i32, _y: i32) -> Option<Rgb> {
            self.pixel
        }

        fn image_visible(&self, _path: &Path, _confidence: f32) -> Option<bool> {
            self.image
        }
    }

    fn sensors() -> FakeSensors {
        FakeSensors {
            pixel: Some(Rgb::new(255, 0, 0)),
            image: Some(true),
        }
    }

    fn color_trigger(tolerance: u8) -> ColorTrigger {
        ColorTrigger {
            point: Point::new(0, 0),
            color: Rgb::new(250, 5, 0),
            tolerance,
        }
    }

    #[test]
    fn empty_set_always_allows() {
        let set = TriggerSet::default();
        assert!(set.evaluate_at(&sensors(), time!(12:00:00)));
    }

    #[test]
    fn color_tolerance_is_sum_of_channel_diffs() {
        // |255-250| + |0-5| + |0-0| = 10
        let mut set = TriggerSet {
            color: Some(color_trigger(10)),
            ..TriggerSet::default()
        };
        assert!(set.evaluate_at(&sensors(), time!(12:00:00)));
        set.color = Some(color_trigger(9));
        assert!(!set.evaluate_at(&sensors(), time!(12:00:00)));
    }

    #[test]
    fn sensor_error_fails_closed() {
        let set = TriggerSet {
            color: Some(color_trigger(255)),
            ..TriggerSet::default()
        };
        let broken = FakeSensors {
            pixel: None,
            image: Some(true),
        };
        assert!(!set.evaluate_at(&broken, time!(12:00:00)));

        let set = TriggerSet {
            image: Some(ImageTrigger {
                path: PathBuf::from("/nonexistent.png"),
                confidence: 0.9,
            }),
            ..TriggerSet::default()
        };
        let broken = FakeSensors {
            pixel: None,
            image: None,
        };
        assert!(!set.evaluate_at(&broken, time!(12:00:00)));
    }

    #[test]
    fn time_window_is_inclusive() {
        let set = TriggerSet {
            time: Some(TimeTrigger {
                start: time!(09:00:00),
                end: time!(17:00:00),
            }),
            ..TriggerSet::default()
        };
        assert!(set.evaluate_at(&sensors(), time!(09:00:00)));
        assert!(set.evaluate_at(&sensors(), time!(17:00:00)));
        assert!(!set.evaluate_at(&sensors(), time!(08:59:59)));
        assert!(!set.evaluate_at(&sensors(), time!(17:00:01)));
    }

    #[test]
    fn inverted_time_window_never_matches() {
        // start > end: literal range comparison, no overnight wraparound.
        let set = TriggerSet {
            time: Some(TimeTrigger {
                start: time!(22:00:00),
                end: time!(06:00:00),
            }),
            ..TriggerSet::default()
        };
        assert!(!set.evaluate_at(&sensors(), time!(23:00:00)));
        assert!(!set.evaluate_at(&sensors(), time!(03:00:00)));
        assert!(!set.evaluate_at(&sensors(), time!(12:00:00)));
    }

    #[test]
    fn all_enabled_triggers_must_pass() {
        let set = TriggerSet {
            color: Some(color_trigger(255)),
            image: Some(ImageTrigger {
                path: PathBuf::from("button.png"),
                confidence: 0.9,
            }),
            time: Some(TimeTrigger {
                start: time!(00:00:00),
                end: time!(23:59:59),
            }),
            ..TriggerSet::default()
        };
        assert!(set.evaluate_at(&sensors(), time!(12:00:00)));
        let absent = FakeSensors {
            pixel: Some(Rgb::new(255, 0, 0)),
            image: Some(false),
        };
        assert!(!set.evaluate_at(&absent, time!(12:00:00)));
    }

    #[test]
    fn rgb_hex_round_trip() {
        let color = Rgb::from_hex("#FF8000").unwrap();
        assert_eq!(color, Rgb::new(255, 128, 0));
        assert_eq!(color.to_hex(), "#FF8000");
        assert!(Rgb::from_hex("#FFF").is_none());
        // Six bytes but not six hex digits; must not split a char boundary.
        assert!(Rgb::from_hex("aébcd").is_none());
        assert!(Rgb::from_hex("ggggg1").is_none());
    }
}
