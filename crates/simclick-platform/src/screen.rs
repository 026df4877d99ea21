//! Screen sampling for trigger evaluation.
//!
//! Implements pixel reads and on-screen template search over `xcap`
//! monitor captures. Sensor methods return `None` on capture failure
//! so trigger evaluation stays fail-closed.

use image::GrayImage;
use simclick_core::{Rgb, TriggerSensors};
use std::path::Path;
use tracing::warn;
use xcap::Monitor;

/// Stride used for the coarse template scan before local refinement.
const SCAN_STRIDE: u32 = 4;

pub struct ScreenSensors;

impl ScreenSensors {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ScreenSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerSensors for ScreenSensors {
    fn pixel_color(&self, x: i32, y: i32) -> Option<Rgb> {
        let monitor = match Monitor::from_point(x, y) {
            Ok(m) => m,
            Err(e) => {
                warn!(x, y, error = %e, "no monitor at point");
                return None;
            }
        };
        let image = match monitor.capture_image() {
            Ok(img) => img,
            Err(e) => {
                warn!(error = %e, "monitor capture failed");
                return None;
            }
        };
        let mon_x = monitor.x().ok()?;
        let mon_y = monitor.y().ok()?;
        let mon_w = monitor.width().ok()?;
        let mon_h = monitor.height().ok()?;
        if mon_w == 0 || mon_h == 0 {
            return None;
        }
        // The capture can be larger than logical monitor size on HiDPI
        // displays; scale coordinates into capture space.
        let rel_x = (x - mon_x) as i64 * image.width() as i64 / mon_w as i64;
        let rel_y = (y - mon_y) as i64 * image.height() as i64 / mon_h as i64;
        if rel_x < 0 || rel_y < 0 || rel_x >= image.width() as i64 || rel_y >= image.height() as i64
        {
            return None;
        }
        let px = image.get_pixel(rel_x as u32, rel_y as u32);
        Some(Rgb {
            r: px.0[0],
            g: px.0[1],
            b: px.0[2],
        })
    }

    fn image_visible(&self, path: &Path, confidence: f32) -> Option<bool> {
        let template = match image::open(path) {
            Ok(img) => img.to_luma8(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load template image");
                return None;
            }
        };
        if template.width() == 0 || template.height() == 0 {
            return None;
        }
        let monitors = match Monitor::all() {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "failed to enumerate monitors");
                return None;
            }
        };
        let mut captured_any = false;
        for monitor in monitors {
            let capture = match monitor.capture_image() {
                Ok(img) => img,
                Err(e) => {
                    warn!(error = %e, "monitor capture failed during image search");
                    continue;
                }
            };
            captured_any = true;
            let screen = image::DynamicImage::ImageRgba8(capture).to_luma8();
            if best_match_score(&screen, &template) >= confidence {
                return Some(true);
            }
        }
        if captured_any {
            Some(false)
        } else {
            None
        }
    }
}

/// Best normalized similarity of `template` over all placements in
/// `screen`. 1.0 is a perfect match, 0.0 a full-range mismatch.
fn best_match_score(screen: &GrayImage, template: &GrayImage) -> f32 {
    if template.width() > screen.width() || template.height() > screen.height() {
        return 0.0;
    }
    let max_x = screen.width() - template.width();
    let max_y = screen.height() - template.height();

    // Coarse pass on a stride grid, then refine around the best cell.
    let mut best = 0.0f32;
    let mut best_x = 0;
    let mut best_y = 0;
    let mut y = 0;
    while y <= max_y {
        let mut x = 0;
        while x <= max_x {
            let score = match_score_at(screen, template, x, y);
            if score > best {
                best = score;
                best_x = x;
                best_y = y;
            }
            x += SCAN_STRIDE;
        }
        y += SCAN_STRIDE;
    }

    let x0 = best_x.saturating_sub(SCAN_STRIDE);
    let y0 = best_y.saturating_sub(SCAN_STRIDE);
    let x1 = (best_x + SCAN_STRIDE).min(max_x);
    let y1 = (best_y + SCAN_STRIDE).min(max_y);
    for y in y0..=y1 {
        for x in x0..=x1 {
            let score = match_score_at(screen, template, x, y);
            if score > best {
                best = score;
            }
        }
    }
    best
}

/// Mean-absolute-difference similarity of `template` against `screen`
/// at placement `(x, y)`, normalized to 0.0..=1.0.
fn match_score_at(screen: &GrayImage, template: &GrayImage, x: u32, y: u32) -> f32 {
    let mut sum: u64 = 0;
    for ty in 0..template.height() {
        for tx in 0..template.width() {
            let s = screen.get_pixel(x + tx, y + ty).0[0] as i32;
            let t = template.get_pixel(tx, ty).0[0] as i32;
            sum += (s - t).unsigned_abs() as u64;
        }
    }
    let n = (template.width() * template.height()) as u64;
    1.0 - (sum as f32 / n as f32) / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, v: u8) -> GrayImage {
        GrayImage::from_pixel(w, h, image::Luma([v]))
    }

    #[test]
    fn exact_match_scores_one() {
        let mut screen = solid(32, 32, 10);
        for y in 8..12 {
            for x in 8..12 {
                screen.put_pixel(x, y, image::Luma([200]));
            }
        }
        let template = solid(4, 4, 200);
        let score = best_match_score(&screen, &template);
        assert!((score - 1.0).abs() < 1e-6, "score was {score}");
    }

    #[test]
    fn absent_template_scores_low() {
        let screen = solid(32, 32, 0);
        let template = solid(4, 4, 255);
        let score = best_match_score(&screen, &template);
        assert!(score < 0.1, "score was {score}");
    }

    #[test]
    fn oversized_template_scores_zero() {
        let screen = solid(8, 8, 0);
        let template = solid(16, 16, 0);
        assert_eq!(best_match_score(&screen, &template), 0.0);
    }

    #[test]
    fn match_found_off_stride_grid() {
        let mut screen = solid(32, 32, 10);
        for y in 9..13 {
            for x in 9..13 {
                screen.put_pixel(x, y, image::Luma([200]));
            }
        }
        let template = solid(4, 4, 200);
        let score = best_match_score(&screen, &template);
        assert!(score > 0.99, "score was {score}");
    }
}
