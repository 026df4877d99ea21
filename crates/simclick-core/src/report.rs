//! Completion report written after a finite test loop.

use crate::storage::{ensure_dir, StorageResult};
use crate::SessionConfig;
use std::fs;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

/// Render the plain-text report: echoed parameters, totals, completion ratio.
pub fn render_report(
    config: &SessionConfig,
    clicks: u64,
    test_loop: u32,
    now: OffsetDateTime,
) -> String {
    let stamp_fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let stamp = now
        .format(&stamp_fmt)
        .unwrap_or_else(|_| "unknown".to_string());
    let ratio = if test_loop > 0 {
        100.0 * clicks as f64 / test_loop as f64
    } else {
        0.0
    };

    let mut report = String::new();
    report.push_str(&format!("Test report - {stamp}\n\n"));
    report.push_str(&format!("Test loop count: {test_loop}\n"));
    report.push_str(&format!("Actions executed: {clicks}\n"));
    report.push_str(&format!("Completion ratio: {ratio:.2}%\n\n"));
    report.push_str("Configured parameters:\n");
    report.push_str(&format!("- button: {}\n", config.button));
    report.push_str(&format!("- click mode: {:?}\n", config.click_mode));
    report.push_str(&format!("- interval: {}ms\n", config.interval_ms));
    report.push_str(&format!("- position mode: {:?}\n", config.position_mode));
    if let Some(area) = config.verify_area {
        report.push_str(&format!(
            "- verification area: {},{},{},{}\n",
            area[0], area[1], area[2], area[3]
        ));
    }
    report
}

/// Write the report to a timestamped file under `dir`.
pub fn write_report(
    dir: &Path,
    config: &SessionConfig,
    clicks: u64,
    test_loop: u32,
) -> StorageResult<PathBuf> {
    ensure_dir(dir)?;
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let file_fmt = format_description!("[year][month][day]_[hour][minute][second]");
    let stamp = now.format(&file_fmt)?;
    let path = dir.join(format!("test_report_{stamp}.txt"));
    fs::write(&path, render_report(config, clicks, test_loop, now))?;
    Ok(path)
}
