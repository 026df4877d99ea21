//! Common error types for simclick-platform.

use thiserror::Error;

/// Platform-level errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("injection failed: {0}")]
    InjectionFailed(String),
    #[error("cursor tracking failed: {0}")]
    CursorFailed(String),
    #[error("screen capture failed: {0}")]
    CaptureFailed(String),
}

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;
