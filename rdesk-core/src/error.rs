//! Domain-specific error types for the rdesk core.
//!
//! Enumeration, selection and setup failures are reported through
//! [`DeskError`]. A single capture cycle reports through the narrower
//! [`CaptureError`], whose two variants carry the severity the driver
//! loop acts on.

use thiserror::Error;

use crate::desktop::capturer::ScreenId;
use crate::desktop::geometry::Size;

/// The canonical error type for the rdesk core.
#[derive(Debug, Error)]
pub enum DeskError {
    // ── Capture Errors ───────────────────────────────────────────
    /// The capturable sources could not be enumerated.
    #[error("screen enumeration failed: {0}")]
    Enumeration(String),

    /// The requested screen is not currently enumerable.
    #[error("screen {0} is not available")]
    InvalidScreen(ScreenId),

    /// A capture cycle failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    // ── Resource Errors ──────────────────────────────────────────
    /// A shared memory segment could not be created or used.
    #[error("shared memory error: {0}")]
    SharedMemory(String),

    /// The byte length of a frame of this size overflows `usize`.
    #[error("frame of {}x{} pixels does not fit in memory", .0.width, .0.height)]
    FrameTooLarge(Size),

    /// The requested backend does not exist on this platform.
    #[error("unsupported on this platform: {0}")]
    Unsupported(&'static str),

    /// An OS-level I/O call failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── CaptureError ─────────────────────────────────────────────────

/// Outcome of a failed capture cycle, classified by severity.
///
/// `Permanent` means the capturer instance is no longer usable and the
/// session must be torn down. `Temporary` means the next cycle may call
/// `capture_frame` again without a reset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("permanent capture failure: {0}")]
    Permanent(String),

    #[error("temporary capture failure: {0}")]
    Temporary(String),
}

impl CaptureError {
    pub fn permanent(reason: impl Into<String>) -> Self {
        CaptureError::Permanent(reason.into())
    }

    pub fn temporary(reason: impl Into<String>) -> Self {
        CaptureError::Temporary(reason.into())
    }

    /// Severity of this failure.
    pub fn status(&self) -> CaptureStatus {
        match self {
            CaptureError::Permanent(_) => CaptureStatus::Permanent,
            CaptureError::Temporary(_) => CaptureStatus::Temporary,
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, CaptureError::Permanent(_))
    }
}

// ── CaptureStatus ────────────────────────────────────────────────

/// Three-way classification of a capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureStatus {
    Succeeded,
    Permanent,
    Temporary,
}

impl CaptureStatus {
    /// Classify the result of a `capture_frame` call.
    pub fn of<T>(result: &Result<T, CaptureError>) -> Self {
        match result {
            Ok(_) => CaptureStatus::Succeeded,
            Err(e) => e.status(),
        }
    }
}

impl From<String> for DeskError {
    fn from(s: String) -> Self {
        DeskError::Other(s)
    }
}

impl From<&str> for DeskError {
    fn from(s: &str) -> Self {
        DeskError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = DeskError::InvalidScreen(7);
        assert!(e.to_string().contains('7'));

        let e: DeskError = CaptureError::temporary("session locked").into();
        assert!(e.to_string().contains("session locked"));
        assert!(e.to_string().contains("temporary"));
    }

    #[test]
    fn status_classification() {
        let ok: Result<u8, CaptureError> = Ok(1);
        assert_eq!(CaptureStatus::of(&ok), CaptureStatus::Succeeded);

        let temp: Result<u8, CaptureError> = Err(CaptureError::temporary("mode change"));
        assert_eq!(CaptureStatus::of(&temp), CaptureStatus::Temporary);

        let perm = CaptureError::permanent("display gone");
        assert!(perm.is_permanent());
        assert_eq!(perm.status(), CaptureStatus::Permanent);
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "mmap");
        let e: DeskError = io_err.into();
        assert!(matches!(e, DeskError::Io(_)));
    }
}
