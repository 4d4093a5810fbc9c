//! # rdesk-core
//!
//! Capture side of the rdesk remote desktop.
//!
//! This crate contains:
//! - **Desktop**: frames, geometry, cursors, shared memory, the
//!   `FrameQueue` double buffer and the `ScreenCapturer` contract with
//!   its synthetic and DXGI backends
//! - **Capture**: `CaptureDriver`, the serial capture loop that retries
//!   temporary failures and stops on permanent ones
//! - **Protocol**: session values (screen list, system info, clipboard,
//!   capabilities) relayed to the desktop window
//! - **Error**: `DeskError` and the `CaptureError` severity taxonomy

pub mod capture;
pub mod desktop;
pub mod error;
pub mod protocol;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use capture::{CaptureConfig, CaptureDriver, CaptureStats, FrameSink};
pub use desktop::{
    FULL_DESKTOP_SCREEN_ID, Frame, FrameFactory, FrameQueue, HeapFrameFactory, INVALID_SCREEN_ID,
    MouseCursor, PixelFormat, Point, Rect, Screen, ScreenCapturer, ScreenId, Size,
    SyntheticScreenCapturer,
};
pub use error::{CaptureError, CaptureStatus, DeskError};
