//! Desktop capture primitives.
//!
//! | Module          | Purpose                                              |
//! |-----------------|------------------------------------------------------|
//! | `geometry`      | `Point`, `Size`, `Rect`                              |
//! | `frame`         | `Frame` pixel buffers and the `FrameFactory` trait   |
//! | `cursor`        | Remote cursor shape                                  |
//! | `shared_memory` | Segments frames can be placed in for zero-copy IPC   |
//! | `frame_queue`   | Current/previous double buffer                       |
//! | `diff`          | Tile comparison between consecutive frames           |
//! | `capturer`      | The `ScreenCapturer` contract                        |
//! | `composite`     | Cycle outcome when several outputs are composed      |
//! | `synthetic`     | Deterministic capturer for tests and demos           |
//! | `dxgi`          | DXGI Desktop Duplication capturer (Windows)          |

pub mod capturer;
pub mod composite;
pub mod cursor;
pub mod diff;
pub mod frame;
pub mod frame_queue;
pub mod geometry;
pub mod shared_memory;
pub mod synthetic;

#[cfg(target_os = "windows")]
pub mod dxgi;

// ── Re-exports ───────────────────────────────────────────────────

pub use capturer::{
    FULL_DESKTOP_SCREEN_ID, INVALID_SCREEN_ID, Screen, ScreenCapturer, ScreenId, ScreenList,
    platform_capturer,
};
pub use composite::{OutputUpdate, composite_status};
pub use cursor::MouseCursor;
pub use frame::{Frame, FrameFactory, HeapFrameFactory, PixelFormat};
pub use frame_queue::FrameQueue;
pub use geometry::{Point, Rect, Size};
pub use shared_memory::{MappedMemoryFactory, SharedMemory, SharedMemoryFactory, SharedMemoryId};
pub use synthetic::{SyntheticScreen, SyntheticScreenCapturer};

#[cfg(target_os = "windows")]
pub use dxgi::DxgiScreenCapturer;
