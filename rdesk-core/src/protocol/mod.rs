//! Session protocol value types.
//!
//! Each sub-module defines payloads the host sends during a session
//! (screen inventory, system report, clipboard content, capabilities).
//! They are plain `serde` values; the wire framing lives elsewhere.

pub mod session;
pub mod system_info;

// Re-export the most commonly used types at the protocol level.
pub use session::{ClipboardEvent, ScreenInfo, ScreenList, Version, VideoEncodings};
pub use system_info::{MemoryModule, Monitor, OperatingSystem, Processor, SystemInfo};
