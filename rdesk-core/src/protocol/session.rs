//! Session negotiation values relayed to the desktop window.
//!
//! These arrive from the host during a session and are forwarded to the
//! window unchanged. The core never interprets them beyond the helpers
//! below.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::desktop::capturer::{FULL_DESKTOP_SCREEN_ID, ScreenId};
use crate::desktop::geometry::Size;

// ── Video encodings ───────────────────────────────────────────────

bitflags! {
    /// Video encodings a peer is able to produce or consume.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct VideoEncodings: u32 {
        const ZSTD = 1 << 0;
        const VP8  = 1 << 1;
        const VP9  = 1 << 2;
        const H264 = 1 << 3;
    }
}

// ── Screen list ───────────────────────────────────────────────────

/// One remote display as advertised by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenInfo {
    pub id: ScreenId,
    pub title: String,
    pub resolution: Size,
}

/// Remote displays plus the one currently streamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenList {
    pub screens: Vec<ScreenInfo>,
    pub current_screen: ScreenId,
}

impl Default for ScreenList {
    fn default() -> Self {
        Self {
            screens: Vec::new(),
            current_screen: FULL_DESKTOP_SCREEN_ID,
        }
    }
}

// ── Clipboard ─────────────────────────────────────────────────────

/// Clipboard content pushed from the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardEvent {
    /// e.g. `text/plain; charset=UTF-8`.
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ClipboardEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            mime_type: "text/plain; charset=UTF-8".into(),
            data: text.into().into_bytes(),
        }
    }
}

// ── Version ───────────────────────────────────────────────────────

/// Software version of the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_encoding_bits_are_retained() {
        let encodings = VideoEncodings::from_bits_retain(0b0110 | 1 << 20);
        assert!(encodings.contains(VideoEncodings::VP8 | VideoEncodings::VP9));
        assert_eq!(encodings.bits(), 0b0110 | 1 << 20);
    }

    #[test]
    fn version_ordering_and_display() {
        assert!(Version::new(2, 6, 0) > Version::new(2, 5, 9));
        assert_eq!(Version::new(2, 6, 1).to_string(), "2.6.1");
    }

    #[test]
    fn clipboard_text_helper() {
        let event = ClipboardEvent::text("hello");
        assert_eq!(event.data, b"hello");
        assert!(event.mime_type.starts_with("text/plain"));
    }
}
