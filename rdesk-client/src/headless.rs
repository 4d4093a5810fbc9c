//! Headless desktop window.
//!
//! Records what the session delivered instead of putting pixels on a
//! screen. The binary uses it for loopback sessions; it also makes the
//! delivery path observable in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rdesk_core::protocol::{ClipboardEvent, ScreenInfo, ScreenList, SystemInfo, Version, VideoEncodings};
use rdesk_core::{Frame, FrameFactory, HeapFrameFactory, MouseCursor, PixelFormat, ScreenId};
use tracing::{debug, info, trace};

use crate::window::{DesktopControl, DesktopWindow};

/// A window that keeps the latest state it was given.
pub struct HeadlessWindow {
    format: PixelFormat,
    factory: Arc<HeapFrameFactory>,
    config_requests: u32,
    extensions: Vec<String>,
    video_encodings: VideoEncodings,
    screen_list: ScreenList,
    system_info: Option<SystemInfo>,
    control: Option<Arc<dyn DesktopControl>>,
    peer_version: Option<Version>,
    frames_drawn: u64,
    last_frame: Option<Arc<Frame>>,
    cursor: Option<Arc<MouseCursor>>,
    clipboard: Option<ClipboardEvent>,
}

impl Default for HeadlessWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessWindow {
    pub fn new() -> Self {
        Self::with_format(PixelFormat::default())
    }

    pub fn with_format(format: PixelFormat) -> Self {
        Self {
            format,
            factory: Arc::new(HeapFrameFactory::new(format)),
            config_requests: 0,
            extensions: Vec::new(),
            video_encodings: VideoEncodings::empty(),
            screen_list: ScreenList::default(),
            system_info: None,
            control: None,
            peer_version: None,
            frames_drawn: 0,
            last_frame: None,
            cursor: None,
            clipboard: None,
        }
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    pub fn config_requests(&self) -> u32 {
        self.config_requests
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn video_encodings(&self) -> VideoEncodings {
        self.video_encodings
    }

    pub fn screen_list(&self) -> &ScreenList {
        &self.screen_list
    }

    pub fn system_info(&self) -> Option<&SystemInfo> {
        self.system_info.as_ref()
    }

    /// `Some` once the session has been shown.
    pub fn peer_version(&self) -> Option<Version> {
        self.peer_version
    }

    pub fn is_visible(&self) -> bool {
        self.control.is_some()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn last_frame(&self) -> Option<&Arc<Frame>> {
        self.last_frame.as_ref()
    }

    pub fn cursor(&self) -> Option<&Arc<MouseCursor>> {
        self.cursor.as_ref()
    }

    pub fn clipboard(&self) -> Option<&ClipboardEvent> {
        self.clipboard.as_ref()
    }

    /// Ask the host to stream another screen.
    pub fn select_screen(&self, id: ScreenId) -> bool {
        let (Some(control), Some(screen)) = (
            self.control.as_ref(),
            self.screen_list.screens.iter().find(|s| s.id == id),
        ) else {
            return false;
        };
        control.select_screen(screen);
        true
    }

    /// Push local clipboard content to the host.
    pub fn send_clipboard(&self, event: &ClipboardEvent) -> bool {
        match &self.control {
            Some(control) => {
                control.inject_clipboard_event(event);
                true
            }
            None => false,
        }
    }
}

impl DesktopWindow for HeadlessWindow {
    fn frame_factory(&self) -> Arc<dyn FrameFactory> {
        self.factory.clone()
    }

    fn config_required(&mut self) {
        self.config_requests += 1;
        debug!("session configuration requested");
    }

    fn set_capabilities(&mut self, extensions: &str, video_encodings: VideoEncodings) {
        self.extensions = extensions
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(String::from)
            .collect();
        self.video_encodings = video_encodings;
        debug!(?extensions, ?video_encodings, "capabilities received");
    }

    fn set_screen_list(&mut self, screen_list: &ScreenList) {
        debug!(
            count = screen_list.screens.len(),
            current = screen_list.current_screen,
            "screen list received"
        );
        self.screen_list = screen_list.clone();
    }

    fn set_system_info(&mut self, system_info: &SystemInfo) {
        debug!(computer = %system_info.computer_name, "system info received");
        self.system_info = Some(system_info.clone());
    }

    fn show_window(&mut self, control: Arc<dyn DesktopControl>, peer_version: Version) {
        info!("session shown, peer v{peer_version}");
        self.control = Some(control);
        self.peer_version = Some(peer_version);
    }

    fn draw_frame(&mut self, frame: Arc<Frame>) {
        trace!(
            size = ?frame.size(),
            regions = frame.updated_region().len(),
            "frame drawn"
        );
        self.frames_drawn += 1;
        self.last_frame = Some(frame);
    }

    fn draw_mouse_cursor(&mut self, cursor: Arc<MouseCursor>) {
        trace!(size = ?cursor.size(), "cursor shape changed");
        self.cursor = Some(cursor);
    }

    fn inject_clipboard_event(&mut self, event: &ClipboardEvent) {
        debug!(mime = %event.mime_type, bytes = event.data.len(), "clipboard updated");
        self.clipboard = Some(event.clone());
    }
}

// ── LoopbackControl ──────────────────────────────────────────────

/// [`DesktopControl`] for a session whose host runs in-process. Requests
/// are only logged and counted.
#[derive(Debug, Default)]
pub struct LoopbackControl {
    requests: AtomicU64,
}

impl LoopbackControl {
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn count(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }
}

impl DesktopControl for LoopbackControl {
    fn select_screen(&self, screen: &ScreenInfo) {
        self.count();
        info!(id = screen.id, title = %screen.title, "screen selection requested");
    }

    fn inject_clipboard_event(&self, event: &ClipboardEvent) {
        self.count();
        debug!(mime = %event.mime_type, "clipboard sent to host");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdesk_core::Size;

    #[test]
    fn capabilities_are_split() {
        let mut window = HeadlessWindow::new();
        window.set_capabilities("ext1, ext2,,", VideoEncodings::VP8 | VideoEncodings::VP9);
        assert_eq!(window.extensions(), ["ext1", "ext2"]);
        assert_eq!(window.video_encodings().bits(), 0b0110);
    }

    #[test]
    fn control_requests_need_a_shown_window() {
        let mut window = HeadlessWindow::new();
        let control = Arc::new(LoopbackControl::default());
        assert!(!window.send_clipboard(&ClipboardEvent::text("x")));

        window.set_screen_list(&ScreenList {
            screens: vec![ScreenInfo {
                id: 0,
                title: "Main".into(),
                resolution: Size::new(640, 480),
            }],
            current_screen: 0,
        });
        window.show_window(control.clone(), Version::new(1, 2, 0));

        assert!(window.is_visible());
        assert!(window.select_screen(0));
        assert!(!window.select_screen(3));
        assert!(window.send_clipboard(&ClipboardEvent::text("x")));
        assert_eq!(control.requests(), 2);
    }
}
